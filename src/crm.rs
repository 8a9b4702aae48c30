use crate::error::AppError;

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, error};

const CONTACT_PROPERTIES: &[&str] = &["firstname", "lastname", "phone", "balance", "delinquent"];

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize, Debug)]
struct SearchResult {
    id: String,
    #[serde(default)]
    properties: HashMap<String, Option<String>>,
}

/// The contact fields the bot and the lookup endpoint care about.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub balance: Option<String>,
    pub delinquent: bool,
}

impl Contact {
    fn from_result(mut result: SearchResult) -> Self {
        let mut take = |key: &str| {
            result
                .properties
                .remove(key)
                .flatten()
                .filter(|v| !v.trim().is_empty())
        };
        let first_name = take("firstname");
        let last_name = take("lastname");
        let phone = take("phone");
        let balance = take("balance");
        // HubSpot booleans arrive as the strings "true" and "false".
        let delinquent = take("delinquent").map_or(false, |v| v.eq_ignore_ascii_case("true"));
        Self {
            id: result.id,
            first_name,
            last_name,
            phone,
            balance,
            delinquent,
        }
    }

    pub fn display_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(name), None) | (None, Some(name)) => Some(name.clone()),
            (None, None) => None,
        }
    }
}

/// HubSpot CRM contact search client.
pub struct HubSpotClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HubSpotClient {
    pub fn new(http_client: reqwest::Client, base_url: &str, access_token: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    /// Look up a contact by exact phone number.  No match is `Ok(None)`, not an error.
    pub async fn find_contact_by_phone(&self, phone: &str) -> Result<Option<Contact>, AppError> {
        let url = format!("{}/crm/v3/objects/contacts/search", self.base_url);
        let body = json!({
            "filterGroups": [{
                "filters": [{ "propertyName": "phone", "operator": "EQ", "value": phone }]
            }],
            "properties": CONTACT_PROPERTIES,
            "limit": 1,
        });
        let resp = self
            .http_client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(AppError::upstream("HubSpot"))?
            .json::<SearchResponse>()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to decode HubSpot search response");
                AppError::UnexpectedResponse("HubSpot")
            })?;
        debug!(phone, matches = resp.results.len(), "hubspot contact search");

        Ok(resp.results.into_iter().next().map(Contact::from_result))
    }
}
