use crate::error::AppError;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

#[derive(Serialize)]
struct MessageInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    input: MessageInput<'a>,
    context: Map<String, Value>,
}

#[derive(Deserialize, Debug)]
struct MessageResponse {
    output: MessageOutput,
}

#[derive(Deserialize, Debug)]
struct MessageOutput {
    #[serde(default)]
    text: Vec<String>,
}

/// Watson Assistant message API client.
pub struct WatsonClient {
    http_client: reqwest::Client,
    url: String,
    api_key: String,
}

impl WatsonClient {
    pub fn new(http_client: reqwest::Client, url: &str, api_key: &str) -> Self {
        Self {
            http_client,
            url: url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Send one caller utterance and return the assistant's reply, lines joined by newlines.
    pub async fn message(&self, text: &str) -> Result<String, AppError> {
        let payload = MessageRequest {
            input: MessageInput { text },
            context: Map::new(),
        };
        let resp = self
            .http_client
            .post(&self.url)
            .basic_auth("apikey", Some(&self.api_key))
            .json(&payload)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(AppError::upstream("Watson Assistant"))?
            .json::<MessageResponse>()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to decode Watson response");
                AppError::UnexpectedResponse("Watson Assistant")
            })?;
        debug!(watson_resp=?resp, "watson response");

        let reply = resp.output.text.join("\n");
        if reply.trim().is_empty() {
            return Err(AppError::UnexpectedResponse("Watson Assistant"));
        }
        Ok(reply)
    }
}
