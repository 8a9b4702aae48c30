use crate::error::AppError;

use serde_json::Value;
use tracing::debug;

/// Client for the account summary webhook, which answers `?account=<number>` with JSON.
pub struct SummaryClient {
    http_client: reqwest::Client,
    url: String,
}

impl SummaryClient {
    pub fn new(http_client: reqwest::Client, url: &str) -> Self {
        Self {
            http_client,
            url: url.to_string(),
        }
    }

    pub async fn fetch(&self, account: &str) -> Result<Value, AppError> {
        let summary = self
            .http_client
            .get(&self.url)
            .query(&[("account", account)])
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(AppError::upstream("summary webhook"))?
            .json::<Value>()
            .await
            .map_err(AppError::upstream("summary webhook"))?;
        debug!(account, "fetched account summary");
        Ok(summary)
    }
}
