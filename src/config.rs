use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is set but {1} is not")]
    Incomplete(&'static str, &'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct WatsonConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Number dialled when the caller asks for an agent.
    pub agent_phone_number: Option<String>,
    pub watson: Option<WatsonConfig>,
    pub hubspot_access_token: Option<String>,
    pub hubspot_base_url: String,
    pub summary_webhook_url: Option<String>,
    pub snapshot_path: Option<PathBuf>,
    pub max_past_calls: usize,
    pub outbound_timeout: Duration,
    pub stale_call_after: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Empty values count as unset, which is what a blank line in .env means.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = parse_or(&get, "BIND_ADDR", "0.0.0.0:3000".parse().ok())?;
        let watson = match (get("WATSON_ASSISTANT_URL"), get("WATSON_API_KEY")) {
            (Some(url), Some(api_key)) => Some(WatsonConfig { url, api_key }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete(
                    "WATSON_ASSISTANT_URL",
                    "WATSON_API_KEY",
                ))
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete(
                    "WATSON_API_KEY",
                    "WATSON_ASSISTANT_URL",
                ))
            }
            (None, None) => None,
        };
        let max_past_calls = parse_or(&get, "MAX_PAST_CALLS", Some(500))?;
        if max_past_calls == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_PAST_CALLS",
                value: "0".to_string(),
            });
        }
        let outbound_timeout = parse_or(&get, "OUTBOUND_TIMEOUT_SECS", Some(10))?;
        let stale_call_after = parse_or(&get, "STALE_CALL_SECS", Some(3_600))?;

        Ok(Self {
            bind_addr,
            agent_phone_number: get("AGENT_PHONE_NUMBER"),
            watson,
            hubspot_access_token: get("HUBSPOT_ACCESS_TOKEN"),
            hubspot_base_url: get("HUBSPOT_BASE_URL")
                .unwrap_or_else(|| "https://api.hubapi.com".to_string()),
            summary_webhook_url: get("SUMMARY_WEBHOOK_URL"),
            snapshot_path: get("CALL_SNAPSHOT_PATH").map(PathBuf::from),
            max_past_calls,
            outbound_timeout: Duration::from_secs(outbound_timeout),
            stale_call_after: Duration::from_secs(stale_call_after),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => default.ok_or(ConfigError::Invalid {
            key,
            value: String::new(),
        }),
    }
}
