use crate::assistant::WatsonClient;
use crate::config::Config;
use crate::crm::HubSpotClient;
use crate::registry::CallRegistry;
use crate::summary::SummaryClient;
use crate::twilio_types::CallStatus;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// A ConversationTurn represents an exchange of 1) caller input and 2) bot reply
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConversationTurn {
    pub user_input: String,
    pub bot_reply: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Details collected by the account creation branch of the menu.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AccountIntake {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl AccountIntake {
    pub fn is_complete(&self) -> bool {
        self.first_name.is_some() && self.last_name.is_some() && self.email.is_some()
    }
}

/// Metadata and transcript of one telephone interaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CallRecord {
    pub call_sid: String,
    pub caller: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    /// Seconds; zero until the call is closed.
    pub duration: u64,
    pub status: CallStatus,
    pub contact_name: Option<String>,
    #[serde(default)]
    pub intake: AccountIntake,
    pub issue_recording_url: Option<String>,
    #[serde(default)]
    pub conversations: Vec<ConversationTurn>,
}

impl CallRecord {
    pub fn new(call_sid: &str, caller: &str, start_time: OffsetDateTime) -> Self {
        Self {
            call_sid: call_sid.to_string(),
            caller: caller.to_string(),
            start_time,
            duration: 0,
            status: CallStatus::InProgress,
            contact_name: None,
            intake: AccountIntake::default(),
            issue_recording_url: None,
            conversations: vec![],
        }
    }

    pub fn elapsed_secs(&self, now: OffsetDateTime) -> u64 {
        (now - self.start_time).whole_seconds().max(0) as u64
    }
}

/// Point-in-time copy of the registry, used for export and for the snapshot file.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RegistrySnapshot {
    pub current: Vec<CallRecord>,
    pub past: Vec<CallRecord>,
}

impl RegistrySnapshot {
    /// Plain-text rendering of every call and its conversation, current calls first.
    pub fn to_transcript(&self) -> String {
        let mut out = String::new();
        for record in self.current.iter().chain(&self.past) {
            record.write_transcript(&mut out);
            out.push('\n');
        }
        out
    }
}

impl CallRecord {
    fn write_transcript(&self, out: &mut String) {
        let started = self
            .start_time
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.start_time.to_string());
        out.push_str(&format!(
            "Call {} from {} ({}, started {}, {}s)\n",
            self.call_sid, self.caller, self.status, started, self.duration
        ));
        if let Some(name) = &self.contact_name {
            out.push_str(&format!("  Contact: {name}\n"));
        }
        if let Some(url) = &self.issue_recording_url {
            out.push_str(&format!("  Issue recording: {url}\n"));
        }
        for turn in &self.conversations {
            if !turn.user_input.is_empty() {
                out.push_str(&format!("  Caller: {}\n", turn.user_input));
            }
            out.push_str(&format!("  Bot: {}\n", turn.bot_reply));
        }
    }
}

pub struct AppState {
    pub config: Config,
    pub registry: CallRegistry,
    pub watson: Option<WatsonClient>,
    pub hubspot: Option<HubSpotClient>,
    pub summary: Option<SummaryClient>,
}

impl AppState {
    pub fn new(config: Config, http_client: reqwest::Client) -> Self {
        let registry = CallRegistry::new(config.max_past_calls);
        let watson = config
            .watson
            .as_ref()
            .map(|w| WatsonClient::new(http_client.clone(), &w.url, &w.api_key));
        let hubspot = config
            .hubspot_access_token
            .as_ref()
            .map(|token| HubSpotClient::new(http_client.clone(), &config.hubspot_base_url, token));
        let summary = config
            .summary_webhook_url
            .as_ref()
            .map(|url| SummaryClient::new(http_client.clone(), url));
        Self {
            config,
            registry,
            watson,
            hubspot,
            summary,
        }
    }
}
