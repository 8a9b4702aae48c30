pub fn wrap_twiml(twiml: String) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{twiml}")
}

mod twiml {
    use xmlserde::xml_serde_enum;
    use xmlserde_derives::XmlSerialize;

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    #[xmlserde(root = b"Response")]
    pub struct Response {
        #[xmlserde(ty = "untag")]
        pub actions: Vec<ResponseAction>,
    }

    impl Response {
        pub fn new(actions: Vec<ResponseAction>) -> Self {
            Self { actions }
        }

        /// Serialize into a complete TwiML document, XML declaration included.
        pub fn to_twiml(self) -> String {
            super::wrap_twiml(xmlserde::xml_serialize(self))
        }
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum ResponseAction {
        #[xmlserde(name = b"Say")]
        Say(SayAction),
        #[xmlserde(name = b"Gather")]
        Gather(GatherAction),
        #[xmlserde(name = b"Record")]
        Record(RecordAction),
        #[xmlserde(name = b"Dial")]
        Dial(DialAction),
        #[xmlserde(name = b"Redirect")]
        Redirect(RedirectAction),
        #[xmlserde(name = b"Hangup")]
        Hangup(HangupAction),
    }

    impl ResponseAction {
        pub fn say(text: impl Into<String>) -> Self {
            ResponseAction::Say(SayAction {
                text: text.into(),
                ..Default::default()
            })
        }

        pub fn redirect(url: impl Into<String>) -> Self {
            ResponseAction::Redirect(RedirectAction {
                url: url.into(),
                method: Some("POST".to_string()),
            })
        }

        pub fn hangup() -> Self {
            ResponseAction::Hangup(HangupAction {})
        }
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct SayAction {
        #[xmlserde(ty = "text")]
        pub text: String,
        #[xmlserde(name = b"voice", ty = "attr")]
        pub voice: Option<String>,
        #[xmlserde(name = b"loop", ty = "attr")]
        pub lp: Option<u16>,
        #[xmlserde(name = b"language", ty = "attr")]
        pub language: Option<String>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct GatherAction {
        #[xmlserde(name = b"input", ty = "attr")]
        pub input: Option<GatherInput>,
        #[xmlserde(name = b"action", ty = "attr")]
        pub action: Option<String>,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<String>,
        #[xmlserde(name = b"numDigits", ty = "attr")]
        pub num_digits: Option<u16>,
        #[xmlserde(name = b"timeout", ty = "attr")]
        pub timeout: Option<u16>,
        #[xmlserde(name = b"speechTimeout", ty = "attr")]
        pub speech_timeout: Option<String>,
        /// Prompt spoken while Twilio listens; caller input interrupts it.
        #[xmlserde(name = b"Say", ty = "child")]
        pub say: Option<SayAction>,
    }

    xml_serde_enum! {
        #[derive(PartialEq, Eq, Debug)]
        GatherInput {
            Dtmf => "dtmf",
            Speech => "speech",
            DtmfSpeech => "dtmf speech",
        }
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct RecordAction {
        #[xmlserde(name = b"action", ty = "attr")]
        pub action: Option<String>,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<String>,
        #[xmlserde(name = b"maxLength", ty = "attr")]
        pub max_length: Option<u16>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct DialAction {
        #[xmlserde(ty = "text")]
        pub number: String,
        #[xmlserde(name = b"timeout", ty = "attr")]
        pub timeout: Option<u16>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct RedirectAction {
        #[xmlserde(ty = "text")]
        pub url: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<String>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct HangupAction {}
}
pub use twiml::*;

mod webhook {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
    #[serde(rename_all = "kebab-case")]
    pub enum CallStatus {
        Queued,
        Ringing,
        InProgress,
        Completed,
        Busy,
        Failed,
        NoAnswer,
        Canceled,
        /// Assigned locally when a call never reported a terminal status.
        TimedOut,
    }

    impl CallStatus {
        pub fn is_terminal(self) -> bool {
            matches!(
                self,
                CallStatus::Completed
                    | CallStatus::Busy
                    | CallStatus::Failed
                    | CallStatus::NoAnswer
                    | CallStatus::Canceled
                    | CallStatus::TimedOut
            )
        }

        pub fn as_str(self) -> &'static str {
            match self {
                CallStatus::Queued => "queued",
                CallStatus::Ringing => "ringing",
                CallStatus::InProgress => "in-progress",
                CallStatus::Completed => "completed",
                CallStatus::Busy => "busy",
                CallStatus::Failed => "failed",
                CallStatus::NoAnswer => "no-answer",
                CallStatus::Canceled => "canceled",
                CallStatus::TimedOut => "timed-out",
            }
        }
    }

    impl std::fmt::Display for CallStatus {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Form body Twilio posts to every voice webhook.  Only the fields the bot reads are kept.
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct VoicePayload {
        pub call_sid: String,
        pub from: Option<String>,
        pub to: Option<String>,
        pub digits: Option<String>,
        pub speech_result: Option<String>,
        pub recording_url: Option<String>,
        pub call_status: Option<CallStatus>,
    }

    impl VoicePayload {
        pub fn caller(&self) -> &str {
            self.from.as_deref().unwrap_or("unknown")
        }

        /// Speech transcript with surrounding whitespace removed; `None` when nothing was said.
        pub fn speech(&self) -> Option<&str> {
            self.speech_result
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
        }
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct StatusCallbackPayload {
        pub call_sid: String,
        pub call_status: CallStatus,
        pub call_duration: Option<u64>,
    }
}
pub use webhook::*;
