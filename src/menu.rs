//! Canned voice script for the call menu.
//!
//! Every function returns the text the bot speaks alongside the TwiML that speaks it, so the
//! handlers can keep the transcript without re-reading the markup.

use crate::twilio_types::{
    DialAction, GatherAction, GatherInput, RecordAction, Response, ResponseAction, SayAction,
};

pub const WELCOME: &str = "Welcome! I am a Truworths agent.";
pub const MENU_PROMPT: &str =
    "Press 1 to create an account. Press 2 to log an issue. Press 3 to talk to an agent.";
pub const ASK_FIRST_NAME: &str = "Please provide your first name.";
pub const ASK_LAST_NAME: &str = "Thank you. Now, please say your last name.";
pub const ASK_EMAIL: &str = "Got it. Finally, please say your email address.";
pub const ACCOUNT_DONE: &str =
    "Thank you for providing your details. Your account creation process is complete.";
pub const ASK_ISSUE: &str = "Please describe your issue after the beep.";
pub const ISSUE_LOGGED: &str =
    "Thank you for reporting the issue. Our team will get back to you shortly.";
pub const CONNECT_AGENT: &str = "Connecting you to an agent. Please hold.";
pub const NO_AGENT: &str = "No agent is available right now. Please call again later. Goodbye!";
pub const INVALID_OPTION: &str = "Invalid option. Goodbye!";
pub const NO_SELECTION: &str = "Sorry, I did not receive a selection.";
pub const DID_NOT_HEAR: &str = "Sorry, I did not catch that.";
pub const SPEECH_PROMPT: &str = "Please say something after the beep.";
pub const NO_SPEECH: &str = "No speech input detected.";
pub const NOT_UNDERSTOOD: &str = "Sorry, I didn't understand that. Please try again.";
pub const APOLOGY: &str = "Sorry, something went wrong on our side. Please try again later.";

const ISSUE_MAX_SECS: u16 = 120;
const DIGIT_TIMEOUT_SECS: u16 = 5;

/// A spoken reply and the markup that delivers it.
pub struct ScriptedReply {
    pub prompt: String,
    pub response: Response,
}

impl ScriptedReply {
    fn new(prompt: impl Into<String>, actions: Vec<ResponseAction>) -> Self {
        Self {
            prompt: prompt.into(),
            response: Response::new(actions),
        }
    }

    /// Whether the markup ends the call.
    pub fn hangs_up(&self) -> bool {
        self.response
            .actions
            .iter()
            .any(|action| matches!(action, ResponseAction::Hangup(_)))
    }

    pub fn into_twiml(self) -> String {
        self.response.to_twiml()
    }
}

/// The step of the account creation branch a speech webhook answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeStep {
    FirstName,
    LastName,
    Email,
}

impl IntakeStep {
    fn question(self) -> &'static str {
        match self {
            IntakeStep::FirstName => ASK_FIRST_NAME,
            IntakeStep::LastName => ASK_LAST_NAME,
            IntakeStep::Email => ASK_EMAIL,
        }
    }

    fn action(self) -> &'static str {
        match self {
            IntakeStep::FirstName => "/process-create-account",
            IntakeStep::LastName => "/process-last-name",
            IntakeStep::Email => "/process-email",
        }
    }

    fn next(self) -> Option<IntakeStep> {
        match self {
            IntakeStep::FirstName => Some(IntakeStep::LastName),
            IntakeStep::LastName => Some(IntakeStep::Email),
            IntakeStep::Email => None,
        }
    }
}

fn say(text: &str) -> SayAction {
    SayAction {
        text: text.to_string(),
        ..Default::default()
    }
}

fn menu_gather() -> ResponseAction {
    ResponseAction::Gather(GatherAction {
        input: Some(GatherInput::Dtmf),
        action: Some("/process-speech".to_string()),
        method: Some("POST".to_string()),
        num_digits: Some(1),
        timeout: Some(DIGIT_TIMEOUT_SECS),
        say: Some(say(MENU_PROMPT)),
        ..Default::default()
    })
}

fn speech_gather(action: &str) -> ResponseAction {
    ResponseAction::Gather(GatherAction {
        input: Some(GatherInput::Speech),
        action: Some(action.to_string()),
        method: Some("POST".to_string()),
        speech_timeout: Some("auto".to_string()),
        ..Default::default()
    })
}

/// Welcome the caller and offer the menu.  If no digit arrives the call loops back to `/voice`.
pub fn greeting(contact_name: Option<&str>) -> ScriptedReply {
    let welcome = match contact_name {
        Some(name) => format!("Welcome back, {name}! I am a Truworths agent."),
        None => WELCOME.to_string(),
    };
    let prompt = format!("{welcome} {MENU_PROMPT}");
    ScriptedReply::new(
        prompt,
        vec![
            ResponseAction::say(welcome),
            menu_gather(),
            ResponseAction::redirect("/voice"),
        ],
    )
}

/// Answer a keypad selection from the main menu.
pub fn select(digits: Option<&str>, agent_number: Option<&str>) -> ScriptedReply {
    match digits.map(str::trim) {
        None | Some("") => ScriptedReply::new(
            format!("{NO_SELECTION} {MENU_PROMPT}"),
            vec![ResponseAction::say(NO_SELECTION), menu_gather()],
        ),
        Some("1") => ask(IntakeStep::FirstName),
        Some("2") => ScriptedReply::new(
            ASK_ISSUE,
            vec![
                ResponseAction::say(ASK_ISSUE),
                ResponseAction::Record(RecordAction {
                    action: Some("/process-issue".to_string()),
                    method: Some("POST".to_string()),
                    max_length: Some(ISSUE_MAX_SECS),
                }),
            ],
        ),
        Some("3") => match agent_number {
            Some(number) => ScriptedReply::new(
                CONNECT_AGENT,
                vec![
                    ResponseAction::say(CONNECT_AGENT),
                    ResponseAction::Dial(DialAction {
                        number: number.to_string(),
                        ..Default::default()
                    }),
                ],
            ),
            None => ScriptedReply::new(
                NO_AGENT,
                vec![ResponseAction::say(NO_AGENT), ResponseAction::hangup()],
            ),
        },
        Some(_) => ScriptedReply::new(
            INVALID_OPTION,
            vec![ResponseAction::say(INVALID_OPTION), ResponseAction::hangup()],
        ),
    }
}

/// Ask the question for `step` and gather the spoken answer.
pub fn ask(step: IntakeStep) -> ScriptedReply {
    let question = step.question();
    ScriptedReply::new(
        question,
        vec![ResponseAction::say(question), speech_gather(step.action())],
    )
}

/// Reply once the caller has answered `step`: either the next question or the closing message.
pub fn after_answer(step: IntakeStep) -> ScriptedReply {
    match step.next() {
        Some(next) => ask(next),
        None => ScriptedReply::new(
            ACCOUNT_DONE,
            vec![ResponseAction::say(ACCOUNT_DONE), ResponseAction::hangup()],
        ),
    }
}

/// Re-ask `step` when Twilio delivered no transcript.
pub fn ask_again(step: IntakeStep) -> ScriptedReply {
    let question = step.question();
    ScriptedReply::new(
        format!("{DID_NOT_HEAR} {question}"),
        vec![
            ResponseAction::say(DID_NOT_HEAR),
            ResponseAction::say(question),
            speech_gather(step.action()),
        ],
    )
}

pub fn issue_logged() -> ScriptedReply {
    ScriptedReply::new(
        ISSUE_LOGGED,
        vec![ResponseAction::say(ISSUE_LOGGED), ResponseAction::hangup()],
    )
}

/// Speak the assistant's answer and keep listening.
pub fn assistant_reply(text: &str) -> ScriptedReply {
    ScriptedReply::new(
        text,
        vec![
            ResponseAction::say(text),
            speech_gather("/twilio-webhook"),
        ],
    )
}

/// Open a free-speech conversation routed to the assistant.
pub fn speech_prompt() -> ScriptedReply {
    ScriptedReply::new(
        SPEECH_PROMPT,
        vec![ResponseAction::Gather(GatherAction {
            input: Some(GatherInput::Speech),
            action: Some("/twilio-webhook".to_string()),
            method: Some("POST".to_string()),
            timeout: Some(DIGIT_TIMEOUT_SECS),
            speech_timeout: Some("auto".to_string()),
            say: Some(say(SPEECH_PROMPT)),
            ..Default::default()
        })],
    )
}

pub fn no_speech() -> ScriptedReply {
    ScriptedReply::new(NO_SPEECH, vec![ResponseAction::say(NO_SPEECH)])
}

pub fn not_understood() -> ScriptedReply {
    ScriptedReply::new(
        NOT_UNDERSTOOD,
        vec![
            ResponseAction::say(NOT_UNDERSTOOD),
            speech_gather("/twilio-webhook"),
        ],
    )
}

/// Generic failure reply; ends the call.
pub fn apology() -> ScriptedReply {
    ScriptedReply::new(
        APOLOGY,
        vec![ResponseAction::say(APOLOGY), ResponseAction::hangup()],
    )
}
