use crate::error::AppError;
use crate::menu::{self, IntakeStep, ScriptedReply};
use crate::persist::save_if_configured;
use crate::registry::StatusOutcome;
use crate::twilio_types::{CallStatus, StatusCallbackPayload, VoicePayload};
use crate::types::{AppState, CallRecord};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, error, info, trace, warn};

fn parse_form<T: DeserializeOwned>(body: &str) -> Result<T, Response> {
    trace!(body=%body, "webhook body");
    serde_urlencoded::from_str::<T>(body).map_err(|e| {
        error!(error=%e, "failed to deserialize Twilio webhook payload");
        (StatusCode::BAD_REQUEST, "Bad request".to_string()).into_response()
    })
}

fn twiml_response(twiml: String) -> Response {
    trace!("twiml: '{}'", twiml);
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "application/xml".parse().unwrap());
    (StatusCode::OK, headers, twiml).into_response()
}

async fn close_call(app_state: &AppState, call_sid: &str, status: CallStatus) {
    let closed = app_state
        .registry
        .complete_call(call_sid, status, None, OffsetDateTime::now_utc());
    if closed.is_some() {
        save_if_configured(
            app_state.config.snapshot_path.as_deref(),
            app_state.registry.snapshot(),
        )
        .await;
    }
}

/// Make sure the call has a record before a webhook writes to it, and take the call status
/// Twilio reports with the webhook.  Returns true when the record was opened here.  Calls that
/// already closed are never reopened.
fn open_record(app_state: &AppState, payload: &VoicePayload) -> bool {
    let registry = &app_state.registry;
    let now = OffsetDateTime::now_utc();
    let opened = registry.start_call(&payload.call_sid, payload.caller(), now);
    if opened {
        debug!(call_sid = %payload.call_sid, "opened call record");
    }
    if let Some(status) = payload.call_status.filter(|s| !s.is_terminal()) {
        registry.update_status(&payload.call_sid, status, None, now);
    }
    opened
}

/// Record the exchange on the caller's own call record and answer Twilio.  A reply that hangs up
/// closes the call.
async fn reply(
    app_state: &AppState,
    payload: &VoicePayload,
    user_input: &str,
    script: ScriptedReply,
) -> Response {
    let registry = &app_state.registry;
    let late = registry.is_closed(&payload.call_sid);
    let recorded = registry.record_turn(
        &payload.call_sid,
        user_input,
        &script.prompt,
        OffsetDateTime::now_utc(),
    );
    if late {
        debug!(call_sid = %payload.call_sid, "webhook after the call closed");
        if recorded {
            save_if_configured(
                app_state.config.snapshot_path.as_deref(),
                registry.snapshot(),
            )
            .await;
        }
    } else if script.hangs_up() {
        close_call(app_state, &payload.call_sid, CallStatus::Completed).await;
    }
    twiml_response(script.into_twiml())
}

pub async fn voice(State(app_state): State<Arc<AppState>>, body: String) -> Response {
    let payload = match parse_form::<VoicePayload>(&body) {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };
    if open_record(&app_state, &payload) {
        info!(call_sid = %payload.call_sid, caller = %payload.caller(), called = ?payload.to, "incoming call");
        if let Some(name) = lookup_caller_name(&app_state, &payload).await {
            app_state.registry.update_call(&payload.call_sid, |record| {
                record.contact_name = Some(name);
            });
        }
    }
    let contact_name = app_state
        .registry
        .get(&payload.call_sid)
        .and_then(|record| record.contact_name);

    reply(&app_state, &payload, "", menu::greeting(contact_name.as_deref())).await
}

/// Best-effort CRM lookup for the greeting; any failure just means a generic welcome.
async fn lookup_caller_name(app_state: &AppState, payload: &VoicePayload) -> Option<String> {
    let hubspot = app_state.hubspot.as_ref()?;
    let phone = payload.from.as_deref()?;
    match hubspot.find_contact_by_phone(phone).await {
        Ok(contact) => contact.and_then(|c| c.display_name()),
        Err(e) => {
            warn!(error=%e, call_sid = %payload.call_sid, "caller lookup failed");
            None
        }
    }
}

/// Entry point for the free-speech assistant conversation.
pub async fn assistant(State(app_state): State<Arc<AppState>>, body: String) -> Response {
    let payload = match parse_form::<VoicePayload>(&body) {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };
    info!(call_sid = %payload.call_sid, caller = %payload.caller(), "incoming assistant call");
    open_record(&app_state, &payload);
    reply(&app_state, &payload, "", menu::speech_prompt()).await
}

pub async fn process_selection(State(app_state): State<Arc<AppState>>, body: String) -> Response {
    let payload = match parse_form::<VoicePayload>(&body) {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };
    open_record(&app_state, &payload);
    let digits = payload.digits.as_deref();
    info!(call_sid = %payload.call_sid, digits = ?digits, "menu selection");
    let selection = menu::select(digits, app_state.config.agent_phone_number.as_deref());
    reply(&app_state, &payload, digits.unwrap_or_default(), selection).await
}

pub async fn process_first_name(State(app_state): State<Arc<AppState>>, body: String) -> Response {
    intake_answer(&app_state, &body, IntakeStep::FirstName).await
}

pub async fn process_last_name(State(app_state): State<Arc<AppState>>, body: String) -> Response {
    intake_answer(&app_state, &body, IntakeStep::LastName).await
}

pub async fn process_email(State(app_state): State<Arc<AppState>>, body: String) -> Response {
    intake_answer(&app_state, &body, IntakeStep::Email).await
}

async fn intake_answer(app_state: &AppState, body: &str, step: IntakeStep) -> Response {
    let payload = match parse_form::<VoicePayload>(body) {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };
    open_record(app_state, &payload);
    let Some(answer) = payload.speech().map(str::to_string) else {
        debug!(call_sid = %payload.call_sid, ?step, "no speech for intake question");
        return reply(app_state, &payload, "", menu::ask_again(step)).await;
    };
    info!(call_sid = %payload.call_sid, ?step, answer = %answer, "intake answer");

    app_state.registry.update_call(&payload.call_sid, |record| {
        let field = match step {
            IntakeStep::FirstName => &mut record.intake.first_name,
            IntakeStep::LastName => &mut record.intake.last_name,
            IntakeStep::Email => &mut record.intake.email,
        };
        *field = Some(answer.clone());
        if record.intake.is_complete() {
            info!(call_sid = %record.call_sid, intake = ?record.intake, "account details collected");
        }
    });
    reply(app_state, &payload, &answer, menu::after_answer(step)).await
}

pub async fn process_issue(State(app_state): State<Arc<AppState>>, body: String) -> Response {
    let payload = match parse_form::<VoicePayload>(&body) {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };
    open_record(&app_state, &payload);
    let Some(url) = payload.recording_url.clone() else {
        warn!(call_sid = %payload.call_sid, "issue webhook without a recording");
        return reply(&app_state, &payload, "", menu::apology()).await;
    };
    info!(call_sid = %payload.call_sid, recording = %url, "issue recorded");
    app_state.registry.update_call(&payload.call_sid, |record| {
        record.issue_recording_url = Some(url.clone());
    });
    reply(&app_state, &payload, &url, menu::issue_logged()).await
}

/// Forward the caller's transcript to Watson Assistant and speak its answer.
pub async fn speech_webhook(State(app_state): State<Arc<AppState>>, body: String) -> Response {
    let payload = match parse_form::<VoicePayload>(&body) {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };
    open_record(&app_state, &payload);
    let Some(transcript) = payload.speech().map(str::to_string) else {
        return reply(&app_state, &payload, "", menu::no_speech()).await;
    };
    let answer = match &app_state.watson {
        Some(watson) => watson.message(&transcript).await,
        None => Err(AppError::NotConfigured("Watson Assistant")),
    };
    let script = match answer {
        Ok(text) => menu::assistant_reply(&text),
        Err(e @ AppError::NotConfigured(_)) => {
            error!(error=%e, call_sid = %payload.call_sid, "cannot answer speech");
            menu::apology()
        }
        Err(e) => {
            error!(error=%e, call_sid = %payload.call_sid, "error processing transcription");
            menu::not_understood()
        }
    };
    reply(&app_state, &payload, &transcript, script).await
}

/// Twilio status callback.  Unknown calls are acknowledged and ignored.
pub async fn status_callback(State(app_state): State<Arc<AppState>>, body: String) -> Response {
    let payload = match parse_form::<StatusCallbackPayload>(&body) {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };
    let outcome = app_state.registry.update_status(
        &payload.call_sid,
        payload.call_status,
        payload.call_duration,
        OffsetDateTime::now_utc(),
    );
    match outcome {
        StatusOutcome::Unknown => {
            debug!(call_sid = %payload.call_sid, status = %payload.call_status, "status for unknown call")
        }
        StatusOutcome::Updated => {
            debug!(call_sid = %payload.call_sid, status = %payload.call_status, "call status updated")
        }
        StatusOutcome::Completed | StatusOutcome::Amended => {
            save_if_configured(
                app_state.config.snapshot_path.as_deref(),
                app_state.registry.snapshot(),
            )
            .await
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
pub struct ContactQuery {
    phone: Option<String>,
}

pub async fn crm_contact(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ContactQuery>,
) -> Result<Response, AppError> {
    let hubspot = app_state
        .hubspot
        .as_ref()
        .ok_or(AppError::NotConfigured("HubSpot"))?;
    let phone = query
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or(AppError::BadRequest("missing phone"))?;

    match hubspot.find_contact_by_phone(phone).await? {
        Some(contact) => Ok(Json(contact).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No contact found" })),
        )
            .into_response()),
    }
}

#[derive(Deserialize)]
pub struct SummaryQuery {
    account: Option<String>,
}

pub async fn fetch_summary(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> Result<Response, AppError> {
    let summary = app_state
        .summary
        .as_ref()
        .ok_or(AppError::NotConfigured("summary webhook"))?;
    let account = query
        .account
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or(AppError::BadRequest("missing account"))?;
    info!(account, "fetching account summary");

    match summary.fetch(account).await {
        Ok(data) => Ok(Json(data).into_response()),
        Err(e) => {
            warn!(error=%e, account, "account summary failed");
            Ok((
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "No data found", "details": e.to_string() })),
            )
                .into_response())
        }
    }
}

pub async fn export_calls(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.registry.snapshot())
}

pub async fn export_transcript(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        "text/plain; charset=utf-8".parse().unwrap(),
    );
    (headers, app_state.registry.snapshot().to_transcript())
}

pub async fn current_call(
    State(app_state): State<Arc<AppState>>,
    axum::extract::Path(call_sid): axum::extract::Path<String>,
) -> Result<Json<CallRecord>, StatusCode> {
    app_state
        .registry
        .get(&call_sid)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
