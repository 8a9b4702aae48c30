mod assistant;
mod config;
mod crm;
mod error;
mod handlers;
mod menu;
mod persist;
mod registry;
mod summary;
mod tasks;
#[cfg(test)]
mod testing;
mod twilio_types;
mod types;

use crate::config::Config;
use crate::types::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

pub fn app(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Call menu
        .route("/voice", post(handlers::voice))
        .route("/process-speech", post(handlers::process_selection))
        .route("/process-create-account", post(handlers::process_first_name))
        .route("/process-last-name", post(handlers::process_last_name))
        .route("/process-email", post(handlers::process_email))
        .route("/process-issue", post(handlers::process_issue))
        // Free speech conversation with the assistant
        .route("/assistant", post(handlers::assistant))
        .route("/twilio-webhook", post(handlers::speech_webhook))
        .route("/status", post(handlers::status_callback))
        .route("/crm/contact", get(handlers::crm_contact))
        .route("/fetch-summary", get(handlers::fetch_summary))
        .route("/calls", get(handlers::export_calls))
        .route("/calls/transcript", get(handlers::export_transcript))
        .route("/calls/:call_sid", get(handlers::current_call))
        .route("/", get(|| async { "Call bot is running." }))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            ("tower_http", tracing_subscriber::filter::LevelFilter::DEBUG),
            ("twilio_callbot", tracing_subscriber::filter::LevelFilter::DEBUG),
        ]));
    tracing::subscriber::set_global_default(subscriber).expect("failed to install subscriber");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error=%e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let http_client = match reqwest::Client::builder()
        .timeout(config.outbound_timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            error!(error=%e, "failed to build http client");
            std::process::exit(1);
        }
    };

    let app_state = Arc::new(AppState::new(config, http_client));
    if let Some(path) = &app_state.config.snapshot_path {
        match persist::load_snapshot(path).await {
            Ok(Some(snapshot)) => {
                info!(
                    current = snapshot.current.len(),
                    past = snapshot.past.len(),
                    "restored call snapshot"
                );
                app_state.registry.restore(snapshot);
            }
            Ok(None) => info!(path = %path.display(), "no call snapshot yet"),
            Err(e) => error!(error=%e, path = %path.display(), "ignoring unreadable call snapshot"),
        }
    }
    tokio::spawn(tasks::reap_stale_calls(app_state.clone()));

    let addr = app_state.config.bind_addr;
    info!(%addr, "listening");
    if let Err(e) = axum::Server::bind(&addr)
        .serve(app(app_state).into_make_service())
        .await
    {
        error!(error=%e, "server error");
    }
}
