//! Fakes for the HTTP services the bot talks to.

use axum::{
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::TcpListener;

/// Serve `router` on an ephemeral local port and return its base url.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(router.into_make_service());
    tokio::spawn(server);
    format!("http://{addr}")
}

/// HubSpot search that knows a single contact, +27821234567.
pub fn fake_hubspot() -> Router {
    Router::new().route(
        "/crm/v3/objects/contacts/search",
        post(|Json(body): Json<Value>| async move {
            let phone = body["filterGroups"][0]["filters"][0]["value"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            if phone == "+27821234567" {
                Json(json!({
                    "total": 1,
                    "results": [{
                        "id": "501",
                        "properties": {
                            "firstname": "Thandi",
                            "lastname": "Nkosi",
                            "phone": "+27821234567",
                            "balance": "1250.00",
                            "delinquent": "true",
                            "hs_object_id": "501"
                        }
                    }]
                }))
            } else {
                Json(json!({ "total": 0, "results": [] }))
            }
        }),
    )
}

/// Watson Assistant that echoes the caller, except for "break", which fails.
pub fn fake_watson() -> Router {
    Router::new().route(
        "/message",
        post(|Json(body): Json<Value>| async move {
            let text = body["input"]["text"].as_str().unwrap_or_default().to_string();
            if text == "break" {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            Json(json!({ "output": { "text": [format!("You said {text}")] } })).into_response()
        }),
    )
}

/// Summary webhook that only knows account ACC-77.
pub fn fake_summary() -> Router {
    Router::new().route(
        "/summary",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            match params.get("account").map(String::as_str) {
                Some("ACC-77") => Json(json!({ "account": "ACC-77", "balance": "310.50" }))
                    .into_response(),
                _ => StatusCode::NOT_FOUND.into_response(),
            }
        }),
    )
}
