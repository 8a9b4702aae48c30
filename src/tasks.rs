use crate::persist::save_if_configured;
use crate::types::AppState;

use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::info;

const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Task that closes calls which never received a terminal status callback.
pub async fn reap_stale_calls(app_state: Arc<AppState>) {
    let mut interval = tokio::time::interval(REAP_INTERVAL);
    loop {
        interval.tick().await;
        sweep(&app_state).await;
    }
}

/// One pass of the reaper.  Returns how many calls were closed.
pub async fn sweep(app_state: &AppState) -> usize {
    let closed = app_state
        .registry
        .reap_stale(app_state.config.stale_call_after, OffsetDateTime::now_utc());
    if closed > 0 {
        info!(closed, "closed stale calls");
        save_if_configured(
            app_state.config.snapshot_path.as_deref(),
            app_state.registry.snapshot(),
        )
        .await;
    }
    closed
}
