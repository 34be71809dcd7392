use axum::extract::State;

use super::Probe;
use crate::ServiceState;

/// Ready once the database answers. The content source is not probed: a
/// remote outage only means stale content, which is still servable.
pub async fn handler(State(state): State<ServiceState>) -> Probe {
    match state.database().ping().await {
        Ok(()) => Probe::ok(),
        Err(e) => {
            tracing::warn!("readiness check failed: {}", e);
            Probe::unavailable(e.to_string())
        }
    }
}
