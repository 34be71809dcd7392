use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::ServiceState;

pub mod liveness;
pub mod readiness;
pub mod version;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/livez", get(liveness::handler))
        .route("/readyz", get(readiness::handler))
        .route("/version", get(version::handler))
        .with_state(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Ok,
    Unavailable,
}

/// Body of the `livez` and `readyz` answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub status: ProbeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Probe {
    pub fn ok() -> Self {
        Self {
            status: ProbeStatus::Ok,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Unavailable,
            reason: Some(reason.into()),
        }
    }
}

impl IntoResponse for Probe {
    fn into_response(self) -> Response {
        let code = match self.status {
            ProbeStatus::Ok => StatusCode::OK,
            ProbeStatus::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        (code, Json(self)).into_response()
    }
}
