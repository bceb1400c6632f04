use axum::{response::IntoResponse, Json};

use super::gateway::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum TicketsError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Decode error: {0}")]
    Decode(String),
}

impl IntoResponse for TicketsError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Gateway(e) => {
                log::error!("Ticket store call failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Store call failed".to_string(),
                )
            }
            Self::Decode(msg) => {
                log::error!("Ticket row could not be decoded: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
