use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::error::SessionError;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl From<SessionError> for WebError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Closed(id) => WebError::SessionNotFound(id),
            SessionError::ManagerUnavailable(msg) => WebError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            WebError::SessionNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Session {} not found", id))
            }
            WebError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T, E = WebError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_session_maps_to_not_found() {
        let id = Uuid::new_v4();
        let response = WebError::from(SessionError::Closed(id)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            WebError::from(SessionError::ManagerUnavailable("gone".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
