use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shared::{SpinError, SpinErrorKind};
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Spin(SpinError),
    SessionNotFound,
    SessionExpired,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Spin(e) => write!(f, "{}", e),
            AppError::SessionNotFound => write!(f, "Wheel session not found"),
            AppError::SessionExpired => write!(f, "Wheel session has expired"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<SpinError> for AppError {
    fn from(err: SpinError) -> Self {
        AppError::Spin(err)
    }
}

pub fn status_for(kind: SpinErrorKind) -> StatusCode {
    match kind {
        SpinErrorKind::ConfigurationMissing | SpinErrorKind::InvalidConfiguration => StatusCode::PRECONDITION_FAILED,
        SpinErrorKind::PlayerIdMissing => StatusCode::BAD_REQUEST,
        SpinErrorKind::SpinNotAccepted => StatusCode::CONFLICT,
        SpinErrorKind::NoApplicableRule
        | SpinErrorKind::EmptyRewardPool
        | SpinErrorKind::InvalidSectionCount
        | SpinErrorKind::InvalidSectionIndex => StatusCode::UNPROCESSABLE_ENTITY,
        SpinErrorKind::RuleFetchFailed
        | SpinErrorKind::GrantFetchFailed
        | SpinErrorKind::NoRewardResult
        | SpinErrorKind::EmptyGrantEvents => StatusCode::BAD_GATEWAY,
        SpinErrorKind::UnmatchedGrant => StatusCode::OK,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            AppError::Spin(e) => (status_for(e.kind), e.kind.to_string()),
            AppError::SessionNotFound => (StatusCode::NOT_FOUND, "SessionNotFound".to_string()),
            AppError::SessionExpired => (StatusCode::GONE, "SessionExpired".to_string()),
        };
        let message = match &self {
            AppError::Spin(e) => e.message.clone(),
            other => other.to_string(),
        };

        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ServiceError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(SpinErrorKind::ConfigurationMissing), StatusCode::PRECONDITION_FAILED);
        assert_eq!(status_for(SpinErrorKind::InvalidConfiguration), StatusCode::PRECONDITION_FAILED);
        assert_eq!(status_for(SpinErrorKind::PlayerIdMissing), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(SpinErrorKind::SpinNotAccepted), StatusCode::CONFLICT);
        assert_eq!(status_for(SpinErrorKind::EmptyRewardPool), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(SpinErrorKind::GrantFetchFailed), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_body_names_the_error_kind() {
        let err = AppError::from(SpinError::grant_fetch_failed(&ServiceError::new("0999", "down")));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "GrantFetchFailed");
        assert!(body["message"].as_str().unwrap().contains("0999"));
    }

    #[test]
    fn test_missing_session_is_404() {
        assert_eq!(AppError::SessionNotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::SessionExpired.into_response().status(), StatusCode::GONE);
    }
}
