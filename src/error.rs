use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not authorized")]
    NotAuthorized,
    #[error("Section not found")]
    SectionNotFound,
    #[error("Vote not found")]
    VoteNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Notification not found")]
    NotificationNotFound,
    #[error("This vote is no longer active")]
    VoteNotActive,
    #[error("You have already voted")]
    AlreadyVoted,
    #[error("Invalid option")]
    InvalidOption,
    #[error("You are not enrolled in this section")]
    NotEnrolled,
    #[error("No students enrolled in this section")]
    EmptySection,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::NotAuthorized | ServiceError::NotEnrolled => StatusCode::FORBIDDEN,
            ServiceError::SectionNotFound
            | ServiceError::VoteNotFound
            | ServiceError::UserNotFound
            | ServiceError::NotificationNotFound => StatusCode::NOT_FOUND,
            ServiceError::VoteNotActive
            | ServiceError::InvalidOption
            | ServiceError::EmptySection
            | ServiceError::Conflict(_)
            | ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::AlreadyVoted => StatusCode::CONFLICT,
            ServiceError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Schedule conflicts carry an error_type so the client can explain the
        // specific student/date clash instead of showing a generic failure.
        let body = match &self {
            ServiceError::Conflict(_) => Json(json!({
                "status": "error",
                "message": self.to_string(),
                "error_type": "quiz_conflict"
            })),
            _ => Json(json!({
                "status": "error",
                "message": self.to_string()
            })),
        };

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        ServiceError::DatabaseError(error.to_string())
    }
}

/// True when the error is a Postgres unique-constraint violation. Used to
/// turn a concurrent duplicate ballot into `AlreadyVoted` instead of a 500.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
