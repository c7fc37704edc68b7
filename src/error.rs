use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Error taxonomy for the HTTP surface. Validation errors are rejected before
/// any write; storage failures inside a transaction roll the whole write back.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Map a database unique violation buried in an `anyhow` chain to a
    /// conflict; anything else stays internal. Check-then-insert paths race
    /// with concurrent writers, so the constraint is the real arbiter.
    pub fn conflict_on_unique(err: anyhow::Error, msg: &str) -> Self {
        if let Some(sqlx::Error::Database(db)) = err.downcast_ref::<sqlx::Error>() {
            if db.is_unique_violation() {
                return Self::Conflict(msg.to_string());
            }
        }
        Self::Internal(err)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound("resource"),
            other => Self::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            Self::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            Self::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_404() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn validation_keeps_message() {
        let err = ApiError::validation("bad date");
        assert_eq!(err.to_string(), "bad date");
    }

    #[derive(Debug)]
    struct StubDbError(sqlx::error::ErrorKind);

    impl std::fmt::Display for StubDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "duplicate key value violates unique constraint")
        }
    }

    impl std::error::Error for StubDbError {}

    impl sqlx::error::DatabaseError for StubDbError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            match self.0 {
                sqlx::error::ErrorKind::UniqueViolation => sqlx::error::ErrorKind::UniqueViolation,
                _ => sqlx::error::ErrorKind::Other,
            }
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let db_err = sqlx::Error::Database(Box::new(StubDbError(
            sqlx::error::ErrorKind::UniqueViolation,
        )));
        let err = ApiError::conflict_on_unique(db_err.into(), "Username already taken");
        match err {
            ApiError::Conflict(msg) => assert_eq!(msg, "Username already taken"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let db_err = sqlx::Error::Database(Box::new(StubDbError(sqlx::error::ErrorKind::Other)));
        let err = ApiError::conflict_on_unique(db_err.into(), "Username already taken");
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn non_database_errors_stay_internal() {
        let err = ApiError::conflict_on_unique(anyhow::anyhow!("pool timed out"), "taken");
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
