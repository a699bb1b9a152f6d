use crate::domain::error::{ErrorCode, PlanError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("calendar error: {0}")]
    Calendar(String),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl InfraError {
    pub fn code(&self) -> ErrorCode {
        match self {
            InfraError::Plan(error) => error.code(),
            InfraError::Calendar(_) => ErrorCode::UpstreamUnavailable,
            InfraError::Io(_)
            | InfraError::Json(_)
            | InfraError::Sqlite(_)
            | InfraError::InvalidConfig(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_errors_keep_their_wire_code_and_message() {
        let error = InfraError::from(PlanError::Overlap {
            first: "A".to_string(),
            second: "B".to_string(),
        });
        assert_eq!(error.code(), ErrorCode::Overlap);
        assert_eq!(error.to_string(), "Blocks overlap: \"A\" overlaps \"B\"");
    }

    #[test]
    fn calendar_failures_map_to_upstream_unavailable() {
        let error = InfraError::Calendar("network error: connection refused".to_string());
        assert_eq!(error.code(), ErrorCode::UpstreamUnavailable);
        assert_eq!(
            InfraError::InvalidConfig("bad".to_string()).code(),
            ErrorCode::Internal
        );
    }
}
