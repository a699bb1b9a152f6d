use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stable wire codes shared by hard errors and advisories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Validation,
    Overlap,
    NoSlot,
    UpstreamUnavailable,
    Unauthenticated,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::Overlap => "OVERLAP",
            ErrorCode::NoSlot => "NO_SLOT",
            ErrorCode::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("{0}")]
    Validation(String),
    #[error("Blocks overlap: \"{first}\" overlaps \"{second}\"")]
    Overlap { first: String, second: String },
}

impl PlanError {
    pub fn validation(message: impl Into<String>) -> Self {
        PlanError::Validation(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            PlanError::Validation(_) => ErrorCode::Validation,
            PlanError::Overlap { .. } => ErrorCode::Overlap,
        }
    }
}

/// A recoverable condition reported next to a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub code: ErrorCode,
    pub message: String,
}

impl Advisory {
    pub fn no_slot(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::NoSlot,
            message: message.into(),
        }
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::UpstreamUnavailable,
            message: message.into(),
        }
    }
}
