//! Error types for planner-core operations.
//!
//! Transport, application and shape failures are all normalized into
//! [`PlannerError`] before they reach a store; its `Display` output is the
//! human-readable message stores keep in their last-error slot.

use std::path::PathBuf;

use planner_protocol::Endpoint;

/// Classification of non-2xx HTTP statuses, used only to word the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    BadRequest,
    Unauthorized,
    NotFound,
    ServerError,
    BadGateway,
    Unavailable,
    Timeout,
    Unknown,
}

impl StatusKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => StatusKind::BadRequest,
            401 => StatusKind::Unauthorized,
            404 => StatusKind::NotFound,
            500 => StatusKind::ServerError,
            502 => StatusKind::BadGateway,
            503 => StatusKind::Unavailable,
            504 => StatusKind::Timeout,
            _ => StatusKind::Unknown,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            StatusKind::BadRequest => "bad request",
            StatusKind::Unauthorized => "unauthorized",
            StatusKind::NotFound => "not found",
            StatusKind::ServerError => "server error",
            StatusKind::BadGateway => "bad gateway",
            StatusKind::Unavailable => "service unavailable",
            StatusKind::Timeout => "gateway timeout",
            StatusKind::Unknown => "unknown error",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// All errors that can occur in planner-core operations.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    // ─────────────────────────────────────────────────────────────────────
    // Remote call failures
    // ─────────────────────────────────────────────────────────────────────
    #[error("{message}")]
    Transport { message: String },

    #[error("HTTP error! status: {status} ({kind})")]
    Status { status: u16, kind: StatusKind },

    #[error("{0}")]
    Application(String),

    #[error("Unexpected response from {endpoint}: {details}")]
    Shape { endpoint: Endpoint, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Local persistence / configuration
    // ─────────────────────────────────────────────────────────────────────
    #[error("Storage error: {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration file malformed: {path}: {details}")]
    Config { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Local preconditions
    // ─────────────────────────────────────────────────────────────────────
    #[error("Not authenticated")]
    NotAuthenticated,
}

impl PlannerError {
    pub fn transport(message: impl Into<String>) -> Self {
        PlannerError::Transport {
            message: message.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        PlannerError::Status {
            status,
            kind: StatusKind::from_status(status),
        }
    }

    pub fn shape(endpoint: Endpoint, details: impl Into<String>) -> Self {
        PlannerError::Shape {
            endpoint,
            details: details.into(),
        }
    }
}

/// Convenience type alias for Results using PlannerError.
pub type Result<T> = std::result::Result<T, PlannerError>;

impl From<PlannerError> for String {
    fn from(err: PlannerError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_kinds() {
        assert_eq!(StatusKind::from_status(400), StatusKind::BadRequest);
        assert_eq!(StatusKind::from_status(401), StatusKind::Unauthorized);
        assert_eq!(StatusKind::from_status(404), StatusKind::NotFound);
        assert_eq!(StatusKind::from_status(500), StatusKind::ServerError);
        assert_eq!(StatusKind::from_status(502), StatusKind::BadGateway);
        assert_eq!(StatusKind::from_status(503), StatusKind::Unavailable);
        assert_eq!(StatusKind::from_status(504), StatusKind::Timeout);
        assert_eq!(StatusKind::from_status(418), StatusKind::Unknown);
    }

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(
            PlannerError::status(401).to_string(),
            "HTTP error! status: 401 (unauthorized)"
        );
        assert_eq!(
            PlannerError::Application("Username taken".to_string()).to_string(),
            "Username taken"
        );
        assert_eq!(
            PlannerError::shape(Endpoint::GetAllCourses, "expected a list").to_string(),
            "Unexpected response from CourseScheduling/getAllCourses: expected a list"
        );
    }
}
