use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors from a call to the text-generation backend.
/// Classifies errors as fatal (don't retry) or retryable.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GenerationError {
    // Fatal, never retried
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    // Retryable
    #[error("backend error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("parse error: {0}")]
    Parse(String),

    // Terminal, after the retry budget is spent
    #[error("generation failed after {attempts} attempts: {last_error}")]
    GenerationFailed { attempts: u32, last_error: String },
}

impl GenerationError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::GenerationFailed { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Network(_) | Self::Timeout(_) | Self::Parse(_)
        )
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Http { .. } => "http_error",
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::Parse(_) => "parse_error",
            Self::GenerationFailed { .. } => "generation_failed",
        }
    }

    /// Classify a non-success HTTP status from the backend.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::BackendUnavailable(format!("credential rejected ({status}): {body}")),
            _ => Self::Http { status, body },
        }
    }
}

/// One failed validation rule on caller input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Pipeline-level error taxonomy surfaced at the service boundary.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {}", format_fields(.0))]
    InvalidInput(Vec<FieldError>),

    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("{gate} compliance failed: {}", .violations.join(", "))]
    ComplianceViolation {
        gate: String,
        violations: Vec<String>,
    },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("{0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable machine-readable classification.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::RateLimited { .. } => "rate_limited",
            Self::ComplianceViolation { .. } => "compliance_violation",
            Self::Generation(e) => e.error_kind(),
            Self::Internal(_) => "internal",
        }
    }

    pub fn violations(&self) -> &[String] {
        match self {
            Self::ComplianceViolation { violations, .. } => violations,
            _ => &[],
        }
    }
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(GenerationError::Http { status: 500, body: "err".into() }.is_retryable());
        assert!(GenerationError::Network("tcp".into()).is_retryable());
        assert!(GenerationError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(GenerationError::Parse("no json".into()).is_retryable());
    }

    #[test]
    fn fatal_classification() {
        let unavailable = GenerationError::BackendUnavailable("no key".into());
        assert!(unavailable.is_fatal());
        assert!(!unavailable.is_retryable());

        let exhausted = GenerationError::GenerationFailed {
            attempts: 3,
            last_error: "boom".into(),
        };
        assert!(exhausted.is_fatal());
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn from_status_mapping() {
        assert!(GenerationError::from_status(401, "unauthorized".into()).is_fatal());
        assert!(GenerationError::from_status(403, "forbidden".into()).is_fatal());
        assert!(GenerationError::from_status(429, "slow down".into()).is_retryable());
        assert!(GenerationError::from_status(529, "overloaded".into()).is_retryable());
        assert!(GenerationError::from_status(500, "internal".into()).is_retryable());
    }

    #[test]
    fn pipeline_error_kinds() {
        assert_eq!(PipelineError::InvalidInput(vec![]).error_kind(), "invalid_input");
        assert_eq!(
            PipelineError::RateLimited { retry_after: Duration::from_secs(1) }.error_kind(),
            "rate_limited"
        );
        let generation: PipelineError = GenerationError::Parse("x".into()).into();
        assert_eq!(generation.error_kind(), "parse_error");
    }

    #[test]
    fn compliance_violation_message_lists_rules() {
        let err = PipelineError::ComplianceViolation {
            gate: "Landing".into(),
            violations: vec!["TCPA compliance issue".into(), "Required disclaimers missing".into()],
        };
        assert_eq!(
            err.to_string(),
            "Landing compliance failed: TCPA compliance issue, Required disclaimers missing"
        );
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn invalid_input_message_lists_fields() {
        let err = PipelineError::InvalidInput(vec![
            FieldError::new("keyword", "Required"),
            FieldError::new("jurisdiction", "too short"),
        ]);
        assert_eq!(err.to_string(), "invalid input: keyword: Required; jurisdiction: too short");
    }
}
