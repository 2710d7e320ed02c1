use thiserror::Error;

/// Main error type for HyperGrid sweeps
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid parameter space: {0}")]
    InvalidSpace(#[from] SpaceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No eligible trial: no succeeded trial logged metric '{metric}'")]
    NoEligibleTrial { metric: String },

    #[error("Duplicate result for trial {trial_index}")]
    DuplicateResult { trial_index: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Parameter-space validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpaceError {
    #[error("parameter name must not be empty")]
    EmptyName,

    #[error("duplicate parameter name: {name}")]
    DuplicateName { name: String },

    #[error("parameter {name} has an empty domain")]
    EmptyDomain { name: String },

    #[error("parameter {name} has an inverted range: low {low} > high {high}")]
    InvalidRange { name: String, low: i64, high: i64 },

    #[error("grid size overflows usize")]
    GridOverflow,
}

/// Per-trial failures. These never abort a sweep; they are rendered into
/// `TrialResult::error`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrialError {
    #[error("{message}")]
    Failed { message: String },

    #[error("timeout")]
    Timeout,

    #[error("panicked: {message}")]
    Panicked { message: String },
}

/// Result type alias for HyperGrid operations
pub type SweepResult<T> = Result<T, SweepError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::SweepError::Config(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::SweepError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SpaceError::DuplicateName {
            name: "--regularization".to_string(),
        };
        assert!(error.to_string().contains("duplicate"));
        assert!(error.to_string().contains("--regularization"));

        let error = SweepError::NoEligibleTrial {
            metric: "AUC".to_string(),
        };
        assert!(error.to_string().contains("AUC"));
    }

    #[test]
    fn test_error_conversion() {
        let space_error = SpaceError::EmptyDomain {
            name: "lr".to_string(),
        };
        let sweep_error: SweepError = space_error.into();

        match sweep_error {
            SweepError::InvalidSpace(SpaceError::EmptyDomain { .. }) => (),
            other => panic!("Expected InvalidSpace error, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_renders_plainly() {
        assert_eq!(TrialError::Timeout.to_string(), "timeout");
        let panicked = TrialError::Panicked {
            message: "boom".into(),
        };
        assert_eq!(panicked.to_string(), "panicked: boom");
    }

    #[test]
    fn test_macros() {
        let config_err = config_error!("max_concurrent must be positive, got {}", 0);
        assert!(matches!(config_err, SweepError::Config(_)));
        let internal_err = internal_error!("coordinator lost trial {}", 3);
        assert!(internal_err.to_string().contains("trial 3"));
    }
}
