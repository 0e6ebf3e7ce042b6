use std::fmt;

/// Result type for Dyna operations
pub type Result<T> = std::result::Result<T, DynaError>;

/// Main error type for the Dyna planner
#[derive(Debug, Clone, PartialEq)]
pub enum DynaError {
    /// Pop on an empty priority queue
    EmptyQueue,

    /// Malformed or mismatched experience batch
    InvalidBatch {
        reason: String,
    },

    /// Action space the value learner cannot enumerate
    UnsupportedActionSpace(String),

    /// NaN/Inf in a state, reward, prediction or priority
    NumericInstability(String),

    /// Invalid parameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Invalid dimensions for operations
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Action index outside the discrete action space
    InvalidAction {
        action: usize,
        max_actions: usize,
    },

    /// IO errors (checkpoints, config files)
    IoError(String),

    /// Serialization/deserialization errors
    SerializationError(String),
}

impl fmt::Display for DynaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynaError::EmptyQueue => write!(f, "Empty queue: pop called with no pending rollouts"),
            DynaError::InvalidBatch { reason } => write!(f, "Invalid batch: {}", reason),
            DynaError::UnsupportedActionSpace(msg) => write!(f, "Unsupported action space: {}", msg),
            DynaError::NumericInstability(msg) => write!(f, "Numeric instability: {}", msg),
            DynaError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            DynaError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            DynaError::InvalidAction { action, max_actions } => {
                write!(f, "Invalid action {}: must be less than {}", action, max_actions)
            }
            DynaError::IoError(msg) => write!(f, "IO error: {}", msg),
            DynaError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for DynaError {}

impl From<std::io::Error> for DynaError {
    fn from(err: std::io::Error) -> Self {
        DynaError::IoError(err.to_string())
    }
}

impl From<bincode::Error> for DynaError {
    fn from(err: bincode::Error) -> Self {
        DynaError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for DynaError {
    fn from(err: serde_json::Error) -> Self {
        DynaError::SerializationError(err.to_string())
    }
}

// Helper functions for common error patterns
impl DynaError {
    pub fn invalid_batch<S: Into<String>>(reason: S) -> Self {
        DynaError::InvalidBatch {
            reason: reason.into(),
        }
    }

    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        DynaError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        DynaError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            DynaError::InvalidAction { action: 3, max_actions: 2 }.to_string(),
            "Invalid action 3: must be less than 2"
        );
        assert_eq!(
            DynaError::invalid_parameter("gamma", "must be in (0, 1]").to_string(),
            "Invalid parameter 'gamma': must be in (0, 1]"
        );
        assert!(DynaError::EmptyQueue.to_string().starts_with("Empty queue"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DynaError = io.into();
        assert!(matches!(err, DynaError::IoError(_)));
    }
}
