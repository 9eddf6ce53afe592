use thiserror::Error;

/// Reasons a motion request is rejected.
///
/// None of these are fatal: the engine keeps its last good state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MotionError {
    #[error("malformed path: {0}")]
    MalformedPath(String),

    #[error("invalid duration: {0} s")]
    InvalidDuration(f64),

    #[error("invalid control interval: {0} s")]
    InvalidInterval(f64),

    #[error("expected {expected} joint values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("stale regeneration: token {token}, current generation {current}")]
    StaleRegeneration { token: u64, current: u64 },
}

impl MotionError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPath(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, MotionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = MotionError::malformed("unknown joint joint9");
        assert!(err.to_string().contains("joint9"));

        let err = MotionError::StaleRegeneration { token: 3, current: 5 };
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains('5'));

        let err = MotionError::DimensionMismatch { expected: 4, actual: 1 };
        assert_eq!(err.to_string(), "expected 4 joint values, got 1");
    }
}
