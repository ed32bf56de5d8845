//! Middleware errors.

use thiserror::Error;

/// A middleware or handler depends on a capability that is not provided.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency \"{not_found}\" is not found")]
pub struct DependencyError {
    /// The missing capability.
    pub not_found: String,
    /// Capabilities provided at the point of the check.
    pub provided: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = DependencyError {
            not_found: "config".to_string(),
            provided: vec!["request_id".to_string()],
        };
        assert_eq!(err.to_string(), "dependency \"config\" is not found");
    }
}
