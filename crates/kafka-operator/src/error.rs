//! Error types for the Kafka cluster reconciliation core

use thiserror::Error;

/// Errors that can occur while building or reading back cluster state
#[derive(Error, Debug)]
pub enum OperatorError {
    /// The cluster ConfigMap is missing a required field or carries an invalid value
    #[error("Invalid cluster configuration: {field}: {message}")]
    Configuration { field: String, message: String },

    /// A live resource does not have the shape this operator generates
    #[error("Cannot reconstruct cluster from {resource}: {message}")]
    Reconstruction { resource: String, message: String },

    /// JSON error in an embedded configuration block
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    pub(crate) fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        OperatorError::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn reconstruction(resource: impl Into<String>, message: impl Into<String>) -> Self {
        OperatorError::Reconstruction {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Whether the live resource is unusable and should be recreated from the
    /// desired state rather than diffed
    pub fn requires_recreate(&self) -> bool {
        matches!(self, OperatorError::Reconstruction { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OperatorError::Reconstruction {
            resource: "StatefulSet/test/foo-kafka".to_string(),
            message: "no kafka container".to_string(),
        };
        assert!(err.to_string().contains("StatefulSet/test/foo-kafka"));
        assert!(err.to_string().contains("no kafka container"));

        let err = OperatorError::config("kafka-nodes", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid cluster configuration: kafka-nodes: must be at least 1"
        );
    }

    #[test]
    fn test_requires_recreate() {
        assert!(OperatorError::reconstruction("StatefulSet/a", "b").requires_recreate());
        assert!(!OperatorError::config("kafka-image", "empty").requires_recreate());
    }
}
