//! The canonical, immutable description of a Kafka cluster
//!
//! A [`KafkaCluster`] is built either from the cluster ConfigMap (desired
//! state, see [`crate::config`]) or from a live StatefulSet (current state, see
//! [`crate::reconstruct`]). Both paths produce the same value type, which the
//! resource builders and the diff engine consume.

use crate::build_integration::BuildIntegrationConfig;
use crate::identity::ClusterIdentity;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::ValidationError;

/// Probe initial delay used when the cluster ConfigMap does not set one
pub const DEFAULT_HEALTHCHECK_DELAY: i32 = 15;

/// Probe timeout used when the cluster ConfigMap does not set one
pub const DEFAULT_HEALTHCHECK_TIMEOUT: i32 = 5;

/// Regex for validating Kubernetes resource quantities (e.g., "10Gi", "100Mi")
static QUANTITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?(Ki|Mi|Gi|Ti|Pi|Ei|k|M|G|T|P|E)?$").unwrap());

/// Timing shared by the liveness and readiness probes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheck {
    pub initial_delay_seconds: i32,
    pub timeout_seconds: i32,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            initial_delay_seconds: DEFAULT_HEALTHCHECK_DELAY,
            timeout_seconds: DEFAULT_HEALTHCHECK_TIMEOUT,
        }
    }
}

/// Metrics configuration as far as it is known
///
/// The content is never parsed. It is compared by value and republished
/// verbatim in the metrics ConfigMap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsConfig {
    /// No metrics configuration is declared
    Disabled,
    /// Metrics configuration content
    Enabled(String),
    /// Not recoverable from the resource the model was built from
    Unknown,
}

impl MetricsConfig {
    pub fn content(&self) -> Option<&str> {
        match self {
            MetricsConfig::Enabled(content) => Some(content),
            MetricsConfig::Disabled | MetricsConfig::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, MetricsConfig::Unknown)
    }
}

/// Broker data storage
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Storage {
    /// Data lives in an emptyDir and is lost with the pod
    #[default]
    Ephemeral,
    /// Data lives in one persistent volume claim per broker
    PersistentClaim {
        size: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
    },
}

/// Validate a storage block
pub(crate) fn validate_storage(storage: &Storage) -> Result<(), ValidationError> {
    match storage {
        Storage::Ephemeral => Ok(()),
        Storage::PersistentClaim { size, class } => {
            if !QUANTITY_REGEX.is_match(size) {
                return Err(ValidationError::new("invalid_quantity").with_message(
                    format!("'{}' is not a valid Kubernetes quantity", size).into(),
                ));
            }
            if class.as_deref() == Some("") {
                return Err(ValidationError::new("invalid_storage_class")
                    .with_message("storage class must not be empty when set".into()));
            }
            Ok(())
        }
    }
}

/// A Kafka cluster's declared configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaCluster {
    identity: ClusterIdentity,
    replicas: i32,
    image: String,
    health_check: HealthCheck,
    readiness_check: HealthCheck,
    metrics: MetricsConfig,
    storage: Storage,
    build_integration: Option<BuildIntegrationConfig>,
}

impl KafkaCluster {
    /// Assemble a model from already validated parts
    pub(crate) fn from_parts(
        identity: ClusterIdentity,
        replicas: i32,
        image: String,
        health_check: HealthCheck,
        metrics: MetricsConfig,
        storage: Storage,
        build_integration: Option<BuildIntegrationConfig>,
    ) -> Self {
        Self {
            identity,
            replicas,
            image,
            health_check,
            readiness_check: health_check,
            metrics,
            storage,
            build_integration,
        }
    }

    pub fn identity(&self) -> &ClusterIdentity {
        &self.identity
    }

    pub fn namespace(&self) -> &str {
        self.identity.namespace()
    }

    pub fn cluster_name(&self) -> &str {
        self.identity.cluster_name()
    }

    pub fn replicas(&self) -> i32 {
        self.replicas
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    /// Liveness probe timing, and the timing of both probes as declared
    pub fn health_check(&self) -> HealthCheck {
        self.health_check
    }

    /// Readiness probe timing
    ///
    /// Always equal to [`health_check`](Self::health_check) on a declared
    /// cluster. Only a cluster read back from a drifted StatefulSet can
    /// carry a different value.
    pub fn readiness_check(&self) -> HealthCheck {
        self.readiness_check
    }

    pub fn metrics(&self) -> &MetricsConfig {
        &self.metrics
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn build_integration(&self) -> Option<&BuildIntegrationConfig> {
        self.build_integration.as_ref()
    }

    /// The same cluster with its metrics state replaced
    pub fn with_metrics(self, metrics: MetricsConfig) -> Self {
        Self { metrics, ..self }
    }

    pub(crate) fn with_readiness_check(self, readiness_check: HealthCheck) -> Self {
        Self {
            readiness_check,
            ..self
        }
    }
}
