//! Desired state: parsing the cluster ConfigMap
//!
//! A Kafka cluster is declared as a ConfigMap labelled
//! `kafka-operator.io/kind=cluster` and `kafka-operator.io/type=kafka`. The
//! ConfigMap name is the cluster name; the data keys below carry the settings.
//!
//! ```yaml
//! apiVersion: v1
//! kind: ConfigMap
//! metadata:
//!   name: my-cluster
//!   labels:
//!     kafka-operator.io/kind: cluster
//!     kafka-operator.io/type: kafka
//! data:
//!   kafka-nodes: "3"
//!   kafka-image: "kafka:3.7"
//!   kafka-healthcheck-delay: "15"
//!   kafka-healthcheck-timeout: "5"
//!   kafka-storage: '{"type":"persistent-claim","size":"10Gi"}'
//!   kafka-metrics-config: |
//!     {"lowercaseOutputName": true}
//! ```

use crate::build_integration::{validate_image_reference, BuildIntegrationConfig};
use crate::error::{OperatorError, Result};
use crate::identity::{validate_cluster_name, ClusterIdentity};
use crate::model::{
    validate_storage, HealthCheck, KafkaCluster, MetricsConfig, Storage,
    DEFAULT_HEALTHCHECK_DELAY, DEFAULT_HEALTHCHECK_TIMEOUT,
};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::debug;
use validator::Validate;

/// Number of brokers
pub const KEY_NODES: &str = "kafka-nodes";
/// Broker container image
pub const KEY_IMAGE: &str = "kafka-image";
/// Probe initial delay in seconds
pub const KEY_HEALTHCHECK_DELAY: &str = "kafka-healthcheck-delay";
/// Probe timeout in seconds
pub const KEY_HEALTHCHECK_TIMEOUT: &str = "kafka-healthcheck-timeout";
/// Opaque metrics configuration
pub const KEY_METRICS_CONFIG: &str = "kafka-metrics-config";
/// JSON storage block
pub const KEY_STORAGE: &str = "kafka-storage";
/// JSON build-integration block
pub const KEY_BUILD_INTEGRATION: &str = "kafka-build-integration";

const FIELD_NAME: &str = "metadata.name";

/// Parsed values awaiting validation
#[derive(Debug, Validate)]
struct ClusterSettings {
    #[validate(custom(function = "validate_cluster_name"))]
    name: String,

    #[validate(range(min = 1, message = "must be at least 1"))]
    replicas: i32,

    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    #[validate(custom(function = "validate_image_reference"))]
    image: String,

    #[validate(range(min = 0, message = "must not be negative"))]
    healthcheck_delay: i32,

    #[validate(range(min = 0, message = "must not be negative"))]
    healthcheck_timeout: i32,

    #[validate(custom(function = "validate_storage"))]
    storage: Storage,
}

/// Map a settings field back to the ConfigMap key it was read from
fn key_for_field(field: &str) -> &str {
    match field {
        "name" => FIELD_NAME,
        "replicas" => KEY_NODES,
        "image" => KEY_IMAGE,
        "healthcheck_delay" => KEY_HEALTHCHECK_DELAY,
        "healthcheck_timeout" => KEY_HEALTHCHECK_TIMEOUT,
        "storage" => KEY_STORAGE,
        other => other,
    }
}

/// Flatten validator errors into a configuration error naming the offending keys
fn validation_error(errors: &validator::ValidationErrors) -> OperatorError {
    let mut failures: Vec<(String, String)> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            let key = key_for_field(field).to_string();
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                (key.clone(), message)
            })
        })
        .collect();
    failures.sort();

    let fields: Vec<&str> = failures.iter().map(|(key, _)| key.as_str()).collect();
    let messages: Vec<String> = failures
        .iter()
        .map(|(key, message)| format!("{}: {}", key, message))
        .collect();
    OperatorError::config(fields.join(", "), messages.join("; "))
}

fn required<'a>(data: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
    data.get(key)
        .map(String::as_str)
        .ok_or_else(|| OperatorError::config(key, "required field is missing"))
}

fn parse_int(key: &str, value: &str) -> Result<i32> {
    value
        .trim()
        .parse::<i32>()
        .map_err(|e| OperatorError::config(key, format!("'{}' is not an integer: {}", value, e)))
}

fn optional_int(data: &BTreeMap<String, String>, key: &str, default: i32) -> Result<i32> {
    data.get(key)
        .map(|value| parse_int(key, value))
        .unwrap_or(Ok(default))
}

fn optional_json<T: DeserializeOwned>(data: &BTreeMap<String, String>, key: &str) -> Result<Option<T>> {
    data.get(key)
        .map(|value| {
            serde_json::from_str(value)
                .map_err(|e| OperatorError::config(key, format!("invalid JSON: {}", e)))
        })
        .transpose()
}

impl KafkaCluster {
    /// Build the desired cluster state from a cluster ConfigMap
    pub fn from_config_map(cm: &ConfigMap) -> Result<Self> {
        let name = cm
            .metadata
            .name
            .clone()
            .ok_or_else(|| OperatorError::config(FIELD_NAME, "cluster ConfigMap has no name"))?;
        let namespace = cm.namespace().unwrap_or_else(|| "default".to_string());

        let empty = BTreeMap::new();
        let data = cm.data.as_ref().unwrap_or(&empty);

        let settings = ClusterSettings {
            name,
            replicas: parse_int(KEY_NODES, required(data, KEY_NODES)?)?,
            image: required(data, KEY_IMAGE)?.to_string(),
            healthcheck_delay: optional_int(data, KEY_HEALTHCHECK_DELAY, DEFAULT_HEALTHCHECK_DELAY)?,
            healthcheck_timeout: optional_int(
                data,
                KEY_HEALTHCHECK_TIMEOUT,
                DEFAULT_HEALTHCHECK_TIMEOUT,
            )?,
            storage: optional_json(data, KEY_STORAGE)?.unwrap_or_default(),
        };
        settings.validate().map_err(|e| validation_error(&e))?;

        let build_integration: Option<BuildIntegrationConfig> =
            optional_json(data, KEY_BUILD_INTEGRATION)?;
        if let Some(ref build) = build_integration {
            build.validate().map_err(|e| {
                OperatorError::config(KEY_BUILD_INTEGRATION, e.to_string().replace('\n', "; "))
            })?;
        }

        let metrics = match data.get(KEY_METRICS_CONFIG) {
            Some(content) => MetricsConfig::Enabled(content.clone()),
            None => MetricsConfig::Disabled,
        };

        let identity = ClusterIdentity::new(namespace, settings.name);

        debug!(
            cluster = %identity,
            replicas = settings.replicas,
            image = %settings.image,
            metrics = metrics.content().is_some(),
            build_integration = build_integration.is_some(),
            "Parsed cluster ConfigMap"
        );

        Ok(KafkaCluster::from_parts(
            identity,
            settings.replicas,
            settings.image,
            HealthCheck {
                initial_delay_seconds: settings.healthcheck_delay,
                timeout_seconds: settings.healthcheck_timeout,
            },
            metrics,
            settings.storage,
            build_integration,
        ))
    }
}
