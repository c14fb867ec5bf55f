//! Cluster identity, derived resource names and the label schema
//!
//! Every resource the operator generates for a cluster is named after the
//! cluster and carries the same three labels. The helpers here are shared by
//! the parser, the reconstructor and the resource builders so that names and
//! selectors never drift apart.

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use validator::ValidationError;

/// Label carrying the cluster name
pub const LABEL_CLUSTER: &str = "kafka-operator.io/cluster";

/// Label carrying the kind marker
pub const LABEL_KIND: &str = "kafka-operator.io/kind";

/// Label carrying the resource's own derived name
pub const LABEL_NAME: &str = "kafka-operator.io/name";

/// Label marking the cluster type on a cluster ConfigMap
pub const LABEL_TYPE: &str = "kafka-operator.io/type";

/// Kind marker on generated resources
pub const KIND_KAFKA_CLUSTER: &str = "kafka-cluster";

/// Kind marker on cluster ConfigMaps
pub const CONFIG_MAP_KIND: &str = "cluster";

/// Type marker on cluster ConfigMaps
pub const CONFIG_MAP_TYPE: &str = "kafka";

const PRIMARY_SUFFIX: &str = "-kafka";
const HEADLESS_SUFFIX: &str = "-headless";
const METRICS_CONFIG_SUFFIX: &str = "-metrics-config";

/// Longest cluster name whose headless service name still fits in a DNS label
pub const MAX_CLUSTER_NAME_LEN: usize = 63 - PRIMARY_SUFFIX.len() - HEADLESS_SUFFIX.len();

/// Regex for validating Kubernetes names (RFC 1123 label)
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

/// Name of the StatefulSet and client service for a cluster
pub fn primary_name(cluster_name: &str) -> String {
    format!("{}{}", cluster_name, PRIMARY_SUFFIX)
}

/// Name of the headless service used for pod-to-pod DNS
pub fn headless_name(cluster_name: &str) -> String {
    format!("{}{}", primary_name(cluster_name), HEADLESS_SUFFIX)
}

/// Name of the ConfigMap carrying the metrics configuration
pub fn metrics_config_name(cluster_name: &str) -> String {
    format!("{}{}", primary_name(cluster_name), METRICS_CONFIG_SUFFIX)
}

/// Labels for a resource belonging to `cluster_name`
pub fn cluster_labels(cluster_name: &str, resource_name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_CLUSTER.to_string(), cluster_name.to_string());
    labels.insert(LABEL_KIND.to_string(), KIND_KAFKA_CLUSTER.to_string());
    labels.insert(LABEL_NAME.to_string(), resource_name.to_string());
    labels
}

/// Label selector matching cluster ConfigMaps, for list/watch calls
pub fn cluster_config_selector() -> String {
    format!(
        "{}={},{}={}",
        LABEL_KIND, CONFIG_MAP_KIND, LABEL_TYPE, CONFIG_MAP_TYPE
    )
}

/// Whether a ConfigMap is labelled as a Kafka cluster definition
pub fn is_cluster_config_map(cm: &ConfigMap) -> bool {
    let labels = cm.labels();
    labels.get(LABEL_KIND).map(String::as_str) == Some(CONFIG_MAP_KIND)
        && labels.get(LABEL_TYPE).map(String::as_str) == Some(CONFIG_MAP_TYPE)
}

/// Validate a cluster name so every derived name is a valid Kubernetes name
pub fn validate_cluster_name(value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_CLUSTER_NAME_LEN {
        return Err(ValidationError::new("name_too_long").with_message(
            format!(
                "cluster name exceeds {} characters",
                MAX_CLUSTER_NAME_LEN
            )
            .into(),
        ));
    }
    if !NAME_REGEX.is_match(value) {
        return Err(ValidationError::new("invalid_name").with_message(
            format!("'{}' is not a valid Kubernetes name (RFC 1123)", value).into(),
        ));
    }
    Ok(())
}

/// Namespace and name of a Kafka cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterIdentity {
    namespace: String,
    cluster_name: String,
}

impl ClusterIdentity {
    pub fn new(namespace: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            cluster_name: cluster_name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn primary_name(&self) -> String {
        primary_name(&self.cluster_name)
    }

    pub fn headless_name(&self) -> String {
        headless_name(&self.cluster_name)
    }

    pub fn metrics_config_name(&self) -> String {
        metrics_config_name(&self.cluster_name)
    }

    /// Labels for one of this cluster's resources
    pub fn labels(&self, resource_name: &str) -> BTreeMap<String, String> {
        cluster_labels(&self.cluster_name, resource_name)
    }

    /// Selector shared by both services and the StatefulSet
    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        self.labels(&self.primary_name())
    }
}

impl std::fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.cluster_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use proptest::prelude::*;

    #[test]
    fn test_derived_names() {
        let id = ClusterIdentity::new("test", "foo");
        assert_eq!(id.primary_name(), "foo-kafka");
        assert_eq!(id.headless_name(), "foo-kafka-headless");
        assert_eq!(id.metrics_config_name(), "foo-kafka-metrics-config");
        assert_eq!(id.to_string(), "test/foo");
    }

    #[test]
    fn test_labels_are_sorted() {
        let labels = cluster_labels("foo", "foo-kafka");
        let keys: Vec<&str> = labels.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![LABEL_CLUSTER, LABEL_KIND, LABEL_NAME]);
        assert_eq!(labels.get(LABEL_KIND), Some(&"kafka-cluster".to_string()));
    }

    #[test]
    fn test_selector_uses_primary_name() {
        let id = ClusterIdentity::new("test", "foo");
        let selector = id.selector_labels();
        assert_eq!(selector.get(LABEL_NAME), Some(&"foo-kafka".to_string()));
        assert_eq!(selector.get(LABEL_CLUSTER), Some(&"foo".to_string()));
    }

    #[test]
    fn test_cluster_config_selector() {
        assert_eq!(
            cluster_config_selector(),
            "kafka-operator.io/kind=cluster,kafka-operator.io/type=kafka"
        );
    }

    #[test]
    fn test_is_cluster_config_map() {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_KIND.to_string(), "cluster".to_string());
        labels.insert(LABEL_TYPE.to_string(), "kafka".to_string());
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some("foo".to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(is_cluster_config_map(&cm));
        assert!(!is_cluster_config_map(&ConfigMap::default()));
    }

    #[test]
    fn test_validate_cluster_name() {
        assert!(validate_cluster_name("foo").is_ok());
        assert!(validate_cluster_name("my-cluster-1").is_ok());
        assert!(validate_cluster_name("").is_err());
        assert!(validate_cluster_name("Foo").is_err());
        assert!(validate_cluster_name("foo_bar").is_err());
        assert!(validate_cluster_name("-foo").is_err());
        assert!(validate_cluster_name(&"a".repeat(MAX_CLUSTER_NAME_LEN)).is_ok());
        assert!(validate_cluster_name(&"a".repeat(MAX_CLUSTER_NAME_LEN + 1)).is_err());
    }

    proptest! {
        #[test]
        fn test_names_are_deterministic_and_distinct(name in "[a-z0-9]([-a-z0-9]{0,20}[a-z0-9])?") {
            prop_assert_eq!(primary_name(&name), primary_name(&name));
            prop_assert_eq!(headless_name(&name), headless_name(&name));
            prop_assert_ne!(primary_name(&name), headless_name(&name));
        }

        #[test]
        fn test_distinct_clusters_get_distinct_names(
            a in "[a-z][a-z0-9]{0,10}",
            b in "[a-z][a-z0-9]{0,10}",
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(primary_name(&a), primary_name(&b));
            prop_assert_ne!(headless_name(&a), headless_name(&b));
            prop_assert_ne!(primary_name(&a), headless_name(&b));
        }
    }
}
