//! Reconciliation scenarios through the public API
//!
//! Each test parses a cluster ConfigMap, generates the resources an operator
//! would apply, and diffs a second ConfigMap against those "live" resources:
//! - Service generation
//! - No-op reconciliation
//! - Scale up and scale down
//! - Rolling updates
//! - Metrics-only changes
//! - Build-integration classification

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kafka_operator::identity::{LABEL_CLUSTER, LABEL_KIND, LABEL_NAME};
use kafka_operator::prelude::*;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

const WOMBAT: &str = r#"{"animal":"wombat"}"#;

/// Cluster ConfigMap as a user would write it
fn config_map(data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some("foo".to_string()),
            namespace: Some("test".to_string()),
            labels: Some(BTreeMap::from([
                ("kafka-operator.io/kind".to_string(), "cluster".to_string()),
                ("kafka-operator.io/type".to_string(), "kafka".to_string()),
            ])),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
        ..Default::default()
    }
}

fn cluster_with(overrides: &[(&str, &str)]) -> KafkaCluster {
    let mut data = vec![
        ("kafka-nodes", "3"),
        ("kafka-image", "image"),
        ("kafka-healthcheck-delay", "120"),
        ("kafka-healthcheck-timeout", "30"),
        ("kafka-metrics-config", WOMBAT),
    ];
    for &(key, value) in overrides {
        data.retain(|(k, _)| *k != key);
        data.push((key, value));
    }
    KafkaCluster::from_config_map(&config_map(&data)).expect("valid cluster ConfigMap")
}

fn base_cluster() -> KafkaCluster {
    cluster_with(&[])
}

/// Live resources as the operator would have left them for `cluster`
fn deployed(cluster: &KafkaCluster) -> (StatefulSet, Option<ConfigMap>) {
    let resources = ResourceBuilder::new(cluster)
        .build_all(false)
        .expect("build-integration settings serialize");
    (resources.statefulset, resources.metrics_config_map)
}

fn reconcile(live: &KafkaCluster, desired: &KafkaCluster) -> ClusterDiffResult {
    let (sts, metrics) = deployed(live);
    desired
        .diff(metrics.as_ref(), &sts, &StructuralComparator)
        .expect("live StatefulSet has the generated shape")
}

#[test]
fn test_config_map_is_watched() {
    let cm = config_map(&[("kafka-nodes", "1"), ("kafka-image", "image")]);
    assert!(is_cluster_config_map(&cm));
    assert_eq!(
        cluster_config_selector(),
        "kafka-operator.io/kind=cluster,kafka-operator.io/type=kafka"
    );
}

#[test]
fn test_client_service() {
    let cluster = base_cluster();
    let service = ResourceBuilder::new(&cluster).build_client_service();

    assert_eq!(service.metadata.name.as_deref(), Some("foo-kafka"));
    assert_eq!(service.metadata.namespace.as_deref(), Some("test"));

    let spec = service.spec.unwrap();
    assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
    let ports = spec.ports.unwrap();
    assert_eq!(ports.len(), 1);
    assert_eq!(ports[0].port, 9092);
    assert_eq!(ports[0].protocol.as_deref(), Some("TCP"));
    assert_eq!(ports[0].name.as_deref(), Some("clients"));

    let selector = spec.selector.unwrap();
    assert_eq!(selector.get(LABEL_CLUSTER).map(String::as_str), Some("foo"));
    assert_eq!(selector.get(LABEL_NAME).map(String::as_str), Some("foo-kafka"));
    assert_eq!(
        selector.get(LABEL_KIND).map(String::as_str),
        Some("kafka-cluster")
    );
}

#[test]
fn test_headless_service() {
    let cluster = base_cluster();
    let builder = ResourceBuilder::new(&cluster);
    let client = builder.build_client_service();
    let headless = builder.build_headless_service();

    assert_eq!(headless.metadata.name.as_deref(), Some("foo-kafka-headless"));
    let spec = headless.spec.unwrap();
    assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
    assert_eq!(spec.selector, client.spec.unwrap().selector);
}

#[test]
fn test_identical_state_is_noop() {
    let cluster = base_cluster();
    let diff = reconcile(&cluster, &cluster);

    assert_eq!(diff, ClusterDiffResult::default());
    assert_eq!(diff.build_integration, BuildIntegrationDiff::None);
    assert!(diff.is_noop());
}

#[test]
fn test_scale_up() {
    let diff = reconcile(&base_cluster(), &cluster_with(&[("kafka-nodes", "4")]));
    assert_eq!(
        diff,
        ClusterDiffResult {
            scale_up: true,
            ..Default::default()
        }
    );
}

#[test]
fn test_scale_down() {
    let diff = reconcile(&base_cluster(), &cluster_with(&[("kafka-nodes", "2")]));
    assert_eq!(
        diff,
        ClusterDiffResult {
            scale_down: true,
            ..Default::default()
        }
    );
}

#[test]
fn test_image_change_rolls_brokers() {
    let diff = reconcile(
        &base_cluster(),
        &cluster_with(&[("kafka-image", "differentimage")]),
    );
    assert_eq!(
        diff,
        ClusterDiffResult {
            different: true,
            rolling_update: true,
            ..Default::default()
        }
    );
    assert!(diff.requires_restart());
}

#[test]
fn test_metrics_change_only_republishes_config() {
    let diff = reconcile(
        &base_cluster(),
        &cluster_with(&[("kafka-metrics-config", r#"{"something":"different"}"#)]),
    );
    assert_eq!(
        diff,
        ClusterDiffResult {
            metrics_changed: true,
            ..Default::default()
        }
    );
    assert!(!diff.requires_restart());
}

#[test]
fn test_metrics_unknown_without_live_config_map_lookup() {
    let cluster = base_cluster();
    let (sts, _) = deployed(&cluster);
    let identity = ClusterIdentity::new("test", "foo");

    // not resolving the live metrics leaves them unknown, which never counts as a change
    let current = KafkaCluster::from_statefulset(&sts, &identity).unwrap();
    let desired = cluster_with(&[("kafka-metrics-config", "{}")]);
    let diff = ClusterDiffResult::between(&current, &desired, &StructuralComparator);
    assert!(diff.is_noop());
}

#[test]
fn test_build_integration_lifecycle() {
    let plain = base_cluster();
    let integrated = cluster_with(&[(
        "kafka-build-integration",
        r#"{"baseImage":"registry.local/kafka:3.7"}"#,
    )]);
    let retagged = cluster_with(&[(
        "kafka-build-integration",
        r#"{"baseImage":"registry.local/kafka:3.7","outputTag":"v2"}"#,
    )]);

    assert_eq!(
        reconcile(&plain, &integrated).build_integration,
        BuildIntegrationDiff::Create
    );
    assert_eq!(
        reconcile(&integrated, &retagged).build_integration,
        BuildIntegrationDiff::Update
    );
    assert_eq!(
        reconcile(&retagged, &plain).build_integration,
        BuildIntegrationDiff::Delete
    );
    assert!(reconcile(&retagged, &retagged).is_noop());
}

#[test]
fn test_statefulset_of_another_cluster_is_rejected() {
    let cluster = base_cluster();
    let (mut sts, metrics) = deployed(&cluster);
    sts.metadata.name = Some("bar-kafka".to_string());

    let err = cluster
        .diff(metrics.as_ref(), &sts, &StructuralComparator)
        .unwrap_err();
    assert!(err.requires_recreate());
}

#[test]
fn test_invalid_config_map_is_rejected() {
    let err = KafkaCluster::from_config_map(&config_map(&[
        ("kafka-nodes", "zero"),
        ("kafka-image", "image"),
    ]))
    .unwrap_err();
    assert!(matches!(err, OperatorError::Configuration { .. }));
    assert!(err.to_string().contains("kafka-nodes"));
}

#[test]
fn test_diff_result_json() {
    let diff = reconcile(&base_cluster(), &cluster_with(&[("kafka-nodes", "5")]));
    let json = serde_json::to_value(diff).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "different": false,
            "rollingUpdate": false,
            "scaleUp": true,
            "scaleDown": false,
            "metricsChanged": false,
            "buildIntegration": "NONE",
        })
    );
}
