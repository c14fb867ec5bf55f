//! Current state: reading a cluster back from its live StatefulSet
//!
//! The StatefulSet carries everything the builders put into it except the
//! metrics content, which lives in its own ConfigMap. Models built here
//! therefore start with [`MetricsConfig::Unknown`]; callers that fetched the
//! live metrics ConfigMap resolve it with [`KafkaCluster::with_live_metrics`].

use crate::build_integration::BuildIntegrationConfig;
use crate::error::{OperatorError, Result};
use crate::identity::{ClusterIdentity, LABEL_CLUSTER};
use crate::model::{HealthCheck, KafkaCluster, MetricsConfig, Storage};
use crate::resources::{
    ANNOTATION_BUILD_INTEGRATION, CONTAINER_NAME, DATA_VOLUME_NAME, METRICS_CONFIG_FILE,
};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Probe};
use kube::ResourceExt;
use tracing::{debug, warn};

/// Kubernetes defaults for fields the API server may leave unset
const DEFAULT_REPLICAS: i32 = 1;
const DEFAULT_PROBE_DELAY: i32 = 0;
const DEFAULT_PROBE_TIMEOUT: i32 = 1;

fn storage_from_claims(resource: &str, claims: Option<&Vec<PersistentVolumeClaim>>) -> Result<Storage> {
    let claim = match claims.and_then(|c| c.iter().find(|c| c.name_any() == DATA_VOLUME_NAME)) {
        Some(claim) => claim,
        None => return Ok(Storage::Ephemeral),
    };

    let spec = claim.spec.as_ref().ok_or_else(|| {
        OperatorError::reconstruction(resource, "data volume claim template has no spec")
    })?;
    let size = spec
        .resources
        .as_ref()
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get("storage"))
        .ok_or_else(|| {
            OperatorError::reconstruction(resource, "data volume claim template has no storage request")
        })?;

    Ok(Storage::PersistentClaim {
        size: size.0.clone(),
        class: spec.storage_class_name.clone(),
    })
}

fn probe_timing(probe: &Probe) -> HealthCheck {
    HealthCheck {
        initial_delay_seconds: probe.initial_delay_seconds.unwrap_or(DEFAULT_PROBE_DELAY),
        timeout_seconds: probe.timeout_seconds.unwrap_or(DEFAULT_PROBE_TIMEOUT),
    }
}

fn build_integration_from_annotation(
    resource: &str,
    sts: &StatefulSet,
) -> Option<BuildIntegrationConfig> {
    let raw = sts.annotations().get(ANNOTATION_BUILD_INTEGRATION)?;
    match serde_json::from_str(raw) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(
                resource = %resource,
                error = %e,
                "Ignoring malformed build-integration annotation"
            );
            None
        }
    }
}

impl KafkaCluster {
    /// Rebuild the cluster model from a live StatefulSet
    ///
    /// Fails only when the StatefulSet does not have the shape the resource
    /// builders produce. Differences in content are left for the diff engine.
    pub fn from_statefulset(sts: &StatefulSet, identity: &ClusterIdentity) -> Result<Self> {
        let name = sts.name_any();
        let resource = format!("StatefulSet/{}/{}", identity.namespace(), name);

        if name != identity.primary_name() {
            return Err(OperatorError::reconstruction(
                &resource,
                format!(
                    "does not belong to cluster '{}', expected name '{}'",
                    identity.cluster_name(),
                    identity.primary_name()
                ),
            ));
        }
        if let Some(owner) = sts.labels().get(LABEL_CLUSTER) {
            if owner != identity.cluster_name() {
                return Err(OperatorError::reconstruction(
                    &resource,
                    format!(
                        "labelled for cluster '{}', expected '{}'",
                        owner,
                        identity.cluster_name()
                    ),
                ));
            }
        }

        let spec = sts
            .spec
            .as_ref()
            .ok_or_else(|| OperatorError::reconstruction(&resource, "missing spec"))?;
        let pod_spec = spec
            .template
            .spec
            .as_ref()
            .ok_or_else(|| OperatorError::reconstruction(&resource, "pod template has no spec"))?;
        let container = pod_spec
            .containers
            .iter()
            .find(|c| c.name == CONTAINER_NAME)
            .ok_or_else(|| {
                OperatorError::reconstruction(
                    &resource,
                    format!("no '{}' container in pod template", CONTAINER_NAME),
                )
            })?;

        let image = container
            .image
            .clone()
            .filter(|image| !image.is_empty())
            .ok_or_else(|| OperatorError::reconstruction(&resource, "container has no image"))?;
        let liveness = container
            .liveness_probe
            .as_ref()
            .ok_or_else(|| OperatorError::reconstruction(&resource, "container has no liveness probe"))?;
        let readiness = container
            .readiness_probe
            .as_ref()
            .ok_or_else(|| OperatorError::reconstruction(&resource, "container has no readiness probe"))?;

        let health_check = probe_timing(liveness);
        let readiness_check = probe_timing(readiness);
        if readiness_check != health_check {
            debug!(
                resource = %resource,
                liveness = ?health_check,
                readiness = ?readiness_check,
                "Readiness probe timing differs from liveness probe"
            );
        }

        let storage = storage_from_claims(&resource, spec.volume_claim_templates.as_ref())?;
        let build_integration = build_integration_from_annotation(&resource, sts);
        let replicas = spec.replicas.unwrap_or(DEFAULT_REPLICAS);

        debug!(
            resource = %resource,
            replicas,
            image = %image,
            "Reconstructed cluster from StatefulSet"
        );

        Ok(KafkaCluster::from_parts(
            identity.clone(),
            replicas,
            image,
            health_check,
            MetricsConfig::Unknown,
            storage,
            build_integration,
        )
        .with_readiness_check(readiness_check))
    }

    /// Resolve the metrics state from the live metrics ConfigMap
    ///
    /// A missing ConfigMap, or one without the metrics key, means metrics are
    /// not configured on the live cluster.
    pub fn with_live_metrics(self, metrics_config_map: Option<&ConfigMap>) -> Self {
        let metrics = metrics_config_map
            .and_then(|cm| cm.data.as_ref())
            .and_then(|data| data.get(METRICS_CONFIG_FILE))
            .map(|content| MetricsConfig::Enabled(content.clone()))
            .unwrap_or(MetricsConfig::Disabled);
        self.with_metrics(metrics)
    }
}
