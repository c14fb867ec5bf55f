//! Change classification between the current and desired cluster state
//!
//! The diff engine looks at three disjoint groups of fields and reports each
//! group on its own:
//!
//! - **scale**: the replica count
//! - **pod template**: image and health-check timing, which need a rolling
//!   restart of the brokers
//! - **metrics**: the metrics content, which is republished without touching
//!   any pod
//!
//! Build-integration changes are classified by an injected
//! [`BuildIntegrationComparator`] and passed through as-is. The caller decides
//! which platform operations to issue from the combined result.

use crate::build_integration::{BuildIntegrationComparator, BuildIntegrationDiff};
use crate::error::Result;
use crate::model::{KafkaCluster, MetricsConfig};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::ConfigMap;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// What has to happen to move a cluster from its current to its desired state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDiffResult {
    /// The StatefulSet needs patching. Currently set together with
    /// `rolling_update`.
    pub different: bool,
    /// A pod template field changed and the brokers must be restarted
    pub rolling_update: bool,
    /// More brokers are desired than are running
    pub scale_up: bool,
    /// Fewer brokers are desired than are running
    pub scale_down: bool,
    /// The metrics ConfigMap must be updated
    pub metrics_changed: bool,
    /// Build-integration change as classified by its comparator
    pub build_integration: BuildIntegrationDiff,
}

impl ClusterDiffResult {
    /// Compare two cluster models
    #[instrument(skip_all, fields(cluster = %desired.identity()))]
    pub fn between(
        current: &KafkaCluster,
        desired: &KafkaCluster,
        comparator: &dyn BuildIntegrationComparator,
    ) -> Self {
        let scale_up = desired.replicas() > current.replicas();
        let scale_down = desired.replicas() < current.replicas();

        let current_health = current.health_check();
        let desired_health = desired.health_check();
        let rolling_update = current.image() != desired.image()
            || current_health.initial_delay_seconds != desired_health.initial_delay_seconds
            || current_health.timeout_seconds != desired_health.timeout_seconds
            || current.readiness_check() != desired.readiness_check();

        let metrics_changed = metrics_changed(current.metrics(), desired.metrics());

        if current.storage() != desired.storage() {
            warn!(
                current = ?current.storage(),
                desired = ?desired.storage(),
                "Storage cannot be changed on a running cluster, ignoring"
            );
        }

        let result = ClusterDiffResult {
            different: rolling_update,
            rolling_update,
            scale_up,
            scale_down,
            metrics_changed,
            build_integration: comparator
                .compare(current.build_integration(), desired.build_integration()),
        };

        if result.is_noop() {
            debug!("No changes detected");
        } else {
            info!(
                current_replicas = current.replicas(),
                desired_replicas = desired.replicas(),
                scale_up = result.scale_up,
                scale_down = result.scale_down,
                rolling_update = result.rolling_update,
                metrics_changed = result.metrics_changed,
                build_integration = ?result.build_integration,
                "Cluster changes detected"
            );
        }

        result
    }

    /// Whether nothing needs to be done
    pub fn is_noop(&self) -> bool {
        *self == ClusterDiffResult::default()
    }

    /// Whether the brokers have to be restarted
    pub fn requires_restart(&self) -> bool {
        self.rolling_update
    }
}

/// Metrics are compared only when both sides are known
fn metrics_changed(current: &MetricsConfig, desired: &MetricsConfig) -> bool {
    if !current.is_known() || !desired.is_known() {
        debug!("Metrics state unknown, skipping metrics comparison");
        return false;
    }
    current != desired
}

impl KafkaCluster {
    /// Compare this desired state against the live resources of the cluster
    ///
    /// The current state is read back from the live StatefulSet, with metrics
    /// taken from the live metrics ConfigMap (`None` when it does not exist).
    pub fn diff(
        &self,
        live_metrics: Option<&ConfigMap>,
        live_statefulset: &StatefulSet,
        comparator: &dyn BuildIntegrationComparator,
    ) -> Result<ClusterDiffResult> {
        let current = KafkaCluster::from_statefulset(live_statefulset, self.identity())?
            .with_live_metrics(live_metrics);
        Ok(ClusterDiffResult::between(&current, self, comparator))
    }
}
