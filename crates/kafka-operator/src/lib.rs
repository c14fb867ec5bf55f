//! # Kafka Cluster Operator Core
//!
//! Reconciliation logic for running multi-broker Kafka clusters on Kubernetes.
//!
//! This crate turns one declarative cluster ConfigMap into the Kubernetes
//! resources that run the cluster, and decides what has to change when the
//! declared state and the running state drift apart. It does not talk to the
//! API server: fetching live resources and applying the decisions is left to
//! the surrounding control loop.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kafka_operator::prelude::*;
//!
//! let desired = KafkaCluster::from_config_map(&cluster_cm)?;
//! let builder = ResourceBuilder::new(&desired);
//!
//! // first deployment
//! let resources = builder.build_all(false)?;
//!
//! // later: compare against what is running
//! let diff = desired.diff(live_metrics_cm.as_ref(), &live_sts, &StructuralComparator)?;
//! if diff.requires_restart() {
//!     // patch the StatefulSet and roll the brokers
//! }
//! ```
//!
//! ## Architecture
//!
//! 1. **Parse**: the cluster ConfigMap becomes a [`KafkaCluster`]
//!    ([`config`])
//! 2. **Generate**: [`ResourceBuilder`] derives the client Service, the
//!    headless Service, the StatefulSet and the metrics ConfigMap
//!    ([`resources`])
//! 3. **Read back**: a live StatefulSet becomes a partial [`KafkaCluster`]
//!    ([`reconstruct`])
//! 4. **Classify**: [`ClusterDiffResult`] reports scale, rolling-update,
//!    metrics and build-integration changes independently ([`diff`])
//!
//! Every step is a pure function over immutable values, so reconciliations of
//! different clusters can run in parallel without coordination.
//!
//! ## Modules
//!
//! - [`identity`] - Cluster identity, derived names and labels
//! - [`model`] - The cluster model
//! - [`config`] - Desired state from the cluster ConfigMap
//! - [`reconstruct`] - Current state from the live StatefulSet
//! - [`resources`] - Kubernetes resource builders
//! - [`diff`] - Change classification
//! - [`build_integration`] - Optional build-integration settings and their comparator
//! - [`error`] - Error types
//!
//! [`KafkaCluster`]: model::KafkaCluster
//! [`ResourceBuilder`]: resources::ResourceBuilder
//! [`ClusterDiffResult`]: diff::ClusterDiffResult

pub mod build_integration;
pub mod config;
pub mod diff;
pub mod error;
pub mod identity;
pub mod model;
pub mod reconstruct;
pub mod resources;

pub mod prelude {
    //! Re-exports for convenient usage
    pub use crate::build_integration::{
        BuildIntegrationComparator, BuildIntegrationConfig, BuildIntegrationDiff,
        StructuralComparator,
    };
    pub use crate::diff::ClusterDiffResult;
    pub use crate::error::{OperatorError, Result};
    pub use crate::identity::{cluster_config_selector, is_cluster_config_map, ClusterIdentity};
    pub use crate::model::{HealthCheck, KafkaCluster, MetricsConfig, Storage};
    pub use crate::resources::{ClusterResources, ResourceBuilder};
}
