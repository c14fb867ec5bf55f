//! Kafka Operator command line
//!
//! Renders the Kubernetes resources for a cluster ConfigMap and classifies
//! the changes between a cluster ConfigMap and live resources exported as
//! YAML, without connecting to a cluster.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::ConfigMap;
use kafka_operator::prelude::*;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Kafka Operator
#[derive(Parser, Debug)]
#[command(name = "kafka-operator")]
#[command(about = "Render and diff Kubernetes resources for Kafka clusters")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: Level,

    /// Enable JSON log format
    #[arg(long, env = "LOG_JSON", default_value = "false", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resources generated for a cluster ConfigMap as YAML
    Render {
        /// Cluster ConfigMap manifest
        #[arg(long)]
        config: PathBuf,

        /// Generate for OpenShift (platform-assigned UIDs)
        #[arg(long)]
        openshift: bool,
    },

    /// Print the changes needed to move live resources to the desired state as JSON
    Diff {
        /// Cluster ConfigMap manifest with the desired state
        #[arg(long)]
        desired: PathBuf,

        /// Live StatefulSet manifest
        #[arg(long)]
        statefulset: PathBuf,

        /// Live metrics ConfigMap manifest (omit if it does not exist)
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    match args.command {
        Command::Render { config, openshift } => render(&config, openshift),
        Command::Diff {
            desired,
            statefulset,
            metrics,
        } => diff(&desired, &statefulset, metrics.as_deref()),
    }
}

/// Initialize logging subsystem
///
/// `RUST_LOG` takes precedence over `--log-level`. Logs go to stderr so that
/// stdout carries only the rendered output.
fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_cluster(path: &Path) -> Result<KafkaCluster> {
    let cm: ConfigMap = read_yaml(path)?;
    if !is_cluster_config_map(&cm) {
        warn!(
            path = %path.display(),
            selector = %cluster_config_selector(),
            "ConfigMap is not labelled as a Kafka cluster, the operator would not watch it"
        );
    }
    KafkaCluster::from_config_map(&cm)
        .with_context(|| format!("Invalid cluster ConfigMap {}", path.display()))
}

fn render(config: &Path, openshift: bool) -> Result<()> {
    let cluster = read_cluster(config)?;
    let resources = ResourceBuilder::new(&cluster).build_all(openshift)?;

    let mut documents = vec![
        serde_yaml::to_string(&resources.client_service)?,
        serde_yaml::to_string(&resources.headless_service)?,
        serde_yaml::to_string(&resources.statefulset)?,
    ];
    if let Some(ref metrics) = resources.metrics_config_map {
        documents.push(serde_yaml::to_string(metrics)?);
    }

    info!(
        cluster = %cluster.identity(),
        resources = documents.len(),
        "Rendered cluster resources"
    );
    print!("{}", documents.join("---\n"));

    Ok(())
}

fn diff(desired: &Path, statefulset: &Path, metrics: Option<&Path>) -> Result<()> {
    let cluster = read_cluster(desired)?;
    let live_statefulset: StatefulSet = read_yaml(statefulset)?;
    let live_metrics: Option<ConfigMap> = metrics.map(read_yaml).transpose()?;

    let result = cluster
        .diff(live_metrics.as_ref(), &live_statefulset, &StructuralComparator)
        .context("Failed to compare against the live StatefulSet")?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
