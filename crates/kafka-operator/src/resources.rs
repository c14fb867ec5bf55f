//! Kubernetes Resource Builders
//!
//! This module generates the Kubernetes manifests (Services, StatefulSet,
//! metrics ConfigMap) that run a [`KafkaCluster`]. Every builder is a pure
//! function of the model: building twice from the same model yields
//! identical resources.

use crate::error::Result;
use crate::identity::ClusterIdentity;
use crate::model::{HealthCheck, KafkaCluster, MetricsConfig, Storage};
use k8s_openapi::api::apps::v1::{
    RollingUpdateStatefulSetStrategy, StatefulSet, StatefulSetSpec, StatefulSetUpdateStrategy,
};
use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource,
    EnvVar, EnvVarSource, ExecAction, ObjectFieldSelector, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PodSecurityContext, PodSpec, PodTemplateSpec, Probe,
    SeccompProfile, SecurityContext, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Name of the broker container
pub const CONTAINER_NAME: &str = "kafka";

/// Client port, fixed by the Kafka protocol convention
pub const CLIENT_PORT: i32 = 9092;

/// Name of the client port on services and the container
pub const CLIENT_PORT_NAME: &str = "clients";

/// Port the metrics exporter listens on
pub const METRICS_PORT: i32 = 9404;

/// Name of the metrics container port
pub const METRICS_PORT_NAME: &str = "metrics";

/// Key of the metrics content in the metrics ConfigMap
pub const METRICS_CONFIG_FILE: &str = "metrics-config.yml";

/// Annotation carrying the build-integration settings on the StatefulSet
pub const ANNOTATION_BUILD_INTEGRATION: &str = "kafka-operator.io/build-integration";

/// Name of the broker data volume and claim template
pub const DATA_VOLUME_NAME: &str = "data";

const DATA_MOUNT_PATH: &str = "/var/lib/kafka";
const METRICS_VOLUME_NAME: &str = "metrics-config";
const METRICS_MOUNT_PATH: &str = "/opt/prometheus/config";
const HEALTHCHECK_SCRIPT: &str = "/opt/kafka/kafka_healthcheck.sh";

/// Exec probe running the broker health-check script
fn health_probe(check: HealthCheck) -> Probe {
    Probe {
        exec: Some(ExecAction {
            command: Some(vec![HEALTHCHECK_SCRIPT.to_string()]),
        }),
        initial_delay_seconds: Some(check.initial_delay_seconds),
        timeout_seconds: Some(check.timeout_seconds),
        ..Default::default()
    }
}

/// Every resource generated for one cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResources {
    pub client_service: Service,
    pub headless_service: Service,
    pub statefulset: StatefulSet,
    pub metrics_config_map: Option<ConfigMap>,
}

/// Builder for generating Kubernetes resources from a KafkaCluster
pub struct ResourceBuilder<'a> {
    cluster: &'a KafkaCluster,
}

impl<'a> ResourceBuilder<'a> {
    /// Create a new resource builder
    pub fn new(cluster: &'a KafkaCluster) -> Self {
        Self { cluster }
    }

    fn identity(&self) -> &ClusterIdentity {
        self.cluster.identity()
    }

    fn metadata(&self, name: String) -> ObjectMeta {
        ObjectMeta {
            labels: Some(self.identity().labels(&name)),
            name: Some(name),
            namespace: Some(self.identity().namespace().to_string()),
            ..Default::default()
        }
    }

    /// Build every resource for the cluster
    pub fn build_all(&self, openshift: bool) -> Result<ClusterResources> {
        Ok(ClusterResources {
            client_service: self.build_client_service(),
            headless_service: self.build_headless_service(),
            statefulset: self.build_statefulset(openshift)?,
            metrics_config_map: self.build_metrics_config_map(),
        })
    }

    fn client_port(&self) -> ServicePort {
        ServicePort {
            name: Some(CLIENT_PORT_NAME.to_string()),
            port: CLIENT_PORT,
            target_port: Some(IntOrString::Int(CLIENT_PORT)),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }
    }

    /// Build the client-facing service
    pub fn build_client_service(&self) -> Service {
        Service {
            metadata: self.metadata(self.identity().primary_name()),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(self.identity().selector_labels()),
                ports: Some(vec![self.client_port()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build the headless service for pod discovery
    pub fn build_headless_service(&self) -> Service {
        Service {
            metadata: self.metadata(self.identity().headless_name()),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                cluster_ip: Some("None".to_string()),
                selector: Some(self.identity().selector_labels()),
                ports: Some(vec![self.client_port()]),
                publish_not_ready_addresses: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build the ConfigMap holding the metrics configuration, if any
    pub fn build_metrics_config_map(&self) -> Option<ConfigMap> {
        let content = match self.cluster.metrics() {
            MetricsConfig::Enabled(content) => content,
            MetricsConfig::Disabled | MetricsConfig::Unknown => return None,
        };

        let mut data = BTreeMap::new();
        data.insert(METRICS_CONFIG_FILE.to_string(), content.clone());

        Some(ConfigMap {
            metadata: self.metadata(self.identity().metrics_config_name()),
            data: Some(data),
            ..Default::default()
        })
    }

    /// Build the StatefulSet for the Kafka brokers
    ///
    /// On OpenShift the platform assigns UIDs and GIDs, so no pod security
    /// context is set there.
    pub fn build_statefulset(&self, openshift: bool) -> Result<StatefulSet> {
        let identity = self.identity();
        let name = identity.primary_name();
        let selector_labels = identity.selector_labels();

        let mut metadata = self.metadata(name.clone());
        if let Some(build) = self.cluster.build_integration() {
            let mut annotations = BTreeMap::new();
            annotations.insert(
                ANNOTATION_BUILD_INTEGRATION.to_string(),
                serde_json::to_string(build)?,
            );
            metadata.annotations = Some(annotations);
        }

        let pod_security_context = if openshift {
            None
        } else {
            Some(PodSecurityContext {
                run_as_non_root: Some(true),
                run_as_user: Some(1001),
                run_as_group: Some(0),
                fs_group: Some(0),
                seccomp_profile: Some(SeccompProfile {
                    type_: "RuntimeDefault".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            })
        };

        let pod_spec = PodSpec {
            containers: vec![self.build_container()],
            volumes: Some(self.build_volumes()),
            security_context: pod_security_context,
            automount_service_account_token: Some(false),
            ..Default::default()
        };

        Ok(StatefulSet {
            metadata,
            spec: Some(StatefulSetSpec {
                service_name: identity.headless_name(),
                replicas: Some(self.cluster.replicas()),
                selector: LabelSelector {
                    match_labels: Some(selector_labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(selector_labels),
                        ..Default::default()
                    }),
                    spec: Some(pod_spec),
                },
                volume_claim_templates: self.build_pvc_template().map(|pvc| vec![pvc]),
                pod_management_policy: Some("Parallel".to_string()),
                update_strategy: Some(StatefulSetUpdateStrategy {
                    type_: Some("RollingUpdate".to_string()),
                    rolling_update: Some(RollingUpdateStatefulSetStrategy {
                        max_unavailable: Some(IntOrString::Int(1)),
                        partition: Some(0),
                    }),
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    /// Build the broker container
    fn build_container(&self) -> Container {
        let identity = self.identity();
        let env = vec![
            EnvVar {
                name: "KAFKA_CLUSTER_NAME".to_string(),
                value: Some(identity.cluster_name().to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "KAFKA_HEADLESS_SERVICE".to_string(),
                value: Some(identity.headless_name()),
                ..Default::default()
            },
            EnvVar {
                name: "KAFKA_POD_NAME".to_string(),
                value_from: Some(EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        field_path: "metadata.name".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            EnvVar {
                name: "KAFKA_DATA_DIR".to_string(),
                value: Some(DATA_MOUNT_PATH.to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "KAFKA_METRICS_CONFIG".to_string(),
                value: Some(format!("{}/{}", METRICS_MOUNT_PATH, METRICS_CONFIG_FILE)),
                ..Default::default()
            },
        ];

        let ports = vec![
            ContainerPort {
                name: Some(CLIENT_PORT_NAME.to_string()),
                container_port: CLIENT_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
            ContainerPort {
                name: Some(METRICS_PORT_NAME.to_string()),
                container_port: METRICS_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
        ];

        let volume_mounts = vec![
            VolumeMount {
                name: DATA_VOLUME_NAME.to_string(),
                mount_path: DATA_MOUNT_PATH.to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: METRICS_VOLUME_NAME.to_string(),
                mount_path: METRICS_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
        ];

        Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(self.cluster.image().to_string()),
            env: Some(env),
            ports: Some(ports),
            liveness_probe: Some(health_probe(self.cluster.health_check())),
            readiness_probe: Some(health_probe(self.cluster.readiness_check())),
            volume_mounts: Some(volume_mounts),
            security_context: Some(SecurityContext {
                allow_privilege_escalation: Some(false),
                capabilities: Some(Capabilities {
                    drop: Some(vec!["ALL".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Pod volumes. The metrics volume is optional so that turning metrics
    /// on or off leaves the pod template untouched.
    fn build_volumes(&self) -> Vec<Volume> {
        let mut volumes = Vec::with_capacity(2);

        if matches!(self.cluster.storage(), Storage::Ephemeral) {
            volumes.push(Volume {
                name: DATA_VOLUME_NAME.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            });
        }

        volumes.push(Volume {
            name: METRICS_VOLUME_NAME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: self.identity().metrics_config_name(),
                optional: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        });

        volumes
    }

    /// Build PVC template for persistent storage
    fn build_pvc_template(&self) -> Option<PersistentVolumeClaim> {
        let (size, class) = match self.cluster.storage() {
            Storage::Ephemeral => return None,
            Storage::PersistentClaim { size, class } => (size, class),
        };

        let mut requests = BTreeMap::new();
        requests.insert("storage".to_string(), Quantity(size.clone()));

        Some(PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(DATA_VOLUME_NAME.to_string()),
                labels: Some(self.identity().selector_labels()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                storage_class_name: class.clone(),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}
