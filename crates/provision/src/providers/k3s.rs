//! Kubernetes cluster running k3s in a single privileged container.
//!
//! The server container writes its kubeconfig to `/output`, which is copied
//! into the data home along with a second copy addressed by the server's
//! network name, for use from other containers.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use blueprint::ClusterConnection;
use blueprint::paths::{self, KubeConfigPaths};
use blueprint::resource::types::{Image, KeyValue, Port, Volume};
use blueprint::resource::{Container, K8sCluster, ResourceSpec};
use rand::Rng;
use regex::Regex;

use super::Provider;
use crate::error::{Error, Result};
use crate::lifecycle::{ProvisionOptions, ProvisionState, StateMachine, wait_for};
use crate::runtime::{ContainerRuntime, KubernetesClient};

const BASE_IMAGE: &str = "rancher/k3s";
const DEFAULT_VERSION: &str = "v1.0.0";
const MAX_NAME_LEN: usize = 35;
const KUBECONFIG_OUTPUT: &str = "/output/kubeconfig.yaml";
const IMAGES_MOUNT: &str = "/images";
const READY_LOG_LINE: &str = "Running kubelet";
const LOOPBACK_SERVER: &str = "server: https://127.0.0.1";
const CLUSTER_SECRET: &str = "mysupersecret";

/// Pods that must be running before the cluster counts as healthy
pub const DEFAULT_HEALTH_PODS: &[&str] = &["app=local-path-provisioner", "k8s-app=kube-dns"];

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?$").expect("valid hostname pattern")
});

/// Check that `name` is an RFC 1123 host name label no longer than 35
/// characters.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: String| Error::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("no name provided".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(format!(
            "name is too long ({} > {MAX_NAME_LEN})",
            name.len()
        )));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must not start or end with a dash".to_string()));
    }
    if !HOSTNAME.is_match(name) {
        return Err(invalid(
            "may only contain letters, digits, and dashes".to_string(),
        ));
    }
    Ok(())
}

/// Provisions a `k8s_cluster` with the k3s driver.
pub struct K3sProvider {
    cluster: K8sCluster,
    runtime: Arc<dyn ContainerRuntime>,
    kube: Arc<dyn KubernetesClient>,
    home: PathBuf,
    options: ProvisionOptions,
    machine: StateMachine,
}

impl K3sProvider {
    pub fn new(
        cluster: K8sCluster,
        runtime: Arc<dyn ContainerRuntime>,
        kube: Arc<dyn KubernetesClient>,
    ) -> Self {
        let machine = StateMachine::new(cluster.info.id());
        Self {
            cluster,
            runtime,
            kube,
            home: paths::data_home(),
            options: ProvisionOptions::default(),
            machine,
        }
    }

    /// Write artifacts under a different data home.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn with_options(mut self, options: ProvisionOptions) -> Self {
        self.options = options;
        self
    }

    /// States visited by the last `create`.
    pub fn history(&self) -> &[ProvisionState] {
        self.machine.history()
    }

    fn name(&self) -> &str {
        &self.cluster.info.name
    }

    fn server_name(&self) -> String {
        format!("server.{}", self.name())
    }

    fn volume_name(&self) -> String {
        format!("{}.volume", self.name())
    }

    fn network(&self) -> &str {
        self.cluster
            .networks
            .first()
            .map_or("", |n| n.name.as_str())
    }

    fn kubeconfig_paths(&self) -> KubeConfigPaths {
        paths::kubeconfig_paths(&self.home, self.name())
    }

    /// Container definition for the k3s server.
    fn server_spec(&self, volume: &str, api_port: u16) -> Container {
        let version = self
            .cluster
            .version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VERSION);

        let mut spec = Container::new(self.server_name());
        spec.image = Some(Image {
            name: format!("{BASE_IMAGE}:{version}"),
            ..Default::default()
        });
        spec.networks = self.cluster.networks.clone();
        spec.privileged = true;

        spec.volumes.push(Volume {
            source: volume.to_string(),
            destination: IMAGES_MOUNT.to_string(),
            kind: "volume".to_string(),
            read_only: false,
        });
        spec.volumes.extend(self.cluster.volumes.iter().cloned());

        spec.environment = vec![
            KeyValue {
                key: "K3S_KUBECONFIG_OUTPUT".to_string(),
                value: KUBECONFIG_OUTPUT.to_string(),
            },
            KeyValue {
                key: "K3S_CLUSTER_SECRET".to_string(),
                value: CLUSTER_SECRET.to_string(),
            },
        ];
        spec.env_var = self.cluster.env_var.clone();

        spec.ports.push(Port {
            local: api_port,
            remote: None,
            host: Some(api_port),
            protocol: "tcp".to_string(),
        });
        spec.ports.extend(self.cluster.ports.iter().cloned());

        spec.command = vec![
            "server".to_string(),
            format!("--https-listen-port={api_port}"),
            "--no-deploy=traefik".to_string(),
        ];
        spec
    }

    fn provision(&mut self) -> Result<()> {
        let name = self.name().to_string();
        validate_name(&name)?;

        let existing = self
            .runtime
            .find_containers(&self.server_name(), self.network())
            .map_err(|e| Error::runtime(format!("look up cluster {name}"), e))?;
        if !existing.is_empty() {
            return Err(Error::AlreadyExists { name });
        }

        self.machine.advance(ProvisionState::Creating)?;
        let volume = self
            .runtime
            .create_volume(&self.volume_name())
            .map_err(|e| Error::runtime(format!("create volume for cluster {name}"), e))?;

        let api_port = rand::thread_rng().gen_range(64000..=64999);
        let spec = self.server_spec(&volume, api_port);
        log::info!("Creating k3s server {} on port {api_port}", spec.info.name);
        let id = match self.runtime.create_container(&spec) {
            Ok(id) => id,
            Err(e) => {
                if let Err(cleanup) = self.runtime.remove_volume(&volume) {
                    log::warn!("Could not remove volume {volume}: {cleanup}");
                }
                return Err(Error::runtime(format!("create server for cluster {name}"), e));
            }
        };

        self.machine.advance(ProvisionState::WaitingReady)?;
        self.wait_until_started(&id)?;

        self.machine.advance(ProvisionState::Finalizing)?;
        let kubeconfig = self.write_kubeconfigs(&id)?;
        self.save_connection(api_port)?;

        self.kube
            .set_config(&kubeconfig.host)
            .and_then(|()| {
                let pods: Vec<String> = DEFAULT_HEALTH_PODS
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                self.kube
                    .health_check_pods(&pods, self.options.health_timeout)
            })
            .map_err(|source| Error::HealthCheck {
                name: name.clone(),
                source,
            })?;

        self.import_images(&id, &volume)?;

        self.machine.advance(ProvisionState::Ready)?;
        Ok(())
    }

    fn wait_until_started(&self, id: &str) -> Result<()> {
        let name = self.name();
        log::debug!("Waiting for cluster {name} to start");
        let started = wait_for(
            self.options.start_timeout,
            self.options.poll_interval,
            || Ok(self.runtime.container_logs(id)?.contains(READY_LOG_LINE)),
        )
        .map_err(|source| Error::Startup {
            name: name.to_string(),
            source,
        })?;

        if !started {
            return Err(Error::Timeout {
                name: name.to_string(),
                timeout: self.options.start_timeout,
            });
        }
        Ok(())
    }

    /// Copy the kubeconfig out of the server and derive the in-network copy.
    fn write_kubeconfigs(&self, id: &str) -> Result<KubeConfigPaths> {
        let name = self.name();
        let paths = self.kubeconfig_paths();
        let artifact = |what: &str, source: anyhow::Error| Error::Artifact {
            name: name.to_string(),
            what: what.to_string(),
            source,
        };

        fs::create_dir_all(&paths.dir).map_err(|e| artifact("config folder", e.into()))?;
        self.runtime
            .copy_from_container(id, KUBECONFIG_OUTPUT, &paths.host)
            .map_err(|e| artifact("kubeconfig", e))?;

        let config = fs::read_to_string(&paths.host).map_err(|e| artifact("kubeconfig", e.into()))?;
        let server = format!(
            "server: https://{}",
            paths::fqdn(&self.server_name(), self.network())
        );
        fs::write(&paths.docker, config.replace(LOOPBACK_SERVER, &server))
            .map_err(|e| artifact("docker kubeconfig", e.into()))?;

        log::debug!("Wrote kubeconfig for {name} to {}", paths.host.display());
        Ok(paths)
    }

    fn save_connection(&self, api_port: u16) -> Result<()> {
        let connection = ClusterConnection {
            local_address: paths::docker_ip(),
            remote_address: paths::fqdn(&self.server_name(), self.network()),
            api_port,
            scheme: "https".to_string(),
            node_count: self.cluster.nodes,
        };
        connection
            .save(&self.home, self.name())
            .map_err(|e| Error::Artifact {
                name: self.name().to_string(),
                what: "connection config".to_string(),
                source: e.into(),
            })
    }

    fn import_images(&self, id: &str, volume: &str) -> Result<()> {
        if self.cluster.images.is_empty() {
            return Ok(());
        }

        let name = self.name();
        let images: Vec<String> = self.cluster.images.iter().map(|i| i.name.clone()).collect();
        log::info!("Importing {} image(s) into cluster {name}", images.len());

        let import_error = |source| Error::ImageImport {
            name: name.to_string(),
            source,
        };
        let archives = self
            .runtime
            .save_images(&images, volume)
            .map_err(import_error)?;
        for archive in archives {
            let command = vec![
                "ctr".to_string(),
                "image".to_string(),
                "import".to_string(),
                format!("{IMAGES_MOUNT}/{archive}"),
            ];
            self.runtime.exec(id, &command).map_err(import_error)?;
        }
        Ok(())
    }
}

impl Provider for K3sProvider {
    fn create(&mut self) -> Result<()> {
        log::info!("Creating cluster {}", self.name());
        self.machine = StateMachine::new(self.cluster.info.id());

        let result = self.provision();
        if let Err(e) = &result {
            self.machine.fail();
            log::warn!("Cluster {} failed: {e}", self.name());
        }
        result
    }

    fn destroy(&mut self) -> Result<()> {
        let name = self.name().to_string();
        log::info!("Destroying cluster {name}");

        for id in self.lookup()? {
            self.runtime
                .remove_container(&id)
                .map_err(|e| Error::runtime(format!("remove server of cluster {name}"), e))?;
        }
        self.runtime
            .remove_volume(&self.volume_name())
            .map_err(|e| Error::runtime(format!("remove volume of cluster {name}"), e))?;

        let dir = self.kubeconfig_paths().dir;
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }

        self.machine = StateMachine::new(self.cluster.info.id());
        Ok(())
    }

    fn lookup(&self) -> Result<Vec<String>> {
        self.runtime
            .find_containers(&self.server_name(), self.network())
            .map_err(|e| Error::runtime(format!("look up cluster {}", self.name()), e))
    }

    fn state(&self) -> ProvisionState {
        self.machine.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::runtime::{MockKubernetes, MockRuntime};
    use blueprint::resource::types::NetworkAttachment;
    use std::time::Duration;
    use tempfile::TempDir;

    const KUBECONFIG: &str = "apiVersion: v1\nclusters:\n- cluster:\n    server: https://127.0.0.1:64123\n";

    fn cluster(name: &str) -> K8sCluster {
        let mut cluster = K8sCluster::new(name);
        cluster.driver = "k3s".to_string();
        cluster.networks.push(NetworkAttachment {
            name: "network.cloud".to_string(),
            ..NetworkAttachment::default()
        });
        cluster
    }

    fn fast() -> ProvisionOptions {
        ProvisionOptions {
            start_timeout: Duration::from_millis(30),
            health_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(5),
        }
    }

    fn ready_runtime() -> MockRuntime {
        MockRuntime::new()
            .with_logs("level=info msg=\"Running kubelet\"")
            .with_file(KUBECONFIG_OUTPUT, KUBECONFIG)
    }

    fn provider(
        tmp: &TempDir,
        cluster: K8sCluster,
        runtime: &MockRuntime,
        kube: &MockKubernetes,
    ) -> K3sProvider {
        K3sProvider::new(cluster, Arc::new(runtime.clone()), Arc::new(kube.clone()))
            .with_home(tmp.path())
            .with_options(fast())
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("k3s").is_ok());
        assert!(validate_name("My-Cluster-01").is_ok());
        assert!(validate_name(&"a".repeat(35)).is_ok());

        for bad in ["", "-k3s", "k3s-", "k3s_cluster", "k3s.dev", &"a".repeat(36)] {
            assert!(
                matches!(validate_name(bad), Err(Error::InvalidName { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_create_provisions_server() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        let kube = MockKubernetes::new();
        let mut p = provider(&tmp, cluster("k3s"), &runtime, &kube);

        p.create().unwrap();

        assert_eq!(p.state(), ProvisionState::Ready);
        assert_eq!(
            p.history(),
            &[
                ProvisionState::NotPresent,
                ProvisionState::Creating,
                ProvisionState::WaitingReady,
                ProvisionState::Finalizing,
                ProvisionState::Ready,
            ]
        );

        assert!(runtime.has_volume("k3s.volume"));
        let containers = runtime.containers();
        let server = containers.values().next().unwrap();
        assert_eq!(server.info.name, "server.k3s");
        assert_eq!(server.image.as_ref().unwrap().name, "rancher/k3s:v1.0.0");
        assert!(server.privileged);
        assert_eq!(server.volumes[0].destination, "/images");
        assert_eq!(server.volumes[0].kind, "volume");
        assert_eq!(server.environment[0].key, "K3S_KUBECONFIG_OUTPUT");
        assert_eq!(server.environment[0].value, "/output/kubeconfig.yaml");
        assert_eq!(server.environment[1].key, "K3S_CLUSTER_SECRET");

        let port = server.ports[0].local;
        assert!((64000..=64999).contains(&port));
        assert_eq!(server.ports[0].host, Some(port));
        assert_eq!(
            server.command,
            vec![
                "server".to_string(),
                format!("--https-listen-port={port}"),
                "--no-deploy=traefik".to_string(),
            ]
        );
    }

    #[test]
    fn test_create_writes_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        let kube = MockKubernetes::new();
        let mut p = provider(&tmp, cluster("k3s"), &runtime, &kube);

        p.create().unwrap();

        let paths = paths::kubeconfig_paths(tmp.path(), "k3s");
        assert_eq!(fs::read_to_string(&paths.host).unwrap(), KUBECONFIG);
        let docker = fs::read_to_string(&paths.docker).unwrap();
        assert!(docker.contains("server: https://server.k3s.cloud.berth.run:64123"));
        assert!(!docker.contains("127.0.0.1"));

        let connection = ClusterConnection::load(tmp.path(), "k3s").unwrap();
        let port = runtime.containers().values().next().unwrap().ports[0].local;
        assert_eq!(connection.api_port, port);
        assert_eq!(connection.scheme, "https");
        assert_eq!(connection.remote_address, "server.k3s.cloud.berth.run");
        assert_eq!(connection.node_count, 1);

        assert_eq!(kube.config(), Some(paths.host));
        let checked = kube.checked();
        assert_eq!(
            checked[0].0,
            vec!["app=local-path-provisioner", "k8s-app=kube-dns"]
        );
        assert_eq!(checked[0].1, Duration::from_secs(5));
    }

    #[test]
    fn test_custom_version() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        let mut c = cluster("k3s");
        c.version = Some("v1.18.2-k3s1".to_string());
        let mut p = provider(&tmp, c, &runtime, &MockKubernetes::new());

        p.create().unwrap();

        let containers = runtime.containers();
        let server = containers.values().next().unwrap();
        assert_eq!(
            server.image.as_ref().unwrap().name,
            "rancher/k3s:v1.18.2-k3s1"
        );
    }

    #[test]
    fn test_existing_cluster_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        let kube = MockKubernetes::new();

        provider(&tmp, cluster("k3s"), &runtime, &kube)
            .create()
            .unwrap();
        let mut second = provider(&tmp, cluster("k3s"), &runtime, &kube);
        let err = second.create().unwrap_err();

        assert!(matches!(err, Error::AlreadyExists { ref name } if name == "k3s"));
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert_eq!(second.state(), ProvisionState::Failed);
        assert_eq!(runtime.containers().len(), 1);
    }

    #[test]
    fn test_invalid_name_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        let mut p = provider(&tmp, cluster("bad_name"), &runtime, &MockKubernetes::new());

        let err = p.create().unwrap_err();

        assert!(matches!(err, Error::InvalidName { .. }));
        assert_eq!(p.state(), ProvisionState::Failed);
        assert!(runtime.containers().is_empty());
        assert!(!runtime.has_volume("bad_name.volume"));
    }

    #[test]
    fn test_start_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = MockRuntime::new()
            .with_logs("starting k3s")
            .with_file(KUBECONFIG_OUTPUT, KUBECONFIG);
        let mut p = provider(&tmp, cluster("k3s"), &runtime, &MockKubernetes::new());

        let err = p.create().unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert!(err.is_partial());
        assert_eq!(
            p.history(),
            &[
                ProvisionState::NotPresent,
                ProvisionState::Creating,
                ProvisionState::WaitingReady,
                ProvisionState::Failed,
            ]
        );
    }

    #[test]
    fn test_runtime_rejection_is_not_a_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        runtime.fail_on("create_container");
        let mut p = provider(&tmp, cluster("k3s"), &runtime, &MockKubernetes::new());

        let err = p.create().unwrap_err();

        assert!(matches!(err, Error::Runtime { .. }));
        assert_eq!(err.category(), ErrorCategory::Runtime);
        assert!(!err.is_partial());
        assert_eq!(p.state(), ProvisionState::Failed);
        assert!(runtime.containers().is_empty());
        assert!(!runtime.has_volume("k3s.volume"));
    }

    #[test]
    fn test_log_failure_is_partial() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        runtime.fail_on("container_logs");
        let mut p = provider(&tmp, cluster("k3s"), &runtime, &MockKubernetes::new());

        let err = p.create().unwrap_err();

        assert!(matches!(err, Error::Startup { ref name, .. } if name == "k3s"));
        assert!(err.is_partial());
        assert_eq!(runtime.containers().len(), 1);
        assert!(runtime.has_volume("k3s.volume"));

        p.destroy().unwrap();
        assert!(runtime.containers().is_empty());
        assert!(!runtime.has_volume("k3s.volume"));
    }

    #[test]
    fn test_missing_kubeconfig_is_artifact_error() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = MockRuntime::new().with_logs("Running kubelet");
        let mut p = provider(&tmp, cluster("k3s"), &runtime, &MockKubernetes::new());

        let err = p.create().unwrap_err();

        assert!(matches!(err, Error::Artifact { .. }));
        assert!(err.is_partial());
    }

    #[test]
    fn test_health_check_failure_is_partial() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        let kube = MockKubernetes::new();
        kube.fail_health_checks();
        let mut p = provider(&tmp, cluster("k3s"), &runtime, &kube);

        let err = p.create().unwrap_err();

        assert!(matches!(err, Error::HealthCheck { .. }));
        assert!(err.is_partial());
        assert_eq!(p.state(), ProvisionState::Failed);
        assert_eq!(p.lookup().unwrap().len(), 1);
    }

    #[test]
    fn test_images_are_imported() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        let mut c = cluster("k3s");
        for name in ["consul:1.8.0", "envoyproxy/envoy:v1.14.3"] {
            c.images.push(Image {
                name: name.to_string(),
                ..Image::default()
            });
        }
        let mut p = provider(&tmp, c, &runtime, &MockKubernetes::new());

        p.create().unwrap();

        assert_eq!(
            runtime.saved_images(),
            vec!["consul:1.8.0", "envoyproxy/envoy:v1.14.3"]
        );
        let execs = runtime.execs();
        assert_eq!(execs.len(), 2);
        assert_eq!(execs[0].1, vec!["ctr", "image", "import", "/images/images-0.tar"]);
        assert_eq!(execs[1].1, vec!["ctr", "image", "import", "/images/images-1.tar"]);
    }

    #[test]
    fn test_image_import_failure_is_partial() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        runtime.fail_on("exec");
        let mut c = cluster("k3s");
        c.images.push(Image {
            name: "consul:1.8.0".to_string(),
            ..Image::default()
        });
        let mut p = provider(&tmp, c, &runtime, &MockKubernetes::new());

        let err = p.create().unwrap_err();

        assert!(matches!(err, Error::ImageImport { .. }));
        assert!(err.is_partial());
    }

    #[test]
    fn test_destroy_removes_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        let kube = MockKubernetes::new();
        let mut p = provider(&tmp, cluster("k3s"), &runtime, &kube);
        p.create().unwrap();

        p.destroy().unwrap();

        assert!(runtime.containers().is_empty());
        assert!(!runtime.has_volume("k3s.volume"));
        assert!(!paths::config_folder(tmp.path(), "k3s").exists());
        assert_eq!(p.state(), ProvisionState::NotPresent);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        let mut p = provider(&tmp, cluster("k3s"), &runtime, &MockKubernetes::new());

        p.destroy().unwrap();
        p.destroy().unwrap();

        p.create().unwrap();
        p.destroy().unwrap();
        p.destroy().unwrap();
        assert!(p.lookup().unwrap().is_empty());
    }

    #[test]
    fn test_recreate_after_partial_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = ready_runtime();
        let kube = MockKubernetes::new();
        kube.fail_health_checks();
        let mut p = provider(&tmp, cluster("k3s"), &runtime, &kube);
        assert!(p.create().unwrap_err().is_partial());

        p.destroy().unwrap();
        let healthy = MockKubernetes::new();
        let mut retry = provider(&tmp, cluster("k3s"), &runtime, &healthy);
        retry.create().unwrap();
        assert_eq!(retry.state(), ProvisionState::Ready);
    }
}
