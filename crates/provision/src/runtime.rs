//! Capabilities a provider drives.
//!
//! Providers never talk to Docker or Kubernetes directly. They go through
//! [`ContainerRuntime`] and [`KubernetesClient`], which the binary implements
//! on top of the `docker` and `kubectl` CLIs and tests replace with
//! [`MockRuntime`] and [`MockKubernetes`].

use anyhow::{Result, anyhow, bail};
use blueprint::resource::Container;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Container runtime operations used by providers.
pub trait ContainerRuntime: Send + Sync {
    /// IDs of containers named `name` attached to `network`.
    fn find_containers(&self, name: &str, network: &str) -> Result<Vec<String>>;

    /// Create a named volume, returning its ID.
    fn create_volume(&self, name: &str) -> Result<String>;

    /// Remove a named volume. Removing a missing volume succeeds.
    fn remove_volume(&self, name: &str) -> Result<()>;

    /// Create and start a container, returning its ID.
    ///
    /// The container's `info.name` is the container name.
    fn create_container(&self, spec: &Container) -> Result<String>;

    /// Stop and remove a container.
    fn remove_container(&self, id: &str) -> Result<()>;

    /// Combined stdout and stderr of a container so far.
    fn container_logs(&self, id: &str) -> Result<String>;

    /// Copy a single file out of a container.
    fn copy_from_container(&self, id: &str, source: &str, dest: &Path) -> Result<()>;

    /// Run a command inside a container, failing on a non-zero exit.
    fn exec(&self, id: &str, command: &[String]) -> Result<()>;

    /// Save local images as archives into a volume.
    ///
    /// Returns the archive file names relative to the volume root.
    fn save_images(&self, images: &[String], volume: &str) -> Result<Vec<String>>;
}

/// Kubernetes API operations used by providers.
pub trait KubernetesClient: Send + Sync {
    /// Point the client at a kubeconfig file.
    fn set_config(&self, kubeconfig: &Path) -> Result<()>;

    /// Wait until pods matching every selector are running.
    fn health_check_pods(&self, selectors: &[String], timeout: Duration) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Mocks
// ============================================================================

#[derive(Debug, Default)]
struct RuntimeState {
    containers: BTreeMap<String, Container>,
    volumes: HashSet<String>,
    logs: BTreeMap<String, String>,
    files: BTreeMap<String, String>,
    saved_images: Vec<String>,
    execs: Vec<(String, Vec<String>)>,
    fail: HashSet<String>,
    next_id: usize,
}

/// In-memory container runtime for tests.
///
/// Containers log `default_logs` unless overridden with
/// [`MockRuntime::set_logs`]. Any operation can be made to fail with
/// [`MockRuntime::fail_on`], keyed by the trait method name.
#[derive(Debug, Clone, Default)]
pub struct MockRuntime {
    state: Arc<Mutex<RuntimeState>>,
    default_logs: String,
}

impl MockRuntime {
    /// Create a new empty mock runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs every new container starts with.
    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.default_logs = logs.into();
        self
    }

    /// Content served for `path` by `copy_from_container`.
    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        lock(&self.state).files.insert(path.into(), content.into());
        self
    }

    /// Make the named operation fail.
    pub fn fail_on(&self, operation: &str) {
        lock(&self.state).fail.insert(operation.to_string());
    }

    /// Replace the logs of a container.
    pub fn set_logs(&self, id: &str, logs: impl Into<String>) {
        lock(&self.state).logs.insert(id.to_string(), logs.into());
    }

    /// Containers that currently exist, by ID.
    pub fn containers(&self) -> BTreeMap<String, Container> {
        lock(&self.state).containers.clone()
    }

    /// Whether a volume with this name exists.
    pub fn has_volume(&self, name: &str) -> bool {
        lock(&self.state).volumes.contains(name)
    }

    /// Commands run with `exec`, with the container ID.
    pub fn execs(&self) -> Vec<(String, Vec<String>)> {
        lock(&self.state).execs.clone()
    }

    /// Images passed to `save_images`.
    pub fn saved_images(&self) -> Vec<String> {
        lock(&self.state).saved_images.clone()
    }

    fn check(&self, operation: &str) -> Result<()> {
        if lock(&self.state).fail.contains(operation) {
            bail!("{operation} failed");
        }
        Ok(())
    }
}

impl ContainerRuntime for MockRuntime {
    fn find_containers(&self, name: &str, network: &str) -> Result<Vec<String>> {
        self.check("find_containers")?;
        let network = network.strip_prefix("network.").unwrap_or(network);
        Ok(lock(&self.state)
            .containers
            .iter()
            .filter(|(_, c)| {
                c.info.name == name
                    && (network.is_empty()
                        || c.networks.iter().any(|n| {
                            n.name.strip_prefix("network.").unwrap_or(&n.name) == network
                        }))
            })
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn create_volume(&self, name: &str) -> Result<String> {
        self.check("create_volume")?;
        lock(&self.state).volumes.insert(name.to_string());
        Ok(name.to_string())
    }

    fn remove_volume(&self, name: &str) -> Result<()> {
        self.check("remove_volume")?;
        lock(&self.state).volumes.remove(name);
        Ok(())
    }

    fn create_container(&self, spec: &Container) -> Result<String> {
        self.check("create_container")?;
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = format!("container-{}", state.next_id);
        state.containers.insert(id.clone(), spec.clone());
        state.logs.insert(id.clone(), self.default_logs.clone());
        Ok(id)
    }

    fn remove_container(&self, id: &str) -> Result<()> {
        self.check("remove_container")?;
        let mut state = lock(&self.state);
        state.containers.remove(id);
        state.logs.remove(id);
        Ok(())
    }

    fn container_logs(&self, id: &str) -> Result<String> {
        self.check("container_logs")?;
        lock(&self.state)
            .logs
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("no such container: {id}"))
    }

    fn copy_from_container(&self, id: &str, source: &str, dest: &Path) -> Result<()> {
        self.check("copy_from_container")?;
        let content = {
            let state = lock(&self.state);
            if !state.containers.contains_key(id) {
                bail!("no such container: {id}");
            }
            state
                .files
                .get(source)
                .cloned()
                .ok_or_else(|| anyhow!("no such file in container: {source}"))?
        };
        std::fs::write(dest, content)?;
        Ok(())
    }

    fn exec(&self, id: &str, command: &[String]) -> Result<()> {
        self.check("exec")?;
        lock(&self.state)
            .execs
            .push((id.to_string(), command.to_vec()));
        Ok(())
    }

    fn save_images(&self, images: &[String], volume: &str) -> Result<Vec<String>> {
        self.check("save_images")?;
        let mut state = lock(&self.state);
        if !state.volumes.contains(volume) {
            bail!("no such volume: {volume}");
        }
        state.saved_images.extend(images.iter().cloned());
        Ok(images
            .iter()
            .enumerate()
            .map(|(i, _)| format!("images-{i}.tar"))
            .collect())
    }
}

#[derive(Debug, Default)]
struct KubernetesState {
    config: Option<PathBuf>,
    checked: Vec<(Vec<String>, Duration)>,
    fail: bool,
}

/// In-memory Kubernetes client for tests.
#[derive(Debug, Clone, Default)]
pub struct MockKubernetes {
    state: Arc<Mutex<KubernetesState>>,
}

impl MockKubernetes {
    /// Create a new mock client whose health checks pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every health check fail.
    pub fn fail_health_checks(&self) {
        lock(&self.state).fail = true;
    }

    /// Kubeconfig passed to `set_config`.
    pub fn config(&self) -> Option<PathBuf> {
        lock(&self.state).config.clone()
    }

    /// Selector lists passed to `health_check_pods`, with their timeouts.
    pub fn checked(&self) -> Vec<(Vec<String>, Duration)> {
        lock(&self.state).checked.clone()
    }
}

impl KubernetesClient for MockKubernetes {
    fn set_config(&self, kubeconfig: &Path) -> Result<()> {
        lock(&self.state).config = Some(kubeconfig.to_path_buf());
        Ok(())
    }

    fn health_check_pods(&self, selectors: &[String], timeout: Duration) -> Result<()> {
        let mut state = lock(&self.state);
        if state.config.is_none() {
            bail!("no kubeconfig set");
        }
        state.checked.push((selectors.to_vec(), timeout));
        if state.fail {
            bail!("pods {selectors:?} not running after {}s", timeout.as_secs());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint::resource::ResourceSpec;
    use blueprint::resource::types::NetworkAttachment;

    fn server(name: &str, network: &str) -> Container {
        let mut c = Container::new(name);
        c.networks.push(NetworkAttachment {
            name: network.to_string(),
            ..NetworkAttachment::default()
        });
        c
    }

    #[test]
    fn test_mock_runtime_finds_by_name_and_network() {
        let runtime = MockRuntime::new();
        let id = runtime
            .create_container(&server("server.k3s", "network.cloud"))
            .unwrap();

        assert_eq!(
            runtime.find_containers("server.k3s", "cloud").unwrap(),
            vec![id]
        );
        assert!(
            runtime
                .find_containers("server.k3s", "network.other")
                .unwrap()
                .is_empty()
        );
        assert!(
            runtime
                .find_containers("server.other", "network.cloud")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_mock_runtime_failure_injection() {
        let runtime = MockRuntime::new();
        runtime.fail_on("create_volume");
        assert!(runtime.create_volume("k3s.volume").is_err());
        assert!(!runtime.has_volume("k3s.volume"));
        assert!(runtime.create_container(&Container::new("web")).is_ok());
    }

    #[test]
    fn test_mock_runtime_logs_and_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = MockRuntime::new()
            .with_logs("starting")
            .with_file("/output/kubeconfig.yaml", "apiVersion: v1\n");
        let id = runtime.create_container(&Container::new("web")).unwrap();

        assert_eq!(runtime.container_logs(&id).unwrap(), "starting");
        runtime.set_logs(&id, "Running kubelet");
        assert_eq!(runtime.container_logs(&id).unwrap(), "Running kubelet");

        let dest = tmp.path().join("kubeconfig.yaml");
        runtime
            .copy_from_container(&id, "/output/kubeconfig.yaml", &dest)
            .unwrap();
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "apiVersion: v1\n");

        runtime.remove_container(&id).unwrap();
        assert!(runtime.container_logs(&id).is_err());
    }

    #[test]
    fn test_mock_kubernetes_requires_config() {
        let kube = MockKubernetes::new();
        let selectors = vec!["k8s-app=kube-dns".to_string()];
        assert!(
            kube.health_check_pods(&selectors, Duration::from_secs(1))
                .is_err()
        );

        kube.set_config(Path::new("/tmp/kubeconfig.yaml")).unwrap();
        kube.health_check_pods(&selectors, Duration::from_secs(1))
            .unwrap();
        assert_eq!(kube.checked().len(), 1);

        kube.fail_health_checks();
        assert!(
            kube.health_check_pods(&selectors, Duration::from_secs(1))
                .is_err()
        );
    }
}
