//! Kubernetes client backed by the `kubectl` CLI

use anyhow::{Context, Result, bail};
use provision::{KubernetesClient, wait_for};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::runner;

const KUBECTL: &str = "kubectl";
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
struct PodStatus {
    #[serde(default)]
    phase: String,
}

/// True when the list has at least one pod and every pod is running
fn all_running(json: &str) -> Result<bool> {
    let list: PodList = serde_json::from_str(json).context("Unexpected kubectl output")?;
    Ok(!list.items.is_empty() && list.items.iter().all(|p| p.status.phase == "Running"))
}

/// Client shelling out to `kubectl --kubeconfig <file>`
#[derive(Debug, Default)]
pub struct KubectlClient {
    config: Mutex<Option<PathBuf>>,
}

impl KubectlClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn kubeconfig(&self) -> Result<PathBuf> {
        let guard = self
            .config
            .lock()
            .map_err(|_| anyhow::anyhow!("kubeconfig lock poisoned"))?;
        guard
            .clone()
            .context("No kubeconfig set for the Kubernetes client")
    }

    fn pods_running(kubeconfig: &str, selector: &str) -> Result<bool> {
        let out = runner::run_capture(
            KUBECTL,
            &[
                "--kubeconfig",
                kubeconfig,
                "get",
                "pods",
                "--all-namespaces",
                "-l",
                selector,
                "-o",
                "json",
            ],
        )?;
        all_running(&out)
    }
}

impl KubernetesClient for KubectlClient {
    fn set_config(&self, kubeconfig: &Path) -> Result<()> {
        if !kubeconfig.exists() {
            bail!("kubeconfig {} does not exist", kubeconfig.display());
        }
        let mut guard = self
            .config
            .lock()
            .map_err(|_| anyhow::anyhow!("kubeconfig lock poisoned"))?;
        *guard = Some(kubeconfig.to_path_buf());
        Ok(())
    }

    fn health_check_pods(&self, selectors: &[String], timeout: Duration) -> Result<()> {
        if !runner::command_exists(KUBECTL) {
            bail!("kubectl is not installed or not on PATH");
        }
        let kubeconfig = self.kubeconfig()?;
        let kubeconfig = kubeconfig.to_string_lossy();

        for selector in selectors {
            log::debug!("Waiting for pods matching {selector}");
            // Query failures count as not ready until the timeout.
            let ready = wait_for(timeout, POLL_INTERVAL, || {
                Ok(Self::pods_running(&kubeconfig, selector).unwrap_or_else(|e| {
                    log::debug!("Pod query for {selector} failed: {e:#}");
                    false
                }))
            })?;
            if !ready {
                bail!(
                    "pods matching {selector} not running after {}s",
                    timeout.as_secs()
                );
            }
        }
        Ok(())
    }
}
