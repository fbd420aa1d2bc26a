//! `berth cluster up|down`
//!
//! Clusters are independent of each other, so they are handled in parallel
//! on a bounded pool. One failing cluster does not stop the others.

use anyhow::{Context as _, Result, bail};
use blueprint::resource::K8sCluster;
use blueprint::{Config, Resource};
use provision::{ContainerRuntime, K3sProvider, KubernetesClient, Provider, ProvisionOptions};
use rayon::prelude::*;
use std::sync::Arc;

use crate::Context;
use crate::cli::{ClusterArgs, ClusterCommand};
use crate::docker::DockerCli;
use crate::kubectl::KubectlClient;
use crate::paths;
use crate::progress;
use crate::ui;

const K3S_DRIVER: &str = "k3s";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Up,
    Down,
}

impl Action {
    const fn verb(self) -> &'static str {
        match self {
            Self::Up => "Creating",
            Self::Down => "Destroying",
        }
    }
}

/// Enabled k3s clusters, optionally narrowed to one name or identity
fn select(config: &Config, only: Option<&str>) -> Vec<K8sCluster> {
    config
        .resources()
        .iter()
        .filter_map(|resource| match resource {
            Resource::K8sCluster(cluster) => Some(cluster),
            _ => None,
        })
        .filter(|cluster| {
            if cluster.info.disabled {
                log::info!("Skipping disabled cluster {}", cluster.info.name);
                return false;
            }
            if !cluster.driver.is_empty() && cluster.driver != K3S_DRIVER {
                log::warn!(
                    "Skipping cluster {}: driver '{}' is not supported",
                    cluster.info.name,
                    cluster.driver
                );
                return false;
            }
            only.is_none_or(|o| o == cluster.info.name || o == cluster.info.id())
        })
        .cloned()
        .collect()
}

fn run_one(
    action: Action,
    cluster: &K8sCluster,
    runtime: &Arc<dyn ContainerRuntime>,
    options: ProvisionOptions,
) -> provision::Result<()> {
    let kube: Arc<dyn KubernetesClient> = Arc::new(KubectlClient::new());
    let mut provider =
        K3sProvider::new(cluster.clone(), Arc::clone(runtime), kube).with_options(options);
    match action {
        Action::Up => provider.create(),
        Action::Down => provider.destroy(),
    }
}

/// Print each failure with its advice and return how many failed
fn report(action: Action, results: &[(String, provision::Result<()>)]) -> usize {
    let mut failed = 0;
    for (id, result) in results {
        match result {
            Ok(()) => match action {
                Action::Up => ui::success(&format!("{id} is ready")),
                Action::Down => ui::success(&format!("{id} destroyed")),
            },
            Err(err) => {
                failed += 1;
                let category = err.category();
                ui::error(&format!("{id}: {err}"));
                if let Some(cause) = std::error::Error::source(err) {
                    ui::dim(&format!("caused by: {cause}"));
                }
                ui::dim(category.advice());
                if err.is_partial() {
                    ui::dim("Run `berth cluster down` to remove what was created");
                }
            }
        }
    }
    failed
}

fn execute(ctx: &Context, action: Action, args: &ClusterArgs) -> Result<()> {
    let config = super::load(ctx, &args.parse)?;
    let clusters = select(&config, args.only.as_deref());
    if clusters.is_empty() {
        if !ctx.quiet {
            ui::warn("No k3s clusters to act on");
        }
        return Ok(());
    }

    let options = ctx.settings.provision_options()?;
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerCli::connect()?);

    if !ctx.quiet {
        ui::info(&format!(
            "{} {} cluster(s) with {} job(s)",
            action.verb(),
            clusters.len(),
            args.jobs
        ));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.max(1))
        .build()
        .context("Failed to create cluster thread pool")?;

    let pb = progress::bar(clusters.len() as u64, action.verb(), ctx.quiet);
    let results: Vec<(String, provision::Result<()>)> = pool.install(|| {
        clusters
            .par_iter()
            .map(|cluster| {
                let id = cluster.info.id();
                pb.set_message(id.clone());
                let result = run_one(action, cluster, &runtime, options);
                pb.inc(1);
                (id, result)
            })
            .collect()
    });
    pb.finish_and_clear();

    let failed = report(action, &results);
    if action == Action::Up && ctx.verbose > 0 {
        let home = paths::data_home();
        for (cluster, (_, result)) in clusters.iter().zip(&results) {
            if result.is_ok() {
                let kubeconfig = blueprint::paths::kubeconfig_paths(&home, &cluster.info.name);
                ui::kv(&cluster.info.name, &kubeconfig.host.display().to_string());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} cluster(s) failed", results.len());
    }
    Ok(())
}

pub fn run(ctx: &Context, command: &ClusterCommand) -> Result<()> {
    match command {
        ClusterCommand::Up(args) => execute(ctx, Action::Up, args),
        ClusterCommand::Down(args) => execute(ctx, Action::Down, args),
    }
}
