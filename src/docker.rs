//! Container runtime backed by the `docker` CLI
//!
//! Containers are named by their fully-qualified name on their first network
//! (`server.k3s.cloud.berth.run`), so lookups by resource name and network
//! map onto a single `--filter name=` query.

use anyhow::{Context, Result};
use blueprint::paths::fqdn;
use blueprint::resource::Container;
use provision::ContainerRuntime;
use std::fs;
use std::path::Path;

use crate::paths;
use crate::runner;

const DOCKER: &str = "docker";
const HELPER_IMAGE: &str = "alpine:latest";

/// Runtime driving a local Docker daemon
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerCli;

impl DockerCli {
    /// Check that the CLI is installed and the daemon answers
    pub fn connect() -> Result<Self> {
        if !runner::command_exists(DOCKER) {
            anyhow::bail!("docker is not installed or not on PATH");
        }
        runner::run_capture(DOCKER, &["version", "--format", "{{.Server.Version}}"])
            .context("Docker daemon is not reachable")?;
        Ok(Self)
    }

    fn docker(args: &[&str]) -> Result<String> {
        runner::run_capture(DOCKER, args)
    }
}

/// Container name for `name` on `network`, or `name` alone without a network
fn container_name(name: &str, network: &str) -> String {
    if network.is_empty() {
        name.to_string()
    } else {
        fqdn(name, network)
    }
}

fn network_name(id: &str) -> &str {
    id.strip_prefix("network.").unwrap_or(id)
}

/// `docker run` arguments for a container definition
fn run_args(spec: &Container) -> Vec<String> {
    let first_network = spec.networks.first().map_or("", |n| n.name.as_str());
    let name = container_name(&spec.info.name, first_network);

    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        name.clone(),
        "--hostname".to_string(),
        name,
    ];

    if let Some(network) = spec.networks.first() {
        args.push("--network".to_string());
        args.push(network_name(&network.name).to_string());
        if let Some(ip) = &network.ip_address {
            args.push("--ip".to_string());
            args.push(ip.clone());
        }
        for alias in &network.aliases {
            args.push("--network-alias".to_string());
            args.push(alias.clone());
        }
    }

    if spec.privileged {
        args.push("--privileged".to_string());
    }

    for volume in &spec.volumes {
        if volume.kind == "tmpfs" {
            args.push("--tmpfs".to_string());
            args.push(volume.destination.clone());
            continue;
        }
        let mut mount = format!("{}:{}", volume.source, volume.destination);
        if volume.read_only {
            mount.push_str(":ro");
        }
        args.push("-v".to_string());
        args.push(mount);
    }

    let env = spec
        .environment
        .iter()
        .map(|kv| (kv.key.as_str(), kv.value.as_str()))
        .chain(spec.env_var.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    for (key, value) in env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }

    for port in &spec.ports {
        let host = port.host.unwrap_or(port.local);
        args.push("-p".to_string());
        args.push(format!("{host}:{}/{}", port.local, port.protocol));
    }

    if !spec.entrypoint.is_empty() {
        args.push("--entrypoint".to_string());
        args.push(spec.entrypoint.join(" "));
    }

    if let Some(image) = &spec.image {
        args.push(image.name.clone());
    }
    args.extend(spec.command.iter().cloned());
    args
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl ContainerRuntime for DockerCli {
    fn find_containers(&self, name: &str, network: &str) -> Result<Vec<String>> {
        let filter = format!("name=^{}$", container_name(name, network));
        let out = Self::docker(&["ps", "-a", "-q", "--filter", &filter])?;
        Ok(lines(&out))
    }

    fn create_volume(&self, name: &str) -> Result<String> {
        Self::docker(&["volume", "create", name])
            .with_context(|| format!("Failed to create volume {name}"))
    }

    fn remove_volume(&self, name: &str) -> Result<()> {
        let existing = Self::docker(&["volume", "ls", "-q", "--filter", &format!("name=^{name}$")])?;
        if lines(&existing).is_empty() {
            return Ok(());
        }
        Self::docker(&["volume", "rm", "-f", name])
            .with_context(|| format!("Failed to remove volume {name}"))?;
        Ok(())
    }

    fn create_container(&self, spec: &Container) -> Result<String> {
        let args = run_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Self::docker(&args).with_context(|| format!("Failed to start {}", spec.info.name))
    }

    fn remove_container(&self, id: &str) -> Result<()> {
        Self::docker(&["rm", "-f", "-v", id])
            .with_context(|| format!("Failed to remove container {id}"))?;
        Ok(())
    }

    fn container_logs(&self, id: &str) -> Result<String> {
        runner::run_combined(DOCKER, &["logs", id])
    }

    fn copy_from_container(&self, id: &str, source: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        Self::docker(&["cp", &format!("{id}:{source}"), &dest])?;
        Ok(())
    }

    fn exec(&self, id: &str, command: &[String]) -> Result<()> {
        let mut args = vec!["exec", id];
        args.extend(command.iter().map(String::as_str));
        Self::docker(&args)
            .with_context(|| format!("Failed to run {} in {id}", command.join(" ")))?;
        Ok(())
    }

    fn save_images(&self, images: &[String], volume: &str) -> Result<Vec<String>> {
        let dir = paths::image_cache_dir();
        fs::create_dir_all(&dir).with_context(|| format!("Could not create {}", dir.display()))?;

        let archive = format!(
            "images-{}.tar",
            &blake3::hash(images.join(",").as_bytes()).to_hex().as_str()[..16]
        );
        let host_path = dir.join(&archive);
        let host_path_str = host_path.to_string_lossy();

        let mut save = vec!["save", "-o", &*host_path_str];
        save.extend(images.iter().map(String::as_str));
        Self::docker(&save).context("Failed to save images")?;

        let mount = format!("{volume}:/images");
        let helper = Self::docker(&["create", "-v", &mount, HELPER_IMAGE])?;
        let copied = Self::docker(&["cp", &host_path_str, &format!("{helper}:/images/{archive}")]);
        Self::docker(&["rm", "-f", &helper])?;
        copied.context("Failed to copy images into volume")?;

        Ok(vec![archive])
    }
}
