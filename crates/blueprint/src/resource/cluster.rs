//! Cluster resources and the workloads deployed onto them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::types::{
    HealthCheck, Image, NetworkAttachment, Port, Volume, absolutize_volumes, bool_or_string, count,
    single,
};
use super::{CACHE_RESOURCE_NAME, Info, ResourceKind, ResourceSpec, info_accessors, network_id};
use crate::paths::{ensure_absolute, is_local_folder};

fn one() -> u32 {
    1
}

fn cluster_references(networks: &[NetworkAttachment]) -> Vec<String> {
    let mut refs: Vec<String> = networks.iter().map(|n| network_id(&n.name)).collect();
    refs.push(format!(
        "{}.{CACHE_RESOURCE_NAME}",
        ResourceKind::ImageCache
    ));
    refs
}

fn optional_reference(id: &str) -> Vec<String> {
    if id.is_empty() {
        Vec::new()
    } else {
        vec![id.to_string()]
    }
}

/// Kubernetes cluster running inside a container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct K8sCluster {
    #[serde(skip)]
    pub info: Info,

    /// Distribution, only `k3s` is provisioned
    pub driver: String,
    pub version: Option<String>,
    #[serde(default = "one", deserialize_with = "count")]
    pub nodes: u32,
    #[serde(rename = "network")]
    pub networks: Vec<NetworkAttachment>,
    /// Images imported into the cluster after it starts
    #[serde(rename = "image")]
    pub images: Vec<Image>,
    #[serde(rename = "volume")]
    pub volumes: Vec<Volume>,
    #[serde(rename = "port")]
    pub ports: Vec<Port>,
    pub env_var: BTreeMap<String, String>,
}

impl ResourceSpec for K8sCluster {
    const KIND: ResourceKind = ResourceKind::K8sCluster;

    info_accessors!();

    fn normalize(&mut self, file: &Path) {
        absolutize_volumes(&mut self.volumes, file);
    }

    fn references(&self) -> Vec<String> {
        cluster_references(&self.networks)
    }
}

/// Nomad cluster running inside containers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NomadCluster {
    #[serde(skip)]
    pub info: Info,

    pub version: Option<String>,
    #[serde(deserialize_with = "count")]
    pub client_nodes: u32,
    #[serde(rename = "network")]
    pub networks: Vec<NetworkAttachment>,
    #[serde(rename = "image")]
    pub images: Vec<Image>,
    #[serde(rename = "volume")]
    pub volumes: Vec<Volume>,
    pub env_var: BTreeMap<String, String>,
    pub server_config: Option<String>,
    pub client_config: Option<String>,
}

impl ResourceSpec for NomadCluster {
    const KIND: ResourceKind = ResourceKind::NomadCluster;

    info_accessors!();

    fn normalize(&mut self, file: &Path) {
        absolutize_volumes(&mut self.volumes, file);
        for config in [&mut self.server_config, &mut self.client_config]
            .into_iter()
            .flatten()
        {
            *config = ensure_absolute(config, file);
        }
    }

    fn references(&self) -> Vec<String> {
        cluster_references(&self.networks)
    }
}

/// Helm chart installed into a Kubernetes cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Helm {
    #[serde(skip)]
    pub info: Info,

    pub cluster: String,
    /// Local chart folder or a repository chart reference
    pub chart: String,
    /// Release name, defaults to the resource name
    pub chart_name: String,
    pub version: Option<String>,
    pub namespace: Option<String>,
    /// Values file
    pub values: String,
    pub values_string: BTreeMap<String, String>,
    #[serde(deserialize_with = "single")]
    pub health_check: Option<HealthCheck>,
}

impl ResourceSpec for Helm {
    const KIND: ResourceKind = ResourceKind::Helm;

    info_accessors!();

    fn normalize(&mut self, file: &Path) {
        let local_chart = ensure_absolute(&self.chart, file);
        if is_local_folder(&local_chart) {
            self.chart = local_chart;
        }
        if !self.values.is_empty() {
            self.values = ensure_absolute(&self.values, file);
        }
        if self.chart_name.is_empty() {
            self.chart_name = self.info.name.clone();
        }
    }

    fn references(&self) -> Vec<String> {
        optional_reference(&self.cluster)
    }
}

/// Kubernetes manifests applied to a cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct K8sConfig {
    #[serde(skip)]
    pub info: Info,

    pub cluster: String,
    pub paths: Vec<String>,
    #[serde(deserialize_with = "bool_or_string")]
    pub wait_until_ready: bool,
    #[serde(deserialize_with = "single")]
    pub health_check: Option<HealthCheck>,
}

impl ResourceSpec for K8sConfig {
    const KIND: ResourceKind = ResourceKind::K8sConfig;

    info_accessors!();

    fn normalize(&mut self, file: &Path) {
        for path in &mut self.paths {
            *path = ensure_absolute(path, file);
        }
    }

    fn references(&self) -> Vec<String> {
        optional_reference(&self.cluster)
    }
}

/// Nomad job files submitted to a cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NomadJob {
    #[serde(skip)]
    pub info: Info,

    pub cluster: String,
    pub paths: Vec<String>,
    #[serde(deserialize_with = "single")]
    pub health_check: Option<HealthCheck>,
}

impl ResourceSpec for NomadJob {
    const KIND: ResourceKind = ResourceKind::NomadJob;

    info_accessors!();

    fn normalize(&mut self, file: &Path) {
        for path in &mut self.paths {
            *path = ensure_absolute(path, file);
        }
    }

    fn references(&self) -> Vec<String> {
        optional_reference(&self.cluster)
    }
}
