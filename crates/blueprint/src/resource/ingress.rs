//! Ingress resources exposing workloads on the host or on other networks.

use serde::{Deserialize, Serialize};

use super::types::{NetworkAttachment, Port, optional_port, single};
use super::{Info, ResourceKind, ResourceSpec, info_accessors, network_id};

fn network_refs(networks: &[NetworkAttachment]) -> Vec<String> {
    networks.iter().map(|n| network_id(&n.name)).collect()
}

/// Generic traffic route between two endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Ingress {
    #[serde(skip)]
    pub info: Info,

    #[serde(deserialize_with = "single")]
    pub source: Option<Traffic>,
    #[serde(deserialize_with = "single")]
    pub destination: Option<Traffic>,
}

/// One side of an ingress route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Traffic {
    /// `local`, `k8s`, or `nomad`
    pub driver: String,
    #[serde(deserialize_with = "single")]
    pub config: Option<TrafficConfig>,
}

/// Driver-specific endpoint settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrafficConfig {
    pub cluster: String,
    pub address: String,
    #[serde(deserialize_with = "optional_port")]
    pub port: Option<u16>,
    pub open_in_browser: String,
}

impl Traffic {
    fn cluster(&self) -> Option<&str> {
        self.config
            .as_ref()
            .map(|c| c.cluster.as_str())
            .filter(|c| !c.is_empty())
    }
}

impl ResourceSpec for Ingress {
    const KIND: ResourceKind = ResourceKind::Ingress;

    info_accessors!();

    fn references(&self) -> Vec<String> {
        [&self.source, &self.destination]
            .into_iter()
            .flatten()
            .filter_map(Traffic::cluster)
            .map(str::to_string)
            .collect()
    }
}

/// Exposes ports of a container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerIngress {
    #[serde(skip)]
    pub info: Info,

    #[serde(rename = "network")]
    pub networks: Vec<NetworkAttachment>,
    pub target: String,
    #[serde(rename = "port")]
    pub ports: Vec<Port>,
}

impl ResourceSpec for ContainerIngress {
    const KIND: ResourceKind = ResourceKind::ContainerIngress;

    info_accessors!();

    fn references(&self) -> Vec<String> {
        let mut refs = network_refs(&self.networks);
        if !self.target.is_empty() {
            refs.push(self.target.clone());
        }
        refs
    }
}

/// Exposes a Kubernetes service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct K8sIngress {
    #[serde(skip)]
    pub info: Info,

    #[serde(rename = "network")]
    pub networks: Vec<NetworkAttachment>,
    pub cluster: String,
    pub service: String,
    pub deployment: String,
    pub namespace: Option<String>,
    #[serde(rename = "port")]
    pub ports: Vec<Port>,
}

impl ResourceSpec for K8sIngress {
    const KIND: ResourceKind = ResourceKind::K8sIngress;

    info_accessors!();

    fn references(&self) -> Vec<String> {
        let mut refs = network_refs(&self.networks);
        if !self.cluster.is_empty() {
            refs.push(self.cluster.clone());
        }
        refs
    }
}

/// Exposes a Nomad task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NomadIngress {
    #[serde(skip)]
    pub info: Info,

    #[serde(rename = "network")]
    pub networks: Vec<NetworkAttachment>,
    pub cluster: String,
    pub job: String,
    pub group: String,
    pub task: String,
    #[serde(rename = "port")]
    pub ports: Vec<Port>,
}

impl ResourceSpec for NomadIngress {
    const KIND: ResourceKind = ResourceKind::NomadIngress;

    info_accessors!();

    fn references(&self) -> Vec<String> {
        let mut refs = network_refs(&self.networks);
        if !self.cluster.is_empty() {
            refs.push(self.cluster.clone());
        }
        refs
    }
}
