//! Commands, templates, and documentation sites.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::types::{
    Image, NetworkAttachment, Volume, absolutize_volumes, bool_or_string, port, single,
};
use super::{Info, ResourceKind, ResourceSpec, info_accessors, network_id};
use crate::paths::ensure_absolute;

/// Command run on the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecLocal {
    #[serde(skip)]
    pub info: Info,

    pub cmd: String,
    pub args: Vec<String>,
    /// Left as written, resolved by the runner at execution time
    pub working_directory: String,
    #[serde(deserialize_with = "bool_or_string")]
    pub daemon: bool,
    pub timeout: String,
    pub env_var: BTreeMap<String, String>,
}

impl ResourceSpec for ExecLocal {
    const KIND: ResourceKind = ResourceKind::ExecLocal;

    info_accessors!();
}

/// Command run in a container, either new or an existing target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecRemote {
    #[serde(skip)]
    pub info: Info,

    #[serde(rename = "network")]
    pub networks: Vec<NetworkAttachment>,
    #[serde(deserialize_with = "single")]
    pub image: Option<Image>,
    pub target: String,
    pub cmd: String,
    pub args: Vec<String>,
    pub working_directory: String,
    #[serde(rename = "volume")]
    pub volumes: Vec<Volume>,
    pub env_var: BTreeMap<String, String>,
}

impl ResourceSpec for ExecRemote {
    const KIND: ResourceKind = ResourceKind::ExecRemote;

    info_accessors!();

    fn normalize(&mut self, file: &Path) {
        absolutize_volumes(&mut self.volumes, file);
    }

    fn references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.networks.iter().map(|n| network_id(&n.name)).collect();
        if !self.target.is_empty() {
            refs.push(self.target.clone());
        }
        refs
    }
}

/// File rendered from a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Template {
    #[serde(skip)]
    pub info: Info,

    /// Template content
    pub source: String,
    pub destination: String,
    pub vars: BTreeMap<String, serde_json::Value>,
}

impl ResourceSpec for Template {
    const KIND: ResourceKind = ResourceKind::Template;

    info_accessors!();

    fn normalize(&mut self, file: &Path) {
        self.destination = ensure_absolute(&self.destination, file);
    }
}

/// Documentation site served from a local folder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Docs {
    #[serde(skip)]
    pub info: Info,

    #[serde(rename = "network")]
    pub networks: Vec<NetworkAttachment>,
    #[serde(deserialize_with = "single")]
    pub image: Option<Image>,
    pub path: String,
    #[serde(deserialize_with = "port")]
    pub port: u16,
    #[serde(deserialize_with = "bool_or_string")]
    pub open_in_browser: bool,
    pub index_title: String,
    pub index_pages: Vec<String>,
}

impl ResourceSpec for Docs {
    const KIND: ResourceKind = ResourceKind::Docs;

    info_accessors!();

    fn normalize(&mut self, file: &Path) {
        self.path = ensure_absolute(&self.path, file);
    }

    fn references(&self) -> Vec<String> {
        self.networks.iter().map(|n| network_id(&n.name)).collect()
    }
}
