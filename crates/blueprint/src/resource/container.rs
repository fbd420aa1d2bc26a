//! Container-shaped resources and the networks they attach to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::types::{
    Build, HealthCheck, Image, KeyValue, NetworkAttachment, Port, Volume, absolutize_volumes,
    bool_or_string, single,
};
use super::{Info, ResourceKind, ResourceSpec, info_accessors, network_id};
use crate::error::{Error, Result};
use crate::paths::ensure_absolute;

/// Network names the tool creates itself
pub const RESERVED_NETWORKS: &[&str] = &["wan"];

/// A single container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Container {
    #[serde(skip)]
    pub info: Info,

    #[serde(rename = "network")]
    pub networks: Vec<NetworkAttachment>,
    #[serde(deserialize_with = "single")]
    pub image: Option<Image>,
    #[serde(deserialize_with = "single")]
    pub build: Option<Build>,
    pub command: Vec<String>,
    pub entrypoint: Vec<String>,
    #[serde(rename = "env")]
    pub environment: Vec<KeyValue>,
    pub env_var: BTreeMap<String, String>,
    #[serde(rename = "volume")]
    pub volumes: Vec<Volume>,
    #[serde(rename = "port")]
    pub ports: Vec<Port>,
    #[serde(deserialize_with = "bool_or_string")]
    pub privileged: bool,
    #[serde(deserialize_with = "single")]
    pub health_check: Option<HealthCheck>,
}

impl ResourceSpec for Container {
    const KIND: ResourceKind = ResourceKind::Container;

    info_accessors!();

    fn normalize(&mut self, file: &Path) {
        for volume in &mut self.volumes {
            if volume.is_bind() {
                volume.source = ensure_absolute(&volume.source, file);
            }
        }
        if let Some(build) = &mut self.build {
            build.context = ensure_absolute(&build.context, file);
        }
    }

    fn references(&self) -> Vec<String> {
        self.networks.iter().map(|n| network_id(&n.name)).collect()
    }
}

/// A virtual network shared by workloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Network {
    #[serde(skip)]
    pub info: Info,

    pub subnet: String,
}

impl ResourceSpec for Network {
    const KIND: ResourceKind = ResourceKind::Network;

    info_accessors!();

    fn validate(&self) -> Result<()> {
        if RESERVED_NETWORKS.contains(&self.info.name.as_str()) {
            return Err(Error::ReservedName {
                kind: Self::KIND.to_string(),
                name: self.info.name.clone(),
            });
        }
        Ok(())
    }
}

/// Pull-through image cache shared by every cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageCache {
    #[serde(skip)]
    pub info: Info,
}

impl ResourceSpec for ImageCache {
    const KIND: ResourceKind = ResourceKind::ImageCache;

    info_accessors!();
}

/// A container sharing the network namespace of a target container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Sidecar {
    #[serde(skip)]
    pub info: Info,

    pub target: String,
    #[serde(deserialize_with = "single")]
    pub image: Option<Image>,
    pub command: Vec<String>,
    pub env_var: BTreeMap<String, String>,
    #[serde(rename = "volume")]
    pub volumes: Vec<Volume>,
    #[serde(deserialize_with = "bool_or_string")]
    pub privileged: bool,
}

impl ResourceSpec for Sidecar {
    const KIND: ResourceKind = ResourceKind::Sidecar;

    info_accessors!();

    fn normalize(&mut self, file: &Path) {
        absolutize_volumes(&mut self.volumes, file);
    }

    fn references(&self) -> Vec<String> {
        if self.target.is_empty() {
            Vec::new()
        } else {
            vec![self.target.clone()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_container_decodes_blocks() {
        let c: Container = serde_json::from_value(json!({
            "network": [{"name": "network.test"}, {"name": "onprem"}],
            "image": [{"name": "consul:1.6.1"}],
            "env": [{"key": "A", "value": "1"}],
            "env_var": {"B": "2"},
            "volume": [{"source": "./data", "destination": "/data"}],
        }))
        .unwrap();
        assert_eq!(c.networks.len(), 2);
        assert_eq!(c.image.as_ref().unwrap().name, "consul:1.6.1");
        assert_eq!(c.environment[0].key, "A");
        assert_eq!(c.env_var["B"], "2");
        assert_eq!(
            c.references(),
            vec!["network.test".to_string(), "network.onprem".to_string()]
        );
    }

    #[test]
    fn test_container_normalizes_bind_volumes_only() {
        let mut c = Container::new("web");
        c.volumes = vec![
            Volume {
                source: "./data".to_string(),
                ..Volume::default()
            },
            Volume {
                source: "cache".to_string(),
                kind: "volume".to_string(),
                ..Volume::default()
            },
        ];
        c.build = Some(Build {
            file: None,
            context: "./build".to_string(),
        });

        c.normalize(Path::new("/env/main.hcl"));

        assert_eq!(c.volumes[0].source, "/env/data");
        assert_eq!(c.volumes[1].source, "cache");
        assert_eq!(c.build.unwrap().context, "/env/build");
    }

    #[test]
    fn test_container_rejects_unknown_attribute() {
        let err = serde_json::from_value::<Container>(json!({"imag": []})).unwrap_err();
        assert!(err.to_string().contains("imag"));
    }

    #[test]
    fn test_network_reserved_name() {
        assert!(matches!(
            Network::new("wan").validate(),
            Err(Error::ReservedName { .. })
        ));
        assert!(Network::new("cloud").validate().is_ok());
    }

    #[test]
    fn test_sidecar_target_reference() {
        let mut s = Sidecar::new("envoy");
        assert!(s.references().is_empty());
        s.target = "container.web".to_string();
        assert_eq!(s.references(), vec!["container.web".to_string()]);
    }
}
