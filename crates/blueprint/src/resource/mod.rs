//! Resource model
//!
//! A [`Resource`] is one declared unit of infrastructure. All variants share
//! an [`Info`] block (identity, owning module, dependency edges, disablement,
//! status); everything else is kind-specific and decoded from the document
//! through serde.
//!
//! Kind-specific behaviour lives on [`ResourceSpec`]: post-decode
//! normalization (paths, derived defaults), validation, and the references
//! the linker turns into edges. [`Resource`] dispatches to it, so generic
//! code only ever touches `info()`/`info_mut()`.

mod cluster;
mod container;
mod exec;
mod ingress;
mod meta;
pub mod types;

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use cluster::{Helm, K8sCluster, K8sConfig, NomadCluster, NomadJob};
pub use container::{Container, ImageCache, Network, Sidecar};
pub use exec::{Docs, ExecLocal, ExecRemote, Template};
pub use ingress::{ContainerIngress, Ingress, K8sIngress, NomadIngress};
pub use meta::{Module, Output, Variable};

/// Name of the process-wide image cache every cluster depends on
pub const CACHE_RESOURCE_NAME: &str = "default";

/// Resource kind tag, as written in documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    Container,
    Network,
    K8sCluster,
    NomadCluster,
    Helm,
    K8sConfig,
    Ingress,
    ContainerIngress,
    K8sIngress,
    NomadIngress,
    NomadJob,
    Sidecar,
    Docs,
    ExecLocal,
    ExecRemote,
    Template,
    Module,
    Output,
    Variable,
    ImageCache,
}

impl ResourceKind {
    /// Every kind, in declaration order
    pub const ALL: [ResourceKind; 20] = [
        Self::Container,
        Self::Network,
        Self::K8sCluster,
        Self::NomadCluster,
        Self::Helm,
        Self::K8sConfig,
        Self::Ingress,
        Self::ContainerIngress,
        Self::K8sIngress,
        Self::NomadIngress,
        Self::NomadJob,
        Self::Sidecar,
        Self::Docs,
        Self::ExecLocal,
        Self::ExecRemote,
        Self::Template,
        Self::Module,
        Self::Output,
        Self::Variable,
        Self::ImageCache,
    ];

    /// Tag used in documents and identities
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Network => "network",
            Self::K8sCluster => "k8s_cluster",
            Self::NomadCluster => "nomad_cluster",
            Self::Helm => "helm",
            Self::K8sConfig => "k8s_config",
            Self::Ingress => "ingress",
            Self::ContainerIngress => "container_ingress",
            Self::K8sIngress => "k8s_ingress",
            Self::NomadIngress => "nomad_ingress",
            Self::NomadJob => "nomad_job",
            Self::Sidecar => "sidecar",
            Self::Docs => "docs",
            Self::ExecLocal => "exec_local",
            Self::ExecRemote => "exec_remote",
            Self::Template => "template",
            Self::Module => "module",
            Self::Output => "output",
            Self::Variable => "variable",
            Self::ImageCache => "image_cache",
        }
    }

    /// Whether this kind is a cluster that needs the shared image cache
    pub fn is_cluster(&self) -> bool {
        matches!(self, Self::K8sCluster | Self::NomadCluster)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::InvalidIdentity(s.to_string()))
    }
}

/// Lifecycle status of a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    PendingCreation,
    PendingModification,
    Created,
    Failed,
    Disabled,
    Destroyed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PendingCreation => "pending_creation",
            Self::PendingModification => "pending_modification",
            Self::Created => "created",
            Self::Failed => "failed",
            Self::Disabled => "disabled",
            Self::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

/// Metadata shared by every resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Info {
    pub name: String,
    pub kind: ResourceKind,
    /// Owning module path, empty at the root
    pub module: String,
    /// Dependencies declared by the user with `depends_on`
    pub depends: Vec<String>,
    /// Resolved dependency edges. Append-only, duplicates are kept.
    pub depends_on: Vec<String>,
    pub disabled: bool,
    pub status: Status,
}

impl Info {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    /// Identity of the resource: `<kind>.<name>`
    pub fn id(&self) -> String {
        format!("{}.{}", self.kind, self.name)
    }

    /// Mark as disabled when `parent_disabled` is set, and keep status in step
    pub fn apply_disabled(&mut self, parent_disabled: bool) {
        if parent_disabled {
            self.disabled = true;
        }
        if self.disabled {
            self.status = Status::Disabled;
        }
    }
}

/// Split a `<kind>.<name>` identity
pub fn parse_id(id: &str) -> Result<(ResourceKind, &str)> {
    let (kind, name) = id
        .split_once('.')
        .ok_or_else(|| Error::InvalidIdentity(id.to_string()))?;
    if name.is_empty() {
        return Err(Error::InvalidIdentity(id.to_string()));
    }
    Ok((kind.parse()?, name))
}

/// Behaviour every resource kind provides
pub trait ResourceSpec: Default + Serialize + DeserializeOwned + Into<Resource> {
    /// Tag of this kind
    const KIND: ResourceKind;

    fn info(&self) -> &Info;

    fn info_mut(&mut self) -> &mut Info;

    /// Zero-valued resource with only a name
    fn new(name: impl Into<String>) -> Self {
        let mut resource = Self::default();
        *resource.info_mut() = Info::new(name, Self::KIND);
        resource
    }

    /// Post-decode fixups: anchor relative paths at the directory of `file`
    /// and fill defaults derived from other fields
    fn normalize(&mut self, _file: &Path) {}

    /// Checks that go beyond the schema
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Identities this resource depends on through its typed fields
    ///
    /// User-declared `depends_on` entries are appended by the linker and are
    /// not included here.
    fn references(&self) -> Vec<String> {
        Vec::new()
    }
}

macro_rules! info_accessors {
    () => {
        fn info(&self) -> &$crate::resource::Info {
            &self.info
        }

        fn info_mut(&mut self) -> &mut $crate::resource::Info {
            &mut self.info
        }
    };
}
pub(crate) use info_accessors;

macro_rules! resources {
    ($($variant:ident),* $(,)?) => {
        /// A resource of any kind
        #[derive(Debug, Clone, PartialEq)]
        pub enum Resource {
            $($variant($variant),)*
        }

        impl Resource {
            pub fn info(&self) -> &Info {
                match self {
                    $(Self::$variant(r) => r.info(),)*
                }
            }

            pub fn info_mut(&mut self) -> &mut Info {
                match self {
                    $(Self::$variant(r) => r.info_mut(),)*
                }
            }

            pub fn normalize(&mut self, file: &Path) {
                match self {
                    $(Self::$variant(r) => r.normalize(file),)*
                }
            }

            pub fn validate(&self) -> Result<()> {
                match self {
                    $(Self::$variant(r) => r.validate(),)*
                }
            }

            pub fn references(&self) -> Vec<String> {
                match self {
                    $(Self::$variant(r) => r.references(),)*
                }
            }

            /// Kind-specific attributes as JSON
            pub fn attributes(&self) -> serde_json::Result<serde_json::Value> {
                match self {
                    $(Self::$variant(r) => serde_json::to_value(r),)*
                }
            }
        }

        $(
            impl From<$variant> for Resource {
                fn from(r: $variant) -> Self {
                    Self::$variant(r)
                }
            }
        )*
    };
}

resources!(
    Container,
    Network,
    K8sCluster,
    NomadCluster,
    Helm,
    K8sConfig,
    Ingress,
    ContainerIngress,
    K8sIngress,
    NomadIngress,
    NomadJob,
    Sidecar,
    Docs,
    ExecLocal,
    ExecRemote,
    Template,
    Module,
    Output,
    Variable,
    ImageCache,
);

impl Resource {
    pub fn id(&self) -> String {
        self.info().id()
    }

    pub fn kind(&self) -> ResourceKind {
        self.info().kind
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }
}

/// Identity for a network reference, accepting `name` or `network.name`
pub(crate) fn network_id(name: &str) -> String {
    if name.starts_with("network.") {
        name.to_string()
    } else {
        format!("network.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_sets_kind_and_pending_status() {
        let c = Container::new("web");
        assert_eq!(c.info.kind, ResourceKind::Container);
        assert_eq!(c.info.status, Status::PendingCreation);
        assert_eq!(c.info.name, "web");
        assert!(c.networks.is_empty());

        let k = K8sCluster::new("k3s");
        assert_eq!(Resource::from(k).id(), "k8s_cluster.k3s");
    }

    #[test]
    fn test_kind_round_trips_through_tag() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("containr".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_parse_id() {
        let (kind, name) = parse_id("network.cloud").unwrap();
        assert_eq!(kind, ResourceKind::Network);
        assert_eq!(name, "cloud");

        let (kind, name) = parse_id("k8s_cluster.k3s.local").unwrap();
        assert_eq!(kind, ResourceKind::K8sCluster);
        assert_eq!(name, "k3s.local");

        assert!(parse_id("network").is_err());
        assert!(parse_id("network.").is_err());
        assert!(parse_id("bogus.x").is_err());
    }

    #[test]
    fn test_apply_disabled_forces_status() {
        let mut info = Info::new("x", ResourceKind::Container);
        info.apply_disabled(true);
        assert!(info.disabled);
        assert_eq!(info.status, Status::Disabled);

        let mut info = Info::new("y", ResourceKind::Container);
        info.disabled = true;
        info.apply_disabled(false);
        assert_eq!(info.status, Status::Disabled);

        let mut info = Info::new("z", ResourceKind::Container);
        info.apply_disabled(false);
        assert_eq!(info.status, Status::PendingCreation);
    }

    #[test]
    fn test_network_id() {
        assert_eq!(network_id("cloud"), "network.cloud");
        assert_eq!(network_id("network.cloud"), "network.cloud");
    }

    #[test]
    fn test_cluster_kinds() {
        assert!(ResourceKind::K8sCluster.is_cluster());
        assert!(ResourceKind::NomadCluster.is_cluster());
        assert!(!ResourceKind::Helm.is_cluster());
    }
}
