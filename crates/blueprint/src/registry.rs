//! Table of decodable resource kinds
//!
//! Adding a resource kind means adding its struct and one entry here.

use crate::resource::{
    Container, ContainerIngress, Docs, ExecLocal, ExecRemote, Helm, ImageCache, Info, Ingress,
    K8sCluster, K8sConfig, K8sIngress, Module, Network, NomadCluster, NomadIngress, NomadJob,
    Output, Resource, ResourceKind, ResourceSpec, Sidecar, Template, Variable,
};

/// Builds a resource from its metadata and decoded attributes
pub type DecodeFn = fn(Info, serde_json::Value) -> serde_json::Result<Resource>;

/// One registered kind
#[derive(Debug, Clone, Copy)]
pub struct KindEntry {
    pub kind: ResourceKind,
    pub decode: DecodeFn,
}

fn decode_as<T: ResourceSpec>(info: Info, attributes: serde_json::Value) -> serde_json::Result<Resource> {
    let mut resource: T = serde_json::from_value(attributes)?;
    *resource.info_mut() = info;
    Ok(resource.into())
}

const fn entry<T: ResourceSpec>() -> KindEntry {
    KindEntry {
        kind: T::KIND,
        decode: decode_as::<T>,
    }
}

/// Every kind the parser accepts
pub const REGISTRY: &[KindEntry] = &[
    entry::<Container>(),
    entry::<Network>(),
    entry::<K8sCluster>(),
    entry::<NomadCluster>(),
    entry::<Helm>(),
    entry::<K8sConfig>(),
    entry::<Ingress>(),
    entry::<ContainerIngress>(),
    entry::<K8sIngress>(),
    entry::<NomadIngress>(),
    entry::<NomadJob>(),
    entry::<Sidecar>(),
    entry::<Docs>(),
    entry::<ExecLocal>(),
    entry::<ExecRemote>(),
    entry::<Template>(),
    entry::<Module>(),
    entry::<Output>(),
    entry::<Variable>(),
    entry::<ImageCache>(),
];

/// Find the entry for a block type
pub fn lookup(kind: &str) -> Option<&'static KindEntry> {
    REGISTRY.iter().find(|e| e.kind.as_str() == kind)
}
