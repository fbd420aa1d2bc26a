//! Provisioning for berth environments
//!
//! A [`Provider`] realizes one parsed resource against the capabilities in
//! [`runtime`], moving through the [`lifecycle`] states. The k3s cluster
//! provider is the reference implementation.

pub mod error;
pub mod lifecycle;
pub mod providers;
pub mod runtime;

pub use error::{Error, ErrorCategory, Result};
pub use lifecycle::{ProvisionOptions, ProvisionState, StateMachine, wait_for};
pub use providers::{K3sProvider, Provider};
pub use runtime::{ContainerRuntime, KubernetesClient, MockKubernetes, MockRuntime};
