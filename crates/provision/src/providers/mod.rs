//! Providers realize a resource against the capabilities in [`crate::runtime`].

pub mod k3s;

use crate::error::Result;
use crate::lifecycle::ProvisionState;

pub use k3s::K3sProvider;

/// Creates and destroys one resource.
pub trait Provider {
    /// Provision the resource, failing if it already exists.
    fn create(&mut self) -> Result<()>;

    /// Remove everything the resource created. Succeeds when nothing exists.
    fn destroy(&mut self) -> Result<()>;

    /// IDs of the runtime objects backing the resource.
    fn lookup(&self) -> Result<Vec<String>>;

    /// Current lifecycle state.
    fn state(&self) -> ProvisionState;
}
