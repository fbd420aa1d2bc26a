//! The resource graph produced by parsing

use crate::blueprint::Blueprint;
use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceKind};

/// Resources in parse order, plus optional environment metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub blueprint: Option<Blueprint>,
    resources: Vec<Resource>,
    linked: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource, rejecting duplicate identities
    pub fn add_resource(&mut self, resource: impl Into<Resource>) -> Result<()> {
        let resource = resource.into();
        let id = resource.id();
        if self.resources.iter().any(|r| r.id() == id) {
            return Err(Error::DuplicateResource { id });
        }
        log::debug!("Adding resource {id}");
        self.resources.push(resource);
        Ok(())
    }

    pub fn find_resource(&self, id: &str) -> Result<&Resource> {
        self.resources
            .iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| Error::ResourceNotFound(id.to_string()))
    }

    pub fn find_resource_mut(&mut self, id: &str) -> Result<&mut Resource> {
        self.resources
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| Error::ResourceNotFound(id.to_string()))
    }

    pub fn find_resources_by_kind(&self, kind: ResourceKind) -> Vec<&Resource> {
        self.resources.iter().filter(|r| r.kind() == kind).collect()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub(crate) fn resources_mut(&mut self) -> &mut [Resource] {
        &mut self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Whether references have been linked
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Record that linking ran, failing if it already had
    pub(crate) fn mark_linked(&mut self) -> Result<()> {
        if self.linked {
            return Err(Error::AlreadyLinked);
        }
        self.linked = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Container, Network, ResourceSpec};

    #[test]
    fn test_add_and_find() {
        let mut config = Config::new();
        config.add_resource(Network::new("cloud")).unwrap();
        config.add_resource(Container::new("web")).unwrap();

        assert_eq!(config.len(), 2);
        assert_eq!(config.find_resource("container.web").unwrap().name(), "web");
        assert!(matches!(
            config.find_resource("container.db"),
            Err(Error::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let mut config = Config::new();
        config.add_resource(Container::new("web")).unwrap();
        let err = config.add_resource(Container::new("web")).unwrap_err();
        assert!(matches!(err, Error::DuplicateResource { ref id } if id == "container.web"));
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn test_same_name_different_kind_allowed() {
        let mut config = Config::new();
        config.add_resource(Container::new("consul")).unwrap();
        config.add_resource(Network::new("consul")).unwrap();
        assert_eq!(config.len(), 2);
    }

    #[test]
    fn test_find_by_kind_keeps_insertion_order() {
        let mut config = Config::new();
        config.add_resource(Container::new("b")).unwrap();
        config.add_resource(Network::new("n")).unwrap();
        config.add_resource(Container::new("a")).unwrap();

        let names: Vec<_> = config
            .find_resources_by_kind(ResourceKind::Container)
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_mark_linked_once() {
        let mut config = Config::new();
        assert!(!config.is_linked());
        config.mark_linked().unwrap();
        assert!(config.is_linked());
        assert!(matches!(config.mark_linked(), Err(Error::AlreadyLinked)));
    }
}
