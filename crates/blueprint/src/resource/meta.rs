//! Resources that shape the graph rather than provision anything.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Info, ResourceKind, ResourceSpec, info_accessors};
use crate::paths::{ensure_absolute, is_local_folder};

/// Bundle of definitions expanded into the parent graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Module {
    #[serde(skip)]
    pub info: Info,

    /// Local folder or a remote address understood by the fetcher
    pub source: String,
}

impl ResourceSpec for Module {
    const KIND: ResourceKind = ResourceKind::Module;

    info_accessors!();

    fn normalize(&mut self, file: &Path) {
        let local = ensure_absolute(&self.source, file);
        if is_local_folder(&local) {
            self.source = local;
        }
    }
}

/// Value exported from the environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Output {
    #[serde(skip)]
    pub info: Info,

    pub value: serde_json::Value,
}

impl ResourceSpec for Output {
    const KIND: ResourceKind = ResourceKind::Output;

    info_accessors!();
}

/// Input variable with a default value
///
/// Variables are resolved into the evaluation context and never added to a
/// `Config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Variable {
    #[serde(skip)]
    pub info: Info,

    pub default: serde_json::Value,
    pub description: String,
}

impl ResourceSpec for Variable {
    const KIND: ResourceKind = ResourceKind::Variable;

    info_accessors!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_local_source_made_absolute() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();

        let mut m = Module::new("m");
        m.source = "./sub".to_string();
        m.normalize(&tmp.path().join("main.hcl"));
        assert_eq!(m.source, tmp.path().join("sub").to_string_lossy());
    }

    #[test]
    fn test_module_remote_source_untouched() {
        let mut m = Module::new("consul");
        m.source = "github.com/org/blueprints//modules/consul".to_string();
        m.normalize(Path::new("/env/main.hcl"));
        assert_eq!(m.source, "github.com/org/blueprints//modules/consul");
    }
}
