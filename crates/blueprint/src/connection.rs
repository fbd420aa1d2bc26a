//! Persisted cluster connection details
//!
//! Cluster providers write this once the cluster is up; the `cluster_api`
//! expression function reads it back.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths::cluster_config_path;

/// How to reach a cluster's API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConnection {
    /// Address reachable from the host
    pub local_address: String,
    /// Address reachable from containers on the cluster's network
    pub remote_address: String,
    pub api_port: u16,
    /// `https` for Kubernetes, `http` for Nomad
    pub scheme: String,
    pub node_count: u32,
}

impl ClusterConnection {
    /// API address as seen from the host
    pub fn api_address(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.local_address, self.api_port)
    }

    /// Load the connection of cluster `name` from the data home
    pub fn load(home: &Path, name: &str) -> Result<Self> {
        let path = cluster_config_path(home, name);
        let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            Error::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Persist the connection of cluster `name` under the data home
    pub fn save(&self, home: &Path, name: &str) -> Result<()> {
        let path = cluster_config_path(home, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            Error::io(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        fs::write(&path, content).map_err(|e| Error::io(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let conn = ClusterConnection {
            local_address: "localhost".to_string(),
            remote_address: "server.k3s.cloud.berth.run".to_string(),
            api_port: 64123,
            scheme: "https".to_string(),
            node_count: 1,
        };
        conn.save(tmp.path(), "k3s").unwrap();

        let loaded = ClusterConnection::load(tmp.path(), "k3s").unwrap();
        assert_eq!(loaded, conn);
        assert_eq!(loaded.api_address(), "https://localhost:64123");
    }

    #[test]
    fn test_load_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ClusterConnection::load(tmp.path(), "none").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
