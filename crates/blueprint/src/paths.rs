//! Path resolution for the tool data home
//!
//! Everything the tool persists lives under one data home so that generated
//! artifacts have deterministic, name-derived locations.
//!
//! # Environment Variables
//!
//! - `BERTH_HOME` - Override the data home (default `~/.berth`)
//! - `DOCKER_HOST` - Container runtime address, used by `docker_host()`/`docker_ip()`
//!
//! # Layout
//!
//! ```text
//! ~/.berth/
//! ├── config/<name>/        # cluster artifacts (kubeconfig, connection config)
//! ├── data/<name>/          # data folders handed to resources
//! └── blueprints/<hash>/    # fetched module sources
//! ```

use std::net::UdpSocket;
use std::path::{Path, PathBuf};

/// Environment variable for data home override
pub const ENV_HOME: &str = "BERTH_HOME";

/// Domain suffix for fully-qualified names on runtime networks
pub const DOMAIN: &str = "berth.run";

const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Get the user's home folder
///
/// Falls back to the system temp directory when no home can be determined.
pub fn home_folder() -> PathBuf {
    dirs::home_dir().unwrap_or_else(std::env::temp_dir)
}

/// Get the tool data home
///
/// Priority:
/// 1. `BERTH_HOME` env var
/// 2. `~/.berth`
pub fn data_home() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_HOME) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    home_folder().join(".berth")
}

/// Folder holding the generated artifacts of a named resource
pub fn config_folder(home: &Path, name: &str) -> PathBuf {
    home.join("config").join(name)
}

/// Host-side and in-container kubeconfig locations for a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeConfigPaths {
    /// Folder containing both files
    pub dir: PathBuf,
    /// Config reachable from the host (loopback server address)
    pub host: PathBuf,
    /// Config reachable from containers on the cluster's network
    pub docker: PathBuf,
}

/// Kubeconfig paths for a cluster under the given data home
pub fn kubeconfig_paths(home: &Path, name: &str) -> KubeConfigPaths {
    let dir = config_folder(home, name);
    KubeConfigPaths {
        host: dir.join("kubeconfig.yaml"),
        docker: dir.join("kubeconfig-docker.yaml"),
        dir,
    }
}

/// Persisted connection config of a cluster
pub fn cluster_config_path(home: &Path, name: &str) -> PathBuf {
    config_folder(home, name).join("config.json")
}

/// Data folder for `name`, created on demand
pub fn data_folder(home: &Path, name: &str) -> std::io::Result<PathBuf> {
    let path = home.join("data").join(name);
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

/// Deterministic local folder for a remote module source
pub fn module_cache_folder(home: &Path, source: &str) -> PathBuf {
    let hash = blake3::hash(source.as_bytes()).to_hex();
    home.join("blueprints").join(&hash.as_str()[..16])
}

/// Fully-qualified name of a workload on a runtime network
///
/// Accepts either a bare network name or a `network.<name>` identity.
pub fn fqdn(name: &str, network: &str) -> String {
    let network = network.strip_prefix("network.").unwrap_or(network);
    format!("{name}.{network}.{DOMAIN}")
}

/// Whether `path` names an existing local folder
pub fn is_local_folder(path: &str) -> bool {
    Path::new(path).is_dir()
}

/// Anchor a relative path at the directory of the file that declared it
///
/// Absolute paths are returned unchanged.
pub fn ensure_absolute(path: &str, file: &Path) -> String {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return path.to_string();
    }
    let base = file.parent().unwrap_or_else(|| Path::new("/"));
    normalize(&base.join(candidate)).to_string_lossy().into_owned()
}

/// Resolve `.` and `..` components lexically
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Address of the container runtime API
pub fn docker_host() -> String {
    std::env::var("DOCKER_HOST")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| DEFAULT_DOCKER_HOST.to_string())
}

/// Address at which ports published by the container runtime are reachable
pub fn docker_ip() -> String {
    let host = docker_host();
    match host.strip_prefix("tcp://") {
        Some(rest) => rest
            .split(['/', ':'])
            .next()
            .filter(|h| !h.is_empty())
            .unwrap_or("localhost")
            .to_string(),
        None => "localhost".to_string(),
    }
}

/// Non-loopback address of this machine
///
/// No traffic is sent; connecting a UDP socket only selects the outbound
/// interface.
pub fn local_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod testenv {
    use std::env;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    static LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that read or write process environment variables
    pub fn lock() -> MutexGuard<'static, ()> {
        LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with an env var set, restoring the previous value afterwards
    ///
    /// # Safety
    /// Uses env::set_var/remove_var; callers hold `lock()` so no other test
    /// touches the environment concurrently.
    pub fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = lock();
        let original = env::var(key).ok();
        // SAFETY: serialized by the env lock
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: serialized by the env lock
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }
}
