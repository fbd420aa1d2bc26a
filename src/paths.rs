//! Path resolution for the berth CLI
//!
//! The data home layout itself lives in `blueprint::paths`; this module adds
//! what only the binary needs.
//!
//! # Environment Variables
//!
//! - `BERTH_HOME` - Override the data home (default `~/.berth`)

use std::path::PathBuf;

pub use blueprint::paths::data_home;

/// Settings file inside the data home
pub fn settings_file() -> PathBuf {
    data_home().join("settings.toml")
}

/// Folder holding image archives before they are copied into a volume
pub fn image_cache_dir() -> PathBuf {
    data_home().join("images")
}

/// Expand a user-supplied path: `~` and environment variables
///
/// Every path taken from the command line goes through this.
///
/// # Examples
///
/// ```ignore
/// let folder = paths::expand("~/envs/consul");
/// let other = paths::expand("$HOME/envs/consul");
/// ```
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
