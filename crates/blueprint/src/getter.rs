//! Module source retrieval
//!
//! Fetching remote module sources is delegated to a [`Getter`]. The parser
//! only calls it for sources that are not already a local folder.

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Retrieves a module source into a local folder
pub trait Getter: Send + Sync {
    /// Fetch `source` so that its contents live in `dest`
    fn get(&self, source: &str, dest: &Path) -> Result<()>;
}

/// Getter that refuses remote sources
pub struct LocalOnly;

impl Getter for LocalOnly {
    fn get(&self, source: &str, _dest: &Path) -> Result<()> {
        bail!("remote module sources are not supported: {source}")
    }
}

/// In-memory getter for tests
///
/// Writes registered files into the destination and records every call.
#[derive(Default, Clone)]
pub struct MockGetter {
    sources: Arc<Mutex<HashMap<String, Vec<(String, String)>>>>,
    calls: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl MockGetter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `files` (relative name, content) for `source`
    pub fn with_source(self, source: &str, files: &[(&str, &str)]) -> Self {
        let files = files
            .iter()
            .map(|(name, content)| ((*name).to_string(), (*content).to_string()))
            .collect();
        if let Ok(mut sources) = self.sources.lock() {
            sources.insert(source.to_string(), files);
        }
        self
    }

    /// Calls made so far
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Getter for MockGetter {
    fn get(&self, source: &str, dest: &Path) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((source.to_string(), dest.to_path_buf()));
        }
        let files = self
            .sources
            .lock()
            .ok()
            .and_then(|s| s.get(source).cloned());
        let Some(files) = files else {
            bail!("source not found: {source}");
        };
        std::fs::create_dir_all(dest)?;
        for (name, content) in files {
            std::fs::write(dest.join(name), content)?;
        }
        Ok(())
    }
}
