//! Remote module sources
//!
//! Supported forms:
//!
//! - `github.com/org/repo//path/in/repo?ref=v1.0`, and any `https://` or
//!   `git::` URL, cloned with `git`
//! - `https://host/archive.tar.gz//path` (`.tgz` and `.zip` too), downloaded
//!   and unpacked
//!
//! A destination that already has content is reused as-is.

use anyhow::{Context, Result, bail};
use blueprint::Getter;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::runner;

/// Maximum archive size (200 MB)
const MAX_DOWNLOAD_SIZE: u64 = 200 * 1024 * 1024;

const GIT_HOSTS: &[&str] = &["github.com/", "gitlab.com/", "bitbucket.org/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    TarGz,
    Zip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Git {
        url: String,
        subdir: Option<String>,
        reference: Option<String>,
    },
    Archive {
        url: String,
        subdir: Option<String>,
        format: ArchiveFormat,
    },
}

/// Split `addr//subdir` without touching the `//` of a URL scheme
fn split_subdir(addr: &str) -> (&str, Option<String>) {
    let after_scheme = addr.find("://").map_or(0, |i| i + 3);
    match addr[after_scheme..].find("//") {
        Some(i) => {
            let at = after_scheme + i;
            let subdir = addr[at + 2..].trim_matches('/');
            let subdir = (!subdir.is_empty()).then(|| subdir.to_string());
            (&addr[..at], subdir)
        }
        None => (addr, None),
    }
}

fn archive_format(url: &str) -> Option<ArchiveFormat> {
    let lower = url.to_ascii_lowercase();
    if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        Some(ArchiveFormat::TarGz)
    } else if lower.ends_with(".zip") {
        Some(ArchiveFormat::Zip)
    } else {
        None
    }
}

fn parse_source(source: &str) -> Result<Source> {
    let (forced_git, source) = match source.strip_prefix("git::") {
        Some(rest) => (true, rest),
        None => (false, source),
    };

    let (addr, reference) = match source.split_once("?ref=") {
        Some((addr, reference)) => (addr, Some(reference.to_string())),
        None => (source, None),
    };
    let (addr, subdir) = split_subdir(addr);

    if !forced_git && let Some(format) = archive_format(addr) {
        if !addr.starts_with("http://") && !addr.starts_with("https://") {
            bail!("archive sources must be http(s) URLs: {source}");
        }
        return Ok(Source::Archive {
            url: addr.to_string(),
            subdir,
            format,
        });
    }

    let url = if GIT_HOSTS.iter().any(|host| addr.starts_with(host)) {
        format!("https://{addr}")
    } else if forced_git || addr.contains("://") || addr.starts_with("git@") {
        addr.to_string()
    } else {
        bail!("unsupported module source: {source}");
    };

    Ok(Source::Git {
        url,
        subdir,
        reference,
    })
}

fn is_populated(dest: &Path) -> bool {
    fs::read_dir(dest).is_ok_and(|mut entries| entries.next().is_some())
}

/// Move `staging[/subdir]` to `dest`
fn install(staging: &Path, subdir: Option<&str>, dest: &Path) -> Result<()> {
    let root = match subdir {
        Some(subdir) => staging.join(subdir),
        None => staging.to_path_buf(),
    };
    if !root.is_dir() {
        bail!("{} is not a folder in the source", subdir.unwrap_or("."));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    if dest.exists() {
        fs::remove_dir_all(dest).with_context(|| format!("Could not clear {}", dest.display()))?;
    }
    fs::rename(&root, dest).with_context(|| format!("Could not move module into {}", dest.display()))
}

/// Archives usually wrap everything in one top-level folder
fn archive_root(staging: &Path) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(staging)?
        .filter_map(std::result::Result::ok)
        .collect();
    match entries.as_slice() {
        [single] if single.path().is_dir() => Ok(single.path()),
        _ => Ok(staging.to_path_buf()),
    }
}

fn download(url: &str) -> Result<Vec<u8>> {
    let agent = ureq::Agent::new_with_defaults();

    let mut response = agent
        .get(url)
        .header("User-Agent", concat!("berth/", env!("CARGO_PKG_VERSION")))
        .call()
        .with_context(|| format!("Failed to download {url}"))?;

    response
        .body_mut()
        .with_config()
        .limit(MAX_DOWNLOAD_SIZE)
        .read_to_vec()
        .context("Failed to read response body")
}

fn unpack(data: &[u8], format: ArchiveFormat, into: &Path) -> Result<()> {
    match format {
        ArchiveFormat::TarGz => {
            let decoder = flate2::read::GzDecoder::new(data);
            tar::Archive::new(decoder)
                .unpack(into)
                .context("Failed to unpack tar.gz archive")
        }
        ArchiveFormat::Zip => {
            let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data))
                .context("Failed to open zip archive")?;
            for i in 0..archive.len() {
                let mut file = archive.by_index(i)?;
                let Some(relative) = file.enclosed_name() else {
                    bail!("zip entry escapes the archive: {}", file.name());
                };
                let target = into.join(relative);
                if file.is_dir() {
                    fs::create_dir_all(&target)?;
                    continue;
                }
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut contents = Vec::new();
                file.read_to_end(&mut contents)?;
                fs::write(&target, contents)
                    .with_context(|| format!("Could not write {}", target.display()))?;
            }
            Ok(())
        }
    }
}

/// Getter for git repositories and HTTP archives
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteGetter;

impl RemoteGetter {
    fn clone_repo(url: &str, reference: Option<&str>, into: &Path) -> Result<()> {
        if !runner::command_exists("git") {
            bail!("git is required to fetch {url}");
        }
        let into = into.to_string_lossy();
        let mut args = vec!["clone", "--depth", "1"];
        if let Some(reference) = reference {
            args.extend(["--branch", reference]);
        }
        args.extend([url, &*into]);
        runner::run_capture("git", &args).with_context(|| format!("Failed to clone {url}"))?;
        Ok(())
    }
}

impl Getter for RemoteGetter {
    fn get(&self, source: &str, dest: &Path) -> Result<()> {
        if is_populated(dest) {
            log::debug!("Reusing {} for {source}", dest.display());
            return Ok(());
        }

        let parsed = parse_source(source)?;
        let parent = dest.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
        let staging = tempfile::Builder::new()
            .prefix(".fetch-")
            .tempdir_in(parent)
            .context("Could not create staging folder")?;

        match parsed {
            Source::Git {
                url,
                subdir,
                reference,
            } => {
                let checkout = staging.path().join("checkout");
                Self::clone_repo(&url, reference.as_deref(), &checkout)?;
                install(&checkout, subdir.as_deref(), dest)
            }
            Source::Archive {
                url,
                subdir,
                format,
            } => {
                let data = download(&url)?;
                let unpacked = staging.path().join("unpacked");
                fs::create_dir_all(&unpacked)?;
                unpack(&data, format, &unpacked)?;
                let root = archive_root(&unpacked)?;
                install(&root, subdir.as_deref(), dest)
            }
        }
    }
}
