//! User settings
//!
//! Read from `settings.toml` in the data home. Every key is optional:
//!
//! ```toml
//! [provision]
//! start_timeout = "120s"
//! health_timeout = "60s"
//! poll_interval = "1s"
//!
//! [parse]
//! var_prefix = "SY_VAR_"
//! ```

use anyhow::{Context, Result, bail};
use provision::ProvisionOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub provision: ProvisionSettings,
    pub parse: ParseSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionSettings {
    pub start_timeout: String,
    pub health_timeout: String,
    pub poll_interval: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseSettings {
    /// Prefix of environment variables imported as `var.<name>`
    pub var_prefix: String,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            start_timeout: "120s".to_string(),
            health_timeout: "60s".to_string(),
            poll_interval: "1s".to_string(),
        }
    }
}

impl Default for ParseSettings {
    fn default() -> Self {
        Self {
            var_prefix: blueprint::DEFAULT_VAR_PREFIX.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, using defaults when the file is missing
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Provisioning timings
    pub fn provision_options(&self) -> Result<ProvisionOptions> {
        Ok(ProvisionOptions {
            start_timeout: parse_duration(&self.provision.start_timeout)
                .context("provision.start_timeout")?,
            health_timeout: parse_duration(&self.provision.health_timeout)
                .context("provision.health_timeout")?,
            poll_interval: parse_duration(&self.provision.poll_interval)
                .context("provision.poll_interval")?,
        })
    }
}

/// Parse a duration such as `"500ms"`, `"30s"`, `"2m"`, or `"1h"`
///
/// A bare number is read as seconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    if value.is_empty() {
        bail!("empty duration");
    }

    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: u64 = number
        .parse()
        .with_context(|| format!("invalid duration '{value}'"))?;

    let seconds = |factor: u64| {
        number
            .checked_mul(factor)
            .map(Duration::from_secs)
            .with_context(|| format!("duration '{value}' is too large"))
    };
    match unit.trim() {
        "ms" => Ok(Duration::from_millis(number)),
        "" | "s" => Ok(Duration::from_secs(number)),
        "m" => seconds(60),
        "h" => seconds(3600),
        other => bail!("unknown duration unit '{other}' in '{value}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration(" 45 ").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("-5s").is_err());
        let err = parse_duration("18446744073709551615h").unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert!(parse_duration("307445734561825861m").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load(&tmp.path().join("settings.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.parse.var_prefix, "SY_VAR_");
        assert_eq!(
            settings.provision_options().unwrap(),
            ProvisionOptions::default()
        );
    }

    #[test]
    fn test_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(&path, "[provision]\nstart_timeout = \"5m\"\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        let options = settings.provision_options().unwrap();
        assert_eq!(options.start_timeout, Duration::from_secs(300));
        assert_eq!(options.health_timeout, Duration::from_secs(60));
        assert_eq!(settings.parse.var_prefix, "SY_VAR_");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(&path, "[provision\n").unwrap();
        assert!(Settings::load(&path).is_err());

        fs::write(&path, "[provision]\nstart_timeout = \"soon\"\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert!(settings.provision_options().is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(&path, "[parse]\nprefix = \"X_\"\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
