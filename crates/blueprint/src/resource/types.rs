//! Nested block types shared across resource kinds, and the serde helpers
//! that map HCL block structure onto them.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::paths::ensure_absolute;

/// Attachment of a workload to a network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkAttachment {
    /// Network identity, `network.<name>` or a bare name
    pub name: String,
    pub ip_address: Option<String>,
    pub aliases: Vec<String>,
}

/// Container image reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Image {
    pub name: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Volume mounted into a workload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Volume {
    pub source: String,
    pub destination: String,
    /// `bind` (or empty), `volume`, or `tmpfs`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "bool_or_string")]
    pub read_only: bool,
}

impl Volume {
    /// Whether the source is a host path
    pub fn is_bind(&self) -> bool {
        self.kind.is_empty() || self.kind == "bind"
    }
}

/// Anchor every volume source at the declaring file's directory
pub(crate) fn absolutize_volumes(volumes: &mut [Volume], file: &Path) {
    for volume in volumes {
        volume.source = ensure_absolute(&volume.source, file);
    }
}

/// Port published by a workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Port {
    #[serde(deserialize_with = "port")]
    pub local: u16,
    #[serde(default, deserialize_with = "optional_port")]
    pub remote: Option<u16>,
    #[serde(default, deserialize_with = "optional_port")]
    pub host: Option<u16>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

/// Key/value pair declared as a block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Image built from a local context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Build {
    pub file: Option<String>,
    pub context: String,
}

/// Readiness checks run after a workload is created
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthCheck {
    pub timeout: String,
    pub http: Option<String>,
    /// Pod label selectors that must be running
    pub pods: Vec<String>,
    pub nomad_jobs: Vec<String>,
}

// ============================================================================
// Block helpers
// ============================================================================

/// Decode a block that may appear at most once
///
/// Blocks are always collected as lists by the decoder; a single object is
/// also accepted so attribute syntax (`image = { name = "x" }`) works too.
pub(crate) fn single<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(OneOrMany::One(value)) => Ok(Some(value)),
        Some(OneOrMany::Many(mut values)) => match values.len() {
            0 | 1 => Ok(values.pop()),
            n => Err(de::Error::custom(format!(
                "expected at most one block, found {n}"
            ))),
        },
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

fn to_port<E: de::Error>(raw: NumberOrString) -> Result<u16, E> {
    let value = match raw {
        NumberOrString::Number(n) => n,
        NumberOrString::String(s) => s
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("invalid port {s:?}")))?,
    };
    u16::try_from(value).map_err(|_| E::custom(format!("port {value} out of range")))
}

/// Port given as a number or a numeric string
pub(crate) fn port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    to_port(NumberOrString::deserialize(deserializer)?)
}

pub(crate) fn optional_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrString>::deserialize(deserializer)?
        .map(to_port)
        .transpose()
}

/// Parse `"true"`/`"false"` as written by variables and the environment
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Bool given as a bool or a `"true"`/`"false"` string
pub(crate) fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::String(s) => {
            parse_bool(&s).ok_or_else(|| de::Error::custom(format!("invalid bool {s:?}")))
        }
    }
}

/// Count given as a number or a numeric string
pub(crate) fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n,
        NumberOrString::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid number {s:?}")))?,
    };
    u32::try_from(value).map_err(|_| de::Error::custom(format!("{value} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "single")]
        image: Option<Image>,
    }

    #[test]
    fn test_single_accepts_one_block() {
        let h: Holder = serde_json::from_value(json!({"image": [{"name": "consul"}]})).unwrap();
        assert_eq!(h.image.unwrap().name, "consul");
    }

    #[test]
    fn test_single_accepts_object() {
        let h: Holder = serde_json::from_value(json!({"image": {"name": "consul"}})).unwrap();
        assert_eq!(h.image.unwrap().name, "consul");
    }

    #[test]
    fn test_single_missing_is_none() {
        let h: Holder = serde_json::from_value(json!({})).unwrap();
        assert!(h.image.is_none());
    }

    #[test]
    fn test_single_rejects_repeated_block() {
        let err = serde_json::from_value::<Holder>(
            json!({"image": [{"name": "a"}, {"name": "b"}]}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("at most one block"));
    }

    #[test]
    fn test_port_accepts_numeric_string() {
        let p: Port = serde_json::from_value(json!({"local": "8500", "host": 18500})).unwrap();
        assert_eq!(p.local, 8500);
        assert_eq!(p.host, Some(18500));
        assert_eq!(p.remote, None);
        assert_eq!(p.protocol, "tcp");
    }

    #[test]
    fn test_port_rejects_out_of_range() {
        assert!(serde_json::from_value::<Port>(json!({"local": 70000})).is_err());
        assert!(serde_json::from_value::<Port>(json!({"local": "http"})).is_err());
    }

    #[test]
    fn test_volume_bind_detection() {
        let mut v = Volume::default();
        assert!(v.is_bind());
        v.kind = "bind".to_string();
        assert!(v.is_bind());
        v.kind = "volume".to_string();
        assert!(!v.is_bind());
    }

    #[test]
    fn test_unknown_nested_field_rejected() {
        assert!(serde_json::from_value::<Image>(json!({"name": "a", "tag": "b"})).is_err());
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Flags {
        #[serde(deserialize_with = "bool_or_string")]
        enabled: bool,
        #[serde(deserialize_with = "count")]
        nodes: u32,
    }

    #[test]
    fn test_bool_and_count_accept_strings() {
        let f: Flags = serde_json::from_value(json!({"enabled": "true", "nodes": "3"})).unwrap();
        assert!(f.enabled);
        assert_eq!(f.nodes, 3);

        let f: Flags = serde_json::from_value(json!({"enabled": false, "nodes": 2})).unwrap();
        assert!(!f.enabled);
        assert_eq!(f.nodes, 2);

        let f: Flags = serde_json::from_value(json!({"enabled": " FALSE "})).unwrap();
        assert!(!f.enabled);
        assert_eq!(f.nodes, 0);
    }

    #[test]
    fn test_bool_and_count_reject_garbage() {
        assert!(serde_json::from_value::<Flags>(json!({"enabled": "yes"})).is_err());
        assert!(serde_json::from_value::<Flags>(json!({"nodes": "three"})).is_err());
        assert!(serde_json::from_value::<Flags>(json!({"nodes": 5_000_000_000_u64})).is_err());
    }
}
