//! Environment metadata
//!
//! A blueprint comes from either a structured `*.yard` document (HCL
//! attributes) or the YAML frontmatter of a `README.md`, whose markdown body
//! becomes the introduction.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::resource::types::KeyValue;

const DEFAULT_HEALTH_CHECK_TIMEOUT: &str = "30s";

/// Metadata describing a whole environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Blueprint {
    pub author: String,
    pub title: String,
    pub slug: String,
    /// URLs opened once the environment is up
    #[serde(deserialize_with = "comma_list")]
    pub browser_windows: Vec<String>,
    #[serde(rename = "env")]
    pub environment: Vec<KeyValue>,
    pub health_check_timeout: String,
    /// Minimum tool version
    pub berth_version: String,
    pub intro: String,
}

impl Default for Blueprint {
    fn default() -> Self {
        Self {
            author: String::new(),
            title: String::new(),
            slug: String::new(),
            browser_windows: Vec::new(),
            environment: Vec::new(),
            health_check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT.to_string(),
            berth_version: String::new(),
            intro: String::new(),
        }
    }
}

/// Accept a list or a comma-separated string
fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<String>),
        String(String),
    }

    Ok(match ListOrString::deserialize(deserializer)? {
        ListOrString::List(list) => list,
        ListOrString::String(s) => split_commas(&s),
    })
}

fn split_commas(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Frontmatter {
    author: String,
    title: String,
    slug: String,
    browser_windows: String,
    health_check_timeout: Option<String>,
    berth_version: String,
    env: Vec<String>,
}

/// Split content into YAML frontmatter (between the first two `---` lines)
/// and the remaining body
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

impl Blueprint {
    /// Build a blueprint from a markdown document with YAML frontmatter
    ///
    /// A document without frontmatter gives the defaults with the whole
    /// document as intro. Returns `None` when the frontmatter is malformed.
    pub fn from_markdown(content: &str) -> Option<Self> {
        let Some((yaml, body)) = split_frontmatter(content) else {
            return Some(Self {
                intro: content.to_string(),
                ..Self::default()
            });
        };
        let front: Frontmatter = match serde_yaml::from_str::<Option<Frontmatter>>(yaml) {
            Ok(front) => front.unwrap_or_default(),
            Err(e) => {
                log::warn!("Ignoring malformed blueprint frontmatter: {e}");
                return None;
            }
        };

        let environment = front
            .env
            .iter()
            .filter_map(|entry| {
                let parts: Vec<&str> = entry.split('=').collect();
                match parts.as_slice() {
                    [key, value] => Some(KeyValue {
                        key: (*key).to_string(),
                        value: (*value).to_string(),
                    }),
                    _ => None,
                }
            })
            .collect();

        Some(Self {
            author: front.author,
            title: front.title,
            slug: front.slug,
            browser_windows: split_commas(&front.browser_windows),
            environment,
            health_check_timeout: front
                .health_check_timeout
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_HEALTH_CHECK_TIMEOUT.to_string()),
            berth_version: front.berth_version,
            intro: body.to_string(),
        })
    }
}
