//! Variable passes: values files, environment and caller overrides, and
//! declared `variable` blocks.

use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::Path;

use super::{Document, block_name};
use crate::decode::body_to_json;
use crate::error::{Error, Result};
use crate::eval::{EvalContext, json_to_value};
use crate::resource::{ResourceKind, Variable};

/// Load a flat attribute file into `var`, later keys overwriting earlier ones
pub(super) fn load_values_file(ctx: &mut EvalContext, path: &Path) -> Result<()> {
    log::debug!("Loading variables from {}", path.display());
    let doc = Document::load(path)?;
    for attribute in doc.body.attributes() {
        let value = ctx.for_file(path).evaluate(&attribute.expr)?;
        ctx.set_var(attribute.key.as_str(), value);
    }
    Ok(())
}

/// Import `<prefix><name>` environment variables as `var.<name>`
pub(super) fn load_env_vars(ctx: &mut EvalContext, prefix: &str) {
    let mut imported: Vec<(String, String)> = std::env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(prefix)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_string(), value))
        })
        .collect();
    imported.sort();
    for (name, value) in imported {
        log::debug!("Setting var.{name} from environment");
        ctx.set_var(name, value);
    }
}

/// Apply caller-supplied values
pub(super) fn load_map(ctx: &mut EvalContext, variables: &BTreeMap<String, String>) {
    for (name, value) in variables {
        ctx.set_var(name.as_str(), value.as_str());
    }
}

/// Register the default of every `variable` block not already set
pub(super) fn declare_variables(ctx: &mut EvalContext, doc: &Document) -> Result<()> {
    let blocks = doc
        .body
        .blocks()
        .filter(|b| b.identifier.as_str() == ResourceKind::Variable.as_str());

    for block in blocks {
        let name = block_name(block, ResourceKind::Variable, &doc.path)?;
        let id = format!("{}.{name}", ResourceKind::Variable);
        let decode_error = |message: String| Error::Decode {
            id: id.clone(),
            file: doc.path.clone(),
            message,
        };

        let attributes = body_to_json(&block.body, &ctx.for_file(&doc.path))?;
        if !attributes.contains_key("default") {
            return Err(decode_error("missing attribute `default`".to_string()));
        }
        let variable: Variable = serde_json::from_value(Json::Object(attributes))
            .map_err(|e| decode_error(e.to_string()))?;

        if ctx.set_var_if_missing(name.as_str(), json_to_value(&variable.default)) {
            log::debug!("Declared var.{name} with its default");
        }
    }
    Ok(())
}
