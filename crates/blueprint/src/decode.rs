//! Turn an HCL block body into JSON attributes
//!
//! Attributes are evaluated against the context. Nested blocks are collected
//! into lists keyed by block type; whether a kind accepts one or many is up
//! to its schema. A label on a nested block becomes its `name`.

use hcl::Body;
use serde_json::{Map, Value as Json};

use crate::error::Result;
use crate::eval::{EvalContext, value_to_json};

pub(crate) fn body_to_json(body: &Body, ctx: &EvalContext) -> Result<Map<String, Json>> {
    let mut out = Map::new();

    for attribute in body.attributes() {
        let value = ctx.evaluate(&attribute.expr)?;
        out.insert(attribute.key.as_str().to_string(), value_to_json(&value));
    }

    let mut blocks: Map<String, Json> = Map::new();
    for block in body.blocks() {
        let mut nested = body_to_json(&block.body, ctx)?;
        if let Some(label) = block.labels.first() {
            nested.insert("name".to_string(), Json::String(label.as_str().to_string()));
        }
        let entry = blocks
            .entry(block.identifier.as_str().to_string())
            .or_insert_with(|| Json::Array(Vec::new()));
        if let Json::Array(items) = entry {
            items.push(Json::Object(nested));
        }
    }

    for (key, value) in blocks {
        out.entry(key).or_insert(value);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(src: &str) -> Json {
        let body = hcl::parse(src).unwrap();
        let mut ctx = EvalContext::new();
        ctx.set_var("net", "cloud");
        Json::Object(body_to_json(&body, &ctx).unwrap())
    }

    #[test]
    fn test_attributes_and_repeated_blocks() {
        let json = decode(
            r#"
image = "consul"
ports = [1, 2]
network {
  name = "network.${var.net}"
}
network {
  name = "network.onprem"
}
"#,
        );
        assert_eq!(
            json,
            json!({
                "image": "consul",
                "ports": [1, 2],
                "network": [{"name": "network.cloud"}, {"name": "network.onprem"}],
            })
        );
    }

    #[test]
    fn test_nested_block_label_becomes_name() {
        let json = decode("port \"http\" {\n  local = 80\n}\n");
        assert_eq!(json, json!({"port": [{"name": "http", "local": 80}]}));
    }

    #[test]
    fn test_attribute_wins_over_block_of_same_name() {
        let json = decode("env = []\nenv {\n  key = \"A\"\n}\n");
        assert_eq!(json, json!({"env": []}));
    }
}
