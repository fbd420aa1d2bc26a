use anyhow::{Context as _, Result};
use blueprint::{Config, Resource};
use colored::Colorize;
use serde_json::{Value, json};

use crate::Context;
use crate::cli::{GraphArgs, GraphFormat};
use crate::ui;

fn node(resource: &Resource) -> Result<Value> {
    let info = resource.info();
    Ok(json!({
        "id": info.id(),
        "kind": info.kind,
        "name": info.name,
        "module": info.module,
        "disabled": info.disabled,
        "status": info.status,
        "depends_on": info.depends_on,
        "attributes": resource
            .attributes()
            .with_context(|| format!("Could not serialize {}", info.id()))?,
    }))
}

/// The linked graph as a JSON array of nodes
fn to_json(config: &Config) -> Result<Value> {
    let nodes = config
        .resources()
        .iter()
        .map(node)
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(nodes))
}

fn print_text(config: &Config) {
    for resource in config.resources() {
        let info = resource.info();
        let mut line = format!("{} {}", ui::status_symbol(info.disabled), info.id().bold());
        if !info.module.is_empty() {
            line.push_str(&format!(" {}", format!("(module {})", info.module).dimmed()));
        }
        println!("{line}");
        for dep in &info.depends_on {
            println!("    {} {}", "→".dimmed(), dep);
        }
    }
}

pub fn run(ctx: &Context, args: &GraphArgs) -> Result<()> {
    let config = super::load(ctx, &args.parse)?;
    match args.format {
        GraphFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&to_json(&config)?)?);
        }
        GraphFormat::Text => {
            if config.is_empty() {
                ui::warn("No resources found");
            } else {
                print_text(&config);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint::parse_references;
    use blueprint::resource::types::NetworkAttachment;
    use blueprint::resource::{Container, Network, ResourceSpec};

    #[test]
    fn test_json_nodes_carry_edges() {
        let mut config = Config::new();
        config.add_resource(Network::new("cloud")).unwrap();
        let mut web = Container::new("web");
        web.info.module = "app".to_string();
        web.networks.push(NetworkAttachment {
            name: "cloud".to_string(),
            ..NetworkAttachment::default()
        });
        config.add_resource(web).unwrap();
        parse_references(&mut config).unwrap();

        let graph = to_json(&config).unwrap();
        let nodes = graph.as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1]["id"], "container.web");
        assert_eq!(nodes[1]["kind"], "container");
        assert_eq!(nodes[1]["module"], "app");
        assert_eq!(nodes[1]["depends_on"], json!(["network.cloud"]));
        assert_eq!(nodes[1]["status"], "pending_creation");
        assert_eq!(nodes[0]["depends_on"], json!([]));
    }
}
