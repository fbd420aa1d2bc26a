use anyhow::Result;
use blueprint::{Config, ResourceKind};

use crate::Context;
use crate::cli::ParseArgs;
use crate::ui;

/// Count resources per kind, in declaration order of the kinds
fn counts(config: &Config) -> Vec<(ResourceKind, usize, usize)> {
    ResourceKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let resources = config.find_resources_by_kind(kind);
            if resources.is_empty() {
                return None;
            }
            let disabled = resources.iter().filter(|r| r.info().disabled).count();
            Some((kind, resources.len(), disabled))
        })
        .collect()
}

pub fn run(ctx: &Context, args: &ParseArgs) -> Result<()> {
    let config = super::load(ctx, args)?;
    if ctx.quiet {
        return Ok(());
    }

    if let Some(blueprint) = &config.blueprint {
        ui::header(if blueprint.title.is_empty() {
            "Blueprint"
        } else {
            blueprint.title.as_str()
        });
        if !blueprint.author.is_empty() {
            ui::kv("Author", &blueprint.author);
        }
        if !blueprint.slug.is_empty() {
            ui::kv("Slug", &blueprint.slug);
        }
        for url in &blueprint.browser_windows {
            ui::kv("Opens", url);
        }
    }

    ui::section("Resources");
    for (kind, total, disabled) in counts(&config) {
        if disabled > 0 {
            ui::kv(kind.as_str(), &format!("{total} ({disabled} disabled)"));
        } else {
            ui::kv(kind.as_str(), &total.to_string());
        }
    }

    println!();
    ui::success(&format!("{} resources parsed and linked", config.len()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint::resource::{Container, Network, ResourceSpec};

    #[test]
    fn test_counts_by_kind() {
        let mut config = Config::new();
        config.add_resource(Network::new("cloud")).unwrap();
        config.add_resource(Container::new("web")).unwrap();
        let mut off = Container::new("off");
        off.info.disabled = true;
        config.add_resource(off).unwrap();

        assert_eq!(
            counts(&config),
            vec![(ResourceKind::Container, 2, 1), (ResourceKind::Network, 1, 0)]
        );
    }

    #[test]
    fn test_counts_empty() {
        assert!(counts(&Config::new()).is_empty());
    }
}
