//! Command implementations
//!
//! Every command starts from the same load: parse the blueprint at the given
//! path, then link references.

pub mod check;
pub mod cluster;
pub mod graph;

use anyhow::Result;
use blueprint::{Config, ParseOptions, Parser, parse_references};
use std::collections::BTreeMap;

use crate::Context;
use crate::cli::ParseArgs;
use crate::getter::RemoteGetter;
use crate::paths;
use crate::ui;

/// Print the category advice for a blueprint error and hand it back
fn explain(ctx: &Context, err: blueprint::Error) -> anyhow::Error {
    if !ctx.quiet {
        let category = err.category();
        ui::error(&format!("{category}: {err}"));
        ui::dim(category.advice());
    }
    anyhow::Error::new(err)
}

/// Parse and link the blueprint named by `args`
pub fn load(ctx: &Context, args: &ParseArgs) -> Result<Config> {
    let path = paths::expand(&args.path);
    let variables: BTreeMap<String, String> = args.vars.iter().cloned().collect();
    let variables_file = args.vars_file.as_deref().map(paths::expand);

    let parser = Parser::new(RemoteGetter).with_var_prefix(&ctx.settings.parse.var_prefix);

    let parsed = if path.is_file() {
        parser.parse_file(&path, &variables, variables_file.as_deref())
    } else {
        let mut options = ParseOptions::new().variables(variables);
        if let Some(file) = variables_file {
            options = options.variables_file(file);
        }
        let mut config = Config::new();
        parser
            .parse_folder(&path, &mut config, &options)
            .map(|()| config)
    };

    let mut config = parsed.map_err(|e| explain(ctx, e))?;
    parse_references(&mut config).map_err(|e| explain(ctx, e))?;
    log::info!("Loaded {} resources from {}", config.len(), path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use blueprint::Resource;
    use std::fs;

    fn ctx() -> Context {
        Context {
            verbose: 0,
            quiet: true,
            settings: Settings::default(),
        }
    }

    fn args(path: &std::path::Path) -> ParseArgs {
        ParseArgs {
            path: path.to_string_lossy().into_owned(),
            vars: Vec::new(),
            vars_file: None,
        }
    }

    #[test]
    fn test_load_folder_links_references() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("main.hcl"),
            r#"
network "cloud" {
  subnet = "10.5.0.0/16"
}

container "web" {
  image {
    name = "nginx:latest"
  }
  network {
    name = "network.cloud"
  }
}
"#,
        )
        .unwrap();

        let config = load(&ctx(), &args(tmp.path())).unwrap();
        assert!(config.is_linked());
        let web = config.find_resource("container.web").unwrap();
        assert_eq!(web.info().depends_on, vec!["network.cloud".to_string()]);
    }

    #[test]
    fn test_load_single_file_with_vars() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("net.hcl");
        fs::write(
            &file,
            r#"
variable "berth_cli_subnet" {
  default = "10.5.0.0/16"
}

network "cloud" {
  subnet = var.berth_cli_subnet
}
"#,
        )
        .unwrap();

        let mut parse = args(&file);
        parse
            .vars
            .push(("berth_cli_subnet".to_string(), "10.6.0.0/16".to_string()));
        let config = load(&ctx(), &parse).unwrap();
        let Ok(Resource::Network(network)) = config.find_resource("network.cloud") else {
            panic!("expected network.cloud");
        };
        assert_eq!(network.subnet, "10.6.0.0/16");
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("main.hcl"), "network \"cloud\" {").unwrap();
        let err = load(&ctx(), &args(tmp.path())).unwrap_err();
        assert!(err.downcast_ref::<blueprint::Error>().is_some());
    }
}
