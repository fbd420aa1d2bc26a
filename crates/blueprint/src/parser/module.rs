//! Module expansion
//!
//! A module block is parsed as a nested folder into the same `Config`. The
//! nested resources inherit the module's name, its disabled flag, and its
//! dependencies. The nested parse runs on a clone of the parent's context,
//! so variables it declares and files it binds never reach the parent.

use std::path::PathBuf;

use super::{ParseOptions, Parser};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::eval::EvalContext;
use crate::paths::{is_local_folder, module_cache_folder};
use crate::resource::Module;

impl Parser {
    pub(super) fn expand_module(
        &self,
        ctx: &EvalContext,
        module: &Module,
        config: &mut Config,
        options: &ParseOptions,
    ) -> Result<()> {
        let folder = self.module_folder(module)?;
        let name = &module.info.name;

        let child_options = ParseOptions {
            only_resources: true,
            module: if options.module.is_empty() {
                name.clone()
            } else {
                format!("{}.{name}", options.module)
            },
            disabled: module.info.disabled,
            depends_on: options
                .depends_on
                .iter()
                .chain(&module.info.depends)
                .cloned()
                .collect(),
            ..ParseOptions::default()
        };

        log::debug!(
            "Expanding module {} from {}",
            child_options.module,
            folder.display()
        );
        let mut child = ctx.clone();
        self.parse_folder_with(&mut child, &folder, config, &child_options)
    }

    fn module_folder(&self, module: &Module) -> Result<PathBuf> {
        if is_local_folder(&module.source) {
            return Ok(PathBuf::from(&module.source));
        }

        let dest = module_cache_folder(&self.home, &module.source);
        log::info!(
            "Fetching module source {} into {}",
            module.source,
            dest.display()
        );
        self.getter
            .get(&module.source, &dest)
            .map_err(|cause| Error::Fetch {
                source_uri: module.source.clone(),
                cause,
            })?;
        Ok(dest)
    }
}
