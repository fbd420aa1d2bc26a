//! Parsing pipeline
//!
//! A folder is parsed in a fixed order:
//!
//! 1. `*.vars` files into `var` (skipped for modules)
//! 2. overrides: `SY_VAR_*` environment variables, the caller's map, then an
//!    explicit variables file (skipped for modules)
//! 3. blueprint discovery: first `*.yard`, else `README.md`
//!    (skipped for modules)
//! 4. `variable` blocks, registering defaults only where no value is set
//! 5. resource blocks, expanding `module` blocks inline
//! 6. `output` blocks, which can reference every resource parsed so far
//!
//! Every `*.hcl` document is parsed up front, so a syntax error anywhere in
//! the folder fails before any of its resources are added.

mod module;
mod variables;

use hcl::{Block, Body};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::blueprint::Blueprint;
use crate::config::Config;
use crate::decode::body_to_json;
use crate::error::{Error, Result};
use crate::eval::EvalContext;
use crate::getter::Getter;
use crate::paths;
use crate::registry::{self, KindEntry};
use crate::resource::types::parse_bool;
use crate::resource::{Info, Resource, ResourceKind};

/// Default prefix of environment variables imported into `var`
pub const DEFAULT_VAR_PREFIX: &str = "SY_VAR_";

/// Options for one folder parse
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Skip variable files, overrides, and blueprint discovery
    pub only_resources: bool,
    /// Module path written to every resource's `Info::module`
    pub module: String,
    /// Disable every resource parsed
    pub disabled: bool,
    /// Dependencies seeded into every resource
    pub depends_on: Vec<String>,
    /// Caller-supplied values for `var`
    pub variables: BTreeMap<String, String>,
    /// Values file applied after every other source
    pub variables_file: Option<PathBuf>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn variables_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.variables_file = Some(path.into());
        self
    }

    pub fn module(mut self, name: impl Into<String>) -> Self {
        self.module = name.into();
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn depends_on(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    pub fn only_resources(mut self, only_resources: bool) -> Self {
        self.only_resources = only_resources;
        self
    }
}

/// A parsed definition document
pub(crate) struct Document {
    pub path: PathBuf,
    pub body: Body,
}

impl Document {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let body = hcl::parse(&content).map_err(|e| Error::syntax(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            body,
        })
    }
}

/// Label naming a block
pub(crate) fn block_name(block: &Block, kind: ResourceKind, file: &Path) -> Result<String> {
    block
        .labels
        .first()
        .map(|label| label.as_str().to_string())
        .ok_or_else(|| Error::Decode {
            id: kind.to_string(),
            file: file.to_path_buf(),
            message: "block has no name label".to_string(),
        })
}

/// Files in `folder` matching `pattern`, sorted by name
fn glob_sorted(folder: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&folder.to_string_lossy());
    let full = format!("{escaped}/{pattern}");
    let entries = glob::glob(&full).map_err(|e| {
        Error::io(
            folder,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
        )
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            Error::io(path, e.into())
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| Error::io(path, e))
}

/// Turns definition documents into a `Config`
pub struct Parser {
    getter: Box<dyn Getter>,
    home: PathBuf,
    var_prefix: String,
}

impl Parser {
    /// Parser fetching remote modules with `getter` into the data home
    pub fn new(getter: impl Getter + 'static) -> Self {
        Self {
            getter: Box::new(getter),
            home: paths::data_home(),
            var_prefix: DEFAULT_VAR_PREFIX.to_string(),
        }
    }

    /// Use a different data home for fetched modules
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    /// Import environment variables with this prefix instead of `SY_VAR_`
    pub fn with_var_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.var_prefix = prefix.into();
        self
    }

    /// Parse a single document
    ///
    /// No `*.vars` files or blueprint are discovered. Variables follow the
    /// same precedence as a folder parse.
    pub fn parse_file(
        &self,
        path: &Path,
        variables: &BTreeMap<String, String>,
        variables_file: Option<&Path>,
    ) -> Result<Config> {
        let path = absolute(path)?;
        log::debug!("Parsing file {}", path.display());

        let mut ctx = EvalContext::new();
        self.apply_overrides(&mut ctx, variables, variables_file)?;

        let docs = [Document::load(&path)?];
        let mut config = Config::new();
        self.parse_documents(&mut ctx, &docs, &mut config, &ParseOptions::default())?;
        Ok(config)
    }

    /// Parse every document in `path` into `config`
    ///
    /// Each call starts from a fresh evaluation context.
    pub fn parse_folder(
        &self,
        path: &Path,
        config: &mut Config,
        options: &ParseOptions,
    ) -> Result<()> {
        let mut ctx = EvalContext::new();
        self.parse_folder_with(&mut ctx, path, config, options)
    }

    fn parse_folder_with(
        &self,
        ctx: &mut EvalContext,
        folder: &Path,
        config: &mut Config,
        options: &ParseOptions,
    ) -> Result<()> {
        let folder = absolute(folder)?;
        log::debug!("Parsing folder {}", folder.display());

        if !options.only_resources {
            for file in glob_sorted(&folder, "*.vars")? {
                variables::load_values_file(ctx, &file)?;
            }
            self.apply_overrides(ctx, &options.variables, options.variables_file.as_deref())?;

            if config.blueprint.is_none() {
                config.blueprint = discover_blueprint(ctx, &folder)?;
            }
        }

        let docs = glob_sorted(&folder, "*.hcl")?
            .iter()
            .map(|path| Document::load(path))
            .collect::<Result<Vec<_>>>()?;

        self.parse_documents(ctx, &docs, config, options)
    }

    fn apply_overrides(
        &self,
        ctx: &mut EvalContext,
        variables: &BTreeMap<String, String>,
        variables_file: Option<&Path>,
    ) -> Result<()> {
        variables::load_env_vars(ctx, &self.var_prefix);
        variables::load_map(ctx, variables);
        if let Some(file) = variables_file {
            variables::load_values_file(ctx, &absolute(file)?)?;
        }
        Ok(())
    }

    fn parse_documents(
        &self,
        ctx: &mut EvalContext,
        docs: &[Document],
        config: &mut Config,
        options: &ParseOptions,
    ) -> Result<()> {
        for doc in docs {
            variables::declare_variables(ctx, doc)?;
        }

        for doc in docs {
            self.parse_resources(ctx, doc, config, options)?;
        }

        let mut output_ctx = ctx.clone();
        output_ctx.declare_resources(config)?;
        for doc in docs {
            parse_outputs(&output_ctx, doc, config, options)?;
        }
        Ok(())
    }

    fn parse_resources(
        &self,
        ctx: &EvalContext,
        doc: &Document,
        config: &mut Config,
        options: &ParseOptions,
    ) -> Result<()> {
        for block in doc.body.blocks() {
            let kind = block.identifier.as_str();
            if kind == ResourceKind::Variable.as_str() || kind == ResourceKind::Output.as_str() {
                continue;
            }

            let entry = registry::lookup(kind).ok_or_else(|| Error::UnknownResourceType {
                kind: kind.to_string(),
                file: doc.path.clone(),
            })?;
            let resource = decode_block(ctx, entry, block, &doc.path, options)?;

            let id = resource.id();
            let module = match &resource {
                Resource::Module(m) => Some(m.clone()),
                _ => None,
            };
            let is_network = resource.kind() == ResourceKind::Network;

            add_resource(config, resource, &doc.path)?;

            if is_network {
                link_image_cache(config, &id);
            }
            if let Some(module) = module {
                self.expand_module(ctx, &module, config, options)?;
            }
        }
        Ok(())
    }
}

fn parse_outputs(
    ctx: &EvalContext,
    doc: &Document,
    config: &mut Config,
    options: &ParseOptions,
) -> Result<()> {
    let kind = ResourceKind::Output.as_str();
    let blocks = doc
        .body
        .blocks()
        .filter(|b| b.identifier.as_str() == kind);

    for block in blocks {
        let entry = registry::lookup(kind).ok_or_else(|| Error::UnknownResourceType {
            kind: kind.to_string(),
            file: doc.path.clone(),
        })?;
        let resource = decode_block(ctx, entry, block, &doc.path, options)?;
        add_resource(config, resource, &doc.path)?;
    }
    Ok(())
}

/// Decode one block into a resource carrying the folder's module state
fn decode_block(
    ctx: &EvalContext,
    entry: &KindEntry,
    block: &Block,
    file: &Path,
    options: &ParseOptions,
) -> Result<Resource> {
    let name = block_name(block, entry.kind, file)?;
    let id = format!("{}.{name}", entry.kind);
    let decode_error = |message: String| Error::Decode {
        id: id.clone(),
        file: file.to_path_buf(),
        message,
    };

    let mut attributes = body_to_json(&block.body, &ctx.for_file(file))?;

    let disabled = match attributes.remove("disabled") {
        None | Some(Json::Null) => false,
        Some(Json::Bool(disabled)) => disabled,
        Some(other) => other.as_str().and_then(parse_bool).ok_or_else(|| {
            decode_error(format!("`disabled` must be a bool, got {other}"))
        })?,
    };
    let depends = match attributes.remove("depends_on") {
        None | Some(Json::Null) => Vec::new(),
        Some(value) => serde_json::from_value::<Vec<String>>(value)
            .map_err(|e| decode_error(format!("`depends_on`: {e}")))?,
    };

    let mut info = Info::new(name, entry.kind);
    info.module = options.module.clone();
    info.depends = depends;
    info.depends_on = options.depends_on.clone();
    info.disabled = disabled;
    info.apply_disabled(options.disabled);

    let mut resource =
        (entry.decode)(info, Json::Object(attributes)).map_err(|e| decode_error(e.to_string()))?;
    resource.normalize(file);
    Ok(resource)
}

fn add_resource(config: &mut Config, resource: Resource, file: &Path) -> Result<()> {
    let id = resource.id();
    resource
        .validate()
        .and_then(|()| config.add_resource(resource))
        .map_err(|e| Error::AddResource {
            id,
            file: file.to_path_buf(),
            source: Box::new(e),
        })
}

/// Make a singleton image cache depend on a newly added network
fn link_image_cache(config: &mut Config, network_id: &str) {
    let caches: Vec<String> = config
        .find_resources_by_kind(ResourceKind::ImageCache)
        .iter()
        .map(|r| r.id())
        .collect();

    if let [cache] = caches.as_slice() {
        if let Ok(resource) = config.find_resource_mut(cache) {
            log::debug!("Image cache {cache} now depends on {network_id}");
            resource.info_mut().depends_on.push(network_id.to_string());
        }
    }
}

fn discover_blueprint(ctx: &EvalContext, folder: &Path) -> Result<Option<Blueprint>> {
    if let Some(file) = glob_sorted(folder, "*.yard")?.into_iter().next() {
        log::debug!("Loading blueprint from {}", file.display());
        let doc = Document::load(&file)?;
        let attributes = body_to_json(&doc.body, &ctx.for_file(&file))?;
        let blueprint = serde_json::from_value(Json::Object(attributes)).map_err(|e| {
            Error::Decode {
                id: "blueprint".to_string(),
                file: file.clone(),
                message: e.to_string(),
            }
        })?;
        return Ok(Some(blueprint));
    }

    let readme = folder.join("README.md");
    if readme.is_file() {
        log::debug!("Loading blueprint from {}", readme.display());
        let content = std::fs::read_to_string(&readme).map_err(|e| Error::io(&readme, e))?;
        return Ok(Blueprint::from_markdown(&content));
    }

    Ok(None)
}
