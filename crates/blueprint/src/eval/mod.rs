//! Expression evaluation
//!
//! [`EvalContext`] holds the `var` namespace and any extra top-level values,
//! and knows which document is being decoded. It is an ordinary value: each
//! root parse creates its own, binding a file produces a derived copy, and
//! module recursion works on a clone, so nothing flows back to the parent.
//!
//! HCL functions are plain function pointers. The file-scoped ones
//! (`file_path`, `file_dir`, `file`) read the file bound for the evaluation in
//! progress, which [`FileScope`] installs for the duration of one synchronous
//! `evaluate` call and restores on drop.

mod functions;

use hcl::eval::{Context, Evaluate, FuncDef, ParamType};
use hcl::{Expression, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};

pub use functions::BUILTINS;

thread_local! {
    static CURRENT_FILE: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

/// Binds the current file for file-scoped functions until dropped
struct FileScope {
    previous: Option<PathBuf>,
}

impl FileScope {
    fn enter(file: Option<PathBuf>) -> Self {
        let previous = CURRENT_FILE.with(|current| current.replace(file));
        Self { previous }
    }
}

impl Drop for FileScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_FILE.with(|current| *current.borrow_mut() = previous);
    }
}

/// File bound for the evaluation in progress
pub(crate) fn current_file() -> Option<PathBuf> {
    CURRENT_FILE.with(|current| current.borrow().clone())
}

/// Variables and bindings visible to attribute expressions
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    vars: hcl::Map<String, Value>,
    scope: BTreeMap<String, Value>,
    file: Option<PathBuf>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derived context bound to `file`
    pub fn for_file(&self, file: &Path) -> Self {
        Self {
            file: Some(file.to_path_buf()),
            ..self.clone()
        }
    }

    /// File this context is bound to
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Set `var.<name>`, replacing any previous value
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Set `var.<name>` only when it has no value yet
    ///
    /// Returns whether the value was set.
    pub fn set_var_if_missing(&mut self, name: impl Into<String>, value: impl Into<Value>) -> bool {
        let name = name.into();
        if self.vars.contains_key(&name) {
            return false;
        }
        self.vars.insert(name, value.into());
        true
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Expose a top-level value to expressions, alongside `var`
    pub fn declare(&mut self, name: impl Into<String>, value: Value) {
        self.scope.insert(name.into(), value);
    }

    /// Expose every resource as `<kind>.<name>` with its decoded attributes
    pub fn declare_resources(&mut self, config: &Config) -> Result<()> {
        let mut kinds: BTreeMap<String, hcl::Map<String, Value>> = BTreeMap::new();
        for resource in config.resources() {
            let attributes = resource.attributes().map_err(|e| Error::Decode {
                id: resource.id(),
                file: PathBuf::new(),
                message: e.to_string(),
            })?;
            kinds
                .entry(resource.kind().to_string())
                .or_default()
                .insert(resource.name().to_string(), json_to_value(&attributes));
        }
        for (kind, resources) in kinds {
            self.declare(kind, Value::Object(resources));
        }
        Ok(())
    }

    /// Evaluate an expression with this context's bindings
    pub fn evaluate(&self, expr: &Expression) -> Result<Value> {
        let _scope = FileScope::enter(self.file.clone());
        expr.evaluate(&self.hcl_context()).map_err(|e| Error::Eval {
            file: self.file.clone().unwrap_or_default(),
            message: e.to_string(),
        })
    }

    fn hcl_context(&self) -> Context<'static> {
        let mut ctx = Context::new();
        for builtin in BUILTINS {
            let mut def = FuncDef::builder();
            for _ in 0..builtin.arity {
                def = def.param(ParamType::String);
            }
            ctx.declare_func(builtin.name, def.build(builtin.func));
        }
        for (name, value) in &self.scope {
            ctx.declare_var(name.as_str(), value.clone());
        }
        ctx.declare_var("var", Value::Object(self.vars.clone()));
        ctx
    }
}

/// Convert an evaluated value to JSON for schema decoding
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::to_value(n).unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

/// Convert decoded JSON back into an expression value
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(hcl::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::Array(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        ),
    }
}
