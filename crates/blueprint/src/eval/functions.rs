//! Functions callable from attribute expressions

use hcl::Value;
use hcl::eval::FuncArgs;
use std::path::{Path, PathBuf};

use super::current_file;
use crate::connection::ClusterConnection;
use crate::paths;
use crate::resource::parse_id;

type Func = fn(FuncArgs) -> Result<Value, String>;

/// A named function taking `arity` string arguments
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub func: Func,
}

/// Every function available to expressions
pub const BUILTINS: &[Builtin] = &[
    Builtin { name: "env", arity: 1, func: env },
    Builtin { name: "home", arity: 0, func: home },
    Builtin { name: "berth", arity: 0, func: berth },
    Builtin { name: "file_path", arity: 0, func: file_path },
    Builtin { name: "file_dir", arity: 0, func: file_dir },
    Builtin { name: "file", arity: 1, func: file },
    Builtin { name: "data", arity: 1, func: data },
    Builtin { name: "docker_ip", arity: 0, func: docker_ip },
    Builtin { name: "docker_host", arity: 0, func: docker_host },
    Builtin { name: "berth_ip", arity: 0, func: berth_ip },
    Builtin { name: "k8s_config", arity: 1, func: k8s_config },
    Builtin { name: "k8s_config_docker", arity: 1, func: k8s_config_docker },
    Builtin { name: "cluster_api", arity: 1, func: cluster_api },
];

fn arg(args: &FuncArgs, index: usize) -> &str {
    args.get(index).and_then(Value::as_str).unwrap_or_default()
}

fn path_value(path: &Path) -> Value {
    Value::from(path.to_string_lossy().into_owned())
}

fn bound_file() -> Result<PathBuf, String> {
    current_file().ok_or_else(|| "no file is bound to this expression".to_string())
}

/// Accept `k3s` or `k8s_cluster.k3s`
fn cluster_name(id: &str) -> &str {
    parse_id(id).map_or(id, |(_, name)| name)
}

fn env(args: FuncArgs) -> Result<Value, String> {
    Ok(Value::from(std::env::var(arg(&args, 0)).unwrap_or_default()))
}

fn home(_args: FuncArgs) -> Result<Value, String> {
    Ok(path_value(&paths::home_folder()))
}

fn berth(_args: FuncArgs) -> Result<Value, String> {
    Ok(path_value(&paths::data_home()))
}

fn file_path(_args: FuncArgs) -> Result<Value, String> {
    Ok(path_value(&bound_file()?))
}

fn file_dir(_args: FuncArgs) -> Result<Value, String> {
    let file = bound_file()?;
    Ok(path_value(file.parent().unwrap_or_else(|| Path::new("/"))))
}

fn file(args: FuncArgs) -> Result<Value, String> {
    let path = paths::ensure_absolute(arg(&args, 0), &bound_file()?);
    std::fs::read_to_string(&path)
        .map(Value::from)
        .map_err(|e| format!("unable to read file {path}: {e}"))
}

fn data(args: FuncArgs) -> Result<Value, String> {
    paths::data_folder(&paths::data_home(), arg(&args, 0))
        .map(|p| path_value(&p))
        .map_err(|e| format!("unable to create data folder: {e}"))
}

fn docker_ip(_args: FuncArgs) -> Result<Value, String> {
    Ok(Value::from(paths::docker_ip()))
}

fn docker_host(_args: FuncArgs) -> Result<Value, String> {
    Ok(Value::from(paths::docker_host()))
}

fn berth_ip(_args: FuncArgs) -> Result<Value, String> {
    Ok(Value::from(paths::local_ip()))
}

fn k8s_config(args: FuncArgs) -> Result<Value, String> {
    let paths = paths::kubeconfig_paths(&paths::data_home(), cluster_name(arg(&args, 0)));
    Ok(path_value(&paths.host))
}

fn k8s_config_docker(args: FuncArgs) -> Result<Value, String> {
    let paths = paths::kubeconfig_paths(&paths::data_home(), cluster_name(arg(&args, 0)));
    Ok(path_value(&paths.docker))
}

/// API address of a cluster that has been created
///
/// Evaluates to an empty string until the cluster has persisted its
/// connection, so documents referencing it still parse beforehand.
fn cluster_api(args: FuncArgs) -> Result<Value, String> {
    let name = cluster_name(arg(&args, 0));
    match ClusterConnection::load(&paths::data_home(), name) {
        Ok(conn) => Ok(Value::from(conn.api_address())),
        Err(e) => {
            log::debug!("No connection for cluster {name}: {e}");
            Ok(Value::from(""))
        }
    }
}
