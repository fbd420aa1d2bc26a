use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "berth")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative local environments: parse HCL blueprints and run clusters", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and link a blueprint, then summarize it
    Check(ParseArgs),

    /// Print the resource dependency graph
    Graph(GraphArgs),

    /// Create or destroy Kubernetes clusters
    #[command(subcommand)]
    Cluster(ClusterCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared Arguments
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// Folder of *.hcl files, or a single file
    #[arg(default_value = ".")]
    pub path: String,

    /// Set a variable (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub vars: Vec<(String, String)>,

    /// Values file applied after every other variable source
    #[arg(long, value_name = "FILE")]
    pub vars_file: Option<String>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty variable name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

// ============================================================================
// Graph
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct GraphArgs {
    #[command(flatten)]
    pub parse: ParseArgs,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: GraphFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Json,
}

// ============================================================================
// Cluster Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ClusterCommand {
    /// Create every enabled k3s cluster in the blueprint
    Up(ClusterArgs),

    /// Destroy every k3s cluster in the blueprint
    Down(ClusterArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    #[command(flatten)]
    pub parse: ParseArgs,

    /// Only act on this cluster (name or k8s_cluster.<name>)
    #[arg(long)]
    pub only: Option<String>,

    /// Number of clusters handled in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}
