use anyhow::{Context, Result};
use std::process::{Command, Output, Stdio};

fn output(cmd: &str, args: &[&str]) -> Result<Output> {
    log::debug!("Running {} {}", cmd, args.join(" "));
    Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))
}

/// Run a command and capture stdout
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let output = output(cmd, args)?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim())
    }
}

/// Run a command and capture stdout followed by stderr
///
/// Some tools (`docker logs` among them) split one stream across both.
pub fn run_combined(cmd: &str, args: &[&str]) -> Result<String> {
    let output = output(cmd, args)?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        Ok(combined)
    } else {
        anyhow::bail!("Command failed: {}", combined.trim())
    }
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
