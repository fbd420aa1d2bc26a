//! Progress indicators for long-running cluster operations

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Bar counting finished items, hidden when `quiet`
pub fn bar(len: u64, prefix: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template("  {spinner:.cyan} {prefix:.bold} [{bar:30}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_bar_is_hidden() {
        let pb = bar(3, "Creating", true);
        assert!(pb.is_hidden());
        pb.inc(1);
        assert_eq!(pb.position(), 1);
    }

    #[test]
    fn test_bar_counts() {
        let pb = bar(2, "Creating", false);
        pb.inc(2);
        assert_eq!(pb.length(), Some(2));
        pb.finish_and_clear();
    }
}
