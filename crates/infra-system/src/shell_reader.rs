// Process table reader backed by `ps` and `awk`
use std::collections::BTreeSet;
use tracing::{debug, warn};

use pidwatch_core::application::constants::DEFAULT_DEFUNCT_MARKER;
use pidwatch_core::config::SupervisorConfig;
use pidwatch_core::domain::parse_pid;
use pidwatch_core::port::ProcessTableReader;

use crate::shell;

/// Lists running processes with `ps x`, filtered by `awk '! /defunct/ {print $1}'`
///
/// `ps x` covers every process of the current user, which includes any worker
/// the dispatcher spawned. Listing and filter run as separate steps so a
/// failing `ps` is never hidden behind the filter's exit status.
pub struct ShellProcessTableReader {
    defunct_marker: String,
}

impl ShellProcessTableReader {
    pub fn new(defunct_marker: impl Into<String>) -> Self {
        Self {
            defunct_marker: defunct_marker.into(),
        }
    }

    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(config.defunct_marker.clone())
    }

    /// Unfiltered `ps x` output, one entry per line (header included)
    pub fn list_raw_lines(&self) -> Vec<String> {
        shell::successful_stdout(shell::PROCESS_LISTING_SCRIPT)
            .map(|output| {
                output
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for ShellProcessTableReader {
    fn default() -> Self {
        Self::new(DEFAULT_DEFUNCT_MARKER)
    }
}

impl ProcessTableReader for ShellProcessTableReader {
    fn list_running_process_ids(&self) -> Option<BTreeSet<u32>> {
        let Some(listing) = shell::successful_stdout(shell::PROCESS_LISTING_SCRIPT) else {
            warn!(script = %shell::PROCESS_LISTING_SCRIPT, "Process listing failed");
            return None;
        };

        let filter = shell::defunct_filter_script(&self.defunct_marker);
        let filtered = match shell::pipe_through(&filter, &listing) {
            Ok(output) => output,
            Err(e) => {
                warn!(filter = %filter, error = %e, "Defunct filter failed");
                return None;
            }
        };

        let pids = parse_pid_lines(&filtered);
        // `ps x` always lists itself, so nothing parsed means garbled output
        if pids.is_empty() {
            warn!("Process listing yielded no pids");
            return None;
        }

        debug!(count = pids.len(), "Process table read");
        Some(pids)
    }
}

/// Parse filter output: one candidate id per line, junk dropped
///
/// The `ps` header (`PID`) and anything else non-numeric or non-positive is ignored.
pub fn parse_pid_lines(output: &str) -> BTreeSet<u32> {
    output.lines().filter_map(parse_pid).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pid_lines() {
        let output = "PID\n  1\n42\n\nabc\n0\n-3\n42\n 9999 \n";
        let pids = parse_pid_lines(output);
        assert_eq!(pids, BTreeSet::from([1, 42, 9999]));
    }

    #[test]
    fn test_parse_pid_lines_empty() {
        assert!(parse_pid_lines("").is_empty());
        assert!(parse_pid_lines("PID\n").is_empty());
    }

    #[cfg(target_os = "linux")]
    fn tools_available() -> bool {
        shell::script_succeeds("ps x >/dev/null 2>&1 && command -v awk >/dev/null")
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_lists_own_process_when_ps_available() {
        if !tools_available() {
            eprintln!("ps/awk not available, skipping");
            return;
        }

        let reader = ShellProcessTableReader::default();
        let pids = reader.list_running_process_ids().unwrap();
        assert!(pids.contains(&std::process::id()));
        assert!(!reader.list_raw_lines().is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_zombie_child_is_excluded() {
        if !tools_available() {
            eprintln!("ps/awk not available, skipping");
            return;
        }

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        assert!(
            crate::test_support::wait_until_zombie(pid),
            "child never became a zombie"
        );

        let reader = ShellProcessTableReader::default();
        let pid_text = pid.to_string();
        let marked = reader.list_raw_lines().iter().any(|line| {
            line.split_whitespace().next() == Some(pid_text.as_str()) && line.contains("defunct")
        });
        let pids = reader.list_running_process_ids().unwrap();
        child.wait().unwrap();

        if !marked {
            eprintln!("this ps does not mark zombies as defunct, skipping");
            return;
        }

        assert!(!pids.contains(&pid));
        assert!(pids.contains(&std::process::id()));
    }
}
