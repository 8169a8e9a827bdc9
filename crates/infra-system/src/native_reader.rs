// Process table reader using native enumeration
// reason: sysinfo for cross-platform process listing without external utilities
use std::collections::BTreeSet;
use std::sync::Mutex;
use sysinfo::{ProcessStatus, System};
use tracing::{debug, warn};

use pidwatch_core::port::ProcessTableReader;

/// Lists running processes through `sysinfo`
///
/// Zombie and dead entries are skipped, matching the defunct filter of the
/// shell reader. An enumeration that misses our own process is reported as
/// unreadable.
pub struct NativeProcessTableReader {
    system: Mutex<System>,
}

impl NativeProcessTableReader {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for NativeProcessTableReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTableReader for NativeProcessTableReader {
    fn list_running_process_ids(&self) -> Option<BTreeSet<u32>> {
        let mut sys = self
            .system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        sys.refresh_processes();

        let pids: BTreeSet<u32> = sys
            .processes()
            .iter()
            .filter(|(_, process)| {
                !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
            })
            .map(|(pid, _)| pid.as_u32())
            .filter(|pid| *pid > 0)
            .collect();

        if !pids.contains(&std::process::id()) {
            warn!(count = pids.len(), "Native process table does not list this process");
            return None;
        }

        debug!(count = pids.len(), "Native process table read");
        Some(pids)
    }
}
