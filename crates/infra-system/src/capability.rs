// Platform capability probe
//
// Decides once whether `ps`-based liveness checks can be trusted on this host.
// Any doubt means "unsupported": callers then treat every existing PID file
// as a running worker instead of risking a live worker being declared dead.
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};
use sysinfo::System;
use tracing::{debug, info};

use pidwatch_core::application::constants::{PRIMITIVE_GETPID, PRIMITIVE_SHELL_EXEC};
use pidwatch_core::config::SupervisorConfig;
use pidwatch_core::port::{CapabilityProbe, ProcessTableReader};

use crate::shell;
use crate::shell_reader::ShellProcessTableReader;

/// First column of the crafted sample the text filter must keep
pub const FILTER_SAMPLE_EXPECTED: &str = "537";

/// Individual checks, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityCheck {
    ForcedSyncMode,
    WindowsHost,
    ShellPrimitive,
    SelfPidPrimitive,
    UnsupportedSystem,
    ProcessListing,
    TextFilter,
    SelfVisible,
    ProcFilesystem,
}

impl CapabilityCheck {
    pub const ALL: [CapabilityCheck; 9] = [
        CapabilityCheck::ForcedSyncMode,
        CapabilityCheck::WindowsHost,
        CapabilityCheck::ShellPrimitive,
        CapabilityCheck::SelfPidPrimitive,
        CapabilityCheck::UnsupportedSystem,
        CapabilityCheck::ProcessListing,
        CapabilityCheck::TextFilter,
        CapabilityCheck::SelfVisible,
        CapabilityCheck::ProcFilesystem,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            CapabilityCheck::ForcedSyncMode => "forced synchronous mode is off",
            CapabilityCheck::WindowsHost => "host is not Windows",
            CapabilityCheck::ShellPrimitive => "shell execution available and enabled",
            CapabilityCheck::SelfPidPrimitive => "own process id available and enabled",
            CapabilityCheck::UnsupportedSystem => "OS is not on the unsupported list",
            CapabilityCheck::ProcessListing => "`ps x` exits with status 0",
            CapabilityCheck::TextFilter => "awk drops defunct lines and keeps the first column",
            CapabilityCheck::SelfVisible => "own pid appears in the process table",
            CapabilityCheck::ProcFilesystem => "/proc is mounted (or host is macOS)",
        }
    }
}

impl fmt::Display for CapabilityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub check: CapabilityCheck,
    pub passed: bool,
    pub detail: Option<String>,
}

/// Checks evaluated until the first failure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityReport {
    pub outcomes: Vec<CheckOutcome>,
}

impl CapabilityReport {
    pub fn is_supported(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.passed)
    }

    pub fn first_failure(&self) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| !o.passed)
    }
}

/// Host facilities the probe inspects
///
/// Split out so every check can be exercised against a fake host.
pub trait ProbeHost: Send + Sync {
    fn is_windows(&self) -> bool;
    fn is_macos(&self) -> bool;
    fn shell_available(&self) -> bool;
    fn own_pid(&self) -> Option<u32>;
    fn os_identification(&self) -> String;
    fn process_listing_succeeds(&self) -> bool;
    /// Run the defunct filter over `input`, `None` if it cannot be run
    fn filter_output(&self, input: &str) -> Option<String>;
    /// `None` when the table could not be read
    fn running_process_ids(&self) -> Option<BTreeSet<u32>>;
    fn proc_fs_mounted(&self) -> bool;
}

/// The real host, seen through the process table the supervisor will use
pub struct SystemHost {
    defunct_marker: String,
    process_table: Arc<dyn ProcessTableReader>,
}

impl SystemHost {
    pub fn new(
        defunct_marker: impl Into<String>,
        process_table: Arc<dyn ProcessTableReader>,
    ) -> Self {
        Self {
            defunct_marker: defunct_marker.into(),
            process_table,
        }
    }
}

impl ProbeHost for SystemHost {
    fn is_windows(&self) -> bool {
        cfg!(windows)
    }

    fn is_macos(&self) -> bool {
        cfg!(target_os = "macos")
    }

    fn shell_available(&self) -> bool {
        shell::script_succeeds("true")
    }

    fn own_pid(&self) -> Option<u32> {
        #[cfg(unix)]
        {
            u32::try_from(nix::unistd::getpid().as_raw()).ok()
        }

        #[cfg(not(unix))]
        {
            Some(std::process::id())
        }
    }

    fn os_identification(&self) -> String {
        let uname = shell::script_stdout("uname -a 2> /dev/null").unwrap_or_default();
        if !uname.trim().is_empty() {
            return uname;
        }

        [
            System::name(),
            System::long_os_version(),
            System::kernel_version(),
            System::host_name(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }

    fn process_listing_succeeds(&self) -> bool {
        shell::script_succeeds("ps x > /dev/null 2>&1")
    }

    fn filter_output(&self, input: &str) -> Option<String> {
        let script = shell::defunct_filter_script(&self.defunct_marker);
        shell::pipe_through(&script, input).ok()
    }

    fn running_process_ids(&self) -> Option<BTreeSet<u32>> {
        self.process_table.list_running_process_ids()
    }

    fn proc_fs_mounted(&self) -> bool {
        if std::fs::read_dir("/proc").is_ok() {
            return true;
        }
        // read_dir can be refused by sandboxing even when procfs is there
        shell::script_stdout("stat -f -c \"%T\" /proc 2>/dev/null")
            .map(|fs_type| fs_type.trim_start().starts_with("proc"))
            .unwrap_or(false)
    }
}

/// Capability probe with a per-instance memoized report
pub struct PlatformCapabilityProbe {
    config: SupervisorConfig,
    host: Box<dyn ProbeHost>,
    report: OnceLock<CapabilityReport>,
}

impl PlatformCapabilityProbe {
    /// `process_table` must be the reader the supervisor is wired with, so the
    /// self-visibility check vouches for the table that liveness will use.
    pub fn new(config: SupervisorConfig, process_table: Arc<dyn ProcessTableReader>) -> Self {
        let host = SystemHost::new(config.defunct_marker.clone(), process_table);
        Self::with_host(config, Box::new(host))
    }

    pub fn with_host(config: SupervisorConfig, host: Box<dyn ProbeHost>) -> Self {
        Self {
            config,
            host,
            report: OnceLock::new(),
        }
    }

    /// Evaluated on first use, cached afterwards
    pub fn report(&self) -> &CapabilityReport {
        self.report.get_or_init(|| {
            let report = self.evaluate();
            match report.first_failure() {
                None => info!("Process table inspection supported"),
                Some(failure) => info!(
                    check = ?failure.check,
                    detail = ?failure.detail,
                    "Process table inspection unsupported, using conservative liveness"
                ),
            }
            report
        })
    }

    fn evaluate(&self) -> CapabilityReport {
        let mut report = CapabilityReport::default();
        for check in CapabilityCheck::ALL {
            let (passed, detail) = self.run_check(check);
            debug!(check = ?check, passed = %passed, detail = ?detail, "Capability check");
            report.outcomes.push(CheckOutcome {
                check,
                passed,
                detail,
            });
            if !passed {
                break;
            }
        }
        report
    }

    fn run_check(&self, check: CapabilityCheck) -> (bool, Option<String>) {
        let host = self.host.as_ref();
        match check {
            CapabilityCheck::ForcedSyncMode => (!self.config.force_sync_mode, None),
            CapabilityCheck::WindowsHost => (!host.is_windows(), None),
            CapabilityCheck::ShellPrimitive => {
                if self.config.is_primitive_disabled(PRIMITIVE_SHELL_EXEC) {
                    (false, Some(format!("{} disabled", PRIMITIVE_SHELL_EXEC)))
                } else {
                    (host.shell_available(), None)
                }
            }
            CapabilityCheck::SelfPidPrimitive => {
                if self.config.is_primitive_disabled(PRIMITIVE_GETPID) {
                    (false, Some(format!("{} disabled", PRIMITIVE_GETPID)))
                } else {
                    (host.own_pid().is_some_and(|pid| pid > 0), None)
                }
            }
            CapabilityCheck::UnsupportedSystem => {
                let marker = self.config.unsupported_system_marker.to_lowercase();
                let os = host.os_identification();
                let unsupported = !marker.is_empty() && os.to_lowercase().contains(&marker);
                (!unsupported, Some(os.trim().to_string()))
            }
            CapabilityCheck::ProcessListing => (host.process_listing_succeeds(), None),
            CapabilityCheck::TextFilter => {
                let sample = filter_sample(&self.config.defunct_marker);
                let output = host.filter_output(&sample);
                let passed = output
                    .as_deref()
                    .is_some_and(|out| out.trim() == FILTER_SAMPLE_EXPECTED);
                (passed, output.map(|out| out.trim().to_string()))
            }
            CapabilityCheck::SelfVisible => match (host.own_pid(), host.running_process_ids()) {
                (None, _) => (false, Some("own pid unavailable".to_string())),
                (Some(_), None) => (false, Some("process table unreadable".to_string())),
                (Some(pid), Some(running)) => (running.contains(&pid), Some(format!("pid {}", pid))),
            },
            CapabilityCheck::ProcFilesystem => (host.proc_fs_mounted() || host.is_macos(), None),
        }
    }
}

impl CapabilityProbe for PlatformCapabilityProbe {
    fn is_supported(&self) -> bool {
        self.report().is_supported()
    }
}

/// Crafted process-table lines: one normal row, one defunct row
pub fn filter_sample(defunct_marker: &str) -> String {
    format!(
        " {} s000 Ss 0:00.05 login -pfl theuser /bin/bash -c exec -la bash /bin/bash\n \
         538 s000 Z 0:00.00 [bash] <{}>\n",
        FILTER_SAMPLE_EXPECTED, defunct_marker
    )
}

/// Process-wide capability answer with default settings and the `ps` reader, computed once
pub fn is_supported() -> bool {
    static SUPPORTED: OnceLock<bool> = OnceLock::new();
    *SUPPORTED.get_or_init(|| {
        let config = SupervisorConfig::default();
        let reader = Arc::new(ShellProcessTableReader::from_config(&config));
        PlatformCapabilityProbe::new(config, reader).is_supported()
    })
}
