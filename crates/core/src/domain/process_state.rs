// Worker lifecycle states
//
// Two layers: PidFileSnapshot is what the PID file currently encodes,
// ProcessState is the lifecycle state a handle reports.
use serde::{Deserialize, Serialize};

/// Decoded view of one PID file at a single point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidFileSnapshot {
    /// No file: the worker finished (or was already reaped)
    Absent,
    /// File exists with no content: created, not started
    Empty,
    /// File holds content; `pid` is set when the content is a positive decimal integer
    Recorded { pid: Option<u32>, raw: String },
    /// File size is at or above the safety threshold
    Oversize { size_bytes: u64 },
}

impl PidFileSnapshot {
    /// Classify raw store output
    ///
    /// # Arguments
    /// * `content` - File content, `None` if the file could not be read
    /// * `size_bytes` - File size, `None` if unknown
    /// * `max_bytes` - Sizes at or above this are treated as corruption
    pub fn classify(content: Option<&str>, size_bytes: Option<u64>, max_bytes: u64) -> Self {
        let Some(content) = content else {
            return PidFileSnapshot::Absent;
        };

        let size_bytes = size_bytes.unwrap_or(content.len() as u64);
        if size_bytes >= max_bytes {
            return PidFileSnapshot::Oversize { size_bytes };
        }

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return PidFileSnapshot::Empty;
        }

        PidFileSnapshot::Recorded {
            pid: parse_pid(trimmed),
            raw: trimmed.to_string(),
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, PidFileSnapshot::Absent)
    }

    /// Whether this content proves the worker started at some point
    ///
    /// Only an empty file says "not yet". A missing file also counts as started:
    /// workers only disappear after starting.
    pub fn implies_started(&self) -> bool {
        !matches!(self, PidFileSnapshot::Empty)
    }

    pub fn pid(&self) -> Option<u32> {
        match self {
            PidFileSnapshot::Recorded { pid, .. } => *pid,
            _ => None,
        }
    }
}

/// Parse a recorded process id; zero, negative and non-numeric values are rejected
pub fn parse_pid(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|pid| *pid > 0)
}

/// Lifecycle state reported by a process handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "state")]
pub enum ProcessState {
    /// PID file exists and is empty
    Created,
    /// A pid was recorded and liveness could not be disproved
    Running { pid: Option<u32> },
    /// PID file is gone
    Finished,
    /// PID file was oversize; the handle removed it
    Corrupt { size_bytes: u64 },
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Finished | ProcessState::Corrupt { .. })
    }

    /// Whether `next` is reachable from `self`
    ///
    /// CREATED -> RUNNING -> FINISHED. Any live state may jump straight to a terminal
    /// one, CORRUPT settles into FINISHED once its file is gone, and FINISHED never leaves.
    pub fn can_transition_to(&self, next: &ProcessState) -> bool {
        match (self, next) {
            (ProcessState::Corrupt { .. }, ProcessState::Finished) => true,
            (current, _) if current.is_terminal() => current == next,
            (_, next) if next.is_terminal() => true,
            (ProcessState::Created, _) => true,
            (ProcessState::Running { .. }, ProcessState::Running { .. }) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProcessState::Created => "CREATED",
            ProcessState::Running { .. } => "RUNNING",
            ProcessState::Finished => "FINISHED",
            ProcessState::Corrupt { .. } => "CORRUPT",
        }
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = 500;

    #[test]
    fn test_implies_started() {
        assert!(PidFileSnapshot::Absent.implies_started());
        assert!(!PidFileSnapshot::Empty.implies_started());
        assert!(PidFileSnapshot::Oversize { size_bytes: 501 }.implies_started());
    }

    #[test]
    fn test_classify_absent() {
        assert_eq!(
            PidFileSnapshot::classify(None, None, MAX),
            PidFileSnapshot::Absent
        );
        assert_eq!(
            PidFileSnapshot::classify(None, Some(4), MAX),
            PidFileSnapshot::Absent
        );
    }

    #[test]
    fn test_classify_empty_and_whitespace() {
        assert_eq!(
            PidFileSnapshot::classify(Some(""), Some(0), MAX),
            PidFileSnapshot::Empty
        );
        assert_eq!(
            PidFileSnapshot::classify(Some(" \n"), Some(2), MAX),
            PidFileSnapshot::Empty
        );
    }

    #[test]
    fn test_classify_recorded_pid() {
        let snapshot = PidFileSnapshot::classify(Some("9999\n"), Some(5), MAX);
        assert_eq!(
            snapshot,
            PidFileSnapshot::Recorded {
                pid: Some(9999),
                raw: "9999".to_string()
            }
        );
        assert_eq!(snapshot.pid(), Some(9999));
        assert!(snapshot.implies_started());
    }

    #[test]
    fn test_classify_unparsable_content_still_counts_as_started() {
        for raw in ["abc", "-5", "0", "12ab"] {
            let snapshot = PidFileSnapshot::classify(Some(raw), None, MAX);
            assert_eq!(snapshot.pid(), None, "{:?}", raw);
            assert!(snapshot.implies_started());
        }
    }

    #[test]
    fn test_classify_oversize_at_threshold() {
        let content = "1".repeat(500);
        assert_eq!(
            PidFileSnapshot::classify(Some(&content), Some(500), MAX),
            PidFileSnapshot::Oversize { size_bytes: 500 }
        );

        let content = "1".repeat(499);
        assert!(matches!(
            PidFileSnapshot::classify(Some(&content), Some(499), MAX),
            PidFileSnapshot::Recorded { .. }
        ));
    }

    #[test]
    fn test_classify_uses_content_length_when_size_unknown() {
        let content = "7".repeat(600);
        assert_eq!(
            PidFileSnapshot::classify(Some(&content), None, MAX),
            PidFileSnapshot::Oversize { size_bytes: 600 }
        );
    }

    #[test]
    fn test_transitions() {
        let running = ProcessState::Running { pid: Some(1) };
        let corrupt = ProcessState::Corrupt { size_bytes: 900 };

        assert!(ProcessState::Created.can_transition_to(&running));
        assert!(ProcessState::Created.can_transition_to(&ProcessState::Finished));
        assert!(running.can_transition_to(&ProcessState::Finished));
        assert!(running.can_transition_to(&corrupt));
        assert!(!running.can_transition_to(&ProcessState::Created));
        assert!(!ProcessState::Finished.can_transition_to(&running));
        assert!(!ProcessState::Finished.can_transition_to(&ProcessState::Created));
        assert!(ProcessState::Finished.can_transition_to(&ProcessState::Finished));
        assert!(corrupt.can_transition_to(&ProcessState::Finished));
        assert!(!corrupt.can_transition_to(&running));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&ProcessState::Running { pid: Some(42) }).unwrap();
        assert_eq!(json, r#"{"state":"RUNNING","pid":42}"#);
        assert_eq!(ProcessState::Finished.to_string(), "FINISHED");
    }
}
