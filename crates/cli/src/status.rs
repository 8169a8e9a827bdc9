// Read-only status view of tracked workers
use serde::Serialize;
use std::collections::BTreeSet;
use tabled::Tabled;

use pidwatch_core::domain::{PidFileSnapshot, ProcessState, WorkerId};

/// One tracked worker as seen from outside its dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub worker_id: String,
    #[serde(flatten)]
    pub state: ProcessState,
    /// False when the process table could not be consulted
    pub verified: bool,
}

#[derive(Tabled)]
pub struct StatusTableRow {
    #[tabled(rename = "WORKER")]
    worker_id: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "PID")]
    pid: String,
    #[tabled(rename = "VERIFIED")]
    verified: String,
}

impl From<&StatusRow> for StatusTableRow {
    fn from(row: &StatusRow) -> Self {
        let pid = match &row.state {
            ProcessState::Running { pid: Some(pid) } => pid.to_string(),
            _ => "-".to_string(),
        };
        Self {
            worker_id: row.worker_id.clone(),
            state: row.state.name().to_string(),
            pid,
            verified: if row.verified { "yes" } else { "no" }.to_string(),
        }
    }
}

/// Classify a worker without touching its PID file
///
/// `running` is `None` on hosts where the process table cannot be trusted;
/// recorded workers are then reported as running, unverified.
pub fn status_row(
    id: &WorkerId,
    snapshot: &PidFileSnapshot,
    running: Option<&BTreeSet<u32>>,
) -> StatusRow {
    let (state, verified) = match snapshot {
        PidFileSnapshot::Absent => (ProcessState::Finished, true),
        PidFileSnapshot::Empty => (ProcessState::Created, true),
        PidFileSnapshot::Oversize { size_bytes } => (
            ProcessState::Corrupt {
                size_bytes: *size_bytes,
            },
            true,
        ),
        PidFileSnapshot::Recorded { pid, .. } => match running {
            None => (ProcessState::Running { pid: *pid }, false),
            Some(table) => match pid {
                Some(p) if table.contains(p) => (ProcessState::Running { pid: *pid }, true),
                // exited; the dispatcher's next poll removes the file
                _ => (ProcessState::Finished, true),
            },
        },
    };

    StatusRow {
        worker_id: id.to_string(),
        state,
        verified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> WorkerId {
        WorkerId::parse(raw).unwrap()
    }

    fn recorded(pid: u32) -> PidFileSnapshot {
        PidFileSnapshot::Recorded {
            pid: Some(pid),
            raw: pid.to_string(),
        }
    }

    #[test]
    fn test_recorded_pid_checked_against_table() {
        let table = BTreeSet::from([10, 20]);

        let row = status_row(&id("a"), &recorded(10), Some(&table));
        assert_eq!(row.state, ProcessState::Running { pid: Some(10) });
        assert!(row.verified);

        let row = status_row(&id("b"), &recorded(30), Some(&table));
        assert_eq!(row.state, ProcessState::Finished);
    }

    #[test]
    fn test_unsupported_host_reports_unverified_running() {
        let row = status_row(&id("a"), &recorded(30), None);
        assert_eq!(row.state, ProcessState::Running { pid: Some(30) });
        assert!(!row.verified);
    }

    #[test]
    fn test_file_level_states() {
        let table = BTreeSet::new();
        assert_eq!(
            status_row(&id("a"), &PidFileSnapshot::Empty, Some(&table)).state,
            ProcessState::Created
        );
        assert_eq!(
            status_row(&id("a"), &PidFileSnapshot::Oversize { size_bytes: 900 }, None).state,
            ProcessState::Corrupt { size_bytes: 900 }
        );
        assert_eq!(
            status_row(&id("a"), &PidFileSnapshot::Absent, None).state,
            ProcessState::Finished
        );
    }

    #[test]
    fn test_json_shape() {
        let table = BTreeSet::from([42]);
        let row = status_row(&id("job-42"), &recorded(42), Some(&table));
        let value = serde_json::to_value(&row).unwrap();

        assert_eq!(value["worker_id"], "job-42");
        assert_eq!(value["state"], "RUNNING");
        assert_eq!(value["pid"], 42);
        assert_eq!(value["verified"], true);
    }

    #[test]
    fn test_table_row() {
        let row = status_row(&id("job-1"), &PidFileSnapshot::Empty, None);
        let table_row = StatusTableRow::from(&row);
        assert_eq!(table_row.state, "CREATED");
        assert_eq!(table_row.pid, "-");
    }
}
