// Per-worker lifecycle state machine
//
// The PID file is the only channel between supervisor and worker:
// - file exists, empty: worker created, not started
// - file exists, holds a pid: worker started (running until the pid disappears)
// - file missing: worker finished
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{DomainError, PidFileSnapshot, ProcessState, WorkerId};
use crate::error::Result;
use crate::port::{PidFileStore, ProcessTableReader, TimeProvider};

/// Handle on one supervised worker
///
/// Cached `started` / `finished` flags only ever go from false to true, so
/// `has_started` and `has_finished` stay true once observed even after the
/// PID file has been removed by another caller.
pub struct ProcessHandle {
    id: WorkerId,
    store: Box<dyn PidFileStore>,
    process_table: Arc<dyn ProcessTableReader>,
    time_provider: Arc<dyn TimeProvider>,
    supported: bool,
    max_pid_file_bytes: u64,
    created_at_millis: i64,
    started: AtomicBool,
    finished: AtomicBool,
}

impl ProcessHandle {
    /// Create a handle and put its PID file into the CREATED state
    ///
    /// An existing file is left untouched, so a worker constructing its own
    /// handle does not wipe a pid recorded earlier.
    ///
    /// # Arguments
    /// * `id` - Worker id (already validated)
    /// * `store` - PID file store for this worker
    /// * `process_table` - Running process source, consulted only when `supported`
    /// * `time_provider` - Clock for `seconds_since_creation`
    /// * `supported` - Result of the platform capability probe
    /// * `max_pid_file_bytes` - Corruption threshold
    ///
    /// # Errors
    /// - `AppError::Io` if the empty PID file cannot be created
    pub fn new(
        id: WorkerId,
        store: Box<dyn PidFileStore>,
        process_table: Arc<dyn ProcessTableReader>,
        time_provider: Arc<dyn TimeProvider>,
        supported: bool,
        max_pid_file_bytes: u64,
    ) -> Result<Self> {
        store.ensure_created()?;

        let created_at_millis = time_provider.now_millis();

        debug!(
            worker_id = %id,
            pid_file = %store.location(),
            supported = %supported,
            "Process handle created"
        );

        Ok(Self {
            id,
            store,
            process_table,
            time_provider,
            supported,
            max_pid_file_bytes,
            created_at_millis,
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn pid_file_location(&self) -> String {
        self.store.location()
    }

    /// Whether liveness is checked against the process table (false = conservative mode)
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Record the calling process as this worker (CREATED -> RUNNING)
    ///
    /// Meant to be called from inside the spawned worker itself.
    pub fn start(&self) -> Result<()> {
        self.start_with_pid(std::process::id())
    }

    /// Record `pid` as this worker's process id
    ///
    /// Overwrites whatever the file holds. Fails once the handle has seen the
    /// worker finish, since that would recreate a deleted PID file.
    ///
    /// # Errors
    /// - `DomainError::InvalidStateTransition` if the handle already finished
    /// - `AppError::Io` if the pid cannot be written
    pub fn start_with_pid(&self, pid: u32) -> Result<()> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(DomainError::InvalidStateTransition {
                from: ProcessState::Finished.to_string(),
                to: ProcessState::Running { pid: Some(pid) }.to_string(),
            }
            .into());
        }

        self.store.write(&pid.to_string())?;
        self.started.store(true, Ordering::SeqCst);

        info!(worker_id = %self.id, pid = %pid, "Worker started");
        Ok(())
    }

    /// Whether the worker has ever been seen as started
    pub fn has_started(&self) -> bool {
        if self.started.load(Ordering::SeqCst) {
            return true;
        }
        self.observe_started(&self.snapshot())
    }

    /// Whether the worker is still running
    ///
    /// Never declares a live worker dead: on unsupported platforms, or when
    /// the process table cannot be read, any existing sane PID file counts as
    /// running. A started worker whose pid is gone from the process table is
    /// finished here and its file removed.
    pub fn is_running(&self) -> bool {
        let snapshot = self.snapshot();
        self.evaluate_liveness(&snapshot)
    }

    /// Whether the worker has finished
    pub fn has_finished(&self) -> bool {
        if self.finished.load(Ordering::SeqCst) {
            return true;
        }

        if self.store.read().is_none() {
            self.finished.store(true, Ordering::SeqCst);
            return true;
        }

        false
    }

    /// Mark the worker finished and remove its PID file (idempotent)
    pub fn finish(&self) {
        let already = self.finished.swap(true, Ordering::SeqCst);
        self.store.delete();

        if !already {
            info!(worker_id = %self.id, "Worker finished");
        }
    }

    /// Lifecycle state as an explicit enum
    ///
    /// Runs the same checks as `is_running`, including cleanup of dead or
    /// corrupt PID files.
    pub fn state(&self) -> ProcessState {
        if self.finished.load(Ordering::SeqCst) {
            return ProcessState::Finished;
        }

        let snapshot = self.snapshot();
        match &snapshot {
            PidFileSnapshot::Absent => {
                self.finished.store(true, Ordering::SeqCst);
                ProcessState::Finished
            }
            PidFileSnapshot::Oversize { size_bytes } => {
                self.evaluate_liveness(&snapshot);
                ProcessState::Corrupt {
                    size_bytes: *size_bytes,
                }
            }
            // Emptied after a start was seen: same cleanup as is_running
            PidFileSnapshot::Empty if self.started.load(Ordering::SeqCst) => {
                if self.evaluate_liveness(&snapshot) {
                    ProcessState::Running { pid: None }
                } else {
                    ProcessState::Finished
                }
            }
            PidFileSnapshot::Empty => ProcessState::Created,
            PidFileSnapshot::Recorded { pid, .. } => {
                if self.evaluate_liveness(&snapshot) {
                    ProcessState::Running { pid: *pid }
                } else {
                    ProcessState::Finished
                }
            }
        }
    }

    /// Pid currently recorded in the PID file, if any
    pub fn recorded_pid(&self) -> Option<u32> {
        self.snapshot().pid()
    }

    /// Wall-clock age of this handle
    pub fn seconds_since_creation(&self) -> i64 {
        (self.time_provider.now_millis() - self.created_at_millis) / 1000
    }

    fn snapshot(&self) -> PidFileSnapshot {
        read_snapshot(self.store.as_ref(), self.max_pid_file_bytes)
    }

    fn observe_started(&self, snapshot: &PidFileSnapshot) -> bool {
        if self.started.load(Ordering::SeqCst) {
            return true;
        }

        let started = snapshot.implies_started();
        if started {
            self.started.store(true, Ordering::SeqCst);
        }
        started
    }

    fn evaluate_liveness(&self, snapshot: &PidFileSnapshot) -> bool {
        match snapshot {
            PidFileSnapshot::Absent => false,
            PidFileSnapshot::Oversize { size_bytes } => {
                warn!(
                    worker_id = %self.id,
                    size_bytes = %size_bytes,
                    max_bytes = %self.max_pid_file_bytes,
                    "PID file oversize, treating worker as finished"
                );
                self.finish();
                false
            }
            _ if !self.supported => true,
            _ => {
                if let Some(pid) = snapshot.pid() {
                    match self.process_table.list_running_process_ids() {
                        Some(running) if running.contains(&pid) => return true,
                        Some(_) => {}
                        None => {
                            warn!(
                                worker_id = %self.id,
                                pid = %pid,
                                "Process table unreadable, assuming worker still running"
                            );
                            return true;
                        }
                    }
                }

                // Empty file: the worker has not recorded its pid yet
                if self.observe_started(snapshot) {
                    debug!(
                        worker_id = %self.id,
                        pid = ?snapshot.pid(),
                        "Recorded pid not in process table"
                    );
                    self.finish();
                }
                false
            }
        }
    }
}

/// Point-in-time view of a PID file
pub(crate) fn read_snapshot(store: &dyn PidFileStore, max_pid_file_bytes: u64) -> PidFileSnapshot {
    // Size first so a corrupt file is never read in full
    if let Some(size_bytes) = store.size_bytes() {
        if size_bytes >= max_pid_file_bytes {
            return PidFileSnapshot::Oversize { size_bytes };
        }
    }

    let content = store.read();
    PidFileSnapshot::classify(content.as_deref(), None, max_pid_file_bytes)
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.id)
            .field("pid_file", &self.store.location())
            .field("supported", &self.supported)
            .field("created_at_millis", &self.created_at_millis)
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("finished", &self.finished.load(Ordering::SeqCst))
            .finish()
    }
}
