// Process supervisor (composition of the ports a dispatcher needs)
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::application::constants::MAX_PID_FILE_SIZE_BYTES;
use crate::application::process_handle::read_snapshot;
use crate::application::ProcessHandle;
use crate::domain::{PidFileSnapshot, WorkerId};
use crate::error::Result;
use crate::port::{CapabilityProbe, PidFileRepository, ProcessTableReader, TimeProvider};

/// Entry point for dispatchers
///
/// Holds no per-worker state; every handle it creates owns exactly one PID file.
pub struct ProcessSupervisor {
    repository: Arc<dyn PidFileRepository>,
    process_table: Arc<dyn ProcessTableReader>,
    capability: Arc<dyn CapabilityProbe>,
    time_provider: Arc<dyn TimeProvider>,
    max_pid_file_bytes: u64,
}

impl ProcessSupervisor {
    /// Create a new supervisor
    ///
    /// # Example
    /// ```ignore
    /// let table: Arc<dyn ProcessTableReader> = Arc::new(ShellProcessTableReader::default());
    /// let supervisor = ProcessSupervisor::new(
    ///     Arc::new(FsPidFileRepository::new("/var/run/reports")),
    ///     table.clone(),
    ///     Arc::new(PlatformCapabilityProbe::new(config, table)),
    ///     Arc::new(SystemTimeProvider),
    /// );
    /// let handle = supervisor.create_handle("job-42")?;
    /// ```
    pub fn new(
        repository: Arc<dyn PidFileRepository>,
        process_table: Arc<dyn ProcessTableReader>,
        capability: Arc<dyn CapabilityProbe>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            repository,
            process_table,
            capability,
            time_provider,
            max_pid_file_bytes: MAX_PID_FILE_SIZE_BYTES,
        }
    }

    /// Override the corruption threshold (default: 500 bytes)
    pub fn with_max_pid_file_bytes(mut self, max_pid_file_bytes: u64) -> Self {
        self.max_pid_file_bytes = max_pid_file_bytes;
        self
    }

    /// Whether liveness checks can consult the process table on this host
    ///
    /// Dispatchers use this to fall back to running work synchronously.
    pub fn is_supported(&self) -> bool {
        self.capability.is_supported()
    }

    /// Validate `raw_id` and create a handle in the CREATED state
    ///
    /// # Errors
    /// - `AppError::Domain` for an invalid worker id
    /// - `AppError::RuntimeDir` if the runtime directory cannot be created
    /// - `AppError::Io` if the PID file cannot be created
    pub fn create_handle(&self, raw_id: &str) -> Result<ProcessHandle> {
        let id = WorkerId::parse(raw_id)?;
        self.handle_for(id)
    }

    /// Create a handle for an already validated id
    pub fn handle_for(&self, id: WorkerId) -> Result<ProcessHandle> {
        let store = self.repository.open(&id)?;
        ProcessHandle::new(
            id,
            store,
            self.process_table.clone(),
            self.time_provider.clone(),
            self.capability.is_supported(),
            self.max_pid_file_bytes,
        )
    }

    /// Read a worker's PID file without creating or deleting anything
    pub fn inspect(&self, id: &WorkerId) -> Result<PidFileSnapshot> {
        let store = self.repository.open(id)?;
        let snapshot = read_snapshot(store.as_ref(), self.max_pid_file_bytes);

        debug!(worker_id = %id, snapshot = ?snapshot, "Inspected PID file");
        Ok(snapshot)
    }

    /// Workers that currently have a PID file
    pub fn tracked_workers(&self) -> Result<Vec<WorkerId>> {
        self.repository.list()
    }

    /// Running process ids, `None` when the platform cannot be inspected
    /// or the process table could not be read
    pub fn running_process_ids(&self) -> Option<BTreeSet<u32>> {
        if !self.capability.is_supported() {
            return None;
        }
        self.process_table.list_running_process_ids()
    }
}
