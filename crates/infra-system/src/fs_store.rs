// Filesystem PID file store
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use pidwatch_core::domain::WorkerId;
use pidwatch_core::error::{AppError, Result};
use pidwatch_core::port::{PidFileRepository, PidFileStore};

/// Runtime directory holding one `<worker-id>.pid` file per worker
#[derive(Debug, Clone)]
pub struct FsPidFileRepository {
    runtime_dir: PathBuf,
}

impl FsPidFileRepository {
    /// # Example
    /// ```ignore
    /// let repo = FsPidFileRepository::new("/var/run/pidwatch");
    /// let store = repo.open(&WorkerId::parse("job-42")?)?;
    /// ```
    pub fn new(runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
        }
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    pub fn pid_file_path(&self, id: &WorkerId) -> PathBuf {
        self.runtime_dir.join(id.pid_file_name())
    }

    fn ensure_runtime_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.runtime_dir).map_err(|source| AppError::RuntimeDir {
            path: self.runtime_dir.clone(),
            source,
        })
    }
}

impl PidFileRepository for FsPidFileRepository {
    fn open(&self, id: &WorkerId) -> Result<Box<dyn PidFileStore>> {
        self.ensure_runtime_dir()?;
        Ok(Box::new(FsPidFileStore::new(self.pid_file_path(id))))
    }

    fn list(&self) -> Result<Vec<WorkerId>> {
        let entries = match fs::read_dir(&self.runtime_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids: Vec<WorkerId> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(WorkerId::from_pid_file_name)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// One worker's PID file
#[derive(Debug, Clone)]
pub struct FsPidFileStore {
    path: PathBuf,
}

impl FsPidFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

impl PidFileStore for FsPidFileStore {
    fn ensure_created(&self) -> Result<()> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => {
                debug!(path = %self.path.display(), "PID file created");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read(&self) -> Option<String> {
        match fs::read(&self.path) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "PID file unreadable");
                None
            }
        }
    }

    fn write(&self, content: &str) -> Result<()> {
        // Write aside and rename so readers never see a half-written pid
        let temp = self.temp_path();
        let result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&temp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp, &self.path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!(path = %self.path.display(), bytes = content.len(), "PID file written");
        Ok(())
    }

    fn size_bytes(&self) -> Option<u64> {
        fs::metadata(&self.path).ok().map(|meta| meta.len())
    }

    fn delete(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "PID file removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "PID file removal failed"),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
