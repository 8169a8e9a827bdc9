// PID file storage port
//
// One store per worker file. Every operation after construction is soft:
// a worker's file legitimately disappears at the moment it finishes, so
// read/size failures report absence instead of an error.
use crate::domain::WorkerId;
use crate::error::Result;

/// Storage for a single worker's PID file
pub trait PidFileStore: Send + Sync {
    /// Create the file empty if it does not exist; never overwrites
    fn ensure_created(&self) -> Result<()>;

    /// Current content, `None` if the file is missing or unreadable
    fn read(&self) -> Option<String>;

    /// Replace the content (used once, by the worker recording its own pid)
    fn write(&self, content: &str) -> Result<()>;

    /// Current size in bytes, `None` if the file is missing
    fn size_bytes(&self) -> Option<u64>;

    /// Remove the file; a missing file is not an error
    fn delete(&self);

    /// Human readable location (path) for logs
    fn location(&self) -> String;
}

/// Directory-level access to PID files
pub trait PidFileRepository: Send + Sync {
    /// Open the store for one worker
    ///
    /// # Errors
    /// - `AppError::RuntimeDir` if the runtime directory cannot be created
    fn open(&self, id: &WorkerId) -> Result<Box<dyn PidFileStore>>;

    /// Workers that currently have a PID file
    fn list(&self) -> Result<Vec<WorkerId>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    type Files = Arc<Mutex<BTreeMap<String, String>>>;

    /// In-memory repository; stores opened from it share one file map
    #[derive(Clone, Default)]
    pub struct InMemoryPidFileRepository {
        files: Files,
        fail_open: bool,
    }

    impl InMemoryPidFileRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Repository whose runtime directory cannot be created
        pub fn failing() -> Self {
            Self {
                fail_open: true,
                ..Default::default()
            }
        }

        /// Raw file content, bypassing the store
        pub fn content(&self, id: &str) -> Option<String> {
            self.files.lock().unwrap().get(id).cloned()
        }

        /// Overwrite a file behind the handle's back (simulates the worker or another process)
        pub fn put(&self, id: &str, content: &str) {
            self.files
                .lock()
                .unwrap()
                .insert(id.to_string(), content.to_string());
        }

        /// Remove a file behind the handle's back
        pub fn remove(&self, id: &str) {
            self.files.lock().unwrap().remove(id);
        }
    }

    impl PidFileRepository for InMemoryPidFileRepository {
        fn open(&self, id: &WorkerId) -> Result<Box<dyn PidFileStore>> {
            if self.fail_open {
                return Err(crate::error::AppError::RuntimeDir {
                    path: "memory://runtime".into(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        "mock runtime dir",
                    ),
                });
            }
            Ok(Box::new(InMemoryPidFileStore {
                key: id.as_str().to_string(),
                files: self.files.clone(),
            }))
        }

        fn list(&self) -> Result<Vec<WorkerId>> {
            Ok(self
                .files
                .lock()
                .unwrap()
                .keys()
                .filter_map(|k| WorkerId::parse(k.as_str()).ok())
                .collect())
        }
    }

    /// In-memory store for one worker
    pub struct InMemoryPidFileStore {
        key: String,
        files: Files,
    }

    impl PidFileStore for InMemoryPidFileStore {
        fn ensure_created(&self) -> Result<()> {
            self.files
                .lock()
                .unwrap()
                .entry(self.key.clone())
                .or_default();
            Ok(())
        }

        fn read(&self) -> Option<String> {
            self.files.lock().unwrap().get(&self.key).cloned()
        }

        fn write(&self, content: &str) -> Result<()> {
            self.files
                .lock()
                .unwrap()
                .insert(self.key.clone(), content.to_string());
            Ok(())
        }

        fn size_bytes(&self) -> Option<u64> {
            self.read().map(|c| c.len() as u64)
        }

        fn delete(&self) {
            self.files.lock().unwrap().remove(&self.key);
        }

        fn location(&self) -> String {
            format!("memory://{}", self.key)
        }
    }
}
