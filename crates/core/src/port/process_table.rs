// Process table port
//
// Shelling out to `ps` is one implementation; native enumeration is another.
// The state machine only sees this trait.
use std::collections::BTreeSet;

/// Source of the set of currently running process ids
pub trait ProcessTableReader: Send + Sync {
    /// Ids of running processes, excluding defunct (zombie) entries
    ///
    /// `None` when the table could not be read; callers must then treat
    /// liveness as unknown, never as "nothing is running".
    /// Only meaningful when the capability probe reports support.
    fn list_running_process_ids(&self) -> Option<BTreeSet<u32>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Process table with a fixed, mutable set of pids
    #[derive(Clone, Default)]
    pub struct MockProcessTable {
        pids: Arc<Mutex<BTreeSet<u32>>>,
        call_count: Arc<AtomicUsize>,
        unavailable: Arc<AtomicBool>,
    }

    impl MockProcessTable {
        pub fn new(pids: impl IntoIterator<Item = u32>) -> Self {
            Self {
                pids: Arc::new(Mutex::new(pids.into_iter().collect())),
                call_count: Arc::new(AtomicUsize::new(0)),
                unavailable: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn insert(&self, pid: u32) {
            self.pids.lock().unwrap().insert(pid);
        }

        pub fn remove(&self, pid: u32) {
            self.pids.lock().unwrap().remove(&pid);
        }

        /// Make every following query fail, as when `ps` cannot be spawned
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    impl ProcessTableReader for MockProcessTable {
        fn list_running_process_ids(&self) -> Option<BTreeSet<u32>> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.unavailable.load(Ordering::SeqCst) {
                return None;
            }
            Some(self.pids.lock().unwrap().clone())
        }
    }
}
