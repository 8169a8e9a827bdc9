// Platform capability port

/// Whether OS-level process-table inspection is usable on this host
///
/// Implementations should memoize; callers may ask on every poll.
pub trait CapabilityProbe: Send + Sync {
    fn is_supported(&self) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Capability fixed at construction
    pub struct StaticCapability(pub bool);

    impl CapabilityProbe for StaticCapability {
        fn is_supported(&self) -> bool {
            self.0
        }
    }
}
