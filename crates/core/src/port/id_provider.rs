// ID Provider Port (for deterministic testing)

use crate::domain::WorkerId;

/// Worker id provider interface (allows deterministic ids in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new unique worker id
    fn generate_id(&self) -> WorkerId;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> WorkerId {
        // Hyphenated UUIDs only contain hex digits and '-'
        WorkerId::new_unchecked(uuid::Uuid::new_v4().to_string())
    }
}
