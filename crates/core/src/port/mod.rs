// Port Layer - Interfaces for external dependencies

pub mod capability;
pub mod id_provider; // For deterministic testing
pub mod pid_file_store;
pub mod process_table;
pub mod time_provider;

// Re-exports
pub use capability::CapabilityProbe;
pub use id_provider::IdProvider;
pub use pid_file_store::{PidFileRepository, PidFileStore};
pub use process_table::ProcessTableReader;
pub use time_provider::TimeProvider;
