// Domain Layer - Worker identity and lifecycle states

pub mod error;
pub mod process_state;
pub mod worker_id;

// Re-exports
pub use error::DomainError;
pub use process_state::{parse_pid, PidFileSnapshot, ProcessState};
pub use worker_id::WorkerId;
