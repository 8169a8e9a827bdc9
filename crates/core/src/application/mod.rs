// Application Layer - Worker lifecycle supervision

pub mod constants;
pub mod process_handle;
pub mod supervisor;

// Re-exports
pub use process_handle::ProcessHandle;
pub use supervisor::ProcessSupervisor;
