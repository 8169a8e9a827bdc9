// pidwatch Infrastructure - System Adapters
// Implements: PidFileRepository, ProcessTableReader, CapabilityProbe

pub mod capability;
pub mod fs_store;
pub mod native_reader;
pub mod shell;
pub mod shell_reader;

#[cfg(all(test, target_os = "linux"))]
mod test_support;

pub use capability::{is_supported, CapabilityCheck, CapabilityReport, PlatformCapabilityProbe};
pub use fs_store::{FsPidFileRepository, FsPidFileStore};
pub use native_reader::NativeProcessTableReader;
pub use shell_reader::ShellProcessTableReader;
