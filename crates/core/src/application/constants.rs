// Supervisor constants (no magic values)

/// PID files at or above this size are treated as corrupt (bytes)
pub const MAX_PID_FILE_SIZE_BYTES: u64 = 500;

/// Process-table rows containing this token are zombies and never count as running
pub const DEFAULT_DEFUNCT_MARKER: &str = "defunct";

/// OS identification substring of hosts where process inspection is known to misbehave
pub const DEFAULT_UNSUPPORTED_SYSTEM_MARKER: &str = "synology";

/// Extension of per-worker PID files (`<worker-id>.pid`)
pub const PID_FILE_EXTENSION: &str = "pid";

/// Longest accepted worker id (bytes), leaves room for the extension under NAME_MAX
pub const MAX_WORKER_ID_LEN: usize = 200;

/// Default runtime directory; `~` is expanded by the composition root
pub const DEFAULT_RUNTIME_DIR: &str = "~/.pidwatch/run";

/// Primitive names accepted in `SupervisorConfig::disabled_primitives`
pub const PRIMITIVE_SHELL_EXEC: &str = "shell_exec";
pub const PRIMITIVE_GETPID: &str = "getpid";
