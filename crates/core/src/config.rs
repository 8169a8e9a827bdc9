// Supervisor configuration
use std::path::PathBuf;

use crate::application::constants::{
    DEFAULT_DEFUNCT_MARKER, DEFAULT_RUNTIME_DIR, DEFAULT_UNSUPPORTED_SYSTEM_MARKER,
    MAX_PID_FILE_SIZE_BYTES, PRIMITIVE_GETPID, PRIMITIVE_SHELL_EXEC,
};
use crate::error::{AppError, Result};

/// Settings shared by the supervisor and its adapters
///
/// Built by the composition root (CLI flags / env). Nothing here is read from
/// process-wide state; the forced-synchronous flag in particular travels with
/// the config value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Directory holding one `<worker-id>.pid` file per worker
    pub runtime_dir: PathBuf,
    /// PID files at or above this size are treated as corrupt
    pub max_pid_file_bytes: u64,
    /// Process-table lines containing this token are ignored
    pub defunct_marker: String,
    /// Hosts whose OS identification contains this token are unsupported
    pub unsupported_system_marker: String,
    /// Forces capability probing to report "unsupported"
    pub force_sync_mode: bool,
    /// Primitives disabled by the operator (`shell_exec`, `getpid`)
    pub disabled_primitives: Vec<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from(DEFAULT_RUNTIME_DIR),
            max_pid_file_bytes: MAX_PID_FILE_SIZE_BYTES,
            defunct_marker: DEFAULT_DEFUNCT_MARKER.to_string(),
            unsupported_system_marker: DEFAULT_UNSUPPORTED_SYSTEM_MARKER.to_string(),
            force_sync_mode: false,
            disabled_primitives: Vec::new(),
        }
    }
}

impl SupervisorConfig {
    pub fn with_runtime_dir(runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
            ..Default::default()
        }
    }

    /// Parse a comma separated primitive list (`"shell_exec, getpid"`)
    pub fn parse_disabled_primitives(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_primitive_disabled(&self, primitive: &str) -> bool {
        self.disabled_primitives.iter().any(|p| p == primitive)
    }

    /// Reject values the adapters cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.runtime_dir.as_os_str().is_empty() {
            return Err(AppError::Config("runtime_dir must not be empty".to_string()));
        }

        if self.max_pid_file_bytes == 0 {
            return Err(AppError::Config(
                "max_pid_file_bytes must be greater than zero".to_string(),
            ));
        }

        // The marker ends up inside an awk regex literal
        let marker_ok = !self.defunct_marker.is_empty()
            && self
                .defunct_marker
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !marker_ok {
            return Err(AppError::Config(format!(
                "defunct_marker {:?} must be a non-empty alphanumeric token",
                self.defunct_marker
            )));
        }

        for primitive in &self.disabled_primitives {
            if primitive != PRIMITIVE_SHELL_EXEC && primitive != PRIMITIVE_GETPID {
                return Err(AppError::Config(format!(
                    "unknown primitive {:?} (expected {} or {})",
                    primitive, PRIMITIVE_SHELL_EXEC, PRIMITIVE_GETPID
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.max_pid_file_bytes, 500);
        assert_eq!(config.defunct_marker, "defunct");
        assert!(!config.force_sync_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_disabled_primitives() {
        let list = SupervisorConfig::parse_disabled_primitives(" shell_exec, ,getpid ");
        assert_eq!(list, vec!["shell_exec".to_string(), "getpid".to_string()]);

        let config = SupervisorConfig {
            disabled_primitives: list,
            ..Default::default()
        };
        assert!(config.is_primitive_disabled("getpid"));
        assert!(!config.is_primitive_disabled("exec"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = SupervisorConfig {
            max_pid_file_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SupervisorConfig {
            defunct_marker: "de'funct".to_string(),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("defunct_marker"));

        let config = SupervisorConfig {
            disabled_primitives: vec!["exec".to_string()],
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("unknown primitive"));

        let config = SupervisorConfig::with_runtime_dir("");
        assert!(config.validate().is_err());
    }
}
