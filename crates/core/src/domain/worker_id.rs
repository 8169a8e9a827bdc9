// Worker identity
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{DomainError, Result};
use crate::application::constants::{MAX_WORKER_ID_LEN, PID_FILE_EXTENSION};

/// Filename-safe identifier of one supervised worker.
///
/// Must start with an ASCII letter or digit and may otherwise only contain
/// ASCII letters, digits, `_`, `.` and `-`. This rules out path separators,
/// control characters, `.` and `..`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkerId(String);

impl WorkerId {
    /// Validate and wrap a raw worker id
    ///
    /// # Example
    /// ```text
    /// let id = WorkerId::parse("job-42")?;
    /// assert_eq!(id.pid_file_name(), "job-42.pid");
    /// ```
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        validate(&raw)?;
        Ok(Self(raw))
    }

    /// Wrap an id produced by a generator that only emits valid ids
    pub(crate) fn new_unchecked(raw: String) -> Self {
        debug_assert!(validate(&raw).is_ok(), "invalid generated worker id {:?}", raw);
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the PID file backing this worker (`<id>.pid`)
    pub fn pid_file_name(&self) -> String {
        format!("{}.{}", self.0, PID_FILE_EXTENSION)
    }

    /// Inverse of [`WorkerId::pid_file_name`]; `None` for anything that is not a valid PID file name
    pub fn from_pid_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(PID_FILE_EXTENSION)?.strip_suffix('.')?;
        Self::parse(stem).ok()
    }
}

fn validate(raw: &str) -> Result<()> {
    let invalid = |reason: &str| DomainError::InvalidWorkerId {
        id: raw.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = raw.chars();
    let first = chars.next().ok_or_else(|| invalid("must not be empty"))?;

    if raw.len() > MAX_WORKER_ID_LEN {
        return Err(invalid("too long"));
    }

    if !first.is_ascii_alphanumeric() {
        return Err(invalid("must start with an ASCII letter or digit"));
    }

    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))) {
        return Err(invalid(&format!("contains disallowed character {:?}", bad)));
    }

    Ok(())
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WorkerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WorkerId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<WorkerId> for String {
    fn from(id: WorkerId) -> Self {
        id.0
    }
}
