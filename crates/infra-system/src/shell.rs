// Thin wrappers around `sh -c`
use std::io::{self, Write};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Shell used for every process-table query
pub const SHELL: &str = "sh";

/// Every process of the current user, one per line after a header
pub const PROCESS_LISTING_SCRIPT: &str = "ps x 2>/dev/null";

/// Run `script` through the shell and collect its output
pub fn run_script(script: &str) -> io::Result<Output> {
    let output = Command::new(SHELL)
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    debug!(
        script = %script,
        exit_code = ?output.status.code(),
        stdout_bytes = output.stdout.len(),
        "Shell script finished"
    );

    Ok(output)
}

/// Stdout of `script`, `None` if the shell could not be started
pub fn script_stdout(script: &str) -> Option<String> {
    run_script(script)
        .ok()
        .map(|output| String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Stdout of `script`, `None` unless it ran and exited with status 0
pub fn successful_stdout(script: &str) -> Option<String> {
    run_script(script)
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether `script` runs and exits with status 0
pub fn script_succeeds(script: &str) -> bool {
    run_script(script)
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Feed `input` to `script` on stdin and return its stdout
///
/// A non-zero exit status is an error.
pub fn pipe_through(script: &str, input: &str) -> io::Result<String> {
    let mut child = Command::new(SHELL)
        .arg("-c")
        .arg(script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes())?;
        // stdin dropped here so the filter sees EOF
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("`{}` exited with {}", script, output.status),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// awk program dropping lines that contain `marker` and printing the first column
pub fn defunct_filter_program(marker: &str) -> String {
    format!("! /{}/ {{print $1}}", marker)
}

/// Filter command reading a process listing on stdin
pub fn defunct_filter_script(marker: &str) -> String {
    format!("awk '{}'", defunct_filter_program(marker))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_script_succeeds() {
        assert!(script_succeeds("true"));
        assert!(!script_succeeds("exit 3"));
    }

    #[test]
    fn test_script_stdout() {
        assert_eq!(script_stdout("echo hello").as_deref(), Some("hello\n"));
    }

    #[test]
    fn test_successful_stdout() {
        assert_eq!(successful_stdout("echo ok").as_deref(), Some("ok\n"));
        assert_eq!(successful_stdout("echo partial; exit 1"), None);
        assert_eq!(successful_stdout("command-that-does-not-exist-42"), None);
    }

    #[test]
    fn test_pipe_through() {
        let out = pipe_through("cat", "a\nb\n").unwrap();
        assert_eq!(out, "a\nb\n");
        assert!(pipe_through("cat >/dev/null; exit 2", "a\n").is_err());
    }

    #[test]
    fn test_filter_program() {
        assert_eq!(defunct_filter_program("defunct"), "! /defunct/ {print $1}");
        assert_eq!(
            defunct_filter_script("defunct"),
            "awk '! /defunct/ {print $1}'"
        );
    }
}
