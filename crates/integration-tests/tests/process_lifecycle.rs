//! Worker lifecycle against a real runtime directory and the real process table
//!
//! Assertions that need a trustworthy process table are skipped when the host
//! probe reports the platform as unsupported.

use pidwatch_core::application::ProcessSupervisor;
use pidwatch_core::config::SupervisorConfig;
use pidwatch_core::domain::ProcessState;
use pidwatch_core::port::time_provider::SystemTimeProvider;
use pidwatch_core::port::ProcessTableReader;
use pidwatch_infra_system::{
    is_supported, FsPidFileRepository, NativeProcessTableReader, PlatformCapabilityProbe,
    ShellProcessTableReader,
};
use std::path::Path;
use std::sync::Arc;

fn supervisor_with(dir: &Path, table: Arc<dyn ProcessTableReader>) -> ProcessSupervisor {
    ProcessSupervisor::new(
        Arc::new(FsPidFileRepository::new(dir)),
        table.clone(),
        Arc::new(PlatformCapabilityProbe::new(SupervisorConfig::default(), table)),
        Arc::new(SystemTimeProvider),
    )
}

fn supervisor(dir: &Path) -> ProcessSupervisor {
    supervisor_with(dir, Arc::new(ShellProcessTableReader::default()))
}

/// A pid that is not currently in the process table
fn free_pid(table: &dyn ProcessTableReader) -> u32 {
    let running = table.list_running_process_ids().unwrap();
    std::iter::once(9999)
        .chain(90_000..)
        .find(|pid| !running.contains(pid))
        .unwrap()
}

macro_rules! require_supported {
    () => {
        if !is_supported() {
            eprintln!("process table inspection unsupported on this host, skipping");
            return;
        }
    };
}

#[test]
fn test_dead_worker_is_detected_and_cleaned_up() {
    require_supported!();
    let tmp = tempfile::tempdir().unwrap();
    let supervisor = supervisor(tmp.path());

    let handle = supervisor.create_handle("job-42").unwrap();
    let pid_file = tmp.path().join("job-42.pid");
    assert!(pid_file.exists());
    assert_eq!(std::fs::read_to_string(&pid_file).unwrap(), "");
    assert!(!handle.has_started());
    assert!(!handle.is_running());
    assert!(!handle.has_finished());

    // Worker side records a pid that is not alive
    let pid = free_pid(&ShellProcessTableReader::default());
    handle.start_with_pid(pid).unwrap();
    assert!(handle.has_started());

    assert!(!handle.is_running());
    assert!(!pid_file.exists());
    assert!(handle.has_finished());
    assert_eq!(handle.state(), ProcessState::Finished);
}

#[test]
fn test_own_process_is_running() {
    require_supported!();
    let tmp = tempfile::tempdir().unwrap();
    let handle = supervisor(tmp.path()).create_handle("self").unwrap();

    handle.start().unwrap();

    assert!(handle.has_started());
    assert!(handle.is_running());
    assert_eq!(
        handle.state(),
        ProcessState::Running {
            pid: Some(std::process::id())
        }
    );
    assert!(!handle.has_finished());

    handle.finish();
    assert!(!tmp.path().join("self.pid").exists());
    assert!(!handle.is_running());
}

#[cfg(unix)]
#[test]
fn test_child_process_lifecycle() {
    require_supported!();
    let tmp = tempfile::tempdir().unwrap();
    let supervisor = supervisor(tmp.path());
    let handle = supervisor.create_handle("child").unwrap();

    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    handle.start_with_pid(child.id()).unwrap();
    assert!(handle.is_running());

    child.kill().unwrap();
    child.wait().unwrap();

    assert!(!handle.is_running());
    assert!(handle.has_finished());
    assert!(!tmp.path().join("child.pid").exists());
}

#[test]
fn test_native_reader_agrees_on_liveness() {
    require_supported!();
    let tmp = tempfile::tempdir().unwrap();
    let native: Arc<dyn ProcessTableReader> = Arc::new(NativeProcessTableReader::new());
    let supervisor = supervisor_with(tmp.path(), native.clone());

    let alive = supervisor.create_handle("alive").unwrap();
    alive.start().unwrap();
    assert!(alive.is_running());

    let dead = supervisor.create_handle("dead").unwrap();
    dead.start_with_pid(free_pid(native.as_ref())).unwrap();
    assert!(!dead.is_running());
    assert!(dead.has_finished());
}

#[test]
fn test_oversize_pid_file_is_treated_as_finished() {
    let tmp = tempfile::tempdir().unwrap();
    let handle = supervisor(tmp.path()).create_handle("big").unwrap();
    let pid_file = tmp.path().join("big.pid");

    std::fs::write(&pid_file, "1".repeat(600)).unwrap();

    assert!(!handle.is_running());
    assert!(!pid_file.exists());
    assert!(handle.has_finished());
}

#[test]
fn test_finish_is_idempotent_and_id_can_be_reused() {
    let tmp = tempfile::tempdir().unwrap();
    let supervisor = supervisor(tmp.path());
    let handle = supervisor.create_handle("job-1").unwrap();

    handle.finish();
    handle.finish();
    assert!(handle.has_finished());
    assert!(!tmp.path().join("job-1.pid").exists());

    // A later handle for the same id starts over
    let again = supervisor.create_handle("job-1").unwrap();
    assert_eq!(again.state(), ProcessState::Created);
    assert!(!again.has_finished());
}

#[test]
fn test_tracked_workers_and_inspect_are_read_only() {
    let tmp = tempfile::tempdir().unwrap();
    let supervisor = supervisor(tmp.path());
    assert!(supervisor.tracked_workers().unwrap().is_empty());

    let a = supervisor.create_handle("a").unwrap();
    let _b = supervisor.create_handle("b").unwrap();
    a.start_with_pid(4242).unwrap();

    let tracked: Vec<String> = supervisor
        .tracked_workers()
        .unwrap()
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(tracked, vec!["a".to_string(), "b".to_string()]);

    let snapshot = supervisor.inspect(a.id()).unwrap();
    assert_eq!(snapshot.pid(), Some(4242));
    assert!(tmp.path().join("a.pid").exists());
}

#[test]
fn test_handle_is_shared_across_threads() {
    require_supported!();
    let tmp = tempfile::tempdir().unwrap();
    let handle = Arc::new(supervisor(tmp.path()).create_handle("shared").unwrap());
    handle.start().unwrap();

    let pollers: Vec<_> = (0..4)
        .map(|_| {
            let handle = handle.clone();
            std::thread::spawn(move || handle.is_running())
        })
        .collect();

    for poller in pollers {
        assert!(poller.join().unwrap());
    }
}
