// Helpers shared by unit tests
use std::time::{Duration, Instant};

/// Poll `/proc` until `pid` is an unreaped zombie (state `Z`)
pub(crate) fn wait_until_zombie(pid: u32) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            // State is the first field after the parenthesised command name
            let state = stat.rsplit_once(')').map(|(_, rest)| rest.trim_start());
            if state.is_some_and(|s| s.starts_with('Z')) {
                return true;
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}
