//! Environment reset: sweep stale browser processes before a run.
//!
//! The contract is best-effort. Matching is a case-insensitive substring
//! test on the process name, so it may miss a renamed binary or catch an
//! unrelated process with a similar name. Nothing in the pipeline depends on
//! the sweep succeeding; it only lowers the chance of a wedged session.

use tracing::{info, warn};

/// A running process as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

impl std::fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.pid)
    }
}

/// Enumerates and terminates OS processes.
pub trait ProcessControl: Send + Sync {
    fn list(&self) -> std::io::Result<Vec<ProcessInfo>>;
    fn kill(&self, pid: u32) -> std::io::Result<()>;
}

/// What a sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub killed: Vec<ProcessInfo>,
    /// Matches that could not be terminated, with the reason.
    pub failed: Vec<(ProcessInfo, String)>,
}

impl ResetReport {
    pub fn is_clean(&self) -> bool {
        self.killed.is_empty() && self.failed.is_empty()
    }
}

/// Case-insensitive substring match against any pattern.
pub fn matches_any(name: &str, patterns: &[String]) -> bool {
    let name = name.to_ascii_lowercase();
    patterns
        .iter()
        .any(|p| !p.is_empty() && name.contains(&p.to_ascii_lowercase()))
}

/// Terminate every process whose name matches one of `patterns`.
///
/// Never fails: listing and kill errors are logged and swallowed. The
/// calling process is never a candidate.
pub fn reset_environment(control: &dyn ProcessControl, patterns: &[String]) -> ResetReport {
    let mut report = ResetReport::default();
    let own_pid = std::process::id();

    let processes = match control.list() {
        Ok(list) => list,
        Err(e) => {
            warn!("Could not list processes, skipping browser cleanup: {e}");
            return report;
        }
    };

    for process in processes
        .into_iter()
        .filter(|p| p.pid != own_pid && matches_any(&p.name, patterns))
    {
        match control.kill(process.pid) {
            Ok(()) => report.killed.push(process),
            Err(e) => report.failed.push((process, e.to_string())),
        }
    }

    if !report.killed.is_empty() {
        let names: Vec<String> = report.killed.iter().map(ToString::to_string).collect();
        info!("Killed processes: {}", names.join(", "));
    }
    for (process, reason) in &report.failed {
        warn!("Could not kill {process}: {reason}");
    }
    if report.is_clean() {
        info!("No stale browser processes found");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProcesses;

    fn patterns() -> Vec<String> {
        vec!["chrome".into(), "chromedriver".into()]
    }

    #[test]
    fn test_kills_only_matching_processes() {
        let control = FakeProcesses::new(&[
            (4101, "chrome"),
            (4102, "chromedriver"),
            (4103, "Google Chrome Helper"),
            (4104, "bash"),
        ]);

        let report = reset_environment(&control, &patterns());

        let killed: Vec<u32> = report.killed.iter().map(|p| p.pid).collect();
        assert_eq!(killed, vec![4101, 4102, 4103]);
        assert_eq!(control.remaining(), vec![4104]);
    }

    #[test]
    fn test_kill_errors_are_swallowed() {
        let control = FakeProcesses::new(&[(1, "chrome"), (4102, "chrome")]).deny(1);

        let report = reset_environment(&control, &patterns());

        assert_eq!(report.killed.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.pid, 1);
    }

    #[test]
    fn test_listing_failure_is_not_fatal() {
        let control = FakeProcesses::unlistable();
        let report = reset_environment(&control, &patterns());
        assert!(report.is_clean());
    }

    #[test]
    fn test_idempotent_when_nothing_matches() {
        let control = FakeProcesses::new(&[(200, "sshd")]);
        let first = reset_environment(&control, &patterns());
        let second = reset_environment(&control, &patterns());
        assert!(first.is_clean());
        assert!(second.is_clean());
        assert_eq!(control.remaining(), vec![200]);
    }

    #[test]
    fn test_own_process_is_never_killed() {
        let own = std::process::id();
        let control = FakeProcesses::new(&[(own, "chrome-sync")]);
        let report = reset_environment(&control, &patterns());
        assert!(report.is_clean());
    }

    #[test]
    fn test_process_display() {
        let p = ProcessInfo {
            pid: 77,
            name: "chromedriver".into(),
        };
        assert_eq!(p.to_string(), "chromedriver(77)");
    }
}
