//! Process table access through `ps` and `kill`.

use std::process::Command;

use nacta_sync::{ProcessControl, ProcessInfo};

/// Lists processes with `ps -eo pid=,comm=` and terminates with `kill -9`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn list(&self) -> std::io::Result<Vec<ProcessInfo>> {
        let output = Command::new("ps").args(["-eo", "pid=,comm="]).output()?;
        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "ps exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(parse_ps(&String::from_utf8_lossy(&output.stdout)))
    }

    fn kill(&self, pid: u32) -> std::io::Result<()> {
        let output = Command::new("kill")
            .args(["-9", &pid.to_string()])
            .output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

/// Parse `pid comm` lines. `comm` may be a full path on macOS; only the
/// final component is kept.
pub fn parse_ps(stdout: &str) -> Vec<ProcessInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (pid, comm) = line.split_once(char::is_whitespace)?;
            let pid = pid.parse().ok()?;
            let comm = comm.trim();
            let name = comm.rsplit('/').next().unwrap_or(comm);
            (!name.is_empty()).then(|| ProcessInfo {
                pid,
                name: name.to_string(),
            })
        })
        .collect()
}
