//! rsync-over-SSH transfer transport.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use nacta_sync::config::RemoteConfig;
use nacta_sync::{TransferError, TransferTransport};

/// Seconds ssh waits for the TCP connection before giving up.
const SSH_CONNECT_TIMEOUT_SECS: u32 = 30;

/// Copies files with `rsync -avz` over an SSH key.
#[derive(Debug, Clone)]
pub struct RsyncTransport {
    program: String,
    host: Option<String>,
    user: Option<String>,
    port: u16,
    key_path: Option<PathBuf>,
}

impl RsyncTransport {
    pub fn from_config(remote: &RemoteConfig) -> Self {
        Self {
            program: "rsync".to_string(),
            host: remote.host.clone(),
            user: remote.user.clone(),
            port: remote.port,
            key_path: remote.key_path.clone(),
        }
    }

    /// Override the rsync binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// The `-e` remote shell command.
    pub fn ssh_command(&self) -> String {
        let mut ssh = String::from("ssh");
        if let Some(key) = &self.key_path {
            ssh.push_str(&format!(" -i {}", key.display()));
        }
        ssh.push_str(&format!(
            " -p {} -o StrictHostKeyChecking=no -o ConnectTimeout={SSH_CONNECT_TIMEOUT_SECS}",
            self.port
        ));
        ssh
    }

    /// Full argument list for copying `local_path` into `remote_dir`.
    pub fn args(&self, local_path: &Path, remote_dir: &str) -> Result<Vec<String>, TransferError> {
        let host = self
            .host
            .as_deref()
            .ok_or_else(|| TransferError::Other("REMOTE_HOST is not set".to_string()))?;
        let user = self
            .user
            .as_deref()
            .ok_or_else(|| TransferError::Other("REMOTE_USER is not set".to_string()))?;

        Ok(vec![
            "-avz".to_string(),
            "-e".to_string(),
            self.ssh_command(),
            local_path.display().to_string(),
            format!("{user}@{host}:{}/", remote_dir.trim_end_matches('/')),
        ])
    }
}

#[async_trait]
impl TransferTransport for RsyncTransport {
    async fn send(&self, local_path: &Path, remote_dir: &str) -> Result<(), TransferError> {
        let args = self.args(local_path, remote_dir)?;
        debug!("{} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TransferError::Spawn(format!("{}: {e}", self.program)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(TransferError::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
