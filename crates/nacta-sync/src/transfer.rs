//! Handoff of a retrieved artifact to the remote archive.

use std::path::Path;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::RemoteConfig;
use crate::error::{SyncResult, TransferError};
use crate::types::RetrievedArtifact;

/// Copies a local file to a directory on the remote archive host.
#[async_trait]
pub trait TransferTransport: Send + Sync {
    /// Copy `local_path` into `remote_dir`. Blocks until the copy has
    /// finished or failed.
    async fn send(&self, local_path: &Path, remote_dir: &str) -> Result<(), TransferError>;
}

/// Transfer the artifact once, then delete the local copy on success.
///
/// On transport failure the local file is left in place for manual
/// recovery and the transport's error is returned. Returns the artifact's
/// file name on success.
pub async fn transfer_and_cleanup(
    artifact: RetrievedArtifact,
    remote: &RemoteConfig,
    transport: &dyn TransferTransport,
) -> SyncResult<String> {
    let remote_dir = remote.destination(&artifact.logical_name)?;
    let file_name = artifact.file_name();

    if let Err(e) = transport.send(&artifact.local_path, remote_dir).await {
        warn!(
            "Transfer of {file_name} failed, keeping {}: {e}",
            artifact.local_path.display()
        );
        return Err(e.into());
    }

    info!("Transferred {file_name} to {remote_dir}/");
    if let Err(e) = tokio::fs::remove_file(&artifact.local_path).await {
        error!(
            "Transferred {file_name} but could not delete {}: {e}",
            artifact.local_path.display()
        );
    }
    Ok(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, SyncError};
    use crate::testing::RecordingTransport;
    use chrono::Local;

    fn remote() -> RemoteConfig {
        let mut remote = RemoteConfig::default();
        remote
            .destinations
            .insert("ProscribedPersons".into(), "/archive/notify".into());
        remote
    }

    fn artifact(dir: &Path, logical_name: &str) -> RetrievedArtifact {
        let local_path = dir.join(format!("{logical_name}_20240101_000000.json"));
        std::fs::write(&local_path, b"[]").unwrap();
        RetrievedArtifact {
            local_path,
            logical_name: logical_name.into(),
            captured_at: Local::now(),
        }
    }

    #[tokio::test]
    async fn test_success_deletes_local_file() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact = artifact(tmp.path(), "ProscribedPersons");
        let path = artifact.local_path.clone();
        let transport = RecordingTransport::succeeding();

        let name = transfer_and_cleanup(artifact, &remote(), &transport)
            .await
            .unwrap();

        assert_eq!(name, "ProscribedPersons_20240101_000000.json");
        assert!(!path.exists());
        assert_eq!(
            transport.calls(),
            vec![(path, "/archive/notify".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_local_file() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact = artifact(tmp.path(), "ProscribedPersons");
        let path = artifact.local_path.clone();
        let transport = RecordingTransport::failing(TransferError::Exit {
            code: Some(12),
            stderr: "rsync: connection unexpectedly closed".into(),
        });

        let err = transfer_and_cleanup(artifact, &remote(), &transport)
            .await
            .unwrap_err();

        assert!(path.exists());
        assert!(err.to_string().contains("connection unexpectedly closed"));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unmapped_name_is_config_error_without_transfer() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact = artifact(tmp.path(), "Elsewhere");
        let path = artifact.local_path.clone();
        let transport = RecordingTransport::succeeding();

        let err = transfer_and_cleanup(artifact, &remote(), &transport)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Config(ConfigError::MissingDestination(ref n)) if n == "Elsewhere"
        ));
        assert!(path.exists());
        assert!(transport.calls().is_empty());
    }
}
