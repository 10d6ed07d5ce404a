//! Source retrieval: one isolated browser session per source.
//!
//! Every session downloads into its own `.session-<uuid>` directory under
//! the staging directory. The finished file is renamed into the staging
//! directory as `{logical_name}_{YYYYMMDD_HHMMSS}.json` and the session
//! directory is removed, so leftovers from earlier runs (including artifacts
//! kept after a failed transfer) are never mistaken for a new download.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use futures::FutureExt;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::browser::{BrowserLauncher, BrowserSession, SessionOptions};
use crate::config::{SettleMode, SyncConfig, Timeouts};
use crate::error::{SyncError, SyncResult};
use crate::locator::find_trigger;
use crate::types::{artifact_file_name, RetrievedArtifact, Source, ARTIFACT_TIMESTAMP_FORMAT};

/// Suffixes browsers use for downloads still in progress.
const PARTIAL_SUFFIXES: [&str; 3] = ["crdownload", "part", "tmp"];

/// Drives a browser through one source's download.
pub struct Retriever<'a> {
    config: &'a SyncConfig,
    launcher: &'a dyn BrowserLauncher,
}

impl<'a> Retriever<'a> {
    pub fn new(config: &'a SyncConfig, launcher: &'a dyn BrowserLauncher) -> Self {
        Self { config, launcher }
    }

    /// Retrieve one source. The browser session is closed on every path.
    pub async fn retrieve(&self, source: &Source) -> SyncResult<RetrievedArtifact> {
        let session_dir = self
            .config
            .layout
            .download_dir()
            .join(format!(".session-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&session_dir).await?;

        let result = AssertUnwindSafe(self.retrieve_into(source, &session_dir))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SyncError::from_panic(&*panic)));

        if let Err(e) = tokio::fs::remove_dir_all(&session_dir).await {
            warn!("Could not remove {}: {e}", session_dir.display());
        }
        result
    }

    async fn retrieve_into(
        &self,
        source: &Source,
        session_dir: &Path,
    ) -> SyncResult<RetrievedArtifact> {
        let options = SessionOptions {
            browser: self.config.browser.clone(),
            download_dir: session_dir.to_path_buf(),
            page_load_timeout: self.config.timeouts.page_load,
        };
        let mut session = self
            .launcher
            .launch(&options)
            .await
            .map_err(SyncError::Browser)?;

        let mut navigated = false;
        // A driver panic must not skip the teardown below.
        let driven = self.drive(session.as_mut(), source, session_dir, &mut navigated);
        let result = AssertUnwindSafe(driven)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SyncError::from_panic(&*panic)));

        if result.is_err() && navigated {
            self.save_snapshot(session.as_mut(), source).await;
        }
        if let Err(e) = session.close().await {
            warn!("Failed to close browser session for {}: {e}", source.logical_name);
        }
        result
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        source: &Source,
        session_dir: &Path,
        navigated: &mut bool,
    ) -> SyncResult<RetrievedArtifact> {
        info!("Processing {} ({})", source.logical_name, source.url);
        session
            .navigate(&source.url)
            .await
            .map_err(SyncError::Navigation)?;
        *navigated = true;

        let trigger = find_trigger(session, &self.config.strategies, self.config.timeouts.element)
            .await?;
        session
            .click(trigger.element)
            .await
            .map_err(SyncError::Interaction)?;

        let downloaded =
            wait_for_download(session_dir, self.config.settle_mode, &self.config.timeouts).await?;

        let captured_at = Local::now();
        let local_path = self
            .config
            .layout
            .download_dir()
            .join(artifact_file_name(&source.logical_name, &captured_at));
        tokio::fs::rename(&downloaded, &local_path)
            .await
            .map_err(|e| {
                SyncError::Capture(format!(
                    "could not rename {} to {}: {e}",
                    downloaded.display(),
                    local_path.display()
                ))
            })?;
        info!("Downloaded {}", local_path.display());

        Ok(RetrievedArtifact {
            local_path,
            logical_name: source.logical_name.clone(),
            captured_at,
        })
    }

    /// Write the failing page's HTML under the debug directory. Best-effort.
    async fn save_snapshot(&self, session: &mut dyn BrowserSession, source: &Source) {
        let html = match session.page_source().await {
            Ok(html) => html,
            Err(e) => {
                debug!("No page snapshot for {}: {e}", source.logical_name);
                return;
            }
        };
        let dir = self.config.layout.debug_dir();
        let path = dir.join(format!(
            "{}_{}.html",
            source.logical_name,
            Local::now().format(ARTIFACT_TIMESTAMP_FORMAT)
        ));
        let written = async {
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(&path, html).await
        }
        .await;
        match written {
            Ok(()) => info!("Saved page snapshot to {}", path.display()),
            Err(e) => warn!("Could not save page snapshot {}: {e}", path.display()),
        }
    }
}

fn is_partial(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    let partial_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| PARTIAL_SUFFIXES.contains(&e));
    hidden || partial_ext
}

/// Regular files in `dir`, sorted by name, split into (finished, in-progress).
async fn list_downloads(dir: &Path) -> SyncResult<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut finished = Vec::new();
    let mut partial = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if is_partial(&path) {
            partial.push(path);
        } else {
            finished.push(path);
        }
    }
    finished.sort();
    partial.sort();
    Ok((finished, partial))
}

/// Wait for the click's download to land in `dir` and return its path.
///
/// `Fixed` sleeps the whole settle interval and looks once. `Stable` polls
/// until the first finished file reports the same non-zero size on two
/// consecutive samples, giving up at the settle bound.
pub async fn wait_for_download(
    dir: &Path,
    mode: SettleMode,
    timeouts: &Timeouts,
) -> SyncResult<PathBuf> {
    match mode {
        SettleMode::Fixed => {
            sleep(timeouts.settle).await;
            let (finished, partial) = list_downloads(dir).await?;
            finished
                .into_iter()
                .next()
                .ok_or_else(|| incomplete_or_missing(&partial))
        }
        SettleMode::Stable => poll_until_stable(dir, timeouts.settle, timeouts.poll).await,
    }
}

async fn poll_until_stable(dir: &Path, bound: Duration, every: Duration) -> SyncResult<PathBuf> {
    let deadline = Instant::now() + bound;
    let mut last: Option<(PathBuf, u64)> = None;

    loop {
        let (finished, partial) = list_downloads(dir).await?;
        if let Some(first) = finished.into_iter().next() {
            let size = tokio::fs::metadata(&first).await?.len();
            if size > 0 && last.as_ref() == Some(&(first.clone(), size)) {
                debug!("Download settled: {} ({size} bytes)", first.display());
                return Ok(first);
            }
            last = Some((first, size));
        } else {
            last = None;
        }

        if Instant::now() >= deadline {
            return Err(match last {
                Some((path, _)) => SyncError::DownloadIncomplete(path.display().to_string()),
                None => incomplete_or_missing(&partial),
            });
        }
        sleep(every).await;
    }
}

fn incomplete_or_missing(partial: &[PathBuf]) -> SyncError {
    match partial.first() {
        Some(p) => SyncError::DownloadIncomplete(p.display().to_string()),
        None => SyncError::NoFileDownloaded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> Timeouts {
        Timeouts {
            page_load: Duration::from_secs(1),
            element: Duration::from_millis(10),
            settle: Duration::from_millis(120),
            poll: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_stable_mode_returns_finished_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("export.json"), b"{\"rows\":[]}").unwrap();

        let found = wait_for_download(tmp.path(), SettleMode::Stable, &quick())
            .await
            .unwrap();
        assert_eq!(found, tmp.path().join("export.json"));
    }

    #[tokio::test]
    async fn test_empty_directory_is_no_file_downloaded() {
        let tmp = tempfile::tempdir().unwrap();
        for mode in [SettleMode::Stable, SettleMode::Fixed] {
            let err = wait_for_download(tmp.path(), mode, &quick())
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "no file downloaded");
        }
    }

    #[tokio::test]
    async fn test_partial_download_never_selected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("export.json.crdownload"), b"{\"ro").unwrap();

        let err = wait_for_download(tmp.path(), SettleMode::Stable, &quick())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::DownloadIncomplete(_)));
    }

    #[tokio::test]
    async fn test_empty_file_never_settles() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("export.json"), b"").unwrap();

        let err = wait_for_download(tmp.path(), SettleMode::Stable, &quick())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::DownloadIncomplete(_)));
    }

    #[tokio::test]
    async fn test_fixed_mode_takes_first_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.json"), b"2").unwrap();
        std::fs::write(tmp.path().join("a.json"), b"1").unwrap();

        let found = wait_for_download(tmp.path(), SettleMode::Fixed, &quick())
            .await
            .unwrap();
        assert_eq!(found, tmp.path().join("a.json"));
    }

    #[test]
    fn test_partial_detection() {
        assert!(is_partial(Path::new("/d/x.json.crdownload")));
        assert!(is_partial(Path::new("/d/.com.google.Chrome.abc")));
        assert!(!is_partial(Path::new("/d/ProscribedPersons.json")));
    }
}
