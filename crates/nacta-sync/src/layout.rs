//! On-disk directory layout under the base directory.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

/// Staging, backup, log, and debug directories for one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    base: PathBuf,
}

impl Layout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Where renamed artifacts wait for transfer.
    pub fn download_dir(&self) -> PathBuf {
        self.base.join("data").join("downloads")
    }

    /// Reserved for manual backups; created but never written by the pipeline.
    pub fn backup_dir(&self) -> PathBuf {
        self.base.join("data").join("backup")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    /// Page snapshots taken when a retrieval fails.
    pub fn debug_dir(&self) -> PathBuf {
        self.logs_dir().join("debug")
    }

    /// Daily log file, `logs/nacta_YYYY-MM-DD.log`.
    pub fn log_file(&self, day: NaiveDate) -> PathBuf {
        self.logs_dir()
            .join(format!("nacta_{}.log", day.format("%Y-%m-%d")))
    }

    pub fn all_dirs(&self) -> [PathBuf; 4] {
        [
            self.download_dir(),
            self.backup_dir(),
            self.logs_dir(),
            self.debug_dir(),
        ]
    }

    /// Create every directory that does not exist yet.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in self.all_dirs() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_creates_all_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path().join("nacta"));
        layout.ensure().unwrap();
        for dir in layout.all_dirs() {
            assert!(dir.is_dir(), "{} missing", dir.display());
        }
        // Second call is a no-op.
        layout.ensure().unwrap();
    }

    #[test]
    fn test_log_file_name() {
        let layout = Layout::new("/srv/nacta");
        let day = NaiveDate::from_ymd_opt(2024, 5, 9).unwrap();
        assert_eq!(
            layout.log_file(day),
            PathBuf::from("/srv/nacta/logs/nacta_2024-05-09.log")
        );
        assert_eq!(layout.debug_dir(), PathBuf::from("/srv/nacta/logs/debug"));
    }
}
