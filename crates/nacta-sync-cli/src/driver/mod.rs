//! Browser driver implementations.

pub mod chromium;

use std::path::PathBuf;

pub use chromium::ChromiumLauncher;

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    // 1. CHROME_BIN
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common install locations
    let common = if cfg!(target_os = "macos") {
        vec![PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        )]
    } else {
        vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/opt/google/chrome/chrome"),
        ]
    };
    common.into_iter().find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins_when_present() {
        let tmp = tempfile::tempdir().unwrap();
        let fake = tmp.path().join("chrome");
        std::fs::write(&fake, b"").unwrap();
        assert_eq!(find_chromium(Some(&fake)), Some(fake));
    }

    #[test]
    fn test_missing_explicit_path_falls_through() {
        let missing = PathBuf::from("/nonexistent/chrome");
        assert_ne!(find_chromium(Some(&missing)), Some(missing));
    }
}
