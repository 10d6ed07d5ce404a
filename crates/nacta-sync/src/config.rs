//! Configuration loading and resolution.
//!
//! Everything the pipeline needs is collected into one [`SyncConfig`] at
//! startup and handed to each component by reference. Values come from a
//! key lookup (normally the process environment after `.env` has been
//! loaded); empty values count as unset.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::layout::Layout;
use crate::types::{default_strategies, LocatorStrategy, Source};

pub const DEFAULT_BASE_DIR: &str = "/etc/scripts/nacta";
pub const DEFAULT_CHROMEDRIVER_BIN: &str = "/usr/bin/chromedriver";
pub const DEFAULT_SLACK_CHANNEL: &str = "#nacta-alerts";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const DEFAULT_PAGE_LOAD_SECS: u64 = 120;
const DEFAULT_ELEMENT_WAIT_SECS: u64 = 10;
const DEFAULT_SETTLE_SECS: u64 = 15;
const DEFAULT_POLL_MS: u64 = 500;

/// Logical name → environment key holding its remote path.
const DESTINATION_KEYS: [(&str, &str); 2] = [
    ("ProscribedPersons", "REMOTE_PATH_NOTIFY"),
    ("DenotifiedProscribedPersons", "REMOTE_PATH_DENOTIFY"),
];

/// The pages retrieved on every run.
pub fn default_sources() -> Vec<Source> {
    vec![
        Source::new("https://nfs.nacta.gov.pk/", "ProscribedPersons"),
        Source::new(
            "https://nfs.nacta.gov.pk/denotified",
            "DenotifiedProscribedPersons",
        ),
    ]
}

/// Bounded waits used during retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub page_load: Duration,
    pub element: Duration,
    pub settle: Duration,
    pub poll: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load: Duration::from_secs(DEFAULT_PAGE_LOAD_SECS),
            element: Duration::from_secs(DEFAULT_ELEMENT_WAIT_SECS),
            settle: Duration::from_secs(DEFAULT_SETTLE_SECS),
            poll: Duration::from_millis(DEFAULT_POLL_MS),
        }
    }
}

/// How retrieval decides a download has landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettleMode {
    /// Poll until a finished file keeps the same size across two samples.
    #[default]
    Stable,
    /// Sleep the whole settle interval, then look once.
    Fixed,
}

impl std::str::FromStr for SettleMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stable" | "poll" => Ok(SettleMode::Stable),
            "fixed" => Ok(SettleMode::Fixed),
            other => Err(ConfigError::Invalid {
                key: "SETTLE_MODE".into(),
                message: format!("expected 'stable' or 'fixed', got '{other}'"),
            }),
        }
    }
}

/// Fixed browser session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    /// Explicit browser binary; auto-detected when `None`.
    pub chrome_bin: Option<PathBuf>,
    pub driver_bin: PathBuf,
    pub user_agent: String,
    pub window: (u32, u32),
    pub no_sandbox: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_bin: None,
            driver_bin: PathBuf::from(DEFAULT_CHROMEDRIVER_BIN),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window: (1920, 1080),
            no_sandbox: true,
        }
    }
}

/// Remote archive host and per-source destination paths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteConfig {
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: u16,
    pub key_path: Option<PathBuf>,
    pub destinations: BTreeMap<String, String>,
}

impl RemoteConfig {
    /// Remote path for a logical name.
    pub fn destination(&self, logical_name: &str) -> Result<&str, ConfigError> {
        self.destinations
            .get(logical_name)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingDestination(logical_name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub server: String,
    pub port: u16,
    pub from: String,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackConfig {
    pub webhook_url: String,
    pub channel: String,
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub layout: Layout,
    pub browser: BrowserSettings,
    pub timeouts: Timeouts,
    pub settle_mode: SettleMode,
    pub sources: Vec<Source>,
    pub strategies: Vec<LocatorStrategy>,
    pub remote: RemoteConfig,
    pub email: Option<EmailConfig>,
    pub slack: Option<SlackConfig>,
    /// Lower-case process name fragments swept before a run.
    pub reset_patterns: Vec<String>,
}

impl SyncConfig {
    /// Defaults rooted at `base_dir`, with no remote or notification channels.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: Layout::new(base_dir),
            browser: BrowserSettings::default(),
            timeouts: Timeouts::default(),
            settle_mode: SettleMode::default(),
            sources: default_sources(),
            strategies: default_strategies(),
            remote: RemoteConfig {
                port: 22,
                ..RemoteConfig::default()
            },
            email: None,
            slack: None,
            reset_patterns: base_reset_patterns(),
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_dir = get("BASE_DIR").unwrap_or_else(|| DEFAULT_BASE_DIR.to_string());
        let mut config = Self::new(base_dir);

        config.browser.chrome_bin = get("CHROME_BIN").map(PathBuf::from);
        if let Some(driver) = get("CHROMEDRIVER_BIN") {
            config.browser.driver_bin = PathBuf::from(driver);
        }
        if let Some(mode) = get("SETTLE_MODE") {
            config.settle_mode = mode.parse()?;
        }

        config.remote.host = get("REMOTE_HOST");
        config.remote.user = get("REMOTE_USER");
        if let Some(port) = get("REMOTE_PORT") {
            config.remote.port = parse_port("REMOTE_PORT", &port)?;
        }
        config.remote.key_path = get("REMOTE_KEY_PATH").map(PathBuf::from);
        for (name, key) in DESTINATION_KEYS {
            if let Some(path) = get(key) {
                config.remote.destinations.insert(name.to_string(), path);
            }
        }

        if let Some(webhook_url) = get("SLACK_WEBHOOK_URL") {
            config.slack = Some(SlackConfig {
                webhook_url,
                channel: get("SLACK_CHANNEL").unwrap_or_else(|| DEFAULT_SLACK_CHANNEL.to_string()),
            });
        }

        if let Some(server) = get("SMTP_SERVER") {
            let port = match get("SMTP_PORT") {
                Some(p) => parse_port("SMTP_PORT", &p)?,
                None => 25,
            };
            let to = get("EMAIL_TO_LIST")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            config.email = Some(EmailConfig {
                server,
                port,
                from: get("EMAIL_FROM").unwrap_or_default(),
                to,
            });
        }

        config.reset_patterns = reset_patterns_for(&config.browser);
        config.validate()?;
        Ok(config)
    }

    /// Check sources are well-formed. Missing destinations are reported
    /// per source at transfer time, not here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for source in &self.sources {
            if source.logical_name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key: "sources".into(),
                    message: format!("source {} has an empty logical name", source.url),
                });
            }
            let parsed = url::Url::parse(&source.url).map_err(|e| ConfigError::Invalid {
                key: "sources".into(),
                message: format!("{}: {e}", source.url),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid {
                    key: "sources".into(),
                    message: format!("{}: unsupported scheme '{}'", source.url, parsed.scheme()),
                });
            }
        }
        Ok(())
    }

    /// Sources whose logical name has no remote destination.
    pub fn unmapped_sources(&self) -> Vec<&Source> {
        self.sources
            .iter()
            .filter(|s| self.remote.destination(&s.logical_name).is_err())
            .collect()
    }

    /// Also sweep processes started from `binary`, such as the browser the
    /// driver resolved on PATH.
    pub fn add_reset_binary(&mut self, binary: &Path) {
        push_pattern(&mut self.reset_patterns, binary);
    }
}

fn parse_port(key: &str, raw: &str) -> Result<u16, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        message: format!("'{raw}' is not a valid port"),
    })
}

/// Longest process name `ps -o comm` reports on Linux.
const COMM_NAME_LEN: usize = 15;

/// Name fragments always swept, whatever binary was configured.
fn base_reset_patterns() -> Vec<String> {
    vec![
        "chrome".to_string(),
        "chromium".to_string(),
        "chromedriver".to_string(),
    ]
}

/// The fragment of `path`'s file name that shows up in the process table,
/// cut to the kernel's command-name length.
pub fn process_pattern(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    let name: String = name.chars().take(COMM_NAME_LEN).collect();
    (!name.is_empty()).then_some(name)
}

fn push_pattern(patterns: &mut Vec<String>, path: &Path) {
    if let Some(name) = process_pattern(path) {
        if !patterns.iter().any(|p| name.contains(p.as_str())) {
            patterns.push(name);
        }
    }
}

/// Base patterns plus the configured binaries' names.
fn reset_patterns_for(browser: &BrowserSettings) -> Vec<String> {
    let mut patterns = base_reset_patterns();
    let extra = [browser.chrome_bin.as_deref(), Some(browser.driver_bin.as_path())];
    for path in extra.into_iter().flatten() {
        push_pattern(&mut patterns, path);
    }
    patterns
}
