//! Error types for the retrieval-and-handoff pipeline.

/// Failures reported by a browser driver.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation timed out after {0}s")]
    NavigationTimeout(u64),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element not clickable within {0}ms")]
    ElementTimeout(u64),

    #[error("click intercepted: {0}")]
    ClickIntercepted(String),

    #[error("unknown element handle: {0}")]
    UnknownElement(usize),

    #[error("driver error: {0}")]
    Driver(String),
}

/// Failures reported by a remote transfer transport.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("failed to start transport: {0}")]
    Spawn(String),

    #[error("transport exited with status {}: {stderr}", exit_label(.code))]
    Exit { code: Option<i32>, stderr: String },

    #[error("{0}")]
    Other(String),
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Failures of a single notification channel.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("{channel} delivery failed: {message}")]
    Delivery { channel: String, message: String },

    #[error("{0} message could not be built: {1}")]
    Build(String, String),
}

/// Configuration problems detected at load time or at use.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no remote destination configured for '{0}'")]
    MissingDestination(String),

    #[error("{key}: {message}")]
    Invalid { key: String, message: String },
}

/// All errors a source can fail with.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("{0}")]
    Navigation(BrowserError),

    #[error("download trigger not found")]
    TriggerNotFound,

    #[error("{0}")]
    Interaction(BrowserError),

    #[error("no file downloaded")]
    NoFileDownloaded,

    #[error("download did not finish: {0}")]
    DownloadIncomplete(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Browser(BrowserError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source processing panicked: {0}")]
    Panicked(String),
}

impl SyncError {
    /// Short taxonomy label used in structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            SyncError::Navigation(_) | SyncError::TriggerNotFound => "navigation",
            SyncError::Interaction(_) => "interaction",
            SyncError::NoFileDownloaded
            | SyncError::DownloadIncomplete(_)
            | SyncError::Capture(_) => "capture",
            SyncError::Transfer(_) => "transfer",
            SyncError::Config(_) => "configuration",
            SyncError::Browser(_) => "browser",
            SyncError::Io(_) => "io",
            SyncError::Panicked(_) => "panic",
        }
    }
}

impl SyncError {
    /// Wrap the payload of a caught panic.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        SyncError::Panicked(message)
    }
}

/// Convenience result type.
pub type SyncResult<T> = Result<T, SyncError>;
