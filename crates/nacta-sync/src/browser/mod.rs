//! Browser driver abstraction.
//!
//! Defines the `BrowserLauncher` and `BrowserSession` traits that abstract
//! over the automation engine. The pipeline never talks to a concrete
//! browser; the CLI crate plugs in a Chromium implementation.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::BrowserSettings;
use crate::error::BrowserError;

/// Result type for driver calls.
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Settings for one isolated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub browser: BrowserSettings,
    /// Directory the browser writes downloads into. Private to the session.
    pub download_dir: PathBuf,
    pub page_load_timeout: Duration,
}

/// Opaque reference to an element found in a session's page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub usize);

/// A browser engine that can open isolated sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a fresh session. Nothing is shared with earlier sessions.
    async fn launch(&self, options: &SessionOptions) -> BrowserResult<Box<dyn BrowserSession>>;
}

/// A single live browser session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for the page to load, bounded by the session's
    /// page-load timeout.
    async fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// Wait up to `timeout` for an element matching the XPath `query` to
    /// become clickable.
    async fn wait_clickable(&mut self, query: &str, timeout: Duration)
        -> BrowserResult<ElementHandle>;

    /// Whether the element is currently rendered and visible.
    async fn is_displayed(&mut self, element: ElementHandle) -> BrowserResult<bool>;

    /// Click the element. An overlay catching the click is
    /// `BrowserError::ClickIntercepted`.
    async fn click(&mut self, element: ElementHandle) -> BrowserResult<()>;

    /// Serialized HTML of the current page.
    async fn page_source(&mut self) -> BrowserResult<String>;

    /// Tear the session down. Always called exactly once.
    async fn close(self: Box<Self>) -> BrowserResult<()>;
}
