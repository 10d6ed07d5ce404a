//! In-memory collaborators for exercising the pipeline without a browser,
//! a remote host, or real notification endpoints.
//!
//! Every fake records what it was asked to do so callers can assert on the
//! exact interaction sequence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{
    BrowserLauncher, BrowserResult, BrowserSession, ElementHandle, SessionOptions,
};
use crate::error::{BrowserError, NotifyError, TransferError};
use crate::notify::{Notification, NotificationChannel};
use crate::reset::{ProcessControl, ProcessInfo};
use crate::transfer::TransferTransport;

/// How an XPath query behaves on a scripted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementBehavior {
    Clickable,
    /// Clickable but reported as not displayed.
    Hidden,
    Timeout,
    Error(String),
}

/// What clicking the trigger does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickBehavior {
    /// Write a file into the session's download directory.
    Download { file_name: String, contents: Vec<u8> },
    Intercepted(String),
    /// Click succeeds but nothing is downloaded.
    Nothing,
    /// Click panics inside the driver.
    Panic,
}

/// The scripted behavior of one URL.
#[derive(Debug, Clone)]
pub struct PageScript {
    pub navigation: Result<(), BrowserError>,
    pub elements: HashMap<String, ElementBehavior>,
    pub click: ClickBehavior,
    pub html: String,
}

impl Default for PageScript {
    fn default() -> Self {
        Self {
            navigation: Ok(()),
            elements: HashMap::new(),
            click: ClickBehavior::Nothing,
            html: "<html><body></body></html>".to_string(),
        }
    }
}

impl PageScript {
    /// A page whose first default strategy matches and downloads `contents`.
    pub fn downloading(contents: &[u8]) -> Self {
        Self::default()
            .element("//button[contains(., 'JSON')]", ElementBehavior::Clickable)
            .on_click(ClickBehavior::Download {
                file_name: "export.json".to_string(),
                contents: contents.to_vec(),
            })
    }

    /// A page that never finishes loading.
    pub fn navigation_timeout(secs: u64) -> Self {
        Self {
            navigation: Err(BrowserError::NavigationTimeout(secs)),
            ..Self::default()
        }
    }

    pub fn element(mut self, query: &str, behavior: ElementBehavior) -> Self {
        self.elements.insert(query.to_string(), behavior);
        self
    }

    pub fn on_click(mut self, click: ClickBehavior) -> Self {
        self.click = click;
        self
    }
}

/// Interactions observed across every session a launcher opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLog {
    pub launched: usize,
    pub closed: usize,
    pub navigations: Vec<String>,
    pub queries: Vec<String>,
    pub clicks: usize,
    pub download_dirs: Vec<PathBuf>,
}

/// A launcher whose sessions follow per-URL scripts.
#[derive(Default)]
pub struct ScriptedLauncher {
    pages: HashMap<String, PageScript>,
    log: Arc<Mutex<SessionLog>>,
    fail_launch: Option<String>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, script: PageScript) -> Self {
        self.pages.insert(url.to_string(), script);
        self
    }

    /// Make every launch fail.
    pub fn failing_launch(mut self, reason: &str) -> Self {
        self.fail_launch = Some(reason.to_string());
        self
    }

    pub fn log(&self) -> SessionLog {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self, options: &SessionOptions) -> BrowserResult<Box<dyn BrowserSession>> {
        if let Some(reason) = &self.fail_launch {
            return Err(BrowserError::Launch(reason.clone()));
        }
        if let Ok(mut log) = self.log.lock() {
            log.launched += 1;
            log.download_dirs.push(options.download_dir.clone());
        }
        Ok(Box::new(ScriptedSession {
            pages: self.pages.clone(),
            current: None,
            download_dir: options.download_dir.clone(),
            log: Arc::clone(&self.log),
        }))
    }
}

struct ScriptedSession {
    pages: HashMap<String, PageScript>,
    current: Option<PageScript>,
    download_dir: PathBuf,
    log: Arc<Mutex<SessionLog>>,
}

impl ScriptedSession {
    fn record(&self, f: impl FnOnce(&mut SessionLog)) {
        if let Ok(mut log) = self.log.lock() {
            f(&mut log);
        }
    }

    fn page(&self) -> BrowserResult<&PageScript> {
        self.current
            .as_ref()
            .ok_or_else(|| BrowserError::Driver("no page loaded".into()))
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.record(|log| log.navigations.push(url.to_string()));
        let script = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| BrowserError::Navigation(format!("net::ERR_NAME_NOT_RESOLVED at {url}")))?;
        script.navigation.clone()?;
        self.current = Some(script);
        Ok(())
    }

    async fn wait_clickable(
        &mut self,
        query: &str,
        timeout: Duration,
    ) -> BrowserResult<ElementHandle> {
        self.record(|log| log.queries.push(query.to_string()));
        let behavior = self
            .page()?
            .elements
            .get(query)
            .cloned()
            .unwrap_or(ElementBehavior::Timeout);
        match behavior {
            ElementBehavior::Clickable | ElementBehavior::Hidden => {
                let index = self.log.lock().map(|l| l.queries.len() - 1).unwrap_or(0);
                Ok(ElementHandle(index))
            }
            ElementBehavior::Timeout => Err(BrowserError::ElementTimeout(timeout.as_millis() as u64)),
            ElementBehavior::Error(message) => Err(BrowserError::Driver(message)),
        }
    }

    async fn is_displayed(&mut self, element: ElementHandle) -> BrowserResult<bool> {
        let query = self
            .log
            .lock()
            .ok()
            .and_then(|l| l.queries.get(element.0).cloned())
            .ok_or(BrowserError::UnknownElement(element.0))?;
        Ok(self.page()?.elements.get(&query) == Some(&ElementBehavior::Clickable))
    }

    async fn click(&mut self, _element: ElementHandle) -> BrowserResult<()> {
        self.record(|log| log.clicks += 1);
        match self.page()?.click.clone() {
            ClickBehavior::Download {
                file_name,
                contents,
            } => std::fs::write(self.download_dir.join(file_name), contents)
                .map_err(|e| BrowserError::Driver(e.to_string())),
            ClickBehavior::Intercepted(by) => Err(BrowserError::ClickIntercepted(by)),
            ClickBehavior::Nothing => Ok(()),
            ClickBehavior::Panic => panic!("driver crashed during click"),
        }
    }

    async fn page_source(&mut self) -> BrowserResult<String> {
        Ok(self.page()?.html.clone())
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        self.record(|log| log.closed += 1);
        Ok(())
    }
}

/// A transport that records each call and returns a fixed result.
pub struct RecordingTransport {
    result: Result<(), TransferError>,
    calls: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingTransport {
    pub fn succeeding() -> Self {
        Self {
            result: Ok(()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: TransferError) -> Self {
        Self {
            result: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TransferTransport for RecordingTransport {
    async fn send(&self, local_path: &Path, remote_dir: &str) -> Result<(), TransferError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((local_path.to_path_buf(), remote_dir.to_string()));
        }
        self.result.clone()
    }
}

/// A channel that records each notification and returns a fixed result.
pub struct RecordingChannel {
    name: String,
    failure: Option<String>,
    deliveries: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingChannel {
    pub fn succeeding(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failure: None,
            deliveries: Arc::default(),
        }
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::succeeding(name)
        }
    }

    /// Shared handle to the delivered notifications; clone before boxing.
    pub fn deliveries(&self) -> Arc<Mutex<Vec<Notification>>> {
        Arc::clone(&self.deliveries)
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        if let Ok(mut d) = self.deliveries.lock() {
            d.push(notification.clone());
        }
        match &self.failure {
            Some(message) => Err(NotifyError::Delivery {
                channel: self.name.clone(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// A process table held in memory.
#[derive(Default)]
pub struct FakeProcesses {
    table: Mutex<Vec<ProcessInfo>>,
    denied: Vec<u32>,
    unlistable: bool,
}

impl FakeProcesses {
    pub fn new(processes: &[(u32, &str)]) -> Self {
        Self {
            table: Mutex::new(
                processes
                    .iter()
                    .map(|(pid, name)| ProcessInfo {
                        pid: *pid,
                        name: name.to_string(),
                    })
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Listing always fails.
    pub fn unlistable() -> Self {
        Self {
            unlistable: true,
            ..Self::default()
        }
    }

    /// Killing `pid` fails with a permission error.
    pub fn deny(mut self, pid: u32) -> Self {
        self.denied.push(pid);
        self
    }

    pub fn remaining(&self) -> Vec<u32> {
        self.table
            .lock()
            .map(|t| t.iter().map(|p| p.pid).collect())
            .unwrap_or_default()
    }
}

impl ProcessControl for FakeProcesses {
    fn list(&self) -> std::io::Result<Vec<ProcessInfo>> {
        if self.unlistable {
            return Err(std::io::Error::other("ps not available"));
        }
        Ok(self.table.lock().map(|t| t.clone()).unwrap_or_default())
    }

    fn kill(&self, pid: u32) -> std::io::Result<()> {
        if self.denied.contains(&pid) {
            return Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        }
        let mut table = self
            .table
            .lock()
            .map_err(|_| std::io::Error::other("process table poisoned"))?;
        let before = table.len();
        table.retain(|p| p.pid != pid);
        if table.len() == before {
            return Err(std::io::Error::from(std::io::ErrorKind::NotFound));
        }
        Ok(())
    }
}
