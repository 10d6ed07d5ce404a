//! Chromium-based driver using chromiumoxide.
//!
//! Each launch starts its own headless Chromium process with a throwaway
//! profile directory, so nothing (cookies, cache, pending downloads) carries
//! over from one source to the next.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::debug;
use uuid::Uuid;

use nacta_sync::browser::{
    BrowserLauncher, BrowserResult, BrowserSession, ElementHandle, SessionOptions,
};
use nacta_sync::BrowserError;

use super::find_chromium;

/// Interval between clickability checks while waiting for an element.
const CLICKABLE_POLL: Duration = Duration::from_millis(250);

const CLICKABLE_JS: &str = r#"function() {
    const r = this.getBoundingClientRect();
    const s = window.getComputedStyle(this);
    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden'
        && s.display !== 'none' && s.pointerEvents !== 'none' && !this.disabled;
}"#;

const DISPLAYED_JS: &str = r#"function() {
    const s = window.getComputedStyle(this);
    return this.getClientRects().length > 0 && s.visibility !== 'hidden' && s.display !== 'none';
}"#;

/// Returns null when the element itself would receive a click at its
/// centre, otherwise a short description of whatever covers it.
const OBSTRUCTION_JS: &str = r#"function() {
    this.scrollIntoView({ block: 'center', inline: 'center' });
    const r = this.getBoundingClientRect();
    const top = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2);
    if (!top || top === this || this.contains(top)) { return null; }
    let label = top.tagName.toLowerCase();
    if (top.id) { label += '#' + top.id; }
    if (typeof top.className === 'string' && top.className.trim()) {
        label += '.' + top.className.trim().split(/\s+/).join('.');
    }
    return label;
}"#;

/// Launches one isolated headless Chromium per session.
#[derive(Debug, Default, Clone)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &SessionOptions) -> BrowserResult<Box<dyn BrowserSession>> {
        let chrome_path = find_chromium(options.browser.chrome_bin.as_ref()).ok_or_else(|| {
            BrowserError::Launch("Chromium not found. Set CHROME_BIN.".to_string())
        })?;
        let profile_dir = std::env::temp_dir().join(format!("nacta-sync-profile-{}", Uuid::new_v4()));
        let (width, height) = options.browser.window;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&profile_dir)
            .window_size(width, height)
            .request_timeout(options.page_load_timeout)
            .arg("--headless=new")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", options.browser.user_agent));
        if options.browser.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("failed to build browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(format!("failed to launch Chromium: {e}")))?;

        // Spawn the handler task
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let setup = async {
            let download = SetDownloadBehaviorParams::builder()
                .behavior(SetDownloadBehaviorBehavior::Allow)
                .download_path(options.download_dir.display().to_string())
                .build()
                .map_err(BrowserError::Launch)?;
            browser
                .execute(download)
                .await
                .map_err(|e| BrowserError::Launch(format!("failed to set download directory: {e}")))?;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::Launch(format!("failed to create new page: {e}")))
        }
        .await;

        let page = match setup {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                let _ = std::fs::remove_dir_all(&profile_dir);
                return Err(e);
            }
        };

        debug!("Chromium session started, downloads to {}", options.download_dir.display());
        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            profile_dir,
            page_load_timeout: options.page_load_timeout,
            elements: Vec::new(),
        }))
    }
}

/// A live Chromium process with a single page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
    page_load_timeout: Duration,
    elements: Vec<Element>,
}

impl ChromiumSession {
    fn element(&self, handle: ElementHandle) -> BrowserResult<&Element> {
        self.elements
            .get(handle.0)
            .ok_or(BrowserError::UnknownElement(handle.0))
    }
}

async fn eval_on(element: &Element, function: &str) -> BrowserResult<Option<serde_json::Value>> {
    element
        .call_js_fn(function, false)
        .await
        .map(|ret| ret.result.value)
        .map_err(|e| BrowserError::Driver(e.to_string()))
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        let timeout = self.page_load_timeout;
        let page = &self.page;
        let load = async move {
            page.goto(url).await?;
            // goto already succeeded; a late lifecycle error is not fatal.
            if let Err(e) = page.wait_for_navigation().await {
                debug!("wait_for_navigation after {url}: {e}");
            }
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(timeout, load).await {
            Ok(Ok(())) => {
                self.elements.clear();
                Ok(())
            }
            Ok(Err(e)) => Err(BrowserError::Navigation(e.to_string())),
            Err(_) => Err(BrowserError::NavigationTimeout(timeout.as_secs())),
        }
    }

    async fn wait_clickable(
        &mut self,
        query: &str,
        timeout: Duration,
    ) -> BrowserResult<ElementHandle> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.page.find_xpath(query).await {
                Ok(element) => {
                    let clickable = eval_on(&element, CLICKABLE_JS)
                        .await?
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);
                    if clickable {
                        self.elements.push(element);
                        return Ok(ElementHandle(self.elements.len() - 1));
                    }
                }
                Err(e) => debug!("xpath {query} not matched yet: {e}"),
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::ElementTimeout(timeout.as_millis() as u64));
            }
            sleep(CLICKABLE_POLL).await;
        }
    }

    async fn is_displayed(&mut self, element: ElementHandle) -> BrowserResult<bool> {
        let element = self.element(element)?;
        Ok(eval_on(element, DISPLAYED_JS)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn click(&mut self, element: ElementHandle) -> BrowserResult<()> {
        let element = self.element(element)?;
        if let Some(cover) = eval_on(element, OBSTRUCTION_JS)
            .await?
            .and_then(|v| v.as_str().map(String::from))
        {
            return Err(BrowserError::ClickIntercepted(format!(
                "other element would receive the click: {cover}"
            )));
        }
        element
            .click()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Driver(format!("click failed: {e}")))
    }

    async fn page_source(&mut self) -> BrowserResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Driver(format!("failed to get HTML: {e}")))
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
            profile_dir,
            ..
        } = *self;
        let _ = page.close().await;
        let closed = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&profile_dir).await {
            debug!("could not remove profile {}: {e}", profile_dir.display());
        }
        closed
            .map(|_| ())
            .map_err(|e| BrowserError::Driver(format!("failed to close Chromium: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nacta_sync::config::BrowserSettings;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_click_downloads_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let options = SessionOptions {
            browser: BrowserSettings::default(),
            download_dir: tmp.path().to_path_buf(),
            page_load_timeout: Duration::from_secs(30),
        };
        let mut session = ChromiumLauncher::new()
            .launch(&options)
            .await
            .expect("failed to launch");

        session
            .navigate(
                "data:text/html,<a href='data:application/json,%5B%5D' download='list.json'>Download JSON</a>",
            )
            .await
            .expect("navigation failed");

        let element = session
            .wait_clickable("//a[contains(., 'JSON')]", Duration::from_secs(5))
            .await
            .expect("anchor not clickable");
        assert!(session.is_displayed(element).await.expect("visibility"));
        session.click(element).await.expect("click failed");

        sleep(Duration::from_secs(3)).await;
        assert!(tmp.path().join("list.json").exists());

        let html = session.page_source().await.expect("page_source failed");
        assert!(html.contains("Download JSON"));

        session.close().await.expect("close failed");
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_goto_failure_still_reported() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let options = SessionOptions {
            browser: BrowserSettings::default(),
            download_dir: tmp.path().to_path_buf(),
            page_load_timeout: Duration::from_secs(10),
        };
        let mut session = ChromiumLauncher::new()
            .launch(&options)
            .await
            .expect("failed to launch");

        // Nothing listens on port 1.
        let err = session.navigate("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(
            err,
            BrowserError::Navigation(_) | BrowserError::NavigationTimeout(_)
        ));

        session
            .navigate("data:text/html,<p>ok</p>")
            .await
            .expect("data URL navigation failed");
        session.close().await.expect("close failed");
    }
}
