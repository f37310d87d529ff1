//! Chromium page sessions using chromiumoxide.
//!
//! Each session launches its own headless browser and kills it on close,
//! so no browser state carries over between invocations.

use super::{PageSession, SessionFactory};
use crate::config::ScoutConfig;
use crate::error::{ScoutError, ScoutResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Poll interval while waiting for a selector.
const WAIT_POLL: Duration = Duration::from_millis(100);

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    // 1. Configured path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // 2. ~/.catalog-scout/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".catalog-scout/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".catalog-scout/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".catalog-scout/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".catalog-scout/chromium/chrome-linux64/chrome"),
                home.join(".catalog-scout/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Opens one freshly launched Chromium per session.
pub struct ChromiumSessionFactory {
    config: Arc<ScoutConfig>,
}

impl ChromiumSessionFactory {
    pub fn new(config: Arc<ScoutConfig>) -> Self {
        Self { config }
    }

    /// Whether a Chromium binary can be located.
    pub fn available(&self) -> bool {
        find_chromium(self.config.chromium_path.as_ref()).is_some()
    }

    fn browser_config(&self) -> ScoutResult<BrowserConfig> {
        let chrome_path = find_chromium(self.config.chromium_path.as_ref()).ok_or_else(|| {
            ScoutError::BrowserUnavailable(
                "Chromium not found; set SCOUT_CHROMIUM_PATH".to_string(),
            )
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg(format!("--user-agent={}", self.config.user_agent));

        builder = if self.config.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };

        builder
            .build()
            .map_err(|e| ScoutError::Browser(format!("failed to build browser config: {e}")))
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self) -> ScoutResult<Box<dyn PageSession>> {
        let config = self.browser_config()?;
        let launch_timeout = self.config.launch_timeout();

        let (browser, mut handler) = tokio::time::timeout(launch_timeout, Browser::launch(config))
            .await
            .map_err(|_| {
                ScoutError::BrowserUnavailable(format!(
                    "Chromium launch timed out after {}ms",
                    launch_timeout.as_millis()
                ))
            })?
            .map_err(|e| ScoutError::BrowserUnavailable(format!("failed to launch Chromium: {e}")))?;

        // The handler must be polled for the browser connection to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let mut browser = browser;
                let _ = browser.close().await;
                handler_task.abort();
                return Err(ScoutError::Browser(format!("failed to create page: {e}")));
            }
        };

        tracing::debug!("Chromium session opened");
        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
        }))
    }

    fn engine(&self) -> &'static str {
        "chromium"
    }
}

/// A single Chromium browser with one page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> ScoutResult<()> {
        let start = Instant::now();
        let result = tokio::time::timeout(timeout, async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await;

        match result {
            Ok(Ok(())) => {
                tracing::debug!(
                    url,
                    load_ms = start.elapsed().as_millis() as u64,
                    "page loaded"
                );
                Ok(())
            }
            Ok(Err(e)) => Err(ScoutError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ScoutError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> ScoutResult<()> {
        let literal = serde_json::to_string(selector)?;
        let script = format!("document.querySelector({literal}) !== null");

        let poll = async {
            loop {
                let present = self
                    .page
                    .evaluate(script.as_str())
                    .await
                    .ok()
                    .and_then(|r| r.into_value::<bool>().ok())
                    .unwrap_or(false);
                if present {
                    return;
                }
                tokio::time::sleep(WAIT_POLL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| ScoutError::ElementTimeout {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
    }

    async fn html(&mut self) -> ScoutResult<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .map_err(|e| ScoutError::Browser(format!("failed to get HTML: {e}")))?;

        result
            .into_value::<String>()
            .map_err(|e| ScoutError::Browser(format!("failed to convert HTML result: {e:?}")))
    }

    async fn current_url(&mut self) -> ScoutResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| ScoutError::Browser(format!("failed to get URL: {e}")))?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn close(self: Box<Self>) {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
        } = *self;
        let _ = page.close().await;
        if let Err(e) = browser.close().await {
            tracing::debug!("browser close failed: {e}");
        }
        let _ = browser.wait().await;
        handler_task.abort();
        tracing::debug!("Chromium session closed");
    }
}
