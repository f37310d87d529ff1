//! Offline fixture engine: serves canned HTML and simulates engine failures.
//!
//! Enabled for this crate's tests and, via the `test-support` feature, for
//! downstream integration tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ScoutError, ScoutResult};
use crate::parse;
use crate::renderer::{PageSession, SessionFactory};

/// How a fixture URL behaves when visited.
#[derive(Debug, Clone)]
pub enum FixturePage {
    /// Serve this HTML.
    Html(String),
    /// Navigation never completes within its budget.
    NavTimeout,
}

/// Session factory backed by an in-memory URL → page table.
#[derive(Clone, Default)]
pub struct FixtureSessionFactory {
    pages: Arc<HashMap<String, FixturePage>>,
    fail_open: bool,
    close_delay: Option<Duration>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    visits: Arc<AtomicUsize>,
}

impl FixtureSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page. Must be called before the factory is shared.
    pub fn with_page(mut self, url: &str, page: FixturePage) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.to_string(), page);
        self
    }

    pub fn with_html(self, url: &str, html: impl Into<String>) -> Self {
        self.with_page(url, FixturePage::Html(html.into()))
    }

    /// Make every `open` fail as if the engine could not launch.
    pub fn failing(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Make every session take `delay` to shut down.
    pub fn with_slow_close(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Total navigations across all sessions.
    pub fn visits(&self) -> usize {
        self.visits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FixtureSessionFactory {
    async fn open(&self) -> ScoutResult<Box<dyn PageSession>> {
        if self.fail_open {
            return Err(ScoutError::BrowserUnavailable(
                "fixture engine configured to fail".to_string(),
            ));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixtureSession {
            pages: Arc::clone(&self.pages),
            closed: Arc::clone(&self.closed),
            visits: Arc::clone(&self.visits),
            close_delay: self.close_delay,
            url: None,
            html: String::new(),
        }))
    }

    fn engine(&self) -> &'static str {
        "fixture"
    }
}

struct FixtureSession {
    pages: Arc<HashMap<String, FixturePage>>,
    closed: Arc<AtomicUsize>,
    visits: Arc<AtomicUsize>,
    close_delay: Option<Duration>,
    url: Option<String>,
    html: String,
}

#[async_trait]
impl PageSession for FixtureSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> ScoutResult<()> {
        self.visits.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some(FixturePage::Html(html)) => {
                self.url = Some(url.to_string());
                self.html = html.clone();
                Ok(())
            }
            Some(FixturePage::NavTimeout) => Err(ScoutError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
            None => Err(ScoutError::Navigation {
                url: url.to_string(),
                reason: "HTTP 404".to_string(),
            }),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> ScoutResult<()> {
        if self.url.is_some() && parse::has_selector(&self.html, selector)? {
            return Ok(());
        }
        Err(ScoutError::ElementTimeout {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    async fn html(&mut self) -> ScoutResult<String> {
        Ok(self.html.clone())
    }

    async fn current_url(&mut self) -> ScoutResult<String> {
        Ok(self.url.clone().unwrap_or_default())
    }

    async fn close(self: Box<Self>) {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A site root in the catalog's markup, with the given `(name, href)` links
/// under a "Books" root entry.
pub fn home_page(categories: &[(&str, &str)]) -> String {
    let links: String = categories
        .iter()
        .map(|(name, href)| format!("<li><a href=\"{href}\">\n  {name}\n</a></li>"))
        .collect();
    format!(
        "<html><body><div class=\"side_categories\"><ul class=\"nav nav-list\">\
         <li><a href=\"catalogue/category/books_1/index.html\">Books</a><ul>{links}</ul></li>\
         </ul></div></body></html>"
    )
}

/// A category listing page with `(title, price)` cards and an optional next link.
pub fn listing_page(items: &[(&str, &str)], next_href: Option<&str>) -> String {
    let cards: String = items
        .iter()
        .map(|(title, price)| {
            format!(
                "<li><article class=\"product_pod\"><h3><a href=\"#\" title=\"{title}\">{title}</a></h3>\
                 <div class=\"product_price\"><p class=\"price_color\">{price}</p></div></article></li>"
            )
        })
        .collect();
    let pager = next_href
        .map(|href| format!("<ul class=\"pager\"><li class=\"next\"><a href=\"{href}\">next</a></li></ul>"))
        .unwrap_or_default();
    format!("<html><body><section><ol class=\"row\">{cards}</ol>{pager}</section></body></html>")
}
