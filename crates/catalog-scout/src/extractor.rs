//! Paginated item extraction from a catalog section.
//!
//! Failure policy: a failure while loading the first page is fatal to the
//! call. A failure while following pagination keeps the items already
//! collected and reports the stop as a partial result.

use std::time::{Duration, Instant};
use url::Url;

use crate::config::{ScoutConfig, SiteSelectors};
use crate::error::{ScoutError, ScoutResult};
use crate::parse::{self, ListingPage};
use crate::renderer::PageSession;
use crate::types::Item;

/// Items gathered from one section plus how the walk ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub items: Vec<Item>,
    /// Listing pages read successfully.
    pub pages: usize,
    /// The item limit stopped the walk.
    pub limit_reached: bool,
    /// Why pagination stopped early, when it did.
    pub partial: Option<String>,
}

/// Walks a category's listing pages and reads item cards.
#[derive(Debug, Clone)]
pub struct CatalogExtractor {
    nav_timeout: Duration,
    element_timeout: Duration,
    max_pages: usize,
    selectors: SiteSelectors,
}

impl CatalogExtractor {
    pub fn new(config: &ScoutConfig) -> Self {
        Self {
            nav_timeout: config.nav_timeout(),
            element_timeout: config.element_timeout(),
            max_pages: config.max_pages.max(1),
            selectors: config.selectors.clone(),
        }
    }

    /// Extract up to `limit` items starting at `category_url`.
    ///
    /// `None` or `Some(0)` means no limit; the page cap still applies.
    pub async fn extract(
        &self,
        session: &mut dyn PageSession,
        category_url: &str,
        limit: Option<usize>,
    ) -> ScoutResult<Extraction> {
        let limit = limit.filter(|n| *n > 0);
        let started = Instant::now();
        let mut out = Extraction::default();
        let mut url = category_url.to_string();

        loop {
            let loaded = self.load_listing(session, &url).await;
            let listing = match loaded {
                Ok(listing) => listing,
                Err(e) if out.pages == 0 => {
                    return Err(ScoutError::ExtractionFailed {
                        url,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        url = %url,
                        pages = out.pages,
                        items = out.items.len(),
                        error = %e,
                        "pagination stopped; returning partial results"
                    );
                    out.partial = Some(format!("stopped after page {}: {e}", out.pages));
                    break;
                }
            };
            out.pages += 1;

            for item in listing.items {
                if limit.is_some_and(|n| out.items.len() >= n) {
                    break;
                }
                out.items.push(item);
            }
            if limit.is_some_and(|n| out.items.len() >= n) {
                out.limit_reached = true;
                break;
            }

            let Some(next) = listing.next_url else {
                break;
            };
            if out.pages >= self.max_pages {
                out.partial = Some(format!("page cap of {} reached", self.max_pages));
                tracing::warn!(url = %next, max_pages = self.max_pages, "page cap reached");
                break;
            }
            url = next;
        }

        tracing::debug!(
            url = category_url,
            pages = out.pages,
            items = out.items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extraction finished"
        );
        Ok(out)
    }

    async fn load_listing(
        &self,
        session: &mut dyn PageSession,
        url: &str,
    ) -> ScoutResult<ListingPage> {
        session.goto(url, self.nav_timeout).await?;
        session
            .wait_for(&self.selectors.item_card, self.element_timeout)
            .await?;
        let html = session.html().await?;
        let page_url = resolved_url(session, url).await?;
        parse::parse_listing(&html, &page_url, &self.selectors)
    }
}

/// The session's URL after redirects, or the requested URL if unknown.
async fn resolved_url(session: &mut dyn PageSession, requested: &str) -> ScoutResult<Url> {
    let current = session.current_url().await.unwrap_or_default();
    if let Ok(u) = Url::parse(&current) {
        if u.scheme() != "about" {
            return Ok(u);
        }
    }
    Url::parse(requested).map_err(|e| ScoutError::InvalidUrl {
        url: requested.to_string(),
        reason: e.to_string(),
    })
}
