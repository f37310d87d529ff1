//! One catalog search end to end: taxonomy, resolution, extraction.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ScoutConfig;
use crate::error::ScoutResult;
use crate::extractor::CatalogExtractor;
use crate::renderer::{close_session, SessionFactory};
use crate::resolver::resolve;
use crate::taxonomy::TaxonomyCache;
use crate::types::{collapse_whitespace, SearchResult, Taxonomy};

/// Message shown with the full section list for a blank query.
pub const LIST_ALL_MESSAGE: &str = "Available categories:";

/// Message shown with the full section list when nothing matched.
pub fn no_match_message(query: &str) -> String {
    format!("No close category match for '{query}'. Pick one of the available categories.")
}

/// A way of answering catalog queries.
///
/// `Err` means the backend could not produce an answer at all. Answers that
/// are not item lists (`choices`) are `Ok`.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn search(&self, query: &str, limit: Option<usize>) -> ScoutResult<SearchResult>;
    async fn categories(&self) -> ScoutResult<Vec<String>>;
    /// Short name for traces and logs.
    fn name(&self) -> &'static str;
}

/// Searches the catalog through page sessions from one engine.
pub struct CatalogService {
    config: Arc<ScoutConfig>,
    sessions: Arc<dyn SessionFactory>,
    taxonomy: Arc<TaxonomyCache>,
    extractor: CatalogExtractor,
}

impl CatalogService {
    pub fn new(
        config: Arc<ScoutConfig>,
        sessions: Arc<dyn SessionFactory>,
        taxonomy: Arc<TaxonomyCache>,
    ) -> Self {
        let extractor = CatalogExtractor::new(&config);
        Self {
            config,
            sessions,
            taxonomy,
            extractor,
        }
    }

    pub fn taxonomy(&self) -> &Arc<TaxonomyCache> {
        &self.taxonomy
    }

    /// Name of the page engine behind this service.
    pub fn engine(&self) -> &'static str {
        self.sessions.engine()
    }

    /// Resolve `query` and extract up to `limit` items from the matched section.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> ScoutResult<SearchResult> {
        let started = Instant::now();
        let query = collapse_whitespace(query);
        let taxonomy = self.taxonomy.get().await;
        let matched = resolve(&query, &taxonomy);

        if matched.list_all {
            return Ok(SearchResult::choices("", taxonomy.names(), LIST_ALL_MESSAGE));
        }
        let (Some(name), Some(url)) = (matched.matched_name.clone(), matched.url.clone()) else {
            tracing::info!(query = %query, "no category match");
            return Ok(no_match(&query, &taxonomy));
        };
        tracing::debug!(
            query = %query,
            category = %name,
            tier = matched.tier.as_str(),
            "category resolved"
        );

        let mut session = self.sessions.open().await?;
        let extracted = self.extractor.extract(session.as_mut(), &url, limit).await;
        close_session(session, self.config.teardown_timeout(), self.engine()).await;
        let extraction = extracted?;

        let mut result = SearchResult::success(name.clone(), extraction.items)
            .with_meta("matched", name.as_str())
            .with_meta("tier", matched.tier.as_str())
            .with_meta("pages", extraction.pages)
            .with_meta("engine", self.engine());
        if let Some(score) = matched.score {
            result = result.with_meta("score", score);
        }
        if extraction.limit_reached {
            result = result.with_meta("limit_reached", true);
        }
        if let Some(note) = extraction.partial {
            result = result.with_meta("partial", true).with_meta("note", note);
        }

        tracing::info!(
            query = %query,
            category = %name,
            items = result.items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search finished"
        );
        Ok(result)
    }
}

fn no_match(query: &str, taxonomy: &Taxonomy) -> SearchResult {
    SearchResult::choices(query, taxonomy.names(), no_match_message(query))
}

#[async_trait]
impl CatalogBackend for CatalogService {
    async fn search(&self, query: &str, limit: Option<usize>) -> ScoutResult<SearchResult> {
        CatalogService::search(self, query, limit).await
    }

    async fn categories(&self) -> ScoutResult<Vec<String>> {
        Ok(self.taxonomy.get().await.names())
    }

    fn name(&self) -> &'static str {
        self.engine()
    }
}
