//! Catalog taxonomy fetching and caching.
//!
//! The cache hands out `Arc<Taxonomy>` snapshots and swaps in a new one on
//! refresh without locking readers. It never hands out an empty taxonomy:
//! when a refresh fails it serves the last good snapshot, or a built-in list
//! of sections if there never was one.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::ScoutConfig;
use crate::error::{ScoutError, ScoutResult};
use crate::parse;
use crate::renderer::{close_session, PageSession, SessionFactory};
use crate::types::{Taxonomy, TaxonomyEntry};

/// Upper bound on how long a failed refresh suppresses the next attempt.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Sections of the default catalog, relative to its root.
const BUILTIN_SECTIONS: &[(&str, &str)] = &[
    ("Travel", "catalogue/category/books/travel_2/index.html"),
    ("Mystery", "catalogue/category/books/mystery_3/index.html"),
    ("Historical Fiction", "catalogue/category/books/historical-fiction_4/index.html"),
    ("Sequential Art", "catalogue/category/books/sequential-art_5/index.html"),
    ("Classics", "catalogue/category/books/classics_6/index.html"),
    ("Philosophy", "catalogue/category/books/philosophy_7/index.html"),
    ("Romance", "catalogue/category/books/romance_8/index.html"),
    ("Womens Fiction", "catalogue/category/books/womens-fiction_9/index.html"),
    ("Fiction", "catalogue/category/books/fiction_10/index.html"),
    ("Childrens", "catalogue/category/books/childrens_11/index.html"),
    ("Religion", "catalogue/category/books/religion_12/index.html"),
    ("Nonfiction", "catalogue/category/books/nonfiction_13/index.html"),
    ("Music", "catalogue/category/books/music_14/index.html"),
    ("Default", "catalogue/category/books/default_15/index.html"),
    ("Science Fiction", "catalogue/category/books/science-fiction_16/index.html"),
    ("Sports and Games", "catalogue/category/books/sports-and-games_17/index.html"),
    ("Add a comment", "catalogue/category/books/add-a-comment_18/index.html"),
    ("Fantasy", "catalogue/category/books/fantasy_19/index.html"),
    ("New Adult", "catalogue/category/books/new-adult_20/index.html"),
    ("Young Adult", "catalogue/category/books/young-adult_21/index.html"),
    ("Science", "catalogue/category/books/science_22/index.html"),
    ("Poetry", "catalogue/category/books/poetry_23/index.html"),
    ("Paranormal", "catalogue/category/books/paranormal_24/index.html"),
    ("Art", "catalogue/category/books/art_25/index.html"),
    ("Psychology", "catalogue/category/books/psychology_26/index.html"),
    ("Autobiography", "catalogue/category/books/autobiography_27/index.html"),
    ("Parenting", "catalogue/category/books/parenting_28/index.html"),
    ("Adult Fiction", "catalogue/category/books/adult-fiction_29/index.html"),
    ("Humor", "catalogue/category/books/humor_30/index.html"),
    ("Horror", "catalogue/category/books/horror_31/index.html"),
    ("History", "catalogue/category/books/history_32/index.html"),
    ("Food and Drink", "catalogue/category/books/food-and-drink_33/index.html"),
    ("Christian Fiction", "catalogue/category/books/christian-fiction_34/index.html"),
    ("Business", "catalogue/category/books/business_35/index.html"),
    ("Biography", "catalogue/category/books/biography_36/index.html"),
    ("Thriller", "catalogue/category/books/thriller_37/index.html"),
    ("Contemporary", "catalogue/category/books/contemporary_38/index.html"),
    ("Spirituality", "catalogue/category/books/spirituality_39/index.html"),
    ("Academic", "catalogue/category/books/academic_40/index.html"),
    ("Self Help", "catalogue/category/books/self-help_41/index.html"),
    ("Historical", "catalogue/category/books/historical_42/index.html"),
    ("Christian", "catalogue/category/books/christian_43/index.html"),
    ("Suspense", "catalogue/category/books/suspense_44/index.html"),
    ("Short Stories", "catalogue/category/books/short-stories_45/index.html"),
    ("Novels", "catalogue/category/books/novels_46/index.html"),
    ("Health", "catalogue/category/books/health_47/index.html"),
    ("Politics", "catalogue/category/books/politics_48/index.html"),
    ("Cultural", "catalogue/category/books/cultural_49/index.html"),
    ("Erotica", "catalogue/category/books/erotica_50/index.html"),
    ("Crime", "catalogue/category/books/crime_51/index.html"),
];

/// The built-in section list with URLs resolved against `base`.
pub fn fallback_taxonomy(base: &Url, root_category: &str) -> Taxonomy {
    let entries = BUILTIN_SECTIONS.iter().filter_map(|(name, path)| {
        let url = base.join(path).ok()?;
        Some(TaxonomyEntry {
            name: name.to_string(),
            url: url.to_string(),
        })
    });
    Taxonomy::from_entries(entries, root_category)
}

/// Source of taxonomy data.
#[async_trait]
pub trait TaxonomyProvider: Send + Sync {
    async fn fetch(&self) -> ScoutResult<Taxonomy>;
}

/// Provider that always returns a fixed taxonomy.
pub struct StaticTaxonomyProvider {
    taxonomy: Taxonomy,
}

impl StaticTaxonomyProvider {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self { taxonomy }
    }

    /// The built-in section list for the configured catalog.
    pub fn builtin(config: &ScoutConfig) -> ScoutResult<Self> {
        let base = config.base()?;
        Ok(Self::new(fallback_taxonomy(
            &base,
            &config.selectors.root_category,
        )))
    }
}

#[async_trait]
impl TaxonomyProvider for StaticTaxonomyProvider {
    async fn fetch(&self) -> ScoutResult<Taxonomy> {
        Ok(self.taxonomy.clone())
    }
}

/// Reads the category navigation from the live site root.
pub struct LiveTaxonomyProvider {
    sessions: Arc<dyn SessionFactory>,
    config: Arc<ScoutConfig>,
}

impl LiveTaxonomyProvider {
    pub fn new(sessions: Arc<dyn SessionFactory>, config: Arc<ScoutConfig>) -> Self {
        Self { sessions, config }
    }

    async fn read(&self, session: &mut dyn PageSession, base: &Url) -> ScoutResult<Taxonomy> {
        let selectors = &self.config.selectors;
        session.goto(base.as_str(), self.config.nav_timeout()).await?;
        session
            .wait_for(&selectors.category_nav, self.config.element_timeout())
            .await?;
        let html = session.html().await?;
        let raw = parse::parse_categories(&html, base, selectors)?;
        Ok(Taxonomy::from_entries(raw, &selectors.root_category))
    }
}

#[async_trait]
impl TaxonomyProvider for LiveTaxonomyProvider {
    async fn fetch(&self) -> ScoutResult<Taxonomy> {
        let base = self.config.base()?;
        let started = Instant::now();
        let mut session = self.sessions.open().await?;
        let result = self.read(session.as_mut(), &base).await;
        close_session(
            session,
            self.config.teardown_timeout(),
            self.sessions.engine(),
        )
        .await;

        let taxonomy = result?;
        tracing::debug!(
            url = %base,
            entries = taxonomy.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "taxonomy fetched"
        );
        Ok(taxonomy)
    }
}

/// Where the currently served snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomySource {
    /// Fetched from the site and still within its TTL.
    Live,
    /// A previously fetched snapshot kept after a failed refresh.
    Stale,
    /// The built-in list.
    Fallback,
}

/// Summary of the cache for health output.
#[derive(Debug, Clone, Serialize)]
pub struct TaxonomyStatus {
    pub source: TaxonomySource,
    pub entries: usize,
    pub age_secs: u64,
}

struct Snapshot {
    taxonomy: Arc<Taxonomy>,
    source: TaxonomySource,
    fetched_at: Instant,
    expires_at: Instant,
}

/// TTL cache in front of a [`TaxonomyProvider`].
pub struct TaxonomyCache {
    provider: Arc<dyn TaxonomyProvider>,
    fallback: Arc<Taxonomy>,
    ttl: Duration,
    current: ArcSwapOption<Snapshot>,
}

impl TaxonomyCache {
    /// A cache over `provider` using the configured TTL and the built-in
    /// section list as last resort.
    pub fn new(provider: Arc<dyn TaxonomyProvider>, config: &ScoutConfig) -> ScoutResult<Self> {
        let base = config.base()?;
        let fallback = fallback_taxonomy(&base, &config.selectors.root_category);
        Ok(Self::with_fallback(provider, fallback, config.taxonomy_ttl()))
    }

    pub fn with_fallback(
        provider: Arc<dyn TaxonomyProvider>,
        fallback: Taxonomy,
        ttl: Duration,
    ) -> Self {
        Self {
            provider,
            fallback: Arc::new(fallback),
            ttl,
            current: ArcSwapOption::empty(),
        }
    }

    /// The current taxonomy, refreshing it first when missing or expired.
    ///
    /// Never fails and never returns an empty taxonomy.
    pub async fn get(&self) -> Arc<Taxonomy> {
        let previous = self.current.load_full();
        if let Some(snap) = &previous {
            if Instant::now() < snap.expires_at {
                return Arc::clone(&snap.taxonomy);
            }
        }

        let failure = match self.provider.fetch().await {
            Ok(taxonomy) if !taxonomy.is_empty() => {
                let now = Instant::now();
                let taxonomy = Arc::new(taxonomy);
                tracing::debug!(entries = taxonomy.len(), "taxonomy refreshed");
                self.current.store(Some(Arc::new(Snapshot {
                    taxonomy: Arc::clone(&taxonomy),
                    source: TaxonomySource::Live,
                    fetched_at: now,
                    expires_at: now + self.ttl,
                })));
                return taxonomy;
            }
            Ok(_) => ScoutError::Browser("category navigation was empty".to_string()),
            Err(e) => e,
        };

        let now = Instant::now();
        let retry_at = now + self.ttl.min(MAX_RETRY_BACKOFF);
        let snapshot = match previous {
            Some(prev) if prev.source != TaxonomySource::Fallback => Snapshot {
                taxonomy: Arc::clone(&prev.taxonomy),
                source: TaxonomySource::Stale,
                fetched_at: prev.fetched_at,
                expires_at: retry_at,
            },
            _ => Snapshot {
                taxonomy: Arc::clone(&self.fallback),
                source: TaxonomySource::Fallback,
                fetched_at: now,
                expires_at: retry_at,
            },
        };
        tracing::warn!(
            error = %failure,
            source = ?snapshot.source,
            entries = snapshot.taxonomy.len(),
            "taxonomy refresh failed; serving cached sections"
        );

        let taxonomy = Arc::clone(&snapshot.taxonomy);
        self.current.store(Some(Arc::new(snapshot)));
        taxonomy
    }

    /// Force the next [`get`](Self::get) to refetch.
    pub fn invalidate(&self) {
        if let Some(snap) = self.current.load_full() {
            self.current.store(Some(Arc::new(Snapshot {
                taxonomy: Arc::clone(&snap.taxonomy),
                source: snap.source,
                fetched_at: snap.fetched_at,
                expires_at: Instant::now(),
            })));
        }
    }

    /// Source and age of the served snapshot, `None` before the first load.
    pub fn status(&self) -> Option<TaxonomyStatus> {
        self.current.load_full().map(|snap| TaxonomyStatus {
            source: snap.source,
            entries: snap.taxonomy.len(),
            age_secs: snap.fetched_at.elapsed().as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{home_page, FixtureSessionFactory};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted outcomes, then keeps failing.
    struct ScriptedProvider {
        outcomes: Mutex<VecDeque<ScoutResult<Taxonomy>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(outcomes: Vec<ScoutResult<Taxonomy>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaxonomyProvider for ScriptedProvider {
        async fn fetch(&self) -> ScoutResult<Taxonomy> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ScoutError::BrowserUnavailable("gone".into())))
        }
    }

    fn small(names: &[&str]) -> Taxonomy {
        Taxonomy::from_entries(
            names.iter().map(|n| TaxonomyEntry {
                name: n.to_string(),
                url: format!("https://shop.test/{n}"),
            }),
            "Books",
        )
    }

    fn cache(provider: Arc<ScriptedProvider>, ttl: Duration) -> TaxonomyCache {
        let base = Url::parse("https://shop.test/").unwrap();
        TaxonomyCache::with_fallback(provider, fallback_taxonomy(&base, "Books"), ttl)
    }

    #[tokio::test]
    async fn test_fetch_failure_serves_builtin_list() {
        let provider = ScriptedProvider::new(vec![]);
        let cache = cache(Arc::clone(&provider), Duration::from_secs(600));

        let tax = cache.get().await;
        assert!(tax.len() >= 10);
        assert!(tax.iter().all(|e| e.url.starts_with("https://shop.test/catalogue/")));
        assert!(tax.get("Travel").is_some());
        assert_eq!(cache.status().unwrap().source, TaxonomySource::Fallback);
    }

    #[test]
    fn test_builtin_list_covers_live_sections() {
        let base = Url::parse("https://books.toscrape.com/").unwrap();
        let tax = fallback_taxonomy(&base, "Books");
        assert_eq!(tax.len(), 50);
        assert_eq!(
            tax.get("Health").map(|e| e.url.as_str()),
            Some("https://books.toscrape.com/catalogue/category/books/health_47/index.html")
        );
        assert!(tax.get("Crime").is_some());
    }

    #[tokio::test]
    async fn test_failure_backoff_avoids_refetch() {
        let provider = ScriptedProvider::new(vec![]);
        let cache = cache(Arc::clone(&provider), Duration::from_secs(600));

        cache.get().await;
        cache.get().await;
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_live_result_is_cached() {
        let provider = ScriptedProvider::new(vec![Ok(small(&["Travel", "Poetry"]))]);
        let cache = cache(Arc::clone(&provider), Duration::from_secs(600));

        assert_eq!(cache.get().await.names(), vec!["Travel", "Poetry"]);
        assert_eq!(cache.get().await.names(), vec!["Travel", "Poetry"]);
        assert_eq!(provider.calls(), 1);
        assert_eq!(cache.status().unwrap().source, TaxonomySource::Live);
    }

    #[tokio::test]
    async fn test_expired_refresh_failure_keeps_last_good() {
        let provider = ScriptedProvider::new(vec![Ok(small(&["Travel"]))]);
        let cache = cache(Arc::clone(&provider), Duration::ZERO);

        assert_eq!(cache.get().await.names(), vec!["Travel"]);
        assert_eq!(cache.get().await.names(), vec!["Travel"]);
        assert_eq!(provider.calls(), 2);
        assert_eq!(cache.status().unwrap().source, TaxonomySource::Stale);
    }

    #[tokio::test]
    async fn test_empty_fetch_is_a_failure() {
        let provider = ScriptedProvider::new(vec![Ok(Taxonomy::default())]);
        let cache = cache(Arc::clone(&provider), Duration::from_secs(600));

        assert!(!cache.get().await.is_empty());
        assert_eq!(cache.status().unwrap().source, TaxonomySource::Fallback);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let provider = ScriptedProvider::new(vec![
            Ok(small(&["Travel"])),
            Ok(small(&["Travel", "Poetry"])),
        ]);
        let cache = cache(Arc::clone(&provider), Duration::from_secs(600));

        assert_eq!(cache.get().await.len(), 1);
        cache.invalidate();
        assert_eq!(cache.get().await.len(), 2);
        assert_eq!(provider.calls(), 2);
    }

    fn live_config() -> Arc<ScoutConfig> {
        Arc::new(ScoutConfig {
            base_url: "https://shop.test/".to_string(),
            ..ScoutConfig::default()
        })
    }

    #[tokio::test]
    async fn test_live_provider_reads_navigation() {
        let factory = FixtureSessionFactory::new().with_html(
            "https://shop.test/",
            home_page(&[
                ("Travel", "catalogue/category/books/travel_2/index.html"),
                ("Mystery", "catalogue/category/books/mystery_3/index.html"),
                ("Travel", "catalogue/category/books/travel_99/index.html"),
            ]),
        );
        let provider = LiveTaxonomyProvider::new(Arc::new(factory.clone()), live_config());

        let tax = provider.fetch().await.unwrap();
        assert_eq!(tax.names(), vec!["Travel", "Mystery"]);
        assert_eq!(
            tax.get("travel").unwrap().url,
            "https://shop.test/catalogue/category/books/travel_2/index.html"
        );
        assert_eq!(factory.opened(), 1);
        assert_eq!(factory.closed(), 1);
    }

    #[tokio::test]
    async fn test_live_provider_closes_session_on_failure() {
        let factory = FixtureSessionFactory::new()
            .with_html("https://shop.test/", "<html><body>down for maintenance</body></html>");
        let provider = LiveTaxonomyProvider::new(Arc::new(factory.clone()), live_config());

        let err = provider.fetch().await.unwrap_err();
        assert!(matches!(err, ScoutError::ElementTimeout { .. }));
        assert_eq!(factory.closed(), 1);
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTaxonomyProvider::builtin(&ScoutConfig::default()).unwrap();
        let tax = provider.fetch().await.unwrap();
        assert!(tax.len() >= 10);
        assert!(tax.get("Books").is_none());
    }
}
