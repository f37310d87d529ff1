//! CatalogScout server — JSON endpoints over the scout engine.

pub mod rest;

use std::sync::Arc;

use catalog_scout::catalog::{CatalogBackend, CatalogService};
use catalog_scout::renderer::chromium::ChromiumSessionFactory;
use catalog_scout::renderer::http::HttpSessionFactory;
use catalog_scout::renderer::SessionFactory;
use catalog_scout::router::{GoalRouter, JsonEndpointFallback};
use catalog_scout::taxonomy::{LiveTaxonomyProvider, TaxonomyCache};
use catalog_scout::{ScoutConfig, ScoutResult};

/// Which page engine serves the browser path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EngineChoice {
    /// Chromium when a binary can be found, plain HTTP otherwise.
    Auto,
    Chromium,
    Http,
}

/// Shared state behind every endpoint.
pub struct AppState {
    pub config: Arc<ScoutConfig>,
    /// Catalog service on the primary engine.
    pub browser: Arc<CatalogService>,
    /// Catalog service on the plain-HTTP engine, selected per request.
    pub plain: Arc<CatalogService>,
    pub router: GoalRouter,
}

impl AppState {
    /// Build the state for `engine`, with the HTTP fallback pointed at
    /// `config.fallback_url` when it is set.
    pub fn build(config: ScoutConfig, engine: EngineChoice) -> ScoutResult<Self> {
        let config = Arc::new(config);
        let plain = HttpSessionFactory::shared(&config)?;

        let primary: Arc<dyn SessionFactory> = match engine {
            EngineChoice::Http => Arc::clone(&plain),
            EngineChoice::Chromium => Arc::new(ChromiumSessionFactory::new(Arc::clone(&config))),
            EngineChoice::Auto => {
                let chromium = ChromiumSessionFactory::new(Arc::clone(&config));
                if chromium.available() {
                    Arc::new(chromium)
                } else {
                    tracing::warn!("Chromium not found; serving the browser path over plain HTTP");
                    Arc::clone(&plain)
                }
            }
        };

        let fallback: Option<Arc<dyn CatalogBackend>> = if config.fallback_url.trim().is_empty() {
            None
        } else {
            Some(Arc::new(JsonEndpointFallback::new(&config)?))
        };

        Self::with_sessions(config, primary, plain, fallback)
    }

    /// Assemble the state from explicit engines. Both services share one
    /// taxonomy cache, filled through the primary engine.
    pub fn with_sessions(
        config: Arc<ScoutConfig>,
        primary: Arc<dyn SessionFactory>,
        plain: Arc<dyn SessionFactory>,
        fallback: Option<Arc<dyn CatalogBackend>>,
    ) -> ScoutResult<Self> {
        let provider = Arc::new(LiveTaxonomyProvider::new(
            Arc::clone(&primary),
            Arc::clone(&config),
        ));
        let taxonomy = Arc::new(TaxonomyCache::new(provider, &config)?);

        let browser = Arc::new(CatalogService::new(
            Arc::clone(&config),
            primary,
            Arc::clone(&taxonomy),
        ));
        let plain = Arc::new(CatalogService::new(Arc::clone(&config), plain, taxonomy));
        let router = GoalRouter::new(
            Arc::clone(&browser) as Arc<dyn CatalogBackend>,
            fallback,
            Arc::clone(&config),
        );

        tracing::info!(
            engine = browser.engine(),
            base_url = %config.base_url,
            "scout state ready"
        );
        Ok(Self {
            config,
            browser,
            plain,
            router,
        })
    }

    /// The service for a request's engine header value.
    pub fn service_for(&self, engine: Option<&str>) -> &Arc<CatalogService> {
        match engine.map(|e| e.trim().to_ascii_lowercase()) {
            Some(e) if e == "http" => &self.plain,
            _ => &self.browser,
        }
    }
}
