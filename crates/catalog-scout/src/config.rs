//! Configuration loading and resolution.
//!
//! A [`ScoutConfig`] is built once (defaults, then `SCOUT_*` environment
//! overrides, then CLI flags) and handed to each component at construction.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{ScoutError, ScoutResult};

pub const DEFAULT_BASE_URL: &str = "https://books.toscrape.com/";
pub const DEFAULT_USER_AGENT: &str =
    "CatalogScout/0.1 (+https://github.com/agentralabs/catalog-scout)";
pub const DEFAULT_FALLBACK_URL: &str = "http://127.0.0.1:5001/";

/// CSS selectors describing the target site's markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSelectors {
    /// Links in the category navigation list.
    pub category_links: String,
    /// Container that must be present before the taxonomy is read.
    pub category_nav: String,
    /// One item card in the catalog grid.
    pub item_card: String,
    /// Title anchor, relative to an item card.
    pub item_title: String,
    /// Price element, relative to an item card.
    pub item_price: String,
    /// The "next page" link.
    pub next_page: String,
    /// Name of the synthetic root category that is not a real section.
    pub root_category: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            category_links: ".side_categories a".to_string(),
            category_nav: ".side_categories".to_string(),
            item_card: ".product_pod".to_string(),
            item_title: "h3 a".to_string(),
            item_price: ".price_color".to_string(),
            next_page: "li.next a".to_string(),
            root_category: "Books".to_string(),
        }
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub base_url: String,
    pub user_agent: String,
    pub nav_timeout_ms: u64,
    pub element_timeout_ms: u64,
    pub launch_timeout_ms: u64,
    pub teardown_timeout_ms: u64,
    /// Safety ceiling on pagination.
    pub max_pages: usize,
    pub taxonomy_ttl_secs: u64,
    /// Upper bound for a goal's step budget.
    pub max_steps: u32,
    /// Upper bound for the serialized goal payload.
    pub max_goal_bytes: usize,
    /// Base URL of the JSON endpoints used by the HTTP fallback path.
    pub fallback_url: String,
    pub fallback_timeout_ms: u64,
    /// Explicit Chromium binary. Auto-detected when absent.
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    pub selectors: SiteSelectors,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            nav_timeout_ms: 5_000,
            element_timeout_ms: 3_000,
            launch_timeout_ms: 15_000,
            teardown_timeout_ms: 5_000,
            max_pages: 50,
            taxonomy_ttl_secs: 600,
            max_steps: 3,
            max_goal_bytes: 1024,
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            fallback_timeout_ms: 30_000,
            chromium_path: None,
            headless: true,
            selectors: SiteSelectors::default(),
        }
    }
}

impl ScoutConfig {
    /// Defaults overridden by `SCOUT_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from an environment lookup. Unparseable values are
    /// logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SCOUT_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("SCOUT_USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(v) = lookup("SCOUT_FALLBACK_URL") {
            self.fallback_url = v;
        }
        if let Some(v) = lookup("SCOUT_CHROMIUM_PATH") {
            self.chromium_path = Some(PathBuf::from(v));
        }
        env_parse(&lookup, "SCOUT_NAV_TIMEOUT_MS", &mut self.nav_timeout_ms);
        env_parse(&lookup, "SCOUT_ELEMENT_TIMEOUT_MS", &mut self.element_timeout_ms);
        env_parse(&lookup, "SCOUT_LAUNCH_TIMEOUT_MS", &mut self.launch_timeout_ms);
        env_parse(&lookup, "SCOUT_TEARDOWN_TIMEOUT_MS", &mut self.teardown_timeout_ms);
        env_parse(&lookup, "SCOUT_MAX_PAGES", &mut self.max_pages);
        env_parse(&lookup, "SCOUT_TAXONOMY_TTL_SECS", &mut self.taxonomy_ttl_secs);
        env_parse(&lookup, "SCOUT_MAX_STEPS", &mut self.max_steps);
        env_parse(&lookup, "SCOUT_MAX_GOAL_BYTES", &mut self.max_goal_bytes);
        env_parse(&lookup, "SCOUT_FALLBACK_TIMEOUT_MS", &mut self.fallback_timeout_ms);
        env_parse(&lookup, "SCOUT_HEADLESS", &mut self.headless);
    }

    /// The catalog root as a parsed URL.
    pub fn base(&self) -> ScoutResult<Url> {
        parse_url(&self.base_url)
    }

    /// The fallback endpoint root as a parsed URL.
    pub fn fallback_base(&self) -> ScoutResult<Url> {
        parse_url(&self.fallback_url)
    }

    pub fn nav_timeout(&self) -> Duration {
        Duration::from_millis(self.nav_timeout_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }

    pub fn taxonomy_ttl(&self) -> Duration {
        Duration::from_secs(self.taxonomy_ttl_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }
}

fn env_parse<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable config value"),
        }
    }
}

/// Parse a URL, giving a bare host/path base a trailing slash so relative
/// joins stay under it.
pub fn parse_url(raw: &str) -> ScoutResult<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') || trimmed.contains('?') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|e| ScoutError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}
