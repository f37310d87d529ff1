//! CatalogScout — taxonomy resolution, paginated catalog extraction, and goal routing.
//!
//! The engine resolves a free-text category query against the catalog's taxonomy,
//! drives a page session to the matched section, and extracts `(title, price)`
//! records. The [`router`] layer accepts goals and executes them through the
//! browser path, falling back once to a plain HTTP endpoint.

pub mod catalog;
pub mod config;
pub mod error;
pub mod extractor;
pub mod normalizer;
pub mod parse;
pub mod renderer;
pub mod resolver;
pub mod router;
pub mod similarity;
pub mod taxonomy;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use catalog::{CatalogBackend, CatalogService};
pub use config::{ScoutConfig, SiteSelectors};
pub use error::{ScoutError, ScoutResult};
pub use extractor::{CatalogExtractor, Extraction};
pub use normalizer::normalize;
pub use resolver::{resolve, FUZZY_MATCH_THRESHOLD};
pub use router::{GoalRouter, RunRequest, RunResponse};
pub use taxonomy::{TaxonomyCache, TaxonomyProvider};
pub use types::*;
