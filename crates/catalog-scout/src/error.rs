//! Error types and stable error codes for the scout engine.

/// Machine-readable error codes surfaced in JSON responses.
pub mod error_codes {
    pub const NAVIGATION_TIMEOUT: &str = "E_NAV_TIMEOUT";
    pub const ELEMENT_TIMEOUT: &str = "E_ELEMENT_TIMEOUT";
    pub const NAVIGATION_FAILED: &str = "E_NAVIGATION";
    pub const BROWSER_UNAVAILABLE: &str = "E_BROWSER_UNAVAILABLE";
    pub const BROWSER: &str = "E_BROWSER";
    pub const EXTRACTION_FAILED: &str = "E_EXTRACTION_FAILED";
    pub const INVALID_SELECTOR: &str = "E_INVALID_SELECTOR";
    pub const INVALID_URL: &str = "E_INVALID_URL";
    pub const FALLBACK_FAILED: &str = "E_FALLBACK_FAILED";
    pub const EMPTY_GOAL: &str = "E_EMPTY_GOAL";
    pub const GOAL_TOO_LARGE: &str = "E_GOAL_TOO_LARGE";
    pub const INVALID_GOAL: &str = "E_INVALID_GOAL";
    pub const UNSUPPORTED_INTENT: &str = "E_UNSUPPORTED_INTENT";
    pub const JSON: &str = "E_JSON";
}

/// All errors that can occur in the scout engine.
#[derive(thiserror::Error, Debug)]
pub enum ScoutError {
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("timed out after {timeout_ms}ms waiting for `{selector}`")]
    ElementTimeout { selector: String, timeout_ms: u64 },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("extraction failed for {url}: {source}")]
    ExtractionFailed {
        url: String,
        source: Box<ScoutError>,
    },

    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP fallback failed: {0}")]
    Fallback(String),

    #[error("goal is empty")]
    EmptyGoal,

    #[error("goal payload is {size} bytes, limit is {max} bytes")]
    GoalTooLarge { size: usize, max: usize },

    #[error("invalid goal: {0}")]
    InvalidGoal(String),

    #[error("unsupported intent: {0}")]
    UnsupportedIntent(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScoutError {
    pub fn code(&self) -> &'static str {
        use error_codes::*;
        match self {
            ScoutError::NavigationTimeout { .. } => NAVIGATION_TIMEOUT,
            ScoutError::ElementTimeout { .. } => ELEMENT_TIMEOUT,
            ScoutError::Navigation { .. } => NAVIGATION_FAILED,
            ScoutError::BrowserUnavailable(_) => BROWSER_UNAVAILABLE,
            ScoutError::Browser(_) => BROWSER,
            ScoutError::ExtractionFailed { .. } => EXTRACTION_FAILED,
            ScoutError::InvalidSelector(_) => INVALID_SELECTOR,
            ScoutError::InvalidUrl { .. } => INVALID_URL,
            ScoutError::Fallback(_) => FALLBACK_FAILED,
            ScoutError::EmptyGoal => EMPTY_GOAL,
            ScoutError::GoalTooLarge { .. } => GOAL_TOO_LARGE,
            ScoutError::InvalidGoal(_) => INVALID_GOAL,
            ScoutError::UnsupportedIntent(_) => UNSUPPORTED_INTENT,
            ScoutError::Json(_) => JSON,
        }
    }

    /// Whether the error (or the error it wraps) is a navigation or element timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            ScoutError::NavigationTimeout { .. } | ScoutError::ElementTimeout { .. } => true,
            ScoutError::ExtractionFailed { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Whether the error rejects the goal itself, before any execution.
    pub fn is_goal_rejection(&self) -> bool {
        matches!(
            self,
            ScoutError::EmptyGoal
                | ScoutError::GoalTooLarge { .. }
                | ScoutError::InvalidGoal(_)
                | ScoutError::UnsupportedIntent(_)
        )
    }
}

/// Convenience result type.
pub type ScoutResult<T> = Result<T, ScoutError>;
