//! Page-session abstraction over the engines that load catalog pages.
//!
//! A [`SessionFactory`] opens one fresh [`PageSession`] per invocation; the
//! session is closed at the end of that invocation whatever the outcome.
//! Sessions are never pooled.

pub mod chromium;
pub mod http;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ScoutResult;

/// A single page context that can load URLs and report their HTML.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate to `url`, failing with `NavigationTimeout` past `timeout`.
    async fn goto(&mut self, url: &str, timeout: Duration) -> ScoutResult<()>;
    /// Wait until `selector` matches, failing with `ElementTimeout` past `timeout`.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> ScoutResult<()>;
    /// HTML of the current page.
    async fn html(&mut self) -> ScoutResult<String>;
    /// URL of the current page after redirects.
    async fn current_url(&mut self) -> ScoutResult<String>;
    /// Release the session. Never fails; teardown problems are logged.
    async fn close(self: Box<Self>);
}

/// Opens page sessions for one engine.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> ScoutResult<Box<dyn PageSession>>;
    /// Short engine name for logs and health output.
    fn engine(&self) -> &'static str;
}

/// Close `session` within `teardown`. A session that does not shut down in
/// time is abandoned (dropping it kills the underlying engine).
pub async fn close_session(session: Box<dyn PageSession>, teardown: Duration, engine: &str) {
    if tokio::time::timeout(teardown, session.close()).await.is_err() {
        tracing::warn!(
            engine,
            timeout_ms = teardown.as_millis() as u64,
            "session teardown timed out; abandoning session"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixtureSessionFactory;
    use std::time::Instant;

    #[tokio::test]
    async fn test_close_session_abandons_stuck_teardown() {
        let factory = FixtureSessionFactory::new().with_slow_close(Duration::from_secs(30));
        let session = factory.open().await.unwrap();

        let started = Instant::now();
        close_session(session, Duration::from_millis(50), factory.engine()).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(factory.closed(), 0);
    }

    #[test]
    fn test_close_session_waits_for_prompt_teardown() {
        let factory = FixtureSessionFactory::new();
        tokio_test::block_on(async {
            let session = factory.open().await.unwrap();
            close_session(session, Duration::from_secs(1), factory.engine()).await;
        });
        assert_eq!(factory.closed(), 1);
    }
}
