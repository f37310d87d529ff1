//! Plain-HTTP page sessions wrapping reqwest.
//!
//! Not a browser — pages are fetched as served, with no script execution.
//! Enough for server-rendered catalogs and for hosts without Chromium.
//! Retries once on 5xx with backoff, inside the navigation budget.

use super::{PageSession, SessionFactory};
use crate::config::ScoutConfig;
use crate::error::{ScoutError, ScoutResult};
use crate::parse;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const MAX_RETRIES: u32 = 1;

/// Opens sessions that fetch pages with a shared reqwest client.
#[derive(Clone)]
pub struct HttpSessionFactory {
    client: reqwest::Client,
}

impl HttpSessionFactory {
    pub fn new(config: &ScoutConfig) -> ScoutResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ScoutError::Browser(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Convenience constructor for an `Arc<dyn SessionFactory>`.
    pub fn shared(config: &ScoutConfig) -> ScoutResult<Arc<dyn SessionFactory>> {
        Ok(Arc::new(Self::new(config)?))
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self) -> ScoutResult<Box<dyn PageSession>> {
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            url: None,
            body: String::new(),
        }))
    }

    fn engine(&self) -> &'static str {
        "http"
    }
}

/// Holds the most recently fetched page.
pub struct HttpSession {
    client: reqwest::Client,
    url: Option<String>,
    body: String,
}

impl HttpSession {
    async fn fetch(&self, url: &str) -> Result<(String, String), String> {
        let mut retries = 0u32;

        loop {
            match self.client.get(url).send().await {
                Ok(r) => {
                    let status = r.status();

                    if status.is_server_error() && retries < MAX_RETRIES {
                        retries += 1;
                        let delay = Duration::from_millis(250 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    if !status.is_success() {
                        return Err(format!("HTTP {}", status.as_u16()));
                    }

                    let final_url = r.url().to_string();
                    let body = r.text().await.map_err(|e| e.to_string())?;
                    return Ok((final_url, body));
                }
                Err(e) => {
                    if retries < MAX_RETRIES && (e.is_connect() || e.is_request()) {
                        retries += 1;
                        let delay = Duration::from_millis(250 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(e.to_string());
                }
            }
        }
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> ScoutResult<()> {
        match tokio::time::timeout(timeout, self.fetch(url)).await {
            Ok(Ok((final_url, body))) => {
                tracing::debug!(url, bytes = body.len(), "page fetched");
                self.url = Some(final_url);
                self.body = body;
                Ok(())
            }
            Ok(Err(reason)) => Err(ScoutError::Navigation {
                url: url.to_string(),
                reason,
            }),
            Err(_) => Err(ScoutError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// A fetched page never changes, so a missing selector is reported at once.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> ScoutResult<()> {
        if self.url.is_some() && parse::has_selector(&self.body, selector)? {
            return Ok(());
        }
        Err(ScoutError::ElementTimeout {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    async fn html(&mut self) -> ScoutResult<String> {
        Ok(self.body.clone())
    }

    async fn current_url(&mut self) -> ScoutResult<String> {
        Ok(self.url.clone().unwrap_or_default())
    }

    async fn close(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_and_wait() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<div class='side_categories'><a href='x'>X</a></div>"),
            )
            .mount(&server)
            .await;

        let factory = HttpSessionFactory::new(&ScoutConfig::default()).unwrap();
        let mut session = factory.open().await.unwrap();
        let url = format!("{}/index.html", server.uri());

        session.goto(&url, Duration::from_secs(5)).await.unwrap();
        session
            .wait_for(".side_categories", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(session.html().await.unwrap().contains("side_categories"));
        assert_eq!(session.current_url().await.unwrap(), url);

        let err = session
            .wait_for(".product_pod", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::ElementTimeout { .. }));
        session.close().await;
    }

    #[tokio::test]
    async fn test_slow_page_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let factory = HttpSessionFactory::new(&ScoutConfig::default()).unwrap();
        let mut session = factory.open().await.unwrap();
        let err = session
            .goto(&server.uri(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::NavigationTimeout { .. }));
    }

    #[tokio::test]
    async fn test_not_found_is_navigation_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let factory = HttpSessionFactory::new(&ScoutConfig::default()).unwrap();
        let mut session = factory.open().await.unwrap();
        let err = session
            .goto(&server.uri(), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            ScoutError::Navigation { reason, .. } => assert_eq!(reason, "HTTP 404"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
