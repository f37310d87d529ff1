//! HTTP fallback backend: a scout server's JSON endpoints over plain HTTP.
//!
//! Requests carry [`ENGINE_HEADER`] so the server answers them with its
//! plain-HTTP page engine instead of launching a browser.

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::catalog::CatalogBackend;
use crate::config::ScoutConfig;
use crate::error::{ScoutError, ScoutResult};
use crate::normalizer::normalize;
use crate::types::SearchResult;

/// Request header selecting the server's page engine.
pub const ENGINE_HEADER: &str = "x-scout-engine";

/// Calls `search-json` and `categories.json` on a remote scout server.
pub struct JsonEndpointFallback {
    client: reqwest::Client,
    base: Url,
}

impl JsonEndpointFallback {
    pub fn new(config: &ScoutConfig) -> ScoutResult<Self> {
        let base = config.fallback_base()?;
        let client = reqwest::Client::builder()
            .timeout(config.fallback_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ScoutError::Fallback(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> ScoutResult<Url> {
        self.base.join(path).map_err(|e| ScoutError::InvalidUrl {
            url: format!("{}{path}", self.base),
            reason: e.to_string(),
        })
    }

    async fn read_json(response: reqwest::Response) -> ScoutResult<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::Fallback(format!("HTTP {}", status.as_u16())));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ScoutError::Fallback(format!("invalid JSON body: {e}")))
    }
}

#[async_trait]
impl CatalogBackend for JsonEndpointFallback {
    async fn search(&self, query: &str, limit: Option<usize>) -> ScoutResult<SearchResult> {
        let url = self.endpoint("search-json")?;
        let mut body = json!({ "product": query });
        if let Some(limit) = limit {
            body["limit"] = Value::from(limit);
        }

        tracing::debug!(url = %url, query, "calling HTTP fallback");
        let response = self
            .client
            .post(url)
            .header(ENGINE_HEADER, "http")
            .json(&body)
            .send()
            .await
            .map_err(|e| ScoutError::Fallback(e.to_string()))?;

        let raw = Self::read_json(response).await?;
        Ok(normalize(&raw, query).with_meta("via", self.name()))
    }

    async fn categories(&self) -> ScoutResult<Vec<String>> {
        let url = self.endpoint("categories.json")?;
        let response = self
            .client
            .get(url)
            .header(ENGINE_HEADER, "http")
            .send()
            .await
            .map_err(|e| ScoutError::Fallback(e.to_string()))?;

        let raw = Self::read_json(response).await?;
        let names = raw
            .get("categories")
            .and_then(Value::as_array)
            .ok_or_else(|| ScoutError::Fallback("response has no `categories` list".into()))?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        Ok(names)
    }

    fn name(&self) -> &'static str {
        "http_fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchStatus;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fallback(server: &MockServer) -> JsonEndpointFallback {
        let config = ScoutConfig {
            fallback_url: server.uri(),
            ..ScoutConfig::default()
        };
        JsonEndpointFallback::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_search_posts_with_engine_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search-json"))
            .and(header(ENGINE_HEADER, "http"))
            .and(body_json(json!({"product": "travel", "limit": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "category": "Travel",
                "items": [{"title": "It's Only the Himalayas", "price": "£45.17"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = fallback(&server).search("travel", Some(2)).await.unwrap();
        assert_eq!(result.status, SearchStatus::Success);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.meta["via"], "http_fallback");
    }

    #[tokio::test]
    async fn test_legacy_body_is_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"title": "Sapiens", "price": "£54.23"})),
            )
            .mount(&server)
            .await;

        let result = fallback(&server).search("history", None).await.unwrap();
        assert_eq!(result.category, "history");
        assert_eq!(result.items[0].title, "Sapiens");
    }

    #[tokio::test]
    async fn test_server_error_is_fallback_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = fallback(&server).search("travel", None).await.unwrap_err();
        assert!(matches!(err, ScoutError::Fallback(msg) if msg == "HTTP 502"));
    }

    #[tokio::test]
    async fn test_categories() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/categories.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "categories": ["Travel", "Poetry"],
                "count": 2
            })))
            .mount(&server)
            .await;

        let names = fallback(&server).categories().await.unwrap();
        assert_eq!(names, vec!["Travel", "Poetry"]);
    }
}
