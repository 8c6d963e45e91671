//! HTTP client for catalog crawling with rate limiting and error handling
//!
//! Every request carries the authenticated session's cookie header and user
//! agent and waits on a shared rate limiter first. The jitter between crawl
//! steps lives in the callers; the limiter here is a hard ceiling on
//! request rate regardless of caller behavior.

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client, StatusCode,
    header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT},
};
use std::num::NonZeroU32;
use std::time::Duration;
use url::Url;

use crate::domain::errors::CrawlError;
use crate::infrastructure::config::{CrawlingConfig, amazon_vine};
use crate::infrastructure::session::SessionContext;

/// One listing-page request. `size` is the number of tiles requested;
/// `parent_node`/`child_node` scope the listing to a category/subcategory.
#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub queue: amazon_vine::Queue,
    pub size: u32,
    pub page: u32,
    pub parent_node: Option<String>,
    pub child_node: Option<String>,
}

impl ListingRequest {
    /// Minimal probe request used for taxonomy discovery: one tile of the
    /// broadly available queue.
    pub fn taxonomy_probe() -> Self {
        Self {
            queue: amazon_vine::Queue::AvailableForAll,
            size: 1,
            page: 1,
            parent_node: None,
            child_node: None,
        }
    }

    /// The same probe scoped to one parent node, for subcategory discovery.
    pub fn subcategory_probe(parent_node: &str) -> Self {
        Self {
            parent_node: Some(parent_node.to_string()),
            ..Self::taxonomy_probe()
        }
    }
}

/// A fetched listing page together with the exact URL used to request it,
/// which doubles as the referer for follow-up detail requests.
#[derive(Debug, Clone)]
pub struct VinePage {
    pub url: String,
    pub html: String,
}

/// The remote catalog as the sync engine sees it.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch_listing(&self, request: &ListingRequest) -> Result<VinePage, CrawlError>;

    async fn fetch_item_detail(
        &self,
        item_id: &str,
        asin: &str,
        referer: Option<&str>,
    ) -> Result<serde_json::Value, CrawlError>;
}

/// Rate-limited HTTP client bound to one authenticated session.
pub struct VineClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl VineClient {
    /// Build a client from the authenticated session context. The cookie
    /// header and user agent become default headers on every request.
    pub fn new(session: &SessionContext, config: &CrawlingConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&session.user_agent).context("Invalid user agent")?,
        );
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&session.cookie_header).context("Invalid cookie header")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    fn listing_url(request: &ListingRequest) -> Result<Url, CrawlError> {
        let mut url = Url::parse(amazon_vine::CATALOG_URL)
            .map_err(|e| CrawlError::Parse(format!("invalid catalog URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("queue", request.queue.as_str());
            query.append_pair("size", &request.size.to_string());
            query.append_pair("page", &request.page.to_string());
            if let Some(parent_node) = &request.parent_node {
                query.append_pair("pn", parent_node);
            }
            if let Some(child_node) = &request.child_node {
                query.append_pair("cn", child_node);
            }
        }
        Ok(url)
    }

    fn detail_url(item_id: &str, asin: &str) -> Result<Url, CrawlError> {
        let mut url = Url::parse(amazon_vine::RECOMMENDATIONS_URL)
            .map_err(|e| CrawlError::Parse(format!("invalid recommendations URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| CrawlError::Parse("recommendations URL cannot be a base".to_string()))?
            .push(item_id)
            .push("item")
            .push(asin);
        Ok(url)
    }
}

#[async_trait]
impl CatalogClient for VineClient {
    async fn fetch_listing(&self, request: &ListingRequest) -> Result<VinePage, CrawlError> {
        let url = Self::listing_url(request)?;
        self.rate_limiter.until_ready().await;

        tracing::info!(%url, "fetching listing page");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CrawlError::Network(format!("failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(CrawlError::Network(format!(
                "listing request failed with status {}: {url}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| CrawlError::Network(format!("failed to read body from {url}: {e}")))?;
        tracing::debug!(%url, bytes = html.len(), "fetched listing page");

        Ok(VinePage {
            url: url.to_string(),
            html,
        })
    }

    async fn fetch_item_detail(
        &self,
        item_id: &str,
        asin: &str,
        referer: Option<&str>,
    ) -> Result<serde_json::Value, CrawlError> {
        let url = Self::detail_url(item_id, asin)?;
        self.rate_limiter.until_ready().await;

        tracing::info!(%url, "fetching item detail");
        let mut request = self
            .client
            .get(url.clone())
            .header("pragma", "no-cache")
            .header("cache-control", "no-cache")
            .header("accept", "*/*")
            .header("sec-fetch-dest", "empty")
            .header("sec-fetch-mode", "cors")
            .header("sec-fetch-site", "same-origin");
        if let Some(referer) = referer {
            request = request.header("referer", referer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CrawlError::Network(format!("failed to fetch {url}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::Network(format!("failed to read body from {url}: {e}")))?;

        decode_detail_payload(status, &body)
    }
}

/// Decode a recommendations-detail response into its `result` payload.
///
/// Split from the transport so the three failure kinds are testable
/// without a server: non-success status, explicit remote error field, and
/// missing/null result field.
pub fn decode_detail_payload(
    status: StatusCode,
    body: &str,
) -> Result<serde_json::Value, CrawlError> {
    if !status.is_success() {
        return Err(CrawlError::Network(format!(
            "detail request failed with status {status}"
        )));
    }

    let payload: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| CrawlError::Parse(format!("detail payload is not valid JSON: {e}")))?;

    match payload.get("error") {
        Some(error) if !error.is_null() => {
            return Err(CrawlError::Api(error.to_string()));
        }
        _ => {}
    }

    match payload.get("result") {
        Some(result) if !result.is_null() => Ok(result.clone()),
        _ => Err(CrawlError::EmptyResult(
            "no result set in detail payload".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn session() -> SessionContext {
        SessionContext {
            cookie_header: "session-id=abc".to_string(),
            user_agent: "Mozilla/5.0 (test)".to_string(),
        }
    }

    #[test]
    fn client_creation_succeeds_with_default_config() {
        let client = VineClient::new(&session(), &CrawlingConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn listing_url_carries_scope_parameters() {
        let request = ListingRequest {
            queue: amazon_vine::Queue::AvailableForAll,
            size: 42,
            page: 2,
            parent_node: Some("P1".to_string()),
            child_node: Some("C1".to_string()),
        };
        let url = VineClient::listing_url(&request).unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("queue=last_chance"));
        assert!(query.contains("size=42"));
        assert!(query.contains("page=2"));
        assert!(query.contains("pn=P1"));
        assert!(query.contains("cn=C1"));
    }

    #[test]
    fn probe_requests_ask_for_a_single_tile() {
        let url = VineClient::listing_url(&ListingRequest::subcategory_probe("P9")).unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("size=1"));
        assert!(query.contains("page=1"));
        assert!(query.contains("pn=P9"));
        assert!(!query.contains("cn="));
    }

    #[test]
    fn detail_url_escapes_the_composite_identifier() {
        let url = VineClient::detail_url("a#q#A1#x", "A1").unwrap();
        assert!(url.as_str().contains("a%23q%23A1%23x/item/A1"));
    }

    #[test]
    fn not_found_status_is_a_network_error() {
        let err = decode_detail_payload(StatusCode::NOT_FOUND, "").unwrap_err();
        assert!(matches!(err, CrawlError::Network(_)));
    }

    #[test]
    fn remote_error_field_is_an_api_error() {
        let err = decode_detail_payload(
            StatusCode::OK,
            r#"{"error": {"code": "THROTTLED"}, "result": null}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CrawlError::Api(_)));
    }

    #[rstest]
    #[case(r#"{"error": null, "result": null}"#)]
    #[case(r#"{"error": null}"#)]
    fn missing_result_is_an_empty_result_error(#[case] body: &str) {
        let err = decode_detail_payload(StatusCode::OK, body).unwrap_err();
        assert!(matches!(err, CrawlError::EmptyResult(_)));
    }

    #[test]
    fn well_formed_payload_yields_the_result_value() {
        let result = decode_detail_payload(
            StatusCode::OK,
            r#"{"error": null, "result": {"asin": "A1", "taxValue": 12.5}}"#,
        )
        .unwrap();
        assert_eq!(result["asin"], "A1");
    }

    #[test]
    fn garbage_body_is_a_parse_error() {
        let err = decode_detail_payload(StatusCode::OK, "<html>throttled</html>").unwrap_err();
        assert!(matches!(err, CrawlError::Parse(_)));
    }
}
