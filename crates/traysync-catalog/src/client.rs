//! HTTP client for the catalog's paged `produtos` endpoint.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use crate::error::CatalogError;
use crate::retry::FailureClass;

/// Classified outcome of one page request.
///
/// Every HTTP answer the fetch loop knows how to react to is a variant here;
/// anything else is a [`CatalogError`].
#[derive(Debug)]
pub enum PageResponse {
    /// 2xx with a non-empty JSON array.
    Records(Vec<Value>),
    /// 2xx with `[]`.
    Empty,
    /// 429. `retry_after_secs` is the server's hint, if it sent one.
    RateLimited { retry_after_secs: Option<u64> },
    /// 404.
    NotFound,
    /// 503.
    ServiceUnavailable,
    /// 2xx whose body is not JSON, or is JSON but not an array.
    Malformed { reason: String },
}

impl PageResponse {
    /// The failure class for everything except a page of records.
    #[must_use]
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            PageResponse::Records(_) => None,
            PageResponse::Empty => Some(FailureClass::EmptyPage),
            PageResponse::RateLimited { .. } => Some(FailureClass::RateLimited),
            PageResponse::NotFound => Some(FailureClass::NotFound),
            PageResponse::ServiceUnavailable => Some(FailureClass::ServiceUnavailable),
            PageResponse::Malformed { .. } => Some(FailureClass::MalformedResponse),
        }
    }
}

/// Client for `GET {base}/produtos?pagina={n}`.
///
/// Sends `Authorization: Basic {token}` and `Accept: application/json` on
/// every request. Retrying is not done here; see [`crate::PagedFetcher`].
pub struct TrayClient {
    client: Client,
    token: String,
    products_url: Url,
    extra_query: Vec<(String, String)>,
}

impl std::fmt::Debug for TrayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrayClient")
            .field("products_url", &self.products_url.as_str())
            .field("token", &"[redacted]")
            .field("extra_query", &self.extra_query)
            .finish_non_exhaustive()
    }
}

impl TrayClient {
    /// Creates a client with the given request timeout and `User-Agent`.
    ///
    /// `extra_query` pairs are appended after `pagina` on every request, e.g.
    /// to ask the catalog to include stock fields.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::InvalidBaseUrl`] if `base_url` is not an absolute URL.
    /// - [`CatalogError::ClientBuild`] if the `reqwest::Client` cannot be built.
    pub fn new(
        base_url: &str,
        token: &str,
        timeout_secs: u64,
        user_agent: &str,
        extra_query: Vec<(String, String)>,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(CatalogError::ClientBuild)?;

        Ok(Self {
            client,
            token: token.to_owned(),
            products_url: Self::products_url(base_url)?,
            extra_query,
        })
    }

    /// Builds `{base}/produtos`, keeping any path prefix on `base_url`.
    ///
    /// The base is normalised to end in exactly one slash so that joining
    /// appends `produtos` instead of replacing the last path segment.
    fn products_url(base_url: &str) -> Result<Url, CatalogError> {
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let invalid = |reason: String| CatalogError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason,
        };
        let base = Url::parse(&normalised).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("URL cannot be used as a base".to_owned()));
        }
        base.join("produtos").map_err(|e| invalid(e.to_string()))
    }

    /// Full request URL for `page`.
    #[must_use]
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.products_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("pagina", &page.to_string());
            for (k, v) in &self.extra_query {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    /// Fetches and classifies one page.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Http`] on network failure, TLS failure, or timeout.
    /// - [`CatalogError::UnexpectedStatus`] for any status other than 2xx,
    ///   404, 429, and 503.
    pub async fn fetch_page(&self, page: u32) -> Result<PageResponse, CatalogError> {
        let url = self.page_url(page);
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", self.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| CatalogError::Http { page, source })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            return Ok(PageResponse::RateLimited { retry_after_secs });
        }

        if status == StatusCode::NOT_FOUND {
            return Ok(PageResponse::NotFound);
        }

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Ok(PageResponse::ServiceUnavailable);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                page,
                status = status.as_u16(),
                body = %truncate(&body, 500),
                "catalog returned an unexpected status"
            );
            return Err(CatalogError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| CatalogError::Http { page, source })?;

        Ok(classify_body(&body))
    }
}

/// Classifies a 2xx body.
fn classify_body(body: &str) -> PageResponse {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(records)) if records.is_empty() => PageResponse::Empty,
        Ok(Value::Array(records)) => PageResponse::Records(records),
        Ok(other) => PageResponse::Malformed {
            reason: format!("expected a JSON array, got {}", json_kind(&other)),
        },
        Err(e) => PageResponse::Malformed {
            reason: format!("body is not valid JSON: {e}"),
        },
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
