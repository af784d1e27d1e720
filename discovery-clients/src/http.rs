//! Shared HTTP plumbing for upstream sources.

use discovery_shared::SourceEndpoint;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::auth::Authenticator;
use crate::errors::ClientError;
use crate::retry::RetryPolicy;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Hard stop on pagination, in case an upstream loops its `next` links.
const MAX_PAGES: usize = 10_000;

/// Authenticated JSON client bound to one upstream base URL.
pub struct ApiClient {
    base_url: String,
    http: Client,
    auth: Authenticator,
    retry: RetryPolicy,
    page_size: usize,
}

impl ApiClient {
    pub fn new(endpoint: &SourceEndpoint) -> Result<Self, ClientError> {
        Self::with_options(endpoint, DEFAULT_TIMEOUT, RetryPolicy::default())
    }

    pub fn with_options(
        endpoint: &SourceEndpoint,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ClientError> {
        if endpoint.url.trim().is_empty() {
            return Err(ClientError::configuration("endpoint url is empty"));
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: endpoint.url.trim_end_matches('/').to_string(),
            http,
            auth: Authenticator::new(endpoint.auth.clone()),
            retry,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let request = self.auth.apply(&self.http, request).await?;
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.auth.invalidate().await;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sends a request, retrying transient failures per the retry policy.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        RetryIf::spawn(
            self.retry.strategy(),
            || {
                let method = method.clone();
                async move {
                    self.send_once(method, url, body).await.inspect_err(|e| {
                        if e.is_transient() {
                            warn!(url, error = %e, "Transient upstream failure, retrying");
                        }
                    })
                }
            },
            |e: &ClientError| e.is_transient(),
        )
        .await
    }

    pub async fn get_json(&self, url: &str) -> Result<Value, ClientError> {
        self.send(Method::GET, url, None).await
    }

    pub async fn post_json<B: Serialize>(&self, url: &str, body: &B) -> Result<Value, ClientError> {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, url, Some(&body)).await
    }

    /// Fetches every page of a listing, following `next` links until absent.
    ///
    /// Accepts paginated envelopes (`{"next": ..., "results": [...]}`) and bare
    /// arrays.
    pub async fn get_all(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<Value>, ClientError> {
        let mut url = reqwest::Url::parse(&self.url(path))
            .map_err(|e| ClientError::configuration(format!("invalid url for {}: {}", path, e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("page_size", &self.page_size.to_string());
        }

        let mut next = Some(url.to_string());
        let mut records = Vec::new();
        let mut pages = 0;
        while let Some(page_url) = next.take() {
            let page = self.get_json(&page_url).await?;
            let (items, next_url) = split_page(page);
            pages += 1;
            debug!(url = %page_url, count = items.len(), "Fetched page");
            records.extend(items);

            if pages >= MAX_PAGES {
                warn!(path, pages, "Stopping pagination at page limit");
                break;
            }
            next = next_url;
        }
        Ok(records)
    }
}

/// Splits a page into its records and the next page url.
pub fn split_page(page: Value) -> (Vec<Value>, Option<String>) {
    match page {
        Value::Array(items) => (items, None),
        Value::Object(mut map) => {
            let next = map
                .remove("next")
                .and_then(|n| n.as_str().map(str::to_string))
                .filter(|n| !n.trim().is_empty());
            let items = match map.remove("results") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            (items, next)
        }
        _ => (Vec::new(), None),
    }
}
