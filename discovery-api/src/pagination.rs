//! Page-number pagination.
//!
//! `next` and `previous` are absolute URLs rebuilt from the incoming request.
//! Behind a proxy the public host comes from `X-Forwarded-Host` and the scheme
//! from `X-Forwarded-Proto`.

use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ApiError;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// `page` and `page_size` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl PageParams {
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self, default: usize) -> usize {
        self.page_size.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self, default: usize) -> usize {
        (self.page() - 1) * self.page_size(default)
    }
}

/// Absolute URL of the current request.
#[derive(Debug, Clone)]
pub struct RequestUrl(pub Url);

fn first_header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestUrl {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Nested routers strip their prefix from `parts.uri`.
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| &original.0)
            .unwrap_or(&parts.uri);
        let host = first_header(parts, "x-forwarded-host")
            .or_else(|| first_header(parts, "host"))
            .or_else(|| uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");
        let scheme = first_header(parts, "x-forwarded-proto")
            .or_else(|| uri.scheme_str())
            .unwrap_or("http");
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Url::parse(&format!("{scheme}://{host}{path_and_query}"))
            .map(RequestUrl)
            .map_err(|e| ApiError::validation(format!("Malformed request URL: {e}")))
    }
}

impl RequestUrl {
    /// The request URL pointing at `page`. Page 1 drops the parameter.
    pub fn with_page(&self, page: usize) -> String {
        let mut url = self.0.clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "page")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.set_query(None);
        if !kept.is_empty() || page > 1 {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &kept {
                pairs.append_pair(k, v);
            }
            if page > 1 {
                pairs.append_pair("page", &page.to_string());
            }
        }
        url.into()
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wraps results that were already cut to the requested page.
    ///
    /// Asking for a page past the end is a 404, except for page 1 of an empty
    /// listing.
    pub fn new(
        results: Vec<T>,
        count: u64,
        params: &PageParams,
        default_size: usize,
        url: &RequestUrl,
    ) -> Result<Self, ApiError> {
        let page = params.page();
        let size = params.page_size(default_size) as u64;
        let pages = count.div_ceil(size).max(1);
        if page as u64 > pages {
            return Err(ApiError::not_found("Invalid page."));
        }
        Ok(Self {
            count,
            next: ((page as u64) < pages).then(|| url.with_page(page + 1)),
            previous: (page > 1).then(|| url.with_page(page - 1)),
            results,
        })
    }

    /// Cuts a full listing to the requested page.
    pub fn slice(
        items: Vec<T>,
        params: &PageParams,
        default_size: usize,
        url: &RequestUrl,
    ) -> Result<Self, ApiError> {
        let count = items.len() as u64;
        let results = items
            .into_iter()
            .skip(params.offset(default_size))
            .take(params.page_size(default_size))
            .collect();
        Self::new(results, count, params, default_size, url)
    }
}
