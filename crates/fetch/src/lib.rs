pub mod http;

use std::time::Duration;

use async_trait::async_trait;

use site_parser_core::{CanonicalUrl, FetchResult};

pub use http::HttpFetcher;

/// One HTTP GET with all failure handling folded in. The engine owns the
/// deadline: `timeout` is already `min(request_timeout, remaining budget)`.
///
/// Implementations never panic and never return transport errors as `Err`:
/// every per-page failure is absorbed into `FetchResult::error` so the crawl
/// continues. A trait seam also gives tests a deterministic fetcher.
#[async_trait]
pub trait Fetch: Send + Sync + 'static {
    async fn fetch(&self, url: &CanonicalUrl, timeout: Duration) -> FetchResult;
}
