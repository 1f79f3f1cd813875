use std::collections::BTreeSet;

use serde::Serialize;

use crate::canonical::CanonicalUrl;
use crate::error::CrawlError;

/// A pending fetch in the frontier. `score` orders the heap, lower first;
/// ties break by insertion order.
#[derive(Debug, Clone)]
pub struct FrontierItem {
    pub url: CanonicalUrl,
    pub depth: u32,
    pub score: f64,
}

/// Outcome of one fetch, redirects already followed.
///
/// `body_text` is only meaningful for 2xx responses with an HTML-like
/// content type and no `error`; every other combination leaves it empty.
#[derive(Debug)]
pub struct FetchResult {
    pub final_url: CanonicalUrl,
    pub status: u16,
    pub body_text: String,
    pub content_type: String,
    pub bytes_read: usize,
    pub error: Option<CrawlError>,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    pub response_time_ms: u64,
}

impl FetchResult {
    pub fn failed(url: CanonicalUrl, error: CrawlError, response_time_ms: u64) -> Self {
        Self {
            final_url: url,
            status: 0,
            body_text: String::new(),
            content_type: String::new(),
            bytes_read: 0,
            error: Some(error),
            fetched_at: chrono::Utc::now(),
            response_time_ms,
        }
    }

    /// True for responses worth parsing: success status, non-empty body,
    /// no absorbed error.
    pub fn is_parseable(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status) && !self.body_text.is_empty()
    }
}

/// A canonicalised outgoing link with the anchor text it was found under.
/// Anchor text feeds the focused-crawl score.
#[derive(Debug, Clone)]
pub struct Link {
    pub url: CanonicalUrl,
    pub anchor: Option<String>,
}

/// Everything harvested from a single page. Pure function of the fetch
/// result and config.
#[derive(Debug, Default)]
pub struct PageExtract {
    pub emails: BTreeSet<String>,
    pub phones: BTreeSet<String>,
    pub links: Vec<Link>,
}

/// Final, caller-facing result. Emails and phones are sorted ascending and
/// deduplicated; `url` is the start URL's `scheme://host`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CrawlResult {
    pub url: String,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
}
