use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{redirect, StatusCode};
use tracing::{debug, warn};

use site_parser_core::{canonicalize, CanonicalUrl, CrawlConfig, CrawlError, DomainScope, FetchResult};

use crate::Fetch;

const ACCEPT_VALUE: &str = "text/html, */*;q=0.1";
const MAX_REDIRECT_HOPS: usize = 5;

/// Marker threaded through the redirect policy so the final reqwest error
/// chain can be told apart from an ordinary redirect loop.
#[derive(Debug)]
struct OutOfScopeRedirect;

impl fmt::Display for OutOfScopeRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("redirect out of scope")
    }
}

impl StdError for OutOfScopeRedirect {}

/// Shared-connection-pool fetcher. One instance per crawl; all workers hold
/// it behind an `Arc`.
pub struct HttpFetcher {
    client: reqwest::Client,
    config: Arc<CrawlConfig>,
}

enum Attempt {
    Done(FetchResult),
    /// Retryable HTTP status; `delay_override` carries a parsed Retry-After
    /// for 429/503.
    Again {
        status: u16,
        delay_override: Option<Duration>,
    },
    Failed(CrawlError, bool),
}

impl HttpFetcher {
    pub fn new(config: Arc<CrawlConfig>, scope: DomainScope) -> Result<Self, CrawlError> {
        let policy = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > MAX_REDIRECT_HOPS {
                return attempt.error("too many redirects");
            }
            let host = attempt.url().host_str().unwrap_or_default();
            if scope.host_in_scope(host) {
                attempt.follow()
            } else {
                attempt.error(OutOfScopeRedirect)
            }
        });

        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|_| CrawlError::Config(format!("invalid user_agent {:?}", config.user_agent)))?;

        let client = reqwest::Client::builder()
            .redirect(policy)
            .user_agent(user_agent)
            .build()
            .map_err(|e| CrawlError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    async fn attempt(&self, url: &CanonicalUrl, timeout: Duration) -> Attempt {
        let response = match self
            .client
            .get(url.as_url().clone())
            .header(ACCEPT, ACCEPT_VALUE)
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify_send_error(url, &e, timeout),
        };

        let status = response.status();
        if retryable_status(status) {
            let delay_override = matches!(status.as_u16(), 429 | 503)
                .then(|| retry_after(response.headers().get(RETRY_AFTER)))
                .flatten();
            return Attempt::Again {
                status: status.as_u16(),
                delay_override,
            };
        }

        let final_url = canonicalize(response.url().as_str(), None, self.config.include_query)
            .unwrap_or_else(|_| url.clone());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !status.is_success() {
            return Attempt::Done(FetchResult {
                final_url,
                status: status.as_u16(),
                body_text: String::new(),
                content_type,
                bytes_read: 0,
                error: Some(CrawlError::HttpStatus(status.as_u16())),
                fetched_at: chrono::Utc::now(),
                response_time_ms: 0,
            });
        }

        // Non-HTML payloads count against the page budget but carry no text
        // to extract from; skip the body read entirely.
        if !is_text_like(&content_type) {
            return Attempt::Done(FetchResult {
                final_url,
                status: status.as_u16(),
                body_text: String::new(),
                content_type,
                bytes_read: 0,
                error: None,
                fetched_at: chrono::Utc::now(),
                response_time_ms: 0,
            });
        }

        let body = match read_capped(response, self.config.max_body_bytes).await {
            Ok(body) => body,
            Err(e) => return classify_send_error(url, &e, timeout),
        };

        let body_text = decode_body(&body, &content_type);
        Attempt::Done(FetchResult {
            final_url,
            status: status.as_u16(),
            bytes_read: body.len(),
            body_text,
            content_type,
            error: None,
            fetched_at: chrono::Utc::now(),
            response_time_ms: 0,
        })
    }

    fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = self.config.retry_backoff_factor;
        Duration::from_secs_f64(factor * 2f64.powi(retry.saturating_sub(1) as i32))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &CanonicalUrl, timeout: Duration) -> FetchResult {
        let start = Instant::now();
        let mut delay_override = None;
        let mut last_error = None;

        for retry in 0..=self.config.retry_total {
            if retry > 0 {
                let delay = delay_override.take().unwrap_or_else(|| self.backoff_delay(retry));
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            match self.attempt(url, timeout).await {
                Attempt::Done(mut result) => {
                    result.response_time_ms = start.elapsed().as_millis() as u64;
                    debug!(url = %url, status = result.status, bytes = result.bytes_read, "fetched");
                    return result;
                }
                Attempt::Again { status, delay_override: next } => {
                    debug!(url = %url, status, retry, "retryable status");
                    delay_override = next;
                    last_error = Some(CrawlError::HttpStatus(status));
                }
                Attempt::Failed(error, retryable) => {
                    if !retryable {
                        warn!(url = %url, error = %error, "fetch failed");
                        return FetchResult::failed(
                            url.clone(),
                            error,
                            start.elapsed().as_millis() as u64,
                        );
                    }
                    debug!(url = %url, error = %error, retry, "transient fetch error");
                    last_error = Some(error);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| CrawlError::Network("retries exhausted".into()));
        warn!(url = %url, error = %error, "fetch failed after retries");
        FetchResult::failed(url.clone(), error, start.elapsed().as_millis() as u64)
    }
}

fn classify_send_error(url: &CanonicalUrl, error: &reqwest::Error, timeout: Duration) -> Attempt {
    if error.is_timeout() {
        return Attempt::Failed(CrawlError::Timeout(timeout.as_secs_f64()), true);
    }
    if error.is_redirect() {
        if error_chain_has::<OutOfScopeRedirect>(error) {
            return Attempt::Failed(CrawlError::RedirectOutOfScope(url.key().to_string()), false);
        }
        return Attempt::Failed(CrawlError::Network("too many redirects".into()), false);
    }
    Attempt::Failed(CrawlError::Network(error.to_string()), true)
}

fn error_chain_has<T: StdError + 'static>(error: &dyn StdError) -> bool {
    let mut source = error.source();
    while let Some(inner) = source {
        if inner.is::<T>() {
            return true;
        }
        source = inner.source();
    }
    false
}

fn retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Retry-After in either form: delta-seconds, or an HTTP-date (RFC 1123 /
/// RFC 2822 syntax). A date already in the past means no extra wait.
fn retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let raw = header?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let date = chrono::DateTime::parse_from_rfc2822(raw).ok()?;
    let delay = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delay.to_std().unwrap_or(Duration::ZERO))
}

/// Read the body up to `cap` bytes, dropping the rest of the stream. A
/// server advertising a larger Content-Length truncates silently.
async fn read_capped(mut response: reqwest::Response, cap: usize) -> Result<Vec<u8>, reqwest::Error> {
    let hint = response
        .content_length()
        .map(|len| (len as usize).min(cap))
        .unwrap_or(0);
    let mut buf = Vec::with_capacity(hint);

    while let Some(chunk) = response.chunk().await? {
        let remaining = cap - buf.len();
        if chunk.len() >= remaining {
            buf.extend_from_slice(&chunk[..remaining]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn is_text_like(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    // Servers that omit Content-Type are assumed to serve HTML.
    essence.is_empty()
        || essence == "text/html"
        || essence == "application/xhtml+xml"
        || essence == "text/plain"
}

/// Decode honouring the declared charset, lossy UTF-8 otherwise. A wrong
/// declaration still yields text rather than a dropped page.
fn decode_body(body: &[u8], content_type: &str) -> String {
    let encoding = content_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("charset="))
        .next()
        .map(|label| label.trim().trim_matches('"'))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_like_content_types() {
        assert!(is_text_like("text/html"));
        assert!(is_text_like("text/html; charset=utf-8"));
        assert!(is_text_like("application/xhtml+xml"));
        assert!(is_text_like("text/plain"));
        assert!(is_text_like(""));
        assert!(!is_text_like("application/pdf"));
        assert!(!is_text_like("image/png"));
        assert!(!is_text_like("application/json"));
    }

    #[test]
    fn decode_respects_declared_charset() {
        // "тест" in windows-1251
        let body = [0xf2, 0xe5, 0xf1, 0xf2];
        assert_eq!(decode_body(&body, "text/html; charset=windows-1251"), "тест");
    }

    #[test]
    fn decode_falls_back_to_lossy_utf8() {
        let body = [b'o', b'k', 0xff];
        let text = decode_body(&body, "text/html; charset=nonsense");
        assert!(text.starts_with("ok"));
        assert!(text.contains('\u{fffd}'));
    }

    #[test]
    fn retry_after_parses_integer_seconds() {
        let value = HeaderValue::from_static("7");
        assert_eq!(retry_after(Some(&value)), Some(Duration::from_secs(7)));
        assert_eq!(retry_after(None), None);
        let garbage = HeaderValue::from_static("soon");
        assert_eq!(retry_after(Some(&garbage)), None);
    }

    #[test]
    fn retry_after_parses_http_dates() {
        let future = (chrono::Utc::now() + chrono::Duration::seconds(60)).to_rfc2822();
        let value = HeaderValue::from_str(&future).unwrap();
        let delay = retry_after(Some(&value)).unwrap();
        assert!(delay > Duration::from_secs(50));
        assert!(delay <= Duration::from_secs(60));

        // A date in the past collapses to zero wait rather than an error.
        let past = HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(retry_after(Some(&past)), Some(Duration::ZERO));
    }

    #[test]
    fn retryable_statuses() {
        for code in [429u16, 500, 502, 503, 504] {
            assert!(retryable_status(StatusCode::from_u16(code).unwrap()));
        }
        for code in [200u16, 301, 403, 404, 501] {
            assert!(!retryable_status(StatusCode::from_u16(code).unwrap()));
        }
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let config = Arc::new(CrawlConfig {
            retry_backoff_factor: 0.5,
            ..CrawlConfig::default()
        });
        let scope = DomainScope::new(
            &site_parser_core::canonicalize("http://a.test/", None, false).unwrap(),
        )
        .unwrap();
        let fetcher = HttpFetcher::new(config, scope).unwrap();
        assert_eq!(fetcher.backoff_delay(1), Duration::from_secs_f64(0.5));
        assert_eq!(fetcher.backoff_delay(2), Duration::from_secs_f64(1.0));
        assert_eq!(fetcher.backoff_delay(3), Duration::from_secs_f64(2.0));
    }
}
