use std::fmt;
use std::hash::{Hash, Hasher};

use url::Url;

use crate::error::CrawlError;

/// A URL that survived canonicalisation: http(s) scheme, ASCII lowercase
/// host, no fragment, no default port, normalised path.
///
/// Equality and hashing go through `key`, so two spellings of the same
/// resource collapse to one frontier entry.
#[derive(Debug, Clone)]
pub struct CanonicalUrl {
    url: Url,
    key: String,
}

impl CanonicalUrl {
    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// Dedup key: `scheme://host[:port]path[?query]`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// `scheme://host[:port]` without trailing slash, the `url` field of the
    /// final result.
    pub fn base(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}://{}:{}", self.url.scheme(), self.host(), port),
            None => format!("{}://{}", self.url.scheme(), self.host()),
        }
    }
}

impl PartialEq for CanonicalUrl {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for CanonicalUrl {}

impl Hash for CanonicalUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Canonicalise a raw href, resolving it against `base` when relative.
///
/// Rejects anything that is not a fetchable http(s) resource: empty strings,
/// bare fragments, and non-web schemes like `javascript:` or `data:`. The
/// `url` crate already lowercases scheme and host, punycodes IDN labels,
/// collapses dot segments and drops default ports, so the remaining work is
/// fragment/query stripping and key construction.
pub fn canonicalize(
    raw: &str,
    base: Option<&Url>,
    include_query: bool,
) -> Result<CanonicalUrl, CrawlError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return Err(CrawlError::InvalidUrl(raw.to_string()));
    }

    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => match base {
            Some(base) => base
                .join(raw)
                .map_err(|e| CrawlError::InvalidUrl(format!("{raw}: {e}")))?,
            None => return Err(CrawlError::InvalidUrl(raw.to_string())),
        },
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(CrawlError::InvalidUrl(format!(
            "unsupported scheme {}: {raw}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(CrawlError::InvalidUrl(format!("no host: {raw}")));
    }

    url.set_fragment(None);
    if !include_query || url.query() == Some("") {
        url.set_query(None);
    }

    let mut key = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    key.push_str(url.path());
    if let Some(query) = url.query() {
        key.push('?');
        key.push_str(query);
    }

    Ok(CanonicalUrl { url, key })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(raw: &str) -> CanonicalUrl {
        canonicalize(raw, None, false).unwrap()
    }

    #[test]
    fn lowercases_scheme_and_host() {
        let url = canon("HTTP://Example.COM/Path");
        assert_eq!(url.key(), "http://example.com/Path");
    }

    #[test]
    fn strips_default_ports() {
        assert_eq!(canon("http://a.test:80/").key(), "http://a.test/");
        assert_eq!(canon("https://a.test:443/").key(), "https://a.test/");
        assert_eq!(canon("http://a.test:8080/").key(), "http://a.test:8080/");
    }

    #[test]
    fn empty_path_becomes_slash() {
        assert_eq!(canon("http://a.test").key(), "http://a.test/");
    }

    #[test]
    fn collapses_dot_segments() {
        assert_eq!(
            canon("http://a.test/x/../y/./z").key(),
            "http://a.test/y/z"
        );
    }

    #[test]
    fn punycodes_unicode_hosts() {
        let url = canon("http://пример.испытание/");
        assert_eq!(url.host(), "xn--e1afmkfd.xn--80akhbyknj4f");
    }

    #[test]
    fn drops_fragment_and_query() {
        assert_eq!(
            canon("http://a.test/p?x=1&y=2#frag").key(),
            "http://a.test/p"
        );
        let kept = canonicalize("http://a.test/p?x=1&y=2#frag", None, true).unwrap();
        assert_eq!(kept.key(), "http://a.test/p?x=1&y=2");
    }

    #[test]
    fn resolves_relative_against_base() {
        let base = Url::parse("http://a.test/dir/page.html").unwrap();
        let url = canonicalize("../contact", Some(&base), false).unwrap();
        assert_eq!(url.key(), "http://a.test/contact");
    }

    #[test]
    fn rejects_non_web_schemes() {
        for raw in ["javascript:void(0)", "data:text/plain,hi", "", "#top"] {
            assert!(canonicalize(raw, None, false).is_err(), "accepted {raw:?}");
        }
        let base = Url::parse("http://a.test/").unwrap();
        assert!(canonicalize("ftp://a.test/file", Some(&base), false).is_err());
    }

    #[test]
    fn canonicalising_a_canonical_url_is_identity() {
        for raw in [
            "http://a.test/",
            "https://sub.a.test:8443/x/y?q=1",
            "http://a.test/contact",
        ] {
            let once = canonicalize(raw, None, true).unwrap();
            let twice = canonicalize(once.key(), None, true).unwrap();
            assert_eq!(once.key(), twice.key());
        }
    }

    #[test]
    fn base_has_no_trailing_slash() {
        assert_eq!(canon("http://a.test/deep/path").base(), "http://a.test");
        assert_eq!(
            canon("http://a.test:8080/deep").base(),
            "http://a.test:8080"
        );
    }
}
