use crate::canonical::CanonicalUrl;
use crate::error::CrawlError;

/// Same-registered-domain gate: a candidate URL is in scope iff its eTLD+1
/// equals the start URL's. `sub.example.com` and `example.com` share scope,
/// `example.org` does not.
#[derive(Debug, Clone)]
pub struct DomainScope {
    root: String,
}

impl DomainScope {
    pub fn new(start: &CanonicalUrl) -> Result<Self, CrawlError> {
        let host = start.host();
        if host.is_empty() {
            return Err(CrawlError::InvalidUrl(start.key().to_string()));
        }
        Ok(Self {
            root: registered_domain(host),
        })
    }

    /// Registered domain (eTLD+1) the crawl is bound to.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn in_scope(&self, url: &CanonicalUrl) -> bool {
        self.host_in_scope(url.host())
    }

    /// Host-level check, used by the redirect policy where only the target
    /// host is at hand.
    pub fn host_in_scope(&self, host: &str) -> bool {
        if host.is_empty() {
            return false;
        }
        registered_domain(&host.to_ascii_lowercase()) == self.root
    }
}

/// Public-suffix lookup via the compiled-in list. Unknown suffixes fall back
/// to the PSL prevailing `*` rule, so `a.test` yields `a.test`; hosts the
/// list cannot split (IP literals) compare whole.
fn registered_domain(host: &str) -> String {
    psl::domain_str(host).unwrap_or(host).to_string()
}
