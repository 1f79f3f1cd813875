use std::path::Path;

use serde::Deserialize;

use crate::error::CrawlError;

/// Immutable crawl budget and behaviour knobs. Built once from the sources
/// in [`load`] and passed by reference to every component.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    /// Wall-clock budget for the whole crawl, seconds.
    pub max_seconds: f64,
    /// Links found at depth `max_depth` are not enqueued.
    pub max_depth: u32,
    /// Maximum URLs dispatched to the fetcher.
    pub max_pages: u64,
    pub max_links_per_page: usize,
    /// Response bodies are truncated at this many bytes.
    pub max_body_bytes: usize,
    pub max_concurrency: usize,
    /// Per-attempt timeout (connect + read), seconds.
    pub request_timeout: f64,
    /// Retries on top of the first attempt.
    pub retry_total: u32,
    pub retry_backoff_factor: f64,
    /// ISO-3166-1 alpha-2 hints tried in order for phone numbers without a
    /// leading `+`.
    pub phone_regions: Vec<String>,
    /// When non-empty, only emails whose domain equals or ends in one of
    /// these suffixes are kept.
    pub email_domain_allowlist: Vec<String>,
    pub focused_crawling: bool,
    pub include_query: bool,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_seconds: 30.0,
            max_depth: 0,
            max_pages: 200,
            max_links_per_page: 200,
            max_body_bytes: 2_000_000,
            max_concurrency: 4,
            request_timeout: 10.0,
            retry_total: 2,
            retry_backoff_factor: 0.5,
            phone_regions: Vec::new(),
            email_domain_allowlist: Vec::new(),
            focused_crawling: true,
            include_query: false,
            user_agent: "site-parser/0.1.0".to_string(),
        }
    }
}

impl CrawlConfig {
    /// Bounds-check and normalise in place. Region codes are uppercased and
    /// deduplicated keeping first occurrence; allowlist entries are
    /// lowercased with any leading dot stripped.
    pub fn validate(&mut self) -> Result<(), CrawlError> {
        if !self.max_seconds.is_finite() || self.max_seconds < 0.0 {
            return Err(config_err("max_seconds must be >= 0"));
        }
        if self.max_pages < 1 {
            return Err(config_err("max_pages must be >= 1"));
        }
        if self.max_links_per_page < 1 {
            return Err(config_err("max_links_per_page must be >= 1"));
        }
        if self.max_body_bytes < 1 {
            return Err(config_err("max_body_bytes must be >= 1"));
        }
        if self.max_concurrency < 1 {
            return Err(config_err("max_concurrency must be >= 1"));
        }
        if !self.request_timeout.is_finite() || self.request_timeout <= 0.0 {
            return Err(config_err("request_timeout must be > 0"));
        }
        if !self.retry_backoff_factor.is_finite() || self.retry_backoff_factor < 0.0 {
            return Err(config_err("retry_backoff_factor must be >= 0"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(config_err("user_agent must be non-empty"));
        }

        let mut regions = Vec::with_capacity(self.phone_regions.len());
        for region in &self.phone_regions {
            let code = region.trim().to_ascii_uppercase();
            if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
                return Err(config_err(&format!("invalid phone region {region:?}")));
            }
            if !regions.contains(&code) {
                regions.push(code);
            }
        }
        self.phone_regions = regions;

        let mut allowlist = Vec::with_capacity(self.email_domain_allowlist.len());
        for entry in &self.email_domain_allowlist {
            let suffix = entry.trim().trim_start_matches('.').to_ascii_lowercase();
            if suffix.is_empty() {
                return Err(config_err("empty email_domain_allowlist entry"));
            }
            if !allowlist.contains(&suffix) {
                allowlist.push(suffix);
            }
        }
        self.email_domain_allowlist = allowlist;

        Ok(())
    }
}

/// Partial config merged over a base; every present field wins. This is the
/// "explicit override object" of the configuration chain and also what the
/// `overrides` key of an API payload would deserialise into.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfigPatch {
    pub max_seconds: Option<f64>,
    pub max_depth: Option<u32>,
    pub max_pages: Option<u64>,
    pub max_links_per_page: Option<usize>,
    pub max_body_bytes: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub request_timeout: Option<f64>,
    pub retry_total: Option<u32>,
    pub retry_backoff_factor: Option<f64>,
    pub phone_regions: Option<Vec<String>>,
    pub email_domain_allowlist: Option<Vec<String>>,
    pub focused_crawling: Option<bool>,
    pub include_query: Option<bool>,
    pub user_agent: Option<String>,
}

impl CrawlConfigPatch {
    pub fn apply(self, config: &mut CrawlConfig) {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    config.$field = value;
                })*
            };
        }
        set!(
            max_seconds,
            max_depth,
            max_pages,
            max_links_per_page,
            max_body_bytes,
            max_concurrency,
            request_timeout,
            retry_total,
            retry_backoff_factor,
            phone_regions,
            email_domain_allowlist,
            focused_crawling,
            include_query,
            user_agent,
        );
    }
}

/// Assemble the effective config: `defaults`, then the config file (explicit
/// path or `PARSER_CONFIG_FILE`), then `PARSER_*` environment variables,
/// then the caller's patch. Validates before returning.
///
/// The binary passes its embedded `config/default.toml` as `defaults`;
/// library callers without one use [`load`].
pub fn load_from(
    defaults: CrawlConfig,
    path: Option<&Path>,
    patch: Option<CrawlConfigPatch>,
) -> Result<CrawlConfig, CrawlError> {
    let env_file = std::env::var("PARSER_CONFIG_FILE").ok();
    let file = path.or_else(|| env_file.as_deref().map(Path::new));

    let mut config = match file {
        Some(path) => from_file(path)?,
        None => defaults,
    };

    apply_env_from(&mut config, |name| std::env::var(name).ok())?;

    if let Some(patch) = patch {
        patch.apply(&mut config);
    }

    config.validate()?;
    Ok(config)
}

/// [`load_from`] with the built-in defaults as the base.
pub fn load(path: Option<&Path>, patch: Option<CrawlConfigPatch>) -> Result<CrawlConfig, CrawlError> {
    load_from(CrawlConfig::default(), path, patch)
}

/// Parse a TOML or JSON config file, chosen by extension.
pub fn from_file(path: &Path) -> Result<CrawlConfig, CrawlError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| config_err(&format!("cannot read {}: {e}", path.display())))?;

    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
        serde_json::from_str(&raw).map_err(|e| config_err(&format!("{}: {e}", path.display())))
    } else {
        toml::from_str(&raw).map_err(|e| config_err(&format!("{}: {e}", path.display())))
    }
}

/// Overlay `PARSER_<FIELD>` variables supplied by `get`. Split out from the
/// process environment so it can be tested hermetically.
pub fn apply_env_from(
    config: &mut CrawlConfig,
    get: impl Fn(&str) -> Option<String>,
) -> Result<(), CrawlError> {
    fn number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, CrawlError> {
        raw.trim()
            .parse()
            .map_err(|_| config_err(&format!("{name}: cannot parse {raw:?}")))
    }

    fn boolean(name: &str, raw: &str) -> Result<bool, CrawlError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(config_err(&format!("{name}: cannot parse {raw:?} as bool"))),
        }
    }

    fn list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }

    if let Some(raw) = get("PARSER_MAX_SECONDS") {
        config.max_seconds = number("PARSER_MAX_SECONDS", &raw)?;
    }
    if let Some(raw) = get("PARSER_MAX_DEPTH") {
        config.max_depth = number("PARSER_MAX_DEPTH", &raw)?;
    }
    if let Some(raw) = get("PARSER_MAX_PAGES") {
        config.max_pages = number("PARSER_MAX_PAGES", &raw)?;
    }
    if let Some(raw) = get("PARSER_MAX_LINKS_PER_PAGE") {
        config.max_links_per_page = number("PARSER_MAX_LINKS_PER_PAGE", &raw)?;
    }
    if let Some(raw) = get("PARSER_MAX_BODY_BYTES") {
        config.max_body_bytes = number("PARSER_MAX_BODY_BYTES", &raw)?;
    }
    if let Some(raw) = get("PARSER_MAX_CONCURRENCY") {
        config.max_concurrency = number("PARSER_MAX_CONCURRENCY", &raw)?;
    }
    if let Some(raw) = get("PARSER_REQUEST_TIMEOUT") {
        config.request_timeout = number("PARSER_REQUEST_TIMEOUT", &raw)?;
    }
    if let Some(raw) = get("PARSER_RETRY_TOTAL") {
        config.retry_total = number("PARSER_RETRY_TOTAL", &raw)?;
    }
    if let Some(raw) = get("PARSER_RETRY_BACKOFF_FACTOR") {
        config.retry_backoff_factor = number("PARSER_RETRY_BACKOFF_FACTOR", &raw)?;
    }
    if let Some(raw) = get("PARSER_PHONE_REGIONS") {
        config.phone_regions = list(&raw);
    }
    if let Some(raw) = get("PARSER_EMAIL_DOMAIN_ALLOWLIST") {
        config.email_domain_allowlist = list(&raw);
    }
    if let Some(raw) = get("PARSER_FOCUSED_CRAWLING") {
        config.focused_crawling = boolean("PARSER_FOCUSED_CRAWLING", &raw)?;
    }
    if let Some(raw) = get("PARSER_INCLUDE_QUERY") {
        config.include_query = boolean("PARSER_INCLUDE_QUERY", &raw)?;
    }
    if let Some(raw) = get("PARSER_USER_AGENT") {
        config.user_agent = raw;
    }

    Ok(())
}

fn config_err(msg: &str) -> CrawlError {
    CrawlError::Config(msg.to_string())
}
