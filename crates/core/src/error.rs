use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0:.1}s")]
    Timeout(f64),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("redirect out of scope: {0}")]
    RedirectOutOfScope(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
