pub mod canonical;
pub mod config;
pub mod error;
pub mod scope;
pub mod types;

pub use canonical::{canonicalize, CanonicalUrl};
pub use config::{CrawlConfig, CrawlConfigPatch};
pub use error::CrawlError;
pub use scope::DomainScope;
pub use types::*;
