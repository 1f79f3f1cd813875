mod aggregate;
mod engine;

pub use aggregate::Aggregator;
pub use engine::{parse_site, parse_site_blocking, run};
