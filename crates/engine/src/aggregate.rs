use std::collections::BTreeSet;

use site_parser_core::CrawlResult;

/// Global contact sets. `BTreeSet` gives the sorted, deduplicated output
/// ordering for free, so finalisation is a straight copy.
#[derive(Debug, Default)]
pub struct Aggregator {
    emails: BTreeSet<String>,
    phones: BTreeSet<String>,
}

impl Aggregator {
    pub fn merge(&mut self, emails: BTreeSet<String>, phones: BTreeSet<String>) {
        self.emails.extend(emails);
        self.phones.extend(phones);
    }

    pub fn email_count(&self) -> usize {
        self.emails.len()
    }

    pub fn phone_count(&self) -> usize {
        self.phones.len()
    }

    pub fn build(&self, base: &str) -> CrawlResult {
        CrawlResult {
            url: base.to_string(),
            emails: self.emails.iter().cloned().collect(),
            phones: self.phones.iter().cloned().collect(),
        }
    }
}
