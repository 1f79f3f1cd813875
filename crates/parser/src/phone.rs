use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use phonenumber::country;
use phonenumber::Mode;
use regex::Regex;
use tracing::warn;

use site_parser_core::CrawlConfig;

/// Loose pre-filter over body text; every hit still has to survive the real
/// parser below.
static CANDIDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?[\d][\d\s().\-]{6,}\d").unwrap());

pub struct PhoneExtractor {
    regions: Vec<country::Id>,
}

impl PhoneExtractor {
    pub fn new(config: &CrawlConfig) -> Self {
        let regions = config
            .phone_regions
            .iter()
            .filter_map(|code| match code.parse::<country::Id>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(region = %code, "unknown phone region, skipping");
                    None
                }
            })
            .collect();
        Self { regions }
    }

    /// Harvest from page text and `tel:` targets; output is E.164 only.
    pub fn extract(&self, text: &str, tel: &[String]) -> BTreeSet<String> {
        let mut found = BTreeSet::new();

        for target in tel {
            if let Some(number) = self.parse_one(target) {
                found.insert(number);
            }
        }
        for candidate in CANDIDATE_RE.find_iter(text) {
            if let Some(number) = self.parse_one(candidate.as_str()) {
                found.insert(number);
            }
        }
        found
    }

    /// Strip visual separators, then parse: numbers with a leading `+`
    /// stand alone, everything else is tried against each configured region
    /// in order. Accepted only when the library deems the number valid.
    fn parse_one(&self, raw: &str) -> Option<String> {
        let cleaned: String = raw
            .chars()
            .filter(|c| *c == '+' || c.is_ascii_digit())
            .collect();
        if cleaned.is_empty() {
            return None;
        }

        if cleaned.starts_with('+') {
            return parse_valid(None, &cleaned);
        }
        self.regions
            .iter()
            .find_map(|region| parse_valid(Some(*region), &cleaned))
    }
}

fn parse_valid(region: Option<country::Id>, number: &str) -> Option<String> {
    let parsed = phonenumber::parse(region, number).ok()?;
    phonenumber::is_valid(&parsed).then(|| parsed.format().mode(Mode::E164).to_string())
}
