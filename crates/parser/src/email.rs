use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use site_parser_core::CrawlConfig;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap());

/// Textual cloaks unwrapped before harvesting. The list is fixed; the
/// script-injected Joomla variant needs JS execution and is covered only as
/// far as its rendered `mailto:` output.
const CLOAKS: [(&str, &str); 5] = [
    (" [at] ", "@"),
    ("(at)", "@"),
    ("@AT@", "@"),
    (" [dot] ", "."),
    ("(dot)", "."),
];

pub struct EmailExtractor {
    allowlist: Vec<String>,
}

impl EmailExtractor {
    pub fn new(config: &CrawlConfig) -> Self {
        Self {
            allowlist: config.email_domain_allowlist.clone(),
        }
    }

    /// Harvest from page text and `mailto:` targets. Returned addresses have
    /// the domain lowercased and the local part untouched; the set order is
    /// the final output order.
    pub fn extract(&self, text: &str, mailto: &[String]) -> BTreeSet<String> {
        let cleaned = uncloak(text);

        let mut found = BTreeSet::new();
        for candidate in EMAIL_RE
            .find_iter(&cleaned)
            .map(|m| m.as_str())
            .chain(mailto.iter().map(String::as_str))
        {
            if let Some(address) = validate(candidate) {
                if self.allowed(&address) {
                    found.insert(address);
                }
            }
        }
        found
    }

    fn allowed(&self, address: &str) -> bool {
        if self.allowlist.is_empty() {
            return true;
        }
        let domain = address.rsplit('@').next().unwrap_or_default();
        self.allowlist.iter().any(|suffix| {
            domain == suffix || domain.ends_with(&format!(".{suffix}"))
        })
    }
}

fn uncloak(text: &str) -> String {
    let mut cleaned = text.to_string();
    for (pattern, replacement) in CLOAKS {
        if cleaned.contains(pattern) {
            cleaned = cleaned.replace(pattern, replacement);
        }
    }
    cleaned
}

/// Syntactic check along RFC-5322 addr-spec, dot-atoms only: no comments, no
/// quoted strings. Domain is lowercased for the canonical form.
fn validate(candidate: &str) -> Option<String> {
    let (local, domain) = candidate.split_once('@')?;
    if domain.contains('@') {
        return None;
    }

    if local.is_empty()
        || local.starts_with('.')
        || local.ends_with('.')
        || local.contains("..")
        || !local
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"._%+-".contains(&b))
    {
        return None;
    }

    let domain = domain.to_ascii_lowercase();
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return None;
    }
    for label in &labels {
        if label.is_empty()
            || label.starts_with('-')
            || label.ends_with('-')
            || !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return None;
        }
    }
    let tld = labels.last().unwrap();
    if tld.len() < 2 || !tld.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }

    Some(format!("{local}@{domain}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(allowlist: &[&str]) -> EmailExtractor {
        let mut config = CrawlConfig {
            email_domain_allowlist: allowlist.iter().map(|s| s.to_string()).collect(),
            ..CrawlConfig::default()
        };
        config.validate().unwrap();
        EmailExtractor::new(&config)
    }

    #[test]
    fn plain_address_with_domain_lowercased() {
        let found = extractor(&[]).extract("", &["info@A.test".to_string()]);
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["info@a.test"]);
    }

    #[test]
    fn local_part_case_is_preserved() {
        let found = extractor(&[]).extract("write to John.Doe@A.TEST today", &[]);
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["John.Doe@a.test"]);
    }

    #[test]
    fn cloaked_addresses_are_unwrapped() {
        let cases = [
            "contact us at info [at] a.test",
            "info(at)a.test",
            "info@AT@a [dot] test",
            "info(at)a(dot)test",
        ];
        for text in cases {
            let found = extractor(&[]).extract(text, &[]);
            assert_eq!(
                found.into_iter().collect::<Vec<_>>(),
                vec!["info@a.test"],
                "failed for {text:?}"
            );
        }
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        for target in [
            "no-at-sign.test",
            "two@@a.test",
            "x@y@a.test",
            "@a.test",
            "dot..dot@a.test",
            ".lead@a.test",
            "x@nodot",
            "x@a.test.",
            "x@-bad.test",
            "x@a.t3st4", // numeric TLD
        ] {
            let found = extractor(&[]).extract("", &[target.to_string()]);
            assert!(found.is_empty(), "accepted {target:?}");
        }
    }

    #[test]
    fn harvest_regex_requires_dotted_domain() {
        let found = extractor(&[]).extract("ping admin@localhost about it", &[]);
        assert!(found.is_empty());
    }

    #[test]
    fn allowlist_keeps_exact_domain_and_subdomains() {
        let ex = extractor(&["a.test"]);
        let found = ex.extract(
            "x@a.test y@evil.test z@mail.a.test w@nota.test",
            &[],
        );
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["x@a.test", "z@mail.a.test"]
        );
    }

    #[test]
    fn deduplicates_across_text_and_mailto() {
        let found = extractor(&[]).extract(
            "reach info@a.test or info@a.test",
            &["info@A.TEST".to_string()],
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn extraction_is_idempotent_over_its_own_output() {
        let first = extractor(&[]).extract("info [at] a.test, sales@b.example", &[]);
        let text = first.iter().cloned().collect::<Vec<_>>().join(" ");
        let second = extractor(&[]).extract(&text, &[]);
        assert_eq!(first, second);
    }
}
