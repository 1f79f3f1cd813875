use std::collections::HashSet;

use percent_encoding::percent_decode_str;
use scraper::node::Node;
use scraper::{Html, Selector};
use url::Url;

use site_parser_core::{canonicalize, DomainScope, Link};

/// What one page contributes: visible text, capped in-scope links, and the
/// `mailto:`/`tel:` targets routed to the contact extractors instead of the
/// frontier.
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub text: String,
    pub links: Vec<Link>,
    pub mailto: Vec<String>,
    pub tel: Vec<String>,
}

/// Lenient parse of an HTML body. Broken markup never fails; the worst case
/// is an empty extract.
///
/// Candidate links go through canonicalisation, the domain gate, then
/// key-dedup, in that order, so the `max_links` cap counts only in-scope
/// candidates.
pub fn parse_page(
    body: &str,
    final_url: &Url,
    scope: &DomainScope,
    include_query: bool,
    max_links: usize,
) -> ParsedPage {
    let document = Html::parse_document(body);

    let mut page = ParsedPage {
        text: visible_text(&document),
        ..Default::default()
    };

    let Some(selector) = selector("a[href], area[href]") else {
        return page;
    };

    let mut seen = HashSet::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();

        if let Some(rest) = strip_scheme(href, "mailto:") {
            page.mailto.extend(mailto_targets(rest));
            continue;
        }
        if let Some(rest) = strip_scheme(href, "tel:") {
            if let Some(target) = tel_target(rest) {
                page.tel.push(target);
            }
            continue;
        }

        let Ok(url) = canonicalize(href, Some(final_url), include_query) else {
            continue;
        };
        if !scope.in_scope(&url) {
            continue;
        }
        if !seen.insert(url.key().to_string()) {
            continue;
        }

        let anchor = element.text().collect::<Vec<_>>().join(" ");
        let anchor = anchor.split_whitespace().collect::<Vec<_>>().join(" ");
        page.links.push(Link {
            url,
            anchor: (!anchor.is_empty()).then_some(anchor),
        });
    }

    page.links.truncate(max_links);
    page
}

/// All text under the document except `<script>`, `<style>` and
/// `<noscript>` subtrees, whitespace-normalised with single-space joins.
fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.tree.nodes() {
        if let Node::Text(text) = node.value() {
            let hidden = node.ancestors().any(|ancestor| {
                matches!(
                    ancestor.value(),
                    Node::Element(el) if matches!(el.name(), "script" | "style" | "noscript")
                )
            });
            if !hidden {
                parts.push(&**text);
            }
        }
    }
    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

fn strip_scheme<'a>(href: &'a str, scheme: &str) -> Option<&'a str> {
    match href.get(..scheme.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(scheme) => Some(&href[scheme.len()..]),
        _ => None,
    }
}

/// `mailto:` may carry several comma-separated addresses plus header
/// parameters after `?`; both are resolved here.
fn mailto_targets(rest: &str) -> Vec<String> {
    let addrs = rest.split('?').next().unwrap_or_default();
    addrs
        .split(',')
        .map(|addr| percent_decode_str(addr.trim()).decode_utf8_lossy().into_owned())
        .filter(|addr| !addr.is_empty())
        .collect()
}

/// `tel:` target without URI parameters (`;ext=...` and friends).
fn tel_target(rest: &str) -> Option<String> {
    let number = rest.split(&[';', '?'][..]).next().unwrap_or_default();
    let number = percent_decode_str(number.trim()).decode_utf8_lossy().into_owned();
    (!number.is_empty()).then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://a.test/dir/page").unwrap()
    }

    fn scope() -> DomainScope {
        DomainScope::new(&canonicalize("http://a.test/", None, false).unwrap()).unwrap()
    }

    fn parse(body: &str) -> ParsedPage {
        parse_page(body, &base(), &scope(), false, 200)
    }

    #[test]
    fn text_skips_script_style_noscript() {
        let page = parse(
            "<html><body><p>hello</p><script>var x = 'hidden@a.test';</script>\
             <style>.a{}</style><noscript>nope</noscript><p>world</p></body></html>",
        );
        assert_eq!(page.text, "hello world");
    }

    #[test]
    fn text_uses_whitespace_separators_between_elements() {
        let page = parse("<div>one</div><div>two</div>");
        assert_eq!(page.text, "one two");
    }

    #[test]
    fn links_are_resolved_and_carry_anchor_text() {
        let page = parse(r#"<a href="../contact">  Contact   us </a>"#);
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.links[0].url.key(), "http://a.test/contact");
        assert_eq!(page.links[0].anchor.as_deref(), Some("Contact us"));
    }

    #[test]
    fn area_hrefs_are_links_too() {
        let page = parse(r#"<map><area href="/map-target"></map>"#);
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.links[0].url.key(), "http://a.test/map-target");
    }

    #[test]
    fn mailto_and_tel_do_not_reach_the_link_list() {
        let page = parse(
            r#"<a href="mailto:info@a.test?subject=hi">m</a>
               <a href="MAILTO:a@a.test,b@a.test">m2</a>
               <a href="tel:+7-495-123-45-67;ext=12">t</a>"#,
        );
        assert!(page.links.is_empty());
        assert_eq!(page.mailto, vec!["info@a.test", "a@a.test", "b@a.test"]);
        assert_eq!(page.tel, vec!["+7-495-123-45-67"]);
    }

    #[test]
    fn percent_encoded_mailto_is_decoded() {
        let page = parse(r#"<a href="mailto:info%40a.test">m</a>"#);
        assert_eq!(page.mailto, vec!["info@a.test"]);
    }

    #[test]
    fn non_web_schemes_are_dropped() {
        let page = parse(
            r##"<a href="javascript:void(0)">j</a><a href="data:text/plain,x">d</a>
               <a href="#top">f</a><a href="/ok">k</a>"##,
        );
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.links[0].url.key(), "http://a.test/ok");
    }

    #[test]
    fn links_dedup_by_key_preserving_document_order() {
        let page = parse(
            r#"<a href="/b">first</a><a href="/a">second</a><a href="/b#frag">dup</a>"#,
        );
        let keys: Vec<_> = page.links.iter().map(|l| l.url.key().to_string()).collect();
        assert_eq!(keys, vec!["http://a.test/b", "http://a.test/a"]);
    }

    #[test]
    fn link_list_is_capped_after_dedup() {
        let body: String = (0..10).map(|i| format!(r#"<a href="/p{i}">x</a>"#)).collect();
        let page = parse_page(&body, &base(), &scope(), false, 3);
        assert_eq!(page.links.len(), 3);
        assert_eq!(page.links[0].url.key(), "http://a.test/p0");
    }

    #[test]
    fn off_domain_links_do_not_count_against_the_cap() {
        let body = r#"<a href="http://b.test/1">x</a><a href="http://b.test/2">x</a>
                      <a href="http://b.test/3">x</a><a href="/contact">c</a>"#;
        let page = parse_page(body, &base(), &scope(), false, 3);
        let keys: Vec<_> = page.links.iter().map(|l| l.url.key().to_string()).collect();
        assert_eq!(keys, vec!["http://a.test/contact"]);
    }

    #[test]
    fn broken_html_still_yields_text() {
        let page = parse("<p>un<closed <b>bold</i> text");
        assert!(page.text.contains("text"));
    }
}
