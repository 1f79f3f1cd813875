use site_parser_core::CanonicalUrl;

/// Path segments that usually carry contact data.
const CONTACT_SEGMENTS: [&str; 7] = [
    "contact",
    "contacts",
    "kontakty",
    "contact-us",
    "about",
    "support",
    "help",
];

/// Content sections that rarely do.
const LOW_VALUE_SEGMENTS: [&str; 6] = ["docs", "blog", "news", "archive", "tag", "category"];

/// Binary-ish payloads: still fetched, but last, since they decode to nothing.
const DEPRIORITISED_EXTENSIONS: [&str; 10] = [
    "pdf", "zip", "tar", "gz", "png", "jpg", "jpeg", "gif", "mp4", "mp3",
];

const ANCHOR_TOKENS: [&str; 5] = ["contact", "email", "phone", "контакт", "связь"];

/// Priority score for one discovered URL; lower is fetched earlier.
///
/// Plain BFS when focused crawling is off. Otherwise depth dominates
/// (`depth * 10`) and contact-shaped paths or anchors pull a URL forward
/// within its depth band.
pub fn priority(url: &CanonicalUrl, depth: u32, anchor: Option<&str>, focused: bool) -> f64 {
    if !focused {
        return depth as f64;
    }

    let mut score = depth as f64 * 10.0;

    let segments: Vec<String> = url
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
        .collect();

    if segments
        .iter()
        .any(|s| CONTACT_SEGMENTS.contains(&s.as_str()))
    {
        score -= 8.0;
    }
    if let Some(anchor) = anchor {
        let anchor = anchor.to_lowercase();
        if ANCHOR_TOKENS.iter().any(|token| anchor.contains(token)) {
            score -= 3.0;
        }
    }
    if segments
        .iter()
        .any(|s| LOW_VALUE_SEGMENTS.contains(&s.as_str()))
    {
        score += 5.0;
    }
    if let Some(ext) = extension(url.path()) {
        if DEPRIORITISED_EXTENSIONS.contains(&ext.as_str()) {
            score += 2.0;
        }
    }

    score
}

fn extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
