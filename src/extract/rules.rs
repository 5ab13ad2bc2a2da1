//! Extraction rules applied to a rendered article document.

use scraper::{Html, Selector};

/// Label prefixes stripped from accepted candidates.
const LABEL_PREFIXES: &[&str] = &["Video:", "Foto:", "Zdroj:", "Autor:", "Redakce:"];

/// Labels recognized by the generic label-scan rule.
const SCAN_LABELS: &[&str] = &["Zdroj:", "Video:", "Foto:", "Autor:"];

/// Known agencies and platforms for the vocabulary fallback.
const CREDIT_VOCABULARY: &[&str] = &[
    "ČT24",
    "ČTK",
    "Reuters",
    "AP",
    "DPA",
    "AFP",
    "iStock",
    "Shutterstock",
    "Getty",
    "Profimedia",
    "Facebook",
    "Twitter",
    "Instagram",
    "TikTok",
];

/// Raw candidate length bounds, in characters.
const MIN_LEN: usize = 3;
const MAX_LEN: usize = 200;

/// A vocabulary line longer than this is page chrome, not a credit.
const MAX_VOCABULARY_LINE: usize = 100;

/// Matches inspected per selector rule before giving up on it.
const MATCHES_PER_RULE: usize = 3;

/// A single structural extraction rule.
#[derive(Debug, Clone)]
pub enum ExtractionRule {
    /// Elements matching a CSS selector.
    Css(&'static str),
    /// Any element whose text starts with a recognized credit label.
    LabelScan,
}

impl ExtractionRule {
    /// First cleaned candidate the rule yields, in document order.
    pub fn apply(&self, document: &Html) -> Option<String> {
        match self {
            Self::Css(css) => {
                let selector = Selector::parse(css).ok()?;
                for element in document.select(&selector).take(MATCHES_PER_RULE) {
                    let text = element.text().collect::<String>();
                    if let Some(candidate) = clean_candidate(&text) {
                        return Some(candidate);
                    }
                }
                None
            }
            Self::LabelScan => {
                let selector = Selector::parse("body *").ok()?;
                for element in document.select(&selector) {
                    let text = element.text().collect::<String>();
                    let trimmed = text.trim();
                    if SCAN_LABELS.iter().any(|l| trimmed.starts_with(l)) {
                        if let Some(candidate) = clean_candidate(trimmed) {
                            return Some(candidate);
                        }
                    }
                }
                None
            }
        }
    }
}

/// The cascade, most structurally specific first. Earlier rules bind the
/// current site markup; later ones are generic fallbacks.
pub fn default_rules() -> Vec<ExtractionRule> {
    vec![
        ExtractionRule::Css("span.f_bJ"),
        ExtractionRule::Css("div.ogm-container span.f_bJ"),
        ExtractionRule::Css("div.ogm-main-media__container span.f_bJ"),
        ExtractionRule::Css("p.c_br span.f_bJ"),
        ExtractionRule::Css("div.ogm-main-media__container span"),
        ExtractionRule::LabelScan,
        ExtractionRule::Css("[class*='source']"),
        ExtractionRule::Css("[class*='author']"),
        ExtractionRule::Css("[class*='credit']"),
        ExtractionRule::Css("figcaption"),
        ExtractionRule::Css(".media-source"),
        ExtractionRule::Css(".video-source"),
        ExtractionRule::Css(".article-source"),
    ]
}

/// Trim, bound, and strip label prefixes from a raw text candidate.
/// `None` when the remainder cannot be a credit.
pub fn clean_candidate(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let length = trimmed.chars().count();
    if !(MIN_LEN..=MAX_LEN).contains(&length) {
        return None;
    }

    let mut cleaned = trimmed.to_string();
    for prefix in LABEL_PREFIXES {
        if let Some(rest) = cleaned.strip_prefix(prefix) {
            cleaned = rest.trim().to_string();
        }
    }

    (cleaned.chars().count() > 2).then_some(cleaned)
}

/// Scan the page text for known agency names; the first short line
/// containing one is taken as the credit.
pub fn vocabulary_fallback(document: &Html) -> Option<String> {
    let selector = Selector::parse("body").ok()?;
    let body = document.select(&selector).next()?;
    let text = body.text().collect::<Vec<_>>().join("\n");

    for source in CREDIT_VOCABULARY {
        for line in text.lines() {
            let trimmed = line.trim();
            if !trimmed.is_empty()
                && trimmed.contains(source)
                && trimmed.chars().count() < MAX_VOCABULARY_LINE
            {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}
