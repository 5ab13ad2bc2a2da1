//! Candidate-link enumeration and title-similarity scoring.

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::debug;

/// Only the first words of each string take part in the comparison;
/// headlines front-load their subject.
const WORD_LIMIT: usize = 10;

/// Topic vocabulary granting a small additive bonus when present in both
/// strings.
const KEYWORD_VOCABULARY: &[&str] = &["policie", "soud", "vláda", "prezident", "nehoda", "požár"];

/// Total bonus cap regardless of how many keywords are shared.
const KEYWORD_BONUS: f64 = 0.1;

/// Substrings that disqualify a link regardless of similarity.
const EXCLUDED_PATTERNS: &[&str] = &[
    "diskuze",
    "forum",
    "zbozi.cz",
    "firmy.cz",
    "mapy.com",
    "slovnik.seznam.cz",
];

/// Path markers of an article page on the target host.
const ARTICLE_PATH_MARKERS: &[&str] = &["/clanek/", "/video/", "/zpravy/"];

/// A scored anchor from a search-result page.
#[derive(Debug, Clone)]
pub struct LinkCandidate {
    pub url: String,
    pub anchor_text: String,
    pub similarity_score: f64,
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .take(WORD_LIMIT)
        .map(|w| w.to_string())
        .collect()
}

/// Jaccard word-overlap score in [0, 1] with the keyword bonus.
///
/// Symmetric in its arguments; identical non-empty strings score 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let words_a = word_set(a);
    let words_b = word_set(b);
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    let jaccard = intersection as f64 / union as f64;

    let lowered_a = a.to_lowercase();
    let lowered_b = b.to_lowercase();
    let shared_keyword = KEYWORD_VOCABULARY
        .iter()
        .any(|k| lowered_a.contains(k) && lowered_b.contains(k));
    let bonus = if shared_keyword { KEYWORD_BONUS } else { 0.0 };

    (jaccard + bonus).clamp(0.0, 1.0)
}

/// Resolve an href to an absolute URL, unwrapping search-engine redirect
/// wrappers. Relative and query-only hrefs yield `None`.
pub fn normalize_href(href: &str) -> Option<String> {
    // Google wraps results in /url?q=<encoded>&...
    if let Some(rest) = href.strip_prefix("/url?q=") {
        let end = rest.find('&').unwrap_or(rest.len());
        return urlencoding::decode(&rest[..end]).ok().map(|s| s.into_owned());
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        Some(href.to_string())
    } else if href.starts_with("//") {
        Some(format!("https:{}", href))
    } else {
        None
    }
}

/// Scores anchors on a search-result page against a work-item title.
#[derive(Debug, Clone)]
pub struct LinkScorer {
    target_host: String,
    threshold: f64,
}

impl LinkScorer {
    pub fn new(target_host: impl Into<String>, threshold: f64) -> Self {
        Self {
            target_host: target_host.into().to_lowercase(),
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether an absolute URL points at an article on the target host.
    pub fn is_article_url(&self, url: &str) -> bool {
        let lowered = url.to_lowercase();
        if EXCLUDED_PATTERNS.iter().any(|p| lowered.contains(p)) {
            return false;
        }
        let Ok(parsed) = url::Url::parse(&lowered) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host_matches =
            host == self.target_host || host.ends_with(&format!(".{}", self.target_host));
        host_matches && ARTICLE_PATH_MARKERS.iter().any(|m| parsed.path().contains(m))
    }

    /// Enumerate qualifying anchors and return the best-scoring one above
    /// the threshold. Ties keep the earlier candidate in document order.
    pub fn pick_best(&self, html: &str, title: &str) -> Option<LinkCandidate> {
        let document = Html::parse_document(html);
        let anchor_selector = Selector::parse("a[href]").ok()?;

        let mut best: Option<LinkCandidate> = None;
        for element in document.select(&anchor_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(url) = normalize_href(href) else {
                continue;
            };
            if !self.is_article_url(&url) {
                continue;
            }

            let anchor_text = element.text().collect::<String>().trim().to_string();
            if anchor_text.is_empty() {
                continue;
            }

            let score = similarity(title, &anchor_text);
            if best
                .as_ref()
                .map_or(true, |b| score > b.similarity_score)
            {
                best = Some(LinkCandidate {
                    url,
                    anchor_text,
                    similarity_score: score,
                });
            }
        }

        if let Some(candidate) = &best {
            debug!(
                url = %candidate.url,
                score = candidate.similarity_score,
                threshold = self.threshold,
                "best link candidate"
            );
        }
        best.filter(|c| c.similarity_score > self.threshold)
    }
}
