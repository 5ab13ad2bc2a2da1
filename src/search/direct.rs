//! Direct URL construction from rubric and title.
//!
//! Skips the search engines entirely: builds the likely article URLs from
//! the category and a slugified title, renders them, and keeps the first
//! candidate whose page title matches the item.

use async_trait::async_trait;
use scraper::{Html, Selector};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::backoff::{is_bot_challenge, jitter_ms};
use crate::browser::PageDriver;
use crate::models::{StrategyKind, WorkItem};

use super::scoring::similarity;
use super::{LocateError, ResolveStrategy};

/// Known rubric names and their URL segments.
const RUBRIC_SEGMENTS: &[(&str, &str)] = &[
    ("Domácí", "domaci"),
    ("Zahraniční", "zahranicni"),
    ("Krimi", "krimi"),
    ("Ekonomika", "ekonomika"),
    ("Koktejl", "koktejl"),
    ("AutoMoto", "automoto"),
    ("Válka na Ukrajině", "valka-na-ukrajine"),
    ("Volby", "volby"),
    ("Počasí", "pocasi"),
];

/// Turn free text into a URL slug: strip diacritics, lowercase, drop
/// punctuation, collapse whitespace and hyphens into single hyphens.
pub fn slugify(text: &str) -> String {
    let stripped: String = text.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered = stripped.to_lowercase();

    let mut slug = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;
    for c in lowered.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
        }
        // Other punctuation is dropped without breaking the word.
    }
    slug
}

/// URL segment for a rubric: the mapping table, then slugify as fallback.
pub fn rubric_segment(rubric: &str) -> String {
    let trimmed = rubric.trim();
    RUBRIC_SEGMENTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(trimmed) || *name == trimmed)
        .map(|(_, segment)| segment.to_string())
        .unwrap_or_else(|| slugify(trimmed))
}

/// `<title>` text of a rendered page, with the site-name suffix removed.
fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let text = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    // "Headline - Novinky" → "Headline"
    let head = trimmed.split(" - ").next().unwrap_or(trimmed);
    Some(head.trim().to_string())
}

/// Renders constructed article URLs and checks their page titles.
pub struct DirectUrl {
    base_url: String,
    /// Minimum page-title similarity for a candidate to count as the article.
    threshold: f64,
    /// Randomized delay range between candidate navigations, milliseconds.
    pre_navigation_ms: (u64, u64),
}

impl DirectUrl {
    pub fn new(
        base_url: impl Into<String>,
        threshold: f64,
        pre_navigation_ms: (u64, u64),
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            threshold,
            pre_navigation_ms,
        }
    }

    /// Candidate URLs in the order they are tried.
    pub fn candidate_urls(&self, item: &WorkItem) -> Vec<String> {
        let rubric = rubric_segment(&item.category);
        let slug = slugify(&item.title);
        vec![
            format!("{}/clanek/{}-{}", self.base_url, rubric, slug),
            format!("{}/{}/{}", self.base_url, rubric, slug),
        ]
    }
}

#[async_trait]
impl ResolveStrategy for DirectUrl {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectUrl
    }

    fn describe_query(&self, item: &WorkItem) -> String {
        self.candidate_urls(item).join(" ")
    }

    async fn locate(
        &self,
        driver: &dyn PageDriver,
        item: &WorkItem,
    ) -> Result<Option<String>, LocateError> {
        let mut last_navigation_error = None;
        let mut rendered_any = false;

        for (nth, url) in self.candidate_urls(item).into_iter().enumerate() {
            // The caller paces the first navigation; later candidates pace
            // themselves.
            if nth > 0 {
                tokio::time::sleep(jitter_ms(self.pre_navigation_ms)).await;
            }
            if let Err(e) = driver.navigate(&url).await {
                last_navigation_error = Some(e.to_string());
                continue;
            }
            rendered_any = true;

            let content = driver
                .content()
                .await
                .map_err(|e| LocateError::Driver(e.to_string()))?;
            if is_bot_challenge(&content) {
                return Err(LocateError::BotChallenge);
            }

            if let Some(title) = page_title(&content) {
                if similarity(&item.title, &title) > self.threshold {
                    return Ok(Some(url));
                }
            }
        }

        match (rendered_any, last_navigation_error) {
            // Nothing even rendered: the strategy itself failed.
            (false, Some(message)) => Err(LocateError::Navigation(message)),
            _ => Ok(None),
        }
    }
}
