//! Media-credit extraction from rendered article pages.

pub mod rules;

pub use rules::{clean_candidate, default_rules, ExtractionRule};

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use scraper::Html;
use thiserror::Error;
use tracing::{debug, warn};

use crate::backoff::jitter_ms;
use crate::browser::PageDriver;

/// Consent/interstitial click targets, tried in order at most once.
const CONSENT_SELECTORS: &[&str] = &[
    "button[data-testid='cw-button-agree-with-ads']",
    ".cookie-consent button",
];

/// Pause before re-navigating after a transient failure.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Persisted credit strings longer than this are truncated.
const MAX_PERSISTED_LEN: usize = 200;
const TRUNCATED_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("navigation failed after {attempts} attempts: {message}")]
    Navigation { attempts: usize, message: String },
    #[error("driver failure: {0}")]
    Driver(String),
}

/// Runs the heuristic cascade against a resolved article URL.
pub struct SourceExtractor {
    rules: Vec<ExtractionRule>,
    max_attempts: usize,
    /// Randomized delay range before each navigation, milliseconds.
    pre_navigation_ms: (u64, u64),
}

impl SourceExtractor {
    pub fn new(max_attempts: usize, pre_navigation_ms: (u64, u64)) -> Self {
        Self::with_rules(default_rules(), max_attempts, pre_navigation_ms)
    }

    pub fn with_rules(
        rules: Vec<ExtractionRule>,
        max_attempts: usize,
        pre_navigation_ms: (u64, u64),
    ) -> Self {
        Self {
            rules,
            max_attempts: max_attempts.max(1),
            pre_navigation_ms,
        }
    }

    /// Render `url` and scan it. Transient navigation failures retry with a
    /// full reload; a page that renders but yields no credit does not.
    pub async fn extract(
        &self,
        driver: &dyn PageDriver,
        url: &str,
    ) -> Result<Option<String>, ExtractError> {
        let mut last_error = String::new();

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(RETRY_DELAY).await;
            }
            tokio::time::sleep(jitter_ms(self.pre_navigation_ms)).await;
            if let Err(e) = driver.navigate(url).await {
                warn!(url, attempt = attempt + 1, error = %e, "article navigation failed");
                last_error = e.to_string();
                continue;
            }

            if attempt == 0 {
                // A consent overlay can cover the media block; dismissal is
                // never fatal.
                match driver.click_first(CONSENT_SELECTORS).await {
                    Ok(true) => debug!(url, "consent overlay dismissed"),
                    Ok(false) => {}
                    Err(e) => debug!(url, "consent dismissal skipped: {}", e),
                }
            }

            let content = driver
                .content()
                .await
                .map_err(|e| ExtractError::Driver(e.to_string()))?;
            return Ok(self.scan(&content));
        }

        Err(ExtractError::Navigation {
            attempts: self.max_attempts,
            message: last_error,
        })
    }

    /// Apply the cascade to rendered HTML; the first rule that yields an
    /// acceptable candidate wins, then the vocabulary fallback.
    pub fn scan(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);

        for rule in &self.rules {
            if let Some(candidate) = rule.apply(&document) {
                debug!(?rule, %candidate, "extraction rule matched");
                return Some(sanitize(&candidate));
            }
        }

        rules::vocabulary_fallback(&document).map(|line| sanitize(&line))
    }
}

fn tag_pattern() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"))
}

/// Normalize a credit string before it is persisted: strip residual markup,
/// collapse whitespace, truncate runaway captures.
pub fn sanitize(text: &str) -> String {
    let without_tags = tag_pattern().replace_all(text, "");
    let collapsed = without_tags.replace(['\n', '\t'], " ");
    let squeezed = collapsed.split_whitespace().collect::<Vec<_>>().join(" ");

    if squeezed.chars().count() > MAX_PERSISTED_LEN {
        let head: String = squeezed.chars().take(TRUNCATED_LEN).collect();
        format!("{}...", head.trim_end())
    } else {
        squeezed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::DriverError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn scan_prefers_structural_rules_over_vocabulary() {
        let extractor = SourceExtractor::new(2, (0, 0));
        let html = r#"
            <html><body>
                <div>Video: Reuters</div>
                <span class="f_bJ">Video: Škoda Auto</span>
            </body></html>
        "#;
        assert_eq!(extractor.scan(html), Some("Škoda Auto".to_string()));
    }

    #[test]
    fn scan_falls_back_to_vocabulary() {
        let extractor = SourceExtractor::new(2, (0, 0));
        let html = r#"
            <html><body>
                <article><p>Dlouhý text zprávy bez strukturovaného kreditu.</p></article>
                <div>zdroj záběrů: ČT24</div>
            </body></html>
        "#;
        assert_eq!(extractor.scan(html), Some("zdroj záběrů: ČT24".to_string()));
    }

    #[test]
    fn scan_returns_none_when_nothing_matches() {
        let extractor = SourceExtractor::new(2, (0, 0));
        let html = "<html><body><p>Jen text bez kreditů.</p></body></html>";
        assert_eq!(extractor.scan(html), None);
    }

    #[test]
    fn sanitize_strips_markup_and_collapses_whitespace() {
        assert_eq!(sanitize("Zdroj:\n\t<b>ČTK</b>"), "Zdroj: ČTK");
        assert_eq!(sanitize("  dvě   mezery  "), "dvě mezery");
    }

    #[test]
    fn sanitize_truncates_runaway_text() {
        let long = "slovo ".repeat(60);
        let sanitized = sanitize(&long);
        assert!(sanitized.ends_with("..."));
        assert!(sanitized.chars().count() <= TRUNCATED_LEN + 3);
    }

    struct FlakyDriver {
        navigations: AtomicUsize,
        fail_first: usize,
        html: &'static str,
    }

    #[async_trait]
    impl PageDriver for FlakyDriver {
        async fn navigate(&self, _url: &str) -> Result<(), DriverError> {
            let n = self.navigations.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(DriverError::Timeout(1))
            } else {
                Ok(())
            }
        }
        async fn content(&self) -> Result<String, DriverError> {
            Ok(self.html.to_string())
        }
        async fn click_first(&self, _selectors: &[&str]) -> Result<bool, DriverError> {
            Ok(false)
        }
        async fn current_url(&self) -> Result<String, DriverError> {
            Ok("https://www.novinky.cz/clanek/test".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_navigation_failure_retries_once() {
        let driver = FlakyDriver {
            navigations: AtomicUsize::new(0),
            fail_first: 1,
            html: r#"<span class="f_bJ">Video: Škoda Auto</span>"#,
        };
        let extractor = SourceExtractor::new(2, (0, 0));
        let found = extractor
            .extract(&driver, "https://www.novinky.cz/clanek/test")
            .await
            .unwrap();
        assert_eq!(found, Some("Škoda Auto".to_string()));
        assert_eq!(driver.navigations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_navigation_attempts_error() {
        let driver = FlakyDriver {
            navigations: AtomicUsize::new(0),
            fail_first: 10,
            html: "",
        };
        let extractor = SourceExtractor::new(2, (0, 0));
        let err = extractor
            .extract(&driver, "https://www.novinky.cz/clanek/test")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Navigation { attempts: 2, .. }));
        assert_eq!(driver.navigations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_waits_out_the_pacing_delay() {
        let driver = FlakyDriver {
            navigations: AtomicUsize::new(0),
            fail_first: 0,
            html: r#"<span class="f_bJ">Video: ČTK</span>"#,
        };
        let extractor = SourceExtractor::new(2, (1500, 1500));
        let start = tokio::time::Instant::now();
        let found = extractor
            .extract(&driver, "https://www.novinky.cz/clanek/test")
            .await
            .unwrap();
        assert_eq!(found, Some("ČTK".to_string()));
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn clean_no_match_does_not_retry() {
        let driver = FlakyDriver {
            navigations: AtomicUsize::new(0),
            fail_first: 0,
            html: "<html><body><p>Nic tu není.</p></body></html>",
        };
        let extractor = SourceExtractor::new(2, (0, 0));
        let found = extractor
            .extract(&driver, "https://www.novinky.cz/clanek/test")
            .await
            .unwrap();
        assert_eq!(found, None);
        assert_eq!(driver.navigations.load(Ordering::SeqCst), 1);
    }
}
