use scraper::{ElementRef, Selector};
use tracing::debug;

use consentry_core::{ClassificationConfig, DetectionMethod};

use crate::finder::by_priority;
use crate::page::PageModel;

/// Bonus when an element's id (or class list) carries a domain keyword.
pub const ID_CLASS_KEYWORD_BONUS: i32 = 5;

/// Bonus for exposing at least one interactive control.
pub const INTERACTIVE_BONUS: i32 = 3;

/// Minimum rendered size for a content-scanned candidate.
pub const MIN_DIALOG_WIDTH: f32 = 50.0;
pub const MIN_DIALOG_HEIGHT: f32 = 20.0;

/// Content-scan cutoff: anything with more normalized text than this is a
/// page region, not a dialog.
pub const MAX_DIALOG_TEXT_LEN: usize = 3000;

/// A subtree hypothesized to be a cookie-consent banner.
#[derive(Debug, Clone)]
pub struct DialogCandidate<'a> {
    pub element: ElementRef<'a>,
    pub score: i32,
    pub matched_rules: Vec<String>,
    pub method: DetectionMethod,
}

/// Finds, scores, ranks, and deduplicates dialog-candidate containers.
pub struct DialogDetector<'c> {
    config: &'c ClassificationConfig,
}

impl<'c> DialogDetector<'c> {
    pub fn new(config: &'c ClassificationConfig) -> Self {
        Self { config }
    }

    pub fn find_best<'a>(&self, page: &'a PageModel) -> Option<ElementRef<'a>> {
        self.find_all(page).into_iter().next().map(|c| c.element)
    }

    /// All dialog candidates, scored, containment-deduplicated, sorted
    /// descending by score (stable).
    pub fn find_all<'a>(&self, page: &'a PageModel) -> Vec<DialogCandidate<'a>> {
        let mut candidates = self.by_selectors(page);
        if candidates.is_empty() {
            candidates = self.by_content_scan(page);
        }

        for candidate in &mut candidates {
            candidate.score += self.id_class_bonus(&candidate.element);
            if has_interactive_control(&candidate.element) {
                candidate.score += INTERACTIVE_BONUS;
            }
        }

        let candidates = dedup_containment(page, candidates);

        let mut ranked = candidates;
        ranked.sort_by_key(|c| std::cmp::Reverse(c.score));
        ranked
    }

    fn by_selectors<'a>(&self, page: &'a PageModel) -> Vec<DialogCandidate<'a>> {
        let mut found: Vec<DialogCandidate<'a>> = Vec::new();
        for rule in by_priority(&self.config.dialog_selectors, |r| r.priority) {
            let sel = match Selector::parse(&rule.query) {
                Ok(sel) => sel,
                Err(_) => {
                    debug!(query = %rule.query, "skipping invalid dialog selector");
                    continue;
                }
            };
            for el in page.root().select(&sel) {
                if !page.is_visible(&el) {
                    continue;
                }
                match found.iter_mut().find(|c| c.element.id() == el.id()) {
                    Some(existing) => {
                        existing.score += rule.priority;
                        existing.matched_rules.push(rule.query.clone());
                    }
                    None => found.push(DialogCandidate {
                        element: el,
                        score: rule.priority,
                        matched_rules: vec![rule.query.clone()],
                        method: DetectionMethod::Selector,
                    }),
                }
            }
        }
        found
    }

    /// Fallback when no selector rule matches: visible, reasonably sized
    /// elements whose text contains privacy/cookie vocabulary and that
    /// expose an interactive control.
    fn by_content_scan<'a>(&self, page: &'a PageModel) -> Vec<DialogCandidate<'a>> {
        let mut found = Vec::new();
        for el in page.elements() {
            let name = el.value().name();
            if matches!(name, "html" | "head" | "body" | "script" | "style" | "meta" | "link") {
                continue;
            }
            if !page.is_visible(&el) {
                continue;
            }
            let m = page.metrics_of(&el);
            if m.width < MIN_DIALOG_WIDTH || m.height < MIN_DIALOG_HEIGHT {
                continue;
            }
            let content = page.text_of(&el);
            if content.is_empty() || content.len() > MAX_DIALOG_TEXT_LEN {
                continue;
            }
            if !has_interactive_control(&el) {
                continue;
            }

            let mut score = 0;
            let mut matched = Vec::new();
            for rule in &self.config.dialog_vocabulary {
                let pattern = crate::text::normalize(&rule.pattern);
                if !pattern.is_empty() && content.contains(&pattern) {
                    score += rule.priority;
                    matched.push(rule.pattern.clone());
                }
            }
            if score > 0 {
                found.push(DialogCandidate {
                    element: el,
                    score,
                    matched_rules: matched,
                    method: DetectionMethod::ContentScan,
                });
            }
        }
        found
    }

    fn id_class_bonus(&self, el: &ElementRef<'_>) -> i32 {
        let v = el.value();
        let id = v.attr("id").unwrap_or("").to_ascii_lowercase();
        let classes = v.classes().collect::<Vec<_>>().join(" ").to_ascii_lowercase();
        let mut bonus = 0;
        if self.config.dialog_keywords.iter().any(|k| id.contains(k.as_str())) {
            bonus += ID_CLASS_KEYWORD_BONUS;
        }
        if self.config.dialog_keywords.iter().any(|k| classes.contains(k.as_str())) {
            bonus += ID_CLASS_KEYWORD_BONUS;
        }
        bonus
    }
}

fn has_interactive_control(el: &ElementRef<'_>) -> bool {
    el.descendants().filter_map(ElementRef::wrap).any(|d| {
        let v = d.value();
        matches!(v.name(), "button" | "a" | "input" | "select")
            || v.attr("role") == Some("button")
    })
}

/// When two candidates are in an ancestor/descendant relationship, only
/// the one with larger serialized content survives, never both.
fn dedup_containment<'a>(
    page: &'a PageModel,
    candidates: Vec<DialogCandidate<'a>>,
) -> Vec<DialogCandidate<'a>> {
    let mut removed = vec![false; candidates.len()];
    for i in 0..candidates.len() {
        for j in 0..candidates.len() {
            if i == j || removed[i] || removed[j] {
                continue;
            }
            let (a, b) = (&candidates[i], &candidates[j]);
            if page.is_ancestor_of(&a.element, &b.element) {
                if page.content_size_of(&a.element) >= page.content_size_of(&b.element) {
                    removed[j] = true;
                } else {
                    removed[i] = true;
                }
            }
        }
    }
    candidates
        .into_iter()
        .zip(removed)
        .filter_map(|(c, gone)| (!gone).then_some(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> PageModel {
        PageModel::from_html(html, "https://example.com")
    }

    #[test]
    fn containment_dedup_keeps_the_larger_candidate() {
        let page = page(
            r#"<div id="outer" class="cookie-notice">
                 We use cookies on this site to improve your experience.
                 <button>Accept</button>
                 <div id="inner" class="cookie-notice">short</div>
               </div>"#,
        );
        let config = ClassificationConfig::builtin();
        let detector = DialogDetector::new(&config);
        let all = detector.find_all(&page);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].element.value().attr("id"), Some("outer"));
    }

    #[test]
    fn selector_candidates_rank_above_weak_matches() {
        let page = page(
            r#"<div id="onetrust-banner-sdk">We use cookies <button>Accept</button></div>
               <div class="consent">unrelated consent text</div>"#,
        );
        let config = ClassificationConfig::builtin();
        let detector = DialogDetector::new(&config);
        let best = detector.find_best(&page).unwrap();
        assert_eq!(best.value().attr("id"), Some("onetrust-banner-sdk"));
    }

    #[test]
    fn hidden_dialog_markup_is_never_a_candidate() {
        let page = page(
            r#"<div class="cookie-banner" style="display:none">
                 We use cookies <button>Accept</button>
               </div>"#,
        );
        let config = ClassificationConfig::builtin();
        let detector = DialogDetector::new(&config);
        assert!(detector.find_all(&page).is_empty());
    }

    #[test]
    fn content_scan_requires_an_interactive_control() {
        let html_no_control = r#"<div id="plain">We use cookies to improve things.</div>"#;
        let html_with_control =
            r#"<div id="plain">We use cookies to improve things. <button>OK</button></div>"#;
        let mut config = ClassificationConfig::builtin();
        config.dialog_selectors.clear(); // force content-scan path

        let p1 = page(html_no_control);
        assert!(DialogDetector::new(&config).find_all(&p1).is_empty());

        let p2 = page(html_with_control);
        let all = DialogDetector::new(&config).find_all(&p2);
        assert!(!all.is_empty());
        assert_eq!(all[0].method, DetectionMethod::ContentScan);
    }

    #[test]
    fn interactive_and_keyword_bonuses_apply() {
        let page = page(
            r#"<div id="cookie-banner">We use cookies <button>Accept</button></div>"#,
        );
        let config = ClassificationConfig::builtin();
        let detector = DialogDetector::new(&config);
        let all = detector.find_all(&page);
        let best = &all[0];
        // Selector priorities (#cookie-banner 9, [id*="cookie"] 5) plus id
        // keyword bonus plus interactive bonus.
        assert!(best.score >= 9 + 5 + ID_CLASS_KEYWORD_BONUS + INTERACTIVE_BONUS);
        assert_eq!(best.method, DetectionMethod::Selector);
    }
}
