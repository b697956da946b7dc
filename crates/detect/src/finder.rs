use scraper::{ElementRef, Selector};
use tracing::debug;

use consentry_core::{SelectorRule, TextPatternRule};

use crate::page::PageModel;
use crate::text;

/// Generic rule-driven element lookup: selector rules and text-pattern
/// rules, in descending priority order, with exclusion support.
pub struct ElementFinder;

/// Stable descending-priority ordering: ties keep first-declared order.
pub(crate) fn by_priority<'r, T>(rules: &'r [T], priority: impl Fn(&T) -> i32) -> Vec<&'r T> {
    let mut sorted: Vec<&T> = rules.iter().collect();
    sorted.sort_by_key(|r| std::cmp::Reverse(priority(r)));
    sorted
}

impl ElementFinder {
    /// Tries selector rules in descending priority and returns the first
    /// structural match. A rule whose query is syntactically invalid is
    /// skipped and the scan continues.
    pub fn find_by_selectors<'a>(
        page: &'a PageModel,
        scope: Option<ElementRef<'a>>,
        rules: &[SelectorRule],
    ) -> Option<ElementRef<'a>> {
        for rule in by_priority(rules, |r| r.priority) {
            let sel = match Selector::parse(&rule.query) {
                Ok(sel) => sel,
                Err(_) => {
                    debug!(query = %rule.query, "skipping invalid selector rule");
                    continue;
                }
            };
            let found = match scope {
                Some(scope) => scope.select(&sel).next(),
                None => page.root().select(&sel).next(),
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Enumerates candidate-tag elements and, for each pattern in
    /// descending priority, returns the first visible element whose
    /// normalized text contains the pattern and none of the exclude terms.
    pub fn find_by_text<'a>(
        page: &'a PageModel,
        scope: Option<ElementRef<'a>>,
        patterns: &[TextPatternRule],
        candidate_tags: &[&str],
        exclude_patterns: &[String],
    ) -> Option<ElementRef<'a>> {
        let candidates: Vec<ElementRef<'a>> = match scope {
            Some(scope) => scope
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|el| candidate_tags.contains(&el.value().name()))
                .filter(|el| page.is_visible(el))
                .collect(),
            None => page
                .elements()
                .filter(|el| candidate_tags.contains(&el.value().name()))
                .filter(|el| page.is_visible(el))
                .collect(),
        };
        Self::match_in_candidates(page, &candidates, patterns, exclude_patterns)
    }

    /// Text matching over a pre-collected candidate list.
    pub fn match_in_candidates<'a>(
        page: &'a PageModel,
        candidates: &[ElementRef<'a>],
        patterns: &[TextPatternRule],
        exclude_patterns: &[String],
    ) -> Option<ElementRef<'a>> {
        let excludes: Vec<String> =
            exclude_patterns.iter().map(|p| text::normalize(p)).collect();
        for rule in by_priority(patterns, |r| r.priority) {
            let pattern = text::normalize(&rule.pattern);
            if pattern.is_empty() {
                continue;
            }
            for el in candidates {
                let content = page.text_of(el);
                if content.contains(&pattern)
                    && !excludes.iter().any(|x| !x.is_empty() && content.contains(x))
                {
                    return Some(*el);
                }
            }
        }
        None
    }

    /// True if the element or any ancestor matches one of the exclude
    /// selectors. Used to suppress footer/navigation false positives.
    pub fn is_excluded(
        page: &PageModel,
        el: &ElementRef<'_>,
        exclude_selectors: &[String],
    ) -> bool {
        for query in exclude_selectors {
            let Ok(sel) = Selector::parse(query) else {
                debug!(query = %query, "skipping invalid exclude selector");
                continue;
            };
            for matched in page.root().select(&sel) {
                if matched.id() == el.id() || page.is_ancestor_of(&matched, el) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consentry_core::{SelectorRule, TextPatternRule};

    fn page(html: &str) -> PageModel {
        PageModel::from_html(html, "https://example.com")
    }

    #[test]
    fn selector_rules_tried_in_priority_order() {
        let page = page(r#"<button id="low">a</button><button id="high">b</button>"#);
        let rules = vec![
            SelectorRule::new("#low", 1),
            SelectorRule::new("#high", 9),
        ];
        let found = ElementFinder::find_by_selectors(&page, None, &rules).unwrap();
        assert_eq!(found.value().attr("id"), Some("high"));
    }

    #[test]
    fn equal_priority_keeps_declaration_order() {
        let page = page(r#"<button id="first">a</button><button id="second">b</button>"#);
        let rules = vec![
            SelectorRule::new("#first", 5),
            SelectorRule::new("#second", 5),
        ];
        let found = ElementFinder::find_by_selectors(&page, None, &rules).unwrap();
        assert_eq!(found.value().attr("id"), Some("first"));
    }

    #[test]
    fn invalid_selector_is_skipped_not_fatal() {
        let page = page(r#"<button id="ok">x</button>"#);
        let rules = vec![
            SelectorRule::new("div[[broken", 9),
            SelectorRule::new("#ok", 1),
        ];
        let found = ElementFinder::find_by_selectors(&page, None, &rules).unwrap();
        assert_eq!(found.value().attr("id"), Some("ok"));
    }

    #[test]
    fn text_match_is_case_and_whitespace_insensitive() {
        let page = page("<button>  Accept \n ALL  </button>");
        let patterns = vec![TextPatternRule::new("accept all", 5)];
        let found =
            ElementFinder::find_by_text(&page, None, &patterns, &["button"], &[]).unwrap();
        assert_eq!(found.value().name(), "button");
    }

    #[test]
    fn exclude_terms_suppress_a_text_match() {
        let page = page("<button>Accept all in settings</button><button>Accept all</button>");
        let patterns = vec![TextPatternRule::new("accept all", 5)];
        let excludes = vec!["settings".to_string()];
        let found =
            ElementFinder::find_by_text(&page, None, &patterns, &["button"], &excludes).unwrap();
        assert_eq!(page.text_of(&found), "accept all");
    }

    #[test]
    fn higher_priority_pattern_wins_over_earlier_element() {
        let page = page("<button>Agree</button><button>Accept all</button>");
        let patterns = vec![
            TextPatternRule::new("agree", 3),
            TextPatternRule::new("accept all", 9),
        ];
        let found =
            ElementFinder::find_by_text(&page, None, &patterns, &["button"], &[]).unwrap();
        assert_eq!(page.text_of(&found), "accept all");
    }

    #[test]
    fn hidden_elements_never_text_match() {
        let page = page(r#"<button style="display:none">Accept all</button>"#);
        let patterns = vec![TextPatternRule::new("accept all", 5)];
        assert!(ElementFinder::find_by_text(&page, None, &patterns, &["button"], &[]).is_none());
    }

    #[test]
    fn excluded_ancestor_covers_descendants() {
        let page = page(r#"<footer><a id="x">cookie policy</a></footer><a id="y">ok</a>"#);
        let a_in_footer = page
            .elements()
            .find(|el| el.value().attr("id") == Some("x"))
            .unwrap();
        let a_outside = page
            .elements()
            .find(|el| el.value().attr("id") == Some("y"))
            .unwrap();
        let excludes = vec!["footer".to_string()];
        assert!(ElementFinder::is_excluded(&page, &a_in_footer, &excludes));
        assert!(!ElementFinder::is_excluded(&page, &a_outside, &excludes));
    }
}
