use scraper::{ElementRef, Selector};

use consentry_core::{ClassificationConfig, ControlType};

use crate::finder::ElementFinder;
use crate::page::PageModel;
use crate::text;

/// Minimum `determine_type` score before a classification is trusted.
pub const MIN_TYPE_SCORE: i32 = 3;

/// Score bonus when an element's id/class carries the type name itself.
pub const ID_CLASS_BONUS: i32 = 5;

/// Locates and reverse-classifies consent buttons.
pub struct ButtonClassifier<'c> {
    config: &'c ClassificationConfig,
}

impl<'c> ButtonClassifier<'c> {
    pub fn new(config: &'c ClassificationConfig) -> Self {
        Self { config }
    }

    /// Finds the best element of the given control type inside `scope`.
    ///
    /// Selector rules are tried first and trusted unconditionally; only
    /// when none match does the classifier fall back to enumerating
    /// generic clickable elements and text-pattern matching.
    pub fn find_by_type<'a>(
        &self,
        page: &'a PageModel,
        scope: Option<ElementRef<'a>>,
        ty: ControlType,
    ) -> Option<ElementRef<'a>> {
        let rules = self.config.rules_for(ty)?;

        if let Some(el) = ElementFinder::find_by_selectors(page, scope, &rules.selectors) {
            return Some(el);
        }

        let candidates = self.clickable_candidates(page, scope);
        let found = ElementFinder::match_in_candidates(
            page,
            &candidates,
            &rules.text_patterns,
            &rules.exclude_patterns,
        )?;

        // A text-matched "reject" that reverse-classifies as a settings
        // control is a disguised customize link, not a rejection.
        if ty == ControlType::Reject
            && self.determine_type(page, &found) == Some(ControlType::Customize)
        {
            return None;
        }
        Some(found)
    }

    /// Reverse classification: scores the element against every type's
    /// rules and returns the highest-scoring type above [`MIN_TYPE_SCORE`].
    pub fn determine_type(&self, page: &PageModel, el: &ElementRef<'_>) -> Option<ControlType> {
        let content = page.text_of(el);
        let id_class = {
            let v = el.value();
            let mut s = v.attr("id").unwrap_or("").to_ascii_lowercase();
            for class in v.classes() {
                s.push(' ');
                s.push_str(&class.to_ascii_lowercase());
            }
            s
        };

        let mut best: Option<(ControlType, i32)> = None;
        for ty in ControlType::ALL {
            let Some(rules) = self.config.rules_for(ty) else { continue };

            if rules
                .exclude_patterns
                .iter()
                .map(|p| text::normalize(p))
                .any(|x| !x.is_empty() && content.contains(&x))
            {
                continue;
            }

            let mut score = 0;
            for rule in &rules.selectors {
                if element_matches(page, el, &rule.query) {
                    score += rule.priority;
                }
            }
            for rule in &rules.text_patterns {
                let pattern = text::normalize(&rule.pattern);
                if !pattern.is_empty() && content.contains(&pattern) {
                    score += rule.priority;
                }
            }
            if id_class.contains(ty.as_str()) {
                score += ID_CLASS_BONUS;
            }

            if score >= MIN_TYPE_SCORE && best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((ty, score));
            }
        }
        best.map(|(ty, _)| ty)
    }

    /// Generic clickable elements inside `scope`: button, role=button,
    /// input[type=button|submit], anchors styled as buttons. Visible and
    /// not under an excluded subtree.
    pub fn clickable_candidates<'a>(
        &self,
        page: &'a PageModel,
        scope: Option<ElementRef<'a>>,
    ) -> Vec<ElementRef<'a>> {
        let within_scope = |el: &ElementRef<'a>| match scope {
            Some(scope) => scope.id() == el.id() || page.is_ancestor_of(&scope, el),
            None => true,
        };
        page.elements()
            .filter(within_scope)
            .filter(is_clickable)
            .filter(|el| page.is_visible(el))
            .filter(|el| !ElementFinder::is_excluded(page, el, &self.config.exclusion_selectors))
            .collect()
    }
}

fn is_clickable(el: &ElementRef<'_>) -> bool {
    let v = el.value();
    match v.name() {
        "button" => true,
        "input" => matches!(v.attr("type"), Some("button") | Some("submit")),
        "a" => {
            v.attr("role") == Some("button")
                || v.classes().any(|c| {
                    let c = c.to_ascii_lowercase();
                    c.contains("btn") || c.contains("button")
                })
        }
        _ => v.attr("role") == Some("button"),
    }
}

fn element_matches(page: &PageModel, el: &ElementRef<'_>, query: &str) -> bool {
    let Ok(sel) = Selector::parse(query) else { return false };
    page.root().select(&sel).any(|m| m.id() == el.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use consentry_core::{SelectorRule, TextPatternRule, TypeRules};
    use std::collections::HashMap;

    fn config_with(ty: ControlType, rules: TypeRules) -> ClassificationConfig {
        let mut config = ClassificationConfig::builtin();
        config.controls = HashMap::from([(ty, rules)]);
        config
    }

    fn page(html: &str) -> PageModel {
        PageModel::from_html(html, "https://example.com")
    }

    #[test]
    fn selector_rule_finds_accept_button() {
        let config = config_with(
            ControlType::Accept,
            TypeRules {
                selectors: vec![SelectorRule::new("#acceptBtn", 10)],
                ..TypeRules::default()
            },
        );
        let page = page(r#"<button id="acceptBtn">Accept</button>"#);
        let classifier = ButtonClassifier::new(&config);
        let found = classifier.find_by_type(&page, None, ControlType::Accept).unwrap();
        assert_eq!(found.value().attr("id"), Some("acceptBtn"));
    }

    #[test]
    fn selector_match_outranks_any_text_match() {
        let config = config_with(
            ControlType::Accept,
            TypeRules {
                selectors: vec![SelectorRule::new(".consent-ok", 1)],
                text_patterns: vec![TextPatternRule::new("accept all", 10)],
                ..TypeRules::default()
            },
        );
        let page = page(
            r#"<button>Accept all</button><button class="consent-ok">weird label</button>"#,
        );
        let classifier = ButtonClassifier::new(&config);
        let found = classifier.find_by_type(&page, None, ControlType::Accept).unwrap();
        assert!(found.value().classes().any(|c| c == "consent-ok"));
    }

    #[test]
    fn text_fallback_enumerates_role_buttons_and_inputs() {
        let config = ClassificationConfig::builtin();
        let classifier = ButtonClassifier::new(&config);

        let page1 = page(r#"<div role="button">Accept all</div>"#);
        assert!(classifier.find_by_type(&page1, None, ControlType::Accept).is_some());

        let page2 = page(r#"<input type="submit" value="x"><button>Reject all</button>"#);
        assert!(classifier.find_by_type(&page2, None, ControlType::Reject).is_some());
    }

    #[test]
    fn input_only_banner_matches_by_its_value_text() {
        let config = ClassificationConfig::builtin();
        let classifier = ButtonClassifier::new(&config);
        let page = page(
            r#"<div id="cookie-banner"><input type="submit" value="Accept all cookies"></div>"#,
        );
        let found = classifier.find_by_type(&page, None, ControlType::Accept).unwrap();
        assert_eq!(found.value().name(), "input");
    }

    #[test]
    fn footer_links_are_not_candidates() {
        let config = ClassificationConfig::builtin();
        let classifier = ButtonClassifier::new(&config);
        let page = page(r#"<footer><button>Accept all</button></footer>"#);
        assert!(classifier.find_by_type(&page, None, ControlType::Accept).is_none());
    }

    #[test]
    fn determine_type_labels_buttons() {
        let config = ClassificationConfig::builtin();
        let classifier = ButtonClassifier::new(&config);
        let page = page(
            r#"<button id="a">Accept all cookies</button>
               <button id="r">Reject all</button>
               <button id="c">Cookie settings</button>
               <button id="n">Next page</button>"#,
        );
        let by_id = |id: &str| {
            page.elements()
                .find(|el| el.value().attr("id") == Some(id))
                .unwrap()
        };
        assert_eq!(classifier.determine_type(&page, &by_id("a")), Some(ControlType::Accept));
        assert_eq!(classifier.determine_type(&page, &by_id("r")), Some(ControlType::Reject));
        assert_eq!(classifier.determine_type(&page, &by_id("c")), Some(ControlType::Customize));
        assert_eq!(classifier.determine_type(&page, &by_id("n")), None);
    }

    #[test]
    fn disguised_settings_link_is_not_a_reject() {
        let mut config = ClassificationConfig::builtin();
        // A loose reject pattern that would text-match a settings button.
        config
            .controls
            .get_mut(&ControlType::Reject)
            .unwrap()
            .text_patterns
            .push(TextPatternRule::new("cookie", 2));
        let page = page(r#"<button class="settings-btn" id="cookie-settings">Cookie settings</button>"#);
        let classifier = ButtonClassifier::new(&config);
        assert!(classifier.find_by_type(&page, None, ControlType::Reject).is_none());
    }
}
