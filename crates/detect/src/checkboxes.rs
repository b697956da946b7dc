use scraper::{ElementRef, Selector};

use consentry_core::{ClassificationConfig, ControlType};

use crate::finder::{by_priority, ElementFinder};
use crate::page::PageModel;
use crate::text;

/// Locates granular consent checkboxes (analytics, advertising,
/// necessary) and resolves their labels.
pub struct CheckboxClassifier<'c> {
    config: &'c ClassificationConfig,
}

impl<'c> CheckboxClassifier<'c> {
    pub fn new(config: &'c ClassificationConfig) -> Self {
        Self { config }
    }

    /// Selector rules first; otherwise enumerate checkbox-like elements
    /// and match the type's text patterns against each one's resolved
    /// label.
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

        let candidates: Vec<(ElementRef<'a>, String)> = self
            .checkbox_candidates(page, scope)
            .into_iter()
            .filter_map(|el| self.resolve_label(page, &el).map(|label| (el, label)))
            .collect();

        let excludes: Vec<String> =
            rules.exclude_patterns.iter().map(|p| text::normalize(p)).collect();
        for rule in by_priority(&rules.text_patterns, |r| r.priority) {
            let pattern = text::normalize(&rule.pattern);
            if pattern.is_empty() {
                continue;
            }
            for (el, label) in &candidates {
                if label.contains(&pattern)
                    && !excludes.iter().any(|x| !x.is_empty() && label.contains(x))
                {
                    return Some(*el);
                }
            }
        }
        None
    }

    /// Resolves the text labeling a checkbox, in priority order: explicit
    /// `for` attribute, wrapping ancestor label, adjacent sibling label,
    /// then a trailing text node synthesized as a virtual label. First hit
    /// wins.
    pub fn resolve_label(&self, page: &PageModel, el: &ElementRef<'_>) -> Option<String> {
        // 1. <label for="...">
        if let Some(id) = el.value().attr("id") {
            if let Ok(sel) = Selector::parse("label") {
                if let Some(label) = page
                    .root()
                    .select(&sel)
                    .find(|l| l.value().attr("for") == Some(id))
                {
                    return Some(page.text_of(&label));
                }
            }
        }

        // 2. Wrapping <label>.
        if let Some(label) = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().name() == "label")
        {
            return Some(page.text_of(&label));
        }

        // 3. Adjacent sibling <label>.
        let sibling_label = el
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .next()
            .filter(|s| s.value().name() == "label")
            .or_else(|| {
                el.prev_siblings()
                    .filter_map(ElementRef::wrap)
                    .next()
                    .filter(|s| s.value().name() == "label")
            });
        if let Some(label) = sibling_label {
            return Some(page.text_of(&label));
        }

        // 4. Trailing text node as a virtual label.
        for node in el.next_siblings() {
            if let Some(t) = node.value().as_text() {
                let normalized = text::normalize(t);
                if !normalized.is_empty() {
                    return Some(normalized);
                }
            }
            if node.value().is_element() {
                break;
            }
        }
        None
    }

    fn checkbox_candidates<'a>(
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
            .filter(|el| {
                let v = el.value();
                (v.name() == "input" && v.attr("type") == Some("checkbox"))
                    || matches!(v.attr("role"), Some("checkbox") | Some("switch"))
            })
            .filter(|el| page.is_visible(el))
            .filter(|el| !ElementFinder::is_excluded(page, el, &self.config.exclusion_selectors))
            .collect()
    }
}
