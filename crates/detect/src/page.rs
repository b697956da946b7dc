use std::collections::HashMap;

use ego_tree::NodeId;
use scraper::{ElementRef, Html};

use consentry_core::PageCapture;

use crate::style::NodeMetrics;
use crate::text;

/// Attribute the host capture stamps on every element so dispatches can
/// address the node it analyzed.
pub const NODE_STAMP_ATTR: &str = "data-cmx-i";

/// Upper bound on scanned elements. Deeply nested or enormous documents
/// are cut off here rather than walked to completion.
pub const MAX_SCANNED_ELEMENTS: usize = 20_000;

const SIGNATURE_TEXT_HEAD: usize = 50;

/// Content-derived stable identity for an element. Survives DOM node
/// replacement: two structurally identical re-renders of the same control
/// produce the same signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementSignature(String);

impl ElementSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ElementSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed page snapshot: document tree plus per-element rendered
/// metrics, keyed by a stable `u64` handle.
///
/// Handles come from the host's stamped [`NODE_STAMP_ATTR`] attribute when
/// present, else from document order, so a model built from raw HTML (the
/// static-analysis and test path) still has stable, addressable handles.
pub struct PageModel {
    doc: Html,
    url: String,
    domain: String,
    metrics: HashMap<NodeId, NodeMetrics>,
    handles: HashMap<NodeId, u64>,
    by_handle: HashMap<u64, NodeId>,
    order: HashMap<NodeId, usize>,
    ordered: Vec<NodeId>,
    fallback: NodeMetrics,
}

impl PageModel {
    pub fn from_capture(capture: &PageCapture) -> Self {
        let captured: HashMap<u64, NodeMetrics> = capture
            .nodes
            .iter()
            .map(|n| (n.index, NodeMetrics::from_captured(n)))
            .collect();
        Self::build(&capture.html, &capture.url, captured)
    }

    /// Builds a model from raw HTML; metrics are derived from inline
    /// `style` attributes.
    pub fn from_html(html: &str, url: &str) -> Self {
        Self::build(html, url, HashMap::new())
    }

    fn build(html: &str, url: &str, captured: HashMap<u64, NodeMetrics>) -> Self {
        let doc = Html::parse_document(html);

        let mut metrics = HashMap::new();
        let mut handles = HashMap::new();
        let mut by_handle = HashMap::new();
        let mut order = HashMap::new();
        let mut ordered = Vec::new();

        // Explicit work-list descent in document order, bounded.
        let mut stack: Vec<NodeId> = vec![doc.tree.root().id()];
        let mut index: usize = 0;
        while let Some(id) = stack.pop() {
            if ordered.len() >= MAX_SCANNED_ELEMENTS {
                break;
            }
            let Some(node) = doc.tree.get(id) else { continue };
            let children: Vec<NodeId> = node.children().map(|c| c.id()).collect();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
            let Some(el) = ElementRef::wrap(node) else { continue };

            let handle = el
                .value()
                .attr(NODE_STAMP_ATTR)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(index as u64);
            let m = captured
                .get(&handle)
                .cloned()
                .unwrap_or_else(|| NodeMetrics::from_inline_style(el.value().attr("style")));

            metrics.insert(id, m);
            handles.insert(id, handle);
            by_handle.insert(handle, id);
            order.insert(id, index);
            ordered.push(id);
            index += 1;
        }

        Self {
            doc,
            url: url.to_string(),
            domain: domain_of(url),
            metrics,
            handles,
            by_handle,
            order,
            ordered,
            fallback: NodeMetrics::default(),
        }
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.doc.root_element()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// All scanned elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.ordered
            .iter()
            .filter_map(|id| self.doc.tree.get(*id).and_then(ElementRef::wrap))
    }

    pub fn handle_of(&self, el: &ElementRef<'_>) -> u64 {
        self.handles.get(&el.id()).copied().unwrap_or(u64::MAX)
    }

    pub fn element_by_handle(&self, handle: u64) -> Option<ElementRef<'_>> {
        self.by_handle
            .get(&handle)
            .and_then(|id| self.doc.tree.get(*id))
            .and_then(ElementRef::wrap)
    }

    /// Position in document order; ties into the dark-pattern prominence
    /// heuristic.
    pub fn order_of(&self, el: &ElementRef<'_>) -> usize {
        self.order.get(&el.id()).copied().unwrap_or(usize::MAX)
    }

    pub fn metrics_of(&self, el: &ElementRef<'_>) -> &NodeMetrics {
        self.metrics.get(&el.id()).unwrap_or(&self.fallback)
    }

    /// An element is visible only if it and every ancestor pass the
    /// visibility rule; hidden template markup never counts as live.
    pub fn is_visible(&self, el: &ElementRef<'_>) -> bool {
        if !self.metrics_of(el).visible() {
            return false;
        }
        el.ancestors()
            .filter_map(ElementRef::wrap)
            .all(|a| match self.metrics.get(&a.id()) {
                Some(m) => m.visible(),
                None => true,
            })
    }

    /// The element's visible text, normalized. Inputs have no text
    /// children; their visible label is the `value` attribute.
    pub fn text_of(&self, el: &ElementRef<'_>) -> String {
        let raw: String = el.text().collect::<Vec<_>>().join(" ");
        let normalized = text::normalize(&raw);
        if normalized.is_empty() && el.value().name() == "input" {
            return text::normalize(el.value().attr("value").unwrap_or(""));
        }
        normalized
    }

    pub fn signature_of(&self, el: &ElementRef<'_>) -> ElementSignature {
        let v = el.value();
        let tag = v.name();
        let id = v.attr("id").unwrap_or("");
        let mut classes: Vec<&str> = v.classes().collect();
        classes.sort_unstable();
        let text = self.text_of(el);
        let m = self.metrics_of(el);
        ElementSignature(format!(
            "{}#{}.{}|{}|{}x{}",
            tag,
            id,
            classes.join("."),
            text::excerpt(&text, SIGNATURE_TEXT_HEAD),
            m.width.round() as i64,
            m.height.round() as i64,
        ))
    }

    /// Serialized-size proxy for "rendered content size", used to pick the
    /// larger of two nested dialog candidates.
    pub fn content_size_of(&self, el: &ElementRef<'_>) -> usize {
        el.html().len()
    }

    pub fn is_ancestor_of(&self, ancestor: &ElementRef<'_>, el: &ElementRef<'_>) -> bool {
        el.ancestors().any(|a| a.id() == ancestor.id())
    }
}

fn domain_of(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host = host.split('@').next_back().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    host.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_follow_document_order_without_stamps() {
        let page = PageModel::from_html("<div><p>a</p><p>b</p></div>", "https://example.com");
        let handles: Vec<u64> = page.elements().map(|el| page.handle_of(&el)).collect();
        let mut sorted = handles.clone();
        sorted.sort_unstable();
        assert_eq!(handles, sorted);
    }

    #[test]
    fn stamped_attribute_wins_over_document_order() {
        let page = PageModel::from_html(
            r#"<div data-cmx-i="7"><p data-cmx-i="42">x</p></div>"#,
            "https://example.com",
        );
        let p = page.elements().find(|el| el.value().name() == "p").unwrap();
        assert_eq!(page.handle_of(&p), 42);
        assert_eq!(page.element_by_handle(42).unwrap().value().name(), "p");
    }

    #[test]
    fn hidden_ancestor_hides_descendants() {
        let page = PageModel::from_html(
            r#"<div style="display:none"><button>Accept</button></div>
               <button id="live">Accept</button>"#,
            "https://example.com",
        );
        let buttons: Vec<_> =
            page.elements().filter(|el| el.value().name() == "button").collect();
        assert_eq!(buttons.len(), 2);
        assert!(!page.is_visible(&buttons[0]));
        assert!(page.is_visible(&buttons[1]));
    }

    #[test]
    fn signature_is_stable_across_reparses() {
        let html = r#"<button id="ok" class="b a">Accept   all</button>"#;
        let p1 = PageModel::from_html(html, "https://example.com");
        let p2 = PageModel::from_html(html, "https://example.com");
        let b1 = p1.elements().find(|e| e.value().name() == "button").unwrap();
        let b2 = p2.elements().find(|e| e.value().name() == "button").unwrap();
        assert_eq!(p1.signature_of(&b1), p2.signature_of(&b2));
        assert!(p1.signature_of(&b1).as_str().contains("accept all"));
    }

    #[test]
    fn input_text_falls_back_to_the_value_attribute() {
        let page = PageModel::from_html(
            r#"<input type="submit" value="Accept  ALL cookies"><input type="checkbox">"#,
            "https://example.com",
        );
        let inputs: Vec<_> =
            page.elements().filter(|el| el.value().name() == "input").collect();
        assert_eq!(page.text_of(&inputs[0]), "accept all cookies");
        assert_eq!(page.text_of(&inputs[1]), "");
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(domain_of("https://www.example.de/path?q=1"), "www.example.de");
        assert_eq!(domain_of("http://host:8080/x"), "host");
        assert_eq!(domain_of("example.com"), "example.com");
    }
}
