use std::sync::Arc;
use std::time::Duration;

use scraper::ElementRef;
use tracing::{debug, warn};

use consentry_core::{
    ClassificationConfig, ClickDispatch, ControlType, DetectionMethod, DetectionReport, PageHost,
    ReportSink,
};
use consentry_detect::{PageModel, text};

use crate::session::ClickLedger;

/// Owned facts about a chosen control, extracted from the parsed page up
/// front. Interaction happens against this snapshot; the page model and
/// its element borrows never cross an await.
#[derive(Debug, Clone)]
pub struct ClickTarget {
    pub handle: u64,
    pub signature: String,
    pub text: String,
    pub in_form: bool,
    pub needs_keyboard: bool,
    pub anchor: Option<AnchorFacts>,
}

/// Anchor attributes the informational-link gate inspects.
#[derive(Debug, Clone)]
pub struct AnchorFacts {
    pub new_context: bool,
    pub href: String,
}

impl ClickTarget {
    pub fn from_element(page: &PageModel, el: &ElementRef<'_>) -> Self {
        let v = el.value();
        let anchor = (v.name() == "a").then(|| AnchorFacts {
            new_context: v.attr("target") == Some("_blank")
                || v.attr("rel")
                    .map(|r| r.contains("noopener") || r.contains("external"))
                    .unwrap_or(false),
            href: v.attr("href").unwrap_or("").to_ascii_lowercase(),
        });
        Self {
            handle: page.handle_of(el),
            signature: page.signature_of(el).into_string(),
            text: page.text_of(el),
            in_form: el
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| a.value().name() == "form"),
            needs_keyboard: v.attr("role").is_some()
                || !matches!(v.name(), "button" | "input" | "a"),
            anchor,
        }
    }
}

/// Performs the single, safety-checked click on a chosen control.
///
/// The safety gate runs synchronously, with no suspension point between
/// the ledger check and the ledger insert: that is the one hard ordering
/// guarantee the design requires.
pub struct InteractionController {
    host: Arc<dyn PageHost>,
    sink: Arc<dyn ReportSink>,
    config: Arc<ClassificationConfig>,
    ledger: ClickLedger,
    rollback_delay: Duration,
}

impl InteractionController {
    pub fn new(
        host: Arc<dyn PageHost>,
        sink: Arc<dyn ReportSink>,
        config: Arc<ClassificationConfig>,
        rollback_delay: Duration,
    ) -> Self {
        Self { host, sink, config, ledger: ClickLedger::new(), rollback_delay }
    }

    pub fn ledger(&self) -> &ClickLedger {
        &self.ledger
    }

    /// Returns true when an interaction was attempted and not refused by
    /// a safety rule. The dispatch outcome itself is carried in the
    /// report's `succeeded` flag.
    pub async fn safe_click(
        &mut self,
        target: &ClickTarget,
        control_type: ControlType,
        method: DetectionMethod,
        matched_rule: &str,
    ) -> bool {
        // Gate 1: both ledger keys must miss.
        if self.ledger.contains(target.handle, &target.signature) {
            debug!(signature = %target.signature, "refusing click: already interacted with this control");
            return false;
        }

        // Gate 2: policy links are not consent actions.
        if self.is_informational_link(target) {
            debug!(signature = %target.signature, "refusing click: informational link");
            return false;
        }

        // Gate 3: insert both keys before the first await.
        self.ledger.record(target.handle, target.signature.clone());

        let location_before = if target.in_form {
            self.host.location().await.ok()
        } else {
            None
        };

        let succeeded = self.dispatch_ladder(target).await;

        if let Some(before) = location_before {
            self.arm_rollback(before);
        }

        let report = DetectionReport {
            signature: target.signature.clone(),
            matched_rule: matched_rule.to_string(),
            detection_method: method,
            control_type,
            control_text: target.text.clone(),
            succeeded,
            timestamp: DetectionReport::now_ms(),
        };
        if let Err(err) = self.sink.report(&report).await {
            warn!(%err, "report sink failure (detection continues)");
        }

        true
    }

    /// Primary pointer sequence (form-neutralized inside forms, keyboard
    /// activation added for ARIA/framework controls), then clone-click,
    /// then plain activation as a last resort.
    async fn dispatch_ladder(&self, target: &ClickTarget) -> bool {
        let primary = ClickDispatch::PointerSequence { neutralize_form: target.in_form };
        match self.host.dispatch(target.handle, primary).await {
            Ok(()) => {
                if target.needs_keyboard {
                    if let Err(err) =
                        self.host.dispatch(target.handle, ClickDispatch::KeyboardActivate).await
                    {
                        debug!(%err, "keyboard activation failed after pointer click");
                    }
                }
                true
            }
            Err(err) => {
                debug!(%err, "pointer dispatch failed, falling back");
                for fallback in [ClickDispatch::CloneClick, ClickDispatch::DirectActivate] {
                    match self.host.dispatch(target.handle, fallback).await {
                        Ok(()) => return true,
                        Err(err) => debug!(%err, ?fallback, "fallback dispatch failed"),
                    }
                }
                false
            }
        }
    }

    /// Short timer comparing the page's navigational identity before and
    /// after a form click; an unexpected change cancels the in-flight
    /// load and navigates back.
    fn arm_rollback(&self, location_before: String) {
        let host = Arc::clone(&self.host);
        let delay = self.rollback_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match host.location().await {
                Ok(after) if after != location_before => {
                    warn!(before = %location_before, %after, "click navigated the page, rolling back");
                    if let Err(err) = host.stop_and_back().await {
                        warn!(%err, "navigation rollback failed");
                    }
                }
                Ok(_) => {}
                Err(err) => debug!(%err, "rollback location probe failed"),
            }
        });
    }

    /// An anchor that opens a new context and reads like documentation is
    /// a policy link, not a consent action.
    fn is_informational_link(&self, target: &ClickTarget) -> bool {
        let Some(anchor) = &target.anchor else { return false };
        if !anchor.new_context {
            return false;
        }
        self.config.informational_terms.iter().any(|term| {
            let term = text::normalize(term);
            !term.is_empty()
                && (target.text.contains(&term) || anchor.href.contains(&term.replace(' ', "-")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use consentry_core::{ConsentError, MutationBatch, PageCapture};
    use consentry_report::MemorySink;
    use std::sync::Mutex;

    /// In-memory page host recording every dispatch.
    struct FakeHost {
        dispatched: Mutex<Vec<(u64, ClickDispatch)>>,
        fail_pointer: bool,
        location: Mutex<String>,
        rolled_back: Mutex<bool>,
    }

    impl FakeHost {
        fn new() -> Self {
            Self {
                dispatched: Mutex::new(Vec::new()),
                fail_pointer: false,
                location: Mutex::new("https://example.com/".to_string()),
                rolled_back: Mutex::new(false),
            }
        }

        fn dispatch_count(&self) -> usize {
            self.dispatched.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PageHost for FakeHost {
        async fn capture(&self) -> Result<PageCapture, ConsentError> {
            Ok(PageCapture { url: "https://example.com/".into(), html: String::new(), nodes: vec![] })
        }

        async fn dispatch(&self, node: u64, strategy: ClickDispatch) -> Result<(), ConsentError> {
            if self.fail_pointer
                && matches!(strategy, ClickDispatch::PointerSequence { .. })
            {
                return Err(ConsentError::script_error("dispatch threw"));
            }
            self.dispatched.lock().unwrap().push((node, strategy));
            Ok(())
        }

        async fn location(&self) -> Result<String, ConsentError> {
            Ok(self.location.lock().unwrap().clone())
        }

        async fn stop_and_back(&self) -> Result<(), ConsentError> {
            *self.rolled_back.lock().unwrap() = true;
            Ok(())
        }

        async fn drain_mutations(&self) -> Result<Vec<MutationBatch>, ConsentError> {
            Ok(vec![])
        }
    }

    fn controller(host: Arc<FakeHost>, sink: Arc<MemorySink>) -> InteractionController {
        InteractionController::new(
            host,
            sink,
            Arc::new(ClassificationConfig::builtin()),
            Duration::from_millis(10),
        )
    }

    fn target_from(page: &PageModel, tag: &str) -> ClickTarget {
        let el = page.elements().find(|e| e.value().name() == tag).unwrap();
        ClickTarget::from_element(page, &el)
    }

    fn button_page() -> PageModel {
        PageModel::from_html(
            r#"<button id="acceptBtn">Accept all</button>"#,
            "https://example.com",
        )
    }

    #[tokio::test]
    async fn second_click_on_same_control_is_refused_without_dispatch() {
        let host = Arc::new(FakeHost::new());
        let sink = Arc::new(MemorySink::new());
        let mut ctl = controller(Arc::clone(&host), sink);
        let page = button_page();
        let target = target_from(&page, "button");

        assert!(
            ctl.safe_click(&target, ControlType::Accept, DetectionMethod::Selector, "#acceptBtn")
                .await
        );
        let after_first = host.dispatch_count();
        assert!(after_first >= 1);

        assert!(
            !ctl.safe_click(&target, ControlType::Accept, DetectionMethod::Selector, "#acceptBtn")
                .await
        );
        assert_eq!(host.dispatch_count(), after_first);
    }

    #[tokio::test]
    async fn rerendered_control_with_same_signature_is_refused() {
        let host = Arc::new(FakeHost::new());
        let sink = Arc::new(MemorySink::new());
        let mut ctl = controller(Arc::clone(&host), sink);

        // Same markup, different stamped handles: a node replacement.
        let p1 = PageModel::from_html(
            r#"<button data-cmx-i="5">Accept all</button>"#,
            "https://example.com",
        );
        let p2 = PageModel::from_html(
            r#"<button data-cmx-i="99">Accept all</button>"#,
            "https://example.com",
        );
        let t1 = target_from(&p1, "button");
        let t2 = target_from(&p2, "button");

        assert!(
            ctl.safe_click(&t1, ControlType::Accept, DetectionMethod::TextPattern, "accept all")
                .await
        );
        assert!(
            !ctl.safe_click(&t2, ControlType::Accept, DetectionMethod::TextPattern, "accept all")
                .await
        );
        assert_eq!(host.dispatch_count(), 1);
    }

    #[tokio::test]
    async fn informational_anchor_is_refused() {
        let host = Arc::new(FakeHost::new());
        let sink = Arc::new(MemorySink::new());
        let mut ctl = controller(Arc::clone(&host), sink);
        let page = PageModel::from_html(
            r#"<a class="btn" target="_blank" href="/cookies">Learn more about cookies</a>"#,
            "https://example.com",
        );
        let target = target_from(&page, "a");

        assert!(
            !ctl.safe_click(&target, ControlType::Accept, DetectionMethod::TextPattern, "x")
                .await
        );
        assert_eq!(host.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn dispatch_failure_falls_back_and_reports_outcome() {
        let mut host = FakeHost::new();
        host.fail_pointer = true;
        let host = Arc::new(host);
        let sink = Arc::new(MemorySink::new());
        let mut ctl = controller(Arc::clone(&host), Arc::clone(&sink));
        let page = button_page();
        let target = target_from(&page, "button");

        assert!(
            ctl.safe_click(&target, ControlType::Accept, DetectionMethod::Selector, "#acceptBtn")
                .await
        );
        // Clone-click fallback succeeded.
        let dispatched = host.dispatched.lock().unwrap().clone();
        assert_eq!(dispatched[0].1, ClickDispatch::CloneClick);

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].succeeded);
        assert_eq!(reports[0].control_text, "accept all");
    }

    #[tokio::test]
    async fn form_click_that_navigates_is_rolled_back() {
        let host = Arc::new(FakeHost::new());
        let sink = Arc::new(MemorySink::new());
        let mut ctl = controller(Arc::clone(&host), sink);
        let page = PageModel::from_html(
            r#"<form action="/submit"><button id="b">Accept all</button></form>"#,
            "https://example.com",
        );
        let target = target_from(&page, "button");
        assert!(target.in_form);

        assert!(
            ctl.safe_click(&target, ControlType::Accept, DetectionMethod::TextPattern, "accept all")
                .await
        );
        let dispatched = host.dispatched.lock().unwrap().clone();
        assert_eq!(dispatched[0].1, ClickDispatch::PointerSequence { neutralize_form: true });

        // Simulate the click having navigated; the rollback timer fires.
        *host.location.lock().unwrap() = "https://example.com/submit".to_string();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(*host.rolled_back.lock().unwrap());
    }
}
