use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use consentry_core::{
    ClassificationConfig, ControlType, DetectionMethod, PageCapture, PageHost, ReportSink,
    RuleSource, Settings,
};
use consentry_detect::{ButtonClassifier, DialogDetector, PageModel, RegionVariantDetector};

use crate::controller::{ClickTarget, InteractionController};
use crate::session::SessionState;

/// Timer configuration for one detection session.
#[derive(Debug, Clone)]
pub struct LoopTimeouts {
    /// Hard cutoff for the whole detection session.
    pub detection_window: Duration,
    /// Extra margin after the window before the failsafe timer fires.
    pub failsafe_margin: Duration,
    /// Mutation-poll interval.
    pub check_interval: Duration,
    /// Delay before the navigation-rollback probe after a form click.
    pub rollback_delay: Duration,
}

impl Default for LoopTimeouts {
    fn default() -> Self {
        Self {
            detection_window: Duration::from_secs(20),
            failsafe_margin: Duration::from_secs(10),
            check_interval: Duration::from_millis(300),
            rollback_delay: Duration::from_millis(800),
        }
    }
}

impl LoopTimeouts {
    pub fn with_detection_window(mut self, window: Duration) -> Self {
        self.detection_window = window;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Disabled,
    WindowElapsed,
    Failsafe,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub dialogs_processed: usize,
    pub interactions: usize,
    pub stop: StopReason,
}

/// Control handle for a running detection loop.
#[derive(Clone)]
pub struct LoopHandle {
    disable_tx: watch::Sender<bool>,
    rescan_tx: mpsc::Sender<()>,
}

impl LoopHandle {
    /// Explicit disable: the loop transitions to Stopped.
    pub fn disable(&self) {
        let _ = self.disable_tx.send(true);
    }

    /// Explicit user-triggered re-scan: clears per-domain and
    /// per-signature dedup, then re-runs detection.
    pub async fn request_rescan(&self) {
        let _ = self.rescan_tx.send(()).await;
    }
}

/// Orchestrates detection across the initial page scan and subsequent
/// change notifications, under a hard time window with idempotent
/// shutdown. States: Active, Stopped (terminal); re-entering requires a
/// fresh `init`, which creates a new session.
pub struct DetectionLoop {
    host: Arc<dyn PageHost>,
    settings: Settings,
    config: Arc<ClassificationConfig>,
    timeouts: LoopTimeouts,
    session: SessionState,
    controller: InteractionController,
    disable_rx: Option<watch::Receiver<bool>>,
    rescan_rx: Option<mpsc::Receiver<()>>,
    dialogs_processed: usize,
    interactions: usize,
}

impl DetectionLoop {
    /// Loads the rule config (substituting the builtin set on any
    /// failure, so initialization never fails outright) and builds a
    /// fresh session.
    pub async fn init(
        host: Arc<dyn PageHost>,
        sink: Arc<dyn ReportSink>,
        rules: Arc<dyn RuleSource>,
        settings: Settings,
        timeouts: LoopTimeouts,
    ) -> (Self, LoopHandle) {
        let config = match rules.load().await {
            Ok(config) => config,
            Err(err) => {
                warn!(%err, "rule source unavailable, using builtin rules");
                ClassificationConfig::builtin()
            }
        };
        let config = Arc::new(config);

        let (disable_tx, disable_rx) = watch::channel(false);
        let (rescan_tx, rescan_rx) = mpsc::channel(4);
        let controller = InteractionController::new(
            Arc::clone(&host),
            sink,
            Arc::clone(&config),
            timeouts.rollback_delay,
        );

        let detection_loop = Self {
            host,
            settings,
            config,
            timeouts,
            session: SessionState::new(),
            controller,
            disable_rx: Some(disable_rx),
            rescan_rx: Some(rescan_rx),
            dialogs_processed: 0,
            interactions: 0,
        };
        (detection_loop, LoopHandle { disable_tx, rescan_tx })
    }

    /// Runs until disabled, the detection window elapses, or the failsafe
    /// fires. Consumes the loop: Stopped is terminal.
    pub async fn run(mut self) -> SessionSummary {
        let (Some(mut disable_rx), Some(mut rescan_rx)) =
            (self.disable_rx.take(), self.rescan_rx.take())
        else {
            return self.finish(StopReason::Disabled);
        };

        if !self.settings.enabled {
            debug!("detection disabled by policy");
            return self.finish(StopReason::Disabled);
        }

        let window = tokio::time::sleep(self.timeouts.detection_window);
        let failsafe =
            tokio::time::sleep(self.timeouts.detection_window + self.timeouts.failsafe_margin);
        tokio::pin!(window, failsafe);
        let mut ticker = tokio::time::interval(self.timeouts.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        self.scan().await;

        let stop = loop {
            enum Wake {
                Poll,
                Rescan,
            }
            let wake = tokio::select! {
                _ = &mut window => break StopReason::WindowElapsed,
                _ = &mut failsafe => break StopReason::Failsafe,
                changed = disable_rx.changed() => {
                    if changed.is_err() || *disable_rx.borrow() {
                        break StopReason::Disabled;
                    }
                    continue;
                }
                recv = rescan_rx.recv() => match recv {
                    Some(()) => Wake::Rescan,
                    None => continue,
                },
                _ = ticker.tick() => Wake::Poll,
            };

            match wake {
                Wake::Rescan => {
                    self.session.reset_for_rescan();
                    self.scan().await;
                }
                Wake::Poll => {
                    let batches = match self.host.drain_mutations().await {
                        Ok(batches) => batches,
                        Err(err) => {
                            debug!(%err, "mutation drain failed");
                            continue;
                        }
                    };
                    if !batches.is_empty() {
                        debug!(batches = batches.len(), "subtree changes, re-scanning");
                        self.scan().await;
                    }
                }
            }
        };

        self.finish(stop)
    }

    fn finish(mut self, stop: StopReason) -> SessionSummary {
        self.session.stop();
        info!(?stop, dialogs = self.dialogs_processed, interactions = self.interactions,
            "detection session over");
        SessionSummary {
            dialogs_processed: self.dialogs_processed,
            interactions: self.interactions,
            stop,
        }
    }

    /// One full pass: capture, detect dialogs, classify, and (policy
    /// permitting) interact with the chosen control of each new dialog.
    async fn scan(&mut self) {
        if self.session.is_stopped() {
            return;
        }
        let capture = match self.host.capture().await {
            Ok(capture) => capture,
            Err(err) => {
                warn!(%err, "page capture failed");
                return;
            }
        };

        let (domain, planned) = self.plan(&capture);
        for plan in planned {
            if self.session.domain_done(&domain) {
                debug!(domain = %domain, "domain already handled this session");
                continue;
            }
            let attempted = self
                .controller
                .safe_click(&plan.target, plan.control_type, plan.method, &plan.matched_rule)
                .await;
            if attempted {
                self.session.mark_domain(domain.clone());
                self.interactions += 1;
            }
        }
    }

    /// Synchronous analysis pass over one capture. The parsed page model
    /// holds non-Send tendrils, so all element borrowing happens here and
    /// only owned click plans cross the interaction awaits.
    fn plan(&mut self, capture: &PageCapture) -> (String, Vec<PlannedClick>) {
        let page = PageModel::from_capture(capture);

        let config = Arc::clone(&self.config);
        let detector = DialogDetector::new(&config);
        let buttons = ButtonClassifier::new(&config);
        let regions = RegionVariantDetector::new(&config);
        let order = self.settings.preference_order();

        let mut planned = Vec::new();
        for candidate in detector.find_all(&page) {
            let dialog_signature = page.signature_of(&candidate.element).into_string();
            if !self.session.mark_dialog(&dialog_signature) {
                continue;
            }
            self.dialogs_processed += 1;

            let accept = buttons.find_by_type(&page, Some(candidate.element), ControlType::Accept);
            let reject = buttons.find_by_type(&page, Some(candidate.element), ControlType::Reject);
            let region_variant =
                regions.detect(&page, &candidate.element, accept.as_ref(), reject.as_ref());
            info!(
                signature = %dialog_signature,
                score = candidate.score,
                region = region_variant.region.as_str(),
                variant = region_variant.pattern.as_str(),
                "dialog detected"
            );

            if !self.settings.auto_accept {
                continue;
            }

            let chosen = order.iter().find_map(|ty| {
                let found = match ty {
                    ControlType::Accept => accept,
                    ControlType::Reject => reject,
                    other => buttons.find_by_type(&page, Some(candidate.element), *other),
                };
                found.map(|el| (el, *ty))
            });
            let Some((el, ty)) = chosen else {
                debug!("no preferred control found in dialog");
                continue;
            };

            planned.push(PlannedClick {
                target: ClickTarget::from_element(&page, &el),
                control_type: ty,
                method: candidate.method,
                matched_rule: candidate.matched_rules.first().cloned().unwrap_or_default(),
            });
        }
        (page.domain().to_string(), planned)
    }
}

/// A click decided during analysis, carried as owned data into the
/// interaction phase. The per-domain gate runs at click time: an earlier
/// plan in the same pass may already have claimed the domain.
struct PlannedClick {
    target: ClickTarget,
    control_type: ControlType,
    method: DetectionMethod,
    matched_rule: String,
}
