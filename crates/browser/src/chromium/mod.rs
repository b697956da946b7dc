mod wait;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig, HeadlessMode};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::json;
use tracing::debug;

use consentry_core::{ClickDispatch, ConsentError, MutationBatch, PageCapture, PageHost};

use crate::shared::{TimeoutConfig, js, to_consent_error};
use wait::WaitStrategy;

/// Upper bound on stamped elements per snapshot.
const CAPTURE_ELEMENT_CAP: u64 = 20_000;

/// Live Chromium page behind the [`PageHost`] seam. One host owns one
/// browser instance and one page.
pub struct ChromiumHost {
    _browser: Browser,
    page: Page,
    timeouts: TimeoutConfig,
}

impl ChromiumHost {
    pub async fn launch(headless: bool, timeouts: TimeoutConfig) -> Result<Self, ConsentError> {
        let temp_dir = std::env::temp_dir().join(format!("chromium-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&temp_dir)
            .map_err(|e| ConsentError::browser_error(format!("Failed to create temp dir: {}", e)))?;

        let chrome_cfg = ChromeConfig::builder()
            .headless_mode(if headless { HeadlessMode::True } else { HeadlessMode::False })
            .user_data_dir(temp_dir)
            .build()
            .map_err(|e| ConsentError::browser_error(format!("Config failed: {}", e)))?;

        let (browser, mut handler) = Browser::launch(chrome_cfg)
            .await
            .map_err(|e| ConsentError::browser_error(format!("Launch failed: {}", e)))?;

        tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ConsentError::browser_error(format!("New page failed: {}", e)))?;

        Ok(Self { _browser: browser, page, timeouts })
    }

    /// Navigates, waits for the page to settle, and installs the
    /// subtree-change observer.
    pub async fn open(&self, url: &str) -> Result<(), ConsentError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ConsentError::navigation_error(format!("Navigation failed: {}", e)))?;

        WaitStrategy::new(self.timeouts.clone()).wait_for_stable(&self.page).await?;

        let installed = self.eval(js::build_js_call(js::observe::INSTALL_OBSERVER, &[]), "InstallObserver").await?;
        debug!(url, ?installed, "page open");
        Ok(())
    }

    async fn eval(&self, call: String, action: &str) -> Result<serde_json::Value, ConsentError> {
        let result = tokio::time::timeout(self.timeouts.script, self.page.evaluate(call))
            .await
            .map_err(|_| ConsentError::timeout_error(format!("{} script timed out", action)))?
            .map_err(|e| to_consent_error(e, action))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl PageHost for ChromiumHost {
    async fn capture(&self) -> Result<PageCapture, ConsentError> {
        let call = js::build_js_call(js::capture::CAPTURE_SNAPSHOT, &[json!(CAPTURE_ELEMENT_CAP)]);
        let value = self.eval(call, "Capture").await?;
        serde_json::from_value(value)
            .map_err(|e| ConsentError::script_error(format!("Snapshot decode failed: {}", e)))
    }

    async fn dispatch(&self, node: u64, strategy: ClickDispatch) -> Result<(), ConsentError> {
        let (snippet, args, action) = match strategy {
            ClickDispatch::PointerSequence { neutralize_form } => {
                (js::click::POINTER_CLICK, vec![json!(node), json!(neutralize_form)], "PointerClick")
            }
            ClickDispatch::KeyboardActivate => {
                (js::click::KEYBOARD_ACTIVATE, vec![json!(node)], "KeyboardActivate")
            }
            ClickDispatch::CloneClick => (js::click::CLONE_CLICK, vec![json!(node)], "CloneClick"),
            ClickDispatch::DirectActivate => {
                (js::click::DIRECT_ACTIVATE, vec![json!(node)], "DirectActivate")
            }
        };

        let value = self.eval(js::build_js_call(snippet, &args), action).await?;
        let ok = value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
        if ok {
            Ok(())
        } else {
            let reason = value
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            Err(ConsentError::script_error(format!("{} rejected: {}", action, reason))
                .with_context(json!({ "node": node, "reason": reason })))
        }
    }

    async fn location(&self) -> Result<String, ConsentError> {
        let value = self.eval(js::build_js_call(js::capture::LOCATION_PROBE, &[]), "Location").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ConsentError::script_error("Location probe returned no href"))
    }

    async fn stop_and_back(&self) -> Result<(), ConsentError> {
        self.eval(js::build_js_call(js::observe::STOP_AND_BACK, &[]), "StopAndBack").await?;
        Ok(())
    }

    async fn drain_mutations(&self) -> Result<Vec<MutationBatch>, ConsentError> {
        let value = self.eval(js::build_js_call(js::observe::DRAIN_MUTATIONS, &[]), "DrainMutations").await?;
        if value.is_null() {
            return Ok(vec![]);
        }
        serde_json::from_value(value)
            .map_err(|e| ConsentError::script_error(format!("Mutation decode failed: {}", e)))
    }
}
