use std::time::{Duration, Instant};

use chromiumoxide::page::Page;
use tokio::time::sleep;
use tracing::debug;

use consentry_core::ConsentError;

use crate::shared::{TimeoutConfig, js, to_consent_error};

pub struct WaitStrategy {
    config: TimeoutConfig,
}

impl WaitStrategy {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    /// Polls document readiness and in-flight resource requests until the
    /// page has been quiet for several consecutive checks. A timeout here
    /// is not fatal: detection proceeds on whatever is loaded.
    pub async fn wait_for_stable(&self, page: &Page) -> Result<(), ConsentError> {
        let timeout = self.config.page_stable;
        let start = Instant::now();
        let mut stable_checks = 0;
        let required_stable_checks = 5;

        // Give the navigation a moment to actually start.
        sleep(Duration::from_millis(500)).await;

        loop {
            let call = js::build_js_call(js::wait::CHECK_LOADING, &[]);
            let result = match page.evaluate(call).await {
                Ok(r) => r,
                Err(e) => {
                    let err_str = e.to_string();
                    if err_str.contains("Cannot find context")
                        || err_str.contains("Execution context was destroyed")
                    {
                        // Page is mid-navigation; reset and retry.
                        stable_checks = 0;
                        sleep(Duration::from_millis(1000)).await;
                        continue;
                    }
                    return Err(to_consent_error(e, "WaitForStable"));
                }
            };

            if let Some(obj) = result.value().and_then(|v| v.as_object()) {
                let ready = obj.get("readyState").and_then(|v| v.as_str()) == Some("complete");
                let active = obj.get("activeRequests").and_then(|v| v.as_u64()).unwrap_or(0);

                if ready && active == 0 {
                    stable_checks += 1;
                    if stable_checks >= required_stable_checks {
                        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "page stabilized");
                        sleep(self.config.settle_delay).await;
                        return Ok(());
                    }
                } else {
                    stable_checks = 0;
                }
            }

            if start.elapsed() > timeout {
                debug!("page stabilization timeout, continuing anyway");
                return Ok(());
            }

            sleep(self.config.check_interval).await;
        }
    }
}
