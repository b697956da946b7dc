use std::sync::Arc;

use consentry_browser::{ChromiumHost, TimeoutConfig};
use consentry_core::{PageHost, ReportSink, RuleSource, Settings};
use consentry_engine::{DetectionLoop, LoopTimeouts};
use consentry_report::JsonFileSink;
use consentry_rules::{BuiltinRuleSource, CachedRuleSource, HttpRuleSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(|| "https://example.com".to_string());

    let host = Arc::new(ChromiumHost::launch(true, TimeoutConfig::default()).await?);
    host.open(&url).await?;

    let rules: Arc<dyn RuleSource> = match std::env::var("CONSENTRY_RULES_URL") {
        Ok(rules_url) => Arc::new(CachedRuleSource::new(HttpRuleSource::new(rules_url))),
        Err(_) => Arc::new(BuiltinRuleSource),
    };
    let sink = Arc::new(JsonFileSink::new("./consent-reports"));

    let (detection, handle) = DetectionLoop::init(
        Arc::clone(&host) as Arc<dyn PageHost>,
        sink as Arc<dyn ReportSink>,
        rules,
        Settings::default(),
        LoopTimeouts::default(),
    )
    .await;

    // Ctrl-C maps to an explicit disable.
    tokio::spawn({
        let handle = handle.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.disable();
            }
        }
    });

    let summary = detection.run().await;
    println!(
        "done: {} dialog(s), {} interaction(s), stop reason {:?}",
        summary.dialogs_processed, summary.interactions, summary.stop
    );
    Ok(())
}
