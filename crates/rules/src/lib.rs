use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use consentry_core::{ClassificationConfig, ConsentError, RuleSource};

/// Fetches the classification rule document from a remote endpoint.
pub struct HttpRuleSource {
    client: Client,
    url: String,
}

impl HttpRuleSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: Client::new(), url: url.into() }
    }
}

#[async_trait]
impl RuleSource for HttpRuleSource {
    async fn load(&self) -> Result<ClassificationConfig, ConsentError> {
        let value: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ConsentError::config_error(format!("rule fetch failed: {}", e)))?
            .error_for_status()
            .map_err(|e| ConsentError::config_error(format!("rule fetch failed: {}", e)))?
            .json()
            .await
            .map_err(|e| ConsentError::config_error(format!("rule document not JSON: {}", e)))?;

        let config = ClassificationConfig::from_value(value)
            .map_err(|e| ConsentError::config_error(e.to_string()))?;
        debug!(url = %self.url, version = config.version, "rule document loaded");
        Ok(config)
    }
}

/// Reads the rule document from a local JSON file.
pub struct FileRuleSource {
    path: String,
}

impl FileRuleSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RuleSource for FileRuleSource {
    async fn load(&self) -> Result<ClassificationConfig, ConsentError> {
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConsentError::config_error(format!("{}: {}", self.path, e)))?;
        let value: serde_json::Value = serde_json::from_str(&data)
            .map_err(|e| ConsentError::config_error(format!("{}: {}", self.path, e)))?;
        ClassificationConfig::from_value(value)
            .map_err(|e| ConsentError::config_error(e.to_string()))
    }
}

/// Always serves the compiled-in rule set.
pub struct BuiltinRuleSource;

#[async_trait]
impl RuleSource for BuiltinRuleSource {
    async fn load(&self) -> Result<ClassificationConfig, ConsentError> {
        Ok(ClassificationConfig::builtin())
    }
}

/// Loads from the inner source once and serves the cached document
/// afterwards. A failed load falls back to the builtin rule set, which is
/// NOT cached, so a later call retries the source.
pub struct CachedRuleSource<S> {
    inner: S,
    cached: Mutex<Option<ClassificationConfig>>,
}

impl<S: RuleSource> CachedRuleSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, cached: Mutex::new(None) }
    }
}

#[async_trait]
impl<S: RuleSource> RuleSource for CachedRuleSource<S> {
    async fn load(&self) -> Result<ClassificationConfig, ConsentError> {
        let mut cached = self.cached.lock().await;
        if let Some(config) = cached.as_ref() {
            return Ok(config.clone());
        }
        match self.inner.load().await {
            Ok(config) => {
                *cached = Some(config.clone());
                Ok(config)
            }
            Err(err) => {
                warn!(%err, "rule source failed, serving builtin rules");
                Ok(ClassificationConfig::builtin())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RuleSource for &CountingSource {
        async fn load(&self) -> Result<ClassificationConfig, ConsentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ConsentError::config_error("unreachable"))
            } else {
                Ok(ClassificationConfig::builtin())
            }
        }
    }

    #[tokio::test]
    async fn cached_source_loads_once() {
        let source = CountingSource { calls: AtomicUsize::new(0), fail: false };
        let cached = CachedRuleSource::new(&source);
        cached.load().await.unwrap();
        cached.load().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_serves_builtin_and_retries_later() {
        let source = CountingSource { calls: AtomicUsize::new(0), fail: true };
        let cached = CachedRuleSource::new(&source);
        let config = cached.load().await.unwrap();
        assert!(!config.controls.is_empty());
        cached.load().await.unwrap();
        // Fallback is not cached: the source is consulted each time.
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn file_source_rejects_missing_file() {
        let source = FileRuleSource::new("/nonexistent/rules.json");
        assert!(source.load().await.is_err());
    }

    #[tokio::test]
    async fn file_source_parses_a_rule_document() {
        let dir = std::env::temp_dir().join(format!("consentry-rules-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rules.json");
        let doc = serde_json::json!({
            "version": 7,
            "controls": {
                "accept": {
                    "selectors": [{ "query": "#accept-all", "priority": 10 }],
                    "textPatterns": [{ "pattern": "accept all", "priority": 5 }]
                }
            }
        });
        std::fs::write(&path, doc.to_string()).unwrap();

        let config = FileRuleSource::new(path.to_str().unwrap()).load().await.unwrap();
        assert_eq!(config.version, 7);
        assert!(config.rules_for(consentry_core::ControlType::Accept).is_some());
        std::fs::remove_dir_all(&dir).ok();
    }
}
