use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ClassificationConfig;
use crate::error::ConsentError;
use crate::types::ControlType;

/// How a control or dialog was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMethod {
    Selector,
    TextPattern,
    ContentScan,
}

/// One detection/interaction outcome, handed to the reporting sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Content-derived signature of the dialog or control.
    pub signature: String,
    #[serde(rename = "matchedRule")]
    pub matched_rule: String,
    #[serde(rename = "detectionMethod")]
    pub detection_method: DetectionMethod,
    #[serde(rename = "controlType")]
    pub control_type: ControlType,
    #[serde(rename = "controlText")]
    pub control_text: String,
    pub succeeded: bool,
    /// Milliseconds since the unix epoch.
    pub timestamp: u64,
}

impl DetectionReport {
    pub fn now_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportAck {
    pub accepted: bool,
}

/// External reporting collaborator. Failures to report are logged locally
/// and never abort detection.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn report(&self, report: &DetectionReport) -> Result<ReportAck, ConsentError>;
}

/// External rule document source. Implementations fetch/parse; the engine
/// caches the first success and substitutes the builtin config on failure.
#[async_trait]
pub trait RuleSource: Send + Sync {
    async fn load(&self) -> Result<ClassificationConfig, ConsentError>;
}
