use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use consentry_core::{ConsentError, DetectionReport, ReportAck, ReportSink};

/// Writes each report as a pretty-printed JSON file under `folder`.
pub struct JsonFileSink {
    pub folder: String,
    seq: AtomicU64,
}

impl JsonFileSink {
    pub fn new(folder: &str) -> Self {
        std::fs::create_dir_all(folder).ok(); // ensure folder exists
        Self { folder: folder.to_string(), seq: AtomicU64::new(0) }
    }
}

#[async_trait]
impl ReportSink for JsonFileSink {
    async fn report(&self, report: &DetectionReport) -> Result<ReportAck, ConsentError> {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let path = Path::new(&self.folder).join(format!("{}-{}.json", report.timestamp, n));
        let data = serde_json::to_string_pretty(report)
            .map_err(|e| ConsentError::report_error(e.to_string()))?;
        tokio::fs::write(path, data)
            .await
            .map_err(|e| ConsentError::report_error(e.to_string()))?;
        Ok(ReportAck { accepted: true })
    }
}

/// In-memory sink, mainly for tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    reports: Mutex<Vec<DetectionReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<DetectionReport> {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn report(&self, report: &DetectionReport) -> Result<ReportAck, ConsentError> {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).push(report.clone());
        Ok(ReportAck { accepted: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consentry_core::{ControlType, DetectionMethod};

    fn sample() -> DetectionReport {
        DetectionReport {
            signature: "button#accept|accept all|120x40".into(),
            matched_rule: "#accept".into(),
            detection_method: DetectionMethod::Selector,
            control_type: ControlType::Accept,
            control_text: "Accept all".into(),
            succeeded: true,
            timestamp: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        sink.report(&sample()).await.unwrap();
        let mut second = sample();
        second.control_type = ControlType::Reject;
        sink.report(&second).await.unwrap();

        let reports = sink.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].control_type, ControlType::Accept);
        assert_eq!(reports[1].control_type, ControlType::Reject);
    }

    #[tokio::test]
    async fn file_sink_writes_distinct_files() {
        let dir = std::env::temp_dir().join(format!("consentry-report-{}", std::process::id()));
        let sink = JsonFileSink::new(dir.to_str().unwrap());
        sink.report(&sample()).await.unwrap();
        sink.report(&sample()).await.unwrap();

        let count = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(count, 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}
