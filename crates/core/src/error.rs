use serde::{Deserialize, Serialize};

/// Error categories for programmatic handling and recovery decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A structural query was invalid for the current document
    Selector,
    /// Injected script evaluation failed
    Script,
    /// Navigation or page load errors
    Navigation,
    /// Timeout errors
    Timeout,
    /// Rule document missing or malformed
    Config,
    /// Reporting sink failures
    Report,
    /// Browser/driver errors
    Browser,
    /// Unknown or uncategorized errors
    Unknown,
}

/// Structured error with context for better debugging and recovery.
///
/// Nothing in the detection core is permitted to throw past its own
/// boundary; this type exists for the host and I/O seams, where a failure
/// still has to degrade to "no match" or a reported failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentError {
    pub category: ErrorCategory,
    pub message: String,
    /// Optional context (selector, node handle, url, etc.)
    pub context: serde_json::Value,
    /// Whether this error is potentially recoverable
    pub recoverable: bool,
    /// Suggested retry delay in milliseconds
    pub retry_after_ms: Option<u64>,
}

impl ConsentError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: serde_json::json!({}),
            recoverable: false,
            retry_after_ms: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }

    pub fn with_retry_delay(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self.recoverable = true;
        self
    }

    // Convenience constructors

    pub fn selector_error(query: impl Into<String>) -> Self {
        let query = query.into();
        Self::new(ErrorCategory::Selector, format!("Invalid selector: {}", query))
            .with_context(serde_json::json!({ "query": query }))
    }

    pub fn script_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Script, message)
    }

    pub fn navigation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Navigation, message).recoverable().with_retry_delay(1500)
    }

    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Timeout, message).recoverable().with_retry_delay(2000)
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, message)
    }

    pub fn report_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Report, message).recoverable().with_retry_delay(1000)
    }

    pub fn browser_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Browser, message)
    }
}

impl std::fmt::Display for ConsentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.category, self.message)
    }
}

impl std::error::Error for ConsentError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_marks_recoverable() {
        let err = ConsentError::browser_error("launch failed").with_retry_delay(500);
        assert!(err.recoverable);
        assert_eq!(err.retry_after_ms, Some(500));
    }

    #[test]
    fn selector_error_carries_query_context() {
        let err = ConsentError::selector_error("div[[");
        assert_eq!(err.category, ErrorCategory::Selector);
        assert_eq!(err.context["query"], "div[[");
    }
}
