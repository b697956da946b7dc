use consentry_core::ConsentError;

pub fn to_consent_error(e: impl std::fmt::Display, action: &str) -> ConsentError {
    let s = e.to_string();
    if s.contains("timeout") || s.contains("Timeout") {
        ConsentError::timeout_error(format!("{} timed out: {}", action, s))
    } else if s.contains("navigation") || s.contains("Navigation") {
        ConsentError::navigation_error(format!("{} navigation failed: {}", action, s))
    } else if s.contains("context") || s.contains("evaluate") {
        ConsentError::script_error(format!("{} script failed: {}", action, s))
    } else {
        ConsentError::browser_error(format!("{} failed: {}", action, s))
    }
}
