use std::collections::HashSet;

/// Already-clicked tracking, keyed both by element handle (valid within
/// one DOM lifetime) and by content signature (survives node
/// replacement). An interaction is permitted only if BOTH lookups miss.
#[derive(Debug, Default)]
pub struct ClickLedger {
    by_node: HashSet<u64>,
    by_signature: HashSet<String>,
}

impl ClickLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, handle: u64, signature: &str) -> bool {
        self.by_node.contains(&handle) || self.by_signature.contains(signature)
    }

    /// Inserts both keys. Callers must do this synchronously after the
    /// gate checks, before any suspension point, so a second concurrent
    /// trigger cannot race through.
    pub fn record(&mut self, handle: u64, signature: String) {
        self.by_node.insert(handle);
        self.by_signature.insert(signature);
    }

    /// Combined check-then-insert in one call.
    pub fn try_acquire(&mut self, handle: u64, signature: &str) -> bool {
        if self.contains(handle, signature) {
            return false;
        }
        self.record(handle, signature.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.by_signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_signature.is_empty()
    }
}

/// Per-page-load session state. Created when the detection loop starts;
/// cleared only by a full re-initialization.
#[derive(Debug, Default)]
pub struct SessionState {
    processed_dialog_signatures: HashSet<String>,
    processed_domains: HashSet<String>,
    stopped: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `stopped` is monotonic: once set, only constructing a fresh
    /// session clears it.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Marks a dialog signature as processed; returns true when it was
    /// not seen before.
    pub fn mark_dialog(&mut self, signature: &str) -> bool {
        self.processed_dialog_signatures.insert(signature.to_string())
    }

    pub fn domain_done(&self, domain: &str) -> bool {
        self.processed_domains.contains(domain)
    }

    pub fn mark_domain(&mut self, domain: String) {
        self.processed_domains.insert(domain);
    }

    /// An explicit user-triggered re-scan re-enables interaction for
    /// dialogs and domains already handled this session.
    pub fn reset_for_rescan(&mut self) {
        self.processed_dialog_signatures.clear();
        self.processed_domains.clear();
    }
}
