pub mod controller;
pub mod detection;
pub mod session;

pub use controller::{AnchorFacts, ClickTarget, InteractionController};
pub use detection::{DetectionLoop, LoopHandle, LoopTimeouts, SessionSummary, StopReason};
pub use session::{ClickLedger, SessionState};
