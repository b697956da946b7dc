use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConsentError;

/// Computed facts for one element, captured in document order. The host
/// stamps each element with a `data-cmx-i` attribute carrying `index` so
/// later dispatches can address the same node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedNode {
    pub index: u64,
    pub width: f32,
    pub height: f32,
    pub visible: bool,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub visibility: String,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub font_size: f32,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub background_color: String,
    #[serde(default)]
    pub padding: String,
}

fn default_opacity() -> f32 {
    1.0
}

/// Snapshot of a live page: serialized markup plus per-element computed
/// style facts. The wire shape between host and detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCapture {
    pub url: String,
    pub html: String,
    #[serde(default)]
    pub nodes: Vec<CapturedNode>,
}

/// Click dispatch strategies, tried in a fixed ladder by the interaction
/// controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClickDispatch {
    /// mousedown → mouseup → click; optionally neutralizes the enclosing
    /// form's submit path for the duration of the dispatch.
    PointerSequence { neutralize_form: bool },
    /// focus + Enter key press, for ARIA-role and framework controls.
    KeyboardActivate,
    /// Clone the node off-screen, click the clone, discard it.
    CloneClick,
    /// Plain direct activation, last resort.
    DirectActivate,
}

/// One batch of subtree-change notifications from the host environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationBatch {
    /// Stamped indices of changed subtree roots, when known.
    #[serde(default)]
    pub roots: Vec<u64>,
    /// Number of added nodes in the batch.
    #[serde(default)]
    pub added: usize,
}

/// The host-environment seam: a live browser page (or an in-memory fake
/// in tests). The detection core only ever talks to the page through this
/// trait.
#[async_trait]
pub trait PageHost: Send + Sync {
    /// Annotate the document and capture a snapshot of it.
    async fn capture(&self) -> Result<PageCapture, ConsentError>;

    /// Dispatch a click strategy against the element stamped `node`.
    async fn dispatch(&self, node: u64, strategy: ClickDispatch) -> Result<(), ConsentError>;

    /// The page's current navigational identity (href).
    async fn location(&self) -> Result<String, ConsentError>;

    /// Cancel any in-flight load and navigate back (rollback path).
    async fn stop_and_back(&self) -> Result<(), ConsentError>;

    /// Drain accumulated subtree-change batches, in delivery order.
    async fn drain_mutations(&self) -> Result<Vec<MutationBatch>, ConsentError>;
}
