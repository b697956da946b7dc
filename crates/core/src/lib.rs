pub mod config;
pub mod error;
pub mod host;
pub mod policy;
pub mod report;
pub mod types;

pub use config::{ClassificationConfig, ConfigError, RegionRules, SelectorRule, TextPatternRule, TypeRules};
pub use error::{ConsentError, ErrorCategory};
pub use host::{CapturedNode, ClickDispatch, MutationBatch, PageCapture, PageHost};
pub use policy::{ButtonPreferences, Settings};
pub use report::{DetectionMethod, DetectionReport, ReportAck, ReportSink, RuleSource};
pub use types::{ControlType, Region, RegionVariant, Variant};
