pub mod buttons;
pub mod checkboxes;
pub mod dialog;
pub mod finder;
pub mod page;
pub mod region;
pub mod style;
pub mod text;

pub use buttons::ButtonClassifier;
pub use checkboxes::CheckboxClassifier;
pub use dialog::{DialogCandidate, DialogDetector};
pub use finder::ElementFinder;
pub use page::{ElementSignature, PageModel};
pub use region::RegionVariantDetector;
pub use style::{NodeMetrics, Rgba};
