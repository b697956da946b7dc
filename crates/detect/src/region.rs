use scraper::ElementRef;

use consentry_core::{ClassificationConfig, Region, RegionVariant, Variant};

use crate::page::PageModel;
use crate::text;

// Dark-pattern score weights. Heuristic and empirically tuned; the
// relative structure matters more than the exact values.
pub const W_FONT_DELTA: f32 = 1.0;
pub const W_MUTED_REJECT: f32 = 1.0;
pub const W_FILLED_ACCEPT: f32 = 1.0;
pub const W_PADDING: f32 = 0.5;
pub const W_PLACEMENT: f32 = 0.5;
pub const FONT_DELTA_PX: f32 = 2.0;
pub const DARK_PATTERN_THRESHOLD: f32 = 1.5;

/// Classifies a dialog's jurisdiction and consent-UI variant.
pub struct RegionVariantDetector<'c> {
    config: &'c ClassificationConfig,
}

impl<'c> RegionVariantDetector<'c> {
    pub fn new(config: &'c ClassificationConfig) -> Self {
        Self { config }
    }

    pub fn detect(
        &self,
        page: &PageModel,
        dialog: &ElementRef<'_>,
        accept: Option<&ElementRef<'_>>,
        reject: Option<&ElementRef<'_>>,
    ) -> RegionVariant {
        let dialog_text = page.text_of(dialog);
        RegionVariant {
            region: self.detect_region(&dialog_text, page.domain()),
            pattern: self.detect_variant(page, accept, reject),
        }
    }

    /// Region precedence: the dialog's own text outranks the domain; an
    /// operator's disclosure is stronger evidence than guessing from a
    /// TLD. Falls back to International.
    pub fn detect_region(&self, dialog_text: &str, domain: &str) -> Region {
        let content = text::normalize(dialog_text);
        for rules in &self.config.region_rules {
            if rules
                .text_patterns
                .iter()
                .map(|p| text::normalize(p))
                .any(|p| !p.is_empty() && content.contains(&p))
            {
                return rules.region;
            }
        }
        let domain = domain.to_ascii_lowercase();
        for rules in &self.config.region_rules {
            if rules.domain_patterns.iter().any(|p| domain_matches(&domain, p)) {
                return rules.region;
            }
        }
        Region::International
    }

    /// UI variant: no reject control at all → NoChoice; a "reject" that
    /// carries none of the reject vocabulary → Unknown; otherwise the
    /// accept/reject style comparison decides DarkPattern vs Standard.
    pub fn detect_variant(
        &self,
        page: &PageModel,
        accept: Option<&ElementRef<'_>>,
        reject: Option<&ElementRef<'_>>,
    ) -> Variant {
        let Some(reject) = reject else {
            return Variant::NoChoice;
        };
        if !self.passes_reject_check(page, reject) {
            return Variant::Unknown;
        }
        let Some(accept) = accept else {
            return Variant::Standard;
        };
        if self.compare_styles(page, accept, reject) >= DARK_PATTERN_THRESHOLD {
            Variant::DarkPattern
        } else {
            Variant::Standard
        }
    }

    /// Dark-pattern score from visual asymmetry between accept and reject.
    pub fn compare_styles(
        &self,
        page: &PageModel,
        accept: &ElementRef<'_>,
        reject: &ElementRef<'_>,
    ) -> f32 {
        let am = page.metrics_of(accept);
        let rm = page.metrics_of(reject);
        let mut score = 0.0;

        if let (Some(af), Some(rf)) = (am.font_size, rm.font_size) {
            if (af - rf).abs() > FONT_DELTA_PX {
                score += W_FONT_DELTA;
            }
        }

        let accept_muted = am.color.map(|c| c.is_muted()).unwrap_or(false);
        let reject_muted = rm.color.map(|c| c.is_muted()).unwrap_or(false);
        if reject_muted && !accept_muted {
            score += W_MUTED_REJECT;
        }

        let accept_filled = am.background.map(|c| c.is_filled()).unwrap_or(false);
        let reject_filled = rm.background.map(|c| c.is_filled()).unwrap_or(false);
        if accept_filled && !reject_filled {
            score += W_FILLED_ACCEPT;
        }

        if (am.padding.is_some() || rm.padding.is_some()) && am.padding != rm.padding {
            score += W_PADDING;
        }

        let different_parent = match (accept.parent(), reject.parent()) {
            (Some(a), Some(r)) => a.id() != r.id(),
            _ => false,
        };
        if different_parent && page.order_of(accept) < page.order_of(reject) {
            score += W_PLACEMENT;
        }

        score
    }

    fn passes_reject_check(&self, page: &PageModel, reject: &ElementRef<'_>) -> bool {
        let content = page.text_of(reject);
        let v = reject.value();
        let mut id_class = v.attr("id").unwrap_or("").to_ascii_lowercase();
        for class in v.classes() {
            id_class.push(' ');
            id_class.push_str(&class.to_ascii_lowercase());
        }
        self.config.reject_vocabulary.iter().any(|term| {
            let term = text::normalize(term);
            !term.is_empty() && (content.contains(&term) || id_class.contains(&term))
        })
    }
}

fn domain_matches(domain: &str, pattern: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    if pattern.starts_with('.') {
        domain.ends_with(&pattern)
    } else {
        domain.contains(&pattern)
    }
}
