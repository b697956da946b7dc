use serde::{Deserialize, Serialize};

/// Semantic role of an interactive consent control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlType {
    Accept,
    Reject,
    Essential,
    Customize,
    Analytics,
    Advertising,
    Necessary,
}

impl ControlType {
    pub const ALL: [ControlType; 7] = [
        ControlType::Accept,
        ControlType::Reject,
        ControlType::Essential,
        ControlType::Customize,
        ControlType::Analytics,
        ControlType::Advertising,
        ControlType::Necessary,
    ];

    pub const BUTTONS: [ControlType; 4] = [
        ControlType::Accept,
        ControlType::Reject,
        ControlType::Essential,
        ControlType::Customize,
    ];

    pub const CHECKBOXES: [ControlType; 3] = [
        ControlType::Analytics,
        ControlType::Advertising,
        ControlType::Necessary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlType::Accept => "accept",
            ControlType::Reject => "reject",
            ControlType::Essential => "essential",
            ControlType::Customize => "customize",
            ControlType::Analytics => "analytics",
            ControlType::Advertising => "advertising",
            ControlType::Necessary => "necessary",
        }
    }

    pub fn parse(s: &str) -> Option<ControlType> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    pub fn is_button(&self) -> bool {
        Self::BUTTONS.contains(self)
    }

    pub fn is_checkbox(&self) -> bool {
        Self::CHECKBOXES.contains(self)
    }
}

impl std::fmt::Display for ControlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Jurisdiction a dialog appears to be written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Eu,
    California,
    International,
    Unknown,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Eu => "eu",
            Region::California => "california",
            Region::International => "international",
            Region::Unknown => "unknown",
        }
    }
}

/// Consent-UI pattern of a dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    Standard,
    DarkPattern,
    NoChoice,
    Unknown,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Standard => "standard",
            Variant::DarkPattern => "dark-pattern",
            Variant::NoChoice => "no-choice",
            Variant::Unknown => "unknown",
        }
    }
}

/// Region and UI-pattern classification of one dialog. The two axes are
/// computed independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionVariant {
    pub region: Region,
    pub pattern: Variant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_type_round_trips() {
        for ty in ControlType::ALL {
            assert_eq!(ControlType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(ControlType::parse("banner"), None);
    }

    #[test]
    fn buttons_and_checkboxes_partition_all_types() {
        for ty in ControlType::ALL {
            assert!(ty.is_button() != ty.is_checkbox());
        }
    }

    #[test]
    fn variant_serializes_kebab_case() {
        let v = serde_json::to_value(Variant::DarkPattern).unwrap();
        assert_eq!(v, serde_json::json!("dark-pattern"));
    }
}
