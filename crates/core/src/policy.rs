use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::ControlType;

/// Which control types may be auto-clicked, and in what order candidates
/// are tried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonPreferences {
    pub order: Vec<ControlType>,
    #[serde(default)]
    pub enabled: HashMap<ControlType, bool>,
}

impl ButtonPreferences {
    pub fn is_enabled(&self, ty: ControlType) -> bool {
        self.enabled.get(&ty).copied().unwrap_or(true)
    }
}

impl Default for ButtonPreferences {
    fn default() -> Self {
        Self {
            order: vec![
                ControlType::Reject,
                ControlType::Essential,
                ControlType::Accept,
                ControlType::Customize,
            ],
            enabled: HashMap::new(),
        }
    }
}

/// Read-only policy input supplied by the caller. Determines whether
/// interaction is attempted at all, and in what control-type order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub enabled: bool,
    #[serde(rename = "autoAccept", alias = "auto_accept")]
    pub auto_accept: bool,
    #[serde(rename = "preferEssential", alias = "prefer_essential")]
    pub prefer_essential: bool,
    #[serde(rename = "buttonPreferences", alias = "button_preferences", default)]
    pub button_preferences: ButtonPreferences,
}

impl Settings {
    /// Preference order with policy applied: `prefer_essential` moves
    /// Essential to the front, disabled types are dropped.
    pub fn preference_order(&self) -> Vec<ControlType> {
        let mut order: Vec<ControlType> = self
            .button_preferences
            .order
            .iter()
            .copied()
            .filter(|ty| self.button_preferences.is_enabled(*ty))
            .collect();
        if self.prefer_essential {
            if let Some(pos) = order.iter().position(|t| *t == ControlType::Essential) {
                let essential = order.remove(pos);
                order.insert(0, essential);
            }
        }
        order
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_accept: true,
            prefer_essential: false,
            button_preferences: ButtonPreferences::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefer_essential_reorders() {
        let settings = Settings { prefer_essential: true, ..Settings::default() };
        assert_eq!(settings.preference_order()[0], ControlType::Essential);
    }

    #[test]
    fn disabled_types_are_dropped_from_order() {
        let mut settings = Settings::default();
        settings.button_preferences.enabled.insert(ControlType::Reject, false);
        assert!(!settings.preference_order().contains(&ControlType::Reject));
    }

    #[test]
    fn deserializes_camel_case_policy() {
        let settings: Settings = serde_json::from_str(
            r#"{ "enabled": true, "autoAccept": false, "preferEssential": true }"#,
        )
        .unwrap();
        assert!(!settings.auto_accept);
        assert!(settings.prefer_essential);
    }
}
