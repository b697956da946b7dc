use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{ControlType, Region};

/// Structural matching rule, tried against a subtree in descending
/// priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorRule {
    pub query: String,
    #[serde(default)]
    pub priority: i32,
}

impl SelectorRule {
    pub fn new(query: impl Into<String>, priority: i32) -> Self {
        Self { query: query.into(), priority }
    }
}

/// Case-insensitive, whitespace-normalized substring rule against an
/// element's visible text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPatternRule {
    pub pattern: String,
    #[serde(default)]
    pub priority: i32,
}

impl TextPatternRule {
    pub fn new(pattern: impl Into<String>, priority: i32) -> Self {
        Self { pattern: pattern.into(), priority }
    }
}

/// Rule set for one control type. Selector rules are consulted strictly
/// before text rules; a selector hit is higher-confidence evidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeRules {
    #[serde(default)]
    pub selectors: Vec<SelectorRule>,
    #[serde(default, rename = "textPatterns", alias = "text_patterns")]
    pub text_patterns: Vec<TextPatternRule>,
    #[serde(default, rename = "excludePatterns", alias = "exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

/// Region detection rules: dialog-text patterns outrank domain patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRules {
    pub region: Region,
    #[serde(default, rename = "textPatterns", alias = "text_patterns")]
    pub text_patterns: Vec<String>,
    #[serde(default, rename = "domainPatterns", alias = "domain_patterns")]
    pub domain_patterns: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("rule document is not a JSON object")]
    NotAnObject,
    #[error("rule document has no usable rules")]
    Empty,
    #[error("rule document failed to deserialize: {0}")]
    Shape(#[from] serde_json::Error),
}

/// The complete, validated rule document driving detection and
/// classification. Loaded once from a rule source and cached; any failure
/// substitutes [`ClassificationConfig::builtin`] so initialization never
/// fails outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default)]
    pub version: u32,
    /// Rules per control type.
    pub controls: HashMap<ControlType, TypeRules>,
    /// Rules locating dialog containers.
    #[serde(default, rename = "dialogSelectors", alias = "dialog_selectors")]
    pub dialog_selectors: Vec<SelectorRule>,
    /// Text vocabulary for the content-scan fallback.
    #[serde(default, rename = "dialogVocabulary", alias = "dialog_vocabulary")]
    pub dialog_vocabulary: Vec<TextPatternRule>,
    /// Keywords earning an id/class score bonus on dialog candidates.
    #[serde(default, rename = "dialogKeywords", alias = "dialog_keywords")]
    pub dialog_keywords: Vec<String>,
    /// Subtrees never searched for controls (footer/nav false positives).
    #[serde(default, rename = "exclusionSelectors", alias = "exclusion_selectors")]
    pub exclusion_selectors: Vec<String>,
    #[serde(default, rename = "regionRules", alias = "region_rules")]
    pub region_rules: Vec<RegionRules>,
    /// Terms a genuine reject control is expected to carry.
    #[serde(default, rename = "rejectVocabulary", alias = "reject_vocabulary")]
    pub reject_vocabulary: Vec<String>,
    /// Terms marking an anchor as a policy link rather than a consent action.
    #[serde(default, rename = "informationalTerms", alias = "informational_terms")]
    pub informational_terms: Vec<String>,
}

impl ClassificationConfig {
    pub fn rules_for(&self, ty: ControlType) -> Option<&TypeRules> {
        self.controls.get(&ty)
    }

    /// Validates a schema-less rule document into a typed config.
    ///
    /// Unknown control-type keys are skipped with a warning; anything that
    /// makes the document unusable is an error, and the caller falls back
    /// to [`ClassificationConfig::builtin`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let serde_json::Value::Object(mut doc) = value else {
            return Err(ConfigError::NotAnObject);
        };

        // Filter control keys first so one unknown type name does not
        // reject an otherwise valid document.
        let mut controls: HashMap<ControlType, TypeRules> = HashMap::new();
        if let Some(serde_json::Value::Object(raw)) = doc.remove("controls") {
            for (key, rules) in raw {
                let Some(ty) = ControlType::parse(&key) else {
                    warn!(key = %key, "ignoring unknown control type in rule document");
                    continue;
                };
                controls.insert(ty, serde_json::from_value(rules)?);
            }
        }

        doc.insert("controls".into(), serde_json::json!({}));
        let mut config: ClassificationConfig =
            serde_json::from_value(serde_json::Value::Object(doc))?;
        config.controls = controls;

        if config.controls.is_empty()
            && config.dialog_selectors.is_empty()
            && config.dialog_vocabulary.is_empty()
        {
            return Err(ConfigError::Empty);
        }
        Ok(config)
    }

    /// Minimal built-in rule set used when the external rule source is
    /// unavailable or malformed.
    pub fn builtin() -> Self {
        let mut controls = HashMap::new();

        controls.insert(
            ControlType::Accept,
            TypeRules {
                selectors: vec![
                    SelectorRule::new("#onetrust-accept-btn-handler", 10),
                    SelectorRule::new("#didomi-notice-agree-button", 10),
                    SelectorRule::new(r#"button[data-cookiebanner="accept_button"]"#, 9),
                    SelectorRule::new(".cc-allow", 8),
                    SelectorRule::new(r#"[id*="accept-all"]"#, 6),
                ],
                text_patterns: vec![
                    TextPatternRule::new("accept all", 10),
                    TextPatternRule::new("allow all", 9),
                    TextPatternRule::new("accept cookies", 9),
                    TextPatternRule::new("i accept", 8),
                    TextPatternRule::new("i agree", 8),
                    TextPatternRule::new("agree", 7),
                    TextPatternRule::new("accept", 6),
                    TextPatternRule::new("allow", 5),
                    TextPatternRule::new("got it", 5),
                    TextPatternRule::new("consent", 4),
                    TextPatternRule::new("ok", 3),
                ],
                exclude_patterns: vec![
                    "not accept".into(),
                    "settings".into(),
                    "learn more".into(),
                    "manage".into(),
                ],
            },
        );

        controls.insert(
            ControlType::Reject,
            TypeRules {
                selectors: vec![
                    SelectorRule::new("#onetrust-reject-all-handler", 10),
                    SelectorRule::new(".cc-deny", 8),
                    SelectorRule::new(r#"[id*="reject-all"]"#, 6),
                ],
                text_patterns: vec![
                    TextPatternRule::new("reject all", 10),
                    TextPatternRule::new("decline all", 9),
                    TextPatternRule::new("reject", 8),
                    TextPatternRule::new("decline", 7),
                    TextPatternRule::new("refuse", 6),
                    TextPatternRule::new("deny", 6),
                    TextPatternRule::new("disagree", 5),
                    TextPatternRule::new("opt out", 4),
                ],
                exclude_patterns: vec!["cookie policy".into(), "learn more".into()],
            },
        );

        controls.insert(
            ControlType::Essential,
            TypeRules {
                selectors: vec![SelectorRule::new(r#"[id*="essential-only"]"#, 6)],
                text_patterns: vec![
                    TextPatternRule::new("essential only", 10),
                    TextPatternRule::new("only essential", 10),
                    TextPatternRule::new("necessary only", 9),
                    TextPatternRule::new("only necessary", 9),
                    TextPatternRule::new("essential cookies", 7),
                    TextPatternRule::new("required only", 6),
                ],
                exclude_patterns: vec![],
            },
        );

        controls.insert(
            ControlType::Customize,
            TypeRules {
                selectors: vec![
                    SelectorRule::new("#onetrust-pc-btn-handler", 9),
                    SelectorRule::new(".cc-settings", 7),
                ],
                text_patterns: vec![
                    TextPatternRule::new("cookie settings", 9),
                    TextPatternRule::new("manage preferences", 9),
                    TextPatternRule::new("manage cookies", 8),
                    TextPatternRule::new("customize", 7),
                    TextPatternRule::new("customise", 7),
                    TextPatternRule::new("preferences", 5),
                    TextPatternRule::new("more options", 4),
                ],
                exclude_patterns: vec!["privacy policy".into()],
            },
        );

        controls.insert(
            ControlType::Analytics,
            TypeRules {
                selectors: vec![
                    SelectorRule::new(r#"input[id*="analytic"]"#, 8),
                    SelectorRule::new(r#"input[name*="statistic"]"#, 6),
                ],
                text_patterns: vec![
                    TextPatternRule::new("analytics", 9),
                    TextPatternRule::new("statistics", 8),
                    TextPatternRule::new("performance", 6),
                    TextPatternRule::new("measurement", 5),
                ],
                exclude_patterns: vec![],
            },
        );

        controls.insert(
            ControlType::Advertising,
            TypeRules {
                selectors: vec![
                    SelectorRule::new(r#"input[id*="advertis"]"#, 8),
                    SelectorRule::new(r#"input[name*="marketing"]"#, 6),
                ],
                text_patterns: vec![
                    TextPatternRule::new("advertising", 9),
                    TextPatternRule::new("marketing", 8),
                    TextPatternRule::new("targeting", 7),
                    TextPatternRule::new("personalised ads", 6),
                    TextPatternRule::new("personalized ads", 6),
                ],
                exclude_patterns: vec![],
            },
        );

        controls.insert(
            ControlType::Necessary,
            TypeRules {
                selectors: vec![SelectorRule::new(r#"input[id*="necessary"]"#, 8)],
                text_patterns: vec![
                    TextPatternRule::new("strictly necessary", 9),
                    TextPatternRule::new("necessary", 8),
                    TextPatternRule::new("essential", 7),
                    TextPatternRule::new("required", 5),
                ],
                exclude_patterns: vec![],
            },
        );

        Self {
            version: 1,
            controls,
            dialog_selectors: vec![
                SelectorRule::new("#onetrust-banner-sdk", 10),
                SelectorRule::new("#didomi-host", 10),
                SelectorRule::new("#cookie-banner", 9),
                SelectorRule::new(".cookie-banner", 8),
                SelectorRule::new(".cookie-notice", 8),
                SelectorRule::new(".cookie-consent", 8),
                SelectorRule::new(r#"[id*="cookie"]"#, 5),
                SelectorRule::new(r#"[class*="consent"]"#, 5),
                SelectorRule::new(r#"div[role="dialog"]"#, 4),
                SelectorRule::new(r#"div[aria-modal="true"]"#, 4),
            ],
            dialog_vocabulary: vec![
                TextPatternRule::new("we use cookies", 8),
                TextPatternRule::new("this site uses cookies", 8),
                TextPatternRule::new("cookie", 5),
                TextPatternRule::new("consent", 5),
                TextPatternRule::new("your privacy", 5),
                TextPatternRule::new("gdpr", 5),
                TextPatternRule::new("privacy", 3),
            ],
            dialog_keywords: vec![
                "cookie".into(),
                "consent".into(),
                "gdpr".into(),
                "privacy".into(),
                "banner".into(),
            ],
            exclusion_selectors: vec![
                "footer".into(),
                "nav".into(),
                ".footer".into(),
                ".site-footer".into(),
            ],
            region_rules: vec![
                RegionRules {
                    region: Region::Eu,
                    text_patterns: vec![
                        "gdpr".into(),
                        "general data protection regulation".into(),
                        "eprivacy".into(),
                        "legitimate interest".into(),
                    ],
                    domain_patterns: vec![
                        ".eu".into(),
                        ".de".into(),
                        ".fr".into(),
                        ".it".into(),
                        ".es".into(),
                        ".nl".into(),
                        ".pl".into(),
                        ".at".into(),
                        ".be".into(),
                        ".ie".into(),
                        ".fi".into(),
                        ".se".into(),
                        ".dk".into(),
                        ".pt".into(),
                        ".co.uk".into(),
                    ],
                },
                RegionRules {
                    region: Region::California,
                    text_patterns: vec![
                        "ccpa".into(),
                        "california consumer privacy act".into(),
                        "cpra".into(),
                        "do not sell".into(),
                        "do not share my personal information".into(),
                    ],
                    domain_patterns: vec![".ca.gov".into(), "california".into()],
                },
            ],
            reject_vocabulary: vec![
                "reject".into(),
                "decline".into(),
                "refuse".into(),
                "deny".into(),
                "disagree".into(),
                "opt out".into(),
                "only essential".into(),
                "only necessary".into(),
                "necessary only".into(),
            ],
            informational_terms: vec![
                "learn more".into(),
                "cookie policy".into(),
                "privacy policy".into(),
                "privacy statement".into(),
                "more information".into(),
                "read more".into(),
                "find out more".into(),
            ],
        }
    }
}
