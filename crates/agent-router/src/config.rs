//! Routing Configuration
//!
//! Rules as data, loadable from TOML:
//!
//! ```toml
//! default_label = "search"
//!
//! [[rules]]
//! label = "custom"
//! keywords = ["horse", "dice"]
//!
//! [[rules]]
//! label = "custom"
//! pattern = '\broll\b.*\bd\d+\b'
//! ```

use std::path::Path;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, Rule};
use crate::error::{Result, RouterError};

/// Label of the tool-backed agent in the built-in rule set
pub const CUSTOM_LABEL: &str = "custom";

/// Label of the search agent, also the built-in default
pub const SEARCH_LABEL: &str = "search";

/// One rule entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub label: String,

    /// Substrings, matched case-insensitively
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Regular expression, matched case-insensitively
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Evaluated in order, first match wins
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Used when no rule matches
    pub default_label: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            rules: vec![RuleConfig {
                label: CUSTOM_LABEL.into(),
                keywords: vec!["horse".into(), "dice".into()],
                pattern: None,
            }],
            default_label: SEARCH_LABEL.into(),
        }
    }
}

impl RoutingConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| RouterError::InvalidConfig(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| RouterError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Compile into a classifier, keyword rule before pattern rule per entry
    pub fn build_classifier(&self) -> Result<Classifier> {
        if self.default_label.trim().is_empty() {
            return Err(RouterError::InvalidConfig("default_label is empty".into()));
        }

        let mut classifier = Classifier::new(self.default_label.as_str());

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.label.trim().is_empty() {
                return Err(RouterError::InvalidConfig(format!("rule {} has no label", index)));
            }
            if rule.keywords.is_empty() && rule.pattern.is_none() {
                return Err(RouterError::InvalidConfig(format!(
                    "rule {} ('{}') needs keywords or a pattern",
                    index, rule.label
                )));
            }

            if !rule.keywords.is_empty() {
                classifier = classifier.with_rule(Rule::keywords(rule.label.as_str(), &rule.keywords));
            }

            if let Some(pattern) = &rule.pattern {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| RouterError::InvalidConfig(format!("rule {}: {}", index, e)))?;
                classifier = classifier.with_rule(Rule::pattern(rule.label.as_str(), regex));
            }
        }

        Ok(classifier)
    }
}
