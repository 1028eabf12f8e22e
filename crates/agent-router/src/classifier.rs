//! Turn Classifier
//!
//! Maps text to a [`RoutingLabel`] by walking an ordered rule list. Text is
//! lowercased once, the first matching rule wins, and a default label covers
//! everything else. Rules are data: any pure `Fn(&str) -> bool` can be a
//! predicate, with keyword sets and regular expressions built in.

use std::collections::BTreeSet;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Identifies which agent should handle a turn
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingLabel(String);

impl RoutingLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoutingLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoutingLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for RoutingLabel {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// A pure test over normalized text
pub type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One routing rule: if the predicate holds, route to `label`
#[derive(Clone)]
pub struct Rule {
    name: String,
    label: RoutingLabel,
    predicate: Predicate,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<RoutingLabel>,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Matches when any keyword occurs anywhere in the text
    pub fn keywords<I, S>(label: impl Into<RoutingLabel>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| normalize(k.as_ref()))
            .filter(|k| !k.is_empty())
            .collect();
        let name = format!("keywords[{}]", keywords.join("|"));

        Self::new(name, label, move |text: &str| {
            keywords.iter().any(|k| text.contains(k.as_str()))
        })
    }

    /// Matches when the regular expression finds a match in the normalized text
    pub fn pattern(label: impl Into<RoutingLabel>, pattern: Regex) -> Self {
        let name = format!("pattern[{}]", pattern.as_str());
        Self::new(name, label, move |text: &str| pattern.is_match(text))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &RoutingLabel {
        &self.label
    }

    /// Evaluate against already-normalized text
    pub fn matches(&self, normalized: &str) -> bool {
        (self.predicate)(normalized)
    }
}

/// Case-fold text before matching
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
}

/// Outcome of classifying one text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub label: RoutingLabel,

    /// Name of the rule that fired; `None` means the default was used
    pub matched_rule: Option<String>,
}

/// First-match classification over `rules`, falling back to `default`
pub fn classify(text: &str, rules: &[Rule], default: &RoutingLabel) -> RoutingLabel {
    explain(text, rules, default).label
}

fn explain(text: &str, rules: &[Rule], default: &RoutingLabel) -> Classification {
    let normalized = normalize(text);

    rules
        .iter()
        .find(|rule| rule.matches(&normalized))
        .map_or_else(
            || Classification {
                label: default.clone(),
                matched_rule: None,
            },
            |rule| Classification {
                label: rule.label.clone(),
                matched_rule: Some(rule.name.clone()),
            },
        )
}

/// An ordered rule set plus a default label
#[derive(Clone, Debug)]
pub struct Classifier {
    rules: Vec<Rule>,
    default_label: RoutingLabel,
}

impl Classifier {
    pub fn new(default_label: impl Into<RoutingLabel>) -> Self {
        Self {
            rules: Vec::new(),
            default_label: default_label.into(),
        }
    }

    /// Append a rule; earlier rules take precedence
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn classify(&self, text: &str) -> RoutingLabel {
        classify(text, &self.rules, &self.default_label)
    }

    /// Classify and report which rule fired
    pub fn explain(&self, text: &str) -> Classification {
        explain(text, &self.rules, &self.default_label)
    }

    /// Every label this classifier can produce
    pub fn labels(&self) -> BTreeSet<RoutingLabel> {
        self.rules
            .iter()
            .map(|r| r.label.clone())
            .chain(std::iter::once(self.default_label.clone()))
            .collect()
    }

    pub fn default_label(&self) -> &RoutingLabel {
        &self.default_label
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
