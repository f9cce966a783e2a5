//! Recognition of categorical disqualifiers.
//!
//! A rule author can mark a rule with `hardStop: true` (or `false`), and that
//! flag is final. Rules without the flag are matched against a list of known
//! rule ids and a set of patterns tried on the rule id and explanation.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{QualifyError, RuleDefinition};

/// Rule ids treated as hard stops when a rule carries no explicit flag.
pub const DEFAULT_HARD_STOP_RULES: [&str; 6] = [
    "snap-gross-income",
    "snap-net-income",
    "medicaid-income-limit",
    "tanf-income-limit",
    "wic-income-eligibility",
    "liheap-income-limit",
];

/// Patterns tried on the rule id and explanation.
pub const DEFAULT_HARD_STOP_PATTERNS: [&str; 2] = [r"(?i)income", r"(?i)hard[-_ ]?stop"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HardStopConfig {
    pub rule_ids: Vec<String>,
    pub patterns: Vec<String>,
}

impl Default for HardStopConfig {
    fn default() -> Self {
        Self {
            rule_ids: DEFAULT_HARD_STOP_RULES.iter().map(|s| (*s).to_owned()).collect(),
            patterns: DEFAULT_HARD_STOP_PATTERNS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Compiled form of a [`HardStopConfig`].
#[derive(Debug, Clone)]
pub struct HardStopPolicy {
    rule_ids: Vec<String>,
    patterns: Vec<Regex>,
}

impl HardStopPolicy {
    /// # Errors
    ///
    /// Returns [`QualifyError::Config`] if a pattern is not a valid regex.
    pub fn from_config(config: &HardStopConfig) -> Result<Self, QualifyError> {
        let patterns = config
            .patterns
            .iter()
            .map(String::as_str)
            .map(Regex::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rule_ids: config.rule_ids.clone(),
            patterns,
        })
    }

    /// A policy that only honours explicit flags.
    #[must_use]
    pub fn explicit_only() -> Self {
        Self {
            rule_ids: Vec::new(),
            patterns: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_hard_stop(&self, rule: &RuleDefinition) -> bool {
        if let Some(flag) = rule.hard_stop {
            return flag;
        }
        self.rule_ids.iter().any(|id| *id == rule.id)
            || self
                .patterns
                .iter()
                .any(|re| re.is_match(&rule.id) || re.is_match(&rule.explanation))
    }
}

impl Default for HardStopPolicy {
    fn default() -> Self {
        let patterns = DEFAULT_HARD_STOP_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            rule_ids: DEFAULT_HARD_STOP_RULES.iter().map(|s| (*s).to_owned()).collect(),
            patterns,
        }
    }
}
