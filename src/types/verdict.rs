use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rule::{DocumentRequirement, NextStep};
use super::Value;

/// Eligibility status, ordered from most to least favourable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EligibilityStatus {
    Qualified,
    Likely,
    Maybe,
    Unlikely,
    NotQualified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl fmt::Display for EligibilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EligibilityStatus::Qualified => "qualified",
            EligibilityStatus::Likely => "likely",
            EligibilityStatus::Maybe => "maybe",
            EligibilityStatus::Unlikely => "unlikely",
            EligibilityStatus::NotQualified => "not-qualified",
        })
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        })
    }
}

/// Explanatory arithmetic shown next to a verdict. Display only; never
/// consulted by classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    pub label: String,
    pub value: Value,
    pub comparison: String,
}

/// The verdict for one program in one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramVerdict {
    pub program_id: String,
    pub program_name: String,
    pub status: EligibilityStatus,
    pub confidence: ConfidenceTier,
    pub confidence_score: u8,
    pub reason: String,
    pub passed_rules: usize,
    pub total_rules: usize,
    pub rules_cited: Vec<String>,
    pub details: Vec<String>,
    pub calculations: Vec<Calculation>,
    pub documents: Vec<DocumentRequirement>,
    pub next_steps: Vec<NextStep>,
    /// Context paths read by this program's rules that the profile left unanswered.
    pub missing_fields: Vec<String>,
    pub incomplete_profile: bool,
    /// The failed rule that acts as a categorical disqualifier, if any.
    pub hard_stop: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl fmt::Display for ProgramVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} confidence, {}) {}/{} rules passed",
            self.program_id,
            self.status,
            self.confidence,
            self.confidence_score,
            self.passed_rules,
            self.total_rules
        )
    }
}
