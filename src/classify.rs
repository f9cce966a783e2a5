use serde::Serialize;

use crate::{ConfidenceTier, EligibilityStatus};

/// Status, confidence tier, and confidence score for one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub status: EligibilityStatus,
    pub confidence: ConfidenceTier,
    pub confidence_score: u8,
}

impl Classification {
    const fn new(
        status: EligibilityStatus,
        confidence: ConfidenceTier,
        confidence_score: u8,
    ) -> Self {
        Self {
            status,
            confidence,
            confidence_score,
        }
    }
}

/// Pass-rate thresholds as `(numerator, denominator)`, checked top-down.
/// Anything below the last row is not-qualified.
const TABLE: [((u64, u64), Classification); 4] = [
    ((1, 1), Classification::new(EligibilityStatus::Qualified, ConfidenceTier::High, 95)),
    ((4, 5), Classification::new(EligibilityStatus::Likely, ConfidenceTier::Medium, 75)),
    ((1, 2), Classification::new(EligibilityStatus::Maybe, ConfidenceTier::Medium, 60)),
    ((3, 10), Classification::new(EligibilityStatus::Unlikely, ConfidenceTier::Low, 40)),
];

const NOT_QUALIFIED: Classification =
    Classification::new(EligibilityStatus::NotQualified, ConfidenceTier::High, 90);

/// Classify a program from its pass/fail counts.
///
/// A near-miss is only ever "likely" at medium confidence, while a program
/// with almost nothing matched is "not qualified" at high confidence. With
/// no evaluable rules the pass rate is zero.
///
/// Thresholds are compared by integer cross-multiplication, so `8/10` lands
/// exactly on the `0.8` boundary.
#[must_use]
pub fn classify(passed: usize, total: usize) -> Classification {
    if total == 0 {
        return NOT_QUALIFIED;
    }
    let (passed, total) = (passed.min(total) as u64, total as u64);
    TABLE
        .iter()
        .find(|((num, den), _)| passed * den >= num * total)
        .map_or(NOT_QUALIFIED, |(_, classification)| *classification)
}

/// `passed / total`, or zero when nothing was evaluated.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn pass_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64
    }
}
