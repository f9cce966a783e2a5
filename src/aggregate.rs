use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::classify::classify;
use crate::runner::ProgramAggregate;
use crate::{
    Bucket, CategorizedResults, ConfidenceTier, DocumentRequirement, EligibilityStatus, NextStep,
    ProgramVerdict,
};

/// Confidence score given to a verdict forced to not-qualified by a hard stop.
pub const HARD_STOP_SCORE: u8 = 90;

/// Verdicts scoring below this are reported as "maybe" rather than decided.
pub const DECISIVE_SCORE: u8 = 70;

/// Classify a runner aggregate and attach its explanation and deduplicated
/// attachments.
#[must_use]
pub fn build_verdict(
    aggregate: ProgramAggregate,
    program_name: &str,
    evaluated_at: DateTime<Utc>,
) -> ProgramVerdict {
    let classification = classify(aggregate.passed_rules, aggregate.total_rules);
    let hard_stop = aggregate.hard_stop_failures.first().cloned();
    let reason = reason(
        classification.status,
        aggregate.passed_rules,
        aggregate.total_rules,
        hard_stop.as_deref(),
    );
    let incomplete_profile = aggregate.is_incomplete();

    ProgramVerdict {
        program_name: if program_name.is_empty() {
            aggregate.program_id.clone()
        } else {
            program_name.to_owned()
        },
        program_id: aggregate.program_id,
        status: classification.status,
        confidence: classification.confidence,
        confidence_score: classification.confidence_score,
        reason,
        passed_rules: aggregate.passed_rules,
        total_rules: aggregate.total_rules,
        rules_cited: aggregate.rules_cited,
        details: aggregate.details,
        calculations: aggregate.calculations,
        documents: dedup_documents(aggregate.documents),
        next_steps: dedup_next_steps(aggregate.next_steps),
        missing_fields: aggregate.missing_fields,
        incomplete_profile,
        hard_stop,
        evaluated_at,
    }
}

fn reason(
    status: EligibilityStatus,
    passed: usize,
    total: usize,
    hard_stop: Option<&str>,
) -> String {
    if let (Some(rule), false) = (hard_stop, status == EligibilityStatus::Qualified) {
        return format!("Does not meet a required condition ({rule})");
    }
    match status {
        EligibilityStatus::Qualified => format!("Meets all {total} eligibility requirements"),
        EligibilityStatus::Likely => format!("Meets {passed} of {total} eligibility requirements"),
        EligibilityStatus::Maybe => {
            format!("Meets some requirements ({passed} of {total}); more information may help")
        }
        EligibilityStatus::Unlikely => format!("Meets few requirements ({passed} of {total})"),
        EligibilityStatus::NotQualified if total == 0 => {
            "No eligibility rules could be evaluated".to_owned()
        }
        EligibilityStatus::NotQualified => {
            format!("Does not meet most requirements ({passed} of {total})")
        }
    }
}

fn dedup_documents(documents: Vec<DocumentRequirement>) -> Vec<DocumentRequirement> {
    let mut seen = HashSet::new();
    documents
        .into_iter()
        .filter(|doc| seen.insert(doc.id.clone()))
        .collect()
}

fn dedup_next_steps(steps: Vec<NextStep>) -> Vec<NextStep> {
    let mut seen = HashSet::new();
    steps
        .into_iter()
        .filter(|step| seen.insert(step.text.clone()))
        .collect()
}

/// Whether a verdict is overridden to not-qualified by a failed hard-stop rule.
#[must_use]
pub fn is_hard_stopped(verdict: &ProgramVerdict) -> bool {
    verdict.status != EligibilityStatus::Qualified && verdict.hard_stop.is_some()
}

/// The bucket a verdict belongs in. Pure: depends only on status, score,
/// profile completeness, and hard stop.
#[must_use]
pub fn bucket_for(verdict: &ProgramVerdict) -> Bucket {
    if is_hard_stopped(verdict) {
        Bucket::NotQualified
    } else if verdict.status == EligibilityStatus::Qualified {
        Bucket::Qualified
    } else if verdict.incomplete_profile || verdict.confidence_score < DECISIVE_SCORE {
        Bucket::Maybe
    } else if verdict.status == EligibilityStatus::Likely {
        Bucket::Likely
    } else {
        Bucket::NotQualified
    }
}

/// Bucket every verdict, applying the hard-stop override.
pub fn aggregate<I>(verdicts: I) -> CategorizedResults
where
    I: IntoIterator<Item = ProgramVerdict>,
{
    aggregate_at(verdicts, Utc::now())
}

pub(crate) fn aggregate_at<I>(verdicts: I, evaluated_at: DateTime<Utc>) -> CategorizedResults
where
    I: IntoIterator<Item = ProgramVerdict>,
{
    let mut results = CategorizedResults::new(evaluated_at);
    for mut verdict in verdicts {
        let bucket = bucket_for(&verdict);
        if is_hard_stopped(&verdict) {
            tracing::debug!(
                program = %verdict.program_id,
                rule = verdict.hard_stop.as_deref().unwrap_or_default(),
                was = %verdict.status,
                "hard stop forces not-qualified"
            );
            verdict.status = EligibilityStatus::NotQualified;
            verdict.confidence = ConfidenceTier::High;
            verdict.confidence_score = verdict.confidence_score.max(HARD_STOP_SCORE);
        }
        results.push(bucket, verdict);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(id: &str, passed: usize, total: usize) -> ProgramAggregate {
        ProgramAggregate {
            program_id: id.to_owned(),
            passed_rules: passed,
            total_rules: total,
            ..ProgramAggregate::default()
        }
    }

    fn verdict(agg: ProgramAggregate) -> ProgramVerdict {
        build_verdict(agg, "", Utc::now())
    }

    #[test]
    fn qualified_goes_to_qualified() {
        let v = verdict(program("snap", 5, 5));
        assert_eq!(v.status, EligibilityStatus::Qualified);
        assert_eq!(v.program_name, "snap");
        assert_eq!(v.reason, "Meets all 5 eligibility requirements");
        assert_eq!(bucket_for(&v), Bucket::Qualified);
    }

    #[test]
    fn likely_complete_goes_to_likely() {
        let v = verdict(program("wic", 4, 5));
        assert_eq!(v.status, EligibilityStatus::Likely);
        assert_eq!(bucket_for(&v), Bucket::Likely);
    }

    #[test]
    fn likely_incomplete_goes_to_maybe() {
        let mut agg = program("wic", 4, 5);
        agg.missing_fields.push("isPregnant".into());
        let v = verdict(agg);
        assert!(v.incomplete_profile);
        assert_eq!(bucket_for(&v), Bucket::Maybe);
    }

    #[test]
    fn low_scores_go_to_maybe() {
        assert_eq!(bucket_for(&verdict(program("a", 6, 10))), Bucket::Maybe);
        assert_eq!(bucket_for(&verdict(program("b", 3, 10))), Bucket::Maybe);
    }

    #[test]
    fn not_qualified_complete_goes_to_not_qualified() {
        assert_eq!(bucket_for(&verdict(program("a", 1, 10))), Bucket::NotQualified);
        let v = verdict(program("b", 0, 0));
        assert_eq!(v.reason, "No eligibility rules could be evaluated");
        assert_eq!(bucket_for(&v), Bucket::NotQualified);
    }

    #[test]
    fn hard_stop_overrides_likely() {
        let mut agg = program("snap", 9, 10);
        agg.failed_rules.push("x-income-hard-stop".into());
        agg.hard_stop_failures.push("x-income-hard-stop".into());
        let v = verdict(agg);
        assert_eq!(v.status, EligibilityStatus::Likely);
        assert_eq!(v.hard_stop.as_deref(), Some("x-income-hard-stop"));

        let results = aggregate(vec![v]);
        assert_eq!(results.not_qualified().len(), 1);
        let v = &results.not_qualified()[0];
        assert_eq!(v.status, EligibilityStatus::NotQualified);
        assert_eq!(v.confidence, ConfidenceTier::High);
        assert_eq!(v.confidence_score, 90);
    }

    #[test]
    fn hard_stop_ignored_when_qualified() {
        let mut agg = program("snap", 3, 3);
        agg.hard_stop_failures.push("stale".into());
        let v = verdict(agg);
        assert_eq!(bucket_for(&v), Bucket::Qualified);
    }

    #[test]
    fn documents_and_steps_deduplicated_once() {
        let mut agg = program("snap", 2, 2);
        agg.documents = vec![
            DocumentRequirement::new("id", "Photo ID"),
            DocumentRequirement::new("pay-stubs", "Pay stubs"),
            DocumentRequirement::new("id", "Photo ID (again)"),
        ];
        agg.next_steps = vec![
            NextStep::new("Apply online"),
            NextStep::new("Apply online"),
            NextStep::new("Call the office"),
        ];
        let v = verdict(agg);
        let ids: Vec<&str> = v.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["id", "pay-stubs"]);
        assert_eq!(v.documents[0].name, "Photo ID");
        assert_eq!(v.next_steps.len(), 2);
    }

    #[test]
    fn partition_folds_likely_into_qualified() {
        let results = aggregate(vec![
            verdict(program("a", 5, 5)),
            verdict(program("b", 4, 5)),
            verdict(program("c", 1, 2)),
            verdict(program("d", 0, 4)),
        ]);
        assert_eq!(results.total_programs(), 4);
        assert_eq!(results.bucket_of("b"), Some(Bucket::Likely));
        let partition = results.into_partition();
        let qualified: Vec<&str> = partition
            .qualified
            .iter()
            .map(|v| v.program_id.as_str())
            .collect();
        assert_eq!(qualified, vec!["a", "b"]);
        assert_eq!(partition.maybe.len(), 1);
        assert_eq!(partition.not_qualified.len(), 1);
    }
}
