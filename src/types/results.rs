use chrono::{DateTime, Utc};
use serde::Serialize;

use super::verdict::ProgramVerdict;

/// The bucket a verdict is placed in by aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    Qualified,
    Likely,
    Maybe,
    NotQualified,
}

/// Every program verdict from one run, grouped into buckets.
///
/// Built once by [`aggregate`](crate::aggregate) and immutable afterwards.
/// `likely` verdicts are kept apart for threshold fidelity;
/// [`into_partition`](Self::into_partition) folds them into `qualified`
/// for callers that only present three groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[must_use]
pub struct CategorizedResults {
    qualified: Vec<ProgramVerdict>,
    likely: Vec<ProgramVerdict>,
    maybe: Vec<ProgramVerdict>,
    not_qualified: Vec<ProgramVerdict>,
    total_programs: usize,
    evaluated_at: DateTime<Utc>,
}

/// The three-group view of [`CategorizedResults`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPartition {
    pub qualified: Vec<ProgramVerdict>,
    pub maybe: Vec<ProgramVerdict>,
    pub not_qualified: Vec<ProgramVerdict>,
    pub total_programs: usize,
    pub evaluated_at: DateTime<Utc>,
}

impl CategorizedResults {
    pub(crate) fn new(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            qualified: Vec::new(),
            likely: Vec::new(),
            maybe: Vec::new(),
            not_qualified: Vec::new(),
            total_programs: 0,
            evaluated_at,
        }
    }

    pub(crate) fn push(&mut self, bucket: Bucket, verdict: ProgramVerdict) {
        self.total_programs += 1;
        match bucket {
            Bucket::Qualified => self.qualified.push(verdict),
            Bucket::Likely => self.likely.push(verdict),
            Bucket::Maybe => self.maybe.push(verdict),
            Bucket::NotQualified => self.not_qualified.push(verdict),
        }
    }

    #[must_use]
    pub fn qualified(&self) -> &[ProgramVerdict] {
        &self.qualified
    }

    #[must_use]
    pub fn likely(&self) -> &[ProgramVerdict] {
        &self.likely
    }

    #[must_use]
    pub fn maybe(&self) -> &[ProgramVerdict] {
        &self.maybe
    }

    #[must_use]
    pub fn not_qualified(&self) -> &[ProgramVerdict] {
        &self.not_qualified
    }

    #[must_use]
    pub fn total_programs(&self) -> usize {
        self.total_programs
    }

    #[must_use]
    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }

    /// Which bucket holds the given program, if it was evaluated.
    #[must_use]
    pub fn bucket_of(&self, program_id: &str) -> Option<Bucket> {
        self.iter()
            .find(|(_, v)| v.program_id == program_id)
            .map(|(bucket, _)| bucket)
    }

    /// The verdict for a program, wherever it was bucketed.
    #[must_use]
    pub fn verdict(&self, program_id: &str) -> Option<&ProgramVerdict> {
        self.iter()
            .find(|(_, v)| v.program_id == program_id)
            .map(|(_, verdict)| verdict)
    }

    /// All verdicts with their bucket, in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &ProgramVerdict)> {
        tagged(Bucket::Qualified, &self.qualified)
            .chain(tagged(Bucket::Likely, &self.likely))
            .chain(tagged(Bucket::Maybe, &self.maybe))
            .chain(tagged(Bucket::NotQualified, &self.not_qualified))
    }

    /// Fold `likely` into `qualified`, keeping qualified verdicts first.
    #[must_use]
    pub fn into_partition(self) -> ResultPartition {
        let mut qualified = self.qualified;
        qualified.extend(self.likely);
        ResultPartition {
            qualified,
            maybe: self.maybe,
            not_qualified: self.not_qualified,
            total_programs: self.total_programs,
            evaluated_at: self.evaluated_at,
        }
    }
}

fn tagged(
    bucket: Bucket,
    list: &[ProgramVerdict],
) -> impl Iterator<Item = (Bucket, &ProgramVerdict)> + '_ {
    list.iter().map(move |verdict| (bucket, verdict))
}
