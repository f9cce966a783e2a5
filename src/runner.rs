use serde::Serialize;

use crate::calculations::calculation_for;
use crate::config::EvaluateOptions;
use crate::hard_stop::HardStopPolicy;
use crate::{
    Calculation, Context, DocumentRequirement, Evaluator, NextStep, RuleDefinition, RuleError,
};

/// Raw per-program counts and attachments, before classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramAggregate {
    pub program_id: String,
    pub passed_rules: usize,
    /// Rules that evaluated successfully, passed or not.
    pub total_rules: usize,
    pub rules_cited: Vec<String>,
    pub details: Vec<String>,
    pub calculations: Vec<Calculation>,
    pub failed_rules: Vec<String>,
    /// Failed rules recognised as categorical disqualifiers, in rule order.
    pub hard_stop_failures: Vec<String>,
    /// Rules whose evaluation errored, with the error; excluded from both
    /// counts.
    pub errors: Vec<RuleError>,
    /// Attachments from every evaluated rule. Not yet deduplicated.
    pub documents: Vec<DocumentRequirement>,
    pub next_steps: Vec<NextStep>,
    /// Context paths read by the program's rules that have no answer.
    pub missing_fields: Vec<String>,
}

impl ProgramAggregate {
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        !self.missing_fields.is_empty()
    }

    pub fn errored_rules(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|err| err.rule.as_str())
    }
}

/// Runs every scored rule of one program against one context.
///
/// Always lenient: a rule that fails to evaluate is logged and skipped, and
/// the remaining rules still run.
#[derive(Debug, Clone)]
pub struct ProgramRunner<'a> {
    evaluator: &'a Evaluator,
    policy: &'a HardStopPolicy,
    options: EvaluateOptions,
}

impl<'a> ProgramRunner<'a> {
    pub fn new(evaluator: &'a Evaluator, policy: &'a HardStopPolicy) -> Self {
        Self {
            evaluator,
            policy,
            options: EvaluateOptions::default(),
        }
    }

    /// Evaluation options for each rule. `strict` is ignored.
    #[must_use]
    pub fn options(mut self, options: EvaluateOptions) -> Self {
        self.options = EvaluateOptions {
            strict: false,
            ..options
        };
        self
    }

    pub fn run<'r, I>(&self, program_id: &str, rules: I, ctx: &Context) -> ProgramAggregate
    where
        I: IntoIterator<Item = &'r RuleDefinition>,
    {
        let mut aggregate = ProgramAggregate {
            program_id: program_id.to_owned(),
            ..ProgramAggregate::default()
        };

        for rule in rules
            .into_iter()
            .filter(|rule| rule.program_id == program_id && rule.is_scored())
        {
            for path in rule.expression.vars() {
                if !ctx.is_answered(path) && !aggregate.missing_fields.iter().any(|m| m == path) {
                    aggregate.missing_fields.push(path.to_owned());
                }
            }

            let outcome = self
                .evaluator
                .evaluate_sync(&rule.expression, ctx, &self.options)
                .and_then(|outcome| match outcome.error().cloned() {
                    Some(err) => Err(err),
                    None => Ok(outcome),
                });
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(
                        program = program_id,
                        rule = %rule.id,
                        code = %err.code(),
                        error = %err,
                        "rule evaluation failed"
                    );
                    aggregate.errors.push(RuleError::new(&rule.id, err));
                    continue;
                }
            };

            let passed = outcome.is_true();
            tracing::debug!(program = program_id, rule = %rule.id, passed, "rule evaluated");

            aggregate.total_rules += 1;
            aggregate.rules_cited.push(rule.id.clone());
            if passed {
                aggregate.passed_rules += 1;
                aggregate.details.push(format!("✓ {}", rule.display_text()));
            } else {
                aggregate.details.push(format!("✗ {}", rule.display_text()));
                aggregate.failed_rules.push(rule.id.clone());
                if self.policy.is_hard_stop(rule) {
                    aggregate.hard_stop_failures.push(rule.id.clone());
                }
            }
            if let Some(calculation) = calculation_for(rule, ctx) {
                aggregate.calculations.push(calculation);
            }
            aggregate.documents.extend(rule.required_documents.iter().cloned());
            aggregate.next_steps.extend(rule.next_steps.iter().cloned());
        }

        aggregate
    }
}

/// Run one program with the default hard-stop policy.
pub fn run_program(
    program_id: &str,
    rules: &[RuleDefinition],
    ctx: &Context,
    evaluator: &Evaluator,
) -> ProgramAggregate {
    let policy = HardStopPolicy::default();
    ProgramRunner::new(evaluator, &policy).run(program_id, rules, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{call, field, lit, ErrorCode, RuleKind};

    fn snap_rules() -> Vec<RuleDefinition> {
        vec![
            RuleDefinition::new(
                "snap-gross-income",
                "snap",
                field("householdIncome").lte(2500_i64),
            )
            .explanation("Gross income under the limit")
                .document(DocumentRequirement::new("pay-stubs", "Recent pay stubs")),
            RuleDefinition::new(
                "snap-citizenship",
                "snap",
                field("citizenship").one_of(vec!["citizen"]),
            )
            .explanation("U.S. citizen")
            .document(DocumentRequirement::new("id", "Photo ID")),
            RuleDefinition::new("snap-size", "snap", field("householdSize").gte(1_i64)),
        ]
    }

    #[test]
    fn counts_passes_and_failures() {
        let evaluator = Evaluator::with_builtins();
        let ctx = Context::new()
            .set("householdIncome", 3000_i64)
            .set("citizenship", "citizen")
            .set("householdSize", 2_i64);
        let agg = run_program("snap", &snap_rules(), &ctx, &evaluator);
        assert_eq!(agg.passed_rules, 2);
        assert_eq!(agg.total_rules, 3);
        assert_eq!(agg.failed_rules, vec!["snap-gross-income"]);
        assert_eq!(agg.hard_stop_failures, vec!["snap-gross-income"]);
        assert_eq!(
            agg.details,
            vec!["✗ Gross income under the limit", "✓ U.S. citizen", "✓ snap-size"]
        );
        assert_eq!(agg.documents.len(), 2);
        assert!(!agg.is_incomplete());
    }

    #[test]
    fn errored_rule_is_excluded_from_counts() {
        let evaluator = Evaluator::with_builtins();
        let mut rules = snap_rules();
        rules.push(RuleDefinition::new(
            "snap-broken",
            "snap",
            call("/", vec![lit(1_i64), lit(0_i64)]),
        ));
        let ctx = Context::new()
            .set("householdIncome", 1000_i64)
            .set("citizenship", "citizen")
            .set("householdSize", 2_i64);
        let agg = run_program("snap", &rules, &ctx, &evaluator);
        assert_eq!((agg.passed_rules, agg.total_rules), (3, 3));
        assert_eq!(agg.errored_rules().collect::<Vec<_>>(), vec!["snap-broken"]);
        assert_eq!(agg.errors[0].code(), ErrorCode::OperatorError);
        assert!(!agg.rules_cited.contains(&"snap-broken".to_owned()));
    }

    #[test]
    fn skips_other_programs_and_unscored_rules() {
        let evaluator = Evaluator::with_builtins();
        let mut rules = snap_rules();
        rules.push(RuleDefinition::new("wic-age", "wic", field("age").lt(5_i64)));
        rules.push(RuleDefinition::new("snap-draft", "snap", lit(false)).draft());
        rules.push(
            RuleDefinition::new("snap-info", "snap", lit(false)).kind(RuleKind::Informational),
        );
        let agg = run_program("snap", &rules, &Context::new(), &evaluator);
        assert_eq!(agg.total_rules, 3);
        assert_eq!(agg.passed_rules, 0);
    }

    #[test]
    fn missing_fields_make_profile_incomplete() {
        let evaluator = Evaluator::with_builtins();
        let ctx = Context::new().set("householdIncome", 1000_i64);
        let agg = run_program("snap", &snap_rules(), &ctx, &evaluator);
        assert_eq!(agg.missing_fields, vec!["citizenship", "householdSize"]);
        assert!(agg.is_incomplete());
    }

    #[test]
    fn strict_option_is_ignored() {
        let evaluator = Evaluator::default();
        let policy = HardStopPolicy::default();
        let rules = vec![RuleDefinition::new("x-unknown", "x", call("nope", vec![]))];
        let agg = ProgramRunner::new(&evaluator, &policy)
            .options(EvaluateOptions::new().strict(true))
            .run("x", &rules, &Context::new());
        assert_eq!(agg.total_rules, 0);
        assert_eq!(agg.errored_rules().collect::<Vec<_>>(), vec!["x-unknown"]);
    }
}
