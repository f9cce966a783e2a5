use chrono::Utc;

use crate::aggregate::{aggregate_at, build_verdict};
use crate::config::{EngineConfig, EvaluateOptions};
use crate::hard_stop::HardStopPolicy;
use crate::operators::{Clock, OperatorRegistry};
use crate::runner::ProgramRunner;
use crate::{
    CategorizedResults, Context, Evaluator, ProgramVerdict, QualifyError, RuleDefinition,
    RulePackage, Value,
};

/// Loaded rule packages plus everything needed to turn a profile into
/// categorized results.
///
/// The engine holds no per-run state; share it behind an `Arc` and call
/// [`evaluate`](Self::evaluate) from as many threads as needed.
#[derive(Debug, Clone)]
pub struct EligibilityEngine {
    packages: Vec<RulePackage>,
    options: EvaluateOptions,
    policy: HardStopPolicy,
    operators: OperatorRegistry,
    clock: Clock,
}

impl Default for EligibilityEngine {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            options: EvaluateOptions::default(),
            policy: HardStopPolicy::default(),
            operators: OperatorRegistry::new(),
            clock: Clock::System,
        }
    }
}

impl EligibilityEngine {
    /// # Errors
    ///
    /// Returns [`QualifyError::Config`] if a hard-stop pattern does not compile.
    pub fn new(config: EngineConfig) -> Result<Self, QualifyError> {
        Ok(Self {
            policy: HardStopPolicy::from_config(&config.hard_stop)?,
            options: config.evaluation,
            ..Self::default()
        })
    }

    /// # Errors
    ///
    /// Returns [`QualifyError::Package`] if the package fails validation.
    pub fn with_package(mut self, package: RulePackage) -> Result<Self, QualifyError> {
        self.add_package(package)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`QualifyError::Package`] if the package fails validation.
    pub fn add_package(&mut self, package: RulePackage) -> Result<(), QualifyError> {
        package.validate()?;
        tracing::debug!(
            package = %package.name,
            version = %package.version,
            jurisdiction = %package.jurisdiction,
            rules = package.rules.len(),
            "rule package loaded"
        );
        self.packages.push(package);
        Ok(())
    }

    /// Pin "now" for the date operators.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: HardStopPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a custom operator available to every rule. Built-ins of the same
    /// name are not installed over it.
    #[must_use]
    pub fn with_operator<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.operators.register(name, f);
        self
    }

    #[must_use]
    pub fn packages(&self) -> &[RulePackage] {
        &self.packages
    }

    /// Program ids with at least one scored rule, in load order.
    #[must_use]
    pub fn programs(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for rule in self.rules().filter(|rule| rule.is_scored()) {
            if !ids.contains(&rule.program_id.as_str()) {
                ids.push(&rule.program_id);
            }
        }
        ids
    }

    /// Display name of a program: the first package that declares it wins.
    #[must_use]
    pub fn program_name(&self, program_id: &str) -> Option<&str> {
        self.packages
            .iter()
            .find_map(|package| package.program_name(program_id))
    }

    /// Evaluate every program against one profile.
    pub fn evaluate(&self, ctx: &Context) -> CategorizedResults {
        let evaluated_at = Utc::now();
        let evaluator = self.evaluator();
        let runner = self.runner(&evaluator);

        let verdicts: Vec<ProgramVerdict> = self
            .programs()
            .into_iter()
            .map(|program_id| {
                let aggregate = runner.run(program_id, self.rules(), ctx);
                let name = self.program_name(program_id).unwrap_or(program_id);
                build_verdict(aggregate, name, evaluated_at)
            })
            .collect();

        let results = aggregate_at(verdicts, evaluated_at);
        tracing::info!(
            programs = results.total_programs(),
            qualified = results.qualified().len(),
            likely = results.likely().len(),
            maybe = results.maybe().len(),
            not_qualified = results.not_qualified().len(),
            "eligibility evaluated"
        );
        results
    }

    /// Verdict for a single program, before bucketing. `None` if no loaded
    /// package has a scored rule for it.
    #[must_use]
    pub fn evaluate_program(&self, program_id: &str, ctx: &Context) -> Option<ProgramVerdict> {
        if !self.programs().iter().any(|id| *id == program_id) {
            return None;
        }
        let evaluator = self.evaluator();
        let aggregate = self.runner(&evaluator).run(program_id, self.rules(), ctx);
        Some(build_verdict(
            aggregate,
            self.program_name(program_id).unwrap_or(program_id),
            Utc::now(),
        ))
    }

    fn rules(&self) -> impl Iterator<Item = &RuleDefinition> {
        self.packages.iter().flat_map(|package| package.rules.iter())
    }

    /// A fresh registry for one run: custom operators plus the built-ins.
    fn evaluator(&self) -> Evaluator {
        let mut registry = self.operators.clone();
        registry.register_builtins(self.clock);
        Evaluator::new(registry)
    }

    fn runner<'a>(&'a self, evaluator: &'a Evaluator) -> ProgramRunner<'a> {
        ProgramRunner::new(evaluator, &self.policy).options(self.options.clone())
    }
}
