mod aggregate;
mod calculations;
mod classify;
mod config;
mod engine;
mod error;
mod evaluate;
mod evaluator;
mod hard_stop;
mod operators;
mod runner;
mod types;

pub use aggregate::{
    aggregate, bucket_for, build_verdict, is_hard_stopped, DECISIVE_SCORE, HARD_STOP_SCORE,
};
pub use classify::{classify, pass_rate, Classification};
pub use config::{EngineConfig, EvaluateOptions, DEFAULT_MAX_DEPTH, DEFAULT_TIMEOUT};
pub use engine::EligibilityEngine;
pub use error::QualifyError;
pub use evaluator::Evaluator;
pub use hard_stop::{
    HardStopConfig, HardStopPolicy, DEFAULT_HARD_STOP_PATTERNS, DEFAULT_HARD_STOP_RULES,
};
pub use operators::{BuiltinSession, Clock, OperatorFn, OperatorRegistry, BUILTIN_OPERATORS};
pub use runner::{run_program, ProgramAggregate, ProgramRunner};
pub use types::{
    call, field, lit, var, Bucket, Calculation, CategorizedResults, CompareOp, ConfidenceTier,
    Context, DocumentRequirement, EligibilityStatus, ErrorCode, EvalError, Expr, FieldExpr,
    KnownField, NextStep, Outcome, PackageError, Profile, ProgramCategory, ProgramInfo,
    ProgramVerdict, ResultPartition, RuleDefinition, RuleError, RuleKind, RulePackage, Value,
};
