mod context;
mod error;
mod expr;
mod outcome;
mod package;
mod results;
mod rule;
mod value;
mod verdict;

pub use context::{Context, KnownField, Profile};
pub use error::{ErrorCode, EvalError, PackageError, RuleError};
pub use expr::{call, field, lit, var, CompareOp, Expr, FieldExpr};
pub use outcome::Outcome;
pub use package::{ProgramCategory, ProgramInfo, RulePackage};
pub use results::{Bucket, CategorizedResults, ResultPartition};
pub use rule::{DocumentRequirement, NextStep, RuleDefinition, RuleKind};
pub use value::Value;
pub use verdict::{Calculation, ConfidenceTier, EligibilityStatus, ProgramVerdict};
