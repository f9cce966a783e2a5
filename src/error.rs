use thiserror::Error;

use crate::{EvalError, PackageError};

/// Unified error type covering evaluation, package loading, and configuration.
///
/// Returned by convenience methods like
/// [`RulePackage::from_json()`](crate::RulePackage::from_json) and
/// [`EligibilityEngine::new()`](crate::EligibilityEngine::new).
#[derive(Debug, Error)]
pub enum QualifyError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("invalid hard-stop pattern: {0}")]
    Config(#[from] regex::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
