use std::fmt;
use std::time::Duration;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

/// Why a single expression evaluation failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("invalid rule: {message}")]
    InvalidRule { message: String },

    #[error("invalid data: {message}")]
    InvalidData { message: String },

    #[error("expression depth {depth} exceeds the maximum of {max}")]
    MaxDepthExceeded { depth: usize, max: usize },

    #[error("evaluation timed out after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    #[error("operator '{operator}' failed: {message}")]
    OperatorError { operator: String, message: String },

    #[error("unknown evaluation error: {message}")]
    Unknown { message: String },
}

/// Stable, machine-readable classification of an [`EvalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRule,
    InvalidData,
    MaxDepthExceeded,
    Timeout,
    OperatorError,
    UnknownError,
}

impl EvalError {
    pub(crate) fn invalid_rule(message: impl Into<String>) -> Self {
        EvalError::InvalidRule {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_data(message: impl Into<String>) -> Self {
        EvalError::InvalidData {
            message: message.into(),
        }
    }

    pub(crate) fn operator(operator: &str, message: impl Into<String>) -> Self {
        EvalError::OperatorError {
            operator: operator.to_owned(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            EvalError::InvalidRule { .. } => ErrorCode::InvalidRule,
            EvalError::InvalidData { .. } => ErrorCode::InvalidData,
            EvalError::MaxDepthExceeded { .. } => ErrorCode::MaxDepthExceeded,
            EvalError::Timeout { .. } => ErrorCode::Timeout,
            EvalError::OperatorError { .. } => ErrorCode::OperatorError,
            EvalError::Unknown { .. } => ErrorCode::UnknownError,
        }
    }

    /// Structured detail for the variants that carry more than a message.
    #[must_use]
    pub fn data(&self) -> Option<JsonValue> {
        match self {
            EvalError::MaxDepthExceeded { depth, max } => {
                Some(json!({ "depth": depth, "maxDepth": max }))
            }
            EvalError::Timeout { timeout } => {
                Some(json!({ "timeoutMs": u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX) }))
            }
            EvalError::OperatorError { operator, .. } => Some(json!({ "operator": operator })),
            EvalError::InvalidRule { .. }
            | EvalError::InvalidData { .. }
            | EvalError::Unknown { .. } => None,
        }
    }

    fn serialize_with_rule<S: Serializer>(
        &self,
        rule: Option<&str>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let data = self.data();
        let len = 2 + usize::from(rule.is_some()) + usize::from(data.is_some());
        let mut state = serializer.serialize_struct("EvalError", len)?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("code", &self.code())?;
        match rule {
            Some(rule) => state.serialize_field("rule", rule)?,
            None => state.skip_field("rule")?,
        }
        match &data {
            Some(data) => state.serialize_field("data", data)?,
            None => state.skip_field("data")?,
        }
        state.end()
    }
}

/// Serialized as `{message, code, data?}`.
impl Serialize for EvalError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.serialize_with_rule(None, serializer)
    }
}

/// An evaluation failure attributed to the rule that produced it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("rule '{rule}': {error}")]
pub struct RuleError {
    pub rule: String,
    #[source]
    pub error: EvalError,
}

impl RuleError {
    pub fn new(rule: impl Into<String>, error: EvalError) -> Self {
        Self {
            rule: rule.into(),
            error,
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.error.code()
    }
}

/// Serialized as `{message, code, rule, data?}`; the message is the bare
/// evaluation error.
impl Serialize for RuleError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.error.serialize_with_rule(Some(&self.rule), serializer)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::InvalidRule => "INVALID_RULE",
            ErrorCode::InvalidData => "INVALID_DATA",
            ErrorCode::MaxDepthExceeded => "MAX_DEPTH_EXCEEDED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::OperatorError => "OPERATOR_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        };
        f.write_str(code)
    }
}

/// Structural problems in a loaded [`RulePackage`](super::RulePackage).
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("rule package has no name")]
    MissingName,

    #[error("invalid semantic version '{version}' in package '{package}'")]
    InvalidVersion { package: String, version: String },

    #[error("duplicate rule id '{id}' in package '{package}'")]
    DuplicateRule { package: String, id: String },

    #[error("rule '{rule}' in package '{package}' has no program id")]
    MissingProgram { package: String, rule: String },
}
