use std::fmt;
use std::time::Duration;

use super::error::EvalError;
use super::Value;

/// Result of evaluating one expression in lenient mode.
///
/// A failed evaluation still produces an `Outcome`: its value is the
/// boolean zero value `false` and [`error()`](Self::error) says why.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Outcome {
    value: Value,
    elapsed: Option<Duration>,
    error: Option<EvalError>,
}

impl Outcome {
    pub(crate) fn success(value: Value, elapsed: Option<Duration>) -> Self {
        Self {
            value,
            elapsed,
            error: None,
        }
    }

    pub(crate) fn failure(error: EvalError, elapsed: Option<Duration>) -> Self {
        Self {
            value: Value::Bool(false),
            elapsed,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The value the expression produced; never coerced.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Strict boolean reading: only `true` itself passes.
    #[must_use]
    pub fn is_true(&self) -> bool {
        self.is_success() && self.value == Value::Bool(true)
    }

    /// Wall-clock evaluation time, present when `measure_time` was requested.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    #[must_use]
    pub fn error(&self) -> Option<&EvalError> {
        self.error.as_ref()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "ok: {}", self.value)?,
            Some(err) => write!(f, "failed ({}): {err}", err.code())?,
        }
        if let Some(elapsed) = self.elapsed {
            write!(f, ", elapsed: {elapsed:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_accessors() {
        let outcome = Outcome::success(Value::Int(3), Some(Duration::from_micros(5)));
        assert!(outcome.is_success());
        assert!(!outcome.is_true());
        assert_eq!(outcome.value(), &Value::Int(3));
        assert_eq!(outcome.elapsed(), Some(Duration::from_micros(5)));
        assert_eq!(outcome.to_string(), "ok: 3, elapsed: 5µs");
    }

    #[test]
    fn failure_defaults_to_false() {
        let outcome = Outcome::failure(EvalError::invalid_rule("rule expression is null"), None);
        assert!(!outcome.is_success());
        assert!(!outcome.is_true());
        assert_eq!(outcome.value(), &Value::Bool(false));
        assert_eq!(
            outcome.to_string(),
            "failed (INVALID_RULE): invalid rule: rule expression is null"
        );
    }

    #[test]
    fn only_true_is_true() {
        assert!(Outcome::success(Value::Bool(true), None).is_true());
        assert!(!Outcome::success(Value::Int(1), None).is_true());
        assert!(!Outcome::success(Value::from("true"), None).is_true());
    }
}
