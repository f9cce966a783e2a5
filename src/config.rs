use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::hard_stop::HardStopConfig;
use crate::operators::OperatorRegistry;
use crate::QualifyError;

/// Default wall-clock budget for one guarded evaluation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default maximum expression depth.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Per-call evaluation settings.
///
/// Deserializes from `{"timeoutMs": 250, "maxDepth": 20, "measureTime": true,
/// "strict": false}`; every key is optional. The per-call operator table can
/// only be set in code.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluateOptions {
    #[serde(rename = "timeoutMs", deserialize_with = "millis")]
    pub timeout: Duration,
    pub max_depth: usize,
    pub measure_time: bool,
    /// Return evaluation failures as `Err` instead of a failed [`Outcome`](crate::Outcome).
    pub strict: bool,
    /// Operators visible to this call only, consulted before the
    /// evaluator's own registry.
    #[serde(skip)]
    pub operators: Option<OperatorRegistry>,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
            measure_time: false,
            strict: false,
            operators: None,
        }
    }
}

impl EvaluateOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn measure_time(mut self, measure_time: bool) -> Self {
        self.measure_time = measure_time;
        self
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn operators(mut self, operators: OperatorRegistry) -> Self {
        self.operators = Some(operators);
        self
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// Settings for an [`EligibilityEngine`](crate::EligibilityEngine).
///
/// ```json
/// {
///   "evaluation": {"maxDepth": 50},
///   "hardStop": {"ruleIds": ["snap-gross-income"], "patterns": ["(?i)income limit"]}
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub evaluation: EvaluateOptions,
    pub hard_stop: HardStopConfig,
}

impl EngineConfig {
    /// # Errors
    ///
    /// Returns [`QualifyError::Json`] when the text is not a valid config.
    pub fn from_json(input: &str) -> Result<Self, QualifyError> {
        Ok(serde_json::from_str(input)?)
    }

    /// # Errors
    ///
    /// Returns [`QualifyError::Io`] or [`QualifyError::Json`].
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, QualifyError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json(&input)
    }
}
