//! Named extension operators and the built-in domain predicates.
//!
//! An [`OperatorRegistry`] is a plain value: an evaluator session owns one,
//! and a per-call table can be overlaid for a single evaluation without
//! touching it. Long-lived registries that need the built-ins only for the
//! duration of a batch use [`OperatorRegistry::builtin_session`], which
//! removes exactly what it added when dropped.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};

use crate::Value;

/// An extension operator: receives its already-evaluated operands and
/// returns a value, or a message describing why it could not.
pub type OperatorFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Names of the built-in domain operators.
pub const BUILTIN_OPERATORS: [&str; 9] = [
    "between",
    "within_percent",
    "age_from_dob",
    "date_in_past",
    "date_in_future",
    "matches_any",
    "count_true",
    "all_true",
    "any_true",
];

/// Source of "now" for the date operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    /// The local wall clock, read at call time.
    #[default]
    System,
    /// A pinned instant.
    Fixed(NaiveDateTime),
}

impl Clock {
    #[must_use]
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(at) => *at,
        }
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// A table of named operators.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    ops: HashMap<String, OperatorFn>,
}

impl OperatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in domain operators on the system clock.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::with_builtins_at(Clock::System)
    }

    #[must_use]
    pub fn with_builtins_at(clock: Clock) -> Self {
        let mut registry = Self::new();
        registry.register_builtins(clock);
        registry
    }

    /// Register an operator, returning the one it replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> Option<OperatorFn>
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.ops.insert(name.into(), Arc::new(f))
    }

    pub fn unregister(&mut self, name: &str) -> Option<OperatorFn> {
        self.ops.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OperatorFn> {
        self.ops.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ops.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Register every built-in not already present. Returns the names added;
    /// names someone else already holds are left alone.
    pub fn register_builtins(&mut self, clock: Clock) -> Vec<String> {
        let mut added = Vec::new();
        for name in BUILTIN_OPERATORS {
            if self.contains(name) {
                continue;
            }
            if let Some(op) = builtin(name, clock) {
                self.ops.insert(name.to_owned(), op);
                added.push(name.to_owned());
            }
        }
        added
    }

    /// Register the built-ins for the lifetime of the returned guard.
    pub fn builtin_session(&mut self) -> BuiltinSession<'_> {
        self.builtin_session_at(Clock::System)
    }

    pub fn builtin_session_at(&mut self, clock: Clock) -> BuiltinSession<'_> {
        let added = self.register_builtins(clock);
        tracing::trace!(operators = added.len(), "builtin operator session opened");
        BuiltinSession {
            registry: self,
            added,
        }
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.names())
            .finish()
    }
}

/// Guard returned by [`OperatorRegistry::builtin_session`].
///
/// Dereferences to the registry. On drop, unregisters the built-ins this
/// session added, however the batch ended.
pub struct BuiltinSession<'a> {
    registry: &'a mut OperatorRegistry,
    added: Vec<String>,
}

impl Deref for BuiltinSession<'_> {
    type Target = OperatorRegistry;

    fn deref(&self) -> &OperatorRegistry {
        &*self.registry
    }
}

impl DerefMut for BuiltinSession<'_> {
    fn deref_mut(&mut self) -> &mut OperatorRegistry {
        &mut *self.registry
    }
}

impl Drop for BuiltinSession<'_> {
    fn drop(&mut self) {
        for name in &self.added {
            self.registry.unregister(name);
        }
        tracing::trace!(operators = self.added.len(), "builtin operator session closed");
    }
}

fn builtin(name: &str, clock: Clock) -> Option<OperatorFn> {
    let op: OperatorFn = match name {
        "between" => Arc::new(between),
        "within_percent" => Arc::new(within_percent),
        "age_from_dob" => Arc::new(move |args: &[Value]| age_from_dob(args, clock)),
        "date_in_past" => Arc::new(move |args: &[Value]| {
            compare_to_now(args, clock, |date, now| date < now)
        }),
        "date_in_future" => Arc::new(move |args: &[Value]| {
            compare_to_now(args, clock, |date, now| date > now)
        }),
        "matches_any" => Arc::new(matches_any),
        "count_true" => Arc::new(count_true),
        "all_true" => Arc::new(|args: &[Value]| truthy_predicate(args, true)),
        "any_true" => Arc::new(|args: &[Value]| truthy_predicate(args, false)),
        _ => return None,
    };
    Some(op)
}

fn arity(args: &[Value], expected: usize) -> Result<(), String> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} arguments, found {}", args.len()))
    }
}

fn number(value: &Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("expected a number, found {value}"))
}

/// `between(value, min, max)`: inclusive range membership.
fn between(args: &[Value]) -> Result<Value, String> {
    arity(args, 3)?;
    if args.iter().any(Value::is_null) {
        return Ok(Value::Bool(false));
    }
    let (value, min, max) = (number(&args[0])?, number(&args[1])?, number(&args[2])?);
    Ok(Value::Bool(min <= value && value <= max))
}

/// `within_percent(value, target, percent)`: `|value - target| <= target * percent / 100`.
fn within_percent(args: &[Value]) -> Result<Value, String> {
    arity(args, 3)?;
    if args.iter().any(Value::is_null) {
        return Ok(Value::Bool(false));
    }
    let (value, target, percent) = (number(&args[0])?, number(&args[1])?, number(&args[2])?);
    Ok(Value::Bool((value - target).abs() <= target * percent / 100.0))
}

/// `age_from_dob(date)`: whole years since the date, `null` when no date was given.
fn age_from_dob(args: &[Value], clock: Clock) -> Result<Value, String> {
    arity(args, 1)?;
    if args[0].is_null() {
        return Ok(Value::Null);
    }
    let dob = parse_date_time(&args[0])?.date();
    Ok(Value::Int(whole_years_between(dob, clock.today())))
}

/// Calendar-correct age: one year less when the birthday has not come yet
/// this year.
pub(crate) fn whole_years_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let mut years = i64::from(to.year()) - i64::from(from.year());
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years
}

fn compare_to_now(
    args: &[Value],
    clock: Clock,
    test: impl Fn(NaiveDateTime, NaiveDateTime) -> bool,
) -> Result<Value, String> {
    arity(args, 1)?;
    if args[0].is_null() {
        return Ok(Value::Bool(false));
    }
    let date = parse_date_time(&args[0])?;
    Ok(Value::Bool(test(date, clock.now())))
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD`, and
/// `MM/DD/YYYY`. Plain dates are taken at local midnight.
pub(crate) fn parse_date_time(value: &Value) -> Result<NaiveDateTime, String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("expected a date string, found {value}"))?
        .trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(at.with_timezone(&Local).naive_local());
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Ok(at);
    }
    ["%Y-%m-%d", "%m/%d/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("unrecognized date '{text}'"))
}

/// `matches_any(value, [candidates])`: case-insensitive membership.
fn matches_any(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    if args[0].is_null() || args[1].is_null() {
        return Ok(Value::Bool(false));
    }
    let candidates = args[1]
        .as_array()
        .ok_or_else(|| format!("expected a list of candidates, found {}", args[1]))?;
    let needle = args[0].to_plain_string().to_lowercase();
    Ok(Value::Bool(candidates.iter().any(|candidate| {
        candidate.to_plain_string().to_lowercase() == needle
    })))
}

fn truthy_items(args: &[Value]) -> Result<Option<&[Value]>, String> {
    arity(args, 1)?;
    match &args[0] {
        Value::Null => Ok(None),
        Value::Array(items) => Ok(Some(items)),
        other => Err(format!("expected a list, found {other}")),
    }
}

/// `count_true([items])`: how many items are truthy.
fn count_true(args: &[Value]) -> Result<Value, String> {
    let count =
        truthy_items(args)?.map_or(0, |items| items.iter().filter(|v| v.is_truthy()).count());
    Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
}

/// `all_true` (every item truthy) when `all`, otherwise `any_true`.
fn truthy_predicate(args: &[Value], all: bool) -> Result<Value, String> {
    let Some(items) = truthy_items(args)? else {
        return Ok(Value::Bool(false));
    };
    let result = if all {
        items.iter().all(Value::is_truthy)
    } else {
        items.iter().any(Value::is_truthy)
    };
    Ok(Value::Bool(result))
}
