use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::error::EvalError;
use super::Value;

/// Profile fields every rule package may rely on.
///
/// These are stored with their natural Rust types; any other field lives in
/// the context's open extension map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownField {
    HouseholdIncome,
    HouseholdSize,
    Citizenship,
    Age,
    DateOfBirth,
    IsPregnant,
    HasChildren,
    HasDisability,
    IsVeteran,
    State,
    EmploymentStatus,
}

impl KnownField {
    pub const ALL: [KnownField; 11] = [
        KnownField::HouseholdIncome,
        KnownField::HouseholdSize,
        KnownField::Citizenship,
        KnownField::Age,
        KnownField::DateOfBirth,
        KnownField::IsPregnant,
        KnownField::HasChildren,
        KnownField::HasDisability,
        KnownField::IsVeteran,
        KnownField::State,
        KnownField::EmploymentStatus,
    ];

    /// The context path rules use to read this field.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            KnownField::HouseholdIncome => "householdIncome",
            KnownField::HouseholdSize => "householdSize",
            KnownField::Citizenship => "citizenship",
            KnownField::Age => "age",
            KnownField::DateOfBirth => "dateOfBirth",
            KnownField::IsPregnant => "isPregnant",
            KnownField::HasChildren => "hasChildren",
            KnownField::HasDisability => "hasDisability",
            KnownField::IsVeteran => "isVeteran",
            KnownField::State => "state",
            KnownField::EmploymentStatus => "employmentStatus",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<KnownField> {
        KnownField::ALL.into_iter().find(|f| f.key() == key)
    }
}

/// The well-known part of a person's self-reported profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub household_income: Option<f64>,
    pub household_size: Option<i64>,
    pub citizenship: Option<String>,
    pub age: Option<i64>,
    pub date_of_birth: Option<String>,
    pub is_pregnant: Option<bool>,
    pub has_children: Option<bool>,
    pub has_disability: Option<bool>,
    pub is_veteran: Option<bool>,
    pub state: Option<String>,
    pub employment_status: Option<String>,
}

impl Profile {
    #[must_use]
    pub fn get(&self, field: KnownField) -> Option<Value> {
        match field {
            KnownField::HouseholdIncome => self.household_income.map(Value::number),
            KnownField::HouseholdSize => self.household_size.map(Value::Int),
            KnownField::Citizenship => self.citizenship.clone().map(Value::String),
            KnownField::Age => self.age.map(Value::Int),
            KnownField::DateOfBirth => self.date_of_birth.clone().map(Value::String),
            KnownField::IsPregnant => self.is_pregnant.map(Value::Bool),
            KnownField::HasChildren => self.has_children.map(Value::Bool),
            KnownField::HasDisability => self.has_disability.map(Value::Bool),
            KnownField::IsVeteran => self.is_veteran.map(Value::Bool),
            KnownField::State => self.state.clone().map(Value::String),
            KnownField::EmploymentStatus => self.employment_status.clone().map(Value::String),
        }
    }

    /// Store a value in its typed slot. `Null` clears the slot. A value of
    /// the wrong shape is handed back unchanged.
    ///
    /// # Errors
    ///
    /// Returns the rejected value when it cannot be represented by the field's type.
    pub fn set(&mut self, field: KnownField, value: Value) -> Result<(), Value> {
        if value.is_null() {
            self.clear(field);
            return Ok(());
        }
        match field {
            KnownField::HouseholdIncome => {
                self.household_income = Some(value.as_f64().ok_or_else(|| value.clone())?);
            }
            KnownField::HouseholdSize => self.household_size = Some(integral(&value)?),
            KnownField::Age => self.age = Some(integral(&value)?),
            KnownField::IsPregnant => self.is_pregnant = Some(boolean(&value)?),
            KnownField::HasChildren => self.has_children = Some(boolean(&value)?),
            KnownField::HasDisability => self.has_disability = Some(boolean(&value)?),
            KnownField::IsVeteran => self.is_veteran = Some(boolean(&value)?),
            KnownField::Citizenship => self.citizenship = Some(text(value)?),
            KnownField::DateOfBirth => self.date_of_birth = Some(text(value)?),
            KnownField::State => self.state = Some(text(value)?),
            KnownField::EmploymentStatus => self.employment_status = Some(text(value)?),
        }
        Ok(())
    }

    fn clear(&mut self, field: KnownField) {
        match field {
            KnownField::HouseholdIncome => self.household_income = None,
            KnownField::HouseholdSize => self.household_size = None,
            KnownField::Citizenship => self.citizenship = None,
            KnownField::Age => self.age = None,
            KnownField::DateOfBirth => self.date_of_birth = None,
            KnownField::IsPregnant => self.is_pregnant = None,
            KnownField::HasChildren => self.has_children = None,
            KnownField::HasDisability => self.has_disability = None,
            KnownField::IsVeteran => self.is_veteran = None,
            KnownField::State => self.state = None,
            KnownField::EmploymentStatus => self.employment_status = None,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integral(value: &Value) -> Result<i64, Value> {
    match value.as_f64() {
        Some(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Ok(n as i64),
        _ => Err(value.clone()),
    }
}

fn boolean(value: &Value) -> Result<bool, Value> {
    value.as_bool().ok_or_else(|| value.clone())
}

fn text(value: Value) -> Result<String, Value> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(other),
    }
}

/// Evaluation context: one person's answers.
///
/// Well-known fields are held in a typed [`Profile`]; everything else goes
/// into an extension map addressed by dot-separated paths like
/// `"household.members.count"`. Reading a field nobody set yields `None`,
/// never an error.
#[derive(Debug, Clone, Default)]
pub struct Context {
    profile: Profile,
    extensions: HashMap<String, ContextValue>,
}

#[derive(Debug, Clone)]
enum ContextValue {
    Leaf(Value),
    Nested(HashMap<String, ContextValue>),
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_profile(profile: Profile) -> Self {
        Self {
            profile,
            extensions: HashMap::new(),
        }
    }

    /// Build a context from a JSON object. Nested objects become dotted paths.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidData`] if `json` is not an object.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, EvalError> {
        let serde_json::Value::Object(fields) = json else {
            return Err(EvalError::invalid_data(format!(
                "evaluation context must be an object, found {}",
                json_kind(json)
            )));
        };
        let mut ctx = Context::new();
        for (key, value) in fields {
            ctx.insert_json(key, value);
        }
        Ok(ctx)
    }

    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Set a value at a dot-separated path. Creates intermediate nested maps as needed.
    #[must_use]
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.insert(path, value.into());
        self
    }

    /// Insert a value at a dot-separated path (mutable reference version).
    ///
    /// A well-known field given a value of the wrong shape is kept in the
    /// extension map rather than dropped.
    pub fn insert(&mut self, path: &str, value: Value) {
        if let Some(known) = KnownField::from_key(path) {
            match self.profile.set(known, value) {
                Ok(()) => {
                    self.extensions.remove(path);
                    return;
                }
                Err(rejected) => {
                    tracing::debug!(
                        field = path,
                        value = %rejected,
                        "profile value has unexpected type"
                    );
                    let segments: Vec<&str> = path.split('.').collect();
                    Self::insert_recursive(&mut self.extensions, &segments, rejected);
                    return;
                }
            }
        }
        let segments: Vec<&str> = path.split('.').collect();
        Self::insert_recursive(&mut self.extensions, &segments, value);
    }

    /// Look up a value by dot-separated path.
    /// Returns `None` if the path does not exist or points to a nested map.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        if let Some(value) = KnownField::from_key(path).and_then(|f| self.profile.get(f)) {
            return Some(value);
        }
        let segments: Vec<&str> = path.split('.').collect();
        Self::get_recursive(&self.extensions, &segments).cloned()
    }

    /// Whether the path holds an answer. Null and empty strings count as unanswered.
    #[must_use]
    pub fn is_answered(&self, path: &str) -> bool {
        match self.get(path) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    fn insert_json(&mut self, path: &str, value: &serde_json::Value) {
        match value {
            serde_json::Value::Object(fields) => {
                for (key, nested) in fields {
                    self.insert_json(&format!("{path}.{key}"), nested);
                }
            }
            other => self.insert(path, Value::from(other.clone())),
        }
    }

    fn insert_recursive(map: &mut HashMap<String, ContextValue>, segments: &[&str], value: Value) {
        match segments {
            [] => {}
            [last] => {
                map.insert((*last).to_owned(), ContextValue::Leaf(value));
            }
            [first, rest @ ..] => {
                let entry = map
                    .entry((*first).to_owned())
                    .or_insert_with(|| ContextValue::Nested(HashMap::new()));
                match entry {
                    ContextValue::Nested(nested) => {
                        Self::insert_recursive(nested, rest, value);
                    }
                    ContextValue::Leaf(_) => {
                        let mut nested = HashMap::new();
                        Self::insert_recursive(&mut nested, rest, value);
                        *entry = ContextValue::Nested(nested);
                    }
                }
            }
        }
    }

    fn get_recursive<'a>(
        map: &'a HashMap<String, ContextValue>,
        segments: &[&str],
    ) -> Option<&'a Value> {
        match segments {
            [] => None,
            [last] => match map.get(*last)? {
                ContextValue::Leaf(v) => Some(v),
                ContextValue::Nested(_) => None,
            },
            [first, rest @ ..] => match map.get(*first)? {
                ContextValue::Nested(nested) => Self::get_recursive(nested, rest),
                ContextValue::Leaf(_) => None,
            },
        }
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Context::from_json(&json).map_err(serde::de::Error::custom)
    }
}

impl From<Profile> for Context {
    fn from(profile: Profile) -> Self {
        Context::from_profile(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_field_is_typed() {
        let ctx = Context::new().set("householdIncome", 2500_i64);
        assert_eq!(ctx.profile().household_income, Some(2500.0));
        assert_eq!(ctx.get("householdIncome"), Some(Value::Int(2500)));
    }

    #[test]
    fn numeric_string_fills_numeric_field() {
        let ctx = Context::new().set("householdSize", "4");
        assert_eq!(ctx.profile().household_size, Some(4));
    }

    #[test]
    fn mistyped_known_field_kept_as_extension() {
        let ctx = Context::new().set("isPregnant", "maybe");
        assert_eq!(ctx.profile().is_pregnant, None);
        assert_eq!(ctx.get("isPregnant"), Some(Value::from("maybe")));
    }

    #[test]
    fn typed_set_replaces_stale_extension() {
        let ctx = Context::new()
            .set("isPregnant", "maybe")
            .set("isPregnant", true);
        assert_eq!(ctx.get("isPregnant"), Some(Value::Bool(true)));
    }

    #[test]
    fn null_clears_known_field() {
        let ctx = Context::new().set("age", 40_i64).set("age", Value::Null);
        assert_eq!(ctx.get("age"), None);
    }

    #[test]
    fn set_and_get_nested_extension() {
        let ctx = Context::new().set("household.members.count", 3_i64);
        assert_eq!(ctx.get("household.members.count"), Some(Value::Int(3)));
        assert_eq!(ctx.get("household.members"), None);
    }

    #[test]
    fn get_missing_returns_none() {
        let ctx = Context::new().set("age", 25_i64);
        assert_eq!(ctx.get("citizenship"), None);
        assert_eq!(ctx.get("nonexistent"), None);
    }

    #[test]
    fn overwrite_leaf_with_nested() {
        let ctx = Context::new()
            .set("income", "old_value")
            .set("income.wages", 30_i64);
        assert_eq!(ctx.get("income.wages"), Some(Value::Int(30)));
        assert_eq!(ctx.get("income"), None);
    }

    #[test]
    fn from_json_flattens_objects() {
        let ctx = Context::from_json(&json!({
            "householdIncome": 1800.5,
            "citizenship": "citizen",
            "housing": {"rent": 900, "subsidized": false},
            "unknownField": [1, 2]
        }))
        .unwrap();
        assert_eq!(ctx.profile().household_income, Some(1800.5));
        assert_eq!(ctx.get("housing.rent"), Some(Value::Int(900)));
        assert_eq!(ctx.get("housing.subsidized"), Some(Value::Bool(false)));
        assert_eq!(ctx.get("unknownField"), Some(Value::from(vec![1_i64, 2])));
    }

    #[test]
    fn from_json_rejects_non_object() {
        for json in [json!(null), json!([1]), json!("x"), json!(3)] {
            let err = Context::from_json(&json).unwrap_err();
            assert!(matches!(err, EvalError::InvalidData { .. }), "{json}");
        }
    }

    #[test]
    fn deserialize_from_json_text() {
        let ctx: Context = serde_json::from_str(r#"{"age": 70, "isVeteran": true}"#).unwrap();
        assert_eq!(ctx.profile().age, Some(70));
        assert_eq!(ctx.profile().is_veteran, Some(true));
    }

    #[test]
    fn answered_excludes_blank_strings() {
        let ctx = Context::new().set("state", "").set("employmentStatus", "employed");
        assert!(!ctx.is_answered("state"));
        assert!(ctx.is_answered("employmentStatus"));
        assert!(!ctx.is_answered("age"));
    }

    #[test]
    fn known_field_keys_round_trip() {
        for field in KnownField::ALL {
            assert_eq!(KnownField::from_key(field.key()), Some(field));
        }
    }
}
