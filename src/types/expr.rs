use std::fmt;
use std::ops::Not;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::error::EvalError;
use super::Value;

/// Comparison operators supported in rule expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Resolve an ordering operator name (`<`, `<=`, `>`, `>=`).
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<CompareOp> {
        match symbol {
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            "==" | "===" => Some(CompareOp::Eq),
            "!=" | "!==" => Some(CompareOp::Neq),
            _ => None,
        }
    }

    /// The operator that gives the same answer with its operands swapped.
    #[must_use]
    pub fn flipped(self) -> CompareOp {
        match self {
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Gte => CompareOp::Lte,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Lte => CompareOp::Gte,
            other => other,
        }
    }
}

/// A rule expression tree.
///
/// Every interior node is an operator name plus ordered operands. The
/// serialized form is JSON-logic style:
///
/// ```json
/// {"and": [{"<=": [{"var": "householdIncome"}, 2500]}, {"var": "hasChildren"}]}
/// ```
///
/// Expressions carry no behavior; they are evaluated by an
/// [`Evaluator`](crate::Evaluator) against a [`Context`](super::Context).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub enum Expr {
    /// A constant operand.
    Literal(Value),
    /// An array whose items are themselves expressions.
    List(Vec<Expr>),
    /// A read from the evaluation context, with an optional fallback.
    Var {
        path: String,
        default: Option<Box<Expr>>,
    },
    /// An operator applied to its operands.
    Op { operator: String, args: Vec<Expr> },
}

impl Expr {
    /// Parse an expression from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidRule`] if the expression is `null`, an
    /// operator node does not have exactly one key, or a `var` path is not
    /// a string.
    pub fn from_json(json: &JsonValue) -> Result<Expr, EvalError> {
        if json.is_null() {
            return Err(EvalError::invalid_rule("rule expression is null"));
        }
        parse_operand(json)
    }

    /// Render this expression in its JSON form.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Expr::Literal(value) => JsonValue::from(value),
            Expr::List(items) => JsonValue::Array(items.iter().map(Expr::to_json).collect()),
            Expr::Var {
                path,
                default: None,
            } => serde_json::json!({ "var": path }),
            Expr::Var {
                path,
                default: Some(default),
            } => serde_json::json!({ "var": [path, default.to_json()] }),
            Expr::Op { operator, args } => {
                let mut node = Map::new();
                node.insert(
                    operator.clone(),
                    JsonValue::Array(args.iter().map(Expr::to_json).collect()),
                );
                JsonValue::Object(node)
            }
        }
    }

    /// Structural depth: every node with operands (operator calls, list
    /// literals, `var` with a default) counts one level, leaves count zero.
    /// Computed without recursion so pathological input is rejected cheaply.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 0_usize)];
        while let Some((expr, depth)) = stack.pop() {
            let depth = depth + 1;
            match expr {
                Expr::Op { args: operands, .. } | Expr::List(operands) => {
                    max = max.max(depth);
                    stack.extend(operands.iter().map(|operand| (operand, depth)));
                }
                Expr::Var {
                    default: Some(default),
                    ..
                } => {
                    max = max.max(depth);
                    stack.push((default, depth));
                }
                Expr::Var { default: None, .. } | Expr::Literal(_) => {}
            }
        }
        max
    }

    /// All context paths this expression reads, in first-seen order.
    #[must_use]
    pub fn vars(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_vars(self, &mut out);
        out
    }

    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        self.join("and", other)
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        self.join("or", other)
    }

    /// Chains of the same connective are kept flat: `a.and(b).and(c)` is a
    /// single three-operand `and`.
    fn join(self, connective: &str, other: Expr) -> Expr {
        match self {
            Expr::Op { operator, mut args } if operator == connective => {
                args.push(other);
                Expr::Op { operator, args }
            }
            lhs => call(connective, vec![lhs, other]),
        }
    }
}

fn parse_operand(json: &JsonValue) -> Result<Expr, EvalError> {
    match json {
        JsonValue::Object(node) => {
            let mut entries = node.iter();
            let (Some((operator, arg)), None) = (entries.next(), entries.next()) else {
                return Err(EvalError::invalid_rule(format!(
                    "operator node must have exactly one key, found {}",
                    node.len()
                )));
            };
            if operator == "var" {
                return parse_var(arg);
            }
            let args = match arg {
                JsonValue::Array(items) => items
                    .iter()
                    .map(parse_operand)
                    .collect::<Result<Vec<_>, _>>()?,
                single => vec![parse_operand(single)?],
            };
            Ok(Expr::Op {
                operator: operator.clone(),
                args,
            })
        }
        JsonValue::Array(items) => {
            let parsed = items
                .iter()
                .map(parse_operand)
                .collect::<Result<Vec<_>, _>>()?;
            if parsed.iter().all(|item| matches!(item, Expr::Literal(_))) {
                let values = parsed
                    .into_iter()
                    .filter_map(|item| match item {
                        Expr::Literal(value) => Some(value),
                        _ => None,
                    })
                    .collect();
                Ok(Expr::Literal(Value::Array(values)))
            } else {
                Ok(Expr::List(parsed))
            }
        }
        scalar => Ok(Expr::Literal(Value::from(scalar.clone()))),
    }
}

fn parse_var(arg: &JsonValue) -> Result<Expr, EvalError> {
    let (path, default) = match arg {
        JsonValue::Array(items) => match items.as_slice() {
            [] => (JsonValue::Null, None),
            [path] => (path.clone(), None),
            [path, default, ..] => (path.clone(), Some(Box::new(parse_operand(default)?))),
        },
        other => (other.clone(), None),
    };
    let path = match path {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s,
        JsonValue::Number(n) => n.to_string(),
        other => {
            return Err(EvalError::invalid_rule(format!(
                "var path must be a string, found {other}"
            )))
        }
    };
    Ok(Expr::Var { path, default })
}

fn collect_vars<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
    match expr {
        Expr::Var { path, default } => {
            if !path.is_empty() && !out.contains(&path.as_str()) {
                out.push(path);
            }
            if let Some(default) = default {
                collect_vars(default, out);
            }
        }
        Expr::Op { args, .. } => args.iter().for_each(|arg| collect_vars(arg, out)),
        Expr::List(items) => items.iter().for_each(|item| collect_vars(item, out)),
        Expr::Literal(_) => {}
    }
}

impl TryFrom<JsonValue> for Expr {
    type Error = EvalError;

    fn try_from(json: JsonValue) -> Result<Self, Self::Error> {
        Expr::from_json(&json)
    }
}

impl From<Expr> for JsonValue {
    fn from(expr: Expr) -> Self {
        expr.to_json()
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Neq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        call("!", vec![self])
    }
}

/// Intermediate builder for field comparison expressions.
/// Created by [`field()`]; requires a comparison method to produce a valid [`Expr`].
#[derive(Debug, Clone)]
pub struct FieldExpr {
    path: String,
}

impl FieldExpr {
    fn compare(self, operator: &str, value: impl Into<Value>) -> Expr {
        call(operator, vec![var(&self.path), lit(value)])
    }

    #[must_use]
    pub fn eq(self, value: impl Into<Value>) -> Expr {
        self.compare("==", value)
    }

    #[must_use]
    pub fn neq(self, value: impl Into<Value>) -> Expr {
        self.compare("!=", value)
    }

    #[must_use]
    pub fn gt(self, value: impl Into<Value>) -> Expr {
        self.compare(">", value)
    }

    #[must_use]
    pub fn gte(self, value: impl Into<Value>) -> Expr {
        self.compare(">=", value)
    }

    #[must_use]
    pub fn lt(self, value: impl Into<Value>) -> Expr {
        self.compare("<", value)
    }

    #[must_use]
    pub fn lte(self, value: impl Into<Value>) -> Expr {
        self.compare("<=", value)
    }

    /// Inclusive range check using the three-operand `<=` form.
    #[must_use]
    pub fn between(self, min: impl Into<Value>, max: impl Into<Value>) -> Expr {
        call("<=", vec![lit(min), var(&self.path), lit(max)])
    }

    /// Membership in a list of literal values.
    #[must_use]
    pub fn one_of<T: Into<Value>>(self, values: Vec<T>) -> Expr {
        call("in", vec![var(&self.path), lit(values)])
    }

    /// The field's value itself, for boolean profile answers.
    #[must_use]
    pub fn is_true(self) -> Expr {
        self.compare("===", true)
    }
}

#[must_use]
pub fn field(path: &str) -> FieldExpr {
    FieldExpr {
        path: path.to_owned(),
    }
}

/// A context read.
#[must_use]
pub fn var(path: &str) -> Expr {
    Expr::Var {
        path: path.to_owned(),
        default: None,
    }
}

/// A constant operand.
#[must_use]
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

/// Apply any operator, built-in or registered, to the given operands.
#[must_use]
pub fn call(operator: &str, args: Vec<Expr>) -> Expr {
    Expr::Op {
        operator: operator.to_owned(),
        args,
    }
}
