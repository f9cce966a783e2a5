use std::panic::{self, AssertUnwindSafe};

use crate::operators::{OperatorFn, OperatorRegistry};
use crate::{CompareOp, Context, EvalError, Expr, Value};

/// Operator lookup for one evaluation: the per-call overlay first, then the
/// session registry.
#[derive(Clone, Copy)]
pub(crate) struct Scope<'a> {
    pub(crate) base: &'a OperatorRegistry,
    pub(crate) overlay: Option<&'a OperatorRegistry>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(base: &'a OperatorRegistry, overlay: Option<&'a OperatorRegistry>) -> Self {
        Self { base, overlay }
    }

    fn lookup(&self, name: &str) -> Option<&'a OperatorFn> {
        self.overlay
            .and_then(|overlay| overlay.get(name))
            .or_else(|| self.base.get(name))
    }
}

/// Walk an expression against a context. Callers bound the depth first.
pub(crate) fn eval_expr(expr: &Expr, ctx: &Context, scope: Scope<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::List(items) => items
            .iter()
            .map(|item| eval_expr(item, ctx, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Var { path, default } => match ctx.get(path) {
            Some(value) if !value.is_null() => Ok(value),
            _ => match default {
                Some(default) => eval_expr(default, ctx, scope),
                None => Ok(Value::Null),
            },
        },
        Expr::Op { operator, args } => eval_op(operator, args, ctx, scope),
    }
}

fn eval_op(
    operator: &str,
    args: &[Expr],
    ctx: &Context,
    scope: Scope<'_>,
) -> Result<Value, EvalError> {
    match operator {
        "and" => {
            let mut last = Value::Bool(true);
            for arg in args {
                last = eval_expr(arg, ctx, scope)?;
                if !last.is_truthy() {
                    break;
                }
            }
            Ok(last)
        }
        "or" => {
            let mut last = Value::Bool(false);
            for arg in args {
                last = eval_expr(arg, ctx, scope)?;
                if last.is_truthy() {
                    break;
                }
            }
            Ok(last)
        }
        "if" | "?:" => eval_if(args, ctx, scope),
        _ => {
            let values = args
                .iter()
                .map(|arg| eval_expr(arg, ctx, scope))
                .collect::<Result<Vec<_>, _>>()?;
            apply(operator, &values, ctx, scope)
        }
    }
}

/// `[cond, then, cond, then, ..., else]`; only the chosen branch is evaluated.
fn eval_if(args: &[Expr], ctx: &Context, scope: Scope<'_>) -> Result<Value, EvalError> {
    let mut pairs = args.chunks_exact(2);
    for pair in pairs.by_ref() {
        if eval_expr(&pair[0], ctx, scope)?.is_truthy() {
            return eval_expr(&pair[1], ctx, scope);
        }
    }
    match pairs.remainder() {
        [otherwise] => eval_expr(otherwise, ctx, scope),
        _ => Ok(Value::Null),
    }
}

fn apply(
    operator: &str,
    args: &[Value],
    ctx: &Context,
    scope: Scope<'_>,
) -> Result<Value, EvalError> {
    match operator {
        "==" => {
            let (a, b) = binary(operator, args)?;
            Ok(Value::Bool(a.loose_eq(b)))
        }
        "!=" => {
            let (a, b) = binary(operator, args)?;
            Ok(Value::Bool(!a.loose_eq(b)))
        }
        "===" => {
            let (a, b) = binary(operator, args)?;
            Ok(Value::Bool(a.strict_eq(b)))
        }
        "!==" => {
            let (a, b) = binary(operator, args)?;
            Ok(Value::Bool(!a.strict_eq(b)))
        }
        "<" | "<=" | ">" | ">=" => ordering(operator, args),
        "!" => Ok(Value::Bool(!first(args).is_truthy())),
        "!!" => Ok(Value::Bool(first(args).is_truthy())),
        "+" => arithmetic(operator, args).map(|n| Value::number(n.iter().sum())),
        "*" => arithmetic(operator, args).map(|n| Value::number(n.iter().product())),
        "-" => match arithmetic(operator, args)?.as_slice() {
            [n] => Ok(Value::number(-n)),
            [a, b] => Ok(Value::number(a - b)),
            other => Err(arity_error(operator, "1 or 2", other.len())),
        },
        "/" | "%" => {
            let numbers = arithmetic(operator, args)?;
            let [a, b] = numbers.as_slice() else {
                return Err(arity_error(operator, "2", numbers.len()));
            };
            if *b == 0.0 {
                return Err(EvalError::operator(operator, "division by zero"));
            }
            Ok(Value::number(if operator == "/" { a / b } else { a % b }))
        }
        "min" | "max" => {
            let numbers = arithmetic(operator, &flatten(args))?;
            let picked = if operator == "min" {
                numbers.into_iter().reduce(f64::min)
            } else {
                numbers.into_iter().reduce(f64::max)
            };
            Ok(picked.map_or(Value::Null, Value::number))
        }
        "in" => {
            let (needle, haystack) = binary(operator, args)?;
            Ok(Value::Bool(match (needle, haystack) {
                (Value::Null, _) | (_, Value::Null) => false,
                (needle, Value::Array(items)) => items.iter().any(|item| item.loose_eq(needle)),
                (needle, Value::String(text)) => text.contains(&needle.to_plain_string()),
                _ => false,
            }))
        }
        "cat" => Ok(Value::String(
            args.iter().map(Value::to_plain_string).collect(),
        )),
        "missing" => Ok(Value::Array(
            flatten(args)
                .into_iter()
                .filter(|path| !ctx.is_answered(&path.to_plain_string()))
                .collect(),
        )),
        "var" => {
            // Dynamic path built by a nested expression.
            let path = first(args).to_plain_string();
            Ok(ctx
                .get(&path)
                .filter(|value| !value.is_null())
                .unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::Null)))
        }
        name => call_extension(name, args, scope),
    }
}

fn call_extension(name: &str, args: &[Value], scope: Scope<'_>) -> Result<Value, EvalError> {
    let Some(op) = scope.lookup(name) else {
        return Err(EvalError::operator(name, "unknown operator"));
    };
    match panic::catch_unwind(AssertUnwindSafe(|| op(args))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(message)) => Err(EvalError::operator(name, message)),
        Err(payload) => Err(EvalError::operator(name, panic_message(payload.as_ref()))),
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "operator panicked".to_owned())
}

/// Two-operand and chained three-operand (`a <= b <= c`) comparisons.
/// Any null operand makes the comparison false.
fn ordering(operator: &str, args: &[Value]) -> Result<Value, EvalError> {
    let Some(op) = CompareOp::from_symbol(operator) else {
        return Err(EvalError::operator(operator, "not an ordering operator"));
    };
    let chained = matches!(op, CompareOp::Lt | CompareOp::Lte) && args.len() == 3;
    if args.len() != 2 && !chained {
        return Err(arity_error(operator, "2", args.len()));
    }
    let holds = args
        .windows(2)
        .all(|pair| pair[0].compare(op, &pair[1]).unwrap_or(false));
    Ok(Value::Bool(holds))
}

fn binary<'v>(operator: &str, args: &'v [Value]) -> Result<(&'v Value, &'v Value), EvalError> {
    match args {
        [a, b] => Ok((a, b)),
        other => Err(arity_error(operator, "2", other.len())),
    }
}

static NULL: Value = Value::Null;

fn first(args: &[Value]) -> &Value {
    args.first().unwrap_or(&NULL)
}

fn flatten(args: &[Value]) -> Vec<Value> {
    args.iter()
        .flat_map(|arg| match arg {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        })
        .collect()
}

fn arithmetic(operator: &str, args: &[Value]) -> Result<Vec<f64>, EvalError> {
    args.iter()
        .map(|arg| {
            arg.as_f64().ok_or_else(|| {
                EvalError::operator(operator, format!("expected a number, found {arg}"))
            })
        })
        .collect()
}

fn arity_error(operator: &str, expected: &str, found: usize) -> EvalError {
    EvalError::operator(operator, format!("expected {expected} arguments, found {found}"))
}
