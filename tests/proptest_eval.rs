use proptest::prelude::*;
use qualify::{call, field, lit, var, Context, EvaluateOptions, Evaluator, Expr, Value};

/// Generate a random `Value`.
fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(Value::Int),
        any::<f64>()
            .prop_filter("must be finite", |f| f.is_finite())
            .prop_map(Value::Float),
        any::<bool>().prop_map(Value::Bool),
        "[a-z0-9/-]{0,10}".prop_map(Value::String),
        prop::collection::vec(any::<i32>().prop_map(Value::from), 0..4).prop_map(Value::Array),
    ]
}

/// Every operator the evaluator knows, built-in or domain.
const OPERATORS: &[&str] = &[
    "==", "!=", "===", "!==", "<", "<=", ">", ">=", "!", "!!", "and", "or", "if", "+", "-", "*",
    "/", "%", "min", "max", "in", "cat", "missing", "between", "within_percent", "age_from_dob",
    "date_in_past", "date_in_future", "matches_any", "count_true", "all_true", "any_true",
];

/// An operator applied to 0..=3 operands drawn from literals and one context read.
fn arb_call() -> impl Strategy<Value = Expr> {
    (
        prop::sample::select(OPERATORS),
        prop::collection::vec(
            prop_oneof![arb_value().prop_map(lit), Just(var("x"))],
            0..=3,
        ),
    )
        .prop_map(|(op, args)| call(op, args))
}

proptest! {
    /// Lenient evaluation never panics and never returns `Err`, whatever the
    /// operands: bad input becomes a failed outcome.
    #[test]
    fn lenient_evaluation_is_total(expr in arb_call(), x in arb_value()) {
        let evaluator = Evaluator::with_builtins();
        let ctx = Context::new().set("x", x);
        let outcome = evaluator.evaluate_sync(&expr, &ctx, &EvaluateOptions::default());
        prop_assert!(outcome.is_ok());
    }

    /// A failed outcome always carries `false`.
    #[test]
    fn failures_default_to_false(expr in arb_call(), x in arb_value()) {
        let evaluator = Evaluator::with_builtins();
        let ctx = Context::new().set("x", x);
        let outcome = evaluator.evaluate_sync(&expr, &ctx, &EvaluateOptions::default()).unwrap();
        if !outcome.is_success() {
            prop_assert_eq!(outcome.value(), &Value::Bool(false));
        }
    }

    /// `!!` of an expression agrees with the truthiness of its value.
    #[test]
    fn double_bang_is_truthiness(x in arb_value()) {
        let evaluator = Evaluator::default();
        let ctx = Context::new().set("x", x.clone());
        let outcome = evaluator
            .evaluate_sync(&call("!!", vec![var("x")]), &ctx, &EvaluateOptions::default())
            .unwrap();
        prop_assert_eq!(outcome.into_value(), Value::Bool(x.is_truthy()));
    }

    /// AND short-circuits: if the first comparison is false, the second
    /// operand is never evaluated, even when it would fail.
    #[test]
    fn and_false_short_circuit(x in arb_value()) {
        let evaluator = Evaluator::default();
        let ctx = Context::new().set("x", x).set("y", 0_i64);
        let expr = field("y").eq(999_i64).and(call("/", vec![lit(1_i64), lit(0_i64)]));
        let outcome = evaluator.evaluate_sync(&expr, &ctx, &EvaluateOptions::default()).unwrap();
        prop_assert!(outcome.is_success());
        prop_assert_eq!(outcome.into_value(), Value::Bool(false));
    }

    /// OR short-circuits on a true first operand.
    #[test]
    fn or_true_short_circuit(x in arb_value()) {
        let evaluator = Evaluator::default();
        let ctx = Context::new().set("x", x).set("y", 1_i64);
        let expr = field("y").eq(1_i64).or(call("no_such_operator", vec![]));
        let outcome = evaluator.evaluate_sync(&expr, &ctx, &EvaluateOptions::default()).unwrap();
        prop_assert!(outcome.is_true());
    }

    /// Comparisons against a missing field are always false.
    #[test]
    fn missing_field_compares_false(limit in any::<i64>(), op in 0_u8..6) {
        let f = field("householdIncome");
        let expr = match op {
            0 => f.eq(limit),
            1 => f.gt(limit),
            2 => f.gte(limit),
            3 => f.lt(limit),
            4 => f.lte(limit),
            _ => f.between(limit, limit),
        };
        let outcome = Evaluator::default()
            .evaluate_sync(&expr, &Context::new(), &EvaluateOptions::default())
            .unwrap();
        prop_assert_eq!(outcome.into_value(), Value::Bool(false));
    }
}
