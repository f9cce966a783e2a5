//! Explanatory arithmetic attached to verdicts for display.
//!
//! Nothing here affects classification.

use crate::{Calculation, CompareOp, Context, Expr, KnownField, RuleDefinition, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Income,
    HouseholdSize,
    Citizenship,
    Age,
}

impl Subject {
    /// Recognised from the segments of a rule id such as `snap-gross-income`.
    fn from_rule_id(id: &str) -> Option<Subject> {
        let segments: Vec<String> = id
            .split(|c: char| c == '-' || c == '_' || c == '.')
            .map(str::to_lowercase)
            .collect();
        let has = |name: &str| segments.iter().any(|s| s == name);
        if has("income") {
            Some(Subject::Income)
        } else if has("size") || has("household") {
            Some(Subject::HouseholdSize)
        } else if has("citizenship") || has("citizen") || has("immigration") {
            Some(Subject::Citizenship)
        } else if has("age") {
            Some(Subject::Age)
        } else {
            None
        }
    }

    fn field(self) -> KnownField {
        match self {
            Subject::Income => KnownField::HouseholdIncome,
            Subject::HouseholdSize => KnownField::HouseholdSize,
            Subject::Citizenship => KnownField::Citizenship,
            Subject::Age => KnownField::Age,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Subject::Income => "Monthly household income",
            Subject::HouseholdSize => "Household size",
            Subject::Citizenship => "Citizenship status",
            Subject::Age => "Age",
        }
    }

    fn render(self, value: &Value) -> String {
        match (self, value.as_f64()) {
            (Subject::Income, Some(amount)) => money(amount),
            _ => value.to_plain_string(),
        }
    }
}

/// The calculation shown for a rule, if the rule is about a field we know
/// how to explain.
pub(crate) fn calculation_for(rule: &RuleDefinition, ctx: &Context) -> Option<Calculation> {
    let subject = Subject::from_rule_id(&rule.id)?;
    let key = subject.field().key();
    let value = ctx.get(key).unwrap_or(Value::Null);

    let comparison = if value.is_null() {
        "not provided".to_owned()
    } else {
        match find_threshold(&rule.expression, key) {
            Some(Threshold::Compare(op, limit)) => {
                format!("{} {} {}", subject.render(&value), symbol(op), subject.render(&limit))
            }
            Some(Threshold::OneOf(accepted)) => format!(
                "{} (accepted: {})",
                subject.render(&value),
                accepted
                    .iter()
                    .map(Value::to_plain_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            None => subject.render(&value),
        }
    };

    Some(Calculation {
        label: subject.label().to_owned(),
        value,
        comparison,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Threshold {
    /// `field <op> limit`, normalised so the field is on the left.
    Compare(CompareOp, Value),
    OneOf(Vec<Value>),
}

/// First comparison in the expression between `path` and a literal.
fn find_threshold(expr: &Expr, path: &str) -> Option<Threshold> {
    let Expr::Op { operator, args } = expr else {
        return None;
    };
    let is_field = |e: &Expr| matches!(e, Expr::Var { path: p, .. } if p == path);
    let here = match (operator.as_str(), args.as_slice()) {
        ("in", [needle, Expr::Literal(Value::Array(items))]) if is_field(needle) => {
            Some(Threshold::OneOf(items.clone()))
        }
        (op, [lhs, Expr::Literal(limit)]) if is_field(lhs) => {
            CompareOp::from_symbol(op).map(|op| Threshold::Compare(op, limit.clone()))
        }
        (op, [Expr::Literal(limit), rhs]) if is_field(rhs) => {
            CompareOp::from_symbol(op).map(|op| Threshold::Compare(op.flipped(), limit.clone()))
        }
        // Three-operand `min <= field <= max`: report the upper bound.
        ("<=" | "<", [Expr::Literal(_), mid, Expr::Literal(max)]) if is_field(mid) => {
            CompareOp::from_symbol(operator).map(|op| Threshold::Compare(op, max.clone()))
        }
        _ => None,
    };
    here.or_else(|| args.iter().find_map(|arg| find_threshold(arg, path)))
}

fn symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Neq => "≠",
        CompareOp::Gt => ">",
        CompareOp::Gte => "≥",
        CompareOp::Lt => "<",
        CompareOp::Lte => "≤",
    }
}

/// `$1,234.50` style formatting.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn money(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let (dollars, cents) = (cents / 100, cents % 100);
    let digits = dollars.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{cents:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;

    #[test]
    fn money_formatting() {
        assert_eq!(money(0.0), "$0.00");
        assert_eq!(money(2500.0), "$2,500.00");
        assert_eq!(money(1234567.891), "$1,234,567.89");
        assert_eq!(money(-42.5), "-$42.50");
    }

    #[test]
    fn subject_from_rule_id() {
        assert_eq!(Subject::from_rule_id("snap-gross-income"), Some(Subject::Income));
        assert_eq!(Subject::from_rule_id("wic_household_size"), Some(Subject::HouseholdSize));
        assert_eq!(Subject::from_rule_id("medicaid-citizenship"), Some(Subject::Citizenship));
        assert_eq!(Subject::from_rule_id("ssi-age"), Some(Subject::Age));
        assert_eq!(Subject::from_rule_id("snap-work-requirement"), None);
        // "average" is not an age rule.
        assert_eq!(Subject::from_rule_id("snap-average-hours"), None);
    }

    #[test]
    fn income_calculation() {
        let rule = RuleDefinition::new(
            "snap-gross-income",
            "snap",
            field("householdIncome").lte(2500_i64),
        );
        let ctx = Context::new().set("householdIncome", 1800_i64);
        let calc = calculation_for(&rule, &ctx).unwrap();
        assert_eq!(calc.label, "Monthly household income");
        assert_eq!(calc.value, Value::Int(1800));
        assert_eq!(calc.comparison, "$1,800.00 ≤ $2,500.00");
    }

    #[test]
    fn flipped_literal_on_left() {
        let expr = crate::call(">=", vec![crate::lit(65_i64), crate::var("age")]);
        let rule = RuleDefinition::new("ssi-age", "ssi", expr);
        let calc = calculation_for(&rule, &Context::new().set("age", 70_i64)).unwrap();
        assert_eq!(calc.comparison, "70 ≤ 65");
    }

    #[test]
    fn citizenship_lists_accepted_values() {
        let rule = RuleDefinition::new(
            "snap-citizenship",
            "snap",
            field("citizenship").one_of(vec!["citizen", "permanent_resident"]),
        );
        let ctx = Context::new().set("citizenship", "citizen");
        let calc = calculation_for(&rule, &ctx).unwrap();
        assert_eq!(calc.comparison, "citizen (accepted: citizen, permanent_resident)");
    }

    #[test]
    fn unanswered_field_is_not_provided() {
        let rule = RuleDefinition::new("ssi-age", "ssi", field("age").gte(65_i64));
        let calc = calculation_for(&rule, &Context::new()).unwrap();
        assert_eq!(calc.value, Value::Null);
        assert_eq!(calc.comparison, "not provided");
    }

    #[test]
    fn threshold_found_inside_and() {
        let expr = field("age")
            .gte(18_i64)
            .and(field("householdIncome").lt(3000_i64));
        assert_eq!(
            find_threshold(&expr, "householdIncome"),
            Some(Threshold::Compare(CompareOp::Lt, Value::Int(3000)))
        );
    }
}
