// ABOUTME: Condition and expression evaluation with dynamic coercion rules

use crate::ast::{CmpOp, Condition, Expr, IndexKey, Operand};
use crate::context::Context;
use crate::error::ScriptError;
use crate::grammar;
use crate::http::ResponseSnapshot;
use crate::token::tokenize;
use crate::value::Value;

/// Evaluate a condition tree. `and`/`or` short-circuit left to right.
pub fn eval_condition(
    cond: &Condition,
    ctx: &Context,
    last: Option<&ResponseSnapshot>,
) -> Result<bool, ScriptError> {
    match cond {
        Condition::Or(lhs, rhs) => {
            Ok(eval_condition(lhs, ctx, last)? || eval_condition(rhs, ctx, last)?)
        }
        Condition::And(lhs, rhs) => {
            Ok(eval_condition(lhs, ctx, last)? && eval_condition(rhs, ctx, last)?)
        }
        Condition::Not(inner) => Ok(!eval_condition(inner, ctx, last)?),
        Condition::Cmp { lhs, op, rhs } => {
            let lhs = resolve_operand(lhs, ctx, last)?;
            let rhs = resolve_operand(rhs, ctx, last)?;
            Ok(compare_values(&lhs, *op, &rhs))
        }
        Condition::Contains { lhs, rhs } => {
            let lhs = resolve_operand(lhs, ctx, last)?;
            let rhs = resolve_operand(rhs, ctx, last)?;
            Ok(value_contains(&lhs, &rhs))
        }
        Condition::Matches { lhs, pattern } => {
            let lhs = resolve_operand(lhs, ctx, last)?;
            let pattern = ctx.expand(pattern);
            let re = regex::Regex::new(&pattern)
                .map_err(|e| ScriptError::semantic(format!("invalid regex '{}': {}", pattern, e)))?;
            Ok(re.is_match(&lhs.to_string()))
        }
        Condition::Empty(op) => {
            let v = resolve_operand(op, ctx, last)?;
            Ok(is_empty(&v))
        }
        Condition::Exists(op) => match op {
            Operand::Var(name) => Ok(ctx.get_var(name).is_some()),
            Operand::Status | Operand::Response => Ok(last.is_some()),
            _ => Ok(!matches!(resolve_operand(op, ctx, last)?, Value::Null)),
        },
        Condition::Truthy(op) => Ok(resolve_operand(op, ctx, last)?.is_truthy()),
    }
}

/// Tokenize and evaluate condition text: the block preprocessor's path for
/// `if`/`while` headers, sharing the grammar path's evaluator.
pub fn eval_condition_str(
    text: &str,
    ctx: &Context,
    last: Option<&ResponseSnapshot>,
) -> Result<bool, ScriptError> {
    let tokens = tokenize(text)?;
    let cond = grammar::parse_condition(&tokens)?;
    eval_condition(&cond, ctx, last)
}

/// Evaluate a `set` expression to a value.
pub fn eval_expr(expr: &Expr, ctx: &Context) -> Result<Value, ScriptError> {
    match expr {
        Expr::Literal(Value::Str(s)) => Ok(Value::Str(ctx.expand(s))),
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(name) => ctx
            .get_var(name)
            .cloned()
            .ok_or_else(|| ScriptError::semantic(format!("unknown variable '{}'", name))),
        Expr::Index { var, index } => index_variable(var, index, ctx),
        Expr::Length(name) => {
            let v = ctx
                .get_var(name)
                .ok_or_else(|| ScriptError::semantic(format!("unknown variable '{}'", name)))?;
            let len = match v {
                Value::Array(items) => items.len(),
                Value::Map(map) => map.len(),
                Value::Str(s) => s.chars().count(),
                other => {
                    return Err(ScriptError::semantic(format!(
                        "length: expected array or string, got {}",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Number(len as f64))
        }
        Expr::Split { var, sep } => {
            let v = ctx
                .get_var(var)
                .ok_or_else(|| ScriptError::semantic(format!("unknown variable '{}'", var)))?;
            let sep = ctx.expand(sep);
            let parts = v
                .to_string()
                .split(sep.as_str())
                .map(|p| Value::Str(p.to_string()))
                .collect();
            Ok(Value::Array(parts))
        }
        Expr::Binary { lhs, op, rhs } => {
            let lhs = eval_expr(lhs, ctx)?;
            let rhs = eval_expr(rhs, ctx)?;
            arithmetic(&lhs, *op, &rhs)
        }
    }
}

fn arithmetic(lhs: &Value, op: crate::ast::ArithOp, rhs: &Value) -> Result<Value, ScriptError> {
    use crate::ast::ArithOp;

    let l = lhs.as_number().ok_or_else(|| {
        ScriptError::semantic(format!("arithmetic on non-numeric value '{}'", lhs))
    })?;
    let r = rhs.as_number().ok_or_else(|| {
        ScriptError::semantic(format!("arithmetic on non-numeric value '{}'", rhs))
    })?;

    let result = match op {
        ArithOp::Add => l + r,
        ArithOp::Sub => l - r,
        ArithOp::Mul => l * r,
        ArithOp::Div => {
            if r == 0.0 {
                return Err(ScriptError::semantic("division by zero"));
            }
            l / r
        }
    };
    Ok(Value::Number(result))
}

/// Resolve a condition operand to a value. Unset variables resolve to null
/// so `exists`/`empty` and lexicographic comparisons behave, rather than
/// erroring the way value-required expression positions do.
pub fn resolve_operand(
    op: &Operand,
    ctx: &Context,
    last: Option<&ResponseSnapshot>,
) -> Result<Value, ScriptError> {
    match op {
        Operand::Literal(Value::Str(s)) => Ok(Value::Str(ctx.expand(s))),
        Operand::Literal(v) => Ok(v.clone()),
        Operand::Var(name) => Ok(ctx.get_var(name).cloned().unwrap_or(Value::Null)),
        Operand::Index { var, index } => index_variable(var, index, ctx),
        Operand::Status => Ok(Value::Number(last.map(|r| r.status as f64).unwrap_or(0.0))),
        Operand::Response => Ok(Value::Str(
            last.map(|r| r.body.clone()).unwrap_or_default(),
        )),
    }
}

fn index_variable(var: &str, index: &IndexKey, ctx: &Context) -> Result<Value, ScriptError> {
    let idx = match index {
        IndexKey::Number(n) => *n,
        IndexKey::Var(name) => {
            let v = ctx
                .get_var(name)
                .ok_or_else(|| ScriptError::semantic(format!("unknown variable '{}'", name)))?;
            v.as_number()
                .filter(|n| *n >= 0.0 && n.fract() == 0.0)
                .map(|n| n as usize)
                .ok_or_else(|| {
                    ScriptError::semantic(format!("index variable '{}' is not a whole number", name))
                })?
        }
    };

    let value = ctx
        .get_var(var)
        .ok_or_else(|| ScriptError::semantic(format!("unknown variable '{}'", var)))?;

    let items: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        // A string holding a JSON array indexes like one
        Value::Str(s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(serde_json::Value::Array(items)) => items.iter().map(Value::from_json).collect(),
            _ => {
                return Err(ScriptError::semantic(format!(
                    "variable '{}' is not an array",
                    var
                )))
            }
        },
        other => {
            return Err(ScriptError::semantic(format!(
                "variable '{}' is not an array (got {})",
                var,
                other.type_name()
            )))
        }
    };

    items.get(idx).cloned().ok_or_else(|| {
        ScriptError::semantic(format!(
            "index {} out of bounds for '{}' (length {})",
            idx,
            var,
            items.len()
        ))
    })
}

/// Numeric comparison when both sides parse as numbers, lexicographic on the
/// stringified forms otherwise. Determined per evaluation, not per variable.
pub fn compare_values(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
    if let (Some(l), Some(r)) = (lhs.as_number(), rhs.as_number()) {
        return match op {
            CmpOp::Eq => l == r,
            CmpOp::Ne => l != r,
            CmpOp::Gt => l > r,
            CmpOp::Lt => l < r,
            CmpOp::Ge => l >= r,
            CmpOp::Le => l <= r,
        };
    }

    let l = lhs.to_string();
    let r = rhs.to_string();
    match op {
        CmpOp::Eq => l == r,
        CmpOp::Ne => l != r,
        CmpOp::Gt => l > r,
        CmpOp::Lt => l < r,
        CmpOp::Ge => l >= r,
        CmpOp::Le => l <= r,
    }
}

fn value_contains(lhs: &Value, rhs: &Value) -> bool {
    match lhs {
        Value::Array(items) => {
            let needle = rhs.to_string();
            items.iter().any(|item| item.to_string() == needle)
        }
        other => other.to_string().contains(&rhs.to_string()),
    }
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Str(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        _ => false,
    }
}
