//! In-memory evaluation of the WHERE language.
//!
//! Mirrors the PostgreSQL rendering of `FilterWhere`, including SQL null
//! semantics: a comparison against a NULL (or absent) column is false.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter::is_identifier;
use super::types::FilterOp;

pub struct FilterMatch;

impl FilterMatch {
    pub fn matches(where_data: &Value, record: &Map<String, Value>) -> Result<bool, FilterError> {
        match where_data {
            Value::Null => Ok(true),
            Value::Object(obj) => {
                for (key, value) in obj {
                    let ok = if key.starts_with('$') {
                        Self::eval_logical(key, value, record)?
                    } else {
                        Self::eval_field(key, value, record)?
                    };
                    if !ok {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn eval_logical(op: &str, value: &Value, record: &Map<String, Value>) -> Result<bool, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value.as_array().ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut results = Vec::with_capacity(arr.len());
                for v in arr {
                    results.push(Self::matches(v, record)?);
                }
                if op == "$and" {
                    Ok(results.into_iter().all(|r| r))
                } else {
                    Ok(results.into_iter().any(|r| r))
                }
            }
            "$not" => Ok(!Self::matches(value, record)?),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn eval_field(field: &str, value: &Value, record: &Map<String, Value>) -> Result<bool, FilterError> {
        if !is_identifier(field) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", field)));
        }
        let actual = record.get(field).filter(|v| !v.is_null());

        match value {
            Value::Object(obj) if !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')) => {
                for (op_key, op_val) in obj {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))?;
                    if !Self::eval_condition(actual, operator, op_val)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Value::Array(_) => Self::eval_condition(actual, FilterOp::In, value),
            _ => Self::eval_condition(actual, FilterOp::Eq, value),
        }
    }

    fn eval_condition(actual: Option<&Value>, operator: FilterOp, data: &Value) -> Result<bool, FilterError> {
        match operator {
            FilterOp::Eq => Ok(match actual {
                None => data.is_null(),
                Some(v) => !data.is_null() && values_equal(v, data),
            }),
            FilterOp::Ne => Ok(match actual {
                None => false,
                Some(v) => data.is_null() || !values_equal(v, data),
            }),
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                if !matches!(data, Value::Number(_) | Value::String(_) | Value::Bool(_)) {
                    return Err(FilterError::InvalidOperatorData(format!("{:?} requires a scalar value", operator)));
                }
                let Some(ordering) = actual.and_then(|v| compare_values(v, data)) else { return Ok(false) };
                Ok(match operator {
                    FilterOp::Gt => ordering == Ordering::Greater,
                    FilterOp::Gte => ordering != Ordering::Less,
                    FilterOp::Lt => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                })
            }
            FilterOp::Like | FilterOp::NLike | FilterOp::ILike | FilterOp::NILike => {
                let pattern = data.as_str().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("{:?} requires a string pattern", operator))
                })?;
                let Some(text) = actual.and_then(Value::as_str) else { return Ok(false) };
                let case_insensitive = matches!(operator, FilterOp::ILike | FilterOp::NILike);
                let matched = like_match(pattern, text, case_insensitive);
                Ok(if matches!(operator, FilterOp::Like | FilterOp::ILike) { matched } else { !matched })
            }
            FilterOp::In | FilterOp::NIn => {
                let values = match data {
                    Value::Array(values) => values.as_slice(),
                    other => std::slice::from_ref(other),
                };
                let negated = operator == FilterOp::NIn;
                if values.is_empty() {
                    return Ok(negated);
                }
                let Some(v) = actual else { return Ok(false) };
                let found = values.iter().any(|candidate| values_equal(v, candidate));
                Ok(found != negated)
            }
            FilterOp::Between => match data {
                Value::Array(bounds) if bounds.len() == 2 => {
                    let Some(v) = actual else { return Ok(false) };
                    let above = compare_values(v, &bounds[0]).map(|o| o != Ordering::Less).unwrap_or(false);
                    let below = compare_values(v, &bounds[1]).map(|o| o != Ordering::Greater).unwrap_or(false);
                    Ok(above && below)
                }
                _ => Err(FilterError::InvalidOperatorData("$between requires array with 2 values".to_string())),
            },
            FilterOp::Exists | FilterOp::Null => {
                let flag = data.as_bool().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("{:?} requires a boolean", operator))
                })?;
                let want_null = (operator == FilterOp::Null) == flag;
                Ok(actual.is_none() == want_null)
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two JSON scalars of the same kind.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL LIKE: `%` matches any run of characters, `_` exactly one.
fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (p, t): (Vec<char>, Vec<char>) = if case_insensitive {
        (pattern.to_lowercase().chars().collect(), text.to_lowercase().chars().collect())
    } else {
        (pattern.chars().collect(), text.chars().collect())
    };

    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;
    while ti < t.len() {
        if pi < p.len() && p[pi] != '%' && (p[pi] == '_' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}
