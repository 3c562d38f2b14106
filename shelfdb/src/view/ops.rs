//! Stock operations for [`Collection::aggregate`](crate::Collection::aggregate).
//! Each takes one group's values and folds them into a single value.

use crate::value::Value;

pub fn count(values: &[Value]) -> Value {
    Value::from(values.len())
}

/// Sum of the numeric values, ignoring everything else. Stays an int while
/// every number is an int and the total fits.
pub fn sum(values: &[Value]) -> Value {
    let numbers: Vec<&Value> = values.iter().filter(|v| v.as_f64().is_some()).collect();

    let int_total = numbers
        .iter()
        .try_fold(0i64, |acc, v| v.as_i64().and_then(|i| acc.checked_add(i)));
    if let Some(total) = int_total {
        return Value::Int(total);
    }

    Value::Float(numbers.iter().filter_map(|v| v.as_f64()).sum())
}

/// Arithmetic mean of the numeric values, or null when there are none.
pub fn mean(values: &[Value]) -> Value {
    let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    if numbers.is_empty() {
        return Value::Null;
    }
    Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

pub fn max(values: &[Value]) -> Value {
    values
        .iter()
        .filter(|v| !v.is_null())
        .max_by(|a, b| a.total_cmp(b))
        .cloned()
        .unwrap_or(Value::Null)
}

pub fn min(values: &[Value]) -> Value {
    values
        .iter()
        .filter(|v| !v.is_null())
        .min_by(|a, b| a.total_cmp(b))
        .cloned()
        .unwrap_or(Value::Null)
}
