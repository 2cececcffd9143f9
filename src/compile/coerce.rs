//! Operator- and type-specific value coercion.
//!
//! Form inputs arrive mostly as strings; MongoDB wants typed values. The
//! operator decides the shape first (`$exists` is always a bool, `$all` an
//! array, ...), then the condition's data type decides each scalar.

use crate::compile::CompileError;
use crate::model::{Condition, DataType, Operator};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

/// Default `$options` for `$regex`.
pub const DEFAULT_REGEX_OPTIONS: &str = "i";

/// Coerce the condition's value for its operator.
pub fn coerce_value(cond: &Condition) -> Result<Value, CompileError> {
    let value = &cond.value;
    let out = match cond.operator {
        Operator::Exists => Value::Bool(truthy(value)),
        Operator::Type => Value::String(cond.data_type.bson_alias().to_string()),
        Operator::Regex | Operator::Text | Operator::Where => Value::String(as_text(value)),
        Operator::Size => Value::from(parse_int(value).ok_or_else(|| {
            invalid(cond, format!("expected a non-negative integer, got {}", value))
        })?),
        Operator::Mod => match value {
            Value::Array(_) => value.clone(),
            other => json!([number_value(number_or_zero(other)), 0]),
        },
        Operator::All => Value::Array(
            as_list(value)
                .into_iter()
                .map(|v| by_data_type(&v, cond.data_type))
                .collect(),
        ),
        Operator::ElemMatch => match value {
            Value::Object(_) => value.clone(),
            _ => Value::Object(Map::new()),
        },
        Operator::In | Operator::Nin => Value::Array(
            split_list(value)
                .into_iter()
                .map(|v| by_data_type(&v, cond.data_type))
                .collect(),
        ),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            range_bound(value, cond.data_type)
        }
        Operator::GeoWithin | Operator::GeoIntersects | Operator::Near | Operator::NearSphere => {
            value.clone()
        }
        Operator::Eq | Operator::Ne => by_data_type(value, cond.data_type),
    };
    Ok(out)
}

fn invalid(cond: &Condition, reason: String) -> CompileError {
    CompileError::InvalidValue {
        field: cond.field.clone(),
        operator: cond.operator,
        reason,
    }
}

/// Range bounds: numbers stay numbers and numeric strings become numbers
/// unless the field is a date.
fn range_bound(value: &Value, data_type: DataType) -> Value {
    match (data_type, value) {
        (DataType::Date, _) | (DataType::Number, _) => by_data_type(value, data_type),
        (_, Value::Number(_)) => value.clone(),
        (_, Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => number_value(n),
            _ => by_data_type(value, data_type),
        },
        _ => by_data_type(value, data_type),
    }
}

/// Scalar coercion by declared data type. Under the default `string` type,
/// JSON numbers and booleans keep their type.
pub fn by_data_type(value: &Value, data_type: DataType) -> Value {
    match data_type {
        DataType::Number => number_value(number_or_zero(value)),
        DataType::Boolean => Value::Bool(truthy(value)),
        DataType::Date => date_value(value),
        DataType::ObjectId => json!({ "$oid": as_text(value) }),
        DataType::Array => match value {
            Value::Array(_) => value.clone(),
            other => Value::Array(vec![other.clone()]),
        },
        DataType::Object => match value {
            Value::Object(_) => value.clone(),
            _ => Value::Object(Map::new()),
        },
        DataType::Null => Value::Null,
        DataType::Regex => json!({ "$regex": as_text(value) }),
        DataType::String => match value {
            Value::Null => Value::String(String::new()),
            Value::Number(_) | Value::Bool(_) => value.clone(),
            other => Value::String(as_text(other)),
        },
        DataType::Binary | DataType::Decimal128 => Value::String(as_text(value)),
    }
}

/// Loose truthiness for form values. `"false"` and `"0"` count as false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0")
        }
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn number_or_zero(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn parse_int(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Integral floats are emitted as integers so `18` stays `18`.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Like `as_list`, but `"a, b"` becomes `["a", "b"]`.
fn split_list(value: &Value) -> Vec<Value> {
    match value {
        Value::String(s) if s.contains(',') => s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| Value::String(p.to_string()))
            .collect(),
        other => as_list(other),
    }
}

fn date_value(value: &Value) -> Value {
    let parsed = match value {
        Value::String(s) => parse_date(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    match parsed {
        Some(dt) => json!({ "$date": dt.to_rfc3339_opts(SecondsFormat::Millis, true) }),
        None => Value::String(as_text(value)),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cond(op: Operator, value: Value, dt: DataType) -> Condition {
        Condition::new("f", op, value).with_data_type(dt)
    }

    #[test]
    fn exists_is_boolean() {
        for (input, expected) in [
            (json!(true), true),
            (json!("yes"), true),
            (json!(1), true),
            (json!("false"), false),
            (json!(""), false),
            (json!(0), false),
            (Value::Null, false),
        ] {
            let v = coerce_value(&cond(Operator::Exists, input.clone(), DataType::String)).unwrap();
            assert_eq!(v, Value::Bool(expected), "input {}", input);
        }
    }

    #[test]
    fn range_operators_parse_numeric_strings() {
        let v = coerce_value(&cond(Operator::Gte, json!("18"), DataType::String)).unwrap();
        assert_eq!(v, json!(18));
        let v = coerce_value(&cond(Operator::Lt, json!("2.5"), DataType::String)).unwrap();
        assert_eq!(v, json!(2.5));
        let v = coerce_value(&cond(Operator::Lt, json!("abc"), DataType::String)).unwrap();
        assert_eq!(v, json!("abc"));
    }

    #[test]
    fn json_numbers_and_booleans_keep_their_type() {
        let v = coerce_value(&cond(Operator::Gt, json!(5), DataType::String)).unwrap();
        assert_eq!(v, json!(5));
        let v = coerce_value(&cond(Operator::Lte, json!(0.5), DataType::String)).unwrap();
        assert_eq!(v, json!(0.5));
        let v = coerce_value(&cond(Operator::Eq, json!(42), DataType::String)).unwrap();
        assert_eq!(v, json!(42));
        let v = coerce_value(&cond(Operator::Ne, json!(false), DataType::String)).unwrap();
        assert_eq!(v, json!(false));
        let v = coerce_value(&cond(Operator::In, json!([1, "b"]), DataType::String)).unwrap();
        assert_eq!(v, json!([1, "b"]));
    }

    #[test]
    fn equality_number_falls_back_to_zero() {
        let v = coerce_value(&cond(Operator::Eq, json!("nope"), DataType::Number)).unwrap();
        assert_eq!(v, json!(0));
    }

    #[test]
    fn in_splits_comma_lists() {
        let v = coerce_value(&cond(Operator::In, json!("a, b,,c"), DataType::String)).unwrap();
        assert_eq!(v, json!(["a", "b", "c"]));
        let v = coerce_value(&cond(Operator::Nin, json!(["1", "2"]), DataType::Number)).unwrap();
        assert_eq!(v, json!([1, 2]));
    }

    #[test]
    fn size_rejects_non_integers() {
        assert_eq!(
            coerce_value(&cond(Operator::Size, json!("3"), DataType::Number)).unwrap(),
            json!(3)
        );
        let err = coerce_value(&cond(Operator::Size, json!("three"), DataType::Number)).unwrap_err();
        assert!(matches!(err, CompileError::InvalidValue { operator: Operator::Size, .. }));
    }

    #[test]
    fn array_operator_shapes() {
        assert_eq!(
            coerce_value(&cond(Operator::Mod, json!("4"), DataType::Number)).unwrap(),
            json!([4, 0])
        );
        assert_eq!(
            coerce_value(&cond(Operator::All, json!("x"), DataType::String)).unwrap(),
            json!(["x"])
        );
        assert_eq!(
            coerce_value(&cond(Operator::ElemMatch, json!("x"), DataType::String)).unwrap(),
            json!({})
        );
    }

    #[test]
    fn dates_and_object_ids() {
        assert_eq!(
            by_data_type(&json!("2024-03-01"), DataType::Date),
            json!({ "$date": "2024-03-01T00:00:00.000Z" })
        );
        assert_eq!(
            by_data_type(&json!("not a date"), DataType::Date),
            json!("not a date")
        );
        assert_eq!(
            by_data_type(&json!("507f1f77bcf86cd799439011"), DataType::ObjectId),
            json!({ "$oid": "507f1f77bcf86cd799439011" })
        );
    }

    #[test]
    fn type_uses_bson_alias() {
        let v = coerce_value(&cond(Operator::Type, Value::Null, DataType::Boolean)).unwrap();
        assert_eq!(v, json!("bool"));
    }
}
