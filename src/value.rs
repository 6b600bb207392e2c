/// SliceView cell values and column types
///
/// Cells are plain `serde_json::Value`s: a tagged sum over null, boolean,
/// number, string, array and object. A `ColumnType` describes what a column
/// holds; when a selection does not declare a type it is inferred by folding
/// over the tags of the column's cells.

use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::cmp::Ordering;

pub use serde_json::Value;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    /// A JSON object
    Json,
    /// A JSON array
    JsonArray,
    /// Any JSON value; also the "not yet known" type
    #[default]
    JsonValue,
}

impl ColumnType {
    /// The concrete type of a single cell, or `None` for null.
    pub fn of(value: &Value) -> Option<ColumnType> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Number(_) => Some(ColumnType::Number),
            Value::String(_) => Some(ColumnType::String),
            Value::Array(_) => Some(ColumnType::JsonArray),
            Value::Object(_) => Some(ColumnType::Json),
        }
    }

    /// Returns true if `value` may be stored in a column of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match ColumnType::of(value) {
            None => true,
            Some(t) => *self == ColumnType::JsonValue || *self == t,
        }
    }
}

/// How many cells to look at when inferring column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeInference {
    /// Use the first non-null cell of each column.
    #[default]
    Shallow,
    /// Look at every cell; mixed concrete types become `JsonValue`.
    Deep,
}

/// Infer the type of every column.
///
/// Declared types other than `JsonValue` are kept as they are. Columns
/// without a non-null cell stay `JsonValue`.
pub fn infer_column_types<R: AsRef<[Value]>>(
    declared: &[ColumnType],
    rows: &[R],
    mode: TypeInference,
) -> Vec<ColumnType> {
    declared
        .iter()
        .enumerate()
        .map(|(col, declared)| {
            if *declared != ColumnType::JsonValue {
                return *declared;
            }

            let mut cells = rows
                .iter()
                .filter_map(|row| row.as_ref().get(col))
                .filter_map(ColumnType::of);

            match mode {
                TypeInference::Shallow => cells.next().unwrap_or(ColumnType::JsonValue),
                TypeInference::Deep => {
                    let first = match cells.next() {
                        Some(t) => t,
                        None => return ColumnType::JsonValue,
                    };
                    cells.fold(first, |acc, t| if acc == t { acc } else { ColumnType::JsonValue })
                }
            }
        })
        .collect()
}

/// Rank used to order cells of different types deterministically.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

enum Numeric {
    Int(i128),
    Float(f64),
}

fn numeric(n: &Number) -> Numeric {
    if let Some(i) = n.as_i64() {
        Numeric::Int(i as i128)
    } else if let Some(u) = n.as_u64() {
        Numeric::Int(u as i128)
    } else {
        Numeric::Float(n.as_f64().unwrap_or(0.0))
    }
}

/// 2^127, the first float beyond the i128 range.
const I128_LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

/// Exact comparison of an integer with a finite float.
fn compare_int_float(i: i128, f: f64) -> Ordering {
    if f >= I128_LIMIT {
        return Ordering::Less;
    }
    if f < -I128_LIMIT {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i128)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal),
        other => other,
    }
}

/// Numbers compare by exact value, whatever mix of integer and float they
/// are stored as.
fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    match (numeric(a), numeric(b)) {
        (Numeric::Int(a), Numeric::Int(b)) => a.cmp(&b),
        (Numeric::Int(a), Numeric::Float(b)) => compare_int_float(a, b),
        (Numeric::Float(a), Numeric::Int(b)) => compare_int_float(b, a).reverse(),
        (Numeric::Float(a), Numeric::Float(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Total order over cells: nulls first, then by type, then by value.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Returns true if `name` is lower camel case: an ASCII lowercase letter
/// followed by ASCII letters and digits.
pub fn is_lower_camel_case(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_of() {
        assert_eq!(ColumnType::of(&json!(null)), None);
        assert_eq!(ColumnType::of(&json!(1.5)), Some(ColumnType::Number));
        assert_eq!(ColumnType::of(&json!("x")), Some(ColumnType::String));
        assert_eq!(ColumnType::of(&json!([1])), Some(ColumnType::JsonArray));
        assert_eq!(ColumnType::of(&json!({"a": 1})), Some(ColumnType::Json));
    }

    #[test]
    fn test_infer_shallow_uses_first_non_null() {
        let rows = vec![
            vec![json!(null), json!("a")],
            vec![json!(1), json!(2)],
        ];
        let declared = vec![ColumnType::JsonValue, ColumnType::JsonValue];
        let types = infer_column_types(&declared, &rows, TypeInference::Shallow);
        assert_eq!(types, vec![ColumnType::Number, ColumnType::String]);
    }

    #[test]
    fn test_infer_deep_downgrades_mixed() {
        let rows = vec![
            vec![json!(null), json!("a")],
            vec![json!(1), json!(2)],
        ];
        let declared = vec![ColumnType::JsonValue, ColumnType::JsonValue];
        let types = infer_column_types(&declared, &rows, TypeInference::Deep);
        assert_eq!(types, vec![ColumnType::Number, ColumnType::JsonValue]);
    }

    #[test]
    fn test_infer_keeps_declared_and_all_null() {
        let rows = vec![vec![json!(null), json!(null)]];
        let declared = vec![ColumnType::Boolean, ColumnType::JsonValue];
        let types = infer_column_types(&declared, &rows, TypeInference::Deep);
        assert_eq!(types, vec![ColumnType::Boolean, ColumnType::JsonValue]);
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&json!(null), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!(false), &json!(true)), Ordering::Less);
        assert_eq!(compare_values(&json!("1"), &json!(1)), Ordering::Greater);
        assert_eq!(compare_values(&json!(2.0), &json!(2)), Ordering::Equal);
        assert_eq!(compare_values(&json!(-1.5), &json!(-1)), Ordering::Less);
        assert_eq!(compare_values(&json!(u64::MAX), &json!(i64::MAX)), Ordering::Greater);
    }

    #[test]
    fn test_compare_large_mixed_numbers_is_transitive() {
        let big_int = json!(9_007_199_254_740_993_i64);
        let big_float = json!(9_007_199_254_740_992.0_f64);
        let smaller_int = json!(9_007_199_254_740_992_i64);

        assert_eq!(compare_values(&big_int, &big_float), Ordering::Greater);
        assert_eq!(compare_values(&big_float, &smaller_int), Ordering::Equal);
        assert_eq!(compare_values(&big_int, &smaller_int), Ordering::Greater);
        assert_eq!(compare_values(&json!(1e300), &json!(u64::MAX)), Ordering::Greater);

        let mut cells = vec![big_int.clone(), big_float.clone(), smaller_int.clone(), json!(1.5)];
        cells.sort_by(compare_values);
        assert_eq!(cells[0], json!(1.5));
        assert_eq!(cells[3], big_int);
    }

    #[test]
    fn test_lower_camel_case() {
        assert!(is_lower_camel_case("carGeneral"));
        assert!(is_lower_camel_case("a1"));
        assert!(!is_lower_camel_case("CarGeneral"));
        assert!(!is_lower_camel_case("car_general"));
        assert!(!is_lower_camel_case(""));
        assert!(!is_lower_camel_case("1abc"));
    }
}
