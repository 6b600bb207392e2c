/// Content hashing
///
/// Hashes are BLAKE3 digests over the canonical compact JSON encoding of a
/// value. Object keys are emitted in sorted order, so structurally equal
/// values always hash the same regardless of how they were built.
///
/// # Examples
///
/// ```
/// use sliceview::hash::{hash_row, hash_value};
/// use serde_json::json;
///
/// let a = hash_value(&json!({"b": 1, "a": 2}));
/// let b = hash_value(&json!({"a": 2, "b": 1}));
/// assert_eq!(a, b);
/// assert_eq!(a.len(), sliceview::hash::HASH_LEN);
///
/// assert_eq!(hash_row(&[json!(1), json!("x")]), hash_value(&json!([1, "x"])));
/// ```

use serde_json::Value;

/// Number of hex characters kept from the digest.
pub const HASH_LEN: usize = 22;

fn finish(hasher: &blake3::Hasher) -> String {
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..HASH_LEN].to_string()
}

/// Hash raw text.
pub fn hash_str(text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(text.as_bytes());
    finish(&hasher)
}

/// Hash any JSON value.
pub fn hash_value(value: &Value) -> String {
    hash_str(&value.to_string())
}

/// Hash an ordered row of cells. Equal to hashing the row as a JSON array.
pub fn hash_row(cells: &[Value]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"[");
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            hasher.update(b",");
        }
        hasher.update(cell.to_string().as_bytes());
    }
    hasher.update(b"]");
    finish(&hasher)
}

/// Hash an ordered list of hashes (or any strings). Equal to hashing the list
/// as a JSON array of strings.
pub fn hash_strings<S: AsRef<str>>(items: &[S]) -> String {
    let values: Vec<Value> = items
        .iter()
        .map(|s| Value::String(s.as_ref().to_string()))
        .collect();
    hash_row(&values)
}
