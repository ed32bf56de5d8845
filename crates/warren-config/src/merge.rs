//! Structural merging of configuration trees.
//!
//! Two rules are used on [`serde_json::Value`] trees:
//!
//! - [`merge_missing`] gives the destination precedence. A destination field
//!   is only replaced when it is missing or holds a zero value. This is how
//!   values from lower-priority providers fill the gaps left by earlier ones.
//! - [`overlay`] gives the source precedence. It applies a partial value on
//!   top of a schema's zero shape.
//!
//! Objects are merged key by key in both cases.

use serde_json::Value;

/// Returns true if `value` is the zero value of its kind.
///
/// Null, `false`, numeric zero, the empty string, and empty arrays and
/// objects count as zero.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Fills zero or missing fields of `dst` from `src`.
pub fn merge_missing(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, src_value) in src {
                match dst.get_mut(&key) {
                    Some(dst_value) => merge_missing(dst_value, src_value),
                    None => {
                        dst.insert(key, src_value);
                    }
                }
            }
        }
        (dst, src) => {
            if is_zero(dst) {
                *dst = src;
            }
        }
    }
}

/// Applies every non-null field present in `top` onto `base`.
pub fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(top)) => {
            for (key, top_value) in top {
                match base.get_mut(&key) {
                    Some(base_value) => overlay(base_value, top_value),
                    None => {
                        base.insert(key, top_value);
                    }
                }
            }
        }
        (base, top) => *base = top,
    }
}
