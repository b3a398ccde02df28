//! Canonical plan encoding and hashing
//!
//! The plan hash binds what the operator enqueued to what the vehicle is
//! about to execute. Both sides digest the same canonical encoding of
//! `(cmd, args)`: JSON with lexicographically sorted keys and normalized
//! numbers, so key order, trailing zeros, and equivalent numerics all hash
//! identically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// The only command kind the core lifecycle understands. Other kinds are
/// extension points and are rejected at enqueue.
pub const CMD_RUN_DIVE: &str = "RUN_DIVE";

// ============================================================================
// RUN_DIVE ARGUMENTS
// ============================================================================

/// Arguments for a `RUN_DIVE` command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunDiveArgs {
    pub target_depth_m: f64,
    pub hold_at_depth_s: i64,
    pub cycles: i64,
}

/// Argument validation failure at enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} must be positive")]
pub struct PlanArgsError {
    pub field: &'static str,
}

impl RunDiveArgs {
    pub fn validate(&self) -> Result<(), PlanArgsError> {
        if !(self.target_depth_m > 0.0) {
            return Err(PlanArgsError {
                field: "target_depth_m",
            });
        }
        if self.hold_at_depth_s <= 0 {
            return Err(PlanArgsError {
                field: "hold_at_depth_s",
            });
        }
        if self.cycles <= 0 {
            return Err(PlanArgsError { field: "cycles" });
        }
        Ok(())
    }
}

// ============================================================================
// CANONICAL ENCODING
// ============================================================================

/// Render a JSON value in canonical form: object keys sorted
/// lexicographically, integral floats rendered as integers, shortest
/// round-trip formatting otherwise.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_canonical_number(n, out),
        Value::String(s) => {
            // serde_json's escaping rules are the canon here
            out.push_str(&serde_json::to_string(s).expect("string serialization is infallible"));
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(
                    &serde_json::to_string(key).expect("string serialization is infallible"),
                );
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

/// Integral values render without a fractional part regardless of how the
/// sender spelled them; 10, 10.0, and 1e1 all canonicalize to `10`.
fn write_canonical_number(n: &serde_json::Number, out: &mut String) {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
        return;
    }
    if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
        return;
    }
    let f = n.as_f64().unwrap_or(0.0);
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        out.push_str(&format!("{}", f as i64));
    } else {
        // serde_json formats f64 via the shortest round-trip representation
        out.push_str(&n.to_string());
    }
}

// ============================================================================
// PLAN HASH
// ============================================================================

/// Compute the plan hash: SHA-256 over the canonical encoding of the
/// envelope `{"args": <args>, "cmd": <cmd>}`, as lowercase hex.
pub fn plan_hash(cmd: &str, args: &Value) -> String {
    let envelope = serde_json::json!({ "args": args, "cmd": cmd });
    let canonical = canonical_json(&envelope);
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(64);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_sorts_keys() {
        let a = json!({"b": 1, "a": 2});
        assert_eq!(canonical_json(&a), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn canonical_normalizes_integral_floats() {
        assert_eq!(canonical_json(&json!(10.0)), "10");
        assert_eq!(canonical_json(&json!(10)), "10");
        assert_eq!(canonical_json(&json!(-3.0)), "-3");
        assert_eq!(canonical_json(&json!(2.5)), "2.5");
    }

    #[test]
    fn canonical_recurses_into_arrays_and_objects() {
        let v = json!({"z": [1.0, {"y": 2, "x": 3.5}], "a": null});
        assert_eq!(canonical_json(&v), r#"{"a":null,"z":[1,{"x":3.5,"y":2}]}"#);
    }

    #[test]
    fn plan_hash_is_key_order_and_numeric_form_insensitive() {
        let a = json!({"target_depth_m": 10, "hold_at_depth_s": 30, "cycles": 1});
        let b = json!({"cycles": 1.0, "hold_at_depth_s": 30.0, "target_depth_m": 10.0});
        assert_eq!(plan_hash(CMD_RUN_DIVE, &a), plan_hash(CMD_RUN_DIVE, &b));
    }

    #[test]
    fn plan_hash_differs_on_semantic_change() {
        let a = json!({"target_depth_m": 10, "hold_at_depth_s": 30, "cycles": 1});
        let b = json!({"target_depth_m": 12, "hold_at_depth_s": 30, "cycles": 1});
        assert_ne!(plan_hash(CMD_RUN_DIVE, &a), plan_hash(CMD_RUN_DIVE, &b));
        assert_ne!(plan_hash(CMD_RUN_DIVE, &a), plan_hash("RUN_SURVEY", &a));
    }

    #[test]
    fn plan_hash_is_64_hex_chars() {
        let h = plan_hash(CMD_RUN_DIVE, &json!({"cycles": 1}));
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn run_dive_args_validation() {
        let ok = RunDiveArgs {
            target_depth_m: 10.0,
            hold_at_depth_s: 30,
            cycles: 1,
        };
        assert!(ok.validate().is_ok());

        let bad = RunDiveArgs {
            target_depth_m: 0.0,
            ..ok
        };
        assert_eq!(bad.validate().unwrap_err().field, "target_depth_m");
    }
}
