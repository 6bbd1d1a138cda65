//! Numeric coercion for request fields and batch cells.
//!
//! Missing, null, non-numeric and non-finite values become 0.0. Each coercion is
//! reported back so callers can warn instead of silently masking bad input.

use super::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use crate::config::CoercionPolicy;
use crate::error::{ChurnError, Result};
use serde_json::Value;

/// A value plus the names of the fields that had to be zero-filled.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced<T> {
    pub value: T,
    pub coerced: Vec<&'static str>,
}

impl<T> Coerced<T> {
    pub fn is_clean(&self) -> bool {
        self.coerced.is_empty()
    }
}

fn parse_text(raw: &str) -> Option<f64> {
    let t = raw.trim();
    match t.to_ascii_lowercase().as_str() {
        "true" => return Some(1.0),
        "false" => return Some(0.0),
        _ => {}
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce one CSV cell. An empty cell counts as missing and is always zero-filled.
/// Returns the value and whether it was coerced.
pub fn coerce_cell(
    field: &'static str,
    raw: Option<&str>,
    policy: CoercionPolicy,
) -> Result<(f64, bool)> {
    let raw = match raw {
        Some(r) if !r.trim().is_empty() => r,
        _ => return Ok((0.0, true)),
    };
    match parse_text(raw) {
        Some(v) => Ok((v, false)),
        None if policy == CoercionPolicy::Reject => Err(ChurnError::InvalidFeature {
            field,
            value: raw.to_string(),
        }),
        None => Ok((0.0, true)),
    }
}

fn coerce_value(field: &'static str, value: Option<&Value>, policy: CoercionPolicy) -> Result<(f64, bool)> {
    match value {
        None | Some(Value::Null) => Ok((0.0, true)),
        Some(Value::Number(n)) => match n.as_f64().filter(|v| v.is_finite()) {
            Some(v) => Ok((v, false)),
            None => coerce_cell(field, Some(&n.to_string()), policy),
        },
        Some(Value::Bool(b)) => Ok((if *b { 1.0 } else { 0.0 }, false)),
        Some(Value::String(s)) => coerce_cell(field, Some(s), policy),
        Some(other) if policy == CoercionPolicy::Reject => Err(ChurnError::InvalidFeature {
            field,
            value: other.to_string(),
        }),
        Some(_) => Ok((0.0, true)),
    }
}

/// Build a feature vector from a JSON object (request body or form fields as strings).
/// Unknown keys are ignored. A non-object body yields an all-zero vector.
pub fn coerce_json(body: &Value, policy: CoercionPolicy) -> Result<Coerced<FeatureVector>> {
    let mut values = [0.0; FEATURE_COUNT];
    let mut coerced = Vec::new();
    for (i, name) in FEATURE_NAMES.iter().enumerate() {
        let (v, was_coerced) = coerce_value(name, body.get(name), policy)?;
        values[i] = v;
        if was_coerced {
            coerced.push(*name);
        }
    }
    if !coerced.is_empty() {
        tracing::warn!(fields = ?coerced, "feature values coerced to 0");
    }
    Ok(Coerced {
        value: FeatureVector::new(values),
        coerced,
    })
}

/// Zero-fill non-finite components of an already-built vector.
pub fn zero_fill_non_finite(features: &FeatureVector) -> Coerced<FeatureVector> {
    let mut value = *features;
    let mut coerced = Vec::new();
    for (v, name) in value.values.iter_mut().zip(FEATURE_NAMES) {
        if !v.is_finite() {
            *v = 0.0;
            coerced.push(name);
        }
    }
    if !coerced.is_empty() {
        tracing::warn!(fields = ?coerced, "feature values coerced to 0");
    }
    Coerced { value, coerced }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_and_bools_parse() {
        let body = json!({
            "credit_score": "650",
            "age": 40,
            "tenure": 5.0,
            "balance": " 100000.5 ",
            "products_number": 2,
            "credit_card": true,
            "active_member": "false",
            "estimated_salary": 60000
        });
        let out = coerce_json(&body, CoercionPolicy::ZeroFill).unwrap();
        assert!(out.is_clean());
        assert_eq!(
            out.value.values,
            [650.0, 40.0, 5.0, 100000.5, 2.0, 1.0, 0.0, 60000.0]
        );
    }

    #[test]
    fn bad_and_missing_fields_zero_fill() {
        let body = json!({ "age": "abc", "balance": null, "tenure": "nan" });
        let out = coerce_json(&body, CoercionPolicy::ZeroFill).unwrap();
        assert_eq!(out.value.values, [0.0; FEATURE_COUNT]);
        assert!(out.coerced.contains(&"age"));
        assert!(out.coerced.contains(&"tenure"));
        assert_eq!(out.coerced.len(), FEATURE_COUNT);
    }

    #[test]
    fn reject_policy_fails_on_garbage_but_not_on_missing() {
        let err = coerce_json(&json!({ "age": "abc" }), CoercionPolicy::Reject).unwrap_err();
        assert!(matches!(err, ChurnError::InvalidFeature { field: "age", .. }));

        let ok = coerce_json(&json!({}), CoercionPolicy::Reject).unwrap();
        assert_eq!(ok.value, FeatureVector::default());
    }

    #[test]
    fn empty_cell_is_missing() {
        assert_eq!(coerce_cell("age", Some("  "), CoercionPolicy::Reject).unwrap(), (0.0, true));
        assert_eq!(coerce_cell("age", None, CoercionPolicy::ZeroFill).unwrap(), (0.0, true));
        assert_eq!(coerce_cell("age", Some("1e3"), CoercionPolicy::ZeroFill).unwrap(), (1000.0, false));
    }

    #[test]
    fn non_finite_components_are_zero_filled() {
        let fv = FeatureVector::new([650.0, f64::NAN, 5.0, f64::INFINITY, 2.0, 1.0, f64::NEG_INFINITY, 60000.0]);
        let out = zero_fill_non_finite(&fv);
        assert_eq!(out.value.values, [650.0, 0.0, 5.0, 0.0, 2.0, 1.0, 0.0, 60000.0]);
        assert_eq!(out.coerced, vec!["age", "balance", "active_member"]);

        assert!(zero_fill_non_finite(&FeatureVector::default()).is_clean());
    }
}
