//! Turns the backend's results payloads into one canonical shape.
//!
//! The results service has shipped two layouts over time:
//!
//! ```json
//! { "totalVotos": 8, "resultado": { "A": 3, "B": 5 } }
//! { "total": 8, "A": 3, "B": 5, "_updatedAt": 1700000000000 }
//! ```
//!
//! Counts may arrive as numbers or numeric strings. [`RawResultPayload`]
//! resolves the layout once; [`normalize`] coerces every field and never fails.

use chrono::Utc;
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const KEY_TOTAL: &str = "total";
const KEY_TOTAL_VOTOS: &str = "totalVotos";
const KEY_UPDATED_AT: &str = "_updatedAt";
const KEY_RESULTADO: &str = "resultado";

const RESERVED_KEYS: [&str; 4] = [KEY_TOTAL, KEY_TOTAL_VOTOS, KEY_UPDATED_AT, KEY_RESULTADO];

/// Where the per-option counts live in a raw payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCounts<'a> {
    /// Counts under a non-empty `resultado` object.
    Nested(&'a Map<String, Value>),
    /// Counts as top-level keys next to the reserved ones.
    Flat(Vec<(&'a str, &'a Value)>),
}

/// A raw payload with its layout resolved, fields not yet coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResultPayload<'a> {
    pub declared_total: Option<&'a Value>,
    pub updated_at: Option<&'a Value>,
    pub counts: RawCounts<'a>,
}

impl<'a> RawResultPayload<'a> {
    /// `None` for null or non-object payloads, which mean "no results yet".
    pub fn classify(raw: &'a Value) -> Option<Self> {
        let obj = raw.as_object()?;

        let present = move |key: &str| obj.get(key).filter(|v| !v.is_null());
        let declared_total = present(KEY_TOTAL_VOTOS).or_else(|| present(KEY_TOTAL));
        let updated_at = present(KEY_UPDATED_AT);

        let counts = match obj.get(KEY_RESULTADO).and_then(Value::as_object) {
            Some(nested) if !nested.is_empty() => RawCounts::Nested(nested),
            _ => RawCounts::Flat(
                obj.iter()
                    .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
                    .map(|(key, value)| (key.as_str(), value))
                    .collect(),
            ),
        };

        Some(Self {
            declared_total,
            updated_at,
            counts,
        })
    }
}

/// Shape-stable results for one session.
///
/// `total` is whatever the backend declared. It is not recomputed from
/// `per_option`, so the two may disagree if the backend tracks them apart.
/// Serializes back into the nested payload layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalResult {
    pub total: u64,
    #[serde(rename = "resultado")]
    pub per_option: BTreeMap<String, u64>,
    /// Epoch milliseconds.
    #[serde(rename = "_updatedAt")]
    pub updated_at: i64,
}

impl CanonicalResult {
    pub fn count(&self, option: &str) -> u64 {
        self.per_option.get(option).copied().unwrap_or(0)
    }
}

pub fn normalize(raw: Option<&Value>) -> Option<CanonicalResult> {
    normalize_at(raw, Utc::now().timestamp_millis())
}

/// Same as [`normalize`], with `now_ms` used when the payload carries no timestamp.
pub fn normalize_at(raw: Option<&Value>, now_ms: i64) -> Option<CanonicalResult> {
    // Nothing to show for null or non-object payloads
    let payload = RawResultPayload::classify(raw?)?;

    // Backend total wins, even when it disagrees with the counts
    let total = payload.declared_total.map(coerce_count).unwrap_or(0);
    let updated_at = payload
        .updated_at
        .and_then(coerce_timestamp)
        .unwrap_or(now_ms);

    // Per-option counts, from either layout
    let per_option = match payload.counts {
        RawCounts::Nested(map) => map
            .iter()
            .map(|(option, count)| (option.clone(), coerce_count(count)))
            .collect(),
        RawCounts::Flat(pairs) => pairs
            .into_iter()
            .map(|(option, count)| (option.to_string(), coerce_count(count)))
            .collect(),
    };

    Some(CanonicalResult {
        total,
        per_option,
        updated_at,
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Some(0.0)
            } else {
                s.parse::<f64>().ok()
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Non-negative integer count; anything unusable becomes 0.
fn coerce_count(value: &Value) -> u64 {
    if let Some(n) = value.as_u64() {
        return n;
    }
    match as_number(value) {
        Some(n) if n.is_finite() && n > 0.0 => n.trunc() as u64,
        Some(_) => 0,
        None => {
            debug!("Coercing non-numeric count {} to 0", value);
            0
        }
    }
}

// Zero counts as absent, like a falsy timestamp upstream.
fn coerce_timestamp(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return (n != 0).then_some(n);
    }
    match as_number(value) {
        Some(n) if n.is_finite() && n.trunc() != 0.0 => Some(n.trunc() as i64),
        _ => {
            debug!("Ignoring unusable timestamp {}", value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn missing_payload_is_none() {
        assert_eq!(normalize(None), None);
        assert_eq!(normalize(Some(&Value::Null)), None);
        assert_eq!(normalize_at(Some(&json!("nothing")), NOW), None);
    }

    #[test]
    fn nested_payload_with_string_counts() {
        let raw = json!({ "resultado": { "A": "3", "B": 5 }, "totalVotos": "8" });
        let result = normalize(Some(&raw)).unwrap();
        assert_eq!(result.total, 8);
        assert_eq!(result.count("A"), 3);
        assert_eq!(result.count("B"), 5);
        assert_eq!(result.per_option.len(), 2);
        assert!(result.updated_at > 0);
    }

    #[test]
    fn flat_payload_skips_reserved_keys() {
        let raw = json!({ "total": 4, "zz": 1, "vv": "3", "_updatedAt": 42, "resultado": {} });
        let result = normalize_at(Some(&raw), NOW).unwrap();
        assert_eq!(result.total, 4);
        assert_eq!(result.updated_at, 42);
        assert_eq!(
            result.per_option,
            BTreeMap::from([("vv".to_string(), 3), ("zz".to_string(), 1)])
        );
    }

    #[test]
    fn nested_counts_take_precedence_over_top_level_keys() {
        let raw = json!({ "resultado": { "A": 1 }, "B": 9, "total": 1 });
        let result = normalize_at(Some(&raw), NOW).unwrap();
        assert_eq!(result.per_option, BTreeMap::from([("A".to_string(), 1)]));
    }

    #[test]
    fn total_votos_wins_over_total_and_null_falls_through() {
        let both = json!({ "totalVotos": 7, "total": 2 });
        assert_eq!(normalize_at(Some(&both), NOW).unwrap().total, 7);

        let null_votos = json!({ "totalVotos": null, "total": 2 });
        assert_eq!(normalize_at(Some(&null_votos), NOW).unwrap().total, 2);

        let neither = json!({ "A": 1 });
        assert_eq!(normalize_at(Some(&neither), NOW).unwrap().total, 0);
    }

    #[test]
    fn backend_total_is_kept_even_when_counts_disagree() {
        let raw = json!({ "totalVotos": 10, "resultado": { "A": 2, "B": 3 } });
        let result = normalize_at(Some(&raw), NOW).unwrap();
        assert_eq!(result.total, 10);
        assert_eq!(result.per_option.values().sum::<u64>(), 5);
    }

    #[test]
    fn malformed_fields_default_instead_of_failing() {
        let raw = json!({
            "totalVotos": "lots",
            "_updatedAt": "yesterday",
            "resultado": { "A": "x", "B": -4, "C": 2.9, "D": [1], "E": true }
        });
        let result = normalize_at(Some(&raw), NOW).unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.updated_at, NOW);
        assert_eq!(result.count("A"), 0);
        assert_eq!(result.count("B"), 0);
        assert_eq!(result.count("C"), 2);
        assert_eq!(result.count("D"), 0);
        assert_eq!(result.count("E"), 1);
    }

    #[test]
    fn zero_timestamp_means_now() {
        let raw = json!({ "total": 0, "_updatedAt": 0 });
        assert_eq!(normalize_at(Some(&raw), NOW).unwrap().updated_at, NOW);
    }

    #[test]
    fn renormalizing_own_output_is_identity() {
        let payloads = [
            json!({ "resultado": { "A": "3", "B": 5 }, "totalVotos": "8" }),
            json!({ "total": 2, "Sim": 2, "Não": 0, "_updatedAt": "123" }),
            json!({ "total": 0 }),
            json!({ "totalVotos": 9, "resultado": { "x": 9 }, "_updatedAt": 55 }),
        ];
        for raw in payloads {
            let first = normalize_at(Some(&raw), NOW).unwrap();
            let encoded = serde_json::to_value(&first).unwrap();
            let second = normalize_at(Some(&encoded), NOW + 1).unwrap();
            assert_eq!(first, second, "payload {}", raw);
        }
    }

    #[test]
    fn classify_reports_layout() {
        let nested = json!({ "resultado": { "A": 1 } });
        assert!(matches!(
            RawResultPayload::classify(&nested).unwrap().counts,
            RawCounts::Nested(_)
        ));

        let flat = json!({ "resultado": "n/a", "A": 1 });
        match RawResultPayload::classify(&flat).unwrap().counts {
            RawCounts::Flat(pairs) => assert_eq!(pairs, vec![("A", &json!(1))]),
            other => panic!("expected flat layout, got {:?}", other),
        }
    }
}
