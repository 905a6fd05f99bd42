//! Content fingerprints for cache validation.
//!
//! A payload is normalized before hashing so that equivalent values coming
//! from different sources produce the same token: object keys are sorted,
//! numbers and booleans become their canonical string form and nested
//! collections are normalized recursively. `null` stays `null`.
//!
//! The token is the hex SHA-256 of the normalized JSON encoding.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Number, Value};
use sha2::{Digest, Sha256};

pub mod http;

pub use http::{conditional_json, if_none_match_matches};

/// Largest integer an `f64` represents exactly.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Strong validation token for a payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strong entity tag: the token in double quotes.
    pub fn to_etag(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Canonical {
    Null,
    Text(String),
    List(Vec<Canonical>),
    Map(BTreeMap<String, Canonical>),
}

fn normalize(value: &Value) -> Canonical {
    match value {
        Value::Null => Canonical::Null,
        Value::Bool(flag) => Canonical::Text(flag.to_string()),
        Value::Number(number) => Canonical::Text(canonical_number(number)),
        Value::String(text) => Canonical::Text(text.clone()),
        Value::Array(items) => Canonical::List(items.iter().map(normalize).collect()),
        Value::Object(map) => Canonical::Map(
            map.iter()
                .map(|(key, value)| (key.clone(), normalize(value)))
                .collect(),
        ),
    }
}

/// `5`, `5.0` and `"5"` all normalize to `"5"`.
fn canonical_number(number: &Number) -> String {
    if let Some(int) = number.as_i64() {
        return int.to_string();
    }
    if let Some(uint) = number.as_u64() {
        return uint.to_string();
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() <= MAX_EXACT_FLOAT_INT => {
            (float as i64).to_string()
        }
        _ => number.to_string(),
    }
}

/// Fingerprint of a JSON payload.
pub fn fingerprint(payload: &Value) -> Fingerprint {
    let canonical = normalize(payload);
    let encoded = serde_json::to_vec(&canonical)
        .expect("canonical tree holds only nulls, strings, lists and string-keyed maps");
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Fingerprint of any serializable payload.
pub fn fingerprint_of<T: Serialize + ?Sized>(payload: &T) -> Result<Fingerprint, serde_json::Error> {
    Ok(fingerprint(&serde_json::to_value(payload)?))
}

/// Whether a client's token still matches the current one. Exact comparison.
pub fn is_valid(candidate: &str, current: &Fingerprint) -> bool {
    candidate == current.as_str()
}
