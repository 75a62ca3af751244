//! Identity resolution: external ids derived from unique fields, with a short content hash fallback.

use crate::error::AppError;
use crate::query::Condition;
use crate::store::DocumentStore;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const HASH_LEN: usize = 7;

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s./]+").expect("static regex"))
}

fn safe_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_0-9-]+$").expect("static regex"))
}

/// Whitespace, dot and slash runs collapsed to `_`, lowercased. Absent and null values normalize to "".
pub fn normalize(value: Option<&Value>) -> String {
    let raw = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    separators().replace_all(&raw, "_").to_lowercase()
}

/// First seven lowercase hex characters of the MD5 digest.
pub fn short_hash(input: &str) -> String {
    let digest = format!("{:x}", md5::compute(input.as_bytes()));
    digest[..HASH_LEN].to_string()
}

/// Candidate id for a new instance.
///
/// One unique field: its normalized value when that is already a safe id, else its hash.
/// Several unique fields: hash of the normalized values joined with `-`.
/// None: hash of the current time and a random number.
pub fn candidate_id(unique_fields: &[&str], params: &Map<String, Value>) -> String {
    match unique_fields {
        [] => random_id(),
        [field] => {
            let normalized = normalize(params.get(*field));
            if safe_id().is_match(&normalized) {
                normalized
            } else {
                short_hash(&normalized)
            }
        }
        fields => {
            let joined = fields
                .iter()
                .map(|f| normalize(params.get(*f)))
                .collect::<Vec<_>>()
                .join("-");
            short_hash(&joined)
        }
    }
}

pub fn random_id() -> String {
    let seed = format!("{}:{}", chrono::Utc::now().timestamp_millis(), rand::random::<f64>());
    short_hash(&seed)
}

/// Conflict when a record with `id` already exists in `collection`.
pub async fn ensure_unused(store: &dyn DocumentStore, collection: &str, id: &str) -> Result<(), AppError> {
    let fields = ["id".to_string()];
    if store.find_one(collection, &Condition::by_id(id), Some(&fields)).await?.is_some() {
        return Err(AppError::Conflict(format!("duplicate id '{}' exists in {}", id, collection)));
    }
    Ok(())
}
