//! Detail record normalization and validation.
//!
//! The extraction service does not always honour the schema's key
//! spellings; records are mapped onto canonical keys before they are
//! persisted.

use jsonschema::Validator;
use serde_json::{Map, Value, json};

use crate::error::AppError;

/// Legacy key → canonical key.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("address", "address_line_1"),
    ("province/state", "province_state"),
    ("postal/zip code", "postal_zip_code"),
    ("latitude", "lat"),
    ("longitude", "lng"),
    ("contact email", "contact_email"),
    ("contact website", "contact_website"),
    ("contact primary phone", "contact_primary_phone"),
    ("time slots", "time_slots"),
];

/// Map legacy key spellings onto canonical keys.
///
/// The legacy key is always removed. Its value only moves over when the
/// canonical key is absent or null, so an already-canonical record comes
/// back unchanged.
pub fn normalize_record(mut record: Map<String, Value>) -> Map<String, Value> {
    for (legacy, canonical) in FIELD_ALIASES {
        let Some(value) = record.remove(*legacy) else {
            continue;
        };
        let canonical_missing = record.get(*canonical).is_none_or(Value::is_null);
        if canonical_missing {
            record.insert((*canonical).to_string(), value);
        }
    }
    record
}

/// Checks the fields every stored record must carry: a non-empty `title`
/// and `event_link`.
pub struct RecordValidator {
    validator: Validator,
}

impl RecordValidator {
    pub fn new() -> Result<Self, AppError> {
        let schema = json!({
            "type": "object",
            "required": ["title", "event_link"],
            "properties": {
                "title": {"type": "string", "minLength": 1},
                "event_link": {"type": "string", "minLength": 1}
            }
        });
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| AppError::Generic(format!("Invalid record schema: {e}")))?;
        Ok(Self { validator })
    }

    pub fn is_valid(&self, record: &Value) -> bool {
        self.validator.is_valid(record)
    }
}
