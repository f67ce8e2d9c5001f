use bson::Bson;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};

use super::FieldType;
use crate::{error::CoercionError, value::Value};

/// Stores instants with millisecond precision, the resolution of the storage `DateTime` type.
///
/// Instants finer than a millisecond do not validate. Saving a record truncates them first (see
/// [`DateTimeField::truncate`]), so the validated value is the stored one.
///
/// With `auto_now_on_insert` the field is stamped when a document is first saved, and with
/// `auto_now_on_update` on every save.
#[derive(Debug, Clone, Default)]
pub struct DateTimeField {
    auto_now_on_insert: bool,
    auto_now_on_update: bool,
}

impl DateTimeField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_now_on_insert(mut self) -> Self {
        self.auto_now_on_insert = true;
        self
    }

    pub fn auto_now_on_update(mut self) -> Self {
        self.auto_now_on_update = true;
        self
    }

    /// The timestamp to stamp on save, if this field is automatic for the given save.
    pub fn auto_value(&self, creating: bool) -> Option<Value> {
        (self.auto_now_on_update || (creating && self.auto_now_on_insert))
            .then(|| Value::DateTime(Utc::now().trunc_subsecs(3)))
    }
}

impl DateTimeField {
    /// Truncates an instant in place to the stored precision.
    pub fn truncate(value: &mut Value) {
        if let Value::DateTime(dt) = value {
            *dt = dt.trunc_subsecs(3);
        }
    }
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn millis(dt: DateTime<Utc>) -> Bson {
    Bson::DateTime(bson::DateTime::from_millis(dt.timestamp_millis()))
}

impl FieldType for DateTimeField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        match value {
            Value::DateTime(dt) => Ok(millis(*dt)),
            Value::String(s) => parse_text(s)
                .map(millis)
                .ok_or_else(|| CoercionError::expected("an RFC 3339 timestamp", value)),
            other => Err(CoercionError::expected("a timestamp", other)),
        }
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::DateTime(dt) => DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
                .map(Value::DateTime)
                .ok_or_else(|| CoercionError::expected("a representable timestamp", dt)),
            Bson::String(s) => parse_text(&s)
                .map(|dt| Value::DateTime(dt.trunc_subsecs(3)))
                .ok_or_else(|| CoercionError::expected("an RFC 3339 timestamp", s)),
            other => Err(CoercionError::expected("a timestamp", other)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        matches!(value, Value::DateTime(dt) if dt.timestamp_subsec_nanos() % 1_000_000 == 0)
    }
}
