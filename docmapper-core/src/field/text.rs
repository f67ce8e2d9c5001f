use std::sync::LazyLock;

use bson::Bson;
use regex::Regex;

use super::FieldType;
use crate::{error::CoercionError, value::Value};

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:http|ftp)s?://(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)|localhost|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d+)?(?:/?|[/?]\S+)$",
    )
    .expect("url pattern is valid")
});

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[-!#$%&'*+/=?^_`{}|~0-9A-Z]+(?:\.[-!#$%&'*+/=?^_`{}|~0-9A-Z]+)*@(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+[A-Z]{2,63}\.?$")
        .expect("email pattern is valid")
});

fn text_to_storage(value: &Value) -> Result<Bson, CoercionError> {
    match value {
        Value::String(s) => Ok(Bson::String(s.clone())),
        other => Err(CoercionError::expected("text", other)),
    }
}

fn text_from_storage(value: Bson) -> Result<Value, CoercionError> {
    match value {
        Bson::String(s) => Ok(Value::String(s)),
        other => Err(CoercionError::expected("text", other)),
    }
}

fn text_is_empty(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}

/// Stores text, optionally bounded in length (counted in characters).
#[derive(Debug, Clone, Default)]
pub struct StringField {
    max_length: Option<usize>,
}

impl StringField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

impl FieldType for StringField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        text_to_storage(value)
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        text_from_storage(value)
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => self
                .max_length
                .is_none_or(|max| s.chars().count() <= max),
            _ => false,
        }
    }

    fn is_empty(&self, value: &Value) -> bool {
        text_is_empty(value)
    }
}

/// Stores text that must look like an absolute http(s) or ftp(s) URL.
#[derive(Debug, Clone, Default)]
pub struct UrlField;

impl UrlField {
    pub fn new() -> Self {
        UrlField
    }
}

impl FieldType for UrlField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        text_to_storage(value)
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        text_from_storage(value)
    }

    fn validate(&self, value: &Value) -> bool {
        matches!(value, Value::String(s) if URL_PATTERN.is_match(s))
    }

    fn is_empty(&self, value: &Value) -> bool {
        text_is_empty(value)
    }
}

/// Stores text that must look like an e-mail address.
#[derive(Debug, Clone, Default)]
pub struct EmailField;

impl EmailField {
    pub fn new() -> Self {
        EmailField
    }
}

impl FieldType for EmailField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        text_to_storage(value)
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        text_from_storage(value)
    }

    fn validate(&self, value: &Value) -> bool {
        matches!(value, Value::String(s) if EMAIL_PATTERN.is_match(s))
    }

    fn is_empty(&self, value: &Value) -> bool {
        text_is_empty(value)
    }
}
