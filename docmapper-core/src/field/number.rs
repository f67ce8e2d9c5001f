use std::str::FromStr;

use bson::Bson;
use rust_decimal::Decimal;

use super::FieldType;
use crate::{
    error::CoercionError,
    value::{Value, int_to_bson},
};

/// Stores whole numbers. Whole floats and numeric text are accepted on the way in.
#[derive(Debug, Clone, Default)]
pub struct IntField {
    min_value: Option<i64>,
    max_value: Option<i64>,
}

impl IntField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_value(mut self, min_value: i64) -> Self {
        self.min_value = Some(min_value);
        self
    }

    pub fn max_value(mut self, max_value: i64) -> Self {
        self.max_value = Some(max_value);
        self
    }
}

fn whole(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

impl FieldType for IntField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        let n = match value {
            Value::Int(n) => *n,
            Value::Float(f) => whole(*f).ok_or_else(|| CoercionError::expected("a whole number", value))?,
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| CoercionError::expected("an integer", value))?,
            other => return Err(CoercionError::expected("an integer", other)),
        };

        Ok(int_to_bson(n))
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::Int32(n) => Ok(Value::Int(n as i64)),
            Bson::Int64(n) => Ok(Value::Int(n)),
            Bson::Double(f) => whole(f)
                .map(Value::Int)
                .ok_or_else(|| CoercionError::expected("a whole number", f)),
            other => Err(CoercionError::expected("an integer", other)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::Int(n) => {
                self.min_value.is_none_or(|min| *n >= min) && self.max_value.is_none_or(|max| *n <= max)
            }
            _ => false,
        }
    }
}

/// Stores double-precision numbers. Integers are widened.
#[derive(Debug, Clone, Default)]
pub struct FloatField {
    min_value: Option<f64>,
    max_value: Option<f64>,
}

impl FloatField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_value(mut self, min_value: f64) -> Self {
        self.min_value = Some(min_value);
        self
    }

    pub fn max_value(mut self, max_value: f64) -> Self {
        self.max_value = Some(max_value);
        self
    }
}

impl FieldType for FloatField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        match value {
            Value::Float(f) => Ok(Bson::Double(*f)),
            Value::Int(n) => Ok(Bson::Double(*n as f64)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Bson::Double)
                .map_err(|_| CoercionError::expected("a number", value)),
            other => Err(CoercionError::expected("a number", other)),
        }
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::Double(f) => Ok(Value::Float(f)),
            Bson::Int32(n) => Ok(Value::Float(n as f64)),
            Bson::Int64(n) => Ok(Value::Float(n as f64)),
            other => Err(CoercionError::expected("a number", other)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        let f = match value {
            Value::Float(f) => *f,
            Value::Int(n) => *n as f64,
            _ => return false,
        };

        !f.is_nan()
            && self.min_value.is_none_or(|min| f >= min)
            && self.max_value.is_none_or(|max| f <= max)
    }
}

/// Stores fixed-point decimals as their canonical text, so no precision is lost in storage.
///
/// `precision` bounds the number of fractional digits a valid value may carry.
#[derive(Debug, Clone, Default)]
pub struct DecimalField {
    min_value: Option<Decimal>,
    max_value: Option<Decimal>,
    precision: Option<u32>,
}

impl DecimalField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_value(mut self, min_value: Decimal) -> Self {
        self.min_value = Some(min_value);
        self
    }

    pub fn max_value(mut self, max_value: Decimal) -> Self {
        self.max_value = Some(max_value);
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    fn coerce(value: &Value) -> Result<Decimal, CoercionError> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Int(n) => Ok(Decimal::from(*n)),
            Value::Float(f) => Decimal::try_from(*f).map_err(|_| CoercionError::expected("a finite number", value)),
            Value::String(s) => Decimal::from_str(s.trim()).map_err(|_| CoercionError::expected("a decimal", value)),
            other => Err(CoercionError::expected("a decimal", other)),
        }
    }
}

impl FieldType for DecimalField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        Ok(Bson::String(Self::coerce(value)?.to_string()))
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        let native = match value {
            Bson::String(s) => Value::String(s),
            Bson::Double(f) => Value::Float(f),
            Bson::Int32(n) => Value::Int(n as i64),
            Bson::Int64(n) => Value::Int(n),
            other => return Err(CoercionError::expected("a decimal", other)),
        };

        Self::coerce(&native).map(Value::Decimal)
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::Decimal(d) => {
                self.min_value.is_none_or(|min| *d >= min)
                    && self.max_value.is_none_or(|max| *d <= max)
                    && self.precision.is_none_or(|precision| d.scale() <= precision)
            }
            _ => false,
        }
    }
}
