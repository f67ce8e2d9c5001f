//! Filter operators and the fragments they produce.
//!
//! An operator is chosen by the last `__` segment of a filter key, e.g. `age__gt`. Each one
//! coerces its operand through the filtered field ([`Operator::get_value`]) and renders a
//! fragment at the field's storage path ([`Operator::to_query`]). Every operator also has a
//! field-scoped negated form ([`Operator::to_negated_query`]), used by `__not__` keys and by
//! negated boolean nodes.

use bson::{Bson, doc};

use crate::{
    error::CoercionError,
    field::Field,
    fragment::QueryFragment,
    value::Value,
};

/// The filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Implied when a key carries no operator suffix.
    Equals,
    Exists,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    IsNull,
    Ne,
    Not,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Exact,
    IExact,
}

impl Operator {
    /// Looks up the operator for a key suffix. Equality has no suffix of its own.
    pub fn from_key(key: &str) -> Option<Operator> {
        Some(match key {
            "exists" => Operator::Exists,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "in" => Operator::In,
            "is_null" => Operator::IsNull,
            "ne" => Operator::Ne,
            "not" => Operator::Not,
            "contains" => Operator::Contains,
            "icontains" => Operator::IContains,
            "startswith" => Operator::StartsWith,
            "istartswith" => Operator::IStartsWith,
            "endswith" => Operator::EndsWith,
            "iendswith" => Operator::IEndsWith,
            "exact" => Operator::Exact,
            "iexact" => Operator::IExact,
            _ => return None,
        })
    }

    /// The key suffix selecting this operator, `None` for implied equality.
    pub fn key(&self) -> Option<&'static str> {
        Some(match self {
            Operator::Equals => return None,
            Operator::Exists => "exists",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::IsNull => "is_null",
            Operator::Ne => "ne",
            Operator::Not => "not",
            Operator::Contains => "contains",
            Operator::IContains => "icontains",
            Operator::StartsWith => "startswith",
            Operator::IStartsWith => "istartswith",
            Operator::EndsWith => "endswith",
            Operator::IEndsWith => "iendswith",
            Operator::Exact => "exact",
            Operator::IExact => "iexact",
        })
    }

    fn is_pattern(&self) -> bool {
        matches!(
            self,
            Operator::Contains
                | Operator::IContains
                | Operator::StartsWith
                | Operator::IStartsWith
                | Operator::EndsWith
                | Operator::IEndsWith
                | Operator::Exact
                | Operator::IExact
        )
    }

    /// Coerces a filter operand.
    ///
    /// `exists` and `is_null` take the raw boolean, pattern operators take the raw text (scalars
    /// are written out as text), and
    /// `in` coerces each element. Everything else goes through the field's kind. Without a
    /// declared field the operand is converted untyped.
    pub fn get_value(&self, field: Option<&Field>, value: &Value) -> Result<Bson, CoercionError> {
        let coerce = |value: &Value| match field {
            Some(field) => field.kind().to_query_operand(value),
            None => Ok(value.to_bson()),
        };

        match self {
            Operator::Exists | Operator::IsNull => value
                .as_bool()
                .map(Bson::Boolean)
                .ok_or_else(|| CoercionError::expected("a boolean", value)),
            Operator::In => value
                .as_list()
                .ok_or_else(|| CoercionError::expected("a list", value.type_name()))?
                .iter()
                .map(coerce)
                .collect::<Result<Vec<_>, _>>()
                .map(Bson::Array),
            op if op.is_pattern() => pattern_text(value)
                .map(Bson::String)
                .ok_or_else(|| CoercionError::expected("text", value)),
            _ => coerce(value),
        }
    }

    /// The value placed at the storage path: a literal or an operator expression.
    fn expression(&self, value: Bson) -> Bson {
        match self {
            Operator::Equals => value,
            Operator::Exists => doc! { "$exists": value }.into(),
            Operator::Gt => doc! { "$gt": value }.into(),
            Operator::Gte => doc! { "$gte": value }.into(),
            Operator::Lt => doc! { "$lt": value }.into(),
            Operator::Lte => doc! { "$lte": value }.into(),
            Operator::In => doc! { "$in": value }.into(),
            Operator::IsNull => match value {
                Bson::Boolean(false) => doc! { "$ne": Bson::Null }.into(),
                _ => Bson::Null,
            },
            Operator::Ne | Operator::Not => doc! { "$ne": value }.into(),
            Operator::Contains => pattern(text_of(&value), false),
            Operator::IContains => pattern(text_of(&value), true),
            Operator::StartsWith => pattern(format!("^{}", text_of(&value)), false),
            Operator::IStartsWith => pattern(format!("^{}", text_of(&value)), true),
            Operator::EndsWith => pattern(format!("{}$", text_of(&value)), false),
            Operator::IEndsWith => pattern(format!("{}$", text_of(&value)), true),
            Operator::Exact => pattern(format!("^{}$", text_of(&value)), false),
            Operator::IExact => pattern(format!("^{}$", text_of(&value)), true),
        }
    }

    /// Renders the fragment for a coerced operand at `path`.
    pub fn to_query(&self, path: &str, value: Bson) -> QueryFragment {
        QueryFragment::single(path, self.expression(value))
    }

    /// Renders the negation of [`Operator::to_query`] scoped to the same path.
    ///
    /// Operators with a native opposite are substituted. The rest are wrapped in `$not`.
    pub fn to_negated_query(&self, path: &str, value: Bson) -> QueryFragment {
        let negated: Bson = match self {
            Operator::Equals => doc! { "$ne": value }.into(),
            Operator::Ne | Operator::Not => value,
            Operator::In => doc! { "$nin": value }.into(),
            Operator::Exists | Operator::IsNull => {
                let flipped = !value.as_bool().unwrap_or(true);
                self.expression(Bson::Boolean(flipped))
            }
            _ => doc! { "$not": self.expression(value) }.into(),
        };

        QueryFragment::single(path, negated)
    }
}

fn pattern_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Int(number) => Some(number.to_string()),
        Value::Float(number) => Some(number.to_string()),
        Value::Decimal(number) => Some(number.to_string()),
        Value::Uuid(uuid) => Some(uuid.to_string()),
        Value::ObjectId(id) | Value::Reference(id) => Some(id.to_hex()),
        _ => None,
    }
}

fn text_of(value: &Bson) -> String {
    match value {
        Bson::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// User text is not escaped, so regex metacharacters in the operand keep their meaning.
fn pattern(regex: String, case_insensitive: bool) -> Bson {
    if case_insensitive {
        doc! { "$regex": regex, "$options": "i" }.into()
    } else {
        doc! { "$regex": regex }.into()
    }
}
