//! Field declarations and the field-type system.
//!
//! A [`Field`] describes one named attribute of a [`DocumentType`](crate::schema::DocumentType):
//! its logical name, its storage name, presence and uniqueness flags, defaults and save hooks,
//! and a [`FieldKind`] that knows how to coerce, validate and test values for emptiness.
//!
//! Each concrete kind is a small struct implementing [`FieldType`]. [`FieldKind`] is the closed
//! set of those kinds and dispatches to them explicitly.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::field::{Field, StringField, IntField};
//!
//! let email = Field::new("email", StringField::new().max_length(120)).required();
//! let age = Field::new("age", IntField::new().min_value(0)).db_field("a");
//! ```

mod binary;
mod compound;
mod identity;
mod number;
mod structured;
mod temporal;
mod text;

use std::{fmt, sync::Arc};

use bson::Bson;

use crate::{
    error::{CoercionError, MapperResult, MapperError},
    schema::DocumentType,
    value::{Record, Value},
};

pub use binary::BinaryField;
pub use compound::{EmbeddedDocumentField, ListField, ReferenceField};
pub use identity::{ObjectIdField, UuidField};
pub use number::{DecimalField, FloatField, IntField};
pub use structured::{DictField, JsonField};
pub use temporal::DateTimeField;
pub use text::{EmailField, StringField, UrlField};

/// The conversion and validation contract every field kind implements.
///
/// Implementations may assume they are never handed [`Value::Null`]; [`FieldKind`] answers for
/// null before dispatching.
pub trait FieldType {
    /// Converts a native value into the form sent to the store.
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError>;

    /// Converts a stored value back into its native form.
    ///
    /// Values that are already native-shaped must be accepted as-is.
    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError>;

    /// Returns whether the value satisfies the kind's constraints. Never fails.
    fn validate(&self, value: &Value) -> bool;

    /// Returns whether the value counts as empty for defaults and sparse uniqueness.
    fn is_empty(&self, value: &Value) -> bool {
        value.is_null()
    }
}

/// The closed set of field kinds.
#[derive(Debug, Clone)]
pub enum FieldKind {
    String(StringField),
    Url(UrlField),
    Email(EmailField),
    Bool(BooleanField),
    Int(IntField),
    Float(FloatField),
    Decimal(DecimalField),
    DateTime(DateTimeField),
    Uuid(UuidField),
    Binary(BinaryField),
    Json(JsonField),
    Dict(DictField),
    ObjectId(ObjectIdField),
    List(ListField),
    Embedded(EmbeddedDocumentField),
    Reference(ReferenceField),
}

impl FieldKind {
    fn as_field_type(&self) -> &dyn FieldType {
        match self {
            FieldKind::String(kind) => kind,
            FieldKind::Url(kind) => kind,
            FieldKind::Email(kind) => kind,
            FieldKind::Bool(kind) => kind,
            FieldKind::Int(kind) => kind,
            FieldKind::Float(kind) => kind,
            FieldKind::Decimal(kind) => kind,
            FieldKind::DateTime(kind) => kind,
            FieldKind::Uuid(kind) => kind,
            FieldKind::Binary(kind) => kind,
            FieldKind::Json(kind) => kind,
            FieldKind::Dict(kind) => kind,
            FieldKind::ObjectId(kind) => kind,
            FieldKind::List(kind) => kind,
            FieldKind::Embedded(kind) => kind,
            FieldKind::Reference(kind) => kind,
        }
    }

    /// The document type reached when a path continues past this kind, if any.
    ///
    /// Embedded documents and lists of embedded documents can be traversed.
    pub fn embedded_type(&self) -> Option<&Arc<DocumentType>> {
        match self {
            FieldKind::Embedded(kind) => Some(kind.document_type()),
            FieldKind::List(kind) => kind.item().embedded_type(),
            _ => None,
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, FieldKind::Embedded(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::List(_))
    }

    /// Coerces a query operand. Lists compared against a single value match elementwise,
    /// so a scalar operand on a list field is coerced with the item kind.
    pub fn to_query_operand(&self, value: &Value) -> Result<Bson, CoercionError> {
        match (self, value) {
            (FieldKind::List(list), operand) if !matches!(operand, Value::List(_)) => {
                list.item().to_storage(operand)
            }
            _ => self.to_storage(value),
        }
    }
}

impl FieldType for FieldKind {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        match value {
            Value::Null => Ok(Bson::Null),
            _ => self.as_field_type().to_storage(value),
        }
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::Null | Bson::Undefined => Ok(Value::Null),
            _ => self.as_field_type().from_storage(value),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        value.is_null() || self.as_field_type().validate(value)
    }

    fn is_empty(&self, value: &Value) -> bool {
        value.is_null() || self.as_field_type().is_empty(value)
    }
}

macro_rules! impl_into_kind {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldKind {
                fn from(kind: $ty) -> Self {
                    FieldKind::$variant(kind)
                }
            }
        )*
    };
}

impl_into_kind! {
    StringField => String,
    UrlField => Url,
    EmailField => Email,
    BooleanField => Bool,
    IntField => Int,
    FloatField => Float,
    DecimalField => Decimal,
    DateTimeField => DateTime,
    UuidField => Uuid,
    BinaryField => Binary,
    JsonField => Json,
    DictField => Dict,
    ObjectIdField => ObjectId,
    ListField => List,
    EmbeddedDocumentField => Embedded,
    ReferenceField => Reference,
}

/// Stores booleans. Integers are read as `0 == false`.
#[derive(Debug, Clone, Default)]
pub struct BooleanField;

impl BooleanField {
    pub fn new() -> Self {
        BooleanField
    }
}

impl FieldType for BooleanField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        match value {
            Value::Bool(b) => Ok(Bson::Boolean(*b)),
            Value::Int(n) => Ok(Bson::Boolean(*n != 0)),
            other => Err(CoercionError::expected("a boolean", other)),
        }
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::Boolean(b) => Ok(Value::Bool(b)),
            Bson::Int32(n) => Ok(Value::Bool(n != 0)),
            Bson::Int64(n) => Ok(Value::Bool(n != 0)),
            other => Err(CoercionError::expected("a boolean", other)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }
}

/// Produces a default value when a field is empty.
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Computes a derived stored value from the owning record and whether it is being created.
pub type OnSaveFn = Arc<dyn Fn(&Record, bool) -> Value + Send + Sync>;

/// The default applied to an empty field while preparing a save.
#[derive(Clone)]
pub enum FieldDefault {
    Value(Value),
    Producer(DefaultFn),
}

impl FieldDefault {
    pub fn produce(&self) -> Value {
        match self {
            FieldDefault::Value(value) => value.clone(),
            FieldDefault::Producer(producer) => producer(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FieldDefault::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Declaration of one document field.
///
/// Fields are built once, when their document type is built, and are read-only afterwards.
#[derive(Clone)]
pub struct Field {
    name: String,
    db_field: Option<String>,
    required: bool,
    unique: bool,
    sparse: bool,
    default: Option<FieldDefault>,
    on_save: Option<OnSaveFn>,
    choices: Option<Vec<Value>>,
    kind: FieldKind,
}

impl Field {
    /// Declares a field with the given logical name and kind.
    pub fn new(name: impl Into<String>, kind: impl Into<FieldKind>) -> Self {
        Self {
            name: name.into(),
            db_field: None,
            required: false,
            unique: false,
            sparse: false,
            default: None,
            on_save: None,
            choices: None,
            kind: kind.into(),
        }
    }

    /// Sets the name used in storage. Defaults to the logical name.
    pub fn db_field(mut self, db_field: impl Into<String>) -> Self {
        self.db_field = Some(db_field.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Exempts empty values from the uniqueness constraint.
    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(FieldDefault::Producer(Arc::new(producer)));
        self
    }

    /// Registers a hook computing the stored value each time the owning document is saved.
    pub fn on_save<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Record, bool) -> Value + Send + Sync + 'static,
    {
        self.on_save = Some(Arc::new(hook));
        self
    }

    /// Restricts valid values to the given set.
    pub fn choices<V: Into<Value>>(mut self, choices: impl IntoIterator<Item = V>) -> Self {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_name(&self) -> &str {
        self.db_field.as_deref().unwrap_or(&self.name)
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn default_value(&self) -> Option<Value> {
        self.default.as_ref().map(FieldDefault::produce)
    }

    pub(crate) fn on_save_hook(&self) -> Option<&OnSaveFn> {
        self.on_save.as_ref()
    }

    /// See [`FieldType::to_storage`]. Errors name this field.
    pub fn to_storage(&self, value: &Value) -> MapperResult<Bson> {
        self.kind
            .to_storage(value)
            .map_err(|source| MapperError::coercion(&self.name, source))
    }

    /// See [`FieldType::from_storage`]. Errors name this field.
    pub fn from_storage(&self, value: Bson) -> MapperResult<Value> {
        self.kind
            .from_storage(value)
            .map_err(|source| MapperError::coercion(&self.name, source))
    }

    /// Null is valid unless the field is required. Choices are checked before the kind's bounds.
    pub fn validate(&self, value: &Value) -> bool {
        if value.is_null() {
            return !self.required;
        }

        if let Some(choices) = &self.choices {
            if !choices.contains(value) {
                return false;
            }
        }

        self.kind.validate(value)
    }

    pub fn is_empty(&self, value: &Value) -> bool {
        self.kind.is_empty(value)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("db_field", &self.storage_name())
            .field("required", &self.required)
            .field("unique", &self.unique)
            .field("sparse", &self.sparse)
            .field("default", &self.default)
            .field("on_save", &self.on_save.is_some())
            .field("choices", &self.choices)
            .field("kind", &self.kind)
            .finish()
    }
}
