//! Field and operator descriptors, and the schema that groups them.
//!
//! Descriptors are immutable data supplied by the host. Behaviour a host
//! needs to customise (extra validation, wire encoding) is attached as hook
//! closures. Hooks are ignored by equality: two descriptors are equal when
//! their data is equal.
//!
//! Schemas can also be loaded from YAML or JSON through [`SchemaFile`]; hooks
//! are then attached in code with [`Schema::field_mut`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::expression::{FilterCondition, FilterExpression};
use crate::validate::ValidationError;
use crate::value::ConditionValue;

/// Custom check run against a whole condition. `Err` carries the message.
pub type ConditionHook = Arc<dyn Fn(&FilterCondition) -> Result<(), String> + Send + Sync>;

/// Replaces the default wire value of a field.
pub type SerializeHook = Arc<dyn Fn(&ConditionValue) -> serde_json::Value + Send + Sync>;

/// Decodes a wire value for a field.
pub type DeserializeHook =
    Arc<dyn Fn(&serde_json::Value) -> Result<ConditionValue, String> + Send + Sync>;

/// Cross-expression rule evaluated once over the whole list.
pub type SchemaHook = Arc<dyn Fn(&[FilterExpression]) -> Vec<ValidationError> + Send + Sync>;

/// Data type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Date,
    #[serde(alias = "date-time", alias = "date_time")]
    DateTime,
    Boolean,
    Enum,
    Id,
    Custom,
}

impl FieldType {
    /// Returns the lowercase name of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Boolean => "boolean",
            FieldType::Enum => "enum",
            FieldType::Id => "id",
            FieldType::Custom => "custom",
        }
    }

    /// Operator keys offered for this type when a schema file lists none.
    pub fn default_operators(self) -> &'static [&'static str] {
        match self {
            FieldType::String => &["contains", "eq", "ne", "starts_with", "ends_with", "is_empty"],
            FieldType::Number => &["eq", "ne", "gt", "gte", "lt", "lte", "between"],
            FieldType::Date | FieldType::DateTime => &["eq", "before", "after", "between"],
            FieldType::Boolean => &["is"],
            FieldType::Enum => &["eq", "ne", "in"],
            FieldType::Id => &["eq", "ne", "in"],
            FieldType::Custom => &["eq"],
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the value an operator expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueShape {
    /// Any shape is accepted.
    #[default]
    Any,
    /// A single value.
    Scalar,
    /// A list of values.
    List,
    /// A `from..to` range.
    Range,
}

/// An operator a field allows.
#[derive(Clone)]
pub struct OperatorDescriptor {
    pub key: String,
    pub label: String,
    pub symbol: Option<String>,
    /// Whether the operator needs a value. Defaults to `true`.
    pub requires_value: bool,
    pub shape: ValueShape,
    pub validate: Option<ConditionHook>,
}

impl OperatorDescriptor {
    /// Creates an operator that requires a value of any shape.
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        OperatorDescriptor {
            key: key.into(),
            label: label.into(),
            symbol: None,
            requires_value: true,
            shape: ValueShape::Any,
            validate: None,
        }
    }

    /// Sets the compact symbol (`=`, `>`, …).
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Marks the operator as taking no value (`is empty`).
    pub fn without_value(mut self) -> Self {
        self.requires_value = false;
        self
    }

    /// Sets the expected value shape.
    pub fn shape(mut self, shape: ValueShape) -> Self {
        self.shape = shape;
        self
    }

    /// Attaches a custom validation hook.
    pub fn validate_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FilterCondition) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Returns the symbol if set, otherwise the label.
    pub fn short_text(&self) -> &str {
        self.symbol.as_deref().unwrap_or(&self.label)
    }

    /// Looks up one of the built-in operators by key.
    ///
    /// | key | symbol | value |
    /// |-----|--------|-------|
    /// | `eq`, `ne` | `=`, `!=` | scalar |
    /// | `gt`, `gte`, `lt`, `lte` | `>`, `>=`, `<`, `<=` | scalar |
    /// | `contains`, `starts_with`, `ends_with` | | scalar |
    /// | `before`, `after` | | scalar |
    /// | `is` | | scalar |
    /// | `in` | | list |
    /// | `between` | | range |
    /// | `is_empty`, `is_not_empty` | | none |
    pub fn builtin(key: &str) -> Option<OperatorDescriptor> {
        let op = match key {
            "eq" => Self::new("eq", "equals").symbol("="),
            "ne" => Self::new("ne", "not equals").symbol("!="),
            "gt" => Self::new("gt", "greater than").symbol(">"),
            "gte" => Self::new("gte", "at least").symbol(">="),
            "lt" => Self::new("lt", "less than").symbol("<"),
            "lte" => Self::new("lte", "at most").symbol("<="),
            "contains" => Self::new("contains", "contains"),
            "starts_with" => Self::new("starts_with", "starts with"),
            "ends_with" => Self::new("ends_with", "ends with"),
            "before" => Self::new("before", "before"),
            "after" => Self::new("after", "after"),
            "is" => Self::new("is", "is"),
            "in" => return Some(Self::new("in", "is any of").shape(ValueShape::List)),
            "between" => return Some(Self::new("between", "between").shape(ValueShape::Range)),
            "is_empty" => return Some(Self::new("is_empty", "is empty").without_value()),
            "is_not_empty" => {
                return Some(Self::new("is_not_empty", "is not empty").without_value())
            }
            _ => return None,
        };
        Some(op.shape(ValueShape::Scalar))
    }
}

impl PartialEq for OperatorDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.label == other.label
            && self.symbol == other.symbol
            && self.requires_value == other.requires_value
            && self.shape == other.shape
    }
}

impl fmt::Debug for OperatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorDescriptor")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("symbol", &self.symbol)
            .field("requires_value", &self.requires_value)
            .field("shape", &self.shape)
            .field("has_validate", &self.validate.is_some())
            .finish()
    }
}

/// One selectable choice of an enum field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub value: String,
    pub label: String,
}

impl EnumOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        EnumOption {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A filterable field.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    /// Allowed operators, in suggestion order.
    pub operators: Vec<OperatorDescriptor>,
    /// Choices for enum fields. Empty means unrestricted.
    pub options: Vec<EnumOption>,
    pub validate: Option<ConditionHook>,
    pub serialize: Option<SerializeHook>,
    pub deserialize: Option<DeserializeHook>,
}

impl FieldDescriptor {
    /// Creates a field with no operators.
    pub fn new(key: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        FieldDescriptor {
            key: key.into(),
            label: label.into(),
            field_type,
            operators: Vec::new(),
            options: Vec::new(),
            validate: None,
            serialize: None,
            deserialize: None,
        }
    }

    /// Creates a field carrying the built-in operators for its type.
    pub fn with_default_operators(
        key: impl Into<String>,
        label: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        let operators = field_type
            .default_operators()
            .iter()
            .filter_map(|k| OperatorDescriptor::builtin(k))
            .collect();
        Self::new(key, label, field_type).operators(operators)
    }

    /// Replaces the allowed operators.
    pub fn operators(mut self, operators: Vec<OperatorDescriptor>) -> Self {
        self.operators = operators;
        self
    }

    /// Appends one allowed operator.
    pub fn operator(mut self, operator: OperatorDescriptor) -> Self {
        self.operators.push(operator);
        self
    }

    /// Sets the enum choices.
    pub fn options(mut self, options: Vec<EnumOption>) -> Self {
        self.options = options;
        self
    }

    /// Attaches a custom validation hook.
    pub fn validate_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FilterCondition) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Overrides how this field's values are written to the wire.
    pub fn serialize_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&ConditionValue) -> serde_json::Value + Send + Sync + 'static,
    {
        self.serialize = Some(Arc::new(f));
        self
    }

    /// Overrides how this field's wire values are decoded.
    pub fn deserialize_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Result<ConditionValue, String> + Send + Sync + 'static,
    {
        self.deserialize = Some(Arc::new(f));
        self
    }

    /// Finds an allowed operator by key.
    pub fn operator_by_key(&self, key: &str) -> Option<&OperatorDescriptor> {
        self.operators.iter().find(|op| op.key == key)
    }

    /// The operator assumed when none is given (query-string decoding).
    pub fn default_operator(&self) -> Option<&OperatorDescriptor> {
        self.operators.first()
    }

    /// Returns `true` if `key` is one of the allowed operators.
    pub fn allows_operator(&self, key: &str) -> bool {
        self.operator_by_key(key).is_some()
    }

    /// Label of an enum option, if the value is one of the choices.
    pub fn option_label(&self, value: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label.as_str())
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.label == other.label
            && self.field_type == other.field_type
            && self.operators == other.operators
            && self.options == other.options
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("field_type", &self.field_type)
            .field(
                "operators",
                &self.operators.iter().map(|o| &o.key).collect::<Vec<_>>(),
            )
            .field("options", &self.options.len())
            .finish()
    }
}

/// The set of fields a filter may reference.
#[derive(Clone, Default)]
pub struct Schema {
    pub fields: Vec<FieldDescriptor>,
    pub validate: Option<SchemaHook>,
}

impl Schema {
    /// Creates a schema from its fields.
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Schema {
            fields,
            validate: None,
        }
    }

    /// Attaches a cross-expression rule.
    pub fn validate_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&[FilterExpression]) -> Vec<ValidationError> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Finds a field by key.
    pub fn field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Finds a field by key for attaching hooks.
    pub fn field_mut(&mut self, key: &str) -> Option<&mut FieldDescriptor> {
        self.fields.iter_mut().find(|f| f.key == key)
    }

    /// Parses a schema from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = serde_yaml::from_str(text)?;
        file.into_schema()
    }

    /// Parses a schema from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = serde_json::from_str(text)?;
        file.into_schema()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("fields", &self.fields)
            .field("has_validate", &self.validate.is_some())
            .finish()
    }
}

/// Serializable description of a schema.
///
/// ```yaml
/// operators:
///   matches:
///     label: matches
///     symbol: "~"
/// fields:
///   - key: status
///     label: Status
///     type: enum
///     options:
///       - { value: active, label: Active }
///   - key: name
///     label: Name
///     operators: [contains, matches]
/// ```
///
/// Operator keys resolve first against the file's own `operators` table,
/// then against [`OperatorDescriptor::builtin`]. A field without an
/// `operators` list gets [`FieldType::default_operators`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub operators: BTreeMap<String, OperatorSpec>,
    pub fields: Vec<FieldSpec>,
}

/// An operator declared in a schema file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSpec {
    pub label: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default = "default_true")]
    pub requires_value: bool,
    #[serde(default)]
    pub shape: ValueShape,
}

/// A field declared in a schema file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub operators: Option<Vec<String>>,
    #[serde(default)]
    pub options: Vec<EnumOption>,
}

fn default_true() -> bool {
    true
}

impl SchemaFile {
    /// Resolves operator references and builds the schema.
    pub fn into_schema(self) -> Result<Schema, SchemaError> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for spec in self.fields {
            let keys: Vec<String> = match spec.operators {
                Some(keys) => keys,
                None => spec
                    .field_type
                    .default_operators()
                    .iter()
                    .map(|k| k.to_string())
                    .collect(),
            };
            let mut operators = Vec::with_capacity(keys.len());
            for key in keys {
                let op = match self.operators.get(&key) {
                    Some(declared) => OperatorDescriptor {
                        key: key.clone(),
                        label: declared.label.clone(),
                        symbol: declared.symbol.clone(),
                        requires_value: declared.requires_value,
                        shape: declared.shape,
                        validate: None,
                    },
                    None => OperatorDescriptor::builtin(&key).ok_or_else(|| {
                        SchemaError::UndeclaredOperator {
                            field: spec.key.clone(),
                            operator: key.clone(),
                        }
                    })?,
                };
                operators.push(op);
            }
            fields.push(
                FieldDescriptor::new(spec.key, spec.label, spec.field_type)
                    .operators(operators)
                    .options(spec.options),
            );
        }
        Ok(Schema::new(fields))
    }
}
