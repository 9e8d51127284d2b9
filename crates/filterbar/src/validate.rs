//! Schema validation of expressions.
//!
//! Problems are returned as data, never raised, so a caller can show every
//! problem at once. Per expression the rules run in order and the first
//! failure is the only error reported for that expression:
//!
//! 1. the field exists in the schema
//! 2. the operator is allowed for the field
//! 3. the value is present when required, has the operator's shape, matches
//!    the field type and (for enum fields with options) is a known choice
//! 4. the field's then the operator's custom hook
//!
//! Warnings accumulate independently and never affect
//! [`ValidationResult::valid`]. After all expressions, the schema-level hook
//! runs once over the whole list.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::expression::FilterExpression;
use crate::schema::{FieldDescriptor, FieldType, OperatorDescriptor, Schema, ValueShape};
use crate::value::RawValue;

/// Category of a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Field,
    Operator,
    Value,
    Custom,
    Schema,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Field => "field",
            ErrorKind::Operator => "operator",
            ErrorKind::Value => "value",
            ErrorKind::Custom => "custom",
            ErrorKind::Schema => "schema",
        };
        f.write_str(name)
    }
}

/// A rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ValidationError {
            kind,
            message: message.into(),
            expression_index: None,
            field: None,
        }
    }

    /// Scopes the error to an expression.
    pub fn at(mut self, index: Option<usize>) -> Self {
        self.expression_index = index;
        self
    }

    /// Scopes the error to a field.
    pub fn on_field(mut self, key: impl Into<String>) -> Self {
        self.field = Some(key.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expression_index {
            Some(index) => write!(f, "[{}] {}: {}", index, self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Category of a validation warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A value was given to an operator that takes none.
    ValueIgnored,
    /// The same condition appears more than once.
    Duplicate,
    /// Connectors do not follow the grammar and will be repaired.
    Connector,
    /// The schema is usable but probably not what was intended.
    Schema,
}

/// Something worth showing that does not make the filter invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ValidationWarning {
    fn new(kind: WarningKind, message: impl Into<String>, index: Option<usize>) -> Self {
        ValidationWarning {
            kind,
            message: message.into(),
            expression_index: index,
            field: None,
        }
    }
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        ValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationResult {
    fn push_error(&mut self, error: ValidationError) {
        self.errors.push(error);
        self.valid = false;
    }

    fn push_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.valid = self.errors.is_empty();
    }

    /// Errors for one expression.
    pub fn errors_at(&self, index: usize) -> impl Iterator<Item = &ValidationError> {
        self.errors
            .iter()
            .filter(move |e| e.expression_index == Some(index))
    }
}

/// Validates one expression.
///
/// `index` is recorded on every reported problem.
pub fn validate_expression(
    expr: &FilterExpression,
    schema: &Schema,
    index: Option<usize>,
) -> ValidationResult {
    let mut result = ValidationResult::default();
    let condition = &expr.condition;

    let Some(field) = schema.field(&condition.field.key) else {
        result.push_error(
            ValidationError::new(
                ErrorKind::Field,
                format!("unknown field '{}'", condition.field.key),
            )
            .at(index)
            .on_field(&condition.field.key),
        );
        return result;
    };

    let Some(operator) = field.operator_by_key(&condition.operator.key) else {
        result.push_error(
            ValidationError::new(
                ErrorKind::Operator,
                format!(
                    "operator '{}' is not allowed for {}",
                    condition.operator.key, field.label
                ),
            )
            .at(index)
            .on_field(&field.key),
        );
        return result;
    };

    let raw = &condition.value.raw;
    if operator.requires_value {
        if let Err(message) = check_value(field, operator, raw) {
            result.push_error(
                ValidationError::new(ErrorKind::Value, message)
                    .at(index)
                    .on_field(&field.key),
            );
            return result;
        }
    } else if !raw.is_empty() {
        let mut warning = ValidationWarning::new(
            WarningKind::ValueIgnored,
            format!("'{}' takes no value; the value is ignored", operator.label),
            index,
        );
        warning.field = Some(field.key.clone());
        result.push_warning(warning);
    }

    let hooks = [field.validate.as_ref(), operator.validate.as_ref()];
    for hook in hooks.into_iter().flatten() {
        if let Err(message) = hook(condition) {
            result.push_error(
                ValidationError::new(ErrorKind::Custom, message)
                    .at(index)
                    .on_field(&field.key),
            );
            break;
        }
    }

    result
}

/// Validates a whole list, then runs the schema-level rule once.
pub fn validate_expressions(expressions: &[FilterExpression], schema: &Schema) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (index, expr) in expressions.iter().enumerate() {
        result.merge(validate_expression(expr, schema, Some(index)));

        let is_last = index + 1 == expressions.len();
        match (is_last, expr.connector) {
            (true, Some(connector)) => result.push_warning(ValidationWarning::new(
                WarningKind::Connector,
                format!("trailing {} on the last expression is ignored", connector),
                Some(index),
            )),
            (false, None) => result.push_warning(ValidationWarning::new(
                WarningKind::Connector,
                "missing connector; AND is assumed",
                Some(index),
            )),
            _ => {}
        }

        if let Some(first) = expressions[..index]
            .iter()
            .position(|earlier| earlier.condition.equivalent(&expr.condition))
        {
            result.push_warning(ValidationWarning::new(
                WarningKind::Duplicate,
                format!("same condition as expression {}", first),
                Some(index),
            ));
        }
    }

    if let Some(hook) = &schema.validate {
        for error in hook(expressions) {
            result.push_error(error);
        }
    }

    result
}

/// Checks a schema for structural problems.
pub fn validate_schema(schema: &Schema) -> ValidationResult {
    let mut result = ValidationResult::default();

    if schema.fields.is_empty() {
        result.push_error(schema_error("schema defines no fields".into(), None));
    }

    let mut seen_fields = HashSet::new();
    for field in &schema.fields {
        if field.key.trim().is_empty() {
            result.push_error(schema_error("field key is empty".into(), None));
            continue;
        }
        if !seen_fields.insert(field.key.as_str()) {
            result.push_error(schema_error(
                format!("duplicate field key '{}'", field.key),
                Some(field.key.as_str()),
            ));
        }
        if field.operators.is_empty() {
            result.push_error(schema_error(
                format!("field '{}' has no operators", field.key),
                Some(field.key.as_str()),
            ));
        }

        let mut seen_ops = HashSet::new();
        for op in &field.operators {
            if op.key.trim().is_empty() {
                result.push_error(schema_error(
                    format!("field '{}' has an operator with an empty key", field.key),
                    Some(field.key.as_str()),
                ));
            } else if !seen_ops.insert(op.key.as_str()) {
                result.push_error(schema_error(
                    format!("field '{}' lists operator '{}' twice", field.key, op.key),
                    Some(field.key.as_str()),
                ));
            }
        }

        if field.label.trim().is_empty() {
            let mut warning = ValidationWarning::new(
                WarningKind::Schema,
                format!("field '{}' has no label; the key will be shown", field.key),
                None,
            );
            warning.field = Some(field.key.clone());
            result.push_warning(warning);
        }
        if field.field_type == FieldType::Enum && field.options.is_empty() {
            let mut warning = ValidationWarning::new(
                WarningKind::Schema,
                format!("enum field '{}' has no options; any value is accepted", field.key),
                None,
            );
            warning.field = Some(field.key.clone());
            result.push_warning(warning);
        }
    }

    result
}

fn schema_error(message: String, field: Option<&str>) -> ValidationError {
    let error = ValidationError::new(ErrorKind::Schema, message);
    match field {
        Some(key) => error.on_field(key),
        None => error,
    }
}

fn check_value(
    field: &FieldDescriptor,
    operator: &OperatorDescriptor,
    raw: &RawValue,
) -> Result<(), String> {
    if raw.is_empty() {
        return Err(format!("a value is required for {}", field.label));
    }

    match (operator.shape, raw) {
        (ValueShape::Range, RawValue::Range { .. }) => {}
        (ValueShape::Range, other) => {
            return Err(format!(
                "'{}' expects a range, got {}",
                operator.label,
                other.type_name()
            ))
        }
        (ValueShape::List, RawValue::List(_)) => {}
        (ValueShape::List, other) => {
            return Err(format!(
                "'{}' expects a list, got {}",
                operator.label,
                other.type_name()
            ))
        }
        (ValueShape::Scalar, RawValue::List(_) | RawValue::Range { .. }) => {
            return Err(format!("'{}' expects a single value", operator.label))
        }
        _ => {}
    }

    if let RawValue::Range { from, to } = raw {
        match from.compare(to) {
            Some(Ordering::Greater) => {
                return Err(format!(
                    "range start {} is after its end {}",
                    from.to_wire(),
                    to.to_wire()
                ))
            }
            None => return Err("range bounds are not comparable".to_string()),
            _ => {}
        }
    }

    check_leaves(field, raw)
}

/// Checks every scalar inside `raw` against the field type and options.
fn check_leaves(field: &FieldDescriptor, raw: &RawValue) -> Result<(), String> {
    match raw {
        RawValue::List(items) => items.iter().try_for_each(|item| check_leaves(field, item)),
        RawValue::Range { from, to } => {
            check_leaves(field, from)?;
            check_leaves(field, to)
        }
        leaf => {
            let compatible = match field.field_type {
                FieldType::Custom => true,
                FieldType::String | FieldType::Enum | FieldType::Id => {
                    matches!(leaf, RawValue::Text(_))
                }
                FieldType::Number => matches!(leaf, RawValue::Number(_)),
                FieldType::Boolean => matches!(leaf, RawValue::Bool(_)),
                FieldType::Date => matches!(leaf, RawValue::Date(_)),
                FieldType::DateTime => matches!(leaf, RawValue::DateTime(_)),
            };
            if !compatible {
                return Err(format!(
                    "{} expects a {} value, got {}",
                    field.label,
                    field.field_type,
                    leaf.type_name()
                ));
            }
            if let RawValue::Number(n) = leaf {
                if !n.is_finite() {
                    return Err(format!("{} must be a finite number, got {}", field.label, n));
                }
            }
            if let (FieldType::Enum, RawValue::Text(text)) = (field.field_type, leaf) {
                if !field.options.is_empty() && field.option_label(text).is_none() {
                    return Err(format!("'{}' is not a valid {}", text, field.label));
                }
            }
            Ok(())
        }
    }
}
