//! Wire formats for filters.
//!
//! Three encodings are provided:
//!
//! - **JSON** ([`serialize`] / [`deserialize`], [`to_json`] / [`from_json`]):
//!   an array of `{ field, operator, value, connector? }`. Full fidelity.
//! - **Query string** ([`to_query_string`] / [`from_query_string`]):
//!   `field=value&field2=value2`. Lossy: operators and connectors are not
//!   written. On decode the operator is the field's first allowed operator
//!   and every expression is joined with `AND`.
//! - **Display string** ([`to_display_string`]): a one-line human summary
//!   built only from display text.
//!
//! Decoding never aborts a batch on a bad entry. Each rejected entry is
//! reported in [`Deserialized::errors`] and skipped; the surviving
//! expressions have their connectors repaired so the grammar holds.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::SerializeError;
use crate::expression::{normalize_connectors, FilterCondition, FilterExpression};
use crate::schema::{FieldDescriptor, FieldType, OperatorDescriptor, Schema, ValueShape};
use crate::value::{ConditionValue, Connector, RawValue};

/// One expression on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedExpression {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<Connector>,
}

/// Options for [`serialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Use per-field `serialize` hooks when present.
    pub use_hooks: bool,
    /// Write connectors. Without them, decoding joins everything with `AND`.
    pub include_connectors: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        SerializeOptions {
            use_hooks: true,
            include_connectors: true,
        }
    }
}

/// An entry rejected during decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryError {
    /// Position of the entry in the input.
    pub index: usize,
    pub error: SerializeError,
}

/// Result of decoding a batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Deserialized {
    /// Successfully decoded expressions, in input order.
    pub expressions: Vec<FilterExpression>,
    /// Entries that were skipped.
    pub errors: Vec<EntryError>,
}

impl Deserialized {
    /// Returns `true` if every entry decoded.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    fn reject(&mut self, index: usize, error: SerializeError) {
        tracing::warn!(index, %error, "dropping filter entry");
        self.errors.push(EntryError { index, error });
    }

    fn finish(mut self) -> Self {
        normalize_connectors(&mut self.expressions);
        self
    }
}

/// Converts expressions to their JSON-ready form.
///
/// The value is the condition's `serialized` string unless a `serialize`
/// hook is registered for the field, in the schema or on the expression's own
/// field descriptor.
pub fn serialize(
    expressions: &[FilterExpression],
    schema: Option<&Schema>,
    options: &SerializeOptions,
) -> Vec<SerializedExpression> {
    expressions
        .iter()
        .map(|expr| {
            let condition = &expr.condition;
            SerializedExpression {
                field: condition.field.key.clone(),
                operator: condition.operator.key.clone(),
                value: wire_value(condition, schema, options),
                connector: if options.include_connectors {
                    expr.connector
                } else {
                    None
                },
            }
        })
        .collect()
}

/// Rebuilds expressions from their wire form.
///
/// Fields and operators are resolved by key in `schema`. A field's
/// `deserialize` hook decodes the value when present; otherwise the wire
/// value is parsed according to the field type and used as the display and
/// serialized text directly.
pub fn deserialize(entries: &[SerializedExpression], schema: &Schema) -> Deserialized {
    let mut out = Deserialized::default();
    for (index, entry) in entries.iter().enumerate() {
        match decode_entry(entry, schema) {
            Ok(expr) => out.expressions.push(expr),
            Err(error) => out.reject(index, error),
        }
    }
    out.finish()
}

/// Serializes expressions to a JSON string.
pub fn to_json(
    expressions: &[FilterExpression],
    schema: Option<&Schema>,
    options: &SerializeOptions,
) -> Result<String, SerializeError> {
    Ok(serde_json::to_string(&serialize(expressions, schema, options))?)
}

/// Decodes a JSON array of wire expressions.
///
/// Only a document that is not a JSON array fails as a whole; malformed
/// elements are reported per entry.
pub fn from_json(text: &str, schema: &Schema) -> Result<Deserialized, SerializeError> {
    let items: Vec<Json> = serde_json::from_str(text)?;
    let mut out = Deserialized::default();
    for (index, item) in items.into_iter().enumerate() {
        let decoded = serde_json::from_value::<SerializedExpression>(item)
            .map_err(|e| SerializeError::Malformed(e.to_string()))
            .and_then(|entry| decode_entry(&entry, schema));
        match decoded {
            Ok(expr) => out.expressions.push(expr),
            Err(error) => out.reject(index, error),
        }
    }
    Ok(out.finish())
}

/// Encodes expressions as `field=value&field2=value2`.
///
/// Operators and connectors are dropped. Keys and values are
/// percent-encoded.
pub fn to_query_string(expressions: &[FilterExpression], schema: Option<&Schema>) -> String {
    let options = SerializeOptions::default();
    expressions
        .iter()
        .map(|expr| {
            let text = match wire_value(&expr.condition, schema, &options) {
                Json::String(s) => s,
                Json::Null => String::new(),
                other => other.to_string(),
            };
            format!(
                "{}={}",
                urlencoding::encode(&expr.condition.field.key),
                urlencoding::encode(&text)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Decodes a query string produced by [`to_query_string`].
///
/// The encoding carries no operator, so each expression gets its field's
/// first allowed operator; this is a guess and may differ from the operator
/// the string was produced with. Every expression is joined with `AND`.
/// A leading `?` is accepted and `+` decodes to a space.
pub fn from_query_string(query: &str, schema: &Schema) -> Deserialized {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut out = Deserialized::default();

    for (index, pair) in query.split('&').enumerate().filter(|(_, p)| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let decoded = decode_component(key).and_then(|key| {
            let value = decode_component(value)?;
            let field = schema
                .field(&key)
                .ok_or_else(|| SerializeError::UnknownField(key.clone()))?;
            let operator = field
                .default_operator()
                .ok_or_else(|| SerializeError::UnknownOperator {
                    field: key.clone(),
                    operator: String::new(),
                })?;
            decode_entry(
                &SerializedExpression {
                    field: key,
                    operator: operator.key.clone(),
                    value: Json::String(value),
                    connector: Some(Connector::And),
                },
                schema,
            )
        });
        match decoded {
            Ok(expr) => out.expressions.push(expr),
            Err(error) => out.reject(index, error),
        }
    }
    out.finish()
}

/// How operators appear in [`to_display_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatorStyle {
    /// The symbol when the operator has one, otherwise the label.
    #[default]
    Symbol,
    /// Always the label.
    Label,
}

/// Options for [`to_display_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayOptions {
    pub operator_style: OperatorStyle,
    /// Write `and`/`or` instead of `AND`/`OR`.
    pub lowercase_connectors: bool,
}

/// Renders `field op value [AND|OR] field op value …` from display text.
///
/// Only labels, operator text and `display` values are used; raw and wire
/// values are never consulted. Empty display values are omitted.
pub fn to_display_string(expressions: &[FilterExpression], options: &DisplayOptions) -> String {
    let mut out = String::new();
    for (index, expr) in expressions.iter().enumerate() {
        let condition = &expr.condition;
        let operator = match options.operator_style {
            OperatorStyle::Symbol => condition.operator.short_text(),
            OperatorStyle::Label => condition.operator.label.as_str(),
        };
        out.push_str(&condition.field.label);
        out.push(' ');
        out.push_str(operator);
        if !condition.value.display.is_empty() {
            out.push(' ');
            out.push_str(&condition.value.display);
        }
        if index + 1 < expressions.len() {
            let connector = expr.connector.unwrap_or(Connector::And).as_str();
            out.push(' ');
            if options.lowercase_connectors {
                out.push_str(&connector.to_ascii_lowercase());
            } else {
                out.push_str(connector);
            }
            out.push(' ');
        }
    }
    out
}

fn wire_value(condition: &FilterCondition, schema: Option<&Schema>, options: &SerializeOptions) -> Json {
    if options.use_hooks {
        let field = schema
            .and_then(|s| s.field(&condition.field.key))
            .unwrap_or(&condition.field);
        if let Some(hook) = &field.serialize {
            return hook(&condition.value);
        }
    }
    Json::String(condition.value.serialized.clone())
}

fn decode_entry(entry: &SerializedExpression, schema: &Schema) -> Result<FilterExpression, SerializeError> {
    let field = schema
        .field(&entry.field)
        .ok_or_else(|| SerializeError::UnknownField(entry.field.clone()))?;
    let operator = field
        .operator_by_key(&entry.operator)
        .ok_or_else(|| SerializeError::UnknownOperator {
            field: entry.field.clone(),
            operator: entry.operator.clone(),
        })?;

    let value = match &field.deserialize {
        Some(hook) => hook(&entry.value).map_err(|reason| SerializeError::bad_value(&field.key, reason))?,
        None => decode_value(field, Some(operator), &entry.value)?,
    };

    Ok(FilterExpression {
        condition: FilterCondition::new(field.clone(), operator.clone(), value),
        connector: entry.connector,
    })
}

/// Parses wire text for `field` into a value.
///
/// Uses the field's `deserialize` hook when present, otherwise the same
/// type-driven parsing as [`deserialize`]. The operator's shape decides
/// whether `,` and `..` separate items; without one they are guessed.
pub fn parse_value(
    field: &FieldDescriptor,
    operator: Option<&OperatorDescriptor>,
    wire: &str,
) -> Result<ConditionValue, SerializeError> {
    let wire = Json::String(wire.to_string());
    match &field.deserialize {
        Some(hook) => hook(&wire).map_err(|reason| SerializeError::bad_value(&field.key, reason)),
        None => decode_value(field, operator, &wire),
    }
}

/// Default decoding of a wire value for a field without a hook.
fn decode_value(
    field: &FieldDescriptor,
    operator: Option<&OperatorDescriptor>,
    wire: &Json,
) -> Result<ConditionValue, SerializeError> {
    let bad = |reason: String| SerializeError::bad_value(&field.key, reason);
    let shape = operator.map_or(ValueShape::Any, |op| op.shape);

    let raw = match wire {
        Json::Null if operator.is_some_and(|op| !op.requires_value) => return Ok(ConditionValue::empty()),
        Json::Null => RawValue::Empty,
        Json::String(s) => RawValue::from_wire(field.field_type, shape, s).map_err(bad)?,
        Json::Number(n) => RawValue::from_wire(field.field_type, shape, &n.to_string()).map_err(bad)?,
        Json::Bool(b) => RawValue::from_wire(field.field_type, shape, &b.to_string()).map_err(bad)?,
        Json::Array(items) => RawValue::List(
            items
                .iter()
                .map(|item| decode_scalar(field.field_type, item).map_err(bad))
                .collect::<Result<_, _>>()?,
        ),
        Json::Object(map) => match (map.get("from"), map.get("to")) {
            (Some(from), Some(to)) => RawValue::range(
                decode_scalar(field.field_type, from).map_err(bad)?,
                decode_scalar(field.field_type, to).map_err(bad)?,
            ),
            _ => {
                return Err(SerializeError::Malformed(format!(
                    "object value for '{}' needs 'from' and 'to'",
                    field.key
                )))
            }
        },
    };

    let serialized = match wire {
        Json::String(s) => s.clone(),
        _ => raw.to_wire(),
    };
    let display = display_text(field, &raw, &serialized);
    Ok(ConditionValue {
        raw,
        display,
        serialized,
    })
}

fn decode_scalar(field_type: FieldType, wire: &Json) -> Result<RawValue, String> {
    match wire {
        Json::String(s) => RawValue::scalar_from_wire(field_type, s),
        Json::Number(n) => RawValue::scalar_from_wire(field_type, &n.to_string()),
        Json::Bool(b) => RawValue::scalar_from_wire(field_type, &b.to_string()),
        other => Err(format!("expected a scalar, got {}", other)),
    }
}

/// Enum values display with their option label; everything else with the
/// wire text.
fn display_text(field: &FieldDescriptor, raw: &RawValue, serialized: &str) -> String {
    let label = |value: &RawValue| match value {
        RawValue::Text(text) => field.option_label(text).unwrap_or(text).to_string(),
        other => other.to_wire(),
    };
    match (field.field_type, raw) {
        (FieldType::Enum, RawValue::Text(_)) => label(raw),
        (FieldType::Enum, RawValue::List(items)) => {
            items.iter().map(label).collect::<Vec<_>>().join(", ")
        }
        _ => serialized.to_string(),
    }
}

fn decode_component(text: &str) -> Result<String, SerializeError> {
    let text = text.replace('+', " ");
    urlencoding::decode(&text)
        .map(|s| s.into_owned())
        .map_err(|e| SerializeError::Malformed(format!("bad percent-encoding: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EnumOption;
    use crate::value::Number;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDescriptor::with_default_operators("status", "Status", FieldType::Enum)
                .options(vec![
                    EnumOption::new("active", "Active"),
                    EnumOption::new("archived", "Archived"),
                ]),
            FieldDescriptor::with_default_operators("name", "Name", FieldType::String),
            FieldDescriptor::with_default_operators("age", "Age", FieldType::Number),
        ])
    }

    fn expr(field: &str, op: &str, value: ConditionValue) -> FilterExpression {
        let schema = schema();
        let field = schema.field(field).unwrap().clone();
        let operator = field.operator_by_key(op).unwrap().clone();
        FilterExpression::new(FilterCondition::new(field, operator, value))
    }

    fn status_active() -> FilterExpression {
        expr("status", "eq", ConditionValue::new("active", "Active", "active"))
    }

    #[test]
    fn serializes_single_expression() {
        let out = serialize(&[status_active()], None, &SerializeOptions::default());
        assert_eq!(
            out,
            vec![SerializedExpression {
                field: "status".into(),
                operator: "eq".into(),
                value: Json::String("active".into()),
                connector: None,
            }]
        );
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"field": "status", "operator": "eq", "value": "active"}])
        );
    }

    #[test]
    fn serialize_hook_overrides_value() {
        let mut schema = schema();
        let field = schema.field_mut("age").unwrap();
        *field = field.clone().serialize_with(|v| match &v.raw {
            RawValue::Number(n) => serde_json::json!(n.to_f64()),
            _ => Json::Null,
        });
        let list = [expr("age", "gt", ConditionValue::from_raw(Number::I64(30)))];

        let out = serialize(&list, Some(&schema), &SerializeOptions::default());
        assert_eq!(out[0].value, serde_json::json!(30.0));

        let plain = serialize(
            &list,
            Some(&schema),
            &SerializeOptions {
                use_hooks: false,
                ..Default::default()
            },
        );
        assert_eq!(plain[0].value, Json::String("30".into()));
    }

    #[test]
    fn round_trips_through_json() {
        let list = vec![
            status_active().joined(Connector::Or),
            expr("age", "between", ConditionValue::from_raw(RawValue::range(
                Number::I64(18).into(),
                Number::I64(65).into(),
            )))
            .joined(Connector::And),
            expr("name", "contains", ConditionValue::text("o'brien, jr.")),
        ];
        let schema = schema();
        let json = to_json(&list, Some(&schema), &SerializeOptions::default()).unwrap();
        let back = from_json(&json, &schema).unwrap();
        assert!(back.is_complete());
        assert_eq!(back.expressions.len(), 3);
        for (a, b) in list.iter().zip(&back.expressions) {
            assert!(a.equivalent(b), "{:?} vs {:?}", a, b);
        }
        assert_eq!(back.expressions[0].condition.value.display, "Active");
    }

    #[test]
    fn scalar_values_keep_separators_through_json() {
        let schema = Schema::new(vec![
            FieldDescriptor::with_default_operators("owner", "Owner", FieldType::Id),
            FieldDescriptor::with_default_operators("tag", "Tag", FieldType::Enum)
                .options(vec![EnumOption::new("v1..v2", "Between versions")]),
        ]);
        let field = |key: &str| schema.field(key).unwrap().clone();
        let eq = |key: &str| field(key).operator_by_key("eq").unwrap().clone();
        let list = vec![
            FilterExpression::new(FilterCondition::new(
                field("owner"),
                eq("owner"),
                ConditionValue::text("acme,inc"),
            ))
            .joined(Connector::And),
            FilterExpression::new(FilterCondition::new(
                field("tag"),
                eq("tag"),
                ConditionValue::new("v1..v2", "Between versions", "v1..v2"),
            )),
        ];
        assert!(crate::validate::validate_expressions(&list, &schema).valid);

        let json = to_json(&list, Some(&schema), &SerializeOptions::default()).unwrap();
        let back = from_json(&json, &schema).unwrap();
        assert!(back.is_complete());
        assert_eq!(back.expressions[0].condition.value.raw, RawValue::from("acme,inc"));
        assert_eq!(back.expressions[1].condition.value.raw, RawValue::from("v1..v2"));
        for (a, b) in list.iter().zip(&back.expressions) {
            assert!(a.equivalent(b), "{:?} vs {:?}", a, b);
        }
        assert!(crate::validate::validate_expressions(&back.expressions, &schema).valid);
    }

    #[test]
    fn list_operator_splits_wire_text() {
        let entries = vec![SerializedExpression {
            field: "status".into(),
            operator: "in".into(),
            value: Json::String("active, archived".into()),
            connector: None,
        }];
        let out = deserialize(&entries, &schema());
        assert_eq!(
            out.expressions[0].condition.value.raw,
            RawValue::List(vec!["active".into(), "archived".into()])
        );
    }

    #[test]
    fn bad_entries_are_skipped_not_fatal() {
        let json = r#"[
            {"field": "status", "operator": "eq", "value": "active", "connector": "AND"},
            {"field": "color", "operator": "eq", "value": "red", "connector": "OR"},
            {"field": "age", "operator": "gt", "value": "old"},
            {"operator": "eq"},
            {"field": "age", "operator": "lt", "value": 40}
        ]"#;
        let out = from_json(json, &schema()).unwrap();
        assert_eq!(out.expressions.len(), 2);
        let indices: Vec<_> = out.errors.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(matches!(out.errors[0].error, SerializeError::UnknownField(_)));
        assert!(matches!(out.errors[1].error, SerializeError::BadValue { .. }));
        assert!(matches!(out.errors[2].error, SerializeError::Malformed(_)));

        assert_eq!(out.expressions[0].connector, Some(Connector::And));
        assert_eq!(out.expressions[1].connector, None);
        assert_eq!(out.expressions[1].condition.value.serialized, "40");
    }

    #[test]
    fn invalid_document_fails_whole() {
        assert!(matches!(
            from_json("{not json", &schema()),
            Err(SerializeError::Json(_))
        ));
    }

    #[test]
    fn unknown_operator_is_reported() {
        let entries = vec![SerializedExpression {
            field: "status".into(),
            operator: "gt".into(),
            value: Json::String("active".into()),
            connector: None,
        }];
        let out = deserialize(&entries, &schema());
        assert!(matches!(
            &out.errors[0].error,
            SerializeError::UnknownOperator { operator, .. } if operator == "gt"
        ));
    }

    #[test]
    fn array_and_object_values_decode() {
        let entries = vec![
            SerializedExpression {
                field: "status".into(),
                operator: "in".into(),
                value: serde_json::json!(["active", "archived"]),
                connector: Some(Connector::And),
            },
            SerializedExpression {
                field: "age".into(),
                operator: "between".into(),
                value: serde_json::json!({"from": 1, "to": 5}),
                connector: None,
            },
        ];
        let out = deserialize(&entries, &schema());
        assert!(out.is_complete());
        assert_eq!(out.expressions[0].condition.value.serialized, "active,archived");
        assert_eq!(out.expressions[0].condition.value.display, "Active, Archived");
        assert_eq!(out.expressions[1].condition.value.serialized, "1..5");
    }

    #[test]
    fn deserialize_hook_is_used() {
        let mut schema = schema();
        let field = schema.field_mut("name").unwrap();
        *field = field.clone().deserialize_with(|wire| {
            let text = wire.as_str().ok_or("expected text")?;
            Ok(ConditionValue::new(text.to_lowercase(), text, text.to_lowercase()))
        });
        let entries = vec![SerializedExpression {
            field: "name".into(),
            operator: "contains".into(),
            value: Json::String("BOB".into()),
            connector: None,
        }];
        let out = deserialize(&entries, &schema);
        assert_eq!(out.expressions[0].condition.value.serialized, "bob");
        assert_eq!(out.expressions[0].condition.value.display, "BOB");

        let bad = vec![SerializedExpression {
            value: Json::Bool(true),
            ..entries[0].clone()
        }];
        assert!(!deserialize(&bad, &schema).is_complete());
    }

    #[test]
    fn query_string_encodes_and_decodes() {
        let list = vec![
            status_active().joined(Connector::Or),
            expr("name", "contains", ConditionValue::text("a&b = c")),
        ];
        let qs = to_query_string(&list, None);
        assert_eq!(qs, "status=active&name=a%26b%20%3D%20c");

        let back = from_query_string(&format!("?{}", qs), &schema());
        assert!(back.is_complete());
        assert_eq!(back.expressions[0].condition.operator.key, "eq");
        // Connector information is not carried by the query string.
        assert_eq!(back.expressions[0].connector, Some(Connector::And));
        assert_eq!(back.expressions[1].condition.value.serialized, "a&b = c");
        assert_eq!(back.expressions[1].connector, None);
    }

    #[test]
    fn query_string_errors_are_per_pair() {
        let out = from_query_string("status=active&&color=red&name=a+b", &schema());
        assert_eq!(out.expressions.len(), 2);
        assert_eq!(out.errors.len(), 1);
        // Index counts the empty pair too.
        assert_eq!(out.errors[0].index, 2);
        assert!(matches!(out.errors[0].error, SerializeError::UnknownField(_)));
        assert_eq!(out.expressions[1].condition.value.serialized, "a b");
    }

    #[test]
    fn display_string_uses_display_text_only() {
        let mut odd = status_active();
        odd.condition.value.raw = RawValue::from("ignored");
        odd.condition.value.serialized = "ignored".into();
        let list = vec![
            odd.joined(Connector::Or),
            expr("name", "is_empty", ConditionValue::empty()),
        ];
        assert_eq!(
            to_display_string(&list, &DisplayOptions::default()),
            "Status = Active OR Name is empty"
        );
        assert_eq!(
            to_display_string(
                &list,
                &DisplayOptions {
                    operator_style: OperatorStyle::Label,
                    lowercase_connectors: true,
                }
            ),
            "Status equals Active or Name is empty"
        );
    }
}
