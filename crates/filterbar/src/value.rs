//! Condition value types.
//!
//! A [`ConditionValue`] carries one user-entered value in three parallel
//! forms: the typed [`RawValue`], a human-readable `display` string and the
//! `serialized` wire string. The wire grammar for compound values is:
//!
//! ```text
//! list   = item ("," item)*
//! range  = from ".." to
//! ```

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{FieldType, ValueShape};

/// Joins one expression to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    /// Returns the wire and display form (`AND` / `OR`).
    pub fn as_str(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }

    /// Parses a connector, case-insensitively.
    pub fn parse(s: &str) -> Option<Connector> {
        if s.eq_ignore_ascii_case("and") {
            Some(Connector::And)
        } else if s.eq_ignore_ascii_case("or") {
            Some(Connector::Or)
        } else {
            None
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric value preserving integer precision.
///
/// Comparisons between variants fall back to `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// 64-bit floating point.
    F64(f64),
}

impl Number {
    /// Converts the number to f64.
    pub fn to_f64(self) -> f64 {
        match self {
            Number::I64(n) => n as f64,
            Number::U64(n) => n as f64,
            Number::F64(n) => n,
        }
    }

    /// `false` for NaN and the infinities, which have no wire form.
    pub fn is_finite(self) -> bool {
        match self {
            Number::F64(n) => n.is_finite(),
            _ => true,
        }
    }

    /// Compares two numbers, handling mixed variants.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => Some(a.cmp(&b)),
            (Number::U64(a), Number::U64(b)) => Some(a.cmp(&b)),
            (Number::F64(a), Number::F64(b)) => a.partial_cmp(&b),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }

    /// Parses a number, preferring the narrowest exact variant.
    pub fn parse(s: &str) -> Option<Number> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Some(Number::I64(n));
        }
        if let Ok(n) = s.parse::<u64>() {
            return Some(Number::U64(n));
        }
        match s.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(Number::F64(n)),
            _ => None,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::I64(n) => write!(f, "{}", n),
            Number::U64(n) => write!(f, "{}", n),
            Number::F64(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::I64(n)
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Number::I64(n as i64)
    }
}

impl From<u64> for Number {
    fn from(n: u64) -> Self {
        Number::U64(n)
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::F64(n)
    }
}

/// The typed, internal form of a condition value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// No value entered.
    Empty,
    /// Free text, enum choices and identifiers.
    Text(String),
    /// Numeric value.
    Number(Number),
    /// Boolean value.
    Bool(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Instant in UTC.
    DateTime(DateTime<Utc>),
    /// Several values (multi-select).
    List(Vec<RawValue>),
    /// Inclusive range.
    Range {
        from: Box<RawValue>,
        to: Box<RawValue>,
    },
}

impl RawValue {
    /// Creates a range value.
    pub fn range(from: RawValue, to: RawValue) -> Self {
        RawValue::Range {
            from: Box::new(from),
            to: Box::new(to),
        }
    }

    /// Returns `true` if no usable value is present.
    ///
    /// Whitespace-only text, empty lists and ranges with an empty bound all
    /// count as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::List(items) => items.is_empty() || items.iter().all(RawValue::is_empty),
            RawValue::Range { from, to } => from.is_empty() || to.is_empty(),
            _ => false,
        }
    }

    /// Short name of the variant, used in messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::Empty => "empty",
            RawValue::Text(_) => "text",
            RawValue::Number(_) => "number",
            RawValue::Bool(_) => "boolean",
            RawValue::Date(_) => "date",
            RawValue::DateTime(_) => "datetime",
            RawValue::List(_) => "list",
            RawValue::Range { .. } => "range",
        }
    }

    /// Orders two scalar values of the same kind.
    ///
    /// Returns `None` for mismatched kinds and for compound values.
    pub fn compare(&self, other: &RawValue) -> Option<Ordering> {
        match (self, other) {
            (RawValue::Text(a), RawValue::Text(b)) => Some(a.cmp(b)),
            (RawValue::Number(a), RawValue::Number(b)) => a.compare(*b),
            (RawValue::Bool(a), RawValue::Bool(b)) => Some(a.cmp(b)),
            (RawValue::Date(a), RawValue::Date(b)) => Some(a.cmp(b)),
            (RawValue::DateTime(a), RawValue::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Structural equality that treats numerically equal numbers as equal.
    pub fn equivalent(&self, other: &RawValue) -> bool {
        match (self, other) {
            (RawValue::Number(a), RawValue::Number(b)) => a.compare(*b) == Some(Ordering::Equal),
            (RawValue::List(a), RawValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            (
                RawValue::Range { from: af, to: at },
                RawValue::Range { from: bf, to: bt },
            ) => af.equivalent(bf) && at.equivalent(bt),
            _ => self == other,
        }
    }

    /// Renders the wire form of this value.
    pub fn to_wire(&self) -> String {
        match self {
            RawValue::Empty => String::new(),
            RawValue::Text(s) => s.clone(),
            RawValue::Number(n) => n.to_string(),
            RawValue::Bool(b) => b.to_string(),
            RawValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            RawValue::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            RawValue::List(items) => items
                .iter()
                .map(RawValue::to_wire)
                .collect::<Vec<_>>()
                .join(","),
            RawValue::Range { from, to } => format!("{}..{}", from.to_wire(), to.to_wire()),
        }
    }

    /// Parses a wire string according to a field type and the shape the
    /// operator expects.
    ///
    /// `Scalar` reads one value, separators included. `List` splits on `,`
    /// (items are trimmed) and `Range` on the first `..`. `Any` guesses from the separators,
    /// except for `string` and `custom` fields where the text is taken
    /// verbatim.
    pub fn from_wire(field_type: FieldType, shape: ValueShape, wire: &str) -> Result<RawValue, String> {
        if wire.is_empty() {
            return Ok(RawValue::Empty);
        }
        let shape = match shape {
            ValueShape::Any if matches!(field_type, FieldType::String | FieldType::Custom) => {
                ValueShape::Scalar
            }
            ValueShape::Any if wire.contains("..") => ValueShape::Range,
            ValueShape::Any if wire.contains(',') => ValueShape::List,
            ValueShape::Any => ValueShape::Scalar,
            shape => shape,
        };
        match shape {
            ValueShape::Range => match wire.split_once("..") {
                Some((from, to)) => Ok(RawValue::range(
                    Self::scalar_from_wire(field_type, from)?,
                    Self::scalar_from_wire(field_type, to)?,
                )),
                None => Self::scalar_from_wire(field_type, wire),
            },
            ValueShape::List => wire
                .split(',')
                .map(|item| Self::scalar_from_wire(field_type, item.trim()))
                .collect::<Result<Vec<_>, _>>()
                .map(RawValue::List),
            ValueShape::Scalar | ValueShape::Any => Self::scalar_from_wire(field_type, wire),
        }
    }

    /// Parses one scalar. Text types keep the wire text as is.
    pub(crate) fn scalar_from_wire(field_type: FieldType, wire: &str) -> Result<RawValue, String> {
        let trimmed = wire.trim();
        match field_type {
            FieldType::Number => Number::parse(trimmed)
                .map(RawValue::Number)
                .ok_or_else(|| format!("'{}' is not a number", trimmed)),
            FieldType::Boolean => match trimmed {
                "true" => Ok(RawValue::Bool(true)),
                "false" => Ok(RawValue::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", trimmed)),
            },
            FieldType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(RawValue::Date)
                .map_err(|e| format!("'{}' is not a date: {}", trimmed, e)),
            FieldType::DateTime => DateTime::parse_from_rfc3339(trimmed)
                .map(|dt| RawValue::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| format!("'{}' is not a datetime: {}", trimmed, e)),
            FieldType::String | FieldType::Enum | FieldType::Id | FieldType::Custom => {
                Ok(RawValue::Text(wire.to_string()))
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<Number> for RawValue {
    fn from(n: Number) -> Self {
        RawValue::Number(n)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(d: NaiveDate) -> Self {
        RawValue::Date(d)
    }
}

/// One user-entered value in its three parallel representations.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionValue {
    /// Typed internal value.
    pub raw: RawValue,
    /// Human-readable text.
    pub display: String,
    /// Wire string.
    pub serialized: String,
}

impl ConditionValue {
    /// Creates a value from all three representations.
    pub fn new(raw: impl Into<RawValue>, display: impl Into<String>, serialized: impl Into<String>) -> Self {
        ConditionValue {
            raw: raw.into(),
            display: display.into(),
            serialized: serialized.into(),
        }
    }

    /// Creates a value whose display and wire forms are both derived from `raw`.
    pub fn from_raw(raw: impl Into<RawValue>) -> Self {
        let raw = raw.into();
        let wire = raw.to_wire();
        ConditionValue {
            display: wire.clone(),
            serialized: wire,
            raw,
        }
    }

    /// Creates a text value used verbatim for all three forms.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        ConditionValue {
            raw: RawValue::Text(s.clone()),
            display: s.clone(),
            serialized: s,
        }
    }

    /// The empty value, used by operators that take no value.
    pub fn empty() -> Self {
        ConditionValue {
            raw: RawValue::Empty,
            display: String::new(),
            serialized: String::new(),
        }
    }

    /// Three-way equivalence: same typed value and same wire form.
    ///
    /// `display` is presentation only and is not compared.
    pub fn equivalent(&self, other: &ConditionValue) -> bool {
        self.raw.equivalent(&other.raw) && self.serialized == other.serialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_parse_and_display() {
        assert_eq!(Connector::parse("and"), Some(Connector::And));
        assert_eq!(Connector::parse("OR"), Some(Connector::Or));
        assert_eq!(Connector::parse("xor"), None);
        assert_eq!(Connector::Or.to_string(), "OR");
    }

    #[test]
    fn number_parse_prefers_integers() {
        assert_eq!(Number::parse("42"), Some(Number::I64(42)));
        assert_eq!(Number::parse("18446744073709551615"), Some(Number::U64(u64::MAX)));
        assert_eq!(Number::parse("2.5"), Some(Number::F64(2.5)));
        assert_eq!(Number::parse("NaN"), None);
        assert_eq!(Number::parse("abc"), None);
    }

    #[test]
    fn number_mixed_compare() {
        assert_eq!(Number::I64(5).compare(Number::F64(5.0)), Some(Ordering::Equal));
        assert_eq!(Number::U64(10).compare(Number::F64(5.5)), Some(Ordering::Greater));
        assert_eq!(Number::F64(f64::NAN).compare(Number::F64(1.0)), None);
    }

    #[test]
    fn emptiness() {
        assert!(RawValue::Empty.is_empty());
        assert!(RawValue::from("  ").is_empty());
        assert!(RawValue::List(vec![]).is_empty());
        assert!(RawValue::range(RawValue::Empty, RawValue::from("x")).is_empty());
        assert!(!RawValue::Bool(false).is_empty());
        assert!(!RawValue::Number(Number::I64(0)).is_empty());
    }

    #[test]
    fn wire_for_compound_values() {
        let range = RawValue::range(Number::I64(1).into(), Number::I64(10).into());
        assert_eq!(range.to_wire(), "1..10");
        assert!(RawValue::from_wire(FieldType::Number, ValueShape::Range, "1..10")
            .unwrap()
            .equivalent(&range));

        let list = RawValue::List(vec!["a".into(), "b".into()]);
        assert_eq!(list.to_wire(), "a,b");
        assert_eq!(RawValue::from_wire(FieldType::Enum, ValueShape::List, "a,b").unwrap(), list);
    }

    #[test]
    fn string_fields_keep_separators_verbatim() {
        assert_eq!(
            RawValue::from_wire(FieldType::String, ValueShape::Any, "a,b..c").unwrap(),
            RawValue::from("a,b..c")
        );
    }

    #[test]
    fn scalar_shape_keeps_separators_for_any_type() {
        assert_eq!(
            RawValue::from_wire(FieldType::Id, ValueShape::Scalar, "acme,inc").unwrap(),
            RawValue::from("acme,inc")
        );
        assert_eq!(
            RawValue::from_wire(FieldType::Enum, ValueShape::Scalar, "v1..v2").unwrap(),
            RawValue::from("v1..v2")
        );
        // Only the shape decides, not the separators present.
        assert_eq!(
            RawValue::from_wire(FieldType::Id, ValueShape::List, "a..b,c").unwrap(),
            RawValue::List(vec!["a..b".into(), "c".into()])
        );
        assert!(matches!(
            RawValue::from_wire(FieldType::Enum, ValueShape::Any, "a,b").unwrap(),
            RawValue::List(_)
        ));
    }

    #[test]
    fn typed_wire_parsing() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            RawValue::from_wire(FieldType::Date, ValueShape::Scalar, "2024-03-01").unwrap(),
            RawValue::Date(date)
        );
        assert_eq!(
            RawValue::from_wire(FieldType::Boolean, ValueShape::Scalar, "true").unwrap(),
            RawValue::Bool(true)
        );
        assert!(RawValue::from_wire(FieldType::Boolean, ValueShape::Scalar, "yes").is_err());
        assert!(RawValue::from_wire(FieldType::Number, ValueShape::Scalar, "ten").is_err());
        assert_eq!(RawValue::from_wire(FieldType::Number, ValueShape::Scalar, "").unwrap(), RawValue::Empty);
    }

    #[test]
    fn datetime_round_trips_through_wire() {
        let raw = RawValue::from_wire(FieldType::DateTime, ValueShape::Scalar, "2024-03-01T10:30:00Z").unwrap();
        assert_eq!(raw.to_wire(), "2024-03-01T10:30:00Z");
    }

    #[test]
    fn equivalence_ignores_display() {
        let a = ConditionValue::new("active", "Active", "active");
        let b = ConditionValue::text("active");
        assert!(a.equivalent(&b));
        assert_ne!(a, b);
    }
}
