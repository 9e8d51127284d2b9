//! Filterbar - Sequential filter-expression building engine.
//!
//! Filterbar drives a "filter bar" input where the user builds a list of
//! structured conditions one token at a time:
//!
//! ```text
//! field OP value [AND|OR] field OP value ...
//! ```
//!
//! The crate provides:
//!
//! - A grammar state machine ([`StateMachine`]) that owns the current step and
//!   the committed [`Filter`], and reports illegal actions instead of
//!   silently dropping them
//! - A pure token projector ([`project`]) for rendering
//! - A validator ([`validate_expressions`], [`validate_schema`]) that reports
//!   problems as data
//! - Wire formats: JSON, query string and a human display string
//! - A suggestion-provider contract with cancellation and stale-result
//!   rejection
//!
//! # Quick Start
//!
//! ```rust
//! use filterbar::{
//!     to_json, validate_expressions, Action, ConditionValue, FieldDescriptor, FieldType,
//!     Schema, SerializeOptions, StateMachine,
//! };
//!
//! let schema = Schema::new(vec![
//!     FieldDescriptor::with_default_operators("status", "Status", FieldType::Enum),
//!     FieldDescriptor::with_default_operators("age", "Age", FieldType::Number),
//! ]);
//! let status = schema.field("status").unwrap().clone();
//! let eq = status.operator_by_key("eq").unwrap().clone();
//!
//! let mut machine = StateMachine::new();
//! machine.transition(Action::Focus);
//! machine.transition(Action::SelectField(status));
//! machine.transition(Action::SelectOperator(eq));
//! machine.transition(Action::ConfirmValue(ConditionValue::new("active", "Active", "active")));
//! machine.transition(Action::Complete);
//!
//! let tokens: Vec<_> = machine.tokens().into_iter().map(|t| t.value).collect();
//! assert_eq!(tokens, ["Status", "=", "Active"]);
//!
//! assert!(validate_expressions(machine.expressions(), &schema).valid);
//!
//! let json = to_json(machine.expressions(), Some(&schema), &SerializeOptions::default()).unwrap();
//! assert_eq!(json, r#"[{"field":"status","operator":"eq","value":"active"}]"#);
//! ```
//!
//! # Grammar Invariant
//!
//! In every committed list, every expression but the last carries a
//! connector and the last carries none. While the next expression is being
//! built, its connector is held by the step as `pending_connector` and is
//! also attached to the last committed expression, so the list stays valid
//! at every step.
//!
//! # Field Types and Default Operators
//!
//! | Type | Operators |
//! |------|-----------|
//! | string | `contains`, `eq`, `ne`, `starts_with`, `ends_with`, `is_empty` |
//! | number | `eq`, `ne`, `gt`, `gte`, `lt`, `lte`, `between` |
//! | date, datetime | `eq`, `before`, `after`, `between` |
//! | boolean | `is` |
//! | enum, id | `eq`, `ne`, `in` |
//! | custom | `eq` |

mod error;
mod expression;
mod machine;
mod projector;
mod schema;
mod serialize;
mod suggest;
mod ui;
mod validate;
mod value;

// Re-export public API
pub use error::{MachineError, Result, SchemaError, SerializeError, SuggestError};
pub use expression::{check_grammar, normalize_connectors, Filter, FilterCondition, FilterExpression};
pub use machine::{
    Action, ActionKind, Context, Edit, IgnoreReason, StateMachine, Step, StepKind, Transition,
};
pub use projector::{project, token_at, TokenData, TokenKind};
pub use schema::{
    ConditionHook, DeserializeHook, EnumOption, FieldDescriptor, FieldSpec, FieldType,
    OperatorDescriptor, OperatorSpec, Schema, SchemaFile, SchemaHook, SerializeHook, ValueShape,
};
pub use serialize::{
    deserialize, from_json, from_query_string, parse_value, serialize, to_display_string, to_json,
    to_query_string, Deserialized, DisplayOptions, EntryError, OperatorStyle, SerializeOptions,
    SerializedExpression,
};
pub use suggest::{
    CancellationToken, ConnectorProvider, FieldProvider, OperatorProvider, OptionsProvider,
    QueryTicket, Suggestion, SuggestionChain, SuggestionContext, SuggestionProvider,
    SuggestionSession,
};
pub use ui::{UiEvent, UiState};
pub use validate::{
    validate_expression, validate_expressions, validate_schema, ErrorKind, ValidationError,
    ValidationResult, ValidationWarning, WarningKind,
};
pub use value::{ConditionValue, Connector, Number, RawValue};
