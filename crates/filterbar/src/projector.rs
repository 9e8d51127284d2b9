//! Projection of engine state into display tokens.
//!
//! [`project`] is a pure function: the same committed list and step always
//! produce an equal token list, so callers may memoize on input identity
//! (see [`Filter::ptr_eq`]).

use std::fmt;

use serde::Serialize;

use crate::expression::Filter;
use crate::machine::Step;

/// What part of an expression a token shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Field,
    Operator,
    Value,
    Connector,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Field => "field",
            TokenKind::Operator => "operator",
            TokenKind::Value => "value",
            TokenKind::Connector => "connector",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rendered token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenData {
    /// Stable id: `"{index}-{kind}"` for committed tokens, `"pending-{kind}"`
    /// for the in-progress selection.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Display text.
    pub value: String,
    /// Zero-based position in the token list.
    pub position: usize,
    /// Owning expression; `None` for pending tokens.
    pub expression_index: Option<usize>,
    pub is_pending: bool,
}

/// Builds the token list for a committed filter and the current step.
pub fn project(completed: &Filter, step: &Step) -> Vec<TokenData> {
    let mut tokens = Vec::with_capacity(completed.len() * 4 + 2);

    for (index, expr) in completed.iter().enumerate() {
        let condition = &expr.condition;
        push(&mut tokens, TokenKind::Field, &condition.field.label, Some(index));
        push(
            &mut tokens,
            TokenKind::Operator,
            condition.operator.short_text(),
            Some(index),
        );
        push(&mut tokens, TokenKind::Value, &condition.value.display, Some(index));
        if let Some(connector) = expr.connector {
            push(&mut tokens, TokenKind::Connector, connector.as_str(), Some(index));
        }
    }

    if let Some(field) = step.current_field() {
        push(&mut tokens, TokenKind::Field, &field.label, None);
        if let Some(operator) = step.current_operator() {
            push(&mut tokens, TokenKind::Operator, operator.short_text(), None);
        }
    }

    tokens
}

/// Finds a token by id.
pub fn token_at<'a>(tokens: &'a [TokenData], id: &str) -> Option<&'a TokenData> {
    tokens.iter().find(|t| t.id == id)
}

fn push(tokens: &mut Vec<TokenData>, kind: TokenKind, text: &str, index: Option<usize>) {
    let id = match index {
        Some(i) => format!("{}-{}", i, kind),
        None => format!("pending-{}", kind),
    };
    tokens.push(TokenData {
        id,
        kind,
        value: text.to_string(),
        position: tokens.len(),
        expression_index: index,
        is_pending: index.is_none(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{FilterCondition, FilterExpression};
    use crate::schema::{FieldDescriptor, FieldType, OperatorDescriptor};
    use crate::value::{ConditionValue, Connector};

    fn status() -> FieldDescriptor {
        FieldDescriptor::with_default_operators("status", "Status", FieldType::Enum)
    }

    fn committed() -> Filter {
        Filter::try_from_vec(vec![
            FilterExpression::new(FilterCondition::new(
                status(),
                OperatorDescriptor::builtin("eq").unwrap(),
                ConditionValue::new("active", "Active", "active"),
            ))
            .joined(Connector::Or),
            FilterExpression::new(FilterCondition::new(
                FieldDescriptor::with_default_operators("name", "Name", FieldType::String),
                OperatorDescriptor::builtin("is_empty").unwrap(),
                ConditionValue::empty(),
            )),
        ])
        .unwrap()
    }

    #[test]
    fn committed_tokens_in_order() {
        let tokens = project(&committed(), &Step::Idle);
        let texts: Vec<_> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(texts, ["Status", "=", "Active", "OR", "Name", "is empty", ""]);
        assert!(tokens.iter().all(|t| !t.is_pending));
        assert_eq!(tokens[4].expression_index, Some(1));
        assert_eq!(tokens[4].position, 4);
        assert_eq!(tokens[3].id, "0-connector");
    }

    #[test]
    fn pending_tokens_follow_committed_ones() {
        let step = Step::EnteringValue {
            field: status(),
            operator: OperatorDescriptor::builtin("ne").unwrap(),
            pending_connector: None,
        };
        let tokens = project(&Filter::new(), &step);
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|t| t.is_pending && t.expression_index.is_none()));
        assert_eq!(token_at(&tokens, "pending-operator").unwrap().value, "!=");
    }

    #[test]
    fn only_selected_parts_are_pending() {
        let step = Step::SelectingOperator {
            field: status(),
            pending_connector: None,
        };
        let tokens = project(&Filter::new(), &step);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Field);

        let step = Step::SelectingField {
            pending_connector: None,
        };
        assert!(project(&Filter::new(), &step).is_empty());
    }

    #[test]
    fn projection_is_idempotent() {
        let filter = committed();
        assert_eq!(project(&filter, &Step::Idle), project(&filter, &Step::Idle));
    }
}
