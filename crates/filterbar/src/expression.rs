//! Committed expressions and the immutable [`Filter`] list.
//!
//! A filter is combined left to right, each expression joined to the next by
//! its own connector:
//!
//! ```text
//! status = active AND priority > 3 OR owner = me
//! └──────┬──────┘ └┬┘
//!   expression 0   connector of expression 0
//! ```
//!
//! Grammar invariant: every expression except the last carries a connector,
//! and the last carries none.

use std::ops::Deref;
use std::sync::Arc;

use crate::error::{MachineError, Result};
use crate::schema::{FieldDescriptor, OperatorDescriptor};
use crate::value::{ConditionValue, Connector};

/// A single `field OP value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub field: FieldDescriptor,
    pub operator: OperatorDescriptor,
    pub value: ConditionValue,
}

impl FilterCondition {
    pub fn new(field: FieldDescriptor, operator: OperatorDescriptor, value: ConditionValue) -> Self {
        FilterCondition {
            field,
            operator,
            value,
        }
    }

    /// Same field key, operator key and equivalent value.
    pub fn equivalent(&self, other: &FilterCondition) -> bool {
        self.field.key == other.field.key
            && self.operator.key == other.operator.key
            && self.value.equivalent(&other.value)
    }
}

/// A condition plus the connector joining it to the following expression.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    pub condition: FilterCondition,
    pub connector: Option<Connector>,
}

impl FilterExpression {
    /// Creates a terminal expression (no connector).
    pub fn new(condition: FilterCondition) -> Self {
        FilterExpression {
            condition,
            connector: None,
        }
    }

    /// Sets the trailing connector.
    pub fn joined(mut self, connector: Connector) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Equivalent conditions and the same connector.
    pub fn equivalent(&self, other: &FilterExpression) -> bool {
        self.connector == other.connector && self.condition.equivalent(&other.condition)
    }
}

/// Checks the connector grammar of a list.
pub fn check_grammar(expressions: &[FilterExpression]) -> Result<()> {
    let last = expressions.len().saturating_sub(1);
    for (index, expr) in expressions.iter().enumerate() {
        match (index == last, expr.connector) {
            (true, Some(_)) => {
                return Err(MachineError::BrokenGrammar {
                    index,
                    reason: "last expression has a trailing connector",
                })
            }
            (false, None) => {
                return Err(MachineError::BrokenGrammar {
                    index,
                    reason: "interior expression has no connector",
                })
            }
            _ => {}
        }
    }
    Ok(())
}

/// Repairs the connector grammar in place.
///
/// Interior expressions missing a connector are joined with `AND`; a
/// trailing connector on the last expression is dropped.
pub fn normalize_connectors(expressions: &mut [FilterExpression]) {
    let len = expressions.len();
    for (index, expr) in expressions.iter_mut().enumerate() {
        if index + 1 == len {
            expr.connector = None;
        } else if expr.connector.is_none() {
            expr.connector = Some(Connector::And);
        }
    }
}

/// The ordered, immutable list of committed expressions.
///
/// Cloning is cheap and shares storage. Every engine mutation builds a new
/// list, so [`Filter::ptr_eq`] is a valid change check.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    expressions: Arc<Vec<FilterExpression>>,
}

impl Filter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Filter::default()
    }

    /// Builds a filter from a list that must satisfy the connector grammar.
    pub fn try_from_vec(expressions: Vec<FilterExpression>) -> Result<Self> {
        check_grammar(&expressions)?;
        Ok(Filter {
            expressions: Arc::new(expressions),
        })
    }

    /// Builds a filter, repairing connectors with [`normalize_connectors`].
    pub fn normalized(mut expressions: Vec<FilterExpression>) -> Self {
        normalize_connectors(&mut expressions);
        Filter {
            expressions: Arc::new(expressions),
        }
    }

    /// Wraps a list built by the engine.
    ///
    /// Interior expressions must carry connectors. The last one may still
    /// hold the pending connector of an expression in progress; the machine
    /// checks that case against its step.
    pub(crate) fn from_checked(expressions: Vec<FilterExpression>) -> Self {
        debug_assert!(
            expressions.iter().rev().skip(1).all(|e| e.connector.is_some()),
            "engine produced an interior expression without a connector"
        );
        Filter {
            expressions: Arc::new(expressions),
        }
    }

    /// Returns `true` if both values share the same storage.
    pub fn ptr_eq(&self, other: &Filter) -> bool {
        Arc::ptr_eq(&self.expressions, &other.expressions)
    }

    /// Copies the expressions out.
    pub fn to_vec(&self) -> Vec<FilterExpression> {
        self.expressions.as_ref().clone()
    }

    /// Element-wise [`FilterExpression::equivalent`].
    pub fn equivalent(&self, other: &[FilterExpression]) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.equivalent(b))
    }
}

impl Deref for Filter {
    type Target = [FilterExpression];

    fn deref(&self) -> &[FilterExpression] {
        &self.expressions
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.expressions == other.expressions
    }
}

impl<'a> IntoIterator for &'a Filter {
    type Item = &'a FilterExpression;
    type IntoIter = std::slice::Iter<'a, FilterExpression>;

    fn into_iter(self) -> Self::IntoIter {
        self.expressions.iter()
    }
}
