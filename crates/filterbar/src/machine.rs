//! The expression-building state machine.
//!
//! [`StateMachine`] is the single owner of the grammar step and of the
//! committed [`Filter`]. Steps follow the token grammar:
//!
//! ```text
//! Idle ─FOCUS─▶ SelectingField ─SELECT_FIELD─▶ SelectingOperator
//!                    ▲                                │ SELECT_OPERATOR
//!                    │ SELECT_CONNECTOR               ▼
//!             SelectingConnector ◀─CONFIRM_VALUE─ EnteringValue
//!                    │ COMPLETE
//!                    ▼
//!                  Idle
//! ```
//!
//! Each [`Step`] variant carries exactly the in-progress data valid in that
//! step, so a half-built expression can never be observed in an impossible
//! shape. `DELETE_LAST` undoes the last grammar transition exactly.
//!
//! Actions that make no sense in the current step are never silently
//! dropped: [`StateMachine::transition`] reports them as
//! [`Transition::Ignored`] with a reason, and leaves state untouched.
//!
//! # Example
//!
//! ```
//! use filterbar::{Action, ConditionValue, FieldDescriptor, FieldType, OperatorDescriptor,
//!     StateMachine, StepKind, Transition};
//!
//! let status = FieldDescriptor::with_default_operators("status", "Status", FieldType::Enum);
//! let eq = OperatorDescriptor::builtin("eq").unwrap();
//!
//! let mut machine = StateMachine::new();
//! machine.transition(Action::Focus);
//! machine.transition(Action::SelectField(status));
//! machine.transition(Action::SelectOperator(eq));
//! let outcome = machine.transition(Action::ConfirmValue(ConditionValue::text("active")));
//!
//! assert_eq!(outcome, Transition::Applied);
//! assert_eq!(machine.state(), StepKind::SelectingConnector);
//! assert_eq!(machine.expressions().len(), 1);
//! ```

use std::fmt;

use crate::error::{MachineError, Result};
use crate::expression::{check_grammar, Filter, FilterCondition, FilterExpression};
use crate::projector::{project, TokenData};
use crate::schema::{FieldDescriptor, OperatorDescriptor, Schema};
use crate::validate::validate_expression;
use crate::value::{ConditionValue, Connector};

/// Current position in the grammar, with its in-progress data.
///
/// `pending_connector` is the connector already attached to the last
/// committed expression while the next expression is being built. It is
/// `Some` exactly when the committed list is non-empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Step {
    #[default]
    Idle,
    SelectingField {
        pending_connector: Option<Connector>,
    },
    SelectingOperator {
        field: FieldDescriptor,
        pending_connector: Option<Connector>,
    },
    EnteringValue {
        field: FieldDescriptor,
        operator: OperatorDescriptor,
        pending_connector: Option<Connector>,
    },
    SelectingConnector,
}

impl Step {
    /// The data-free kind of this step.
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Idle => StepKind::Idle,
            Step::SelectingField { .. } => StepKind::SelectingField,
            Step::SelectingOperator { .. } => StepKind::SelectingOperator,
            Step::EnteringValue { .. } => StepKind::EnteringValue,
            Step::SelectingConnector => StepKind::SelectingConnector,
        }
    }

    /// Field chosen for the in-progress expression.
    pub fn current_field(&self) -> Option<&FieldDescriptor> {
        match self {
            Step::SelectingOperator { field, .. } | Step::EnteringValue { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }

    /// Operator chosen for the in-progress expression.
    pub fn current_operator(&self) -> Option<&OperatorDescriptor> {
        match self {
            Step::EnteringValue { operator, .. } => Some(operator),
            _ => None,
        }
    }

    /// Connector joining the committed list to the in-progress expression.
    pub fn pending_connector(&self) -> Option<Connector> {
        match self {
            Step::SelectingField { pending_connector }
            | Step::SelectingOperator {
                pending_connector, ..
            }
            | Step::EnteringValue {
                pending_connector, ..
            } => *pending_connector,
            _ => None,
        }
    }

    fn with_pending(self, connector: Option<Connector>) -> Step {
        match self {
            Step::SelectingField { .. } => Step::SelectingField {
                pending_connector: connector,
            },
            Step::SelectingOperator { field, .. } => Step::SelectingOperator {
                field,
                pending_connector: connector,
            },
            Step::EnteringValue {
                field, operator, ..
            } => Step::EnteringValue {
                field,
                operator,
                pending_connector: connector,
            },
            other => other,
        }
    }

    fn is_mid_expression(&self) -> bool {
        matches!(
            self,
            Step::SelectingField { .. } | Step::SelectingOperator { .. } | Step::EnteringValue { .. }
        )
    }
}

/// Data-free step name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Idle,
    SelectingField,
    SelectingOperator,
    EnteringValue,
    SelectingConnector,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Idle => "idle",
            StepKind::SelectingField => "selecting-field",
            StepKind::SelectingOperator => "selecting-operator",
            StepKind::EnteringValue => "entering-value",
            StepKind::SelectingConnector => "selecting-connector",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Focus,
    SelectField(FieldDescriptor),
    SelectOperator(OperatorDescriptor),
    ConfirmValue(ConditionValue),
    SelectConnector(Connector),
    Complete,
    Blur,
    Clear,
    Reset,
    DeleteLast,
}

impl Action {
    /// The payload-free kind of this action.
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Focus => ActionKind::Focus,
            Action::SelectField(_) => ActionKind::SelectField,
            Action::SelectOperator(_) => ActionKind::SelectOperator,
            Action::ConfirmValue(_) => ActionKind::ConfirmValue,
            Action::SelectConnector(_) => ActionKind::SelectConnector,
            Action::Complete => ActionKind::Complete,
            Action::Blur => ActionKind::Blur,
            Action::Clear => ActionKind::Clear,
            Action::Reset => ActionKind::Reset,
            Action::DeleteLast => ActionKind::DeleteLast,
        }
    }
}

/// Payload-free action name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Focus,
    SelectField,
    SelectOperator,
    ConfirmValue,
    SelectConnector,
    Complete,
    Blur,
    Clear,
    Reset,
    DeleteLast,
}

impl ActionKind {
    /// All kinds, in grammar order.
    pub const ALL: [ActionKind; 10] = [
        ActionKind::Focus,
        ActionKind::SelectField,
        ActionKind::SelectOperator,
        ActionKind::ConfirmValue,
        ActionKind::SelectConnector,
        ActionKind::Complete,
        ActionKind::Blur,
        ActionKind::Clear,
        ActionKind::Reset,
        ActionKind::DeleteLast,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Focus => "FOCUS",
            ActionKind::SelectField => "SELECT_FIELD",
            ActionKind::SelectOperator => "SELECT_OPERATOR",
            ActionKind::ConfirmValue => "CONFIRM_VALUE",
            ActionKind::SelectConnector => "SELECT_CONNECTOR",
            ActionKind::Complete => "COMPLETE",
            ActionKind::Blur => "BLUR",
            ActionKind::Clear => "CLEAR",
            ActionKind::Reset => "RESET",
            ActionKind::DeleteLast => "DELETE_LAST",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`StateMachine::transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The action was applied.
    Applied,
    /// The action was rejected; state is unchanged.
    Ignored(IgnoreReason),
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}

/// Why an action was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The action is not part of the grammar at this step.
    IllegalInStep { action: ActionKind, step: StepKind },
    /// `DELETE_LAST` with nothing selected and nothing committed.
    NothingToDelete,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::IllegalInStep { action, step } => {
                write!(f, "{} is not allowed while {}", action, step)
            }
            IgnoreReason::NothingToDelete => write!(f, "nothing to delete"),
        }
    }
}

/// Borrowed view of the engine context.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub completed: &'a Filter,
    pub current_field: Option<&'a FieldDescriptor>,
    pub current_operator: Option<&'a OperatorDescriptor>,
    pub pending_connector: Option<Connector>,
}

/// A replacement for one part of a committed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Field(FieldDescriptor),
    Operator(OperatorDescriptor),
    Value(ConditionValue),
    Connector(Connector),
}

/// The result of planning an action: the next step and, if the list
/// changes, its new contents.
struct Plan {
    step: Step,
    completed: Option<Vec<FilterExpression>>,
}

impl Plan {
    fn step(step: Step) -> Self {
        Plan {
            step,
            completed: None,
        }
    }
}

/// Sequential expression builder.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    step: Step,
    completed: Filter,
}

impl StateMachine {
    /// Creates an idle machine with no expressions.
    pub fn new() -> Self {
        StateMachine::default()
    }

    /// Creates an idle machine holding a copy of `expressions`.
    pub fn with_expressions(expressions: &[FilterExpression]) -> Result<Self> {
        let mut machine = StateMachine::new();
        machine.load_expressions(expressions)?;
        Ok(machine)
    }

    /// Current step kind.
    pub fn state(&self) -> StepKind {
        self.step.kind()
    }

    /// Current step with its in-progress data.
    pub fn step(&self) -> &Step {
        &self.step
    }

    /// Committed expressions.
    pub fn expressions(&self) -> &Filter {
        &self.completed
    }

    /// The engine context: committed list plus in-progress selection.
    pub fn context(&self) -> Context<'_> {
        Context {
            completed: &self.completed,
            current_field: self.step.current_field(),
            current_operator: self.step.current_operator(),
            pending_connector: self.step.pending_connector(),
        }
    }

    /// Display tokens for the current list and step.
    pub fn tokens(&self) -> Vec<TokenData> {
        project(&self.completed, &self.step)
    }

    /// Returns `true` if `action` would be applied.
    pub fn can_transition(&self, action: &Action) -> bool {
        self.plan(action).is_ok()
    }

    /// Action kinds legal in the current step, in grammar order.
    pub fn available_actions(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|kind| self.allows(*kind))
            .collect()
    }

    /// Applies an action.
    pub fn transition(&mut self, action: Action) -> Transition {
        let kind = action.kind();
        match self.plan(&action) {
            Ok(plan) => {
                let from = self.step.kind();
                self.step = plan.step;
                if let Some(list) = plan.completed {
                    self.completed = Filter::from_checked(list);
                }
                tracing::debug!(
                    action = %kind,
                    from = %from,
                    to = %self.step.kind(),
                    expressions = self.completed.len(),
                    "transition applied"
                );
                self.debug_check();
                Transition::Applied
            }
            Err(reason) => {
                tracing::debug!(action = %kind, step = %self.step.kind(), %reason, "transition ignored");
                Transition::Ignored(reason)
            }
        }
    }

    /// Returns to `Idle` and drops every expression.
    pub fn reset(&mut self) -> Transition {
        self.transition(Action::Reset)
    }

    /// Drops every expression and the in-progress selection.
    pub fn clear(&mut self) -> Transition {
        self.transition(Action::Clear)
    }

    /// Replaces the committed list with a copy of `expressions`.
    ///
    /// The list must satisfy the connector grammar. The step kind is kept;
    /// when an expression is in progress it stays joined to the new list
    /// (by its pending connector, or `AND` if it had none).
    pub fn load_expressions(&mut self, expressions: &[FilterExpression]) -> Result<()> {
        check_grammar(expressions)?;
        self.install(expressions.to_vec());
        tracing::debug!(expressions = self.completed.len(), "expressions loaded");
        Ok(())
    }

    /// Removes one committed expression.
    pub fn remove_expression(&mut self, index: usize) -> Result<()> {
        let len = self.completed.len();
        if index >= len {
            return Err(MachineError::out_of_range(index, len));
        }
        let mut list = self.completed.to_vec();
        list.remove(index);
        if let Some(last) = list.last_mut() {
            if index == len - 1 {
                last.connector = None;
            }
        }
        self.install(list);
        tracing::debug!(index, expressions = self.completed.len(), "expression removed");
        Ok(())
    }

    /// Replaces one part of a committed expression.
    ///
    /// The edited condition is validated against `schema` first; on any
    /// error nothing changes. The step is not affected.
    pub fn edit_expression(&mut self, index: usize, edit: Edit, schema: &Schema) -> Result<()> {
        let len = self.completed.len();
        if index >= len {
            return Err(MachineError::out_of_range(index, len));
        }
        let mut list = self.completed.to_vec();
        let is_last = index + 1 == len;

        match edit {
            Edit::Connector(connector) => {
                if is_last && !self.step.is_mid_expression() {
                    return Err(MachineError::BrokenGrammar {
                        index,
                        reason: "last expression cannot take a connector",
                    });
                }
                list[index].connector = Some(connector);
                if is_last {
                    self.step = std::mem::take(&mut self.step).with_pending(Some(connector));
                }
            }
            edit => {
                let target = &mut list[index].condition;
                match edit {
                    Edit::Field(field) => target.field = field,
                    Edit::Operator(operator) => target.operator = operator,
                    Edit::Value(value) => target.value = value,
                    Edit::Connector(_) => unreachable!("handled above"),
                }
                let result = validate_expression(&list[index], schema, Some(index));
                if let Some(error) = result.errors.first() {
                    return Err(MachineError::EditRejected(error.message.clone()));
                }
            }
        }

        self.completed = Filter::from_checked(list);
        tracing::debug!(index, "expression edited");
        self.debug_check();
        Ok(())
    }

    /// Installs a new list and re-joins any in-progress expression to it.
    fn install(&mut self, mut list: Vec<FilterExpression>) {
        let step = std::mem::take(&mut self.step);
        self.step = match step {
            Step::SelectingConnector if list.is_empty() => Step::SelectingField {
                pending_connector: None,
            },
            step if step.is_mid_expression() => match list.last_mut() {
                Some(last) => {
                    let connector = step.pending_connector().unwrap_or(Connector::And);
                    last.connector = Some(connector);
                    step.with_pending(Some(connector))
                }
                None => step.with_pending(None),
            },
            step => step,
        };
        self.completed = Filter::from_checked(list);
        self.debug_check();
    }

    fn allows(&self, kind: ActionKind) -> bool {
        let has_expressions = !self.completed.is_empty();
        match (&self.step, kind) {
            (_, ActionKind::Blur | ActionKind::Clear | ActionKind::Reset) => true,
            (Step::Idle, ActionKind::Focus) => true,
            (Step::SelectingField { .. }, ActionKind::SelectField) => true,
            (Step::SelectingField { .. }, ActionKind::DeleteLast) => has_expressions,
            (Step::SelectingOperator { .. }, ActionKind::SelectOperator | ActionKind::DeleteLast) => {
                true
            }
            (Step::EnteringValue { .. }, ActionKind::ConfirmValue | ActionKind::DeleteLast) => true,
            (
                Step::SelectingConnector,
                ActionKind::SelectConnector | ActionKind::Complete | ActionKind::DeleteLast,
            ) => has_expressions,
            _ => false,
        }
    }

    /// Computes the effect of an action without applying it.
    fn plan(&self, action: &Action) -> std::result::Result<Plan, IgnoreReason> {
        let kind = action.kind();
        if !self.allows(kind) {
            let reason = match (&self.step, kind) {
                (Step::SelectingField { .. }, ActionKind::DeleteLast) => {
                    IgnoreReason::NothingToDelete
                }
                _ => IgnoreReason::IllegalInStep {
                    action: kind,
                    step: self.step.kind(),
                },
            };
            return Err(reason);
        }

        let plan = match (&self.step, action) {
            (_, Action::Reset) => Plan {
                step: Step::Idle,
                completed: Some(Vec::new()),
            },
            (step, Action::Clear) => Plan {
                step: match step {
                    Step::Idle => Step::Idle,
                    _ => Step::SelectingField {
                        pending_connector: None,
                    },
                },
                completed: Some(Vec::new()),
            },
            (step, Action::Blur) => match step.pending_connector() {
                Some(_) => Plan {
                    step: Step::Idle,
                    completed: Some(self.strip_last_connector()),
                },
                None => Plan::step(Step::Idle),
            },
            // Resuming a list joins the next expression with AND; the
            // connector stays editable through `edit_expression`.
            (Step::Idle, Action::Focus) if self.completed.is_empty() => {
                Plan::step(Step::SelectingField {
                    pending_connector: None,
                })
            }
            (Step::Idle, Action::Focus) => {
                let mut list = self.completed.to_vec();
                if let Some(last) = list.last_mut() {
                    last.connector = Some(Connector::And);
                }
                Plan {
                    step: Step::SelectingField {
                        pending_connector: Some(Connector::And),
                    },
                    completed: Some(list),
                }
            }
            (Step::SelectingField { pending_connector }, Action::SelectField(field)) => {
                Plan::step(Step::SelectingOperator {
                    field: field.clone(),
                    pending_connector: *pending_connector,
                })
            }
            (
                Step::SelectingOperator {
                    field,
                    pending_connector,
                },
                Action::SelectOperator(operator),
            ) => Plan::step(Step::EnteringValue {
                field: field.clone(),
                operator: operator.clone(),
                pending_connector: *pending_connector,
            }),
            (Step::EnteringValue { field, operator, .. }, Action::ConfirmValue(value)) => {
                let mut list = self.completed.to_vec();
                list.push(FilterExpression::new(FilterCondition::new(
                    field.clone(),
                    operator.clone(),
                    value.clone(),
                )));
                Plan {
                    step: Step::SelectingConnector,
                    completed: Some(list),
                }
            }
            (Step::SelectingConnector, Action::SelectConnector(connector)) => {
                let mut list = self.completed.to_vec();
                if let Some(last) = list.last_mut() {
                    last.connector = Some(*connector);
                }
                Plan {
                    step: Step::SelectingField {
                        pending_connector: Some(*connector),
                    },
                    completed: Some(list),
                }
            }
            (Step::SelectingConnector, Action::Complete) => Plan::step(Step::Idle),
            (_, Action::DeleteLast) => self.plan_delete_last(),
            // `allows` accepted a combination the grammar does not define.
            _ => unreachable!("allowed action {} has no plan in {}", kind, self.step.kind()),
        };
        Ok(plan)
    }

    fn plan_delete_last(&self) -> Plan {
        match &self.step {
            Step::SelectingConnector => {
                let mut list = self.completed.to_vec();
                let Some(popped) = list.pop() else {
                    unreachable!("DELETE_LAST is only allowed in selecting-connector with expressions");
                };
                let pending_connector = list.last().and_then(|e| e.connector);
                Plan {
                    step: Step::EnteringValue {
                        field: popped.condition.field,
                        operator: popped.condition.operator,
                        pending_connector,
                    },
                    completed: Some(list),
                }
            }
            Step::EnteringValue {
                field,
                pending_connector,
                ..
            } => Plan::step(Step::SelectingOperator {
                field: field.clone(),
                pending_connector: *pending_connector,
            }),
            Step::SelectingOperator {
                pending_connector, ..
            } => Plan::step(Step::SelectingField {
                pending_connector: *pending_connector,
            }),
            Step::SelectingField { .. } => Plan {
                step: Step::SelectingConnector,
                completed: Some(self.strip_last_connector()),
            },
            Step::Idle => unreachable!("DELETE_LAST is never allowed while idle"),
        }
    }

    fn strip_last_connector(&self) -> Vec<FilterExpression> {
        let mut list = self.completed.to_vec();
        if let Some(last) = list.last_mut() {
            last.connector = None;
        }
        list
    }

    fn debug_check(&self) {
        if cfg!(debug_assertions) {
            let pending = self.step.pending_connector();
            let last = self.completed.last().and_then(|e| e.connector);
            if self.step.is_mid_expression() {
                assert_eq!(
                    pending.is_some(),
                    !self.completed.is_empty(),
                    "pending connector out of sync with committed list"
                );
                assert_eq!(last, pending, "last connector differs from pending connector");
                let interior = &self.completed[..self.completed.len().saturating_sub(1)];
                assert!(interior.iter().all(|e| e.connector.is_some()));
            } else {
                assert!(check_grammar(&self.completed).is_ok(), "connector grammar broken");
            }
            if self.step == Step::SelectingConnector {
                assert!(!self.completed.is_empty(), "selecting-connector with no expressions");
            }
        }
    }
}
