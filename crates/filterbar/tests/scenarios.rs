//! End-to-end scenarios through the public API.

use filterbar::{
    from_query_string, serialize, to_display_string, to_query_string, validate_expression,
    validate_expressions, Action, ConditionValue, Connector, DisplayOptions, Edit, EnumOption,
    ErrorKind, FieldDescriptor, FieldType, FilterCondition, FilterExpression, IgnoreReason, Number,
    Schema, SerializeOptions, StateMachine, StepKind, TokenKind, Transition, UiEvent, UiState,
};

fn schema() -> Schema {
    Schema::new(vec![
        FieldDescriptor::with_default_operators("status", "Status", FieldType::Enum).options(vec![
            EnumOption::new("active", "Active"),
            EnumOption::new("archived", "Archived"),
        ]),
        FieldDescriptor::with_default_operators("name", "Name", FieldType::String),
        FieldDescriptor::with_default_operators("age", "Age", FieldType::Number),
    ])
}

fn active() -> ConditionValue {
    ConditionValue::new("active", "Active", "active")
}

/// Runs FOCUS, SELECT_FIELD(status), SELECT_OPERATOR(eq), CONFIRM_VALUE(active).
fn status_is_active(schema: &Schema) -> StateMachine {
    let status = schema.field("status").unwrap().clone();
    let eq = status.operator_by_key("eq").unwrap().clone();
    let mut machine = StateMachine::new();
    for action in [
        Action::Focus,
        Action::SelectField(status),
        Action::SelectOperator(eq),
        Action::ConfirmValue(active()),
    ] {
        assert_eq!(machine.transition(action), Transition::Applied);
    }
    machine
}

// ============================================================================
// Engine scenarios
// ============================================================================

#[test]
fn confirm_value_commits_expression() {
    let machine = status_is_active(&schema());
    assert_eq!(machine.state(), StepKind::SelectingConnector);
    assert_eq!(machine.expressions().len(), 1);
    assert!(machine.context().current_field.is_none());
}

#[test]
fn select_connector_joins_last_expression() {
    let mut machine = status_is_active(&schema());
    machine.transition(Action::SelectConnector(Connector::And));
    assert_eq!(machine.state(), StepKind::SelectingField);
    assert_eq!(machine.expressions()[0].connector, Some(Connector::And));
}

#[test]
fn delete_last_undoes_connector() {
    let mut machine = status_is_active(&schema());
    machine.transition(Action::SelectConnector(Connector::And));
    machine.transition(Action::DeleteLast);
    assert_eq!(machine.state(), StepKind::SelectingConnector);
    assert_eq!(machine.expressions()[0].connector, None);
}

#[test]
fn select_field_while_idle_is_ignored() {
    let schema = schema();
    let mut machine = StateMachine::new();
    let action = Action::SelectField(schema.field("status").unwrap().clone());
    assert!(!machine.can_transition(&action));

    let before = machine.expressions().clone();
    let outcome = machine.transition(action);
    assert!(matches!(
        outcome,
        Transition::Ignored(IgnoreReason::IllegalInStep {
            step: StepKind::Idle,
            ..
        })
    ));
    assert_eq!(machine.state(), StepKind::Idle);
    assert!(machine.expressions().ptr_eq(&before));
}

// ============================================================================
// Serializer and validator scenarios
// ============================================================================

#[test]
fn serialize_single_condition() {
    let schema = schema();
    let machine = status_is_active(&schema);
    let out = serialize(machine.expressions(), None, &SerializeOptions::default());
    assert_eq!(
        serde_json::to_value(&out).unwrap(),
        serde_json::json!([{"field": "status", "operator": "eq", "value": "active"}])
    );
}

#[test]
fn empty_value_is_required() {
    let schema = schema();
    let name = schema.field("name").unwrap().clone();
    let contains = name.operator_by_key("contains").unwrap().clone();
    let expr = FilterExpression::new(FilterCondition::new(
        name,
        contains,
        ConditionValue::new("", "", ""),
    ));

    let result = validate_expression(&expr, &schema, None);
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::Value);
    assert!(result.errors[0].message.contains("required"));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["errors"][0]["type"], "value");
}

// ============================================================================
// Full flow
// ============================================================================

#[test]
fn build_edit_and_export_a_filter() {
    let schema = schema();
    let mut machine = status_is_active(&schema);
    let mut ui = UiState::new().reduce(UiEvent::StepChanged(machine.state()));

    let age = schema.field("age").unwrap().clone();
    let gt = age.operator_by_key("gt").unwrap().clone();
    for action in [
        Action::SelectConnector(Connector::Or),
        Action::SelectField(age),
        Action::SelectOperator(gt),
        Action::ConfirmValue(ConditionValue::from_raw(Number::I64(30))),
        Action::Complete,
    ] {
        assert!(machine.transition(action).is_applied());
        ui = ui.reduce(UiEvent::StepChanged(machine.state()));
    }
    assert!(!ui.dropdown_open);

    let tokens = machine.tokens();
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        [
            TokenKind::Field,
            TokenKind::Operator,
            TokenKind::Value,
            TokenKind::Connector,
            TokenKind::Field,
            TokenKind::Operator,
            TokenKind::Value,
        ]
    );
    assert_eq!(tokens[5].value, ">");
    assert_eq!(tokens[5].expression_index, Some(1));

    machine
        .edit_expression(1, Edit::Value(ConditionValue::from_raw(Number::I64(40))), &schema)
        .unwrap();
    assert!(machine
        .edit_expression(1, Edit::Value(ConditionValue::text("forty")), &schema)
        .is_err());

    let result = validate_expressions(machine.expressions(), &schema);
    assert!(result.valid);
    assert!(result.warnings.is_empty());

    assert_eq!(
        to_display_string(machine.expressions(), &DisplayOptions::default()),
        "Status = Active OR Age > 40"
    );

    let query = to_query_string(machine.expressions(), Some(&schema));
    assert_eq!(query, "status=active&age=40");
    let back = from_query_string(&query, &schema);
    assert!(back.errors.is_empty());
    // Query strings drop operators and connectors.
    assert_eq!(back.expressions[1].condition.operator.key, "eq");
    assert_eq!(back.expressions[0].connector, Some(Connector::And));
    assert!(back.expressions[1]
        .condition
        .value
        .equivalent(&machine.expressions()[1].condition.value));
}

#[test]
fn resume_after_complete_and_blur_drops_dangling_connector() {
    let schema = schema();
    let mut machine = status_is_active(&schema);
    machine.transition(Action::Complete);
    assert_eq!(machine.state(), StepKind::Idle);

    machine.transition(Action::Focus);
    assert_eq!(machine.state(), StepKind::SelectingField);
    assert_eq!(machine.expressions()[0].connector, Some(Connector::And));

    machine
        .edit_expression(0, Edit::Connector(Connector::Or), &schema)
        .unwrap();
    assert_eq!(machine.expressions()[0].connector, Some(Connector::Or));
    assert_eq!(machine.context().pending_connector, Some(Connector::Or));

    machine.transition(Action::Blur);
    assert_eq!(machine.state(), StepKind::Idle);
    assert_eq!(machine.expressions()[0].connector, None);
}
