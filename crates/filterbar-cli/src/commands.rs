//! `validate`, `convert`, `replay` and `check-schema`.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use clap::ValueEnum;
use filterbar::{
    from_json, from_query_string, parse_value, to_display_string, to_json, to_query_string,
    validate_expressions, validate_schema, Action, ConditionValue, Deserialized, DisplayOptions,
    FilterExpression, OperatorDescriptor, Schema, SerializeOptions, StateMachine, Transition,
    ValidationResult,
};

use crate::script::{parse_script, ScriptLine};
use crate::Outcome;

/// Encoding of a filter read from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Json,
    Query,
}

/// Encoding of a filter written to output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Query,
    Display,
}

/// Decodes a filter and validates it against the schema.
pub fn validate(input: &str, format: InputFormat, schema: &Schema, json: bool) -> Result<Outcome> {
    let decoded = decode(input, format, schema)?;
    let result = validate_expressions(&decoded.expressions, schema);
    let ok = decoded.is_complete() && result.valid;

    let output = if json {
        let entries: Vec<_> = decoded
            .errors
            .iter()
            .map(|e| serde_json::json!({ "index": e.index, "message": e.error.to_string() }))
            .collect();
        let mut doc = serde_json::to_value(&result).context("Failed to encode validation result")?;
        doc["decode_errors"] = serde_json::Value::Array(entries);
        serde_json::to_string_pretty(&doc)?
    } else {
        render_report(&decoded, &result)
    };
    Ok(if ok { Outcome::ok(output) } else { Outcome::failed(output) })
}

/// Re-encodes a filter. Entries that fail to decode are reported on stderr
/// by the caller's log output and dropped.
pub fn convert(input: &str, from: InputFormat, to: OutputFormat, schema: &Schema) -> Result<Outcome> {
    let decoded = decode(input, from, schema)?;
    let output = encode(&decoded.expressions, to, schema)?;
    Ok(if decoded.is_complete() {
        Outcome::ok(output)
    } else {
        Outcome::failed(output)
    })
}

/// Reports structural problems in the schema itself.
pub fn check_schema(schema: &Schema) -> Outcome {
    let result = validate_schema(schema);
    let mut out = String::new();
    for error in &result.errors {
        let _ = writeln!(out, "error: {}", error.message);
    }
    for warning in &result.warnings {
        let _ = writeln!(out, "warning: {}", warning.message);
    }
    if result.valid {
        let _ = writeln!(out, "schema ok: {} fields", schema.fields.len());
        Outcome::ok(out)
    } else {
        Outcome::failed(out)
    }
}

/// Feeds a script of actions to a fresh machine and prints each outcome,
/// then the resulting tokens and JSON.
pub fn replay(script: &str, schema: &Schema) -> Result<Outcome> {
    let lines = parse_script(script)?;
    let mut machine = StateMachine::new();
    let mut out = String::new();
    let mut ok = true;

    for (number, line) in lines {
        let action = match resolve(&line, &machine, schema) {
            Ok(action) => action,
            Err(message) => {
                ok = false;
                let _ = writeln!(out, "{:>3}  error: {}", number, message);
                continue;
            }
        };
        let kind = action.kind();
        match machine.transition(action) {
            Transition::Applied => {
                let _ = writeln!(out, "{:>3}  {:<16} -> {}", number, kind.as_str(), machine.state());
            }
            Transition::Ignored(reason) => {
                let _ = writeln!(out, "{:>3}  {:<16} ignored: {}", number, kind.as_str(), reason);
            }
        }
    }

    let tokens: Vec<String> = machine
        .tokens()
        .into_iter()
        .filter(|t| !t.value.is_empty())
        .map(|t| if t.is_pending { format!("[{}]", t.value) } else { t.value })
        .collect();
    let _ = writeln!(out, "tokens: {}", tokens.join(" "));
    let json = to_json(machine.expressions(), Some(schema), &SerializeOptions::default())?;
    let _ = writeln!(out, "json: {}", json);
    Ok(Outcome { output: out, ok })
}

fn resolve(line: &ScriptLine, machine: &StateMachine, schema: &Schema) -> Result<Action, String> {
    let ctx = machine.context();
    let current = ctx.current_field;
    let action = match line {
        ScriptLine::Focus => Action::Focus,
        ScriptLine::Field(key) => match schema.field(key) {
            Some(field) => Action::SelectField(field.clone()),
            None => return Err(format!("unknown field '{}'", key)),
        },
        ScriptLine::Operator(key) => match current {
            Some(field) => match field.operator_by_key(key) {
                Some(op) => Action::SelectOperator(op.clone()),
                None => return Err(format!("'{}' does not allow operator '{}'", field.key, key)),
            },
            // No field selected: let the machine report the action as illegal.
            None => match OperatorDescriptor::builtin(key) {
                Some(op) => Action::SelectOperator(op),
                None => return Err(format!("unknown operator '{}'", key)),
            },
        },
        ScriptLine::Value(text) => match current {
            Some(field) => Action::ConfirmValue(
                parse_value(field, ctx.current_operator, text).map_err(|e| e.to_string())?,
            ),
            None => Action::ConfirmValue(ConditionValue::text(text.as_str())),
        },
        ScriptLine::Connector(connector) => Action::SelectConnector(*connector),
        ScriptLine::Complete => Action::Complete,
        ScriptLine::Blur => Action::Blur,
        ScriptLine::Clear => Action::Clear,
        ScriptLine::Reset => Action::Reset,
        ScriptLine::Delete => Action::DeleteLast,
    };
    Ok(action)
}

fn decode(input: &str, format: InputFormat, schema: &Schema) -> Result<Deserialized> {
    let decoded = match format {
        InputFormat::Json => from_json(input, schema).context("Failed to parse filter JSON")?,
        InputFormat::Query => from_query_string(input.trim(), schema),
    };
    tracing::debug!(
        expressions = decoded.expressions.len(),
        skipped = decoded.errors.len(),
        "filter decoded"
    );
    Ok(decoded)
}

fn encode(expressions: &[FilterExpression], format: OutputFormat, schema: &Schema) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => to_json(expressions, Some(schema), &SerializeOptions::default())?,
        OutputFormat::Query => to_query_string(expressions, Some(schema)),
        OutputFormat::Display => to_display_string(expressions, &DisplayOptions::default()),
    })
}

fn render_report(decoded: &Deserialized, result: &ValidationResult) -> String {
    let mut out = String::new();
    for entry in &decoded.errors {
        let _ = writeln!(out, "entry {}: skipped: {}", entry.index, entry.error);
    }
    for error in &result.errors {
        let _ = writeln!(out, "error: {}", error);
    }
    for warning in &result.warnings {
        let _ = writeln!(out, "warning: {}", warning.message);
    }
    let status = if decoded.is_complete() && result.valid { "valid" } else { "invalid" };
    let _ = writeln!(out, "{} expressions, {}", decoded.expressions.len(), status);
    out
}
