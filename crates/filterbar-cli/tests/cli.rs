//! Command tests against schema files on disk.

use std::io::Write;

use filterbar_cli::{check_schema, convert, load_schema, replay, validate, InputFormat, OutputFormat};
use tempfile::NamedTempFile;

const SCHEMA_YAML: &str = r#"
operators:
  matches:
    label: matches
    symbol: "~"
fields:
  - key: status
    label: Status
    type: enum
    options:
      - { value: active, label: Active }
      - { value: archived, label: Archived }
  - key: name
    label: Name
    operators: [contains, matches, is_empty]
  - key: age
    label: Age
    type: number
"#;

fn schema_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_yaml_schema_with_custom_operator() {
    let file = schema_file(".yaml", SCHEMA_YAML);
    let schema = load_schema(file.path()).unwrap();
    assert_eq!(schema.fields.len(), 3);
    let name = schema.field("name").unwrap();
    assert_eq!(name.operator_by_key("matches").unwrap().short_text(), "~");
    assert!(check_schema(&schema).ok);
}

#[test]
fn loads_json_schema() {
    let file = schema_file(
        ".json",
        r#"{"fields": [{"key": "id", "label": "ID", "type": "id"}]}"#,
    );
    let schema = load_schema(file.path()).unwrap();
    assert!(schema.field("id").unwrap().allows_operator("in"));
}

#[test]
fn rejects_unknown_extension_and_bad_operator() {
    let file = schema_file(".toml", "fields = []");
    let err = load_schema(file.path()).unwrap_err();
    assert!(err.to_string().contains("Unsupported schema extension"));

    let file = schema_file(
        ".yaml",
        "fields:\n  - key: x\n    label: X\n    operators: [nope]\n",
    );
    let err = load_schema(file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("undeclared operator 'nope'"));
}

#[test]
fn validate_convert_and_replay_share_a_schema() {
    let file = schema_file(".yml", SCHEMA_YAML);
    let schema = load_schema(file.path()).unwrap();

    let filter = r#"[
        {"field": "status", "operator": "eq", "value": "active", "connector": "OR"},
        {"field": "name", "operator": "matches", "value": "^bo"}
    ]"#;
    let outcome = validate(filter, InputFormat::Json, &schema, false).unwrap();
    assert!(outcome.ok, "{}", outcome.output);

    let outcome = convert(filter, InputFormat::Json, OutputFormat::Display, &schema).unwrap();
    assert_eq!(outcome.output, "Status = Active OR Name ~ ^bo");

    let outcome = convert(filter, InputFormat::Json, OutputFormat::Query, &schema).unwrap();
    assert_eq!(outcome.output, "status=active&name=%5Ebo");

    let outcome = replay("focus\nfield name\nop is_empty\nvalue\ncomplete\n", &schema).unwrap();
    assert!(outcome.ok, "{}", outcome.output);
    assert!(outcome.output.contains(r#"json: [{"field":"name","operator":"is_empty","value":""}]"#));
}
