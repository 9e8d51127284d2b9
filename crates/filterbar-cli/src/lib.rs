//! Command implementations for the `filterbar` binary.
//!
//! Each command takes already-read input text and returns an [`Outcome`]:
//! the text to print and whether the run succeeded. `main` owns argument
//! parsing, file access and the exit code.

pub mod commands;
pub mod script;

use std::path::Path;

use anyhow::{bail, Context, Result};
use filterbar::Schema;

pub use commands::{check_schema, convert, replay, validate, InputFormat, OutputFormat};
pub use script::{parse_script, ScriptLine};

/// Text to print plus success flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub output: String,
    pub ok: bool,
}

impl Outcome {
    pub fn ok(output: String) -> Self {
        Outcome { output, ok: true }
    }

    pub fn failed(output: String) -> Self {
        Outcome { output, ok: false }
    }
}

/// Loads a schema file; the format is chosen by extension.
pub fn load_schema(path: &Path) -> Result<Schema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let schema = match ext {
        "yaml" | "yml" => Schema::from_yaml_str(&text),
        "json" => Schema::from_json_str(&text),
        other => bail!("Unsupported schema extension '{}' (expected .yaml, .yml or .json)", other),
    }
    .with_context(|| format!("Failed to parse schema: {}", path.display()))?;
    tracing::debug!(path = %path.display(), fields = schema.fields.len(), "schema loaded");
    Ok(schema)
}
