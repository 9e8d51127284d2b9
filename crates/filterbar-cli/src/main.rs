use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filterbar_cli::{check_schema, convert, load_schema, replay, validate, InputFormat, Outcome, OutputFormat};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "filterbar", version)]
#[command(about = "Validate, convert and replay filter expressions against a schema", long_about = None)]
struct Cli {
    /// Schema file (.yaml, .yml or .json)
    #[arg(long, short)]
    schema: PathBuf,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a filter and validate it
    Validate {
        /// Filter file
        input: PathBuf,

        /// Input encoding
        #[arg(long, value_enum, default_value = "json")]
        from: InputFormat,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-encode a filter
    Convert {
        /// Filter file
        input: PathBuf,

        #[arg(long, value_enum, default_value = "json")]
        from: InputFormat,

        #[arg(long, value_enum, default_value = "display")]
        to: OutputFormat,
    },
    /// Run a script of actions through the state machine
    Replay {
        /// Script file, one action per line
        script: PathBuf,
    },
    /// Check the schema for structural problems
    CheckSchema,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let schema = load_schema(&cli.schema)?;
    let outcome = match cli.command {
        Commands::Validate { input, from, json } => validate(&read(&input)?, from, &schema, json)?,
        Commands::Convert { input, from, to } => convert(&read(&input)?, from, to, &schema)?,
        Commands::Replay { script } => replay(&read(&script)?, &schema)?,
        Commands::CheckSchema => check_schema(&schema),
    };
    Ok(finish(outcome))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn finish(outcome: Outcome) -> ExitCode {
    print!("{}", outcome.output);
    if !outcome.output.ends_with('\n') {
        println!();
    }
    if outcome.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
