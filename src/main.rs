//! Purpose: `columnar-db` CLI entry point.
//! Role: Binary crate root; parses args, installs logging, runs commands, reports errors.
//! Invariants: Commands emit stable stdout formats (human on a TTY, JSON otherwise).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All file access goes through `columnar_db::api`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use columnar_db::api::{
    ConvertOptions, ConvertOutcome, DEFAULT_BATCH_ROWS, Error, ErrorKind, inspect, to_columnar,
    to_csv, to_exit_code,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod info_json;

use info_json::file_summary_json;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing(cli.verbose);
    let color_mode = cli.color;

    let result = command_dispatch::dispatch_command(cli.command);

    result
        .map_err(add_input_hint)
        .map_err(add_corrupt_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "columnar-db",
    version,
    about = "Convert delimited text tables to and from a batched columnar file",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"A table is a schema file (one `name,type` line per column, types int64|string)
plus a data file with one record per row.

Mental model:
  - `to-columnar` packs schema + data into one columnar file
  - `to-csv` unpacks a columnar file back into schema + data
  - `info` describes a columnar file without reading its rows
"#,
    after_help = r#"EXAMPLES
  $ columnar-db to-columnar schema.csv data.csv table.columnar
  $ columnar-db to-csv table.columnar schema_out.csv data_out.csv
  $ columnar-db info table.columnar

LEARN MORE
  $ columnar-db <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,
    #[arg(
        short,
        long,
        global = true,
        help = "Log batch-level progress to stderr (RUST_LOG overrides)"
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(clap::Args, Clone, Debug)]
struct TextArgs {
    #[arg(
        long,
        default_value_t = DEFAULT_BATCH_ROWS,
        help = "Maximum rows per batch"
    )]
    batch_rows: usize,
    #[arg(
        long,
        default_value = ",",
        value_parser = parse_delimiter,
        help = "Field delimiter: one ASCII character, or `tab`"
    )]
    delimiter: u8,
}

impl TextArgs {
    fn options(&self) -> ConvertOptions {
        ConvertOptions::default()
            .with_batch_rows(self.batch_rows)
            .with_delimiter(self.delimiter)
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        name = "to-columnar",
        arg_required_else_help = true,
        about = "Convert a schema file and a data file into a columnar file",
        long_about = r#"Read the schema file, then stream the data file in batches into a columnar file.

Blank records are skipped. Integer fields may carry surrounding whitespace.
On failure the output is left unfinalized and will be rejected by readers."#,
        after_help = r#"EXAMPLES
  $ columnar-db to-columnar schema.csv data.csv table.columnar
  $ columnar-db to-columnar --batch-rows 1024 --delimiter tab schema.tsv data.tsv table.columnar"#
    )]
    ToColumnar {
        #[arg(help = "Schema file (name,type per line)", value_hint = ValueHint::FilePath)]
        schema: PathBuf,
        #[arg(help = "Data file (one record per row)", value_hint = ValueHint::FilePath)]
        data: PathBuf,
        #[arg(help = "Columnar output file", value_hint = ValueHint::FilePath)]
        out: PathBuf,
        #[command(flatten)]
        text: TextArgs,
    },
    #[command(
        name = "to-csv",
        arg_required_else_help = true,
        about = "Convert a columnar file back into a schema file and a data file",
        after_help = r#"EXAMPLES
  $ columnar-db to-csv table.columnar schema_out.csv data_out.csv"#
    )]
    ToCsv {
        #[arg(help = "Columnar input file", value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(help = "Schema output file", value_hint = ValueHint::FilePath)]
        out_schema: PathBuf,
        #[arg(help = "Data output file", value_hint = ValueHint::FilePath)]
        out_data: PathBuf,
        #[command(flatten)]
        text: TextArgs,
    },
    #[command(
        arg_required_else_help = true,
        about = "Describe a columnar file as JSON",
        long_about = r#"Print the header, schema, and per-batch chunk layout of a columnar file.

Only metadata is read; batches are not decoded."#,
        after_help = r#"EXAMPLES
  $ columnar-db info table.columnar"#
    )]
    Info {
        #[arg(help = "Columnar file", value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    #[command(
        about = "Print version info as JSON",
        long_about = r#"Emit version info as JSON (stable, machine-readable)."#,
        after_help = r#"EXAMPLES
  $ columnar-db version"#
    )]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        long_about = r#"Generate shell completion scripts.

Prints a completion script for the given shell to stdout."#,
        after_help = r#"EXAMPLES
  $ columnar-db completion bash > ~/.local/share/bash-completion/completions/columnar-db
  $ columnar-db completion zsh > ~/.zfunc/_columnar-db"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn parse_delimiter(input: &str) -> Result<u8, String> {
    let byte = match input {
        "tab" | "\\t" => b'\t',
        _ => match input.as_bytes() {
            [byte] if byte.is_ascii() => *byte,
            _ => return Err("delimiter must be a single ASCII character or `tab`".to_string()),
        },
    };
    if matches!(byte, b'"' | b'\r' | b'\n') {
        return Err("delimiter cannot be a quote or a line break".to_string());
    }
    Ok(byte)
}

fn add_input_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Syntax => {
            err.with_hint("Check for an unbalanced double quote at or after the reported line.")
        }
        ErrorKind::Schema => err.with_hint(
            "Schema lines look like `name,int64` or `name,string`, one column per line.",
        ),
        ErrorKind::Shape => {
            err.with_hint("Every data record needs exactly one field per schema column.")
        }
        ErrorKind::Type => {
            err.with_hint("int64 fields hold an optional '-' and decimal digits only.")
        }
        _ => err,
    }
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => {
            err.with_hint("Permission denied. Check file permissions or pick another output path.")
        }
        ErrorKind::Busy => {
            err.with_hint("Output is busy (another writer holds the lock). Retry once it finishes.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and disk space."),
        _ => err,
    }
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Corrupt || err.hint().is_some() {
        return err;
    }
    err.with_hint("File is not a complete columnar file. Re-run to-columnar to regenerate it.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Debug, Serialize)]
struct ConversionReceipt {
    batches: u64,
    rows: u64,
    lines: u64,
    outputs: Vec<String>,
}

fn conversion_json(outcome: ConvertOutcome, out: &[&Path]) -> Value {
    let receipt = ConversionReceipt {
        batches: outcome.batches,
        rows: outcome.rows,
        lines: outcome.lines,
        outputs: out.iter().map(|path| path.display().to_string()).collect(),
    };
    serde_json::to_value(receipt).unwrap_or_else(|_| json!({ "error": "json encode failed" }))
}

fn emit_conversion(outcome: ConvertOutcome, out: &[&Path]) {
    if io::stdout().is_terminal() {
        let targets = out
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "Wrote {} rows in {} batches to {targets}.",
            outcome.rows, outcome.batches
        );
    } else {
        emit_json(conversion_json(outcome, out));
    }
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("columnar-db {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "columnar-db",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Syntax => "malformed text record".to_string(),
        ErrorKind::Schema => "invalid schema".to_string(),
        ErrorKind::Shape => "record does not match the schema".to_string(),
        ErrorKind::Type => "field does not match its column type".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Busy => "resource is busy".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(line) = err.line() {
        inner.insert("line".to_string(), json!(line));
    }
    if let Some(column) = err.column() {
        inner.insert("column".to_string(), json!(column));
    }
    if let Some(offset) = err.offset() {
        inner.insert("offset".to_string(), json!(offset));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(line) = err.line() {
        lines.push(format!(
            "{} {line}",
            colorize_label("line:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(column) = err.column() {
        lines.push(format!(
            "{} {column}",
            colorize_label("column:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(offset) = err.offset() {
        lines.push(format!(
            "{} {offset}",
            colorize_label("offset:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `columnar-db --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "columnar-db") else {
        return "Try `columnar-db --help`.".to_string();
    };

    let mut parts = Vec::new();
    for token in tokens.iter().skip(pos + 1) {
        if token.starts_with('-') || token.starts_with('<') || token.starts_with('[') {
            break;
        }
        parts.push(*token);
    }

    if parts.is_empty() {
        return "Try `columnar-db --help`.".to_string();
    }
    format!("Try `columnar-db {} --help`.", parts.join(" "))
}
