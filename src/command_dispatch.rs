//! Purpose: Hold top-level CLI command dispatch for `columnar-db`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Each command maps to exactly one `columnar_db::api` operation.

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "columnar-db", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::ToColumnar {
            schema,
            data,
            out,
            text,
        } => {
            let outcome = to_columnar(&schema, &data, &out, text.options())?;
            emit_conversion(outcome, &[out.as_path()]);
            Ok(RunOutcome::ok())
        }
        Command::ToCsv {
            input,
            out_schema,
            out_data,
            text,
        } => {
            let outcome = to_csv(&input, &out_schema, &out_data, text.options())?;
            emit_conversion(outcome, &[out_schema.as_path(), out_data.as_path()]);
            Ok(RunOutcome::ok())
        }
        Command::Info { file } => {
            let summary = inspect(&file)?;
            emit_json(file_summary_json(&summary));
            Ok(RunOutcome::ok())
        }
    }
}
