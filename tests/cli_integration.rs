// CLI integration tests for conversion, info, and error envelopes.
use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_columnar-db");
    let mut command = Command::new(exe);
    command.env_remove("RUST_LOG");
    command
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn parse_json_line(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    parse_json(line)
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

#[test]
fn to_columnar_info_to_csv_flow() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = temp.path().join("schema.csv");
    let data = temp.path().join("data.csv");
    let table = temp.path().join("table.columnar");
    let schema_out = temp.path().join("schema_out.csv");
    let data_out = temp.path().join("data_out.csv");
    fs::write(&schema, "id,int64\nname,string\n").expect("schema");
    fs::write(&data, "1,alice\n2,\"bob, jr\"\n\n3,carol\n").expect("data");

    let convert = cmd()
        .args([
            "to-columnar",
            "--batch-rows",
            "2",
            arg(&schema),
            arg(&data),
            arg(&table),
        ])
        .output()
        .expect("to-columnar");
    assert!(convert.status.success(), "{}", String::from_utf8_lossy(&convert.stderr));
    let receipt = parse_json(std::str::from_utf8(&convert.stdout).expect("utf8"));
    assert_eq!(receipt["rows"], 3);
    assert_eq!(receipt["batches"], 2);
    assert_eq!(receipt["lines"], 4);

    let info = cmd().args(["info", arg(&table)]).output().expect("info");
    assert!(info.status.success());
    let info_json = parse_json(std::str::from_utf8(&info.stdout).expect("utf8"));
    assert_eq!(info_json["format_version"], 1);
    assert_eq!(info_json["total_rows"], 3);
    assert_eq!(info_json["columns"][0]["name"], "id");
    assert_eq!(info_json["columns"][0]["type"], "int64");
    assert_eq!(info_json["columns"][1]["type"], "string");
    assert_eq!(info_json["batches"].as_array().expect("batches").len(), 2);
    assert_eq!(info_json["batches"][1]["rows"], 1);

    let back = cmd()
        .args(["to-csv", arg(&table), arg(&schema_out), arg(&data_out)])
        .output()
        .expect("to-csv");
    assert!(back.status.success());
    let receipt = parse_json(std::str::from_utf8(&back.stdout).expect("utf8"));
    assert_eq!(receipt["rows"], 3);
    assert_eq!(receipt["lines"], 0);

    assert_eq!(
        fs::read_to_string(&schema_out).expect("schema out"),
        "id,int64\nname,string\n"
    );
    assert_eq!(
        fs::read_to_string(&data_out).expect("data out"),
        "1,alice\n2,\"bob, jr\"\n3,carol\n"
    );
}

#[test]
fn custom_delimiter_applies_to_both_directions() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = temp.path().join("schema.tsv");
    let data = temp.path().join("data.tsv");
    let table = temp.path().join("table.columnar");
    let schema_out = temp.path().join("schema_out.tsv");
    let data_out = temp.path().join("data_out.tsv");
    fs::write(&schema, "id\tint64\nnote\tstring\n").expect("schema");
    fs::write(&data, "7\thas,comma\n").expect("data");

    let convert = cmd()
        .args([
            "to-columnar",
            "--delimiter",
            "tab",
            arg(&schema),
            arg(&data),
            arg(&table),
        ])
        .output()
        .expect("to-columnar");
    assert!(convert.status.success());

    let back = cmd()
        .args([
            "to-csv",
            "--delimiter",
            "tab",
            arg(&table),
            arg(&schema_out),
            arg(&data_out),
        ])
        .output()
        .expect("to-csv");
    assert!(back.status.success());
    assert_eq!(
        fs::read_to_string(&data_out).expect("data out"),
        "7\thas,comma\n"
    );
}

#[test]
fn type_error_reports_line_and_column() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = temp.path().join("schema.csv");
    let data = temp.path().join("data.csv");
    let table = temp.path().join("table.columnar");
    fs::write(&schema, "id,int64\n").expect("schema");
    fs::write(&data, "1\n2\n3x\n").expect("data");

    let output = cmd()
        .args(["to-columnar", arg(&schema), arg(&data), arg(&table)])
        .output()
        .expect("to-columnar");
    assert_eq!(output.status.code(), Some(6));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "Type");
    assert_eq!(err["error"]["line"], 3);
    assert_eq!(err["error"]["column"], "id");
    assert_eq!(err["error"]["path"], arg(&data));
    assert!(err["error"]["hint"].is_string());
    assert!(output.stdout.is_empty());

    let info = cmd().args(["info", arg(&table)]).output().expect("info");
    assert_eq!(info.status.code(), Some(10));
    let err = parse_json_line(&info.stderr);
    assert_eq!(err["error"]["kind"], "Corrupt");
}

#[test]
fn schema_and_shape_errors_have_distinct_exit_codes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = temp.path().join("schema.csv");
    let data = temp.path().join("data.csv");
    let table = temp.path().join("table.columnar");

    fs::write(&schema, "id,float\n").expect("schema");
    fs::write(&data, "1\n").expect("data");
    let output = cmd()
        .args(["to-columnar", arg(&schema), arg(&data), arg(&table)])
        .output()
        .expect("to-columnar");
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(parse_json_line(&output.stderr)["error"]["kind"], "Schema");

    fs::write(&schema, "id,int64\nname,string\n").expect("schema");
    fs::write(&data, "1,a\n2\n").expect("data");
    let output = cmd()
        .args(["to-columnar", arg(&schema), arg(&data), arg(&table)])
        .output()
        .expect("to-columnar");
    assert_eq!(output.status.code(), Some(5));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "Shape");
    assert_eq!(err["error"]["line"], 2);
}

#[test]
fn missing_input_is_io_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let missing = temp.path().join("missing.columnar");
    let output = cmd()
        .args([
            "to-csv",
            arg(&missing),
            arg(&temp.path().join("s.csv")),
            arg(&temp.path().join("d.csv")),
        ])
        .output()
        .expect("to-csv");
    assert_eq!(output.status.code(), Some(7));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "Io");
    assert_eq!(err["error"]["path"], arg(&missing));
    assert!(err["error"]["causes"].is_array());
}

#[test]
fn usage_exit_code() {
    let output = cmd()
        .args(["to-columnar", "only-one-arg"])
        .output()
        .expect("to-columnar");
    assert_eq!(output.status.code(), Some(2));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "Usage");

    let output = cmd()
        .args(["to-columnar", "--batch-rows", "0", "s.csv", "d.csv", "o.columnar"])
        .output()
        .expect("to-columnar");
    assert_eq!(output.status.code(), Some(2));

    let output = cmd()
        .args(["to-columnar", "--delimiter", "\"", "s.csv", "d.csv", "o.columnar"])
        .output()
        .expect("to-columnar");
    assert_eq!(output.status.code(), Some(2));

    let output = cmd().arg("---help").output().expect("triple dash");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn version_emits_json() {
    let output = cmd().arg("version").output().expect("version");
    assert!(output.status.success());
    let value = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(value["name"], "columnar-db");
    assert!(value["version"].is_string());
}

#[test]
fn completion_prints_script() {
    let output = cmd().args(["completion", "bash"]).output().expect("completion");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("columnar-db"));
}
