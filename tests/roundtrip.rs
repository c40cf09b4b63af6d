// Library-level round-trip and rejection tests over real files.
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use bstr::BString;
use columnar_db::api::{
    BatchReader, Column, ColumnarReader, ConvertOptions, ErrorKind, IngestConfig, load_schema,
    to_columnar, to_csv,
};

struct Table {
    _dir: tempfile::TempDir,
    schema: std::path::PathBuf,
    data: std::path::PathBuf,
    out: std::path::PathBuf,
}

fn table(schema: &str, data: &[u8]) -> Table {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema_path = dir.path().join("schema.csv");
    let data_path = dir.path().join("data.csv");
    fs::write(&schema_path, schema).expect("schema");
    fs::write(&data_path, data).expect("data");
    Table {
        schema: schema_path,
        data: data_path,
        out: dir.path().join("table.columnar"),
        _dir: dir,
    }
}

fn export(table: &Table, options: ConvertOptions) -> (String, Vec<u8>) {
    let dir = table.out.parent().expect("parent");
    let schema_out = dir.join("schema_out.csv");
    let data_out = dir.join("data_out.csv");
    to_csv(&table.out, &schema_out, &data_out, options).expect("to csv");
    (
        fs::read_to_string(schema_out).expect("schema out"),
        fs::read(data_out).expect("data out"),
    )
}

fn flatten(path: &Path) -> Vec<Vec<BString>> {
    let mut reader = ColumnarReader::open(path).expect("open");
    let mut rows = Vec::new();
    for batch in reader.batches() {
        let batch = batch.expect("batch");
        for row in 0..batch.row_count() {
            rows.push(batch.text_row(row).expect("row"));
        }
    }
    rows
}

fn patch(path: &Path, offset: usize, bytes: &[u8]) {
    let mut data = fs::read(path).expect("read");
    data[offset..offset + bytes.len()].copy_from_slice(bytes);
    fs::write(path, data).expect("write");
}

fn open_err_kind(path: &Path) -> ErrorKind {
    match ColumnarReader::open(path) {
        Ok(_) => panic!("expected open to fail"),
        Err(err) => err.kind(),
    }
}

const MIXED: &[u8] = b"10,alpha,-3\n20,\"beta, gamma\",0\n30,\"say \"\"hi\"\"\",7\n40,,9\n50,\"two\nlines\",-1\n";

#[test]
fn canonical_input_reexports_byte_identical() {
    let t = table("id,int64\nlabel,string\ndelta,int64\n", MIXED);
    for batch_rows in [1, 2, 3, 5, 64] {
        let options = ConvertOptions::default().with_batch_rows(batch_rows);
        to_columnar(&t.schema, &t.data, &t.out, options).expect("to columnar");
        let (schema, data) = export(&t, options);
        assert_eq!(schema, "id,int64\nlabel,string\ndelta,int64\n");
        assert_eq!(data, MIXED, "batch_rows={batch_rows}");
    }
}

#[test]
fn batch_size_does_not_change_the_table() {
    let mut data = Vec::new();
    for i in 0..250 {
        data.extend_from_slice(format!("{},row {i}\n", i * 7 - 100).as_bytes());
    }
    let t = table("n,int64\ns,string\n", &data);

    to_columnar(&t.schema, &t.data, &t.out, ConvertOptions::default().with_batch_rows(1))
        .expect("capacity 1");
    assert_eq!(ColumnarReader::open(&t.out).expect("open").num_batches(), 250);
    let small = flatten(&t.out);

    to_columnar(&t.schema, &t.data, &t.out, ConvertOptions::default().with_batch_rows(10_000))
        .expect("capacity 10000");
    assert_eq!(ColumnarReader::open(&t.out).expect("open").num_batches(), 1);
    let large = flatten(&t.out);

    assert_eq!(small.len(), 250);
    assert_eq!(small, large);
}

#[test]
fn blank_records_are_skipped() {
    let t = table("a,int64\nb,string\n", b"\n   ,   \n1,ok\n,\n2,yes\n");
    let outcome = to_columnar(&t.schema, &t.data, &t.out, ConvertOptions::default())
        .expect("to columnar");
    assert_eq!(outcome.rows, 2);
    assert_eq!(
        flatten(&t.out),
        vec![
            vec![BString::from("1"), BString::from("ok")],
            vec![BString::from("2"), BString::from("yes")],
        ]
    );
}

#[test]
fn ragged_blank_record_is_skipped_not_rejected() {
    let t = table("a,int64\nb,string\n", b"1,x\n , , ,\n2,y\n");
    let outcome = to_columnar(&t.schema, &t.data, &t.out, ConvertOptions::default())
        .expect("to columnar");
    assert_eq!(outcome.rows, 2);
}

#[test]
fn empty_dataset_has_no_batches() {
    let t = table("a,int64\nb,string\n", b"");
    let outcome = to_columnar(&t.schema, &t.data, &t.out, ConvertOptions::default())
        .expect("to columnar");
    assert_eq!(outcome.batches, 0);
    assert_eq!(ColumnarReader::open(&t.out).expect("open").num_batches(), 0);

    let (schema, data) = export(&t, ConvertOptions::default());
    assert_eq!(schema, "a,int64\nb,string\n");
    assert!(data.is_empty());
}

#[test]
fn quoting_survives_a_cycle() {
    let t = table(
        "s,string\n",
        b"\"has,comma\"\n\"quote:\"\"x\"\"\"\n\"multi\nline\"\n",
    );
    to_columnar(&t.schema, &t.data, &t.out, ConvertOptions::default()).expect("to columnar");
    let mut reader = ColumnarReader::open(&t.out).expect("open");
    let batch = reader.read_batch(0).expect("batch");
    assert_eq!(
        batch.column(0),
        Some(&Column::String(vec![
            BString::from("has,comma"),
            BString::from("quote:\"x\""),
            BString::from("multi\nline"),
        ]))
    );

    let (_, data) = export(&t, ConvertOptions::default());
    assert_eq!(data, fs::read(&t.data).expect("data"));
}

#[test]
fn integer_boundaries_round_trip() {
    let t = table(
        "n,int64\n",
        b"-9223372036854775808\n9223372036854775807\n  42  \n",
    );
    to_columnar(&t.schema, &t.data, &t.out, ConvertOptions::default()).expect("to columnar");
    let mut reader = ColumnarReader::open(&t.out).expect("open");
    let batch = reader.read_batch(0).expect("batch");
    assert_eq!(
        batch.column(0),
        Some(&Column::Int64(vec![i64::MIN, i64::MAX, 42]))
    );

    let (_, data) = export(&t, ConvertOptions::default());
    assert_eq!(data, b"-9223372036854775808\n9223372036854775807\n42\n");
}

#[test]
fn integer_overflow_is_a_type_error() {
    let t = table("n,int64\n", b"1\n9223372036854775808\n");
    let err = to_columnar(&t.schema, &t.data, &t.out, ConvertOptions::default())
        .expect_err("overflow");
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.line(), Some(2));
    assert_eq!(err.column(), Some("n"));
}

#[test]
fn corrupt_files_fail_to_open() {
    let t = table("n,int64\ns,string\n", b"1,a\n2,b\n");
    let options = ConvertOptions::default();

    to_columnar(&t.schema, &t.data, &t.out, options).expect("to columnar");
    patch(&t.out, 0, b"XDB1");
    assert_eq!(open_err_kind(&t.out), ErrorKind::Corrupt);

    to_columnar(&t.schema, &t.data, &t.out, options).expect("to columnar");
    patch(&t.out, 4, &2u32.to_le_bytes());
    assert_eq!(open_err_kind(&t.out), ErrorKind::Corrupt);

    to_columnar(&t.schema, &t.data, &t.out, options).expect("to columnar");
    patch(&t.out, 8, &0u64.to_le_bytes());
    assert_eq!(open_err_kind(&t.out), ErrorKind::Corrupt);

    to_columnar(&t.schema, &t.data, &t.out, options).expect("to columnar");
    let bytes = fs::read(&t.out).expect("read");
    let footer_offset = u64::from_le_bytes(bytes[8..16].try_into().expect("offset"));
    // ncols, ("n", tag), ("s", tag), nbatches, rows, then chunk 0's offset
    let chunk0_pos = footer_offset as usize + 4 + (4 + 1 + 1) * 2 + 4 + 4;
    patch(&t.out, chunk0_pos, &(footer_offset - 8).to_le_bytes());
    assert_eq!(open_err_kind(&t.out), ErrorKind::Corrupt);
}

#[test]
fn schemas_with_duplicates_or_unknown_types_are_rejected() {
    let err = load_schema(Cursor::new("a,int64\na,string\n"), b',').expect_err("duplicate");
    assert_eq!(err.kind(), ErrorKind::Schema);

    let err = load_schema(Cursor::new("a,int32\n"), b',').expect_err("unknown type");
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(err.line(), Some(1));

    let t = table("a,int64\na,int64\n", b"1,2\n");
    let err = to_columnar(&t.schema, &t.data, &t.out, ConvertOptions::default())
        .expect_err("duplicate");
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(err.path(), Some(t.schema.as_path()));
    assert!(!t.out.exists());
}

#[test]
fn batch_reader_streams_from_memory() {
    let schema = Arc::new(load_schema(Cursor::new("n,int64\n"), b',').expect("schema"));
    let config = IngestConfig::default().with_batch_rows(2);
    let reader = BatchReader::new(Cursor::new("1\n2\n3\n"), Arc::clone(&schema), config)
        .expect("reader");
    let sizes = reader
        .map(|batch| batch.expect("batch").row_count())
        .collect::<Vec<_>>();
    assert_eq!(sizes, vec![2, 1]);
}
