//! Purpose: CSV <-> columnar conversion operations exposed to the CLI and library users.
//! Exports: `ConvertOptions`, `ConvertOutcome`, `to_columnar`, `to_csv`, and stream-level helpers.
//! Role: Wires schema loading, ingestion, the writer, the reader, and CSV export together.
//! Invariants: Every error names the path it came from.
//! Invariants: A failed `to_columnar` leaves the output unfinalized; partial outputs are not removed.
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::core::error::{Error, io_error};
use crate::core::ingest::{BatchReader, DEFAULT_BATCH_ROWS, IngestConfig};
use crate::core::reader::ColumnarReader;
use crate::core::schema::{self, Schema};
use crate::core::text::{DEFAULT_DELIMITER, RecordWriter};
use crate::core::writer::ColumnarWriter;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConvertOptions {
    pub batch_rows: usize,
    pub delimiter: u8,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            batch_rows: DEFAULT_BATCH_ROWS,
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl ConvertOptions {
    pub fn with_batch_rows(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig::default()
            .with_batch_rows(self.batch_rows)
            .with_delimiter(self.delimiter)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ConvertOutcome {
    pub batches: u64,
    pub rows: u64,
    /// Text records consumed from the data input; zero for exports.
    pub lines: u64,
}

/// Converts a schema file plus a data file into a columnar file.
pub fn to_columnar(
    schema_path: impl AsRef<Path>,
    data_path: impl AsRef<Path>,
    out_path: impl AsRef<Path>,
    options: ConvertOptions,
) -> Result<ConvertOutcome, Error> {
    let (schema_path, data_path, out_path) =
        (schema_path.as_ref(), data_path.as_ref(), out_path.as_ref());
    options.ingest_config().validate()?;

    let schema = load_schema_file(schema_path, options.delimiter)?;
    let data = open_input(data_path, "failed to open data file")?;
    let writer = ColumnarWriter::create(out_path, Arc::clone(&schema))?;

    let outcome = ingest_into(data, writer, options).map_err(|err| err.or_path(data_path))?;
    info!(
        schema = %schema_path.display(),
        data = %data_path.display(),
        out = %out_path.display(),
        batches = outcome.batches,
        rows = outcome.rows,
        "converted csv to columnar"
    );
    Ok(outcome)
}

/// Streams text records from `data` into `writer`, finishing it on success.
pub fn ingest_into<R: Read>(
    data: R,
    mut writer: ColumnarWriter,
    options: ConvertOptions,
) -> Result<ConvertOutcome, Error> {
    let schema = Arc::clone(writer.schema());
    let mut batches = match BatchReader::new(BufReader::new(data), schema, options.ingest_config())
    {
        Ok(batches) => batches,
        Err(err) => {
            writer.abandon();
            return Err(err);
        }
    };

    let mut outcome = ConvertOutcome::default();
    loop {
        let batch = match batches.next_batch() {
            Ok(Some(batch)) => batch,
            Ok(None) => break,
            Err(err) => {
                writer.abandon();
                return Err(err);
            }
        };
        if let Err(err) = writer.write_batch(&batch) {
            writer.abandon();
            return Err(err);
        }
        outcome.batches += 1;
        outcome.rows += batch.row_count() as u64;
    }
    writer.finish()?;
    outcome.lines = batches.current_line();
    Ok(outcome)
}

/// Converts a columnar file back into a schema file and a data file.
pub fn to_csv(
    in_path: impl AsRef<Path>,
    out_schema_path: impl AsRef<Path>,
    out_data_path: impl AsRef<Path>,
    options: ConvertOptions,
) -> Result<ConvertOutcome, Error> {
    let (in_path, out_schema_path, out_data_path) = (
        in_path.as_ref(),
        out_schema_path.as_ref(),
        out_data_path.as_ref(),
    );
    options.ingest_config().validate()?;

    let mut reader = ColumnarReader::open(in_path)?;

    let schema_out = create_output(out_schema_path, "failed to create schema output")?;
    schema::save_schema(BufWriter::new(schema_out), reader.schema(), options.delimiter)
        .map_err(|err| err.or_path(out_schema_path))?;

    let data_out = create_output(out_data_path, "failed to create data output")?;
    let outcome = export_rows(&mut reader, data_out, options.delimiter)
        .map_err(|err| err.or_path(out_data_path))?;
    info!(
        input = %in_path.display(),
        schema = %out_schema_path.display(),
        data = %out_data_path.display(),
        batches = outcome.batches,
        rows = outcome.rows,
        "converted columnar to csv"
    );
    Ok(outcome)
}

/// Writes every row of every batch as one text record, in file order.
pub fn export_rows<W: Write>(
    reader: &mut ColumnarReader,
    out: W,
    delimiter: u8,
) -> Result<ConvertOutcome, Error> {
    let mut records = RecordWriter::with_delimiter(BufWriter::new(out), delimiter);
    let mut outcome = ConvertOutcome::default();
    for index in 0..reader.num_batches() {
        let batch = reader.read_batch(index)?;
        for row in 0..batch.row_count() {
            if let Some(fields) = batch.text_row(row) {
                records.write_record(&fields)?;
            }
        }
        outcome.batches += 1;
        outcome.rows += batch.row_count() as u64;
    }
    records.flush()?;
    Ok(outcome)
}

pub fn load_schema_file(path: &Path, delimiter: u8) -> Result<Arc<Schema>, Error> {
    let input = open_input(path, "failed to open schema file")?;
    let schema =
        schema::load_schema(BufReader::new(input), delimiter).map_err(|err| err.or_path(path))?;
    Ok(Arc::new(schema))
}

fn open_input(path: &Path, message: &str) -> Result<File, Error> {
    File::open(path).map_err(|err| io_error(err, path, message))
}

fn create_output(path: &Path, message: &str) -> Result<File, Error> {
    File::create(path).map_err(|err| io_error(err, path, message))
}
