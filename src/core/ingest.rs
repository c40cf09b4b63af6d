//! Purpose: Stream text records into bounded, schema-typed batches.
//! Exports: `IngestConfig`, `BatchReader`, `DEFAULT_BATCH_ROWS`.
//! Role: Ingestion engine between the text codec and the columnar writer.
//! Invariants: The line counter advances once per record read, blank or not.
//! Invariants: Records whose fields all trim to empty are skipped regardless of arity.
//! Invariants: No batch exceeds `batch_rows`; an exhausted source never yields an empty batch.
use std::io::BufRead;
use std::sync::Arc;

use tracing::trace;

use crate::core::batch::Batch;
use crate::core::error::{Error, ErrorKind};
use crate::core::schema::Schema;
use crate::core::text::{self, DEFAULT_DELIMITER, RecordReader};

pub const DEFAULT_BATCH_ROWS: usize = 1 << 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IngestConfig {
    pub batch_rows: usize,
    pub delimiter: u8,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_rows: DEFAULT_BATCH_ROWS,
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl IngestConfig {
    pub fn with_batch_rows(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.batch_rows == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("batch size must be at least 1 row"));
        }
        if u32::try_from(self.batch_rows).is_err() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("batch size cannot exceed u32::MAX rows"));
        }
        if matches!(self.delimiter, b'"' | b'\r' | b'\n') {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("delimiter cannot be a quote or line break")
                .with_hint("Use a single byte such as ',' ';' or a tab."));
        }
        Ok(())
    }
}

pub struct BatchReader<R> {
    records: RecordReader<R>,
    schema: Arc<Schema>,
    batch_rows: usize,
    line: u64,
    eof: bool,
}

impl<R: BufRead> BatchReader<R> {
    pub fn new(input: R, schema: Arc<Schema>, config: IngestConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            records: RecordReader::with_delimiter(input, config.delimiter),
            schema,
            batch_rows: config.batch_rows,
            line: 0,
            eof: false,
        })
    }

    /// Number of records consumed so far, blank ones included.
    pub fn current_line(&self) -> u64 {
        self.line
    }

    pub fn batch_rows(&self) -> usize {
        self.batch_rows
    }

    pub fn next_batch(&mut self) -> Result<Option<Batch>, Error> {
        if self.eof {
            return Ok(None);
        }

        let reserve = self.batch_rows.min(DEFAULT_BATCH_ROWS);
        let mut batch = Batch::with_capacity(Arc::clone(&self.schema), reserve);
        while batch.row_count() < self.batch_rows {
            let record = self
                .records
                .read_record()
                .map_err(|err| err.with_line(self.line + 1))?;
            let Some(record) = record else {
                self.eof = true;
                break;
            };
            self.line += 1;

            if text::is_blank_record(&record) {
                trace!(line = self.line, "skipping blank record");
                continue;
            }
            batch.append_row(&record, self.line)?;
        }

        if batch.is_empty() && self.eof {
            return Ok(None);
        }
        Ok(Some(batch))
    }
}

impl<R: BufRead> Iterator for BatchReader<R> {
    type Item = Result<Batch, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}
