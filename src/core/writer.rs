//! Purpose: Serialize batches into a columnar file and commit its footer.
//! Exports: `ColumnarWriter`, `WriteSummary`.
//! Role: Owns the output handle from header placeholder through footer patch.
//! Invariants: The header's footer offset stays zero until `finish` succeeds.
//! Invariants: Batches are rejected once the footer has been written.
//! Invariants: Dropping an unfinished, unpoisoned writer finalizes it; a poisoned or
//! abandoned writer leaves the file unfinalized. Any rejected batch poisons the writer.
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::batch::Batch;
use crate::core::error::{Error, ErrorKind, io_error};
use crate::core::format::{self, BatchMeta, ChunkMeta, FOOTER_OFFSET_POS, FileHeader};
use crate::core::lock;
use crate::core::schema::Schema;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WriteSummary {
    pub batches: u64,
    pub rows: u64,
    pub footer_offset: u64,
    pub file_size: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Open,
    Finished,
    Poisoned,
}

pub struct ColumnarWriter {
    path: PathBuf,
    out: BufWriter<File>,
    schema: Arc<Schema>,
    batches: Vec<BatchMeta>,
    position: u64,
    state: State,
    summary: WriteSummary,
}

impl ColumnarWriter {
    pub fn create(path: impl AsRef<Path>, schema: Arc<Schema>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|err| io_error(err, &path, "failed to open output for writing"))?;
        lock::try_lock_exclusive(&file, &path)?;
        file.set_len(0)
            .map_err(|err| io_error(err, &path, "failed to truncate output"))?;

        let mut writer = Self {
            path,
            out: BufWriter::new(file),
            schema,
            batches: Vec::new(),
            position: 0,
            state: State::Open,
            summary: WriteSummary::default(),
        };
        writer.put(&FileHeader::new(0).encode())?;
        debug!(
            path = %writer.path.display(),
            columns = writer.schema.len(),
            "columnar writer opened"
        );
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    pub fn write_batch(&mut self, batch: &Batch) -> Result<(), Error> {
        match self.state {
            State::Open => {}
            State::Finished => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("cannot write a batch after the file was finished")
                    .with_path(&self.path));
            }
            State::Poisoned => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("cannot write a batch after an earlier write failed")
                    .with_path(&self.path));
            }
        }
        if !Arc::ptr_eq(batch.schema(), &self.schema) && **batch.schema() != *self.schema {
            self.state = State::Poisoned;
            return Err(Error::new(ErrorKind::Usage)
                .with_message("batch schema does not match the file schema")
                .with_path(&self.path));
        }
        let Ok(row_count) = u32::try_from(batch.row_count()) else {
            self.state = State::Poisoned;
            return Err(Error::new(ErrorKind::Usage)
                .with_message("batch exceeds u32::MAX rows")
                .with_path(&self.path));
        };

        self.put(&row_count.to_le_bytes())?;
        let mut chunks = Vec::with_capacity(batch.column_count());
        for column in batch.columns() {
            let offset = self.position;
            let size = match format::write_column(&mut self.out, column) {
                Ok(size) => size,
                Err(err) => {
                    self.state = State::Poisoned;
                    return Err(io_error(err, &self.path, "failed to write column chunk")
                        .with_offset(offset));
                }
            };
            self.position += size;
            chunks.push(ChunkMeta { offset, size });
        }

        debug!(
            batch = self.batches.len(),
            rows = row_count,
            end = self.position,
            "wrote batch"
        );
        self.batches.push(BatchMeta { row_count, chunks });
        self.summary.batches += 1;
        self.summary.rows += u64::from(row_count);
        Ok(())
    }

    /// Writes the footer and patches its offset into the header.
    pub fn finish(&mut self) -> Result<WriteSummary, Error> {
        match self.state {
            State::Open => {}
            State::Finished => return Ok(self.summary),
            State::Poisoned => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("cannot finish a file after an earlier write failed")
                    .with_path(&self.path));
            }
        }

        self.flush()?;
        let footer_offset = self.position;
        let encoded = match format::encode_footer(&self.schema, &self.batches) {
            Ok(encoded) => encoded,
            Err(err) => {
                self.state = State::Poisoned;
                return Err(err.with_path(&self.path));
            }
        };
        self.put(&encoded)?;
        self.flush()?;
        let file_size = self.position;

        self.patch_footer_offset(footer_offset)?;
        self.flush()?;

        self.state = State::Finished;
        self.summary.footer_offset = footer_offset;
        self.summary.file_size = file_size;
        debug!(
            path = %self.path.display(),
            batches = self.summary.batches,
            rows = self.summary.rows,
            footer_offset,
            "columnar file finished"
        );
        Ok(self.summary)
    }

    /// Leaves the file unfinalized; readers will reject it.
    pub fn abandon(mut self) {
        self.state = State::Poisoned;
    }

    fn patch_footer_offset(&mut self, footer_offset: u64) -> Result<(), Error> {
        let result = self
            .out
            .seek(SeekFrom::Start(FOOTER_OFFSET_POS))
            .and_then(|_| self.out.write_all(&footer_offset.to_le_bytes()))
            .and_then(|_| self.out.seek(SeekFrom::Start(self.position)).map(|_| ()));
        result.map_err(|err| {
            self.state = State::Poisoned;
            io_error(err, &self.path, "failed to patch footer offset")
                .with_offset(FOOTER_OFFSET_POS)
        })
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if let Err(err) = self.out.write_all(bytes) {
            self.state = State::Poisoned;
            return Err(
                io_error(err, &self.path, "failed to write output").with_offset(self.position)
            );
        }
        self.position += bytes.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.out.flush().map_err(|err| {
            self.state = State::Poisoned;
            io_error(err, &self.path, "failed to flush output")
        })
    }
}

impl Drop for ColumnarWriter {
    fn drop(&mut self) {
        if self.state != State::Open {
            return;
        }
        if let Err(err) = self.finish() {
            warn!(error = %err, "failed to finish columnar file on drop");
        }
    }
}
