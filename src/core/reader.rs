//! Purpose: Open columnar files and materialize batches by random access.
//! Exports: `ColumnarReader`.
//! Role: Validates header and footer once at open, then serves `read_batch` calls.
//! Invariants: A reader only exists for files whose every chunk range ends before the footer.
//! Invariants: `read_batch` never reads another batch and only moves the file cursor.
//! Invariants: One shared cursor; not safe for concurrent `read_batch` without external locking.
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::core::batch::{Batch, Column};
use crate::core::error::{Error, ErrorKind, io_error};
use crate::core::format::{self, BatchMeta, FileHeader, Footer, HEADER_LEN};
use crate::core::schema::Schema;

pub struct ColumnarReader {
    path: PathBuf,
    file: File,
    file_size: u64,
    header: FileHeader,
    footer: Footer,
}

impl ColumnarReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)
            .map_err(|err| io_error(err, &path, "failed to open columnar file"))?;
        let file_size = file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|err| io_error(err, &path, "failed to stat columnar file"))?;

        if file_size < HEADER_LEN as u64 {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!("file is {file_size} bytes, smaller than the header"))
                .with_path(&path));
        }
        let mut header_buf = [0u8; HEADER_LEN];
        read_exact_at(&mut file, &path, 0, &mut header_buf)?;
        let header = FileHeader::decode(&header_buf).map_err(|err| err.with_path(&path))?;

        if header.footer_offset < HEADER_LEN as u64 || header.footer_offset > file_size {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!(
                    "footer offset {} is outside the file ({file_size} bytes)",
                    header.footer_offset
                ))
                .with_path(&path)
                .with_offset(format::FOOTER_OFFSET_POS));
        }
        let footer_len = usize::try_from(file_size - header.footer_offset).map_err(|_| {
            Error::new(ErrorKind::Corrupt)
                .with_message("footer is too large to load")
                .with_path(&path)
        })?;
        let mut footer_buf = vec![0u8; footer_len];
        read_exact_at(&mut file, &path, header.footer_offset, &mut footer_buf)?;
        let footer = Footer::decode(&footer_buf, header.footer_offset)
            .and_then(|footer| footer.validate(header.footer_offset).map(|()| footer))
            .map_err(|err| err.with_path(&path))?;

        debug!(
            path = %path.display(),
            columns = footer.schema.len(),
            batches = footer.batches.len(),
            footer_offset = header.footer_offset,
            "columnar file opened"
        );
        Ok(Self {
            path,
            file,
            file_size,
            header,
            footer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.footer.schema
    }

    pub fn header(&self) -> FileHeader {
        self.header
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    pub fn num_batches(&self) -> usize {
        self.footer.batches.len()
    }

    pub fn batch_meta(&self, index: usize) -> Option<&BatchMeta> {
        self.footer.batches.get(index)
    }

    pub fn total_rows(&self) -> u64 {
        self.footer.total_rows()
    }

    pub fn read_batch(&mut self, index: usize) -> Result<Batch, Error> {
        let Some(meta) = self.footer.batches.get(index) else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "batch index {index} out of range ({} batches)",
                    self.footer.batches.len()
                ))
                .with_path(&self.path));
        };

        let mut columns = Vec::with_capacity(meta.chunks.len());
        let mut buf = Vec::new();
        for (chunk, column) in meta.chunks.iter().zip(self.footer.schema.iter()) {
            let size = usize::try_from(chunk.size).map_err(|_| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("chunk is too large to load")
                    .with_path(&self.path)
                    .with_offset(chunk.offset)
            })?;
            buf.clear();
            buf.resize(size, 0);
            read_exact_at(&mut self.file, &self.path, chunk.offset, &mut buf)?;
            let decoded: Column = format::decode_column(column.data_type, meta.row_count, &buf)
                .map_err(|err| {
                    err.with_path(&self.path)
                        .with_column(column.name.clone())
                        .with_offset(chunk.offset)
                })?;
            columns.push(decoded);
        }

        debug!(batch = index, rows = meta.row_count, "read batch");
        Batch::from_columns(Arc::clone(&self.footer.schema), columns)
    }

    /// Reads every batch in file order.
    pub fn batches(&mut self) -> impl Iterator<Item = Result<Batch, Error>> + '_ {
        (0..self.num_batches()).map(move |index| self.read_batch(index))
    }
}

fn read_exact_at(file: &mut File, path: &Path, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|err| io_error(err, path, "failed to seek columnar file").with_offset(offset))?;
    file.read_exact(buf)
        .map_err(|err| io_error(err, path, "failed to read columnar file").with_offset(offset))
}
