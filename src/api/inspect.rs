//! Purpose: Describe a columnar file without materializing any batch.
//! Exports: `FileSummary`, `ColumnSummary`, `BatchSummary`, `ChunkSummary`, `inspect`.
//! Role: Read-only metadata view for `info` and for library callers.
//! Invariants: Only files that pass the reader's open-time validation are summarized.

use std::path::{Path, PathBuf};

use crate::core::error::Error;
use crate::core::reader::ColumnarReader;
use crate::core::schema::DataType;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkSummary {
    pub offset: u64,
    pub size: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchSummary {
    pub row_count: u32,
    pub chunks: Vec<ChunkSummary>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileSummary {
    pub path: PathBuf,
    pub format_version: u32,
    pub footer_offset: u64,
    pub file_size: u64,
    pub columns: Vec<ColumnSummary>,
    pub batches: Vec<BatchSummary>,
    pub total_rows: u64,
}

pub fn inspect(path: impl AsRef<Path>) -> Result<FileSummary, Error> {
    let reader = ColumnarReader::open(path)?;
    Ok(summarize(&reader))
}

pub(crate) fn summarize(reader: &ColumnarReader) -> FileSummary {
    let header = reader.header();
    let columns = reader
        .schema()
        .iter()
        .map(|column| ColumnSummary {
            name: column.name.clone(),
            data_type: column.data_type,
        })
        .collect();
    let batches = reader
        .footer()
        .batches
        .iter()
        .map(|meta| BatchSummary {
            row_count: meta.row_count,
            chunks: meta
                .chunks
                .iter()
                .map(|chunk| ChunkSummary {
                    offset: chunk.offset,
                    size: chunk.size,
                })
                .collect(),
        })
        .collect();
    FileSummary {
        path: reader.path().to_path_buf(),
        format_version: header.version,
        footer_offset: header.footer_offset,
        file_size: reader.file_size(),
        columns,
        batches,
        total_rows: reader.total_rows(),
    }
}
