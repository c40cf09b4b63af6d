//! Purpose: Define the stable public Rust API boundary for columnar-db.
//! Exports: Conversion operations, file inspection, and the core types they speak in.
//! Role: Public, additive-only surface used by the CLI and library callers.
//! Invariants: The CLI reaches storage only through this module.

mod convert;
mod inspect;

pub use crate::core::batch::{Batch, Column, parse_int64};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::format::{FORMAT_VERSION, MAGIC};
pub use crate::core::ingest::{BatchReader, DEFAULT_BATCH_ROWS, IngestConfig};
pub use crate::core::reader::ColumnarReader;
pub use crate::core::schema::{ColumnSchema, DataType, Schema, load_schema, save_schema};
pub use crate::core::text::{DEFAULT_DELIMITER, RecordReader, RecordWriter};
pub use crate::core::writer::{ColumnarWriter, WriteSummary};
pub use convert::{
    ConvertOptions, ConvertOutcome, export_rows, ingest_into, load_schema_file, to_columnar,
    to_csv,
};
pub use inspect::{BatchSummary, ChunkSummary, ColumnSummary, FileSummary, inspect};
