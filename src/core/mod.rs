// Core modules implementing the text codec, batches, and the columnar file format.
pub mod batch;
pub mod error;
pub mod format;
pub mod ingest;
pub mod lock;
pub mod reader;
pub mod schema;
pub mod text;
pub mod writer;
