//! Purpose: Library crate backing the `columnar-db` CLI and tests.
//! Exports: `api` (stable conversion surface) and `core` (codec, batches, file format).
//! Role: CSV <-> columnar conversion engine; the binary only parses args and reports errors.
//! Invariants: All fallible operations return `core::error::Error` with path/line/offset context.
//! Invariants: Everything is single-threaded and synchronous.
pub mod api;
pub mod core;
