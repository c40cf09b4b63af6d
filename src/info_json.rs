//! Purpose: JSON serializer for columnar file summaries printed by `info`.
//! Exports: `file_summary_json`.
//! Role: Keep the `info` envelope shape in one place.
//! Invariants: Stable key names; batches list chunks in schema column order.

use columnar_db::api::{BatchSummary, FileSummary};
use serde_json::{Map, Value, json};

pub(crate) fn file_summary_json(summary: &FileSummary) -> Value {
    let mut map = Map::new();
    map.insert("path".to_string(), json!(summary.path.display().to_string()));
    map.insert("format_version".to_string(), json!(summary.format_version));
    map.insert("file_size".to_string(), json!(summary.file_size));
    map.insert("footer_offset".to_string(), json!(summary.footer_offset));
    map.insert("total_rows".to_string(), json!(summary.total_rows));
    let columns = summary
        .columns
        .iter()
        .map(|column| json!({ "name": column.name, "type": column.data_type.as_str() }))
        .collect::<Vec<_>>();
    map.insert("columns".to_string(), Value::Array(columns));
    let batches = summary.batches.iter().map(batch_json).collect::<Vec<_>>();
    map.insert("batches".to_string(), Value::Array(batches));
    Value::Object(map)
}

fn batch_json(batch: &BatchSummary) -> Value {
    let chunks = batch
        .chunks
        .iter()
        .map(|chunk| json!({ "offset": chunk.offset, "size": chunk.size }))
        .collect::<Vec<_>>();
    json!({
        "rows": batch.row_count,
        "chunks": chunks,
    })
}
