//! Purpose: Schema-bound columnar row chunks built from text records.
//! Exports: `Batch`, `Column`, `parse_int64`.
//! Role: In-memory unit exchanged between ingestion, the file writer/reader, and CSV export.
//! Invariants: Column `i` always holds the kind named by `schema[i]`.
//! Invariants: Every column holds exactly `row_count` values.
//! Invariants: A failed `append_row` leaves the batch unusable; callers abandon it.
use std::sync::Arc;

use bstr::BString;

use crate::core::error::{Error, ErrorKind};
use crate::core::schema::{DataType, Schema};
use crate::core::text;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Column {
    Int64(Vec<i64>),
    String(Vec<BString>),
}

impl Column {
    pub fn empty(data_type: DataType) -> Self {
        match data_type {
            DataType::Int64 => Column::Int64(Vec::new()),
            DataType::String => Column::String(Vec::new()),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Column::Int64(_) => DataType::Int64,
            Column::String(_) => DataType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int64(values) => values.len(),
            Column::String(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reserve(&mut self, additional: usize) {
        match self {
            Column::Int64(values) => values.reserve(additional),
            Column::String(values) => values.reserve(additional),
        }
    }

    fn clear(&mut self) {
        match self {
            Column::Int64(values) => values.clear(),
            Column::String(values) => values.clear(),
        }
    }

    /// Text form of one value, as written back to CSV.
    pub fn text_value(&self, row: usize) -> Option<BString> {
        match self {
            Column::Int64(values) => values.get(row).map(|value| BString::from(value.to_string())),
            Column::String(values) => values.get(row).cloned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    schema: Arc<Schema>,
    columns: Vec<Column>,
    row_count: usize,
}

impl Batch {
    pub fn new(schema: Arc<Schema>) -> Self {
        let columns = schema
            .iter()
            .map(|column| Column::empty(column.data_type))
            .collect();
        Self {
            schema,
            columns,
            row_count: 0,
        }
    }

    pub fn with_capacity(schema: Arc<Schema>, rows: usize) -> Self {
        let mut batch = Self::new(schema);
        batch.reserve(rows);
        batch
    }

    /// Assembles a batch from decoded columns, checking kinds and lengths.
    pub fn from_columns(schema: Arc<Schema>, columns: Vec<Column>) -> Result<Self, Error> {
        if columns.len() != schema.len() {
            return Err(Error::new(ErrorKind::Shape).with_message(format!(
                "expected {} columns, got {}",
                schema.len(),
                columns.len()
            )));
        }
        let row_count = columns.first().map_or(0, Column::len);
        for (column, column_schema) in columns.iter().zip(schema.iter()) {
            if column.data_type() != column_schema.data_type {
                return Err(Error::new(ErrorKind::Internal)
                    .with_message("column kind does not match schema")
                    .with_column(column_schema.name.clone()));
            }
            if column.len() != row_count {
                return Err(Error::new(ErrorKind::Shape)
                    .with_message("columns have different lengths")
                    .with_column(column_schema.name.clone()));
            }
        }
        Ok(Self {
            schema,
            columns,
            row_count,
        })
    }

    pub fn reserve(&mut self, rows: usize) {
        for column in &mut self.columns {
            column.reserve(rows);
        }
    }

    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.row_count = 0;
    }

    /// Appends one text record; `line` is the 1-based source record number.
    pub fn append_row<F: AsRef<[u8]>>(&mut self, record: &[F], line: u64) -> Result<(), Error> {
        if record.len() != self.schema.len() {
            return Err(Error::new(ErrorKind::Shape)
                .with_message(format!(
                    "expected {} fields, got {}",
                    self.schema.len(),
                    record.len()
                ))
                .with_line(line));
        }

        for ((column, column_schema), field) in self
            .columns
            .iter_mut()
            .zip(self.schema.iter())
            .zip(record)
        {
            let field = field.as_ref();
            match column {
                Column::Int64(values) => {
                    values.push(parse_int64(field, line, &column_schema.name)?);
                }
                Column::String(values) => values.push(BString::from(field)),
            }
        }

        self.row_count += 1;
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Text fields of one row in schema order.
    pub fn text_row(&self, row: usize) -> Option<Vec<BString>> {
        if row >= self.row_count {
            return None;
        }
        self.columns
            .iter()
            .map(|column| column.text_value(row))
            .collect()
    }
}

/// Parses a trimmed base-10 `i64`; the whole trimmed text must be consumed.
pub fn parse_int64(field: &[u8], line: u64, column: &str) -> Result<i64, Error> {
    let trimmed = text::trim(field);
    let type_error = |detail: String| {
        Error::new(ErrorKind::Type)
            .with_message(format!(
                "line {line}: column '{column}' expects int64, {detail}"
            ))
            .with_line(line)
            .with_column(column)
    };
    if trimmed.is_empty() {
        return Err(type_error("got empty value".to_string()));
    }
    let got = || format!("got '{}'", String::from_utf8_lossy(trimmed));
    if trimmed.first() == Some(&b'+') {
        return Err(type_error(got()));
    }
    let text = std::str::from_utf8(trimmed).map_err(|_| type_error(got()))?;
    text.parse::<i64>().map_err(|err| type_error(got()).with_source(err))
}
