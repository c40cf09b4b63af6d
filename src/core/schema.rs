//! Purpose: Column schema model and its two-column text representation.
//! Exports: `DataType`, `ColumnSchema`, `Schema`, `load_schema`, `save_schema`.
//! Role: Single description of column order and types for text, batches, and the binary file.
//! Invariants: A `Schema` is non-empty and its names are unique and non-empty.
//! Invariants: Type names read case-insensitively; written lowercase.
use std::collections::HashSet;
use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;

use bstr::{BString, ByteSlice};

use crate::core::error::{Error, ErrorKind};
use crate::core::text::{self, RecordReader, RecordWriter};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DataType {
    Int64 = 0,
    String = 1,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Int64 => "int64",
            DataType::String => "string",
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(DataType::Int64),
            1 => Some(DataType::String),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("int64") {
            return Ok(DataType::Int64);
        }
        if value.eq_ignore_ascii_case("string") {
            return Ok(DataType::String);
        }
        Err(Error::new(ErrorKind::Schema)
            .with_message(format!("unknown column type '{value}'"))
            .with_hint("Supported types are int64 and string."))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>) -> Result<Self, Error> {
        if columns.is_empty() {
            return Err(Error::new(ErrorKind::Schema).with_message("schema is empty"));
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.name.is_empty() {
                return Err(Error::new(ErrorKind::Schema).with_message("column name is empty"));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(Error::new(ErrorKind::Schema)
                    .with_message(format!("duplicate column name '{}'", column.name))
                    .with_column(column.name.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&ColumnSchema> {
        self.columns.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnSchema> {
        self.columns.iter()
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a ColumnSchema;
    type IntoIter = std::slice::Iter<'a, ColumnSchema>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

/// Reads `name,type` records; blank records are skipped.
pub fn load_schema<R: BufRead>(input: R, delimiter: u8) -> Result<Schema, Error> {
    let mut reader = RecordReader::with_delimiter(input, delimiter);
    let mut columns = Vec::new();
    let mut line = 0u64;

    while let Some(record) = reader.read_record()? {
        line += 1;
        if text::is_blank_record(&record) {
            continue;
        }
        columns.push(parse_column(&record).map_err(|err| err.with_line(line))?);
    }

    Schema::new(columns)
}

fn parse_column(record: &[BString]) -> Result<ColumnSchema, Error> {
    let [name, type_name] = record else {
        return Err(Error::new(ErrorKind::Schema).with_message(format!(
            "schema record must have 2 fields (name,type), got {}",
            record.len()
        )));
    };
    let name = text::trim(name).to_str().map_err(|err| {
        Error::new(ErrorKind::Schema)
            .with_message("column name is not valid UTF-8")
            .with_source(err)
    })?;
    if name.is_empty() {
        return Err(Error::new(ErrorKind::Schema).with_message("column name is empty"));
    }
    let data_type = text::trim(type_name).to_str_lossy().parse::<DataType>()?;
    Ok(ColumnSchema::new(name, data_type))
}

pub fn save_schema<W: Write>(output: W, schema: &Schema, delimiter: u8) -> Result<(), Error> {
    let mut writer = RecordWriter::with_delimiter(output, delimiter);
    for column in schema {
        if column.name.is_empty() {
            return Err(Error::new(ErrorKind::Schema)
                .with_message("cannot write schema: column name is empty"));
        }
        writer.write_record(&[column.name.as_str(), column.data_type.as_str()])?;
    }
    writer.flush()
}
