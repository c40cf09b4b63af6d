//! Purpose: Delimited text record codec with double-quote quoting.
//! Exports: `RecordReader`, `RecordWriter`, `Record`, `DEFAULT_DELIMITER`, `is_blank_record`.
//! Role: Schema-agnostic leaf used by schema loading, ingestion, and CSV export.
//! Invariants: Fields are opaque bytes; no encoding validation happens here.
//! Invariants: `\n`, `\r`, and `\r\n` each end one record; output always uses `\n`.
//! Invariants: End of input inside a quoted field is a syntax error.
use std::io::{self, BufRead, Write};

use bstr::BString;

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_DELIMITER: u8 = b',';

const QUOTE: u8 = b'"';

pub type Record = Vec<BString>;

pub struct RecordReader<R> {
    inner: R,
    delimiter: u8,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_delimiter(inner, DEFAULT_DELIMITER)
    }

    pub fn with_delimiter(inner: R, delimiter: u8) -> Self {
        Self { inner, delimiter }
    }

    /// Reads the next record, or `None` once the remaining input is empty.
    pub fn read_record(&mut self) -> Result<Option<Record>, Error> {
        let mut fields = Record::new();
        let mut field = Vec::new();
        let mut in_quotes = false;
        let mut started = false;

        loop {
            let Some(byte) = self.next_byte()? else {
                if !started {
                    return Ok(None);
                }
                if in_quotes {
                    return Err(Error::new(ErrorKind::Syntax)
                        .with_message("unterminated quoted field at end of input"));
                }
                fields.push(BString::from(field));
                return Ok(Some(fields));
            };
            started = true;

            if in_quotes {
                if byte == QUOTE {
                    if self.peek_byte()? == Some(QUOTE) {
                        self.consume_byte();
                        field.push(QUOTE);
                    } else {
                        in_quotes = false;
                    }
                } else {
                    field.push(byte);
                }
                continue;
            }

            match byte {
                QUOTE => in_quotes = true,
                b'\r' => {
                    if self.peek_byte()? == Some(b'\n') {
                        self.consume_byte();
                    }
                    fields.push(BString::from(field));
                    return Ok(Some(fields));
                }
                b'\n' => {
                    fields.push(BString::from(field));
                    return Ok(Some(fields));
                }
                _ if byte == self.delimiter => {
                    fields.push(BString::from(std::mem::take(&mut field)));
                }
                _ => field.push(byte),
            }
        }
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, Error> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(Error::new(ErrorKind::Io)
                        .with_message("failed to read text input")
                        .with_source(err));
                }
            }
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>, Error> {
        let byte = self.peek_byte()?;
        if byte.is_some() {
            self.consume_byte();
        }
        Ok(byte)
    }

    fn consume_byte(&mut self) {
        self.inner.consume(1);
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

pub struct RecordWriter<W> {
    inner: W,
    delimiter: u8,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_delimiter(inner, DEFAULT_DELIMITER)
    }

    pub fn with_delimiter(inner: W, delimiter: u8) -> Self {
        Self { inner, delimiter }
    }

    pub fn write_record<F: AsRef<[u8]>>(&mut self, fields: &[F]) -> Result<(), Error> {
        for (index, field) in fields.iter().enumerate() {
            if index != 0 {
                let delimiter = self.delimiter;
                self.put(&[delimiter])?;
            }
            self.write_field(field.as_ref())?;
        }
        self.put(b"\n")
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush().map_err(write_error)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_field(&mut self, field: &[u8]) -> Result<(), Error> {
        if !needs_quoting(field, self.delimiter) {
            return self.put(field);
        }
        self.put(&[QUOTE])?;
        for chunk in field.split_inclusive(|byte| *byte == QUOTE) {
            self.put(chunk)?;
            if chunk.last() == Some(&QUOTE) {
                self.put(&[QUOTE])?;
            }
        }
        self.put(&[QUOTE])
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.inner.write_all(bytes).map_err(write_error)
    }
}

fn write_error(err: io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write text output")
        .with_source(err)
}

pub fn needs_quoting(field: &[u8], delimiter: u8) -> bool {
    field
        .iter()
        .any(|&byte| byte == QUOTE || byte == delimiter || byte == b'\n' || byte == b'\r')
}

pub(crate) fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

pub(crate) fn trim(field: &[u8]) -> &[u8] {
    let start = field
        .iter()
        .position(|&byte| !is_space(byte))
        .unwrap_or(field.len());
    let end = field
        .iter()
        .rposition(|&byte| !is_space(byte))
        .map_or(start, |pos| pos + 1);
    &field[start..end]
}

/// True when every field is empty after trimming whitespace.
pub fn is_blank_record(record: &[BString]) -> bool {
    record.iter().all(|field| trim(field).is_empty())
}
