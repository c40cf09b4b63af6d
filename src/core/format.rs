//! Purpose: On-disk layout of columnar files: header, chunk encodings, and footer.
//! Exports: `FORMAT_VERSION`, `FileHeader`, `ChunkMeta`, `BatchMeta`, `Footer`, chunk and footer codecs.
//! Role: Single source of truth shared by the writer, the reader, and inspection.
//! Invariants: All integers are little-endian; Int64 values are 8 bytes each.
//! Invariants: Every chunk range ends at or before the footer offset.
//! Invariants: Decoding never trusts a count for allocation beyond the bytes present.
use std::io::Write;
use std::sync::Arc;

use bstr::BString;

use crate::core::batch::Column;
use crate::core::error::{Error, ErrorKind};
use crate::core::schema::{ColumnSchema, DataType, Schema};

pub const MAGIC: [u8; 4] = *b"CDB1";
pub const FORMAT_VERSION: u32 = 1;
pub const SUPPORTED_FORMAT_VERSIONS: &[u32] = &[FORMAT_VERSION];
pub const HEADER_LEN: usize = 16;
/// Byte position of the footer offset field inside the header.
pub const FOOTER_OFFSET_POS: u64 = 8;

const INT64_WIDTH: usize = 8;
const LEN_WIDTH: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileHeader {
    pub version: u32,
    pub footer_offset: u64,
}

impl FileHeader {
    pub fn new(footer_offset: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            footer_offset,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        write_u32(&mut buf, 4, self.version);
        write_u64(&mut buf, 8, self.footer_offset);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_LEN {
            return Err(corrupt("file too small for header"));
        }
        if buf[0..4] != MAGIC {
            return Err(corrupt("bad magic").with_offset(0));
        }
        let version = u32::from_le_bytes(read_4(buf, 4));
        if !SUPPORTED_FORMAT_VERSIONS.contains(&version) {
            return Err(version_error(version));
        }
        let footer_offset = u64::from_le_bytes(read_8(buf, 8));
        if footer_offset == 0 {
            return Err(corrupt("footer offset is zero; file was never finalized")
                .with_offset(FOOTER_OFFSET_POS)
                .with_hint("The writer did not finish. Re-run the conversion."));
        }
        Ok(Self {
            version,
            footer_offset,
        })
    }
}

pub fn version_error(detected: u32) -> Error {
    let supported = SUPPORTED_FORMAT_VERSIONS
        .iter()
        .map(|version| version.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    corrupt(format!(
        "unsupported format version {detected} (supported: {supported})"
    ))
    .with_offset(4)
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChunkMeta {
    pub offset: u64,
    pub size: u64,
}

impl ChunkMeta {
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchMeta {
    pub row_count: u32,
    pub chunks: Vec<ChunkMeta>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Footer {
    pub schema: Arc<Schema>,
    pub batches: Vec<BatchMeta>,
}

impl Footer {
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        encode_footer(&self.schema, &self.batches)
    }

    /// Parses footer bytes that start at `footer_offset` in the file.
    pub fn decode(buf: &[u8], footer_offset: u64) -> Result<Self, Error> {
        let mut cursor = ByteCursor::new(buf, footer_offset);

        let column_count = cursor.read_u32()? as usize;
        if column_count == 0 {
            return Err(corrupt("footer declares zero columns").with_offset(footer_offset));
        }
        // name length (4) + tag (1) is the smallest column entry
        let mut columns = Vec::with_capacity(column_count.min(cursor.remaining() / 5));
        for _ in 0..column_count {
            let name_offset = cursor.position();
            let name_len = cursor.read_u32()? as usize;
            let name = cursor.read_bytes(name_len)?;
            let name = String::from_utf8(name.to_vec()).map_err(|err| {
                corrupt("column name is not valid UTF-8")
                    .with_offset(name_offset)
                    .with_source(err)
            })?;
            let tag_offset = cursor.position();
            let tag = cursor.read_u8()?;
            let data_type = DataType::from_tag(tag).ok_or_else(|| {
                corrupt(format!("unknown column type tag {tag}")).with_offset(tag_offset)
            })?;
            columns.push(ColumnSchema::new(name, data_type));
        }
        let schema = Schema::new(columns).map_err(|err| {
            let message = err.message().unwrap_or("invalid schema").to_string();
            corrupt(format!("footer schema is invalid: {message}"))
                .with_offset(footer_offset)
                .with_source(err)
        })?;

        let batch_count = cursor.read_u32()? as usize;
        let batch_entry_len = 4 + column_count * 16;
        let mut batches = Vec::with_capacity(batch_count.min(cursor.remaining() / batch_entry_len));
        for _ in 0..batch_count {
            let row_count = cursor.read_u32()?;
            let mut chunks = Vec::with_capacity(column_count);
            for _ in 0..column_count {
                let offset = cursor.read_u64()?;
                let size = cursor.read_u64()?;
                chunks.push(ChunkMeta { offset, size });
            }
            batches.push(BatchMeta { row_count, chunks });
        }

        Ok(Self {
            schema: Arc::new(schema),
            batches,
        })
    }

    /// Checks every chunk range against the footer offset and its column encoding.
    pub fn validate(&self, footer_offset: u64) -> Result<(), Error> {
        for (batch_index, batch) in self.batches.iter().enumerate() {
            if batch.chunks.len() != self.schema.len() {
                return Err(corrupt(format!(
                    "batch {batch_index} has {} chunks for {} columns",
                    batch.chunks.len(),
                    self.schema.len()
                )));
            }
            for (chunk, column) in batch.chunks.iter().zip(self.schema.iter()) {
                let in_bounds = chunk
                    .end()
                    .is_some_and(|end| end <= footer_offset && chunk.offset >= HEADER_LEN as u64);
                if !in_bounds {
                    return Err(corrupt(format!(
                        "batch {batch_index} column '{}' chunk [{}, +{}) overlaps footer at {footer_offset}",
                        column.name, chunk.offset, chunk.size
                    ))
                    .with_column(column.name.clone())
                    .with_offset(chunk.offset));
                }
                check_chunk_size(column.data_type, batch.row_count, chunk.size)
                    .map_err(|err| err.with_column(column.name.clone()).with_offset(chunk.offset))?;
            }
        }
        Ok(())
    }

    pub fn total_rows(&self) -> u64 {
        self.batches
            .iter()
            .map(|batch| u64::from(batch.row_count))
            .sum()
    }
}

pub fn encode_footer(schema: &Schema, batches: &[BatchMeta]) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&len_u32(schema.len(), "column count")?.to_le_bytes());
    for column in schema.iter() {
        let name = column.name.as_bytes();
        buf.extend_from_slice(&len_u32(name.len(), "column name")?.to_le_bytes());
        buf.extend_from_slice(name);
        buf.push(column.data_type.tag());
    }
    buf.extend_from_slice(&len_u32(batches.len(), "batch count")?.to_le_bytes());
    for batch in batches {
        buf.extend_from_slice(&batch.row_count.to_le_bytes());
        for chunk in &batch.chunks {
            buf.extend_from_slice(&chunk.offset.to_le_bytes());
            buf.extend_from_slice(&chunk.size.to_le_bytes());
        }
    }
    Ok(buf)
}

fn check_chunk_size(data_type: DataType, row_count: u32, size: u64) -> Result<(), Error> {
    let rows = u64::from(row_count);
    match data_type {
        DataType::Int64 => {
            if size != rows * INT64_WIDTH as u64 {
                return Err(corrupt(format!(
                    "int64 chunk holds {size} bytes for {rows} rows"
                )));
            }
        }
        DataType::String => {
            if size < rows * LEN_WIDTH as u64 {
                return Err(corrupt(format!(
                    "string chunk of {size} bytes cannot hold {rows} lengths"
                )));
            }
        }
    }
    Ok(())
}

/// Writes one column chunk and returns the number of bytes written.
pub fn write_column<W: Write>(out: &mut W, column: &Column) -> std::io::Result<u64> {
    let mut written = 0u64;
    match column {
        Column::Int64(values) => {
            for value in values {
                out.write_all(&value.to_le_bytes())?;
            }
            written += (values.len() * INT64_WIDTH) as u64;
        }
        Column::String(values) => {
            for value in values {
                let len = u32::try_from(value.len()).map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "string value exceeds 4 GiB",
                    )
                })?;
                out.write_all(&len.to_le_bytes())?;
            }
            written += (values.len() * LEN_WIDTH) as u64;
            for value in values {
                out.write_all(value)?;
                written += value.len() as u64;
            }
        }
    }
    Ok(written)
}

/// Decodes one column chunk of `row_count` values.
pub fn decode_column(data_type: DataType, row_count: u32, buf: &[u8]) -> Result<Column, Error> {
    check_chunk_size(data_type, row_count, buf.len() as u64)?;
    let rows = row_count as usize;
    match data_type {
        DataType::Int64 => {
            let values = buf
                .chunks_exact(INT64_WIDTH)
                .map(|bytes| i64::from_le_bytes(read_8(bytes, 0)))
                .collect();
            Ok(Column::Int64(values))
        }
        DataType::String => {
            let (lens, blob) = buf.split_at(rows * LEN_WIDTH);
            let mut values = Vec::with_capacity(rows);
            let mut pos = 0usize;
            for len in lens.chunks_exact(LEN_WIDTH) {
                let len = u32::from_le_bytes(read_4(len, 0)) as usize;
                let end = pos
                    .checked_add(len)
                    .filter(|end| *end <= blob.len())
                    .ok_or_else(|| {
                        corrupt(format!(
                            "string lengths exceed chunk blob of {} bytes",
                            blob.len()
                        ))
                    })?;
                values.push(BString::from(&blob[pos..end]));
                pos = end;
            }
            Ok(Column::String(values))
        }
    }
}

struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> ByteCursor<'a> {
    fn new(buf: &'a [u8], base: u64) -> Self {
        Self { buf, pos: 0, base }
    }

    fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if len > self.remaining() {
            return Err(corrupt("footer is truncated").with_offset(self.position()));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(read_4(self.read_bytes(4)?, 0)))
    }

    fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(read_8(self.read_bytes(8)?, 0)))
    }
}

fn corrupt(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Corrupt).with_message(message)
}

fn len_u32(len: usize, what: &str) -> Result<u32, Error> {
    u32::try_from(len)
        .map_err(|_| Error::new(ErrorKind::Usage).with_message(format!("{what} exceeds u32 range")))
}

fn read_4(buf: &[u8], offset: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    out
}

fn read_8(buf: &[u8], offset: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    out
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::{
        BatchMeta, ChunkMeta, FORMAT_VERSION, FileHeader, Footer, HEADER_LEN, decode_column,
        write_column,
    };
    use crate::core::batch::Column;
    use crate::core::error::ErrorKind;
    use crate::core::schema::{ColumnSchema, DataType, Schema};
    use bstr::BString;
    use std::sync::Arc;

    fn footer() -> Footer {
        let schema = Schema::new(vec![
            ColumnSchema::new("id", DataType::Int64),
            ColumnSchema::new("name", DataType::String),
        ])
        .expect("schema");
        Footer {
            schema: Arc::new(schema),
            batches: vec![BatchMeta {
                row_count: 2,
                chunks: vec![
                    ChunkMeta { offset: 20, size: 16 },
                    ChunkMeta { offset: 36, size: 10 },
                ],
            }],
        }
    }

    #[test]
    fn header_layout_is_fixed() {
        let buf = FileHeader::new(0x0102).encode();
        assert_eq!(&buf[0..4], b"CDB1");
        assert_eq!(&buf[4..8], &FORMAT_VERSION.to_le_bytes());
        assert_eq!(&buf[8..16], &0x0102u64.to_le_bytes());
        assert_eq!(FileHeader::decode(&buf).expect("decode").footer_offset, 0x0102);
    }

    #[test]
    fn header_rejects_bad_magic_version_and_zero_offset() {
        let mut bad_magic = FileHeader::new(64).encode();
        bad_magic[0] = b'X';
        assert_eq!(FileHeader::decode(&bad_magic).expect_err("magic").kind(), ErrorKind::Corrupt);

        let mut bad_version = FileHeader::new(64).encode();
        bad_version[4..8].copy_from_slice(&2u32.to_le_bytes());
        let err = FileHeader::decode(&bad_version).expect_err("version");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert!(err.message().unwrap_or_default().contains("version 2"));

        let unfinished = FileHeader::new(0).encode();
        assert_eq!(FileHeader::decode(&unfinished).expect_err("zero").kind(), ErrorKind::Corrupt);

        assert_eq!(FileHeader::decode(&[0u8; 3]).expect_err("short").kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn footer_encoding_matches_layout() {
        let buf = footer().encode().expect("encode");
        // ncols + ("id" entry) + ("name" entry) + nbatches + (rows + 2 * (offset, size))
        assert_eq!(buf.len(), 4 + (4 + 2 + 1) + (4 + 4 + 1) + 4 + (4 + 2 * 16));
        assert_eq!(&buf[0..4], &2u32.to_le_bytes());
        assert_eq!(&buf[8..10], b"id");
        assert_eq!(buf[10], 0);
        assert_eq!(buf[19], 1);
        let decoded = Footer::decode(&buf, 100).expect("decode");
        assert_eq!(decoded, footer());
    }

    #[test]
    fn truncated_footer_is_corrupt() {
        let buf = footer().encode().expect("encode");
        for cut in [0, 3, 9, buf.len() - 1] {
            let err = Footer::decode(&buf[..cut], 100).expect_err("truncated");
            assert_eq!(err.kind(), ErrorKind::Corrupt);
        }
    }

    #[test]
    fn unknown_type_tag_is_corrupt() {
        let mut buf = footer().encode().expect("encode");
        buf[10] = 7;
        let err = Footer::decode(&buf, 100).expect_err("tag");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert_eq!(err.offset(), Some(110));
    }

    #[test]
    fn huge_counts_do_not_allocate_up_front() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        let err = Footer::decode(&buf, HEADER_LEN as u64).expect_err("huge");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn validate_rejects_chunk_past_footer() {
        let footer = footer();
        footer.validate(46).expect("in bounds");
        let err = footer.validate(45).expect_err("overlap");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert_eq!(err.column(), Some("name"));
    }

    #[test]
    fn validate_rejects_overflowing_range_and_bad_int_size() {
        let mut overflow = footer();
        overflow.batches[0].chunks[1] = ChunkMeta { offset: u64::MAX, size: 2 };
        assert_eq!(overflow.validate(u64::MAX).expect_err("overflow").kind(), ErrorKind::Corrupt);

        let mut short_ints = footer();
        short_ints.batches[0].chunks[0].size = 8;
        assert_eq!(short_ints.validate(1000).expect_err("size").kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn chunk_codecs_round_trip_boundaries() {
        let ints = Column::Int64(vec![i64::MIN, -1, 0, i64::MAX]);
        let mut buf = Vec::new();
        assert_eq!(write_column(&mut buf, &ints).expect("write"), 32);
        assert_eq!(decode_column(DataType::Int64, 4, &buf).expect("decode"), ints);

        let strings = Column::String(vec![
            BString::from("a,b"),
            BString::from(""),
            BString::from("xyz"),
        ]);
        let mut buf = Vec::new();
        assert_eq!(write_column(&mut buf, &strings).expect("write"), 12 + 6);
        assert_eq!(&buf[0..4], &3u32.to_le_bytes());
        assert_eq!(&buf[12..], b"a,bxyz");
        assert_eq!(decode_column(DataType::String, 3, &buf).expect("decode"), strings);
    }

    #[test]
    fn string_lengths_past_blob_are_corrupt() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&5u32.to_le_bytes());
        buf.extend_from_slice(b"abc");
        let err = decode_column(DataType::String, 1, &buf).expect_err("short blob");
        assert_eq!(err.kind(), ErrorKind::Corrupt);

        let err = decode_column(DataType::String, 2, &buf[..4]).expect_err("short table");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }
}
