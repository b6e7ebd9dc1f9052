//! Loaded file content and per-row views for the offset/hex/ASCII grid.

use crate::row_math::{self, BYTES_PER_ROW};
use std::fmt::Write as FmtWrite;
use std::ops::Range;
use std::sync::Arc;

/// Fully loaded file content. Immutable once produced; clones share storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteBuffer {
    bytes: Arc<[u8]>,
}

impl ByteBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::from(bytes),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// `ceil(len / 16)`.
    pub fn total_rows(&self) -> u64 {
        row_math::total_rows(self.len())
    }

    /// View of a single row, `None` past the last row.
    pub fn row(&self, index: u64) -> Option<RowView<'_>> {
        if index >= self.total_rows() {
            return None;
        }
        Some(RowView {
            index,
            start_offset: row_math::row_start(index),
            bytes: row_math::row_bytes(index, &self.bytes),
        })
    }

    /// Views for `rows`, clipped to the rows that exist.
    pub fn rows(&self, rows: Range<u64>) -> impl Iterator<Item = RowView<'_>> {
        let end = rows.end.min(self.total_rows());
        (rows.start..end).filter_map(move |i| self.row(i))
    }
}

/// One grid row: its index, first byte offset and up to 16 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowView<'a> {
    pub index: u64,
    pub start_offset: u64,
    pub bytes: &'a [u8],
}

impl RowView<'_> {
    pub fn offset_label(&self) -> String {
        format_offset(self.start_offset)
    }

    /// Hex column as one string, bytes separated by a space and padded so
    /// that a partial row lines up with full rows.
    pub fn hex_line(&self) -> String {
        let mut line = String::with_capacity(BYTES_PER_ROW as usize * 3);
        for col in 0..BYTES_PER_ROW as usize {
            if col > 0 {
                line.push(' ');
            }
            match self.bytes.get(col) {
                Some(&b) => {
                    let _ = write!(line, "{:02X}", b);
                }
                None => line.push_str("  "),
            }
        }
        line
    }

    /// Offset of column `col` within the whole buffer.
    pub fn byte_offset(&self, col: usize) -> u64 {
        self.start_offset + col as u64
    }
}

/// Offsets render as 8 upper-case hex digits, zero padded.
pub fn format_offset(offset: u64) -> String {
    format!("{:08X}", offset)
}

pub fn format_hex(byte: u8) -> String {
    format!("{:02X}", byte)
}

pub fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte)
}

/// Printable ASCII shows as itself, everything else as `.`.
pub fn ascii_char(byte: u8) -> char {
    if is_printable(byte) { byte as char } else { '.' }
}

/// Size in megabytes with two decimals, as shown next to the file name.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
