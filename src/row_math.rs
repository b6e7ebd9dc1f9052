//! Byte offset / row index / pixel scroll position mapping.
//!
//! Rows hold a fixed number of bytes and render at a fixed height, so every
//! conversion here is exact integer division; pixel values are `f64` only
//! because scroll positions come from the host as reals.

/// Bytes shown on one grid row.
pub const BYTES_PER_ROW: u64 = 16;

/// Height of one grid row in pixels.
pub const ROW_HEIGHT_PX: f64 = 20.0;

/// Row containing `byte_offset`.
pub fn row_of(byte_offset: u64) -> u64 {
    byte_offset / BYTES_PER_ROW
}

/// First byte offset of `row_index`.
pub fn row_start(row_index: u64) -> u64 {
    row_index.saturating_mul(BYTES_PER_ROW)
}

/// Scroll position that puts the row holding `byte_offset` at the top.
pub fn scroll_target_of(byte_offset: u64) -> f64 {
    row_of(byte_offset) as f64 * ROW_HEIGHT_PX
}

/// Row at the top of the viewport for a scroll position.
/// Negative and NaN positions map to row 0.
pub fn row_of_scroll(scroll_px: f64) -> u64 {
    if scroll_px.is_nan() || scroll_px <= 0.0 {
        return 0;
    }
    (scroll_px / ROW_HEIGHT_PX).floor() as u64
}

/// Number of rows needed for `length` bytes (the last row may be partial).
pub fn total_rows(length: u64) -> u64 {
    length.div_ceil(BYTES_PER_ROW)
}

/// Bytes of `row_index`: `[row*16, min((row+1)*16, len))`.
/// Shorter than a full row only for the final row; empty past the end.
pub fn row_bytes(row_index: u64, bytes: &[u8]) -> &[u8] {
    let len = bytes.len() as u64;
    let start = row_start(row_index).min(len);
    let end = row_start(row_index.saturating_add(1)).min(len);
    &bytes[start as usize..end as usize]
}
