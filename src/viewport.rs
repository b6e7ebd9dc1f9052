//! Windowed rendering: which rows to materialize for a scroll position.
//!
//! Only `visible_start..visible_end` is ever built. The space above and below
//! the window is reserved by the two fillers, so the scrollable height always
//! equals `total_rows * ROW_HEIGHT_PX` no matter how large the file is.

use crate::buffer::{ByteBuffer, RowView};
use crate::row_math::{row_of_scroll, ROW_HEIGHT_PX};

/// Upper bound on rows materialized at once.
pub const MAX_WINDOW_ROWS: u64 = 100;

/// Window derived from a scroll position and the row count.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewportState {
    pub scroll_position_px: f64,
    pub visible_start: u64,
    /// Exclusive.
    pub visible_end: u64,
    pub leading_filler_px: f64,
    pub trailing_filler_px: f64,
}

impl ViewportState {
    pub fn visible_count(&self) -> u64 {
        self.visible_end - self.visible_start
    }

    pub fn is_empty(&self) -> bool {
        self.visible_start == self.visible_end
    }

    /// Leading filler + window + trailing filler.
    pub fn total_height_px(&self) -> f64 {
        self.leading_filler_px
            + self.visible_count() as f64 * ROW_HEIGHT_PX
            + self.trailing_filler_px
    }

    /// Row views for the window.
    pub fn visible_rows<'a>(&self, buffer: &'a ByteBuffer) -> impl Iterator<Item = RowView<'a>> {
        buffer.rows(self.visible_start..self.visible_end)
    }
}

/// Compute the window for `scroll_position_px`.
///
/// `window_capacity_rows` is capped at [`MAX_WINDOW_ROWS`]. A scroll position
/// past the end (e.g. left over from a larger file) clamps the window to
/// `{total_rows, total_rows}` instead of producing negative fillers.
pub fn compute_window(
    scroll_position_px: f64,
    total_rows: u64,
    window_capacity_rows: u64,
) -> ViewportState {
    let scroll_position_px = if scroll_position_px.is_nan() {
        0.0
    } else {
        scroll_position_px.max(0.0)
    };

    if total_rows == 0 {
        return ViewportState {
            scroll_position_px,
            ..ViewportState::default()
        };
    }

    let capacity = window_capacity_rows.min(MAX_WINDOW_ROWS);
    let visible_start = row_of_scroll(scroll_position_px).min(total_rows);
    let visible_end = visible_start.saturating_add(capacity).min(total_rows);

    ViewportState {
        scroll_position_px,
        visible_start,
        visible_end,
        leading_filler_px: visible_start as f64 * ROW_HEIGHT_PX,
        trailing_filler_px: (total_rows - visible_end) as f64 * ROW_HEIGHT_PX,
    }
}

/// Largest useful scroll position: the last row sits at the bottom of a
/// viewport `viewport_height_px` tall.
pub fn max_scroll(total_rows: u64, viewport_height_px: f64) -> f64 {
    (total_rows as f64 * ROW_HEIGHT_PX - viewport_height_px.max(0.0)).max(0.0)
}

/// Bound a scroll position to `[0, max_scroll]`.
pub fn clamp_scroll(scroll_px: f64, total_rows: u64, viewport_height_px: f64) -> f64 {
    if scroll_px.is_nan() {
        return 0.0;
    }
    scroll_px.clamp(0.0, max_scroll(total_rows, viewport_height_px))
}

/// Rows that fit in `viewport_height_px`, plus one for a partially visible
/// row at the bottom, capped at [`MAX_WINDOW_ROWS`].
pub fn capacity_for_height(viewport_height_px: f64) -> u64 {
    if viewport_height_px.is_nan() || viewport_height_px <= 0.0 {
        return 1;
    }
    let rows = (viewport_height_px / ROW_HEIGHT_PX).ceil() as u64 + 1;
    rows.clamp(1, MAX_WINDOW_ROWS)
}
