//! Custom-drawn hex grid with virtual scrolling.
//!
//! Only the rows of the model's current window are drawn. Their vertical
//! position comes from the leading filler, so the grid scrolls by pixels
//! while the scrollbar spans the full `total_rows * ROW_HEIGHT_PX` height.

use crate::buffer::{ascii_char, format_hex};
use crate::model::HexViewerModel;
use crate::row_math::{BYTES_PER_ROW, ROW_HEIGHT_PX};
use dear_imgui_rs::*;

const HEADER_HEIGHT: f32 = ROW_HEIGHT_PX as f32;
const SCROLLBAR_WIDTH: f32 = 14.0;
const LEFT_PADDING: f32 = 6.0;
const COLUMN_GAP: f32 = 18.0;
const MIN_THUMB_HEIGHT: f32 = 20.0;
const WHEEL_ROWS: f64 = 3.0;

const BACKGROUND: [f32; 4] = [0.08, 0.08, 0.08, 1.0];
const GUTTER_BACKGROUND: [f32; 4] = [0.12, 0.12, 0.12, 1.0];
const HEADER_COLOR: [f32; 4] = [0.55, 0.65, 0.85, 1.0];
const OFFSET_COLOR: [f32; 4] = [0.47, 0.47, 0.47, 1.0];
const TEXT_COLOR: [f32; 4] = [0.86, 0.86, 0.86, 1.0];
const DIM_COLOR: [f32; 4] = [0.40, 0.40, 0.40, 1.0];
const HOVER_COLOR: [f32; 4] = [0.24, 0.40, 0.70, 0.35];

/// Scrollbar thumb position and size within a track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thumb {
    pub offset: f32,
    pub height: f32,
}

/// `None` when everything fits and no thumb is needed.
pub fn thumb_for(track_height: f32, content_height: f64, scroll_px: f64) -> Option<Thumb> {
    let viewport_height = track_height as f64;
    if track_height <= 0.0 || content_height <= viewport_height {
        return None;
    }
    let height = ((track_height as f64 * viewport_height / content_height) as f32)
        .max(MIN_THUMB_HEIGHT)
        .min(track_height);
    let max_scroll = content_height - viewport_height;
    let fraction = (scroll_px / max_scroll).clamp(0.0, 1.0) as f32;
    Some(Thumb {
        offset: fraction * (track_height - height),
        height,
    })
}

/// Inverse of [`thumb_for`]: the scroll position for a thumb top at `offset`.
pub fn scroll_for_thumb(track_height: f32, thumb: Thumb, content_height: f64) -> f64 {
    let travel = track_height - thumb.height;
    if travel <= 0.0 {
        return 0.0;
    }
    let fraction = (thumb.offset / travel).clamp(0.0, 1.0) as f64;
    fraction * (content_height - track_height as f64).max(0.0)
}

pub struct HexView {
    char_width: f32,
    scrollbar_dragging: bool,
    scrollbar_drag_start_y: f32,
    hovered: Option<u64>,
}

impl HexView {
    pub fn new() -> Self {
        Self {
            char_width: 0.0,
            scrollbar_dragging: false,
            scrollbar_drag_start_y: 0.0,
            hovered: None,
        }
    }

    fn update_char_width(&mut self, ui: &Ui) {
        let font = ui.current_font();
        let size = ui.current_font_size();
        self.char_width = font.calc_text_size(size, f32::MAX, -1.0, "M")[0];
    }

    pub fn render(&mut self, ui: &Ui, model: &mut HexViewerModel, width: f32, height: f32) {
        let _id = ui.push_id("HexView");
        self.hovered = None;

        if model.buffer().is_none() {
            if !model.is_loading() && model.error().is_none() {
                ui.text_colored([0.5, 0.5, 0.5, 1.0], "(no file open)");
            }
            return;
        }
        if model.total_rows() == 0 {
            ui.text_colored([0.5, 0.5, 0.5, 1.0], "(empty file)");
            return;
        }

        if self.char_width == 0.0 {
            self.update_char_width(ui);
        }

        let rows_height = (height - HEADER_HEIGHT).max(0.0);
        model.set_viewport_height(rows_height as f64);

        let origin = ui.cursor_screen_pos();
        let mouse_pos = ui.io().mouse_pos();

        ui.invisible_button("##hex_input", [width, height]);
        let focused = ui.is_item_focused() || ui.is_item_active();

        let mouse_in_area = mouse_pos[0] >= origin[0]
            && mouse_pos[0] < origin[0] + width
            && mouse_pos[1] >= origin[1]
            && mouse_pos[1] < origin[1] + height;

        if (mouse_in_area || self.scrollbar_dragging) && !ui.is_any_item_active() {
            let wheel = ui.io().mouse_wheel();
            if wheel != 0.0 {
                model.scroll_by_rows(-(wheel as f64) * WHEEL_ROWS);
            }
        }

        if focused || mouse_in_area {
            if ui.is_key_pressed(Key::DownArrow) {
                model.scroll_by_rows(1.0);
            }
            if ui.is_key_pressed(Key::UpArrow) {
                model.scroll_by_rows(-1.0);
            }
            if ui.is_key_pressed(Key::PageDown) {
                model.scroll_by_pages(1.0);
            }
            if ui.is_key_pressed(Key::PageUp) {
                model.scroll_by_pages(-1.0);
            }
            if ui.is_key_pressed(Key::Home) {
                model.scroll_to_start();
            }
            if ui.is_key_pressed(Key::End) {
                model.scroll_to_end();
            }
        }

        let cw = self.char_width;
        let offset_x = origin[0] + LEFT_PADDING;
        let hex_x = offset_x + 8.0 * cw + COLUMN_GAP;
        let ascii_x = hex_x + (BYTES_PER_ROW as f32 * 3.0 - 1.0) * cw + COLUMN_GAP;
        let rows_top = origin[1] + HEADER_HEIGHT;

        let draw_list = ui.get_window_draw_list();

        draw_list
            .add_rect(origin, [origin[0] + width, origin[1] + height], BACKGROUND)
            .filled(true)
            .build();
        draw_list
            .add_rect(
                origin,
                [hex_x - COLUMN_GAP * 0.5, origin[1] + height],
                GUTTER_BACKGROUND,
            )
            .filled(true)
            .build();

        // Header
        draw_list.add_text([offset_x, origin[1]], HEADER_COLOR, "Offset");
        for col in 0..BYTES_PER_ROW {
            draw_list.add_text(
                [hex_x + col as f32 * 3.0 * cw, origin[1]],
                HEADER_COLOR,
                &format_hex(col as u8),
            );
        }
        draw_list.add_text([ascii_x, origin[1]], HEADER_COLOR, "ASCII");

        draw_list.push_clip_rect(
            [origin[0], rows_top],
            [origin[0] + width - SCROLLBAR_WIDTH, origin[1] + height],
            true,
        );

        let window = *model.viewport();
        let scroll = model.scroll_position();
        let row_h = ROW_HEIGHT_PX as f32;
        // Top of the first window row, relative to the rows area.
        let first_row_y = rows_top + (window.leading_filler_px - scroll) as f32;

        let hovered_row = if mouse_in_area && mouse_pos[1] >= rows_top {
            let rel = mouse_pos[1] - first_row_y;
            (rel >= 0.0).then(|| window.visible_start + (rel / row_h) as u64)
        } else {
            None
        };

        for (i, row) in model.visible_rows().into_iter().enumerate() {
            let y = first_row_y + i as f32 * row_h;
            if y + row_h < rows_top || y > origin[1] + height {
                continue;
            }

            if hovered_row == Some(row.index) && !self.scrollbar_dragging {
                draw_list
                    .add_rect(
                        [origin[0], y],
                        [origin[0] + width - SCROLLBAR_WIDTH, y + row_h],
                        HOVER_COLOR,
                    )
                    .filled(true)
                    .build();
            }

            draw_list.add_text([offset_x, y], OFFSET_COLOR, &row.offset_label());
            draw_list.add_text([hex_x, y], TEXT_COLOR, &row.hex_line());

            for (col, &byte) in row.bytes.iter().enumerate() {
                let ch = ascii_char(byte);
                let color = if ch == '.' && byte != b'.' { DIM_COLOR } else { TEXT_COLOR };
                draw_list.add_text([ascii_x + col as f32 * cw, y], color, &ch.to_string());
            }
        }

        draw_list.pop_clip_rect();

        self.hovered = if self.scrollbar_dragging {
            None
        } else {
            self.offset_under_mouse(mouse_pos[0], hex_x, ascii_x, hovered_row, model)
        };

        self.render_scrollbar(
            ui,
            &draw_list,
            model,
            origin[0] + width - SCROLLBAR_WIDTH,
            rows_top,
            rows_height,
        );
    }

    /// Byte offset under the mouse after the last render, if any.
    pub fn hovered_offset(&self) -> Option<u64> {
        self.hovered
    }

    /// Byte under the mouse in either the hex or the ASCII column.
    fn offset_under_mouse(
        &self,
        mouse_x: f32,
        hex_x: f32,
        ascii_x: f32,
        row: Option<u64>,
        model: &HexViewerModel,
    ) -> Option<u64> {
        let row = model.buffer()?.row(row?)?;
        let cw = self.char_width;
        if cw <= 0.0 {
            return None;
        }
        let col = if mouse_x >= ascii_x {
            ((mouse_x - ascii_x) / cw) as usize
        } else if mouse_x >= hex_x {
            ((mouse_x - hex_x) / (3.0 * cw)) as usize
        } else {
            return None;
        };
        (col < row.bytes.len()).then(|| row.byte_offset(col))
    }

    fn render_scrollbar(
        &mut self,
        ui: &Ui,
        draw_list: &DrawListMut,
        model: &mut HexViewerModel,
        x: f32,
        y: f32,
        height: f32,
    ) {
        draw_list
            .add_rect([x, y], [x + SCROLLBAR_WIDTH, y + height], GUTTER_BACKGROUND)
            .filled(true)
            .build();

        let content_height = model.viewport().total_height_px();
        let Some(thumb) = thumb_for(height, content_height, model.scroll_position()) else {
            self.scrollbar_dragging = false;
            return;
        };
        let thumb_y = y + thumb.offset;

        let mouse_pos = ui.io().mouse_pos();
        let mouse_in_scrollbar = mouse_pos[0] >= x
            && mouse_pos[0] <= x + SCROLLBAR_WIDTH
            && mouse_pos[1] >= y
            && mouse_pos[1] <= y + height;

        if mouse_in_scrollbar && ui.is_mouse_clicked(MouseButton::Left) {
            if mouse_pos[1] >= thumb_y && mouse_pos[1] <= thumb_y + thumb.height {
                self.scrollbar_dragging = true;
                self.scrollbar_drag_start_y = mouse_pos[1] - thumb_y;
            } else {
                // Click on the track: center the thumb there.
                self.scrollbar_dragging = true;
                self.scrollbar_drag_start_y = thumb.height * 0.5;
            }
        }

        if self.scrollbar_dragging {
            if ui.is_mouse_down(MouseButton::Left) {
                let dragged = Thumb {
                    offset: mouse_pos[1] - self.scrollbar_drag_start_y - y,
                    height: thumb.height,
                };
                model.set_scroll_position(scroll_for_thumb(height, dragged, content_height));
            } else {
                self.scrollbar_dragging = false;
            }
        }

        let thumb_color: [f32; 4] = if self.scrollbar_dragging {
            [0.70, 0.70, 0.70, 1.0]
        } else if mouse_in_scrollbar {
            [0.55, 0.55, 0.55, 1.0]
        } else {
            [0.40, 0.40, 0.40, 1.0]
        };

        draw_list
            .add_rect(
                [x + 2.0, thumb_y],
                [x + SCROLLBAR_WIDTH - 2.0, thumb_y + thumb.height],
                thumb_color,
            )
            .rounding(4.0)
            .filled(true)
            .build();
    }
}

impl Default for HexView {
    fn default() -> Self {
        Self::new()
    }
}
