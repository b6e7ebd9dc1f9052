use crate::buffer::format_offset;
use crate::hex_view::HexView;
use crate::model::HexViewerModel;
use dear_imgui_rs::*;
use std::path::PathBuf;
use std::time::Instant;

const ERROR_COLOR: [f32; 4] = [1.0, 0.3, 0.3, 1.0];
const INFO_COLOR: [f32; 4] = [0.4, 0.9, 0.5, 1.0];
const LOADING_COLOR: [f32; 4] = [0.5, 0.5, 1.0, 1.0];
const MUTED_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 1.0];

pub struct HexViewerUI {
    path_input: String,
    /// Generation whose path `path_input` was last filled from.
    shown_generation: u64,
    offset_input: String,
    hex_view: HexView,
}

impl HexViewerUI {
    pub fn new() -> Self {
        Self {
            path_input: String::new(),
            shown_generation: 0,
            offset_input: String::new(),
            hex_view: HexView::new(),
        }
    }

    pub fn render(&mut self, ui: &Ui, model: &mut HexViewerModel, width: f32, height: f32) {
        model.tick(Instant::now());

        ui.window("hexgrid")
            .position([0.0, 0.0], Condition::Always)
            .size([width, height], Condition::Always)
            .flags(
                WindowFlags::NO_TITLE_BAR
                    | WindowFlags::NO_RESIZE
                    | WindowFlags::NO_MOVE
                    | WindowFlags::NO_COLLAPSE
                    | WindowFlags::NO_BRING_TO_FRONT_ON_FOCUS
                    | WindowFlags::NO_SCROLLBAR
                    | WindowFlags::NO_SCROLL_WITH_MOUSE,
            )
            .build(|| {
                self.render_top_bar(ui, model);
                ui.separator();
                self.render_file_bar(ui, model);
                if model.can_navigate() {
                    self.render_offset_bar(ui, model);
                }
                ui.separator();

                let status_bar_height = ui.frame_height_with_spacing() + 4.0;
                let avail = ui.content_region_avail();
                let view_height = (avail[1] - status_bar_height).max(0.0);

                ui.child_window("HexPane")
                    .size([avail[0], view_height])
                    .flags(WindowFlags::NO_SCROLLBAR | WindowFlags::NO_SCROLL_WITH_MOUSE)
                    .build(ui, || {
                        let inner = ui.content_region_avail();
                        self.hex_view.render(ui, model, inner[0], inner[1]);
                    });

                ui.separator();
                self.render_status_bar(ui, model);
            });
    }

    fn render_top_bar(&mut self, ui: &Ui, model: &mut HexViewerModel) {
        ui.text("Open:");
        ui.same_line();

        let button_width = 60.0;
        let path_width = ui.window_size()[0] - ui.cursor_pos()[0] - button_width - 12.0;
        ui.set_next_item_width(path_width);

        let mut open = ui
            .input_text("##path", &mut self.path_input)
            .enter_returns_true(true)
            .build();

        // Show the path once when a file is opened from elsewhere (argv)
        if model.generation() != self.shown_generation && !ui.is_item_active() {
            self.shown_generation = model.generation();
            if let Some(path) = model.current_path() {
                self.path_input = path.display().to_string();
            }
        }

        ui.same_line();
        if ui.button("Open") {
            open = true;
        }

        let path = self.path_input.trim();
        if open && !path.is_empty() {
            model.open_file(&PathBuf::from(path));
            self.shown_generation = model.generation();
            self.offset_input.clear();
        }
    }

    fn render_file_bar(&self, ui: &Ui, model: &HexViewerModel) {
        match model.file_label() {
            Some(label) => ui.text(label),
            None => {
                ui.text_colored(MUTED_COLOR, "No file selected");
                return;
            }
        }

        if model.is_loading() {
            ui.same_line();
            ui.text_colored(
                LOADING_COLOR,
                format!("Loading... {:.0}%", model.progress() * 100.0),
            );
        }

        if let Some(err) = model.error() {
            ui.same_line();
            ui.text_colored(ERROR_COLOR, format!("Error: {}", err));
        }
    }

    fn render_offset_bar(&mut self, ui: &Ui, model: &mut HexViewerModel) {
        ui.text("Jump to offset:");
        ui.same_line();
        ui.set_next_item_width(160.0);

        let mut jump = ui
            .input_text("##offset", &mut self.offset_input)
            .enter_returns_true(true)
            .build();
        model.set_offset_input(&self.offset_input);

        ui.same_line();
        if model.can_jump() {
            if ui.button("Jump") {
                jump = true;
            }
        } else {
            // Nothing to jump to yet
            ui.text_colored(MUTED_COLOR, "Jump");
            jump = false;
        }

        if jump {
            let _ = model.jump_to_offset(Instant::now());
            self.offset_input = model.offset_input().to_string();
        }

        if let Some(notice) = model.notice() {
            ui.same_line();
            let color = if notice.is_error { ERROR_COLOR } else { INFO_COLOR };
            ui.text_colored(color, &notice.message);
        }
    }

    fn render_status_bar(&self, ui: &Ui, model: &HexViewerModel) {
        if model.is_loading() {
            ui.text("Loading...");
            return;
        }
        if model.buffer().is_none() {
            ui.text("");
            return;
        }

        let window = model.viewport();
        let mut status = if model.total_rows() == 0 {
            "0 rows".to_string()
        } else {
            format!(
                "Rows {}-{} of {} (showing {})",
                format_number(window.visible_start + 1),
                format_number(window.visible_end),
                format_number(model.total_rows()),
                window.visible_count()
            )
        };

        if let Some(offset) = self.hex_view.hovered_offset() {
            if let Some(byte) = model
                .buffer()
                .and_then(|b| b.as_slice().get(offset as usize))
            {
                status += &format!(
                    "    {}: 0x{:02X} ({})",
                    format_offset(offset),
                    byte,
                    byte
                );
            }
        }

        ui.text(status);
    }
}

impl Default for HexViewerUI {
    fn default() -> Self {
        Self::new()
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes = s.as_bytes();
    let mut result = String::new();
    for (i, &b) in bytes.iter().enumerate() {
        if i > 0 && (bytes.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(b as char);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(625_000), "625,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
