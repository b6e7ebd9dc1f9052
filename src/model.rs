use crate::backend::{Backend, CancelFlag, LoadRequest, new_cancel_flag};
use crate::buffer::{ByteBuffer, RowView, format_megabytes};
use crate::events::LoadState;
use crate::navigator::{self, NavigationResult, Notice};
use crate::row_math::ROW_HEIGHT_PX;
use crate::settings::ViewerSettings;
use crate::viewport::{self, ViewportState};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Instant;

/// The viewer model - owns all session state and processes backend events.
///
/// Every load request gets a new generation; events tagged with an older
/// generation are dropped in [`HexViewerModel::process_events`], so only the
/// most recent request can ever reach the visible state.
pub struct HexViewerModel {
    backend: Option<Box<dyn Backend>>,
    pub settings: ViewerSettings,

    // Current file
    generation: u64,
    current_path: Option<PathBuf>,
    load: LoadState,
    load_cancel_flag: Option<CancelFlag>,

    // Viewport
    scroll_px: f64,
    viewport_height_px: f64,
    viewport: ViewportState,

    // Offset navigation
    offset_input: String,
    notice: Option<Notice>,
}

impl HexViewerModel {
    pub fn new() -> Self {
        Self {
            backend: None,
            settings: ViewerSettings::default(),
            generation: 0,
            current_path: None,
            load: LoadState::default(),
            load_cancel_flag: None,
            scroll_px: 0.0,
            viewport_height_px: 0.0,
            viewport: ViewportState::default(),
            offset_input: String::new(),
            notice: None,
        }
    }

    pub fn set_backend(&mut self, backend: Box<dyn Backend>) {
        self.backend = Some(backend);
    }

    pub fn set_settings(&mut self, settings: ViewerSettings) {
        self.settings = settings;
        self.recompute_window();
    }

    // File selection

    /// Start loading `path`, superseding whatever was loading or loaded.
    /// The whole session (buffer, scroll, input, notice) starts over.
    pub fn open_file(&mut self, path: &Path) {
        self.cancel_current_load();
        self.generation += 1;
        self.current_path = Some(path.to_path_buf());
        self.reset_session(LoadState::loading());
        self.settings.record_recent_file(path);

        let cancel_flag = new_cancel_flag();
        self.load_cancel_flag = Some(cancel_flag.clone());

        match self.backend {
            Some(ref backend) => backend.load(LoadRequest {
                generation: self.generation,
                path: path.to_path_buf(),
                config: self.settings.loader_config(),
                cancel_flag,
            }),
            None => log::warn!("model: no backend, cannot load {}", path.display()),
        }
    }

    /// Forget the current file; any in-flight load becomes stale.
    pub fn clear_file(&mut self) {
        self.cancel_current_load();
        self.generation += 1;
        self.current_path = None;
        self.reset_session(LoadState::default());
    }

    fn reset_session(&mut self, load: LoadState) {
        self.load = load;
        self.scroll_px = 0.0;
        self.offset_input.clear();
        self.notice = None;
        self.recompute_window();
    }

    fn cancel_current_load(&mut self) {
        if let Some(ref flag) = self.load_cancel_flag {
            flag.store(true, Ordering::Relaxed);
        }
        self.load_cancel_flag = None;
        if let Some(ref backend) = self.backend {
            backend.cancel_all();
        }
    }

    /// Process events from backend. Returns true if any current-generation
    /// event was applied.
    pub fn process_events(&mut self) -> bool {
        let backend = match &self.backend {
            Some(b) => b,
            None => return false,
        };

        let events = backend.take_events();
        if events.is_empty() {
            return false;
        }

        let previous_rows = self.load.total_rows;
        let mut applied = false;
        for event in events {
            if event.generation() != self.generation {
                log::debug!(
                    "model: dropping stale event from generation {} (current {})",
                    event.generation(),
                    self.generation
                );
                continue;
            }
            if event.is_terminal() {
                self.load_cancel_flag = None;
            }
            self.load.apply(event);
            applied = true;
        }

        if self.load.total_rows != previous_rows {
            self.scroll_px = self.clamped(self.scroll_px);
            self.recompute_window();
        }
        applied
    }

    // Scrolling

    pub fn set_scroll_position(&mut self, scroll_px: f64) {
        self.scroll_px = self.clamped(scroll_px);
        self.recompute_window();
    }

    pub fn scroll_by_rows(&mut self, rows: f64) {
        self.set_scroll_position(self.scroll_px + rows * ROW_HEIGHT_PX);
    }

    pub fn scroll_by_pages(&mut self, pages: f64) {
        let page = (self.viewport_height_px - ROW_HEIGHT_PX).max(ROW_HEIGHT_PX);
        self.set_scroll_position(self.scroll_px + pages * page);
    }

    pub fn scroll_to_start(&mut self) {
        self.set_scroll_position(0.0);
    }

    pub fn scroll_to_end(&mut self) {
        self.set_scroll_position(viewport::max_scroll(
            self.load.total_rows,
            self.viewport_height_px,
        ));
    }

    /// Height of the area the rows are drawn in. Bounds both the window
    /// capacity and the scroll range.
    pub fn set_viewport_height(&mut self, height_px: f64) {
        if height_px == self.viewport_height_px {
            return;
        }
        self.viewport_height_px = height_px.max(0.0);
        self.scroll_px = self.clamped(self.scroll_px);
        self.recompute_window();
    }

    fn clamped(&self, scroll_px: f64) -> f64 {
        viewport::clamp_scroll(scroll_px, self.load.total_rows, self.viewport_height_px)
    }

    fn window_capacity(&self) -> u64 {
        let configured = self.settings.window_rows();
        if self.viewport_height_px > 0.0 {
            configured.min(viewport::capacity_for_height(self.viewport_height_px))
        } else {
            configured
        }
    }

    fn recompute_window(&mut self) {
        self.viewport = viewport::compute_window(
            self.scroll_px,
            self.load.total_rows,
            self.window_capacity(),
        );
    }

    // Offset navigation

    /// Editing the input dismisses a rejection left by the previous jump.
    pub fn set_offset_input(&mut self, text: &str) {
        if self.offset_input == text {
            return;
        }
        self.offset_input = text.to_string();
        if self.notice.as_ref().is_some_and(|n| n.is_error) {
            self.notice = None;
        }
    }

    /// Offset navigation is offered only once bytes are loaded.
    pub fn can_navigate(&self) -> bool {
        self.load.buffer.is_some()
    }

    pub fn can_jump(&self) -> bool {
        navigator::can_jump(&self.offset_input)
    }

    /// Resolve the offset input and scroll to it. Success clears the input
    /// and posts a confirmation that expires; a rejection posts an error that
    /// stays until the input changes or the next attempt.
    pub fn jump_to_offset(&mut self, now: Instant) -> NavigationResult {
        let result = navigator::resolve(&self.offset_input, self.load.buffer.as_ref());
        match &result {
            Ok(jump) => {
                self.set_scroll_position(jump.scroll_target_px);
                self.offset_input.clear();
                self.notice = Some(Notice::info(jump.confirmation(), now));
            }
            Err(e) => {
                log::debug!("model: rejected offset {:?}: {}", self.offset_input, e);
                self.notice = Some(Notice::error(e.to_string()));
            }
        }
        result
    }

    /// Expire the notice. Returns true if it was cleared.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.notice {
            Some(ref notice) if notice.is_expired(now) => {
                self.notice = None;
                true
            }
            _ => false,
        }
    }

    // Accessors

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn buffer(&self) -> Option<&ByteBuffer> {
        self.load.buffer.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.load.is_loading
    }

    pub fn progress(&self) -> f64 {
        self.load.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.load.error.as_deref()
    }

    pub fn total_rows(&self) -> u64 {
        self.load.total_rows
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn scroll_position(&self) -> f64 {
        self.scroll_px
    }

    pub fn visible_rows(&self) -> Vec<RowView<'_>> {
        match self.load.buffer {
            Some(ref buffer) => self.viewport.visible_rows(buffer).collect(),
            None => Vec::new(),
        }
    }

    pub fn offset_input(&self) -> &str {
        &self.offset_input
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// "File: name (x.xx MB)" for the current file.
    pub fn file_label(&self) -> Option<String> {
        let path = self.current_path.as_ref()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Some(format!("File: {} ({})", name, format_megabytes(self.load.file_size)))
    }
}

impl Default for HexViewerModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HexViewerModel {
    fn drop(&mut self) {
        if let Some(ref flag) = self.load_cancel_flag {
            flag.store(true, Ordering::Relaxed);
        }
    }
}
