use crate::buffer::ByteBuffer;
use crate::error::LoadError;
use crate::row_math;

/// Events emitted by the loader for the model to process.
/// Every event carries the generation of the request that produced it.
#[derive(Debug, Clone)]
pub enum LoadEvent {
    Started {
        generation: u64,
        file_size: u64,
    },
    /// Chunked loads only: `completed_chunks / total_chunks`.
    Progress {
        generation: u64,
        progress: f64,
        bytes_read: u64,
    },
    Loaded {
        generation: u64,
        buffer: ByteBuffer,
    },
    Failed {
        generation: u64,
        error: LoadError,
    },
}

impl LoadEvent {
    pub fn generation(&self) -> u64 {
        match self {
            LoadEvent::Started { generation, .. }
            | LoadEvent::Progress { generation, .. }
            | LoadEvent::Loaded { generation, .. }
            | LoadEvent::Failed { generation, .. } => *generation,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadEvent::Loaded { .. } | LoadEvent::Failed { .. })
    }
}

/// What the front end shows for the current file: buffer, loading flag,
/// progress, error and row count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadState {
    pub buffer: Option<ByteBuffer>,
    pub is_loading: bool,
    /// In `[0, 1]`, non-decreasing within one load.
    pub progress: f64,
    pub error: Option<String>,
    /// `ceil(len / 16)` once a buffer exists, else 0.
    pub total_rows: u64,
    /// Declared size of the file being loaded.
    pub file_size: u64,
}

impl LoadState {
    /// State right after a load request is issued.
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    /// Apply one event of the current generation. Terminal states are final:
    /// anything arriving after success or failure is ignored.
    pub fn apply(&mut self, event: LoadEvent) {
        if !self.is_loading {
            return;
        }
        match event {
            LoadEvent::Started { file_size, .. } => {
                self.file_size = file_size;
            }
            LoadEvent::Progress { progress, .. } => {
                self.progress = self.progress.max(progress.clamp(0.0, 1.0));
            }
            LoadEvent::Loaded { buffer, .. } => {
                self.total_rows = row_math::total_rows(buffer.len());
                self.file_size = buffer.len();
                self.buffer = Some(buffer);
                self.progress = 1.0;
                self.is_loading = false;
                self.error = None;
            }
            LoadEvent::Failed { error, .. } => {
                self.buffer = None;
                self.total_rows = 0;
                self.is_loading = false;
                self.error = Some(error.to_string());
            }
        }
    }
}
