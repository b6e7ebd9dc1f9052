//! Chunked file loading with progress reporting.
//!
//! Small files are read in a single pass. Larger files are read as a sequence
//! of fixed-size chunks; after each chunk the loader reports progress and
//! yields to the scheduler so the task never monopolises its thread for the
//! whole read. Chunks are read strictly in order and concatenated into one
//! contiguous [`ByteBuffer`].

use crate::backend::{CancelFlag, is_cancelled};
use crate::buffer::ByteBuffer;
use crate::error::LoadError;
use crate::events::LoadEvent;
use std::future::Future;
use std::io::{self, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Nominal chunk size for large files: 1 MiB.
pub const CHUNK_SIZE: u64 = 1024 * 1024;

/// Files below this size are read in one pass: 10 MiB.
pub const SMALL_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    pub chunk_size: u64,
    pub small_file_threshold: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            small_file_threshold: SMALL_FILE_THRESHOLD,
        }
    }
}

/// How a file of a given size is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadPlan {
    SinglePass { size: u64 },
    Chunked { size: u64, chunk_size: u64, total_chunks: u64 },
}

impl LoadPlan {
    pub fn for_size(size: u64, config: &LoaderConfig) -> Self {
        if size < config.small_file_threshold {
            return LoadPlan::SinglePass { size };
        }
        let chunk_size = config.chunk_size.max(1);
        LoadPlan::Chunked {
            size,
            chunk_size,
            total_chunks: size.div_ceil(chunk_size),
        }
    }

    pub fn size(&self) -> u64 {
        match *self {
            LoadPlan::SinglePass { size } | LoadPlan::Chunked { size, .. } => size,
        }
    }

    pub fn total_chunks(&self) -> u64 {
        match *self {
            LoadPlan::SinglePass { .. } => 1,
            LoadPlan::Chunked { total_chunks, .. } => total_chunks,
        }
    }

    /// Byte range of chunk `index`; the final chunk ends at `size`.
    pub fn chunk_range(&self, index: u64) -> Range<u64> {
        match *self {
            LoadPlan::SinglePass { size } => 0..size,
            LoadPlan::Chunked { size, chunk_size, .. } => {
                let start = index.saturating_mul(chunk_size).min(size);
                let end = start.saturating_add(chunk_size).min(size);
                start..end
            }
        }
    }
}

/// Progress after a completed chunk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadProgress {
    pub completed_chunks: u64,
    pub total_chunks: u64,
    pub bytes_read: u64,
}

impl LoadProgress {
    pub fn fraction(&self) -> f64 {
        if self.total_chunks == 0 {
            return 1.0;
        }
        self.completed_chunks as f64 / self.total_chunks as f64
    }
}

/// Random-access byte source. Never written to.
pub trait ByteSource: Send {
    /// Read exactly `range`, or fail.
    fn read_range(&mut self, range: Range<u64>) -> impl Future<Output = io::Result<Vec<u8>>> + Send;
}

/// A file on disk, read through tokio.
pub struct FileSource {
    file: tokio::fs::File,
    path: PathBuf,
}

impl FileSource {
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Size reported by the file system, `None` when it cannot be determined.
    pub async fn declared_size(&self) -> Option<i64> {
        match self.file.metadata().await {
            Ok(meta) => i64::try_from(meta.len()).ok(),
            Err(e) => {
                log::warn!("Loader: cannot stat {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

impl ByteSource for FileSource {
    async fn read_range(&mut self, range: Range<u64>) -> io::Result<Vec<u8>> {
        let len = usize::try_from(range.end - range.start)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large"))?;
        self.file.seek(SeekFrom::Start(range.start)).await?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

/// In-memory source with optional injected read failure.
#[cfg(test)]
pub struct MemorySource {
    bytes: Vec<u8>,
    fail_at: Option<u64>,
}

#[cfg(test)]
impl MemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, fail_at: None }
    }

    /// Any read whose range contains `offset` fails.
    pub fn failing_at(mut self, offset: u64) -> Self {
        self.fail_at = Some(offset);
        self
    }
}

#[cfg(test)]
impl ByteSource for MemorySource {
    async fn read_range(&mut self, range: Range<u64>) -> io::Result<Vec<u8>> {
        if let Some(at) = self.fail_at {
            if range.contains(&at) {
                return Err(io::Error::other(format!("simulated read error at {}", at)));
            }
        }
        let len = self.bytes.len() as u64;
        let start = range.start.min(len) as usize;
        let end = range.end.min(len) as usize;
        Ok(self.bytes[start..end].to_vec())
    }
}

/// A declared size must be known and non-negative.
pub fn validate_size(declared_size: Option<i64>) -> Result<u64, LoadError> {
    match declared_size {
        Some(size) if size >= 0 => Ok(size as u64),
        _ => Err(LoadError::SizeUnavailable),
    }
}

pub struct ChunkedFileLoader {
    config: LoaderConfig,
}

impl ChunkedFileLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Read `source` completely. `on_progress` runs after every chunk of a
    /// chunked load; the cancel flag is checked before each chunk so a
    /// superseded load stops issuing reads.
    pub async fn load<S, F>(
        &self,
        source: &mut S,
        declared_size: Option<i64>,
        cancel: Option<&CancelFlag>,
        mut on_progress: F,
    ) -> Result<ByteBuffer, LoadError>
    where
        S: ByteSource,
        F: FnMut(LoadProgress),
    {
        let size = validate_size(declared_size)?;
        let capacity = usize::try_from(size)
            .map_err(|_| LoadError::read_failure(0, "file too large to hold in memory"))?;
        let plan = LoadPlan::for_size(size, &self.config);

        if let LoadPlan::SinglePass { .. } = plan {
            let bytes = read_exact_range(source, plan.chunk_range(0)).await?;
            return Ok(ByteBuffer::new(bytes));
        }

        let total_chunks = plan.total_chunks();
        let mut data = Vec::with_capacity(capacity);
        for index in 0..total_chunks {
            if is_cancelled(cancel) {
                return Err(LoadError::Superseded);
            }

            let chunk = read_exact_range(source, plan.chunk_range(index)).await?;
            data.extend_from_slice(&chunk);

            on_progress(LoadProgress {
                completed_chunks: index + 1,
                total_chunks,
                bytes_read: data.len() as u64,
            });

            tokio::task::yield_now().await;
        }

        Ok(ByteBuffer::new(data))
    }
}

async fn read_exact_range<S: ByteSource>(
    source: &mut S,
    range: Range<u64>,
) -> Result<Vec<u8>, LoadError> {
    let expected = range.end - range.start;
    let start = range.start;
    let bytes = source
        .read_range(range)
        .await
        .map_err(|e| LoadError::read_failure(start, e))?;
    if bytes.len() as u64 != expected {
        return Err(LoadError::read_failure(
            start,
            format!("short read: expected {} bytes, got {}", expected, bytes.len()),
        ));
    }
    Ok(bytes)
}

/// Send an event to the model. Silently drops if the receiver is gone.
pub fn push_event(tx: &mpsc::Sender<LoadEvent>, event: LoadEvent) {
    let _ = tx.send(event);
}

/// Run one load request, reporting every step as a [`LoadEvent`] tagged with
/// `generation`. A superseded load ends silently.
pub async fn run_load<S: ByteSource>(
    loader: &ChunkedFileLoader,
    source: &mut S,
    declared_size: Option<i64>,
    generation: u64,
    cancel: Option<&CancelFlag>,
    events: &mpsc::Sender<LoadEvent>,
) {
    let file_size = match validate_size(declared_size) {
        Ok(size) => size,
        Err(error) => {
            log::warn!("Loader: generation {} has no usable size ({:?})", generation, declared_size);
            push_event(events, LoadEvent::Failed { generation, error });
            return;
        }
    };

    let plan = LoadPlan::for_size(file_size, loader.config());
    log::info!(
        "Loader: generation {} reading {} bytes as {} chunk(s)",
        generation,
        file_size,
        plan.total_chunks()
    );
    push_event(events, LoadEvent::Started { generation, file_size });

    let result = loader
        .load(source, declared_size, cancel, |p| {
            log::debug!(
                "Loader: generation {} chunk {}/{} ({} bytes)",
                generation,
                p.completed_chunks,
                p.total_chunks,
                p.bytes_read
            );
            push_event(
                events,
                LoadEvent::Progress {
                    generation,
                    progress: p.fraction(),
                    bytes_read: p.bytes_read,
                },
            );
        })
        .await;

    match result {
        Ok(buffer) => {
            log::info!("Loader: generation {} complete ({} bytes)", generation, buffer.len());
            push_event(events, LoadEvent::Loaded { generation, buffer });
        }
        Err(LoadError::Superseded) => {
            log::info!("Loader: generation {} superseded, stopping", generation);
        }
        Err(error) => {
            log::error!("Loader: generation {} failed: {}", generation, error);
            push_event(events, LoadEvent::Failed { generation, error });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory source that records every range it is asked for.
    struct RecordingSource {
        inner: MemorySource,
        reads: Vec<Range<u64>>,
    }

    impl ByteSource for RecordingSource {
        async fn read_range(&mut self, range: Range<u64>) -> io::Result<Vec<u8>> {
            self.reads.push(range.clone());
            self.inner.read_range(range).await
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn chunked_always() -> LoaderConfig {
        LoaderConfig {
            chunk_size: CHUNK_SIZE,
            small_file_threshold: 0,
        }
    }

    fn drain(rx: &mpsc::Receiver<LoadEvent>) -> Vec<LoadEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_plan_threshold() {
        let config = LoaderConfig::default();
        assert_eq!(
            LoadPlan::for_size(SMALL_FILE_THRESHOLD - 1, &config),
            LoadPlan::SinglePass { size: SMALL_FILE_THRESHOLD - 1 }
        );
        let plan = LoadPlan::for_size(SMALL_FILE_THRESHOLD, &config);
        assert_eq!(plan.total_chunks(), 10);
        assert_eq!(plan.chunk_range(9), 9 * CHUNK_SIZE..10 * CHUNK_SIZE);
    }

    #[test]
    fn test_plan_final_chunk_is_short() {
        let plan = LoadPlan::for_size(10_000_000, &chunked_always());
        assert_eq!(plan.total_chunks(), 10);
        let last = plan.chunk_range(9);
        assert_eq!(last.end, 10_000_000);
        assert_eq!(last.end - last.start, 10_000_000 % CHUNK_SIZE);
    }

    #[test]
    fn test_validate_size() {
        assert_eq!(validate_size(Some(0)), Ok(0));
        assert_eq!(validate_size(Some(42)), Ok(42));
        assert_eq!(validate_size(Some(-1)), Err(LoadError::SizeUnavailable));
        assert_eq!(validate_size(None), Err(LoadError::SizeUnavailable));
    }

    #[tokio::test]
    async fn test_chunked_load_matches_single_pass() {
        let data = pattern(10_000_000);

        let mut single = MemorySource::new(data.clone());
        let single_buf = ChunkedFileLoader::new(LoaderConfig::default())
            .load(&mut single, Some(10_000_000), None, |_| {})
            .await
            .unwrap();

        let mut chunked = RecordingSource {
            inner: MemorySource::new(data.clone()),
            reads: Vec::new(),
        };
        let mut progress = Vec::new();
        let chunked_buf = ChunkedFileLoader::new(chunked_always())
            .load(&mut chunked, Some(10_000_000), None, |p| progress.push(p.fraction()))
            .await
            .unwrap();

        assert_eq!(chunked_buf.len(), 10_000_000);
        assert_eq!(chunked_buf.as_slice(), single_buf.as_slice());
        assert_eq!(chunked_buf.as_slice(), &data[..]);
        assert_eq!(chunked_buf.total_rows(), 625_000);

        assert_eq!(chunked.reads.len(), 10);
        let last = chunked.reads.last().unwrap();
        assert_eq!(last.end - last.start, 10_000_000 % CHUNK_SIZE);
        for pair in chunked.reads.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }

        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last().copied(), Some(1.0));
    }

    #[tokio::test]
    async fn test_small_file_single_read() {
        let mut source = RecordingSource {
            inner: MemorySource::new(pattern(1000)),
            reads: Vec::new(),
        };
        let mut calls = 0;
        let buf = ChunkedFileLoader::new(LoaderConfig::default())
            .load(&mut source, Some(1000), None, |_| calls += 1)
            .await
            .unwrap();
        assert_eq!(buf.len(), 1000);
        assert_eq!(source.reads, vec![0..1000]);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_empty_file() {
        let mut source = MemorySource::new(Vec::new());
        let buf = ChunkedFileLoader::new(LoaderConfig::default())
            .load(&mut source, Some(0), None, |_| {})
            .await
            .unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.total_rows(), 0);
    }

    #[tokio::test]
    async fn test_size_unavailable() {
        let loader = ChunkedFileLoader::new(LoaderConfig::default());
        let mut source = MemorySource::new(vec![1, 2, 3]);
        assert_eq!(
            loader.load(&mut source, None, None, |_| {}).await,
            Err(LoadError::SizeUnavailable)
        );
        assert_eq!(
            loader.load(&mut source, Some(-5), None, |_| {}).await,
            Err(LoadError::SizeUnavailable)
        );
    }

    #[tokio::test]
    async fn test_chunk_read_failure() {
        let config = LoaderConfig { chunk_size: 64, small_file_threshold: 0 };
        let mut source = MemorySource::new(pattern(1000)).failing_at(300);
        let mut progress = Vec::new();
        let err = ChunkedFileLoader::new(config)
            .load(&mut source, Some(1000), None, |p| progress.push(p.completed_chunks))
            .await
            .unwrap_err();
        match err {
            LoadError::ReadFailure { offset, message } => {
                assert_eq!(offset, 256);
                assert!(message.contains("simulated read error"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(progress, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_short_read_is_failure() {
        // Declared size larger than the data actually available.
        let mut source = MemorySource::new(pattern(100));
        let err = ChunkedFileLoader::new(LoaderConfig::default())
            .load(&mut source, Some(200), None, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::ReadFailure { offset: 0, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_load_stops_reading() {
        let config = LoaderConfig { chunk_size: 10, small_file_threshold: 0 };
        let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
        let mut source = RecordingSource {
            inner: MemorySource::new(pattern(100)),
            reads: Vec::new(),
        };
        let flag = Arc::clone(&cancel);
        let result = ChunkedFileLoader::new(config)
            .load(&mut source, Some(100), Some(&cancel), move |p| {
                if p.completed_chunks == 3 {
                    flag.store(true, Ordering::SeqCst);
                }
            })
            .await;
        assert_eq!(result, Err(LoadError::Superseded));
        assert_eq!(source.reads.len(), 3);
    }

    #[tokio::test]
    async fn test_run_load_emits_events_in_order() {
        let (tx, rx) = mpsc::channel();
        let loader = ChunkedFileLoader::new(LoaderConfig { chunk_size: 16, small_file_threshold: 32 });
        let mut source = MemorySource::new(pattern(40));

        run_load(&loader, &mut source, Some(40), 7, None, &tx).await;

        let events = drain(&rx);
        assert!(events.iter().all(|e| e.generation() == 7));
        assert!(matches!(events[0], LoadEvent::Started { file_size: 40, .. }));
        let progress: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                LoadEvent::Progress { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 3);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress[2], 1.0);
        match events.last().unwrap() {
            LoadEvent::Loaded { buffer, .. } => assert_eq!(buffer.as_slice(), &pattern(40)[..]),
            other => panic!("unexpected final event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_load_reports_size_failure() {
        let (tx, rx) = mpsc::channel();
        let loader = ChunkedFileLoader::new(LoaderConfig::default());
        let mut source = MemorySource::new(Vec::new());

        run_load(&loader, &mut source, None, 3, None, &tx).await;

        let events = drain(&rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            LoadEvent::Failed { generation: 3, error: LoadError::SizeUnavailable }
        ));
    }

    #[tokio::test]
    async fn test_file_source_reads_real_file() {
        let data = pattern(5000);
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();

        let mut source = FileSource::open(tmp.path()).await.unwrap();
        let declared = source.declared_size().await;
        assert_eq!(declared, Some(5000));

        let config = LoaderConfig { chunk_size: 1024, small_file_threshold: 0 };
        let buf = ChunkedFileLoader::new(config)
            .load(&mut source, declared, None, |_| {})
            .await
            .unwrap();
        assert_eq!(buf.as_slice(), &data[..]);
    }

    #[tokio::test]
    async fn test_file_source_truncated_file_fails() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&pattern(100)).unwrap();
        tmp.flush().unwrap();

        let mut source = FileSource::open(tmp.path()).await.unwrap();
        // Size declared before the file shrank.
        let err = ChunkedFileLoader::new(LoaderConfig::default())
            .load(&mut source, Some(4096), None, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::ReadFailure { .. }));
    }
}
