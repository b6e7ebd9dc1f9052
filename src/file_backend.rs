use crate::backend::{Backend, LoadRequest};
use crate::error::LoadError;
use crate::events::LoadEvent;
use crate::loader::{ChunkedFileLoader, FileSource, push_event, run_load};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};

// ---------------------------------------------------------------------------
// FileBackend
// ---------------------------------------------------------------------------

/// Loads local files on a dedicated thread hosting a single-threaded tokio
/// runtime. Requests run one at a time, in order; a superseded request stops
/// at its next chunk boundary once its cancel flag is set.
pub struct FileBackend {
    _event_tx: mpsc::Sender<LoadEvent>,
    event_rx: Mutex<mpsc::Receiver<LoadEvent>>,
    queue: Arc<Mutex<VecDeque<LoadRequest>>>,
    notify: Arc<tokio::sync::Notify>,
    shutdown: Arc<AtomicBool>,
    runtime_handle: Option<std::thread::JoinHandle<()>>,
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        log::info!("FileBackend: shutting down");
        self.cancel_all();
        self.shutdown.store(true, Ordering::SeqCst);
        // Stores a permit if the worker is not parked yet.
        self.notify.notify_one();
        if let Some(handle) = self.runtime_handle.take() {
            if handle.join().is_err() {
                log::error!("FileBackend: worker thread panicked");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

async fn worker(
    queue: Arc<Mutex<VecDeque<LoadRequest>>>,
    notify: Arc<tokio::sync::Notify>,
    shutdown: Arc<AtomicBool>,
    event_tx: mpsc::Sender<LoadEvent>,
) {
    loop {
        let item = lock(&queue).pop_front();
        match item {
            Some(request) => process_request(request, &event_tx).await,
            None => {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                notify.notified().await;
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
            }
        }
    }
}

async fn process_request(request: LoadRequest, event_tx: &mpsc::Sender<LoadEvent>) {
    if request.cancel_flag.load(Ordering::Relaxed) {
        log::info!(
            "FileBackend: skipping superseded generation {} ({})",
            request.generation,
            request.path.display()
        );
        return;
    }

    let mut source = match FileSource::open(&request.path).await {
        Ok(source) => source,
        Err(e) => {
            log::error!("FileBackend: cannot open {}: {}", request.path.display(), e);
            push_event(
                event_tx,
                LoadEvent::Failed {
                    generation: request.generation,
                    error: LoadError::read_failure(0, e),
                },
            );
            return;
        }
    };

    let declared_size = source.declared_size().await;
    let loader = ChunkedFileLoader::new(request.config);
    run_load(
        &loader,
        &mut source,
        declared_size,
        request.generation,
        Some(&request.cancel_flag),
        event_tx,
    )
    .await;
}

// ---------------------------------------------------------------------------
// Construction + Backend trait
// ---------------------------------------------------------------------------

impl FileBackend {
    pub fn new() -> io::Result<Self> {
        let (event_tx, event_rx) = mpsc::channel();
        let queue: Arc<Mutex<VecDeque<LoadRequest>>> = Arc::new(Mutex::new(VecDeque::new()));
        let notify = Arc::new(tokio::sync::Notify::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let rt_queue = Arc::clone(&queue);
        let rt_notify = Arc::clone(&notify);
        let rt_shutdown = Arc::clone(&shutdown);
        let rt_event_tx = event_tx.clone();

        let handle = std::thread::Builder::new()
            .name("hex-loader".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        log::error!("FileBackend: failed to create tokio runtime: {}", e);
                        return;
                    }
                };

                rt.block_on(async move {
                    log::info!("FileBackend: worker started");
                    worker(rt_queue, rt_notify, rt_shutdown, rt_event_tx).await;
                    log::info!("FileBackend: worker exiting");
                });
            })?;

        Ok(FileBackend {
            _event_tx: event_tx,
            event_rx: Mutex::new(event_rx),
            queue,
            notify,
            shutdown,
            runtime_handle: Some(handle),
        })
    }
}

impl Backend for FileBackend {
    fn take_events(&self) -> Vec<LoadEvent> {
        let rx = lock(&self.event_rx);
        rx.try_iter().collect()
    }

    fn load(&self, request: LoadRequest) {
        log::info!(
            "FileBackend: queuing load generation={} path={}",
            request.generation,
            request.path.display()
        );
        lock(&self.queue).push_back(request);
        self.notify.notify_one();
    }

    fn cancel_all(&self) {
        let mut queue = lock(&self.queue);
        for request in queue.iter() {
            request.cancel_flag.store(true, Ordering::Relaxed);
        }
        queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::new_cancel_flag;
    use crate::loader::LoaderConfig;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn wait_for_terminal(backend: &FileBackend, generation: u64) -> Vec<LoadEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            events.extend(backend.take_events());
            if events.iter().any(|e| e.generation() == generation && e.is_terminal()) {
                return events;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("no terminal event for generation {}", generation);
    }

    fn request(generation: u64, path: PathBuf) -> LoadRequest {
        LoadRequest {
            generation,
            path,
            config: LoaderConfig { chunk_size: 256, small_file_threshold: 1024 },
            cancel_flag: new_cancel_flag(),
        }
    }

    #[test]
    fn test_backend_loads_file() {
        let data: Vec<u8> = (0..4000u32).map(|i| (i % 256) as u8).collect();
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();

        let backend = FileBackend::new().unwrap();
        backend.load(request(1, tmp.path().to_path_buf()));

        let events = wait_for_terminal(&backend, 1);
        assert!(matches!(events[0], LoadEvent::Started { file_size: 4000, .. }));
        let progress_count = events
            .iter()
            .filter(|e| matches!(e, LoadEvent::Progress { .. }))
            .count();
        assert_eq!(progress_count, 16);
        match events.last().unwrap() {
            LoadEvent::Loaded { buffer, .. } => assert_eq!(buffer.as_slice(), &data[..]),
            other => panic!("unexpected final event {:?}", other),
        }
    }

    #[test]
    fn test_backend_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new().unwrap();
        backend.load(request(2, dir.path().join("does-not-exist.bin")));

        let events = wait_for_terminal(&backend, 2);
        assert!(matches!(
            events.last().unwrap(),
            LoadEvent::Failed { generation: 2, error: LoadError::ReadFailure { .. } }
        ));
    }

    #[test]
    fn test_cancelled_request_is_skipped() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[1u8; 64]).unwrap();
        tmp.flush().unwrap();

        let backend = FileBackend::new().unwrap();
        let stale = request(1, tmp.path().to_path_buf());
        stale.cancel_flag.store(true, Ordering::SeqCst);
        backend.load(stale);
        backend.load(request(2, tmp.path().to_path_buf()));

        let events = wait_for_terminal(&backend, 2);
        assert!(events.iter().all(|e| e.generation() == 2));
    }

    fn assert_thread_exits(handle: std::thread::JoinHandle<()>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() {
            assert!(Instant::now() < deadline, "hex-loader thread did not exit");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_drop_stops_worker_thread() {
        // Dropped right away: the worker may not be waiting yet.
        for _ in 0..20 {
            let mut backend = FileBackend::new().unwrap();
            let handle = backend.runtime_handle.take().unwrap();
            drop(backend);
            assert_thread_exits(handle);
        }

        // Dropped while idle.
        let mut backend = FileBackend::new().unwrap();
        let handle = backend.runtime_handle.take().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        drop(backend);
        assert_thread_exits(handle);
    }
}
