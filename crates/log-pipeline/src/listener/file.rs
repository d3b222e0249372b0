//! File tail listener.
//!
//! Watches files and emits one raw log event per appended line, in file
//! order, like `tail -f`.
//!
//! Each watched path owns:
//! - a `notify` watcher whose callback only signals a capacity-1 channel, so
//!   bursts of change notifications coalesce into one read cycle
//! - a tail task, the single consumer of that channel, which runs every read
//!   cycle for the path
//! - the tail state (offset, open handle, carry-over bytes) behind a
//!   `tokio::sync::Mutex`
//!
//! # Read cycle
//! - file shorter than the offset: truncated, restart from 0
//! - read `chunk_size` bytes at a time until EOF, advancing the offset per chunk
//! - split on `\n`, strip a trailing `\r`, skip empty lines
//! - a trailing fragment without newline waits for the next cycle

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::BytesMut;
use logwatch_core::event::{RawLogEvent, SOURCE_FILE_LISTENER};
use logwatch_core::metrics as m;
use logwatch_core::types::ListenerOptions;
use notify::{Event as FsEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::EventBus;
use crate::error::LogPipelineError;
use crate::parser::MAX_LINE_LENGTH;

/// File listener settings.
#[derive(Debug, Clone)]
pub struct FileListenerConfig {
    /// Bytes read per chunk
    pub chunk_size: usize,
    /// Read cycle period in addition to change notifications
    pub poll_interval: Option<Duration>,
}

impl Default for FileListenerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2048,
            poll_interval: None,
        }
    }
}

#[derive(Debug)]
struct TailState {
    offset: u64,
    /// `None` once the listener is disabled
    file: Option<File>,
    /// bytes of an incomplete trailing line
    pending: BytesMut,
    /// skipping the rest of an oversized line up to its newline
    discarding: bool,
}

struct WatchedPath {
    options: ListenerOptions,
    tail: Arc<tokio::sync::Mutex<TailState>>,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

/// Tails files and emits raw log events on the bus.
pub struct FileListener {
    config: FileListenerConfig,
    bus: EventBus,
    cancel: CancellationToken,
    paths: Mutex<HashMap<PathBuf, WatchedPath>>,
}

impl FileListener {
    pub fn new(config: FileListenerConfig, bus: EventBus, cancel: CancellationToken) -> Self {
        Self {
            config,
            bus,
            cancel,
            paths: Mutex::new(HashMap::new()),
        }
    }

    /// Starts tailing `options.path`.
    ///
    /// Failures are logged and returned; nothing is registered for the path
    /// in that case. Watching an already watched path is a no-op.
    pub async fn watch(&self, options: ListenerOptions) -> Result<(), LogPipelineError> {
        let path = options.path.clone();
        if self.lock().contains_key(&path) {
            warn!(path = %path.display(), "path already watched, ignoring");
            return Ok(());
        }

        match self.start(options).await {
            Ok(watched) => {
                info!(
                    path = %path.display(),
                    read_all_on_start = watched.options.read_all_on_start,
                    "watching file"
                );
                self.lock().insert(path, watched);
                Ok(())
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to watch file");
                Err(e)
            }
        }
    }

    async fn start(&self, options: ListenerOptions) -> Result<WatchedPath, LogPipelineError> {
        let path = options.path.clone();
        let listener_err = |reason: String| LogPipelineError::Listener {
            path: path.display().to_string(),
            reason,
        };

        let offset = if options.read_all_on_start {
            0
        } else {
            tokio::fs::metadata(&path)
                .await
                .map_err(|e| listener_err(format!("stat failed: {e}")))?
                .len()
        };
        let file = File::open(&path)
            .await
            .map_err(|e| listener_err(format!("open failed: {e}")))?;

        let (signal_tx, signal_rx) = mpsc::channel::<()>(1);
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<FsEvent, notify::Error>| match res {
                Ok(event) if !matches!(event.kind, EventKind::Access(_)) => {
                    // full channel means a cycle is already pending
                    let _ = signal_tx.try_send(());
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "file watcher error"),
            },
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        let tail = Arc::new(tokio::sync::Mutex::new(TailState {
            offset,
            file: Some(file),
            pending: BytesMut::new(),
            discarding: false,
        }));
        let cancel = self.cancel.child_token();
        let task = tokio::spawn(tail_loop(TailTask {
            path: path.clone(),
            tail: Arc::clone(&tail),
            signals: signal_rx,
            bus: self.bus.clone(),
            chunk_size: self.config.chunk_size.max(1),
            poll_interval: self.config.poll_interval,
            initial_read: options.read_all_on_start,
            cancel: cancel.clone(),
        }));

        Ok(WatchedPath {
            options,
            tail,
            watcher: Some(watcher),
            task: Some(task),
            cancel,
        })
    }

    /// Stops every tail task, drops every watcher and closes every handle.
    ///
    /// The watched paths stay registered. Calling it twice is harmless.
    pub async fn disable(&self) {
        let mut stopped = Vec::new();
        {
            let mut paths = self.lock();
            for (path, watched) in paths.iter_mut() {
                watched.cancel.cancel();
                watched.watcher.take();
                stopped.push((path.clone(), watched.task.take(), Arc::clone(&watched.tail)));
            }
        }

        for (path, task, tail) in stopped {
            if let Some(task) = task
                && let Err(e) = task.await
            {
                warn!(path = %path.display(), error = %e, "tail task ended abnormally");
            }
            tail.lock().await.file = None;
            debug!(path = %path.display(), "file listener disabled");
        }
    }

    /// Paths registered through [`watch`](Self::watch).
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    /// Options a path was registered with.
    pub fn options(&self, path: &Path) -> Option<ListenerOptions> {
        self.lock().get(path).map(|w| w.options.clone())
    }

    /// Current read offset of `path`.
    pub async fn offset(&self, path: &Path) -> Option<u64> {
        let tail = self.lock().get(path).map(|w| Arc::clone(&w.tail))?;
        let offset = tail.lock().await.offset;
        Some(offset)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, WatchedPath>> {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct TailTask {
    path: PathBuf,
    tail: Arc<tokio::sync::Mutex<TailState>>,
    signals: mpsc::Receiver<()>,
    bus: EventBus,
    chunk_size: usize,
    poll_interval: Option<Duration>,
    initial_read: bool,
    cancel: CancellationToken,
}

async fn tail_loop(mut task: TailTask) {
    if task.initial_read {
        run_cycle(&task).await;
    }

    let mut poll = task.poll_interval.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            _ = task.cancel.cancelled() => break,
            signal = task.signals.recv() => {
                if signal.is_none() {
                    // watcher dropped
                    break;
                }
                run_cycle(&task).await;
            }
            _ = next_poll(&mut poll) => {
                run_cycle(&task).await;
            }
        }
    }
    debug!(path = %task.path.display(), "tail task stopped");
}

async fn next_poll(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run_cycle(task: &TailTask) {
    if let Err(e) = read_cycle(&task.path, &task.tail, &task.bus, task.chunk_size).await {
        error!(path = %task.path.display(), error = %e, "read cycle failed");
        metrics::counter!(m::LISTENER_READ_ERRORS_TOTAL).increment(1);
    }
}

/// Reads everything appended since the stored offset and emits complete lines.
///
/// Returns the number of lines emitted.
async fn read_cycle(
    path: &Path,
    tail: &tokio::sync::Mutex<TailState>,
    bus: &EventBus,
    chunk_size: usize,
) -> Result<usize, LogPipelineError> {
    let mut guard = tail.lock().await;
    let state = &mut *guard;
    let Some(file) = state.file.as_mut() else {
        return Ok(0);
    };

    let len = file.metadata().await?.len();
    if len < state.offset {
        info!(
            path = %path.display(),
            offset = state.offset,
            len,
            "file truncated, reading from start"
        );
        state.offset = 0;
        state.pending.clear();
        state.discarding = false;
    }
    file.seek(SeekFrom::Start(state.offset)).await?;

    let mut chunk = vec![0u8; chunk_size];
    let mut emitted = 0;
    loop {
        let n = file.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        state.offset += n as u64;
        state.pending.extend_from_slice(&chunk[..n]);

        if state.discarding {
            match state.pending.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    let _ = state.pending.split_to(pos + 1);
                    state.discarding = false;
                }
                None => {
                    state.pending.clear();
                    continue;
                }
            }
        }

        for line in split_lines(&mut state.pending) {
            bus.emit(RawLogEvent::new(SOURCE_FILE_LISTENER, line, path))
                .await;
            emitted += 1;
        }

        if state.pending.len() > MAX_LINE_LENGTH {
            warn!(
                path = %path.display(),
                size = state.pending.len(),
                "line exceeds maximum length, discarding"
            );
            state.pending.clear();
            state.discarding = true;
        }
    }

    if emitted > 0 {
        debug!(path = %path.display(), lines = emitted, offset = state.offset, "read cycle");
        metrics::counter!(m::LISTENER_LINES_TOTAL).increment(emitted as u64);
    }
    Ok(emitted)
}

/// Removes every complete line from `pending`.
///
/// A trailing `\r` is stripped and empty lines are skipped.
fn split_lines(pending: &mut BytesMut) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
        let raw = pending.split_to(pos + 1);
        let mut line = &raw[..pos];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        if !line.is_empty() {
            lines.push(String::from_utf8_lossy(line).into_owned());
        }
    }
    lines
}
