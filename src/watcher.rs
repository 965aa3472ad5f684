//! Polls a content provider for composition changes.
//!
//! There is no inotify on an HTTP endpoint, so changes are detected the
//! way a browser client has to: re-fetch on a timer and compare content
//! fingerprints. Transient fetch failures are expected (an editor may
//! truncate the file mid-save) and are swallowed.

use crate::error::FetchError;
use crate::source::{CompositionSource, Fingerprint};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Source of composition text.
///
/// Implementations must bypass any caching layer: every call has to be
/// able to observe the current content, not a stale copy.
pub trait ContentProvider: Send + 'static {
    fn fetch(&mut self) -> Result<String, FetchError>;
}

/// Reads a composition file from disk, fresh on every call.
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContentProvider for FileProvider {
    fn fetch(&mut self) -> Result<String, FetchError> {
        Ok(fs::read_to_string(&self.path)?)
    }
}

/// Event delivered to watcher subscribers.
#[derive(Clone, Debug)]
pub enum WatcherEvent {
    /// Content genuinely changed. The first successful fetch counts as a
    /// change unless the watcher was primed with a baseline fingerprint.
    Changed(CompositionSource),
}

/// Timer-driven change detector for an external composition resource.
pub struct SourceWatcher {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SourceWatcher {
    /// Start polling `provider` every `interval`, delivering events on
    /// the returned channel. The first tick fires immediately.
    pub fn spawn(
        provider: impl ContentProvider,
        interval: Duration,
    ) -> (Self, Receiver<WatcherEvent>) {
        Self::spawn_with_baseline(provider, interval, None)
    }

    /// Like [`SourceWatcher::spawn`], but treats `baseline` as content
    /// already delivered: only genuine deltas from it are reported.
    pub fn spawn_with_baseline(
        mut provider: impl ContentProvider,
        interval: Duration,
        baseline: Option<Fingerprint>,
    ) -> (Self, Receiver<WatcherEvent>) {
        let (tx, rx) = channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = thread::spawn(move || {
            let mut last = baseline;
            while !stop_flag.load(Ordering::Relaxed) {
                match provider.fetch() {
                    Ok(text) => {
                        let source = CompositionSource::new(text);
                        if last != Some(source.fingerprint()) {
                            last = Some(source.fingerprint());
                            info!(
                                fingerprint = %source.fingerprint().short(),
                                "composition changed"
                            );
                            if tx.send(WatcherEvent::Changed(source)).is_err() {
                                // Subscriber went away; nothing left to notify.
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        // Expected mid-save; never fatal.
                        debug!("poll fetch failed: {e}");
                    }
                }

                // Sleep in short steps so stop() takes effect promptly
                // even with long poll intervals.
                let mut remaining = interval;
                while !stop_flag.load(Ordering::Relaxed) && remaining > Duration::ZERO {
                    let step = remaining.min(Duration::from_millis(25));
                    thread::sleep(step);
                    remaining -= step;
                }
            }
        });

        (
            Self {
                stop,
                thread: Some(thread),
            },
            rx,
        )
    }

    /// Cancel the polling timer. Idempotent; safe to call repeatedly.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SourceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
