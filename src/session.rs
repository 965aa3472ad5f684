//! Playback session state machine.
//!
//! Serializes the play/stop/reload lifecycle against a single pattern
//! engine. All commands funnel into one worker thread, evaluations run on
//! helper threads and complete back into the same ordered queue, and a
//! generation counter discards results that a newer command has
//! superseded. The failure mode this closes: stop executes, then a play
//! from a stale timer fires before the new evaluation completes, leaving
//! two overlapping voices.

use crate::engine::{PatternEngine, VoiceHandle};
use crate::error::EngineError;
use crate::source::CompositionSource;
use arc_swap::ArcSwap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

/// Lifecycle state of a playback session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Evaluating,
    Playing,
    Stopping,
    Errored,
}

/// Events published to session subscribers.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    StateChanged(PlaybackState),
    Error(EngineError),
}

/// Cheap queryable view of the session, refreshed on every transition.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    /// Generation of the newest accepted play/reload command.
    pub generation: u64,
    /// Last engine failure; cleared by the next successful evaluation.
    pub last_error: Option<EngineError>,
}

enum Command {
    Load(CompositionSource),
    Stop,
    Shutdown,
}

/// Commands and evaluation completions share one ordered queue; that is
/// what serializes transitions.
enum Msg {
    Command(Command),
    EvalDone {
        generation: u64,
        result: Result<VoiceHandle, EngineError>,
    },
}

/// Controls playback of pattern compositions through an external engine.
///
/// Construct once, drive with [`play`](Self::play) /
/// [`stop`](Self::stop) / [`reload`](Self::reload), shut down explicitly
/// or by dropping. Commands never block; state is observable through
/// [`subscribe`](Self::subscribe) and [`snapshot`](Self::snapshot).
pub struct PlaybackSession {
    tx: Sender<Msg>,
    snapshot: Arc<ArcSwap<SessionSnapshot>>,
    subscribers: Arc<Mutex<Vec<Sender<SessionEvent>>>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PlaybackSession {
    pub fn new(engine: Arc<dyn PatternEngine>) -> Self {
        let (tx, rx) = channel();
        let snapshot = Arc::new(ArcSwap::from_pointee(SessionSnapshot {
            state: PlaybackState::Idle,
            generation: 0,
            last_error: None,
        }));
        let subscribers: Arc<Mutex<Vec<Sender<SessionEvent>>>> =
            Arc::new(Mutex::new(Vec::new()));

        let worker = Worker {
            engine,
            rx,
            tx: tx.clone(),
            snapshot: Arc::clone(&snapshot),
            subscribers: Arc::clone(&subscribers),
            state: PlaybackState::Idle,
            generation: 0,
            inflight: None,
            queued: None,
            active_voice: None,
            last_error: None,
        };
        let handle = thread::spawn(move || worker.run());

        Self {
            tx,
            snapshot,
            subscribers,
            worker: Some(handle),
        }
    }

    /// Evaluate and play a composition. Engine rejection moves the
    /// session to `Errored` without killing it.
    pub fn play(&self, source: CompositionSource) {
        let _ = self.tx.send(Msg::Command(Command::Load(source)));
    }

    /// Stop-then-play as one atomic transition: no competing command can
    /// interleave between the halt and the new evaluation.
    pub fn reload(&self, source: CompositionSource) {
        let _ = self.tx.send(Msg::Command(Command::Load(source)));
    }

    /// Halt all voices. Idempotent; a no-op while idle.
    pub fn stop(&self) {
        let _ = self.tx.send(Msg::Command(Command::Stop));
    }

    /// Current state, generation and last error, without locking.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::clone(&self.snapshot.load())
    }

    /// Register an event subscriber. Dropped receivers are pruned on the
    /// next emit.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Halt the engine, stop the worker and join it.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = self.tx.send(Msg::Command(Command::Shutdown));
            let _ = handle.join();
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

struct InFlight {
    generation: u64,
    /// Set by `stop`: the result is discarded on arrival no matter what.
    abandoned: bool,
}

struct Worker {
    engine: Arc<dyn PatternEngine>,
    rx: Receiver<Msg>,
    tx: Sender<Msg>,
    snapshot: Arc<ArcSwap<SessionSnapshot>>,
    subscribers: Arc<Mutex<Vec<Sender<SessionEvent>>>>,
    state: PlaybackState,
    /// Newest accepted play/reload generation.
    generation: u64,
    inflight: Option<InFlight>,
    /// Latest-wins slot for a load arriving while an evaluation is in
    /// flight. A storm of reloads collapses to the newest source.
    queued: Option<CompositionSource>,
    active_voice: Option<VoiceHandle>,
    last_error: Option<EngineError>,
}

impl Worker {
    fn run(mut self) {
        while let Ok(msg) = self.rx.recv() {
            match msg {
                Msg::Command(Command::Load(source)) => self.on_load(source),
                Msg::Command(Command::Stop) => self.on_stop(),
                Msg::Command(Command::Shutdown) => {
                    self.engine.halt_all();
                    break;
                }
                Msg::EvalDone { generation, result } => {
                    self.on_eval_done(generation, result)
                }
            }
        }
    }

    fn on_load(&mut self, source: CompositionSource) {
        self.generation += 1;
        if self.inflight.is_some() {
            // An evaluation is outstanding and cannot be cancelled; park
            // the newest request until it resolves.
            debug!(generation = self.generation, "load queued behind in-flight evaluation");
            self.queued = Some(source);
            self.publish();
        } else {
            self.begin_load(source);
        }
    }

    fn on_stop(&mut self) {
        self.queued = None;
        if let Some(inflight) = self.inflight.as_mut() {
            inflight.abandoned = true;
        }
        if self.state == PlaybackState::Idle && self.active_voice.is_none() {
            // Already stopped; nothing to do.
            return;
        }
        self.set_state(PlaybackState::Stopping);
        self.engine.halt_all();
        self.active_voice = None;
        self.set_state(PlaybackState::Idle);
        info!("playback stopped");
    }

    /// Stop-if-playing then evaluate, as one uninterruptible sequence:
    /// both halves run before the worker returns to its queue.
    fn begin_load(&mut self, source: CompositionSource) {
        if self.active_voice.is_some() {
            self.set_state(PlaybackState::Stopping);
            self.engine.halt_all();
            self.active_voice = None;
        }

        let generation = self.generation;
        self.inflight = Some(InFlight {
            generation,
            abandoned: false,
        });
        self.set_state(PlaybackState::Evaluating);
        info!(
            generation,
            fingerprint = %source.fingerprint().short(),
            "evaluating composition"
        );

        let engine = Arc::clone(&self.engine);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = engine.evaluate(source.text());
            // The worker may already be gone on shutdown; fine.
            let _ = tx.send(Msg::EvalDone { generation, result });
        });
    }

    fn on_eval_done(
        &mut self,
        generation: u64,
        result: Result<VoiceHandle, EngineError>,
    ) {
        let inflight = match self.inflight.take() {
            Some(f) => f,
            // Completion for an evaluation this worker never started;
            // cannot happen, but a stray message must not corrupt state.
            None => return,
        };
        debug_assert_eq!(inflight.generation, generation);

        let stale = inflight.abandoned || generation != self.generation;
        if stale {
            // A stop or a newer load superseded this evaluation. Its
            // voice must not keep sounding.
            if let Ok(voice) = result {
                self.engine.halt(voice);
            }
            debug!(generation, "discarded stale evaluation result");
            self.drain_queued();
            return;
        }

        match result {
            Ok(voice) => {
                self.active_voice = Some(voice);
                self.last_error = None;
                self.set_state(PlaybackState::Playing);
                info!(generation, "playback started");
            }
            Err(e) => {
                warn!(generation, "evaluation failed: {e}");
                self.last_error = Some(e.clone());
                self.set_state(PlaybackState::Errored);
                self.emit(SessionEvent::Error(e));
            }
        }
        self.drain_queued();
    }

    fn drain_queued(&mut self) {
        if self.inflight.is_none() {
            if let Some(source) = self.queued.take() {
                self.begin_load(source);
            }
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.publish();
        self.emit(SessionEvent::StateChanged(state));
    }

    fn publish(&self) {
        self.snapshot.store(Arc::new(SessionSnapshot {
            state: self.state,
            generation: self.generation,
            last_error: self.last_error.clone(),
        }));
    }

    fn emit(&self, event: SessionEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
