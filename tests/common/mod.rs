#![allow(dead_code)]
//! Test doubles and helpers shared by the integration suites.

use ostinato::engine::{PatternEngine, VoiceHandle};
use ostinato::error::EngineError;
use ostinato::session::{PlaybackSession, PlaybackState};
use ostinato::source::CompositionSource;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Pattern engine double with controllable outcomes and completion
/// timing. Compositions containing `<bad>` are rejected; compositions
/// registered with [`hold`](ScriptedEngine::hold) block inside
/// `evaluate` until released, which is how the tests pin an evaluation
/// in flight while more commands arrive.
pub struct ScriptedEngine {
    next_voice: AtomicU64,
    inner: Mutex<Inner>,
    released: Condvar,
}

#[derive(Default)]
struct Inner {
    held: HashSet<String>,
    active: Vec<VoiceHandle>,
    halted: Vec<VoiceHandle>,
    halt_all_calls: usize,
    evaluated: Vec<String>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_voice: AtomicU64::new(1),
            inner: Mutex::new(Inner::default()),
            released: Condvar::new(),
        })
    }

    /// Make evaluations of `code` block until [`release`](Self::release).
    pub fn hold(&self, code: &str) {
        self.inner.lock().unwrap().held.insert(code.to_string());
    }

    pub fn release(&self, code: &str) {
        self.inner.lock().unwrap().held.remove(code);
        self.released.notify_all();
    }

    pub fn active(&self) -> Vec<VoiceHandle> {
        self.inner.lock().unwrap().active.clone()
    }

    pub fn halted(&self) -> Vec<VoiceHandle> {
        self.inner.lock().unwrap().halted.clone()
    }

    pub fn halt_all_calls(&self) -> usize {
        self.inner.lock().unwrap().halt_all_calls
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.inner.lock().unwrap().evaluated.clone()
    }
}

impl PatternEngine for ScriptedEngine {
    fn evaluate(&self, code: &str) -> Result<VoiceHandle, EngineError> {
        let mut inner = self.inner.lock().unwrap();
        inner.evaluated.push(code.to_string());
        while inner.held.contains(code) {
            let (guard, timeout) = self
                .released
                .wait_timeout(inner, Duration::from_secs(5))
                .unwrap();
            inner = guard;
            if timeout.timed_out() {
                break;
            }
        }
        if code.contains("<bad>") {
            return Err(EngineError::Eval(format!("rejected: {code}")));
        }
        let voice = VoiceHandle(self.next_voice.fetch_add(1, Ordering::Relaxed));
        inner.active.push(voice);
        Ok(voice)
    }

    fn halt(&self, voice: VoiceHandle) {
        let mut inner = self.inner.lock().unwrap();
        inner.active.retain(|v| *v != voice);
        inner.halted.push(voice);
    }

    fn halt_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        let drained: Vec<VoiceHandle> = inner.active.drain(..).collect();
        inner.halted.extend(drained);
        inner.halt_all_calls += 1;
    }
}

pub fn src(text: &str) -> CompositionSource {
    CompositionSource::new(text)
}

/// Poll until `cond` holds, up to `timeout`. Returns whether it held.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

pub fn wait_for_state(
    session: &PlaybackSession,
    state: PlaybackState,
    timeout: Duration,
) -> bool {
    wait_until(timeout, || session.snapshot().state == state)
}
