//! End-to-end: watcher, session, engine and tap wired together the way
//! the CLI wires them, against the headless demo runtime.

mod common;

use common::{src, wait_for_state, wait_until};
use ostinato::demo::{SimEngine, SimGraph};
use ostinato::graph::AudioGraphProvider;
use ostinato::session::{PlaybackSession, PlaybackState};
use ostinato::tap::GraphTap;
use ostinato::watcher::{FileProvider, SourceWatcher, WatcherEvent};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(3);
const TICK: Duration = Duration::from_millis(20);

fn runtime() -> (Arc<Mutex<SimGraph>>, Arc<SimEngine>) {
    let graph = Arc::new(Mutex::new(SimGraph::new(44100.0)));
    let engine = Arc::new(SimEngine::new(Arc::clone(&graph)));
    (graph, engine)
}

/// Forward watcher events into the session, the CLI's wiring.
fn forward(events: std::sync::mpsc::Receiver<WatcherEvent>, session: Arc<PlaybackSession>) {
    thread::spawn(move || {
        for WatcherEvent::Changed(source) in events {
            session.reload(source);
        }
    });
}

#[test]
fn unchanged_content_leaves_playback_undisturbed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current.js");
    std::fs::write(&path, "setcpm(120)\ns(\"bd sn\")").unwrap();

    let (_graph, engine) = runtime();
    let session = Arc::new(PlaybackSession::new(engine.clone()));

    let (mut watcher, events) = SourceWatcher::spawn(FileProvider::new(&path), TICK);
    forward(events, Arc::clone(&session));

    // The initial fetch auto-plays the composition.
    assert!(wait_for_state(&session, PlaybackState::Playing, WAIT));
    let generation = session.snapshot().generation;
    assert_eq!(generation, 1);

    // Many more polls of identical content: no re-delivery, no restart.
    thread::sleep(TICK * 10);
    assert_eq!(session.snapshot().generation, generation);
    assert_eq!(session.snapshot().state, PlaybackState::Playing);
    assert_eq!(engine.active_voices(), 1);

    watcher.stop();
}

#[test]
fn rewriting_the_file_hot_reloads_playback() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current.js");
    std::fs::write(&path, "setcpm(100)\ns(\"bd\")").unwrap();

    let (_graph, engine) = runtime();
    let session = Arc::new(PlaybackSession::new(engine.clone()));

    let (mut watcher, events) = SourceWatcher::spawn(FileProvider::new(&path), TICK);
    forward(events, Arc::clone(&session));

    assert!(wait_for_state(&session, PlaybackState::Playing, WAIT));

    std::fs::write(&path, "setcpm(160)\ns(\"hh*8\")").unwrap();
    assert!(wait_until(WAIT, || session.snapshot().generation >= 2));
    assert!(wait_for_state(&session, PlaybackState::Playing, WAIT));

    // The old voice was halted as part of the reload.
    assert!(wait_until(WAIT, || engine.active_voices() == 1));

    watcher.stop();
}

#[test]
fn rapid_reloads_end_on_the_newest_composition() {
    let graph = Arc::new(Mutex::new(SimGraph::new(44100.0)));
    let engine = Arc::new(
        SimEngine::new(Arc::clone(&graph)).with_eval_delay(Duration::from_millis(50)),
    );
    let session = PlaybackSession::new(engine.clone());

    session.play(src("setcpm(100)\ns(\"bd\")"));
    assert!(wait_for_state(&session, PlaybackState::Playing, WAIT));

    // Two reloads inside one evaluation window: the middle one must be
    // superseded without its voice ever surviving.
    session.reload(src("setcpm(120)\ns(\"sn\")"));
    thread::sleep(Duration::from_millis(10));
    session.reload(src("setcpm(160)\ns(\"hh\")"));

    assert!(wait_until(WAIT, || {
        session.snapshot().state == PlaybackState::Playing
            && session.snapshot().generation == 3
    }));
    assert!(wait_until(WAIT, || engine.active_voices() == 1));
    assert!(wait_until(WAIT, || graph.lock().unwrap().voice_count() == 1));
}

#[test]
fn error_then_fix_recovers_cleanly() {
    let (_graph, engine) = runtime();
    let session = PlaybackSession::new(engine.clone());

    // Unbalanced parens: the engine rejects it.
    session.play(src("s(\"bd sn\""));
    assert!(wait_for_state(&session, PlaybackState::Errored, WAIT));
    assert!(session.snapshot().last_error.is_some());
    assert_eq!(engine.active_voices(), 0);

    session.play(src("s(\"bd sn\")"));
    assert!(wait_for_state(&session, PlaybackState::Playing, WAIT));
    assert!(session.snapshot().last_error.is_none());
    assert_eq!(engine.active_voices(), 1);
}

#[test]
fn tap_observes_playback_across_reloads() {
    let (graph, engine) = runtime();
    let session = PlaybackSession::new(engine.clone());

    let mut tap = GraphTap::new(Arc::clone(&graph), 256);
    let handle = tap.install().unwrap();

    // Nothing playing yet: silence.
    assert!(tap.waveform().iter().all(|s| *s == 0.0));

    session.play(src("setcpm(120)\ns(\"bd\")"));
    assert!(wait_for_state(&session, PlaybackState::Playing, WAIT));
    assert!(tap.waveform().iter().any(|s| s.abs() > 0.01));

    session.reload(src("setcpm(90)\ns(\"sn\")"));
    assert!(wait_until(WAIT, || session.snapshot().generation == 2));
    assert!(wait_for_state(&session, PlaybackState::Playing, WAIT));

    // The new voice still reaches the tap, and the real output is fed by
    // the analyser alone.
    assert!(tap.waveform().iter().any(|s| s.abs() > 0.01));
    let g = graph.lock().unwrap();
    assert_eq!(g.sources_of(g.final_output()), vec![handle.analyser()]);
}
