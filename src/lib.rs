//! # Ostinato - Hot-Reload Playback Session Controller
//!
//! Ostinato is the coordination layer for a live-coding music player in
//! the Tidal Cycles / Strudel tradition: compositions are text, the
//! pattern runtime and audio synthesis live elsewhere, and the job here
//! is to keep a playing session in lockstep with the text as it changes.
//!
//! ## Core Components
//!
//! - **[`watcher`]** - polls a composition resource and reports genuine
//!   content changes by fingerprint comparison
//! - **[`session`]** - serializes the play/stop/reload lifecycle against
//!   an external pattern engine, so a reload can never race an in-flight
//!   evaluation or leave two voices sounding
//! - **[`tap`]** - attaches one analyser between everything and the
//!   engine's final output, so visualization sees the sum of all voices
//!   without altering the audio
//!
//! Supporting modules: [`metadata`] (best-effort tempo/key scraping),
//! [`recorder`] (monitor feed to WAV), [`config`] (file + CLI tunables)
//! and [`demo`] (headless stand-ins for the engine and graph).
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use ostinato::demo::{SimEngine, SimGraph};
//! use ostinato::session::{PlaybackSession, PlaybackState};
//! use ostinato::source::CompositionSource;
//!
//! let graph = Arc::new(Mutex::new(SimGraph::new(44100.0)));
//! let engine = Arc::new(SimEngine::new(Arc::clone(&graph)));
//! let session = PlaybackSession::new(engine);
//!
//! session.play(CompositionSource::new("setcpm(120)\ns(\"bd sn\")"));
//!
//! # let mut tries = 0;
//! # while session.snapshot().state != PlaybackState::Playing && tries < 200 {
//! #     std::thread::sleep(std::time::Duration::from_millis(5));
//! #     tries += 1;
//! # }
//! assert_eq!(session.snapshot().state, PlaybackState::Playing);
//! session.stop();
//! ```
//!
//! ## Watching a File
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ostinato::watcher::{FileProvider, SourceWatcher, WatcherEvent};
//!
//! let provider = FileProvider::new("compositions/current.js");
//! let (watcher, events) = SourceWatcher::spawn(provider, Duration::from_secs(2));
//!
//! for WatcherEvent::Changed(source) in events {
//!     println!("composition changed: {:?}", source.fingerprint());
//!     // hand `source` to PlaybackSession::reload
//! }
//! ```
//!
//! ## Design Notes
//!
//! Commands and asynchronous evaluation results share one ordered queue
//! per session; a generation counter discards results that a newer
//! command has superseded. The tap redirects only edges crossing into
//! the real final output and restores the exact topology on uninstall.
//! Fetch failures while polling are swallowed; engine failures set an
//! `Errored` state that any later command clears.

pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod graph;
pub mod metadata;
pub mod recorder;
pub mod session;
pub mod source;
pub mod tap;
pub mod watcher;
