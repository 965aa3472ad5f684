//! Error types shared across the session controller.
//!
//! Every public operation reports failure through one of these enums or an
//! explicit event; nothing panics across a component boundary.

use std::io;
use thiserror::Error;

/// Failure while fetching composition text from a content provider.
///
/// Fetch errors are transient by design: the watcher logs and swallows
/// them, and they never surface as session failures.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("i/o error reading composition: {0}")]
    Io(#[from] io::Error),

    #[error("composition resource unavailable: {0}")]
    Unavailable(String),
}

/// The pattern engine rejected or failed to run a composition.
///
/// Recoverable: the session moves to `Errored` and keeps accepting
/// commands. Never retried automatically.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("pattern evaluation failed: {0}")]
    Eval(String),

    #[error("pattern engine unavailable: {0}")]
    Unavailable(String),
}

/// The monitoring tap could not attach to the audio graph.
#[derive(Debug, Clone, Error)]
pub enum GraphInstallError {
    #[error("audio context unavailable")]
    ContextUnavailable,

    #[error("analyser unsupported by provider: {0}")]
    AnalyserUnsupported(String),
}

/// Configuration file problems, raised at startup only. A missing file
/// means defaults; a present-but-malformed file lands here.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] io::Error),

    #[error("malformed config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Monitor recording failures.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("wav write failed: {0}")]
    Wav(#[from] hound::Error),
}
