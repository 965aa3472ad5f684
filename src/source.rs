//! Fetched composition text with a content fingerprint.

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Content fingerprint: SHA-256 digest plus byte length.
///
/// Fingerprint equality is the watcher's change test. Modification times
/// are useless for resources fetched over HTTP and unreliable across
/// editors that write via rename, so the content itself is hashed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    digest: [u8; 32],
    len: u64,
}

impl Fingerprint {
    pub fn of(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self {
            digest: hasher.finalize().into(),
            len: text.len() as u64,
        }
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        self.digest[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({}, {} bytes)", self.short(), self.len)
    }
}

/// A composition as fetched from its content provider.
///
/// Immutable once fetched; a newer fetch supersedes it rather than
/// mutating it. Cloning is cheap, the text is shared.
#[derive(Clone, Debug)]
pub struct CompositionSource {
    text: Arc<str>,
    fingerprint: Fingerprint,
    fetched_at: SystemTime,
}

impl CompositionSource {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let fingerprint = Fingerprint::of(&text);
        Self {
            text,
            fingerprint,
            fetched_at: SystemTime::now(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn fetched_at(&self) -> SystemTime {
        self.fetched_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_identical_fingerprint() {
        let a = CompositionSource::new("s(\"bd sn\")");
        let b = CompositionSource::new("s(\"bd sn\")");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn different_text_differs() {
        let a = CompositionSource::new("s(\"bd sn\")");
        let b = CompositionSource::new("s(\"bd sn hh\")");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_survives_clone() {
        let a = CompositionSource::new("note(\"c e g\")");
        let b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.text(), b.text());
    }
}
