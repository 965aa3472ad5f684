//! Non-destructive monitoring tap over the engine's output graph.
//!
//! The tap inserts a single analyser between everything and the real
//! final output, so visualization reads the sum of all signal paths no
//! matter when the engine wires up new voices. Scope matters: only edges
//! crossing into the real final output are redirected. Rerouting
//! sibling or intra-graph edges is how audio graphs get corrupted.

use crate::error::GraphInstallError;
use crate::graph::{AudioGraphProvider, NodeId, TapKind};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Handle to the installed tap. Cloneable; all clones refer to the same
/// analyser node.
#[derive(Clone, Debug)]
pub struct TapHandle {
    analyser: NodeId,
    fft_size: usize,
}

impl TapHandle {
    pub fn analyser(&self) -> NodeId {
        self.analyser
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
}

/// Observation point on an external audio graph.
///
/// Install is idempotent; reads return fixed-length silence until audio
/// flows; uninstall restores the original topology exactly.
pub struct GraphTap<P: AudioGraphProvider> {
    provider: Arc<Mutex<P>>,
    fft_size: usize,
    installed: Option<TapHandle>,
    /// Sources currently rerouted into the analyser, shared with the
    /// interceptor closure so late arrivals are tracked too.
    redirected: Arc<Mutex<HashSet<NodeId>>>,
}

impl<P: AudioGraphProvider> GraphTap<P> {
    pub fn new(provider: Arc<Mutex<P>>, fft_size: usize) -> Self {
        Self {
            provider,
            fft_size,
            installed: None,
            redirected: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Attach the tap. Idempotent: a second call returns the existing
    /// handle without touching the graph again.
    pub fn install(&mut self) -> Result<TapHandle, GraphInstallError> {
        if let Some(handle) = &self.installed {
            return Ok(handle.clone());
        }

        let mut p = self.provider.lock().unwrap();
        let output = p.final_output();
        let analyser = p.create_analyser(self.fft_size)?;

        // Everything currently feeding the output moves behind the
        // analyser. Edges not touching the output stay as they are.
        {
            let mut redirected = self.redirected.lock().unwrap();
            for src in p.sources_of(output) {
                p.disconnect(src, output);
                p.connect(src, analyser);
                redirected.insert(src);
                debug!(src, "rerouted existing edge through tap");
            }
        }
        p.connect(analyser, output);

        // Future connections aimed at the output land on the analyser
        // instead. The analyser's own edge must pass through untouched or
        // the tap would sever itself from the output.
        let redirected = Arc::clone(&self.redirected);
        p.set_connect_interceptor(Box::new(move |from, to| {
            if to == output && from != analyser {
                redirected.lock().unwrap().insert(from);
                (from, analyser)
            } else {
                (from, to)
            }
        }));
        drop(p);

        info!(analyser, fft_size = self.fft_size, "graph tap installed");
        let handle = TapHandle {
            analyser,
            fft_size: self.fft_size,
        };
        self.installed = Some(handle.clone());
        Ok(handle)
    }

    /// Remove the tap and restore the original topology. Idempotent; a
    /// tap that never installed is a no-op.
    pub fn uninstall(&mut self) {
        let Some(handle) = self.installed.take() else {
            return;
        };
        let mut p = self.provider.lock().unwrap();
        p.clear_connect_interceptor();
        let output = p.final_output();

        // Everything feeding the analyser (rerouted at install time or
        // caught by the interceptor later) goes back to the real output.
        for src in p.sources_of(handle.analyser) {
            p.disconnect(src, handle.analyser);
            p.connect(src, output);
        }
        p.disconnect(handle.analyser, output);
        p.remove_node(handle.analyser);
        drop(p);

        self.redirected.lock().unwrap().clear();
        info!("graph tap removed");
    }

    pub fn is_installed(&self) -> bool {
        self.installed.is_some()
    }

    pub fn handle(&self) -> Option<TapHandle> {
        self.installed.clone()
    }

    /// Latest analyser snapshot. Returns fixed-length silence when the
    /// tap is not installed or no audio has reached the analyser yet;
    /// never an error.
    pub fn read(&self, kind: TapKind) -> Vec<f32> {
        let len = match kind {
            TapKind::Time => self.fft_size,
            TapKind::Frequency => self.fft_size / 2,
        };
        let Some(handle) = &self.installed else {
            return vec![0.0; len];
        };
        let mut p = self.provider.lock().unwrap();
        p.analyser_frames(handle.analyser, kind)
            .unwrap_or_else(|| vec![0.0; len])
    }

    /// Time-domain snapshot, `fft_size` samples.
    pub fn waveform(&self) -> Vec<f32> {
        self.read(TapKind::Time)
    }

    /// Frequency-domain snapshot, `fft_size / 2` bins.
    pub fn spectrum(&self) -> Vec<f32> {
        self.read(TapKind::Frequency)
    }
}
