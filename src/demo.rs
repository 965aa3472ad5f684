//! Headless demo runtime: a stand-in pattern engine and audio graph.
//!
//! Lets the CLI and the integration tests exercise the full
//! watch/reload/tap path without an audio device or a real pattern
//! runtime. Voices are plain sine tones; this is a test double with a
//! pulse, not a synthesis engine.

use crate::engine::{PatternEngine, VoiceHandle};
use crate::error::{EngineError, GraphInstallError};
use crate::graph::{AudioGraphProvider, ConnectInterceptor, NodeId, TapKind};
use crate::metadata;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

enum NodeKind {
    Output,
    Analyser { fft_size: usize },
    Voice { freq: f32, gain: f32 },
}

/// In-memory audio graph with synthesized analyser snapshots.
pub struct SimGraph {
    sample_rate: f32,
    next_id: NodeId,
    output: NodeId,
    nodes: HashMap<NodeId, NodeKind>,
    edges: Vec<(NodeId, NodeId)>,
    interceptor: Option<ConnectInterceptor>,
    clock: f32,
    context_available: bool,
}

impl SimGraph {
    pub fn new(sample_rate: f32) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(0, NodeKind::Output);
        Self {
            sample_rate,
            next_id: 1,
            output: 0,
            nodes,
            edges: Vec::new(),
            interceptor: None,
            clock: 0.0,
            context_available: true,
        }
    }

    /// A graph whose audio context never becomes available, so analyser
    /// creation fails.
    pub fn without_context(sample_rate: f32) -> Self {
        let mut graph = Self::new(sample_rate);
        graph.context_available = false;
        graph
    }

    pub fn add_voice(&mut self, freq: f32, gain: f32) -> NodeId {
        let id = self.alloc();
        self.nodes.insert(id, NodeKind::Voice { freq, gain });
        id
    }

    fn alloc(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Current edge list, for topology assertions.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.edges.clone()
    }

    pub fn voice_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| matches!(n, NodeKind::Voice { .. }))
            .count()
    }

    pub fn analyser_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| matches!(n, NodeKind::Analyser { .. }))
            .count()
    }

    /// Mix of the voices feeding `node`, rendered from the running clock.
    fn render_into(&mut self, node: NodeId, len: usize) -> Option<Vec<f32>> {
        let voices: Vec<(f32, f32)> = self
            .edges
            .iter()
            .filter(|(_, to)| *to == node)
            .filter_map(|(from, _)| match self.nodes.get(from) {
                Some(NodeKind::Voice { freq, gain }) => Some((*freq, *gain)),
                _ => None,
            })
            .collect();
        if voices.is_empty() {
            return None;
        }

        let dt = 1.0 / self.sample_rate;
        let frame: Vec<f32> = (0..len)
            .map(|i| {
                let t = self.clock + i as f32 * dt;
                let mixed: f32 = voices.iter().map(|(f, g)| (TAU * f * t).sin() * g).sum();
                // Soft clip so stacked voices stay in range.
                mixed.tanh()
            })
            .collect();
        self.clock += len as f32 * dt;
        Some(frame)
    }
}

impl AudioGraphProvider for SimGraph {
    fn final_output(&self) -> NodeId {
        self.output
    }

    fn create_analyser(&mut self, fft_size: usize) -> Result<NodeId, GraphInstallError> {
        if !self.context_available {
            return Err(GraphInstallError::ContextUnavailable);
        }
        if !fft_size.is_power_of_two() {
            return Err(GraphInstallError::AnalyserUnsupported(format!(
                "fft size {fft_size} is not a power of two"
            )));
        }
        let id = self.alloc();
        self.nodes.insert(id, NodeKind::Analyser { fft_size });
        Ok(id)
    }

    fn remove_node(&mut self, node: NodeId) {
        self.nodes.remove(&node);
        self.edges.retain(|(from, to)| *from != node && *to != node);
    }

    fn connect(&mut self, from: NodeId, to: NodeId) {
        let (from, to) = match self.interceptor.as_mut() {
            Some(hook) => hook(from, to),
            None => (from, to),
        };
        if !self.edges.contains(&(from, to)) {
            self.edges.push((from, to));
        }
    }

    fn disconnect(&mut self, from: NodeId, to: NodeId) {
        self.edges.retain(|edge| *edge != (from, to));
    }

    fn sources_of(&self, node: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(_, to)| *to == node)
            .map(|(from, _)| *from)
            .collect()
    }

    fn set_connect_interceptor(&mut self, interceptor: ConnectInterceptor) {
        self.interceptor = Some(interceptor);
    }

    fn clear_connect_interceptor(&mut self) {
        self.interceptor = None;
    }

    fn analyser_frames(&mut self, analyser: NodeId, kind: TapKind) -> Option<Vec<f32>> {
        let fft_size = match self.nodes.get(&analyser) {
            Some(NodeKind::Analyser { fft_size }) => *fft_size,
            _ => return None,
        };
        let frame = self.render_into(analyser, fft_size)?;
        match kind {
            TapKind::Time => Some(frame),
            TapKind::Frequency => Some(spectrum(&frame)),
        }
    }
}

/// Magnitude spectrum of one frame, `len / 2` bins.
fn spectrum(frame: &[f32]) -> Vec<f32> {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(frame.len());
    let mut buffer: Vec<Complex<f32>> =
        frame.iter().map(|&s| Complex::new(s, 0.0)).collect();
    fft.process(&mut buffer);
    let norm = frame.len() as f32;
    buffer[..frame.len() / 2]
        .iter()
        .map(|c| c.norm() / norm)
        .collect()
}

/// Stand-in pattern engine: validates composition text cheaply and backs
/// each successful evaluation with one sine voice in a [`SimGraph`].
pub struct SimEngine {
    graph: Arc<Mutex<SimGraph>>,
    voices: Mutex<HashMap<VoiceHandle, NodeId>>,
    next_voice: AtomicU64,
    eval_delay: Duration,
}

impl SimEngine {
    pub fn new(graph: Arc<Mutex<SimGraph>>) -> Self {
        Self {
            graph,
            voices: Mutex::new(HashMap::new()),
            next_voice: AtomicU64::new(1),
            eval_delay: Duration::ZERO,
        }
    }

    /// Add artificial evaluation latency, to exercise reload races.
    pub fn with_eval_delay(mut self, delay: Duration) -> Self {
        self.eval_delay = delay;
        self
    }

    /// Validate composition text without starting playback. The check is
    /// deliberately shallow: non-empty after comment stripping, balanced
    /// parentheses. Real syntax belongs to the real runtime.
    pub fn check(code: &str) -> Result<(), EngineError> {
        let meaningful = code
            .lines()
            .map(|line| line.split("//").next().unwrap_or("").trim())
            .filter(|line| !line.is_empty())
            .count();
        if meaningful == 0 {
            return Err(EngineError::Eval("composition is empty".to_string()));
        }
        let mut depth = 0i32;
        for c in code.chars() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                break;
            }
        }
        if depth != 0 {
            return Err(EngineError::Eval("unbalanced parentheses".to_string()));
        }
        Ok(())
    }

    pub fn active_voices(&self) -> usize {
        self.voices.lock().unwrap().len()
    }
}

impl PatternEngine for SimEngine {
    fn evaluate(&self, code: &str) -> Result<VoiceHandle, EngineError> {
        if !self.eval_delay.is_zero() {
            thread::sleep(self.eval_delay);
        }
        Self::check(code)?;

        // Audible placeholder: one tone whose pitch tracks the declared
        // tempo, so reloads are distinguishable in the waveform.
        let bpm = metadata::extract_bpm(code).unwrap_or(120.0);
        let freq = bpm * 2.0;

        let handle = VoiceHandle(self.next_voice.fetch_add(1, Ordering::Relaxed));
        let node = {
            let mut graph = self.graph.lock().unwrap();
            let node = graph.add_voice(freq, 0.5);
            let output = graph.final_output();
            graph.connect(node, output);
            node
        };
        self.voices.lock().unwrap().insert(handle, node);
        Ok(handle)
    }

    fn halt(&self, voice: VoiceHandle) {
        if let Some(node) = self.voices.lock().unwrap().remove(&voice) {
            self.graph.lock().unwrap().remove_node(node);
        }
    }

    fn halt_all(&self) {
        let mut voices = self.voices.lock().unwrap();
        let mut graph = self.graph.lock().unwrap();
        for (_, node) in voices.drain() {
            graph.remove_node(node);
        }
    }
}
