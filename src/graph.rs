//! Abstract surface over the audio engine's node graph.
//!
//! The engine owns its routing: voices appear and wire themselves toward
//! the final output at arbitrary times, and none of that is observable
//! from outside. The one seam this trait adds is the connection
//! interceptor, which lets a tap redirect edges crossing into the final
//! output without reaching into engine internals.

use crate::error::GraphInstallError;

/// Identifies a node inside the provider's opaque graph.
pub type NodeId = u64;

/// Which analyser snapshot to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapKind {
    /// Time-domain samples (waveform), `fft_size` values in -1..1.
    Time,
    /// Frequency-domain magnitudes, `fft_size / 2` bins.
    Frequency,
}

/// Rewrites a connection about to be made; returning a different edge
/// redirects it. At most one interceptor is installed at a time.
pub type ConnectInterceptor = Box<dyn FnMut(NodeId, NodeId) -> (NodeId, NodeId) + Send>;

/// Surface an external audio engine exposes over its node graph.
pub trait AudioGraphProvider: Send {
    /// The true final output node (the destination callers believe they
    /// connect to).
    fn final_output(&self) -> NodeId;

    /// Create an analyser node. Fails when the audio context is not
    /// available yet (e.g. blocked on a user gesture).
    fn create_analyser(&mut self, fft_size: usize) -> Result<NodeId, GraphInstallError>;

    /// Remove a node and every edge touching it.
    fn remove_node(&mut self, node: NodeId);

    /// Create an edge. The installed interceptor, if any, is consulted
    /// first and may rewrite the edge.
    fn connect(&mut self, from: NodeId, to: NodeId);

    /// Remove an edge if present.
    fn disconnect(&mut self, from: NodeId, to: NodeId);

    /// Nodes with an edge into `node`, in insertion order.
    fn sources_of(&self, node: NodeId) -> Vec<NodeId>;

    /// Install or replace the connection interceptor.
    fn set_connect_interceptor(&mut self, interceptor: ConnectInterceptor);

    /// Remove the interceptor; subsequent connects go through untouched.
    fn clear_connect_interceptor(&mut self);

    /// Most recent snapshot from an analyser node, or `None` until audio
    /// has reached it.
    fn analyser_frames(&mut self, analyser: NodeId, kind: TapKind) -> Option<Vec<f32>>;
}
