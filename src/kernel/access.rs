//! Read-only query surface over a [`Kernel`].
//!
//! Nothing here mutates the kernel, and every call stays valid after the
//! kernel reaches `Phase::Finished`.

use uuid::Uuid;

use crate::error::KernelError;
use crate::graph::{Edge, NodeGraph};
use crate::kernel::core::Kernel;
use crate::types::{Method, Phase};

impl Kernel {
    /// Current State Vector, as of the last successful step.
    pub fn state(&self) -> &[f64] {
        self.state.as_slice()
    }

    /// Address of the live State Vector. Stable for the kernel lifetime.
    pub fn state_ptr(&self) -> *const f64 {
        self.state.as_ptr()
    }

    /// Initial State Vector as declared in the model.
    pub fn initial_state(&self) -> &[f64] {
        self.state.initial()
    }

    pub fn state_size(&self) -> usize {
        self.state.len()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// External identifier of the node at `index`.
    pub fn node_id(&self, index: usize) -> Result<&str, KernelError> {
        self.graph
            .node(index)
            .map(|n| n.external_id.as_str())
            .ok_or(KernelError::OutOfRange { what: "node", index, len: self.graph.node_count() })
    }

    pub fn find_node(&self, external_id: &str) -> Option<usize> {
        self.graph.find(external_id)
    }

    /// The node's slice of the State Vector.
    pub fn node_state(&self, index: usize) -> Result<&[f64], KernelError> {
        let node = self
            .graph
            .node(index)
            .ok_or(KernelError::OutOfRange { what: "node", index, len: self.graph.node_count() })?;
        Ok(&self.state()[node.slice()])
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edges().len()
    }

    pub fn edge(&self, index: usize) -> Result<&Edge, KernelError> {
        let len = self.edge_count();
        self.graph.edges().get(index).ok_or(KernelError::OutOfRange { what: "edge", index, len })
    }

    pub fn edge_k(&self, index: usize) -> Result<f64, KernelError> {
        self.edge(index).map(|e| e.k)
    }

    pub fn t_start(&self) -> f64 {
        self.time.t_start
    }

    pub fn t_end(&self) -> f64 {
        self.time.t_end
    }

    /// Configured `dt`, regardless of what was passed to recent steps.
    pub fn dt(&self) -> f64 {
        self.time.dt
    }

    pub fn t_current(&self) -> f64 {
        self.time.t_current
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps
    }

    /// Steps of the configured `dt` from `t_start` to `t_end`.
    pub fn steps_to_end(&self) -> usize {
        self.time.steps_to_end()
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn phase(&self) -> Phase {
        if self.time.is_finished() {
            Phase::Finished
        } else {
            Phase::Ready
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.id
    }

    /// Description of the most recent failure.
    ///
    /// Not cleared by later successes: only meaningful right after a call
    /// reported an error.
    pub fn error_description(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
