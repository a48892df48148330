//!
//! Core kernel logic for GSSK: the long-lived simulation object and its
//! time-stepping engine.

use tracing::{trace, warn};
use uuid::Uuid;

use crate::error::KernelError;
use crate::graph::NodeGraph;
use crate::kernel::integrator::{integrate, Scratch};
use crate::kernel::state::StateVector;
use crate::model::ModelSpec;
use crate::types::{Method, Phase, TimeDomain};

/// What a successful `step` did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Increment actually applied (shortened on the final partial step).
    pub dt_used: f64,
    /// Simulation time after the step.
    pub t_current: f64,
    /// Phase after the step.
    pub phase: Phase,
}

/// One system, one timeline.
///
/// Owns the Node Graph, the State Vector, the Time Domain and the Error
/// Record. Cloning deep-copies all of them; the clone gets its own instance id.
#[derive(Debug)]
pub struct Kernel {
    pub(crate) id: Uuid,
    pub(crate) graph: NodeGraph,
    pub(crate) state: StateVector,
    pub(crate) scratch: Scratch,
    pub(crate) time: TimeDomain,
    pub(crate) method: Method,
    pub(crate) steps: u64,
    pub(crate) last_error: Option<String>,
}

impl Clone for Kernel {
    fn clone(&self) -> Self {
        Kernel {
            id: Uuid::new_v4(),
            graph: self.graph.clone(),
            state: self.state.clone(),
            scratch: self.scratch.clone(),
            time: self.time,
            method: self.method,
            steps: self.steps,
            last_error: self.last_error.clone(),
        }
    }
}

impl Kernel {
    /// Assembles a kernel from validated parts. Use [`ModelSpec::build`] or
    /// [`Kernel::from_json`] instead of calling this directly.
    pub(crate) fn new(graph: NodeGraph, initial: Vec<f64>, time: TimeDomain, method: Method) -> Self {
        let scratch = Scratch::new(method, initial.len());
        Kernel {
            id: Uuid::new_v4(),
            graph,
            state: StateVector::new(initial),
            scratch,
            time,
            method,
            steps: 0,
            last_error: None,
        }
    }

    /// Parses and validates a JSON model document.
    pub fn from_json(json: &str) -> Result<Self, KernelError> {
        ModelSpec::from_json(json)?.build()
    }

    /// Advances the simulation by one increment.
    ///
    /// `requested_dt` is used when finite and positive; otherwise the
    /// configured `dt` applies. A `dt` too small to move `t_current` is an
    /// `InvalidParameter` error. On any error the State Vector and `t_current`
    /// are left exactly as they were and the Error Record is overwritten.
    pub fn step(&mut self, requested_dt: f64) -> Result<StepOutcome, KernelError> {
        let outcome = self.try_step(requested_dt);
        if let Err(e) = &outcome {
            self.record_error(e);
        }
        outcome
    }

    /// Steps with the configured `dt`.
    pub fn step_default(&mut self) -> Result<StepOutcome, KernelError> {
        self.step(self.time.dt)
    }

    /// Steps until `t_end`, returning the number of steps taken.
    pub fn run_to_end(&mut self) -> Result<u64, KernelError> {
        let mut taken = 0;
        while self.phase() == Phase::Ready {
            self.step_default()?;
            taken += 1;
        }
        Ok(taken)
    }

    fn try_step(&mut self, requested_dt: f64) -> Result<StepOutcome, KernelError> {
        if self.time.is_finished() {
            return Err(KernelError::Finished { t_current: self.time.t_current, t_end: self.time.t_end });
        }

        let dt = if requested_dt.is_finite() && requested_dt > 0.0 { requested_dt } else { self.time.dt };
        let (dt_used, lands_on_end) = self.time.clamp_increment(dt);
        let next_t = if lands_on_end { self.time.t_end } else { self.time.t_current + dt_used };
        if next_t <= self.time.t_current {
            return Err(KernelError::InvalidParameter {
                name: "dt".into(),
                reason: format!("{} does not advance t_current ({})", dt_used, self.time.t_current),
            });
        }

        let (prior, staged) = self.state.split_for_step();
        integrate(self.method, &self.graph, prior, dt_used, &mut self.scratch, staged);

        if let Some(slot) = staged.iter().position(|v| !v.is_finite()) {
            let node = self
                .graph
                .node_for_slot(slot)
                .map(|n| n.external_id.clone())
                .unwrap_or_default();
            return Err(KernelError::Divergence { node, t: self.time.t_current });
        }

        for node in self.graph.nodes().iter().filter(|n| n.kind.is_non_negative()) {
            for v in &mut staged[node.slice()] {
                if *v < 0.0 {
                    *v = 0.0;
                }
            }
        }

        self.state.commit();
        self.time.t_current = next_t;
        self.steps += 1;

        trace!(kernel = %self.id, step = self.steps, t = self.time.t_current, dt_used, "step committed");
        Ok(StepOutcome { dt_used, t_current: self.time.t_current, phase: self.phase() })
    }

    /// Restores the initial State Vector and rewinds `t_current` to `t_start`.
    ///
    /// Edge coefficients keep their current values.
    pub fn reset(&mut self) {
        self.state.reset();
        self.time.t_current = self.time.t_start;
        self.steps = 0;
        trace!(kernel = %self.id, "reset");
    }

    /// Overwrites the coefficient `k` of edge `index`.
    pub fn set_edge_k(&mut self, index: usize, k: f64) -> Result<(), KernelError> {
        let outcome = self.try_set_edge_k(index, k);
        if let Err(e) = &outcome {
            self.record_error(e);
        }
        outcome
    }

    fn try_set_edge_k(&mut self, index: usize, k: f64) -> Result<(), KernelError> {
        if !k.is_finite() {
            return Err(KernelError::InvalidParameter {
                name: format!("edge {} k", index),
                reason: format!("{} is not finite", k),
            });
        }
        let len = self.graph.edges().len();
        let edge = self
            .graph
            .edges_mut()
            .get_mut(index)
            .ok_or(KernelError::OutOfRange { what: "edge", index, len })?;
        edge.k = k;
        Ok(())
    }

    /// Overwrites the Error Record.
    pub(crate) fn record_error(&mut self, err: &KernelError) {
        warn!(kernel = %self.id, t = self.time.t_current, error = %err, "kernel operation failed");
        self.last_error = Some(err.to_string());
    }
}
