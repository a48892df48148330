#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(deprecated)]

//!
//! GSSK is a deterministic, fixed-step simulation kernel for networks of
//! stateful nodes connected by flow rules.
//!
//! A JSON model document is validated once into a [`Kernel`], which then
//! advances a flat State Vector synchronously: every node's next value is
//! computed from the previous committed state only, and a step either
//! commits completely or not at all.
//!
//! The C ABI in [`ffi`] (feature `ffi`) exposes kernels to hosts through
//! opaque generation-tagged handles.

// Error taxonomy and boundary status codes.
pub mod error;

// Shared value types: node kinds, flow logic, integration method, time domain.
pub mod types;

// Node Graph: nodes, edges and the State Vector layout.
pub mod graph;

// JSON model documents and the Model Builder.
pub mod model;

// The simulation kernel and its time-stepping engine.
pub mod kernel;

// Ensemble forecasting and parameter calibration.
pub mod analysis;

// Handle arena used by the C ABI.
pub mod registry;

#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures;

pub use analysis::{CalibrationOptions, CalibrationReport, EnsembleResult, NodeObservations, Observation};
pub use error::{KernelError, Status};
pub use kernel::{Kernel, StepOutcome};
pub use model::ModelSpec;
pub use types::{FlowLogic, Method, NodeKind, Phase, TimeDomain};
