//! Multi-run analyses layered on top of a single [`Kernel`].

pub mod calibrate;
pub mod ensemble;

pub use calibrate::{CalibrationOptions, CalibrationReport, NodeObservations, Observation};
pub use ensemble::EnsembleResult;

use crate::error::KernelError;
use crate::kernel::Kernel;

impl Kernel {
    /// See [`ensemble::ensemble_forecast`]. Failures are recorded in the
    /// Error Record; the simulation state is never touched.
    pub fn ensemble_forecast(&mut self, runs: usize, perturbation: f64, seed: u64) -> Result<EnsembleResult, KernelError> {
        let outcome = ensemble::ensemble_forecast(self, runs, perturbation, seed);
        if let Err(e) = &outcome {
            self.record_error(e);
        }
        outcome
    }

    /// See [`calibrate::calibrate`].
    pub fn calibrate(
        &mut self,
        observations: &[NodeObservations],
        options: &CalibrationOptions,
    ) -> Result<CalibrationReport, KernelError> {
        let outcome = calibrate::calibrate(self, observations, options);
        if let Err(e) = &outcome {
            self.record_error(e);
        }
        outcome
    }
}
