//! Ensemble forecasting: many perturbed runs of one model, summarised as
//! per-sample min/max/mean envelopes.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use tracing::info;

use crate::error::KernelError;
use crate::kernel::Kernel;
use crate::types::Phase;

/// Upper bound on `sample_count * state_size`. Each envelope holds this many
/// `f64`s, so the three of them stay below 400 MiB.
pub const MAX_ENSEMBLE_CELLS: usize = 1 << 24;

/// Envelopes laid out `[sample * state_size + slot]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleResult {
    pub state_size: usize,
    /// Samples per run: the initial state plus one per step to `t_end`.
    pub sample_count: usize,
    pub runs: usize,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub mean: Vec<f64>,
}

impl EnsembleResult {
    pub fn index(&self, sample: usize, slot: usize) -> usize {
        sample * self.state_size + slot
    }

    /// `(min, mean, max)` of one slot at one sample.
    pub fn envelope(&self, sample: usize, slot: usize) -> (f64, f64, f64) {
        let i = self.index(sample, slot);
        (self.min[i], self.mean[i], self.max[i])
    }
}

/// Runs `runs` copies of `base` from its initial state, each with every edge
/// `k` scaled by an independent factor drawn from `[1 - p, 1 + p]`.
///
/// `base` itself is not touched. Identical seeds give identical envelopes.
pub fn ensemble_forecast(
    base: &Kernel,
    runs: usize,
    perturbation: f64,
    seed: u64,
) -> Result<EnsembleResult, KernelError> {
    if runs == 0 {
        return Err(KernelError::InvalidParameter { name: "runs".into(), reason: "must be at least 1".into() });
    }
    if !(0.0..=1.0).contains(&perturbation) {
        return Err(KernelError::InvalidParameter {
            name: "perturbation".into(),
            reason: format!("{} is outside [0, 1]", perturbation),
        });
    }

    let state_size = base.state_size();
    let too_large = || KernelError::InvalidParameter {
        name: "ensemble size".into(),
        reason: format!(
            "{} steps of {} slots exceed the limit of {} cells",
            base.steps_to_end(),
            state_size,
            MAX_ENSEMBLE_CELLS
        ),
    };
    let sample_count = base.steps_to_end().checked_add(1).ok_or_else(too_large)?;
    let cells = sample_count
        .checked_mul(state_size)
        .filter(|&c| c <= MAX_ENSEMBLE_CELLS)
        .ok_or_else(too_large)?;
    let mut min = vec![f64::INFINITY; cells];
    let mut max = vec![f64::NEG_INFINITY; cells];
    let mut sum = vec![0.0; cells];

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let original_k: Vec<f64> = base.graph().edges().iter().map(|e| e.k).collect();
    let mut run = base.clone();

    for _ in 0..runs {
        for (edge, k) in run.graph.edges_mut().iter_mut().zip(&original_k) {
            edge.k = k * rng.gen_range(1.0 - perturbation..=1.0 + perturbation);
        }
        run.reset();

        for sample in 0..sample_count {
            if sample > 0 && run.phase() == Phase::Ready {
                run.step_default()?;
            }
            let row = sample * state_size;
            for (slot, &v) in run.state().iter().enumerate() {
                let i = row + slot;
                min[i] = min[i].min(v);
                max[i] = max[i].max(v);
                sum[i] += v;
            }
        }
    }

    let mean = sum.into_iter().map(|s| s / runs as f64).collect();
    info!(kernel = %base.instance_id(), runs, perturbation, sample_count, "ensemble forecast complete");
    Ok(EnsembleResult { state_size, sample_count, runs, min, max, mean })
}
