//! Fits edge coefficients to observed node trajectories with differential
//! evolution.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::KernelError;
use crate::kernel::Kernel;
use crate::types::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub time: f64,
    pub value: f64,
}

/// Observed values of one node's primary slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeObservations {
    pub node_id: String,
    pub data: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOptions {
    pub iterations: usize,
    pub seed: u64,
    pub population: usize,
    /// Differential weight.
    pub mutation: f64,
    pub crossover: f64,
    /// Range the initial population is drawn from.
    pub initial_k: (f64, f64),
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        CalibrationOptions {
            iterations: 100,
            seed: 0,
            population: 20,
            mutation: 0.8,
            crossover: 0.9,
            initial_k: (0.0, 10.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    /// Best `k` per edge, in edge order. Already written back to the kernel.
    pub params: Vec<f64>,
    /// Mean squared error of `params` against the observations.
    pub fitness: f64,
    pub evaluations: usize,
}

/// Resolved observation series: primary slot plus data.
struct Target<'a> {
    slot: usize,
    data: &'a [Observation],
}

/// Replays the model with `params` and scores it against `targets`.
///
/// Each observation is compared with the linear interpolation between the
/// two samples bracketing it, `prev_t < time <= t`. Runs that diverge score
/// `+inf`.
fn fitness(work: &mut Kernel, params: &[f64], targets: &[Target<'_>]) -> f64 {
    for (edge, &k) in work.graph.edges_mut().iter_mut().zip(params) {
        edge.k = k;
    }
    work.reset();

    let mut prev = work.state().to_vec();
    let mut prev_t = work.t_current();
    let mut total = 0.0;
    let mut points = 0usize;

    loop {
        let t = work.t_current();
        let current = work.state();
        for target in targets {
            for obs in target.data.iter().filter(|o| o.time > prev_t && o.time <= t) {
                let ratio = (obs.time - prev_t) / (t - prev_t);
                let predicted = prev[target.slot] + ratio * (current[target.slot] - prev[target.slot]);
                total += (predicted - obs.value).powi(2);
                points += 1;
            }
        }
        if work.phase() == Phase::Finished {
            break;
        }
        prev.copy_from_slice(current);
        prev_t = t;
        if work.step_default().is_err() {
            return f64::INFINITY;
        }
    }

    if points == 0 {
        f64::INFINITY
    } else {
        total / points as f64
    }
}

/// Searches for the edge coefficients that best reproduce `observations`.
///
/// On success the best parameters are written into `kernel` and the kernel
/// is reset. On error the kernel's coefficients are unchanged.
pub fn calibrate(
    kernel: &mut Kernel,
    observations: &[NodeObservations],
    options: &CalibrationOptions,
) -> Result<CalibrationReport, KernelError> {
    if observations.is_empty() {
        return Err(KernelError::InvalidParameter {
            name: "observations".into(),
            reason: "at least one series is required".into(),
        });
    }
    if options.population < 4 {
        return Err(KernelError::InvalidParameter {
            name: "population".into(),
            reason: format!("{} is too small, need at least 4", options.population),
        });
    }
    let (lo, hi) = options.initial_k;
    if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
        return Err(KernelError::InvalidParameter {
            name: "initial_k".into(),
            reason: format!("[{}, {}] is not a valid range", lo, hi),
        });
    }

    let mut targets = Vec::with_capacity(observations.len());
    for series in observations {
        let index = kernel.find_node(&series.node_id).ok_or_else(|| KernelError::UnknownNode {
            context: "observation".into(),
            id: series.node_id.clone(),
        })?;
        let slot = kernel.graph().nodes()[index].offset;
        targets.push(Target { slot, data: &series.data });
    }

    let mut work = kernel.clone();
    let dim = kernel.edge_count();
    if dim == 0 {
        let score = fitness(&mut work, &[], &targets);
        return Ok(CalibrationReport { params: Vec::new(), fitness: score, evaluations: 1 });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let pop_size = options.population;
    let mut population: Vec<Vec<f64>> = (0..pop_size)
        .map(|_| (0..dim).map(|_| rng.gen_range(lo..=hi)).collect())
        .collect();
    let mut scores: Vec<f64> = population.iter().map(|p| fitness(&mut work, p, &targets)).collect();
    let mut evaluations = pop_size;

    let mut best = 0;
    for (i, s) in scores.iter().enumerate() {
        if *s < scores[best] {
            best = i;
        }
    }

    let mut trial = vec![0.0; dim];
    for iteration in 0..options.iterations {
        for i in 0..pop_size {
            let a = pick_distinct(&mut rng, pop_size, &[i]);
            let b = pick_distinct(&mut rng, pop_size, &[i, a]);
            let c = pick_distinct(&mut rng, pop_size, &[i, a, b]);
            let forced = rng.gen_range(0..dim);

            for (j, slot) in trial.iter_mut().enumerate() {
                *slot = if j == forced || rng.gen::<f64>() < options.crossover {
                    let mutant = population[a][j] + options.mutation * (population[b][j] - population[c][j]);
                    mutant.max(0.0)
                } else {
                    population[i][j]
                };
            }

            let score = fitness(&mut work, &trial, &targets);
            evaluations += 1;
            if score <= scores[i] {
                population[i].copy_from_slice(&trial);
                scores[i] = score;
                if score < scores[best] {
                    best = i;
                }
            }
        }
        debug!(iteration, best = scores[best], "calibration generation");
    }

    let params = population.swap_remove(best);
    for (edge, &k) in kernel.graph.edges_mut().iter_mut().zip(&params) {
        edge.k = k;
    }
    kernel.reset();

    info!(
        kernel = %kernel.instance_id(),
        iterations = options.iterations,
        evaluations,
        fitness = scores[best],
        "calibration complete"
    );
    Ok(CalibrationReport { params, fitness: scores[best], evaluations })
}

/// Uniform index in `0..n` not present in `taken`.
fn pick_distinct(rng: &mut ChaCha8Rng, n: usize, taken: &[usize]) -> usize {
    loop {
        let candidate = rng.gen_range(0..n);
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
}
