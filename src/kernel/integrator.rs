//! Fixed-step integrators.
//!
//! Both methods read a frozen `prior` slice and write only to `out`, using
//! preallocated scratch buffers so a step performs no allocation.

use crate::graph::NodeGraph;
use crate::kernel::dynamics::derivatives;
use crate::types::Method;

/// Stage buffers, sized once at build time.
#[derive(Debug, Clone)]
pub struct Scratch {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl Scratch {
    pub fn new(method: Method, len: usize) -> Self {
        // Euler only touches k1.
        let rk_len = if method == Method::Rk4 { len } else { 0 };
        Scratch {
            k1: vec![0.0; len],
            k2: vec![0.0; rk_len],
            k3: vec![0.0; rk_len],
            k4: vec![0.0; rk_len],
            tmp: vec![0.0; rk_len],
        }
    }
}

/// Advances `prior` by `dt` into `out`.
pub fn integrate(
    method: Method,
    graph: &NodeGraph,
    prior: &[f64],
    dt: f64,
    scratch: &mut Scratch,
    out: &mut [f64],
) {
    match method {
        Method::Euler => euler(graph, prior, dt, scratch, out),
        Method::Rk4 => rk4(graph, prior, dt, scratch, out),
    }
}

fn euler(graph: &NodeGraph, prior: &[f64], dt: f64, s: &mut Scratch, out: &mut [f64]) {
    derivatives(graph, prior, &mut s.k1);
    for ((o, &y), &d) in out.iter_mut().zip(prior).zip(&s.k1) {
        *o = y + d * dt;
    }
}

fn rk4(graph: &NodeGraph, prior: &[f64], dt: f64, s: &mut Scratch, out: &mut [f64]) {
    derivatives(graph, prior, &mut s.k1);

    offset(&mut s.tmp, prior, &s.k1, 0.5 * dt);
    derivatives(graph, &s.tmp, &mut s.k2);

    offset(&mut s.tmp, prior, &s.k2, 0.5 * dt);
    derivatives(graph, &s.tmp, &mut s.k3);

    offset(&mut s.tmp, prior, &s.k3, dt);
    derivatives(graph, &s.tmp, &mut s.k4);

    let h6 = dt / 6.0;
    for (i, o) in out.iter_mut().enumerate() {
        *o = prior[i] + h6 * (s.k1[i] + 2.0 * s.k2[i] + 2.0 * s.k3[i] + s.k4[i]);
    }
}

/// `dst = y + h * k`
fn offset(dst: &mut [f64], y: &[f64], k: &[f64], h: f64) {
    for ((d, &yi), &ki) in dst.iter_mut().zip(y).zip(k) {
        *d = yi + h * ki;
    }
}
