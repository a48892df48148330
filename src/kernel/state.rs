//! Flat State Vector with a staging buffer.
//!
//! A step reads the committed buffer and writes the staging buffer; only a
//! successful step copies staging into the committed buffer. The committed
//! buffer is never reallocated, so its address stays valid for the lifetime of
//! the kernel.

#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    current: Vec<f64>,
    staging: Vec<f64>,
    initial: Vec<f64>,
}

impl StateVector {
    pub fn new(initial: Vec<f64>) -> Self {
        StateVector { current: initial.clone(), staging: vec![0.0; initial.len()], initial }
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.current
    }

    pub fn as_ptr(&self) -> *const f64 {
        self.current.as_ptr()
    }

    pub fn initial(&self) -> &[f64] {
        &self.initial
    }

    /// Prior state (read-only) and the staging buffer for the next one.
    pub fn split_for_step(&mut self) -> (&[f64], &mut [f64]) {
        (&self.current, &mut self.staging)
    }

    /// Publishes the staged values.
    pub fn commit(&mut self) {
        self.current.copy_from_slice(&self.staging);
    }

    pub fn reset(&mut self) {
        self.current.copy_from_slice(&self.initial);
    }
}
