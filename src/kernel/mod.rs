pub mod access;
pub mod core;
pub mod dynamics;
pub mod integrator;
pub mod state;


// Re-export the primary types so `crate::kernel::*` paths stay short.
pub use self::core::{Kernel, StepOutcome};
pub use state::StateVector;
