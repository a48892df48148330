//!
//! Defines error types for the GSSK kernel and their boundary status codes.

/// Status codes returned across the C boundary.
///
/// The numeric values are part of the host contract and must not be reordered.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success = 0,
    /// The configuration document could not be parsed into the model schema.
    InvalidConfig = 1,
    /// The document parsed but violates a model constraint.
    ValidationFailed = 2,
    /// A step produced a non-finite value; the state was left untouched.
    Divergence = 3,
    /// The kernel already reached `t_end`.
    Finished = 4,
    /// The handle was never issued, already freed, or belongs to a failed Init.
    InvalidHandle = 5,
    /// An index argument was outside the valid range.
    OutOfRange = 6,
    /// A pointer or scalar argument was unusable (null, non-UTF-8, non-finite).
    InvalidArgument = 7,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

/// Represents errors that can occur while building, stepping, or querying a kernel.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    // --- Configuration errors ---
    /// The document is not valid JSON or does not match the model schema.
    #[error("Configuration error: {0}")]
    Config(String),

    // --- Validation errors ---
    /// Two node declarations share an external identifier.
    #[error("Duplicate node ID '{id}' (at index {index}, first seen at index {first})")]
    DuplicateNode { id: String, index: usize, first: usize },
    /// A node or edge references an identifier that was never declared.
    #[error("{context} references non-existent node '{id}'")]
    UnknownNode { context: String, id: String },
    /// The node `type` selector does not name a known dynamics rule.
    #[error("Node '{id}' has unknown type '{kind}'")]
    UnknownNodeKind { id: String, kind: String },
    /// The edge `logic` selector does not name a known flow rule.
    #[error("Edge {edge} has unknown logic '{logic}'")]
    UnknownLogic { edge: String, logic: String },
    /// `interaction` and `limit` flows need a control node.
    #[error("Edge {edge} ({logic}) requires 'control_node' in params")]
    MissingControlNode { edge: String, logic: String },
    /// The declared initial state does not fit the dynamics rule.
    #[error("Node '{id}' declares {found} initial value(s) but its dynamics rule expects {expected}")]
    StateWidthMismatch { id: String, expected: usize, found: usize },
    /// A numeric parameter is outside its allowed domain.
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
    /// The time domain violates `t_start < t_end` or `dt > 0`.
    #[error("Invalid time domain: {0}")]
    InvalidTimeDomain(String),

    // --- Stepping errors ---
    /// A dynamics rule produced NaN or infinity. Nothing was committed.
    #[error("Numerical divergence at node '{node}' (t = {t})")]
    Divergence { node: String, t: f64 },
    /// `t_current` already reached `t_end`.
    #[error("Simulation finished: t_current ({t_current}) has reached t_end ({t_end})")]
    Finished { t_current: f64, t_end: f64 },

    // --- Query errors ---
    /// Index outside `[0, len)`.
    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange { what: &'static str, index: usize, len: usize },
    /// The handle does not refer to a live kernel.
    #[error("Invalid kernel handle")]
    InvalidHandle,
}

impl KernelError {
    /// Maps the error onto the status code reported across the boundary.
    pub fn status(&self) -> Status {
        match self {
            KernelError::Config(_) => Status::InvalidConfig,
            KernelError::DuplicateNode { .. }
            | KernelError::UnknownNode { .. }
            | KernelError::UnknownNodeKind { .. }
            | KernelError::UnknownLogic { .. }
            | KernelError::MissingControlNode { .. }
            | KernelError::StateWidthMismatch { .. }
            | KernelError::InvalidTimeDomain(_) => Status::ValidationFailed,
            KernelError::InvalidParameter { .. } => Status::InvalidArgument,
            KernelError::Divergence { .. } => Status::Divergence,
            KernelError::Finished { .. } => Status::Finished,
            KernelError::OutOfRange { .. } => Status::OutOfRange,
            KernelError::InvalidHandle => Status::InvalidHandle,
        }
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(err: serde_json::Error) -> Self {
        KernelError::Config(err.to_string())
    }
}
