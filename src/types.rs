//! Shared enums and value types used by the model builder, the node graph and
//! the time-stepping engine.

/// Dynamics rule of a node, resolved once at build time.
///
/// The set is closed: the engine dispatches on it with a `match`, and every
/// variant fixes the node's `state_width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// Accumulates the net flow of its edges.
    Storage,
    /// Held at its initial value; still emits flows along its edges.
    Source,
    /// Absorbs flow. Integrates exactly like `Storage`.
    Sink,
    /// Identity rule: never changes.
    Constant,
    /// Damped harmonic oscillator with state `[x, v]`.
    Oscillator(OscillatorParams),
}

/// Parameters of the `oscillator` dynamics rule.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OscillatorParams {
    /// Angular frequency.
    pub omega: f64,
    /// Linear damping applied to velocity.
    pub damping: f64,
    /// Gain on the summed primary values of the node's declared connections.
    pub coupling: f64,
}

impl NodeKind {
    /// Resolves the `type` selector of a node declaration.
    pub fn parse(selector: &str, params: OscillatorParams) -> Option<Self> {
        match selector {
            "storage" => Some(NodeKind::Storage),
            "source" => Some(NodeKind::Source),
            "sink" => Some(NodeKind::Sink),
            "constant" => Some(NodeKind::Constant),
            "oscillator" => Some(NodeKind::Oscillator(params)),
            _ => None,
        }
    }

    /// Number of scalars this rule contributes to the State Vector.
    pub fn state_width(&self) -> usize {
        match self {
            NodeKind::Oscillator(_) => 2,
            _ => 1,
        }
    }

    /// Whether the node's derivative is forced to zero.
    pub fn is_fixed(&self) -> bool {
        matches!(self, NodeKind::Source | NodeKind::Constant)
    }

    /// Quantity-like nodes cannot drop below zero.
    pub fn is_non_negative(&self) -> bool {
        !matches!(self, NodeKind::Oscillator(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Storage => "storage",
            NodeKind::Source => "source",
            NodeKind::Sink => "sink",
            NodeKind::Constant => "constant",
            NodeKind::Oscillator(_) => "oscillator",
        }
    }
}

/// Flow rule of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowLogic {
    /// Fixed flow rate `k`.
    Constant,
    /// Proportional to the origin: `k * Q`.
    Linear,
    /// Multiplier flow: `k * Q * C`.
    Interaction,
    /// Michaelis-Menten saturation: `k * Q / (1 + Q / C)`.
    Limit,
    /// `k` while `Q > threshold`, else zero.
    Threshold,
}

impl FlowLogic {
    pub fn parse(selector: &str) -> Option<Self> {
        match selector {
            "constant" => Some(FlowLogic::Constant),
            "linear" => Some(FlowLogic::Linear),
            "interaction" => Some(FlowLogic::Interaction),
            "limit" => Some(FlowLogic::Limit),
            "threshold" => Some(FlowLogic::Threshold),
            _ => None,
        }
    }

    pub fn requires_control(&self) -> bool {
        matches!(self, FlowLogic::Interaction | FlowLogic::Limit)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlowLogic::Constant => "constant",
            FlowLogic::Linear => "linear",
            FlowLogic::Interaction => "interaction",
            FlowLogic::Limit => "limit",
            FlowLogic::Threshold => "threshold",
        }
    }
}

/// Integration method used by `Step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Euler,
    Rk4,
}

impl Method {
    /// Unrecognised selectors fall back to Euler.
    pub fn parse(selector: &str) -> Self {
        match selector {
            "rk4" => Method::Rk4,
            _ => Method::Euler,
        }
    }
}

/// Configured time span plus the live clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeDomain {
    pub t_start: f64,
    pub t_end: f64,
    pub dt: f64,
    pub t_current: f64,
}

impl TimeDomain {
    /// Relative tolerance (in units of the configured `dt`) under which a
    /// remaining span is treated as zero.
    pub const END_TOLERANCE: f64 = 1e-9;

    pub fn new(t_start: f64, t_end: f64, dt: f64) -> Self {
        TimeDomain { t_start, t_end, dt, t_current: t_start }
    }

    pub fn remaining(&self) -> f64 {
        self.t_end - self.t_current
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() <= self.dt * Self::END_TOLERANCE
    }

    /// Increment actually applied for a requested `dt`.
    ///
    /// Returns `(dt_used, lands_on_end)`. A step that would overshoot `t_end`,
    /// or land within tolerance of it, is shortened to end exactly there.
    pub fn clamp_increment(&self, requested: f64) -> (f64, bool) {
        let remaining = self.remaining();
        if requested >= remaining - self.dt * Self::END_TOLERANCE {
            (remaining, true)
        } else {
            (requested, false)
        }
    }

    /// Number of configured-`dt` steps from `t_start` to `t_end`, counting a
    /// final partial step. Saturates at `usize::MAX`.
    pub fn steps_to_end(&self) -> usize {
        let span = (self.t_end - self.t_start) / self.dt;
        (span - Self::END_TOLERANCE).ceil().max(0.0) as usize
    }
}

/// Observable lifecycle phase of a built kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// `t_current < t_end`; `Step` is accepted.
    Ready,
    /// `t_current >= t_end`; queries are valid, `Step` is rejected.
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_kind() {
        assert_eq!(NodeKind::Storage.state_width(), 1);
        assert_eq!(NodeKind::Oscillator(OscillatorParams::default()).state_width(), 2);
    }

    #[test]
    fn unknown_method_falls_back_to_euler() {
        assert_eq!(Method::parse("rk4"), Method::Rk4);
        assert_eq!(Method::parse("midpoint"), Method::Euler);
    }

    #[test]
    fn half_steps_reach_end_exactly() {
        let mut td = TimeDomain::new(0.0, 1.0, 0.5);
        assert_eq!(td.clamp_increment(0.5), (0.5, false));
        td.t_current = 0.5;
        assert_eq!(td.clamp_increment(0.5), (0.5, true));
        td.t_current = 1.0;
        assert!(td.is_finished());
    }

    #[test]
    fn accumulated_tenths_do_not_leave_a_sliver() {
        let mut td = TimeDomain::new(0.0, 1.0, 0.1);
        let mut steps = 0;
        while !td.is_finished() {
            let (dt, lands) = td.clamp_increment(0.1);
            td.t_current = if lands { td.t_end } else { td.t_current + dt };
            steps += 1;
        }
        assert_eq!(steps, 10);
        assert_eq!(td.t_current, 1.0);
        assert_eq!(td.steps_to_end(), 10);
    }

    #[test]
    fn step_count_saturates() {
        assert_eq!(TimeDomain::new(0.0, 1e20, 1.0).steps_to_end(), usize::MAX);
    }

    #[test]
    fn partial_final_step_is_counted() {
        let td = TimeDomain::new(0.0, 1.0, 0.3);
        assert_eq!(td.steps_to_end(), 4);
    }
}
