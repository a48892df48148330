//! Model builder: parses a system description and turns it into a ready-to-step
//! [`Kernel`].
//!
//! Validation fails fast on the first violation and names the offending node,
//! edge or parameter. Index assignment follows declaration order.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::KernelError;
use crate::graph::{Edge, NodeGraph};
use crate::kernel::Kernel;
use crate::types::{FlowLogic, Method, NodeKind, OscillatorParams, TimeDomain};

/// Initial state of a node: a scalar for width-1 rules, an array otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitialValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl InitialValue {
    pub fn values(&self) -> &[f64] {
        match self {
            InitialValue::Scalar(v) => std::slice::from_ref(v),
            InitialValue::Vector(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: InitialValue,
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(default)]
    pub params: OscillatorParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeParams {
    pub k: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_node: Option<String>,
    #[serde(default)]
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub origin: String,
    pub target: String,
    pub logic: String,
    pub params: EdgeParams,
}

/// Time-domain block of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub t_start: f64,
    pub t_end: f64,
    pub dt: f64,
    pub method: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig { t_start: 0.0, t_end: 100.0, dt: 0.1, method: "euler".to_string() }
    }
}

/// Parsed, not yet validated, system description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub config: SimConfig,
}

impl ModelSpec {
    pub fn from_json(json: &str) -> Result<Self, KernelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, KernelError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, KernelError> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| KernelError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_slice(&data)
    }

    /// Validates the description and builds a kernel.
    pub fn build(&self) -> Result<Kernel, KernelError> {
        ModelBuilder::new(self).build()
    }
}

/// Turns a [`ModelSpec`] into a [`Kernel`].
pub struct ModelBuilder<'a> {
    spec: &'a ModelSpec,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(spec: &'a ModelSpec) -> Self {
        ModelBuilder { spec }
    }

    pub fn build(self) -> Result<Kernel, KernelError> {
        let time = self.time_domain()?;
        let method = Method::parse(&self.spec.config.method);

        let mut graph = NodeGraph::new();
        let mut initial = Vec::new();
        for (i, decl) in self.spec.nodes.iter().enumerate() {
            let kind = NodeKind::parse(&decl.kind, decl.params).ok_or_else(|| {
                KernelError::UnknownNodeKind { id: decl.id.clone(), kind: decl.kind.clone() }
            })?;
            let values = decl.value.values();
            if values.len() != kind.state_width() {
                return Err(KernelError::StateWidthMismatch {
                    id: decl.id.clone(),
                    expected: kind.state_width(),
                    found: values.len(),
                });
            }
            graph.push_node(&decl.id, kind).map_err(|first| KernelError::DuplicateNode {
                id: decl.id.clone(),
                index: i,
                first,
            })?;
            initial.extend_from_slice(values);
        }

        // Declared connections are resolved after every node exists so that
        // forward references are allowed.
        for (i, decl) in self.spec.nodes.iter().enumerate() {
            for conn in &decl.connections {
                let source = Self::resolve(&graph, conn, || format!("Node '{}' connection", decl.id))?;
                graph.declare_connection(i, source);
            }
        }

        for (i, decl) in self.spec.edges.iter().enumerate() {
            let edge = self.edge(&graph, i, decl)?;
            graph.push_edge(edge);
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edges().len(),
            state_size = graph.state_size(),
            ?method,
            "model validated"
        );
        Ok(Kernel::new(graph, initial, time, method))
    }

    fn time_domain(&self) -> Result<TimeDomain, KernelError> {
        let cfg = &self.spec.config;
        if cfg.t_end <= cfg.t_start {
            return Err(KernelError::InvalidTimeDomain(format!(
                "t_end ({}) must be greater than t_start ({})",
                cfg.t_end, cfg.t_start
            )));
        }
        if !(cfg.t_start.is_finite() && cfg.t_end.is_finite() && cfg.dt.is_finite()) {
            return Err(KernelError::InvalidTimeDomain("t_start, t_end and dt must be finite".into()));
        }
        if cfg.dt <= 0.0 {
            return Err(KernelError::InvalidTimeDomain(format!("dt ({}) must be positive", cfg.dt)));
        }
        // A step this small would leave t_current where it is.
        if cfg.t_start + cfg.dt == cfg.t_start || cfg.t_end - cfg.dt == cfg.t_end {
            return Err(KernelError::InvalidTimeDomain(format!(
                "dt ({}) is below the floating-point resolution of [{}, {}]",
                cfg.dt, cfg.t_start, cfg.t_end
            )));
        }
        Ok(TimeDomain::new(cfg.t_start, cfg.t_end, cfg.dt))
    }

    fn edge(&self, graph: &NodeGraph, i: usize, decl: &EdgeSpec) -> Result<Edge, KernelError> {
        let label = match &decl.id {
            Some(id) => format!("'{}'", id),
            None => format!("#{}", i),
        };
        let origin = Self::resolve(graph, &decl.origin, || format!("Edge {} origin", label))?;
        let target = Self::resolve(graph, &decl.target, || format!("Edge {} target", label))?;
        let logic = FlowLogic::parse(&decl.logic).ok_or_else(|| KernelError::UnknownLogic {
            edge: label.clone(),
            logic: decl.logic.clone(),
        })?;
        let control = match &decl.params.control_node {
            Some(id) => Some(Self::resolve(graph, id, || format!("Edge {} control", label))?),
            None => None,
        };
        if logic.requires_control() && control.is_none() {
            return Err(KernelError::MissingControlNode { edge: label, logic: logic.name().into() });
        }
        Ok(Edge {
            label,
            origin,
            target,
            control,
            logic,
            k: decl.params.k,
            threshold: decl.params.threshold,
        })
    }

    fn resolve(
        graph: &NodeGraph,
        id: &str,
        context: impl FnOnce() -> String,
    ) -> Result<usize, KernelError> {
        graph
            .find(id)
            .ok_or_else(|| KernelError::UnknownNode { context: context(), id: id.to_string() })
    }
}
