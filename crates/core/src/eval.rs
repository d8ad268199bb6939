use std::collections::{BTreeMap, BTreeSet};

#[cfg(target_arch = "wasm32")]
use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

use crate::data::SlotData;
use crate::diagnostics::{DiagnosticSink, Severity};
use crate::graph::{Cardinality, Graph, GraphError, NodeId, PinId};
use crate::module::{InputData, Module, RefreshContext};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    pub dirty: bool,
    pub enabled: bool,
    pub outputs: Vec<SlotData>,
    pub refresh_count: u64,
    pub last_error: Option<String>,
}

impl NodeState {
    fn new(output_count: usize) -> Self {
        Self {
            dirty: true,
            enabled: true,
            outputs: vec![SlotData::Empty; output_count],
            refresh_count: 0,
            last_error: None,
        }
    }

    fn clear_outputs(&mut self) {
        for slot in &mut self.outputs {
            *slot = SlotData::Empty;
        }
    }
}

#[derive(Debug, Default)]
pub struct EvalState {
    nodes: BTreeMap<NodeId, NodeState>,
    order: Option<Vec<NodeId>>,
}

impl EvalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeId, output_count: usize) {
        self.nodes.insert(node, NodeState::new(output_count));
        self.order = None;
    }

    pub fn remove(&mut self, node: NodeId) -> Option<NodeState> {
        self.order = None;
        self.nodes.remove(&node)
    }

    pub fn node(&self, node: NodeId) -> Option<&NodeState> {
        self.nodes.get(&node)
    }

    pub fn node_mut(&mut self, node: NodeId) -> Option<&mut NodeState> {
        self.nodes.get_mut(&node)
    }

    /// Drops the cached order; call after any topology change.
    pub fn invalidate_order(&mut self) {
        self.order = None;
    }

    pub fn mark_dirty(&mut self, graph: &Graph, node: NodeId) {
        let targets = std::iter::once(node).chain(graph.descendants(node));
        for target in targets {
            if let Some(state) = self.nodes.get_mut(&target) {
                state.dirty = true;
            }
        }
    }

    pub fn is_dirty(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|state| state.dirty)
    }

    pub fn output(&self, node: NodeId, index: usize) -> SlotData {
        self.nodes
            .get(&node)
            .and_then(|state| state.outputs.get(index))
            .cloned()
            .unwrap_or_default()
    }

    fn order(&mut self, graph: &Graph) -> Result<Vec<NodeId>, GraphError> {
        if let Some(order) = &self.order {
            return Ok(order.clone());
        }
        let order = graph.topo_order()?;
        self.order = Some(order.clone());
        Ok(order)
    }

    pub fn pin_data(&self, graph: &Graph, pin: PinId) -> Vec<SlotData> {
        graph
            .input_links(pin)
            .filter_map(|link| graph.pin(link.from))
            .map(|from| self.output(from.node, from.index))
            .collect()
    }

    fn gather_inputs(&self, graph: &Graph, node: NodeId) -> Vec<InputData> {
        let Some(node) = graph.node(node) else {
            return Vec::new();
        };
        node.inputs
            .iter()
            .map(|pin_id| {
                let data = self.pin_data(graph, *pin_id);
                match graph.pin(*pin_id).map(|pin| pin.cardinality) {
                    Some(Cardinality::Array) => InputData::Array(data),
                    _ => InputData::Single(data.into_iter().next().unwrap_or_default()),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalNodeReport {
    pub node: NodeId,
    pub duration_ms: f32,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("node {node:?}: {message}")]
    Node {
        node: NodeId,
        severity: Severity,
        message: String,
    },
    #[error("node {0:?} has no module instance")]
    MissingModule(NodeId),
}

#[derive(Debug, Clone, Default)]
pub struct EvalReport {
    pub computed: Vec<NodeId>,
    /// Dirty nodes that were disabled and cleared without refreshing.
    pub disabled: Vec<NodeId>,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub node_reports: BTreeMap<NodeId, EvalNodeReport>,
    pub errors: Vec<EvalError>,
    pub duration_ms: f32,
}

impl EvalReport {
    pub fn failed(&self, node: NodeId) -> bool {
        self.errors.iter().any(|err| match err {
            EvalError::Node { node: failed, .. } => *failed == node,
            EvalError::MissingModule(failed) => *failed == node,
        })
    }
}

fn upstream_closure(graph: &Graph, target: NodeId) -> BTreeSet<NodeId> {
    let mut reached = BTreeSet::from([target]);
    let mut stack = vec![target];
    while let Some(node) = stack.pop() {
        for upstream in graph.upstream_nodes(node) {
            if reached.insert(upstream) {
                stack.push(upstream);
            }
        }
    }
    reached
}

pub fn evaluate_dirty(
    graph: &Graph,
    modules: &mut BTreeMap<NodeId, Box<dyn Module>>,
    state: &mut EvalState,
    diagnostics: &mut DiagnosticSink,
) -> Result<EvalReport, GraphError> {
    evaluate_with_scope(graph, modules, state, diagnostics, None)
}

/// Refreshes the dirty nodes `target` depends on, then `target` itself.
/// Dirty nodes outside that set stay dirty.
pub fn evaluate_from(
    graph: &Graph,
    target: NodeId,
    modules: &mut BTreeMap<NodeId, Box<dyn Module>>,
    state: &mut EvalState,
    diagnostics: &mut DiagnosticSink,
) -> Result<EvalReport, GraphError> {
    if graph.node(target).is_none() {
        return Err(GraphError::MissingNode(target));
    }
    let scope = upstream_closure(graph, target);
    evaluate_with_scope(graph, modules, state, diagnostics, Some(&scope))
}

fn evaluate_with_scope(
    graph: &Graph,
    modules: &mut BTreeMap<NodeId, Box<dyn Module>>,
    state: &mut EvalState,
    diagnostics: &mut DiagnosticSink,
    scope: Option<&BTreeSet<NodeId>>,
) -> Result<EvalReport, GraphError> {
    let start = Instant::now();
    let order = state.order(graph)?;
    let mut report = EvalReport::default();

    for node_id in order {
        if scope.is_some_and(|scope| !scope.contains(&node_id)) {
            continue;
        }
        let Some((dirty, enabled)) = state
            .node(node_id)
            .map(|node_state| (node_state.dirty, node_state.enabled))
        else {
            continue;
        };

        if !dirty {
            report.cache_hits += 1;
            report.node_reports.insert(
                node_id,
                EvalNodeReport {
                    node: node_id,
                    duration_ms: 0.0,
                    cache_hit: true,
                },
            );
            continue;
        }
        report.cache_misses += 1;

        if !enabled {
            if let Some(node_state) = state.node_mut(node_id) {
                node_state.clear_outputs();
                node_state.dirty = false;
                node_state.last_error = None;
            }
            tracing::debug!(node = ?node_id, "disabled, output cleared");
            report.disabled.push(node_id);
            continue;
        }

        let inputs = state.gather_inputs(graph, node_id);
        let output_count = state
            .node(node_id)
            .map(|node_state| node_state.outputs.len())
            .unwrap_or_default();
        let mut outputs = vec![SlotData::Empty; output_count];

        let node_start = Instant::now();
        let result = match modules.get_mut(&node_id) {
            Some(module) => {
                let mut ctx = RefreshContext::new(node_id, inputs, &mut outputs, diagnostics);
                module.refresh(&mut ctx).map_err(|err| EvalError::Node {
                    node: node_id,
                    severity: err.severity(),
                    message: err.to_string(),
                })
            }
            None => Err(EvalError::MissingModule(node_id)),
        };
        let duration_ms = node_start.elapsed().as_secs_f32() * 1000.0;

        let Some(node_state) = state.node_mut(node_id) else {
            continue;
        };
        node_state.dirty = false;
        node_state.refresh_count += 1;
        match result {
            Ok(()) => {
                node_state.outputs = outputs;
                node_state.last_error = None;
                tracing::debug!(node = ?node_id, duration_ms, "refreshed");
            }
            Err(err) => {
                node_state.clear_outputs();
                node_state.last_error = Some(err.to_string());
                let severity = match &err {
                    EvalError::Node { severity, .. } => *severity,
                    EvalError::MissingModule(_) => Severity::Error,
                };
                let message = match &err {
                    EvalError::Node { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                diagnostics.push(Some(node_id), severity, message);
                report.errors.push(err);
            }
        }
        report.computed.push(node_id);
        report.node_reports.insert(
            node_id,
            EvalNodeReport {
                node: node_id,
                duration_ms,
                cache_hit: false,
            },
        );
    }

    report.duration_ms = start.elapsed().as_secs_f32() * 1000.0;
    tracing::info!(
        computed = report.computed.len(),
        cache_hits = report.cache_hits,
        errors = report.errors.len(),
        duration_ms = report.duration_ms,
        "evaluation pass"
    );
    Ok(report)
}
