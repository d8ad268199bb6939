use std::collections::BTreeMap;

use crate::config::GeneratorConfig;
use crate::data::SlotData;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::eval::{evaluate_dirty, evaluate_from, EvalReport, EvalState};
use crate::graph::{Graph, GraphError, Link, LinkId, NodeId, PinId, PinKind};
use crate::module::Module;
use crate::nodes_builtin::{builtin_kind_from_name, create_module, BuiltinNodeKind};
use crate::params::{NodeParams, ParamError, ParamValue};

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error("unknown module kind `{0}`")]
    UnknownKind(String),
    #[error("node {node:?} has no {kind:?} pin named `{name}`")]
    UnknownPin {
        node: NodeId,
        name: String,
        kind: PinKind,
    },
}

/// Owns the module graph, the module instances and their cached outputs.
/// All mutation goes through here so dirty flags stay consistent with the
/// topology.
pub struct Generator {
    graph: Graph,
    modules: BTreeMap<NodeId, Box<dyn Module>>,
    state: EvalState,
    diagnostics: DiagnosticSink,
    config: GeneratorConfig,
    last_report: Option<EvalReport>,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            graph: Graph::new(),
            modules: BTreeMap::new(),
            state: EvalState::new(),
            diagnostics: DiagnosticSink::new(),
            config,
            last_report: None,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn add_module(&mut self, module: Box<dyn Module>) -> NodeId {
        let info = module.info();
        let node = self.graph.add_node(info.definition());
        self.state.insert(node, info.outputs.len());
        self.modules.insert(node, module);
        tracing::debug!(?node, kind = info.kind, "module added");
        node
    }

    pub fn add_builtin(&mut self, kind: BuiltinNodeKind) -> NodeId {
        let module = create_module(kind, &self.config);
        self.add_module(module)
    }

    pub fn add_module_by_name(&mut self, name: &str) -> Result<NodeId, GeneratorError> {
        let kind =
            builtin_kind_from_name(name).ok_or_else(|| GeneratorError::UnknownKind(name.to_string()))?;
        Ok(self.add_builtin(kind))
    }

    pub fn remove_module(&mut self, node: NodeId) -> Result<Box<dyn Module>, GeneratorError> {
        let consumers = self.graph.downstream_nodes(node);
        self.graph.remove_node(node)?;
        self.state.remove(node);
        for consumer in consumers {
            self.state.mark_dirty(&self.graph, consumer);
        }
        self.modules
            .remove(&node)
            .ok_or(GeneratorError::Graph(GraphError::MissingNode(node)))
    }

    /// Links an output pin to an input pin and dirties the consumer. A
    /// rejected link leaves both the graph and the dirty flags untouched.
    pub fn connect(&mut self, from: PinId, to: PinId) -> Result<LinkId, GeneratorError> {
        let link = self.graph.add_link(from, to)?;
        self.state.invalidate_order();
        if let Some(consumer) = self.graph.pin(to).map(|pin| pin.node) {
            self.state.mark_dirty(&self.graph, consumer);
        }
        tracing::debug!(?from, ?to, "connected");
        Ok(link)
    }

    pub fn connect_by_name(
        &mut self,
        from_node: NodeId,
        from_pin: &str,
        to_node: NodeId,
        to_pin: &str,
    ) -> Result<LinkId, GeneratorError> {
        let from = self.find_pin(from_node, from_pin, PinKind::Output)?;
        let to = self.find_pin(to_node, to_pin, PinKind::Input)?;
        self.connect(from, to)
    }

    pub fn find_pin(&self, node: NodeId, name: &str, kind: PinKind) -> Result<PinId, GeneratorError> {
        if self.graph.node(node).is_none() {
            return Err(GraphError::MissingNode(node).into());
        }
        self.graph
            .find_pin(node, name, kind)
            .ok_or_else(|| GeneratorError::UnknownPin {
                node,
                name: name.to_string(),
                kind,
            })
    }

    pub fn disconnect(&mut self, link: LinkId) -> Result<Link, GeneratorError> {
        let removed = self.graph.remove_link(link)?;
        self.after_disconnect(&removed);
        Ok(removed)
    }

    pub fn disconnect_pins(&mut self, from: PinId, to: PinId) -> Result<Link, GeneratorError> {
        let removed = self.graph.remove_link_between(from, to)?;
        self.after_disconnect(&removed);
        Ok(removed)
    }

    fn after_disconnect(&mut self, removed: &Link) {
        self.state.invalidate_order();
        if let Some(consumer) = self.graph.pin(removed.to).map(|pin| pin.node) {
            self.state.mark_dirty(&self.graph, consumer);
        }
        tracing::debug!(from = ?removed.from, to = ?removed.to, "disconnected");
    }

    /// Sets a parameter and dirties the module, even when the value is
    /// unchanged.
    pub fn set_param(&mut self, node: NodeId, name: &str, value: ParamValue) -> Result<(), GeneratorError> {
        let module = self
            .modules
            .get_mut(&node)
            .ok_or(GraphError::MissingNode(node))?;
        module.set_param(name, &value)?;
        self.state.mark_dirty(&self.graph, node);
        Ok(())
    }

    pub fn param(&self, node: NodeId, name: &str) -> Option<ParamValue> {
        self.modules.get(&node)?.param(name)
    }

    pub fn params(&self, node: NodeId) -> Option<NodeParams> {
        self.modules.get(&node).map(|module| module.params())
    }

    pub fn set_enabled(&mut self, node: NodeId, enabled: bool) -> Result<(), GeneratorError> {
        let state = self
            .state
            .node_mut(node)
            .ok_or(GraphError::MissingNode(node))?;
        if state.enabled != enabled {
            state.enabled = enabled;
            self.state.mark_dirty(&self.graph, node);
        }
        Ok(())
    }

    pub fn is_enabled(&self, node: NodeId) -> bool {
        self.state.node(node).is_some_and(|state| state.enabled)
    }

    pub fn mark_dirty(&mut self, node: NodeId) -> Result<(), GeneratorError> {
        if self.graph.node(node).is_none() {
            return Err(GraphError::MissingNode(node).into());
        }
        self.state.mark_dirty(&self.graph, node);
        Ok(())
    }

    pub fn is_dirty(&self, node: NodeId) -> bool {
        self.state.is_dirty(node)
    }

    pub fn request_refresh(&mut self) -> Result<&EvalReport, GeneratorError> {
        let report = evaluate_dirty(
            &self.graph,
            &mut self.modules,
            &mut self.state,
            &mut self.diagnostics,
        )?;
        let report: &EvalReport = self.last_report.insert(report);
        Ok(report)
    }

    pub fn refresh_node(&mut self, node: NodeId) -> Result<&EvalReport, GeneratorError> {
        let report = evaluate_from(
            &self.graph,
            node,
            &mut self.modules,
            &mut self.state,
            &mut self.diagnostics,
        )?;
        let report: &EvalReport = self.last_report.insert(report);
        Ok(report)
    }

    pub fn last_report(&self) -> Option<&EvalReport> {
        self.last_report.as_ref()
    }

    pub fn output(&self, node: NodeId, index: usize) -> SlotData {
        self.state.output(node, index)
    }

    pub fn get_data(&self, pin: PinId) -> SlotData {
        self.state
            .pin_data(&self.graph, pin)
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    pub fn get_all_data(&self, pin: PinId) -> Vec<SlotData> {
        self.state.pin_data(&self.graph, pin)
    }

    pub fn refresh_count(&self, node: NodeId) -> u64 {
        self.state
            .node(node)
            .map(|state| state.refresh_count)
            .unwrap_or_default()
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }

    pub fn module(&self, node: NodeId) -> Option<&dyn Module> {
        self.modules.get(&node).map(|module| module.as_ref())
    }

    pub fn preview(&self, node: NodeId) -> Option<String> {
        self.modules.get(&node).map(|module| module.preview())
    }

    pub fn node_kind(&self, node: NodeId) -> Option<&str> {
        self.graph.node(node).map(|node| node.name.as_str())
    }
}
