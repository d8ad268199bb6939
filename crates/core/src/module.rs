use crate::data::SlotData;
use crate::diagnostics::{DiagnosticSink, Severity};
use crate::graph::{NodeDefinition, NodeId, PinDefinition};
use crate::params::{NodeParams, ParamError, ParamValue};
use crate::triangulate::TriangulationError;

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInfo {
    pub kind: &'static str,
    pub category: &'static str,
    pub inputs: Vec<PinDefinition>,
    pub outputs: Vec<PinDefinition>,
}

impl ModuleInfo {
    pub fn definition(&self) -> NodeDefinition {
        NodeDefinition {
            name: self.kind.to_string(),
            category: self.category.to_string(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModuleError {
    #[error("missing required input `{0}`")]
    MissingInput(&'static str),
    #[error("{0}")]
    Degenerate(String),
    #[error("triangulation failed: {0}")]
    Triangulation(#[from] TriangulationError),
    #[error("{0}")]
    Failed(String),
}

impl ModuleError {
    pub fn severity(&self) -> Severity {
        match self {
            ModuleError::MissingInput(_) | ModuleError::Degenerate(_) => Severity::Warning,
            ModuleError::Triangulation(_) | ModuleError::Failed(_) => Severity::Error,
        }
    }
}

pub trait Configurable {
    fn param(&self, name: &str) -> Option<ParamValue>;
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), ParamError>;
    fn param_names(&self) -> Vec<&'static str>;
    fn params(&self) -> NodeParams;
}

pub trait Refreshable {
    fn refresh(&mut self, ctx: &mut RefreshContext<'_>) -> Result<(), ModuleError>;
}

pub trait Previewable {
    fn preview(&self) -> String;
}

pub trait Module: Configurable + Refreshable + Previewable + Send {
    fn info(&self) -> ModuleInfo;
}

#[derive(Debug, Clone)]
pub enum InputData {
    Single(SlotData),
    Array(Vec<SlotData>),
}

pub struct RefreshContext<'a> {
    node: NodeId,
    inputs: Vec<InputData>,
    outputs: &'a mut [SlotData],
    diagnostics: &'a mut DiagnosticSink,
}

impl<'a> RefreshContext<'a> {
    pub fn new(
        node: NodeId,
        inputs: Vec<InputData>,
        outputs: &'a mut [SlotData],
        diagnostics: &'a mut DiagnosticSink,
    ) -> Self {
        Self {
            node,
            inputs,
            outputs,
            diagnostics,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Data of the sole producer feeding input `index`, or `Empty` when the
    /// slot is unconnected. For array slots this is the first producer.
    pub fn get_data(&self, index: usize) -> SlotData {
        match self.inputs.get(index) {
            Some(InputData::Single(data)) => data.clone(),
            Some(InputData::Array(items)) => items.first().cloned().unwrap_or_default(),
            None => SlotData::Empty,
        }
    }

    pub fn get_all_data(&self, index: usize) -> Vec<SlotData> {
        match self.inputs.get(index) {
            Some(InputData::Array(items)) => items.clone(),
            Some(InputData::Single(SlotData::Empty)) | None => Vec::new(),
            Some(InputData::Single(data)) => vec![data.clone()],
        }
    }

    pub fn set_output(&mut self, index: usize, data: SlotData) {
        match self.outputs.get_mut(index) {
            Some(slot) => *slot = data,
            None => tracing::warn!(node = ?self.node, index, "output index out of range"),
        }
    }

    pub fn clear_outputs(&mut self) {
        for slot in self.outputs.iter_mut() {
            *slot = SlotData::Empty;
        }
    }

    pub fn report(&mut self, severity: Severity, message: impl Into<String>) {
        self.diagnostics.push(Some(self.node), severity, message);
    }
}
