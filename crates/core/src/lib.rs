mod caps;
mod config;
mod data;
mod diagnostics;
mod eval;
mod generator;
mod graph;
pub mod math;
mod mesh;
mod module;
mod nodes_builtin;
pub mod params;
mod project;
mod scene;
mod triangulate;
mod volume;

pub use caps::{
    apply_uv, build_cap, project_ring, CapBuild, CapEnd, CapPatch, CapSettings, KeepAspect,
    MaterialSettings, VolumeCaps, YesNoAuto, DEDUP_EPSILON,
};
pub use config::GeneratorConfig;
pub use data::SlotData;
pub use diagnostics::{Diagnostic, DiagnosticSink, Severity};
pub use eval::{
    evaluate_dirty, evaluate_from, EvalError, EvalNodeReport, EvalReport, EvalState, NodeState,
};
pub use generator::{Generator, GeneratorError};
pub use graph::{
    Cardinality, Graph, GraphError, Link, LinkId, Node, NodeDefinition, NodeId, Pin,
    PinDefinition, PinId, PinKind, PinType,
};
pub use mesh::{Aabb, MaterialRef, Mesh, SubMesh};
pub use module::{
    Configurable, InputData, Module, ModuleError, ModuleInfo, Previewable, RefreshContext,
    Refreshable,
};
pub use nodes_builtin::{
    builtin_definitions, builtin_kind_from_name, create_module, default_params, node_definition,
    BuiltinNodeKind, MergeMeshes, ShapeKind, ShapeSettings, ShapeVolume, MAX_SECTIONS, MAX_SIDES,
};
pub use params::{NodeParams, ParamError, ParamKind, ParamRegistry, ParamValue};
pub use project::{
    Endpoint, GraphRecord, LinkRecord, NodeRecord, Project, ProjectSettings, RecordError,
    PROJECT_VERSION,
};
pub use scene::{SceneMesh, SceneSnapshot};
pub use triangulate::{triangulate, Triangulation, TriangulationError};
pub use volume::{
    make_swept_volume, polygon_profile, rectangle_profile, CrossSection, Volume,
};
