use glam::{Mat4, Vec3};

use crate::caps::VolumeCaps;
use crate::choice_param;
use crate::config::GeneratorConfig;
use crate::data::SlotData;
use crate::graph::{NodeDefinition, PinDefinition, PinType};
use crate::mesh::Mesh;
use crate::module::{
    Configurable, Module, ModuleError, ModuleInfo, Previewable, RefreshContext, Refreshable,
};
use crate::params::{NodeParams, ParamError, ParamRegistry, ParamValue};
use crate::volume::{make_swept_volume, polygon_profile, rectangle_profile, Volume};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinNodeKind {
    ShapeVolume,
    VolumeCaps,
    MergeMeshes,
}

impl BuiltinNodeKind {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinNodeKind::ShapeVolume => "Shape Volume",
            BuiltinNodeKind::VolumeCaps => crate::caps::NODE_NAME,
            BuiltinNodeKind::MergeMeshes => "Merge Meshes",
        }
    }
}

pub fn builtin_kind_from_name(name: &str) -> Option<BuiltinNodeKind> {
    match name {
        "Shape Volume" => Some(BuiltinNodeKind::ShapeVolume),
        "Volume Caps" => Some(BuiltinNodeKind::VolumeCaps),
        "Merge Meshes" => Some(BuiltinNodeKind::MergeMeshes),
        _ => None,
    }
}

pub fn builtin_definitions() -> Vec<NodeDefinition> {
    vec![
        node_definition(BuiltinNodeKind::ShapeVolume),
        node_definition(BuiltinNodeKind::VolumeCaps),
        node_definition(BuiltinNodeKind::MergeMeshes),
    ]
}

pub fn node_definition(kind: BuiltinNodeKind) -> NodeDefinition {
    let info = match kind {
        BuiltinNodeKind::ShapeVolume => ShapeVolume::info(),
        BuiltinNodeKind::VolumeCaps => VolumeCaps::info(),
        BuiltinNodeKind::MergeMeshes => MergeMeshes::info(),
    };
    info.definition()
}

pub fn create_module(kind: BuiltinNodeKind, config: &GeneratorConfig) -> Box<dyn Module> {
    match kind {
        BuiltinNodeKind::ShapeVolume => Box::new(ShapeVolume::new()),
        BuiltinNodeKind::VolumeCaps => Box::new(VolumeCaps::new(config)),
        BuiltinNodeKind::MergeMeshes => Box::new(MergeMeshes::new()),
    }
}

pub fn default_params(kind: BuiltinNodeKind, config: &GeneratorConfig) -> NodeParams {
    create_module(kind, config).params()
}

pub const MAX_SIDES: i32 = 1024;
pub const MAX_SECTIONS: i32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Polygon,
}

choice_param!(ShapeKind, "one of rectangle, polygon", {
    ShapeKind::Rectangle => "rectangle",
    ShapeKind::Polygon => "polygon",
});

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeSettings {
    pub shape: ShapeKind,
    /// Rectangle extents; polygons use `size[0]` as diameter.
    pub size: [f32; 2],
    pub sides: i32,
    pub length: f32,
    pub sections: i32,
    pub seamless: bool,
    pub offset: [f32; 3],
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self {
            shape: ShapeKind::Rectangle,
            size: [1.0, 1.0],
            sides: 6,
            length: 1.0,
            sections: 2,
            seamless: false,
            offset: [0.0, 0.0, 0.0],
        }
    }
}

pub struct ShapeVolume {
    settings: ShapeSettings,
    registry: ParamRegistry<ShapeSettings>,
    sections: usize,
}

impl ShapeVolume {
    pub fn new() -> Self {
        let r = ParamRegistry::<ShapeSettings>::new();
        let r = crate::bind_param!(r, "shape", shape);
        let r = crate::bind_param!(r, "size", size);
        let r = crate::bind_param!(r, "sides", sides);
        let r = crate::bind_param!(r, "length", length);
        let r = crate::bind_param!(r, "sections", sections);
        let r = crate::bind_param!(r, "seamless", seamless);
        let registry = crate::bind_param!(r, "offset", offset);
        Self {
            settings: ShapeSettings::default(),
            registry,
            sections: 0,
        }
    }

    pub fn info() -> ModuleInfo {
        ModuleInfo {
            kind: BuiltinNodeKind::ShapeVolume.name(),
            category: "Sources",
            inputs: Vec::new(),
            outputs: vec![PinDefinition::new("volume", PinType::Volume)],
        }
    }

    pub fn build(&self) -> Result<Volume, ModuleError> {
        let settings = &self.settings;
        let profile = match settings.shape {
            ShapeKind::Rectangle => rectangle_profile(settings.size),
            ShapeKind::Polygon => {
                if !(3..=MAX_SIDES).contains(&settings.sides) {
                    return Err(ModuleError::Degenerate(format!(
                        "polygon sides must be within 3..={MAX_SIDES}, got {}",
                        settings.sides
                    )));
                }
                polygon_profile(settings.size[0] * 0.5, settings.sides as u32)
            }
        };
        if settings.sections > MAX_SECTIONS {
            return Err(ModuleError::Degenerate(format!(
                "at most {MAX_SECTIONS} sections are supported, got {}",
                settings.sections
            )));
        }
        let sections = settings.sections.max(1) as u32;
        let mut volume = make_swept_volume(&profile, settings.length, sections, settings.seamless);

        let offset = Vec3::from(settings.offset);
        if offset != Vec3::ZERO {
            let matrix = Mat4::from_translation(offset);
            for section in &mut volume.sections {
                section.position = matrix.transform_point3(section.position()).to_array();
                for vertex in &mut section.vertices {
                    *vertex = matrix.transform_point3(Vec3::from(*vertex)).to_array();
                }
            }
        }
        Ok(volume)
    }
}

impl Default for ShapeVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl Configurable for ShapeVolume {
    fn param(&self, name: &str) -> Option<ParamValue> {
        self.registry.get(&self.settings, name)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), ParamError> {
        self.registry.set(&mut self.settings, name, value)
    }

    fn param_names(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    fn params(&self) -> NodeParams {
        self.registry.snapshot(&self.settings)
    }
}

impl Refreshable for ShapeVolume {
    fn refresh(&mut self, ctx: &mut RefreshContext<'_>) -> Result<(), ModuleError> {
        self.sections = 0;
        let volume = self.build()?;
        self.sections = volume.count();
        ctx.set_output(0, SlotData::from(volume));
        Ok(())
    }
}

impl Previewable for ShapeVolume {
    fn preview(&self) -> String {
        format!("{} sections", self.sections)
    }
}

impl Module for ShapeVolume {
    fn info(&self) -> ModuleInfo {
        ShapeVolume::info()
    }
}

#[derive(Default)]
pub struct MergeMeshes {
    merged: usize,
    registry: ParamRegistry<()>,
}

impl MergeMeshes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info() -> ModuleInfo {
        ModuleInfo {
            kind: BuiltinNodeKind::MergeMeshes.name(),
            category: "Operators",
            inputs: vec![PinDefinition::new("meshes", PinType::Mesh).array().optional()],
            outputs: vec![PinDefinition::new("mesh", PinType::Mesh)],
        }
    }
}

impl Configurable for MergeMeshes {
    fn param(&self, name: &str) -> Option<ParamValue> {
        self.registry.get(&(), name)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), ParamError> {
        self.registry.set(&mut (), name, value)
    }

    fn param_names(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    fn params(&self) -> NodeParams {
        self.registry.snapshot(&())
    }
}

impl Refreshable for MergeMeshes {
    fn refresh(&mut self, ctx: &mut RefreshContext<'_>) -> Result<(), ModuleError> {
        let inputs = ctx.get_all_data(0);
        let mut merged = Mesh::new();
        self.merged = 0;
        for mesh in inputs.iter().filter_map(SlotData::as_mesh) {
            merged.append(mesh);
            self.merged += 1;
        }
        let output = if self.merged == 0 {
            SlotData::Empty
        } else {
            SlotData::from(merged)
        };
        ctx.set_output(0, output);
        Ok(())
    }
}

impl Previewable for MergeMeshes {
    fn preview(&self) -> String {
        format!("{} meshes merged", self.merged)
    }
}

impl Module for MergeMeshes {
    fn info(&self) -> ModuleInfo {
        MergeMeshes::info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticSink;
    use crate::graph::NodeId;
    use crate::mesh::MaterialRef;
    use crate::module::InputData;

    #[test]
    fn names_round_trip() {
        for definition in builtin_definitions() {
            let kind = builtin_kind_from_name(&definition.name).expect("known kind");
            assert_eq!(kind.name(), definition.name);
        }
        assert!(builtin_kind_from_name("Output").is_none());
    }

    #[test]
    fn shape_volume_applies_offset() {
        let mut shape = ShapeVolume::new();
        shape
            .set_param("offset", &ParamValue::Vec3([0.0, 0.0, 5.0]))
            .expect("set");
        shape
            .set_param("length", &ParamValue::Float(2.0))
            .expect("set");
        let volume = shape.build().expect("volume");
        assert_eq!(volume.first().expect("first").position, [0.0, 0.0, 5.0]);
        assert_eq!(volume.last().expect("last").position, [0.0, 0.0, 7.0]);
    }

    #[test]
    fn polygon_with_too_few_sides_fails() {
        let mut shape = ShapeVolume::new();
        shape
            .set_param("shape", &ParamValue::Text("polygon".to_string()))
            .expect("set");
        shape.set_param("sides", &ParamValue::Int(2)).expect("set");
        assert!(matches!(shape.build(), Err(ModuleError::Degenerate(_))));
    }

    #[test]
    fn oversized_shapes_are_refused() {
        let mut shape = ShapeVolume::new();
        shape
            .set_param("shape", &ParamValue::Text("polygon".to_string()))
            .expect("set");
        shape
            .set_param("sides", &ParamValue::Int(2_000_000_000))
            .expect("set");
        assert!(matches!(shape.build(), Err(ModuleError::Degenerate(_))));

        shape
            .set_param("sides", &ParamValue::Int(MAX_SIDES))
            .expect("set");
        assert_eq!(
            shape.build().expect("volume").first().expect("first").vertices.len(),
            MAX_SIDES as usize
        );

        shape
            .set_param("sections", &ParamValue::Int(MAX_SECTIONS + 1))
            .expect("set");
        assert!(matches!(shape.build(), Err(ModuleError::Degenerate(_))));
    }

    #[test]
    fn default_params_follow_config() {
        let config = GeneratorConfig {
            default_material: MaterialRef::new("brick"),
        };
        let params = default_params(BuiltinNodeKind::VolumeCaps, &config);
        assert_eq!(
            params.values.get("start_material"),
            Some(&ParamValue::Text("brick".to_string()))
        );
        assert!(default_params(BuiltinNodeKind::MergeMeshes, &config)
            .values
            .is_empty());
    }

    #[test]
    fn merge_skips_empty_inputs() {
        let triangle = Mesh::with_submesh(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2],
            MaterialRef::default(),
        );
        let mut merge = MergeMeshes::new();
        let mut outputs = vec![SlotData::Empty];
        let mut sink = DiagnosticSink::new();
        {
            let mut ctx = RefreshContext::new(
                NodeId(1),
                vec![InputData::Array(vec![
                    SlotData::from(triangle.clone()),
                    SlotData::Empty,
                    SlotData::from(triangle),
                ])],
                &mut outputs,
                &mut sink,
            );
            merge.refresh(&mut ctx).expect("merge");
        }
        assert_eq!(outputs[0].as_mesh().expect("mesh").triangle_count(), 2);
        assert_eq!(merge.preview(), "2 meshes merged");

        let mut outputs = vec![SlotData::Empty];
        {
            let mut ctx = RefreshContext::new(
                NodeId(1),
                vec![InputData::Array(vec![SlotData::Empty])],
                &mut outputs,
                &mut sink,
            );
            merge.refresh(&mut ctx).expect("merge");
        }
        assert!(outputs[0].is_empty());
    }
}
