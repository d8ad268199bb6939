use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};

use crate::choice_param;
use crate::config::GeneratorConfig;
use crate::data::SlotData;
use crate::graph::{PinDefinition, PinType};
use crate::math::{section_frame, section_projection};
use crate::mesh::{MaterialRef, Mesh, SubMesh};
use crate::module::{
    Configurable, Module, ModuleError, ModuleInfo, Previewable, RefreshContext, Refreshable,
};
use crate::params::{NodeParams, ParamError, ParamRegistry, ParamValue};
use crate::triangulate::triangulate;
use crate::volume::{CrossSection, Volume};

/// Squared distance below which consecutive projected ring points merge.
pub const DEDUP_EPSILON: f32 = 1e-3;

pub const NODE_NAME: &str = "Volume Caps";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YesNoAuto {
    No,
    Yes,
    #[default]
    Auto,
}

choice_param!(YesNoAuto, "one of yes, no, auto", {
    YesNoAuto::No => "no",
    YesNoAuto::Yes => "yes",
    YesNoAuto::Auto => "auto",
});

impl YesNoAuto {
    pub fn resolve(self, seamless: bool) -> bool {
        match self {
            YesNoAuto::No => false,
            YesNoAuto::Yes => true,
            YesNoAuto::Auto => !seamless,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepAspect {
    #[default]
    Off,
    ScaleU,
    ScaleV,
}

choice_param!(KeepAspect, "one of off, scale_u, scale_v", {
    KeepAspect::Off => "off",
    KeepAspect::ScaleU => "scale_u",
    KeepAspect::ScaleV => "scale_v",
});

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialSettings {
    pub uv_scale: [f32; 2],
    pub uv_offset: [f32; 2],
    /// Degrees, counter-clockwise about the centre of the scaled UV box.
    pub uv_rotation: f32,
    pub keep_aspect: KeepAspect,
    pub swap_uv: bool,
}

impl Default for MaterialSettings {
    fn default() -> Self {
        Self {
            uv_scale: [1.0, 1.0],
            uv_offset: [0.0, 0.0],
            uv_rotation: 0.0,
            keep_aspect: KeepAspect::Off,
            swap_uv: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapSettings {
    pub start_cap: YesNoAuto,
    pub end_cap: YesNoAuto,
    pub reverse_tri_order: bool,
    pub generate_uv: bool,
    pub start_material: MaterialRef,
    pub end_material: MaterialRef,
    pub start_settings: MaterialSettings,
    pub end_settings: MaterialSettings,
    pub clone_start_cap: bool,
}

impl CapSettings {
    pub fn with_material(material: MaterialRef) -> Self {
        Self {
            start_cap: YesNoAuto::Auto,
            end_cap: YesNoAuto::Auto,
            reverse_tri_order: false,
            generate_uv: true,
            start_material: material.clone(),
            end_material: material,
            start_settings: MaterialSettings::default(),
            end_settings: MaterialSettings::default(),
            clone_start_cap: false,
        }
    }

    fn end_material(&self) -> &MaterialRef {
        if self.clone_start_cap {
            &self.start_material
        } else {
            &self.end_material
        }
    }

    fn end_uv_settings(&self) -> &MaterialSettings {
        if self.clone_start_cap {
            &self.start_settings
        } else {
            &self.end_settings
        }
    }
}

impl Default for CapSettings {
    fn default() -> Self {
        Self::with_material(MaterialRef::default())
    }
}

fn cap_registry() -> ParamRegistry<CapSettings> {
    let r = ParamRegistry::<CapSettings>::new();
    let r = crate::bind_param!(r, "start_cap", start_cap);
    let r = crate::bind_param!(r, "end_cap", end_cap);
    let r = crate::bind_param!(r, "reverse_tri_order", reverse_tri_order);
    let r = crate::bind_param!(r, "generate_uv", generate_uv);
    let r = crate::bind_param!(r, "start_material", start_material);
    let r = crate::bind_param!(r, "end_material", end_material);
    let r = crate::bind_param!(r, "start_uv_scale", start_settings.uv_scale);
    let r = crate::bind_param!(r, "start_uv_offset", start_settings.uv_offset);
    let r = crate::bind_param!(r, "start_uv_rotation", start_settings.uv_rotation);
    let r = crate::bind_param!(r, "start_keep_aspect", start_settings.keep_aspect);
    let r = crate::bind_param!(r, "start_swap_uv", start_settings.swap_uv);
    let r = crate::bind_param!(r, "end_uv_scale", end_settings.uv_scale);
    let r = crate::bind_param!(r, "end_uv_offset", end_settings.uv_offset);
    let r = crate::bind_param!(r, "end_uv_rotation", end_settings.uv_rotation);
    let r = crate::bind_param!(r, "end_keep_aspect", end_settings.keep_aspect);
    let r = crate::bind_param!(r, "end_swap_uv", end_settings.swap_uv);
    crate::bind_param!(r, "clone_start_cap", clone_start_cap)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapEnd {
    Start,
    End,
}

impl CapEnd {
    fn label(self) -> &'static str {
        match self {
            CapEnd::Start => "start",
            CapEnd::End => "end",
        }
    }

    fn section(self, volume: &Volume) -> Option<&CrossSection> {
        match self {
            CapEnd::Start => volume.first(),
            CapEnd::End => volume.last(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapPatch {
    pub positions: Vec<[f32; 3]>,
    pub local: Vec<Vec2>,
    pub indices: Vec<u32>,
    pub bounds_min: Vec2,
    pub bounds_max: Vec2,
}

impl CapPatch {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Projects a ring into the section plane and drops near-duplicate points:
/// any point within [`DEDUP_EPSILON`] (squared) of the previously kept point,
/// and any exact repeat of a kept point.
pub fn project_ring(vertices: &[[f32; 3]], projection: Mat4) -> Vec<Vec2> {
    let mut kept: Vec<Vec2> = Vec::with_capacity(vertices.len());
    for vertex in vertices {
        let point = projection.transform_point3(Vec3::from(*vertex)).truncate();
        if kept
            .last()
            .is_some_and(|last| last.distance_squared(point) < DEDUP_EPSILON)
        {
            continue;
        }
        if kept.contains(&point) {
            continue;
        }
        kept.push(point);
    }
    kept
}

/// Triangulates one end of `volume`, cutting `holes` out of it. Each hole is
/// flattened in its own section plane and lifted back through the outer one.
pub fn build_cap(
    volume: &Volume,
    holes: &[Arc<Volume>],
    end: CapEnd,
    reverse_tri_order: bool,
) -> Result<CapPatch, ModuleError> {
    let section = end
        .section(volume)
        .ok_or_else(|| ModuleError::Degenerate("volume has no cross-sections".to_string()))?;
    let (position, tangent, normal) = (section.position(), section.tangent(), section.normal());
    let projection = section_projection(position, tangent, normal);

    let outer = project_ring(&section.vertices, projection);
    if outer.len() < 3 {
        return Err(ModuleError::Degenerate(
            "cross-section has fewer than 3 vertices".to_string(),
        ));
    }

    let mut hole_rings = Vec::with_capacity(holes.len());
    for hole in holes {
        let ring = match end.section(hole) {
            Some(hole_section) => project_ring(
                &hole_section.vertices,
                section_projection(
                    hole_section.position(),
                    hole_section.tangent(),
                    hole_section.normal(),
                ),
            ),
            None => Vec::new(),
        };
        if ring.len() < 3 {
            return Err(ModuleError::Degenerate(
                "hole cross-section has fewer than 3 vertices".to_string(),
            ));
        }
        hole_rings.push(ring);
    }

    let triangulation = triangulate(&outer, &hole_rings)?;

    // Triangles come back counter-clockwise in the section plane, facing along
    // the tangent. The start cap faces backwards, so it flips by default.
    let flip = match end {
        CapEnd::Start => !reverse_tri_order,
        CapEnd::End => reverse_tri_order,
    };
    let frame = section_frame(position, tangent, normal);
    let positions = triangulation
        .vertices
        .iter()
        .map(|v| frame.transform_point3(v.extend(0.0)).to_array())
        .collect();

    let (bounds_min, bounds_max) = outer.iter().fold(
        (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
        |(min, max), p| (min.min(*p), max.max(*p)),
    );

    Ok(CapPatch {
        positions,
        indices: triangulation.indices(flip),
        local: triangulation.vertices,
        bounds_min,
        bounds_max,
    })
}

fn safe_div(a: f32, b: f32) -> f32 {
    if b.abs() <= f32::EPSILON {
        0.0
    } else {
        a / b
    }
}

pub fn apply_uv(points: &[Vec2], min: Vec2, max: Vec2, settings: &MaterialSettings) -> Vec<[f32; 2]> {
    let size = max - min;
    let [sx, sy] = settings.uv_scale;
    let (mut fx, mut fy) = (sx, sy);
    match settings.keep_aspect {
        KeepAspect::Off => {}
        KeepAspect::ScaleU => fx *= safe_div(size.x * sx, size.y * sy),
        KeepAspect::ScaleV => fy *= safe_div(size.y * sy, size.x * sx),
    }

    let (sin, cos) = settings.uv_rotation.to_radians().sin_cos();
    let center = Vec2::new(fx * 0.5, fy * 0.5);
    let offset = Vec2::from(settings.uv_offset);

    points
        .iter()
        .map(|p| {
            let mut uv = Vec2::new(
                safe_div(p.x - min.x, size.x) * fx,
                safe_div(p.y - min.y, size.y) * fy,
            );
            if settings.uv_rotation != 0.0 {
                let o = uv - center;
                uv = Vec2::new(cos * o.x - sin * o.y, sin * o.x + cos * o.y) + center;
            }
            uv += offset;
            if settings.swap_uv {
                [uv.y, uv.x]
            } else {
                [uv.x, uv.y]
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapBuild {
    pub mesh: Mesh,
    pub skipped: Vec<(CapEnd, ModuleError)>,
}

pub struct VolumeCaps {
    settings: CapSettings,
    registry: ParamRegistry<CapSettings>,
    summary: Option<(usize, usize, usize)>,
}

impl VolumeCaps {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            settings: CapSettings::with_material(config.default_material.clone()),
            registry: cap_registry(),
            summary: None,
        }
    }

    pub fn settings(&self) -> &CapSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut CapSettings {
        &mut self.settings
    }

    pub fn info() -> ModuleInfo {
        ModuleInfo {
            kind: NODE_NAME,
            category: "Mesh",
            inputs: vec![
                PinDefinition::new("volume", PinType::Volume),
                PinDefinition::new("holes", PinType::Volume).array().optional(),
            ],
            outputs: vec![PinDefinition::new("mesh", PinType::Mesh)],
        }
    }

    /// Builds the cap mesh for `volume`. `Ok(None)` means no end was
    /// requested. Ends that fail are skipped and listed in the result; if
    /// every requested end fails the first error is returned.
    pub fn build(&self, volume: &Volume, holes: &[Arc<Volume>]) -> Result<Option<CapBuild>, ModuleError> {
        let settings = &self.settings;
        let ends: Vec<CapEnd> = [
            (CapEnd::Start, settings.start_cap),
            (CapEnd::End, settings.end_cap),
        ]
        .into_iter()
        .filter(|(_, mode)| mode.resolve(volume.seamless))
        .map(|(end, _)| end)
        .collect();
        if ends.is_empty() {
            return Ok(None);
        }

        let mut patches = Vec::with_capacity(2);
        let mut failures = Vec::new();
        for end in ends {
            match build_cap(volume, holes, end, settings.reverse_tri_order) {
                Ok(patch) => patches.push((end, patch)),
                Err(err) => failures.push((end, err)),
            }
        }
        if patches.is_empty() {
            return match failures.into_iter().next() {
                Some((_, err)) => Err(err),
                None => Ok(None),
            };
        }

        let mut mesh = Mesh::new();
        let mut uvs = Vec::new();
        for (end, patch) in patches {
            let offset = mesh.positions.len() as u32;
            let (material, uv_settings) = match end {
                CapEnd::Start => (&settings.start_material, &settings.start_settings),
                CapEnd::End => (settings.end_material(), settings.end_uv_settings()),
            };
            if settings.generate_uv {
                uvs.extend(apply_uv(&patch.local, patch.bounds_min, patch.bounds_max, uv_settings));
            }
            mesh.positions.extend_from_slice(&patch.positions);
            let indices = patch.indices.iter().map(|i| i + offset);
            match mesh
                .submeshes
                .iter_mut()
                .find(|submesh| &submesh.material == material)
            {
                Some(submesh) => submesh.indices.extend(indices),
                None => mesh
                    .submeshes
                    .push(SubMesh::new(indices.collect(), material.clone())),
            }
        }
        if settings.generate_uv {
            mesh.uvs = Some(uvs);
        }
        Ok(Some(CapBuild {
            mesh,
            skipped: failures,
        }))
    }
}

impl Configurable for VolumeCaps {
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

impl Refreshable for VolumeCaps {
    fn refresh(&mut self, ctx: &mut RefreshContext<'_>) -> Result<(), ModuleError> {
        self.summary = None;
        let volume = match ctx.get_data(0) {
            SlotData::Volume(volume) => volume,
            _ => return Err(ModuleError::MissingInput("volume")),
        };
        if volume.is_empty() {
            return Err(ModuleError::Degenerate(
                "volume has no cross-sections".to_string(),
            ));
        }
        let holes: Vec<Arc<Volume>> = ctx
            .get_all_data(1)
            .iter()
            .filter_map(|data| data.as_volume().cloned())
            .collect();

        match self.build(&volume, &holes)? {
            None => ctx.set_output(0, SlotData::Empty),
            Some(CapBuild { mesh, skipped }) => {
                for (end, err) in skipped {
                    ctx.report(err.severity(), format!("{} cap skipped: {err}", end.label()));
                }
                self.summary = Some((
                    mesh.submeshes.len(),
                    mesh.vertex_count(),
                    mesh.triangle_count(),
                ));
                ctx.set_output(0, SlotData::from(mesh));
            }
        }
        Ok(())
    }
}

impl Previewable for VolumeCaps {
    fn preview(&self) -> String {
        match self.summary {
            Some((submeshes, vertices, triangles)) => {
                format!("{submeshes} submeshes, {vertices} vertices, {triangles} triangles")
            }
            None => "no caps".to_string(),
        }
    }
}

impl Module for VolumeCaps {
    fn info(&self) -> ModuleInfo {
        VolumeCaps::info()
    }
}
