use std::fmt;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialRef(pub String);

impl MaterialRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MaterialRef {
    fn default() -> Self {
        Self("default".to_string())
    }
}

impl fmt::Display for MaterialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubMesh {
    pub indices: Vec<u32>,
    pub material: MaterialRef,
}

impl SubMesh {
    pub fn new(indices: Vec<u32>, material: MaterialRef) -> Self {
        Self { indices, material }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uvs: Option<Vec<[f32; 2]>>,
    pub submeshes: Vec<SubMesh>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submesh(positions: Vec<[f32; 3]>, indices: Vec<u32>, material: MaterialRef) -> Self {
        Self {
            positions,
            uvs: None,
            submeshes: vec![SubMesh::new(indices, material)],
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(SubMesh::triangle_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.triangle_count() == 0
    }

    pub fn bounds(&self) -> Option<Aabb> {
        let mut iter = self.positions.iter();
        let first = iter.next()?;
        let mut min = *first;
        let mut max = *first;

        for p in iter {
            min[0] = min[0].min(p[0]);
            min[1] = min[1].min(p[1]);
            min[2] = min[2].min(p[2]);
            max[0] = max[0].max(p[0]);
            max[1] = max[1].max(p[1]);
            max[2] = max[2].max(p[2]);
        }

        Some(Aabb { min, max })
    }

    /// Area-weighted vertex normals over all submeshes. `None` if any index is
    /// out of range or the triangle lists are malformed.
    pub fn compute_normals(&self) -> Option<Vec<[f32; 3]>> {
        if self.positions.is_empty() {
            return None;
        }

        let mut accum = vec![Vec3::ZERO; self.positions.len()];
        for submesh in &self.submeshes {
            if submesh.indices.len() % 3 != 0 {
                return None;
            }
            for tri in submesh.indices.chunks_exact(3) {
                let i0 = tri[0] as usize;
                let i1 = tri[1] as usize;
                let i2 = tri[2] as usize;
                if i0 >= self.positions.len()
                    || i1 >= self.positions.len()
                    || i2 >= self.positions.len()
                {
                    return None;
                }

                let p0 = Vec3::from(self.positions[i0]);
                let p1 = Vec3::from(self.positions[i1]);
                let p2 = Vec3::from(self.positions[i2]);
                let normal = (p1 - p0).cross(p2 - p0);
                accum[i0] += normal;
                accum[i1] += normal;
                accum[i2] += normal;
            }
        }

        Some(
            accum
                .into_iter()
                .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
                .collect(),
        )
    }

    pub fn transform(&mut self, matrix: Mat4) {
        for p in &mut self.positions {
            *p = matrix.transform_point3(Vec3::from(*p)).to_array();
        }
    }

    /// Appends `other`, offsetting its indices by the current vertex count.
    /// Submeshes sharing a material are folded into one.
    pub fn append(&mut self, other: &Mesh) {
        let offset = self.positions.len() as u32;
        let had_vertices = !self.positions.is_empty();

        self.uvs = match (self.uvs.take(), &other.uvs) {
            (Some(mut uvs), Some(more)) => {
                uvs.extend_from_slice(more);
                Some(uvs)
            }
            (None, Some(more)) if !had_vertices => Some(more.clone()),
            _ => None,
        };
        self.positions.extend_from_slice(&other.positions);

        for submesh in &other.submeshes {
            let shifted = submesh.indices.iter().map(|i| i + offset);
            match self
                .submeshes
                .iter_mut()
                .find(|existing| existing.material == submesh.material)
            {
                Some(existing) => existing.indices.extend(shifted),
                None => self
                    .submeshes
                    .push(SubMesh::new(shifted.collect(), submesh.material.clone())),
            }
        }
    }

    pub fn merge(meshes: &[Mesh]) -> Mesh {
        let mut merged = Mesh::default();
        for mesh in meshes {
            merged.append(mesh);
        }
        merged
    }
}
