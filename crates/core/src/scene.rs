use crate::mesh::{MaterialRef, Mesh};

/// One draw batch: a submesh with its own compacted vertex arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
    pub material: MaterialRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneSnapshot {
    pub meshes: Vec<SceneMesh>,
    pub base_color: [f32; 3],
}

impl SceneMesh {
    pub fn from_submesh(mesh: &Mesh, normals: &[[f32; 3]], submesh: usize) -> Option<Self> {
        let submesh = mesh.submeshes.get(submesh)?;
        let mut remap: Vec<Option<u32>> = vec![None; mesh.positions.len()];
        let mut scene = SceneMesh {
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: mesh.uvs.as_ref().map(|_| Vec::new()),
            indices: Vec::with_capacity(submesh.indices.len()),
            material: submesh.material.clone(),
        };

        for index in &submesh.indices {
            let source = *index as usize;
            let slot = remap.get_mut(source)?;
            let target = match *slot {
                Some(target) => target,
                None => {
                    let target = scene.positions.len() as u32;
                    scene.positions.push(mesh.positions[source]);
                    scene
                        .normals
                        .push(normals.get(source).copied().unwrap_or([0.0, 1.0, 0.0]));
                    if let (Some(out), Some(uvs)) = (scene.uvs.as_mut(), mesh.uvs.as_ref()) {
                        out.push(uvs.get(source).copied().unwrap_or([0.0, 0.0]));
                    }
                    *slot = Some(target);
                    target
                }
            };
            scene.indices.push(target);
        }
        Some(scene)
    }
}

impl SceneSnapshot {
    pub fn from_mesh(mesh: &Mesh, base_color: [f32; 3]) -> Self {
        let normals = mesh
            .compute_normals()
            .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; mesh.positions.len()]);
        let meshes = (0..mesh.submeshes.len())
            .filter_map(|index| SceneMesh::from_submesh(mesh, &normals, index))
            .collect();
        Self { meshes, base_color }
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.indices.len() / 3).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::SubMesh;

    #[test]
    fn splits_submeshes_into_batches() {
        let mesh = Mesh {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 1.0],
                [0.0, 1.0, 1.0],
            ],
            uvs: Some(vec![[0.5, 0.5]; 6]),
            submeshes: vec![
                SubMesh::new(vec![0, 1, 2], MaterialRef::new("a")),
                SubMesh::new(vec![3, 4, 5], MaterialRef::new("b")),
            ],
        };
        let scene = SceneSnapshot::from_mesh(&mesh, [0.7, 0.72, 0.75]);
        assert_eq!(scene.meshes.len(), 2);
        assert_eq!(scene.meshes[1].indices, vec![0, 1, 2]);
        assert_eq!(scene.meshes[1].positions[0], [0.0, 0.0, 1.0]);
        assert_eq!(scene.meshes[1].material, MaterialRef::new("b"));
        assert_eq!(scene.meshes[0].uvs.as_ref().map(Vec::len), Some(3));
        assert_eq!(scene.triangle_count(), 2);
    }
}
