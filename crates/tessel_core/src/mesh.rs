//! Triangle mesh extraction from document primitives.
//!
//! [`MeshData`] is a self-contained copy of one primitive's geometry:
//! decoded positions, optional normals and UVs, and a flat triangle list.
//! It owns its data and no longer borrows from the document.

use tessel_math::{Aabb, Vec2, Vec3};

use crate::document::{Document, Semantic};
use crate::error::{GltfError, GltfResult};

/// Decoded triangle geometry of one primitive.
#[derive(Clone, Debug)]
pub struct MeshData {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals, when the primitive carries a `NORMAL` attribute
    pub normals: Option<Vec<Vec3>>,

    /// First UV set (`TEXCOORD_0`)
    pub uvs: Option<Vec<Vec2>>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box of the positions
    pub bounds: Aabb,

    /// Material index, if the primitive names one
    pub material: Option<usize>,
}

impl MeshData {
    /// Extract primitive `primitive` of mesh `mesh`.
    ///
    /// Strips and fans are expanded into a plain triangle list. Fails if the
    /// primitive has no `POSITION` attribute, if any attribute accessor is
    /// malformed, or if an index references a vertex past the position count.
    pub fn from_primitive(doc: &Document, mesh: usize, primitive: usize) -> GltfResult<Self> {
        let path = format!("meshes[{}].primitives[{}]", mesh, primitive);

        let primitives = doc.mesh_primitives(mesh).ok_or_else(|| {
            GltfError::range(
                format!("meshes[{}]", mesh),
                format!("mesh {} of {}", mesh, doc.mesh_count()),
            )
        })?;
        let prim = primitives.get(primitive).ok_or_else(|| {
            GltfError::range(
                path.clone(),
                format!("primitive {} of {}", primitive, primitives.len()),
            )
        })?;

        let position = doc
            .find_attribute(prim, Semantic::Position, 0)
            .ok_or_else(|| {
                GltfError::parse(format!("{}.attributes", path), "missing POSITION attribute")
            })?;
        let view = doc.accessor_view(position)?;
        let positions = (0..view.count())
            .map(|i| view.read_vec3(i))
            .collect::<GltfResult<Vec<_>>>()?;

        let normals = match doc.find_attribute(prim, Semantic::Normal, 0) {
            Some(accessor) => {
                let view = doc.accessor_view(accessor)?;
                let normals = (0..view.count())
                    .map(|i| view.read_vec3(i))
                    .collect::<GltfResult<Vec<_>>>()?;
                Some(normals)
            }
            None => None,
        };

        let uvs = match doc.find_attribute(prim, Semantic::TexCoord, 0) {
            Some(accessor) => {
                let view = doc.accessor_view(accessor)?;
                let uvs = (0..view.count())
                    .map(|i| view.read_vec2(i))
                    .collect::<GltfResult<Vec<_>>>()?;
                Some(uvs)
            }
            None => None,
        };

        let indices = doc.primitive_triangles(prim)?;
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(GltfError::range(
                format!("{}.indices", path),
                format!("vertex {} of {}", bad, positions.len()),
            ));
        }

        let bounds = compute_bounds(&positions);
        log::debug!(
            "Extracted {}: {} vertices, {} triangles",
            path,
            positions.len(),
            indices.len() / 3
        );

        Ok(Self {
            positions,
            normals,
            uvs,
            indices,
            bounds,
            material: prim.material,
        })
    }

    /// Compute smooth vertex normals from area-weighted face normals.
    ///
    /// Faces are counter-clockwise; the unnormalized cross product weights
    /// each face by its area.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for face in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [face[0] as usize, face[1] as usize, face[2] as usize];
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = self.positions[i0];
            let face_normal = (self.positions[i1] - p0).cross(self.positions[i2] - p0);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }

        self.normals = Some(normals);
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }

    /// Ensure the mesh has one normal per vertex, computing them if needed.
    pub fn ensure_normals(&mut self) {
        let should_compute = match &self.normals {
            None => true,
            Some(normals) => {
                if normals.len() != self.positions.len() {
                    log::warn!(
                        "Normal count ({}) doesn't match vertex count ({}), recomputing",
                        normals.len(),
                        self.positions.len()
                    );
                    true
                } else {
                    false
                }
            }
        };

        if should_compute {
            self.compute_normals();
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

fn compute_bounds(positions: &[Vec3]) -> Aabb {
    let mut bounds = Aabb::EMPTY;
    for &p in positions {
        bounds.grow(p);
    }
    bounds
}
