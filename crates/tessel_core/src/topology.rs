//! Triangle enumeration for indexed and non-indexed primitives.
//!
//! The iterator is driven by an element count and a fetch function mapping
//! a position in the index stream to a vertex index, so the same code serves
//! index accessors and the implicit `0..n` stream of non-indexed draws.

use crate::document::{Document, Primitive, PrimitiveMode, Semantic};
use crate::error::{GltfError, GltfResult};

/// Callback verdict: keep going or end iteration early.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Number of triangles `mode` produces from `n` indices.
pub fn triangle_count(mode: PrimitiveMode, n: usize) -> GltfResult<usize> {
    match mode {
        PrimitiveMode::Triangles => {
            if n % 3 != 0 {
                return Err(GltfError::parse(
                    "primitive.indices",
                    format!("{} indices is not a multiple of 3", n),
                ));
            }
            Ok(n / 3)
        }
        PrimitiveMode::TriangleStrip | PrimitiveMode::TriangleFan => Ok(n.saturating_sub(2)),
        other => Err(GltfError::unsupported(
            "primitive.mode",
            format!("{:?} does not produce triangles", other),
        )),
    }
}

/// Index-stream positions making up triangle `t`.
fn corners(mode: PrimitiveMode, t: usize) -> [usize; 3] {
    match mode {
        PrimitiveMode::TriangleStrip if t % 2 == 1 => [t + 1, t, t + 2],
        PrimitiveMode::TriangleStrip => [t, t + 1, t + 2],
        PrimitiveMode::TriangleFan => [0, t + 1, t + 2],
        _ => [3 * t, 3 * t + 1, 3 * t + 2],
    }
}

/// Enumerate the triangles of `n` indices under `mode`.
///
/// Each triangle's corners are resolved through `fetch` and handed to
/// `callback` with a zero-based sequence number. Returns the number of
/// triangles delivered. A `Flow::Stop` ends iteration without error; a
/// fetch error ends it with that error, after any triangles already
/// delivered.
pub fn for_each_triangle<F, C>(
    mode: PrimitiveMode,
    n: usize,
    mut fetch: F,
    mut callback: C,
) -> GltfResult<usize>
where
    F: FnMut(usize) -> GltfResult<u32>,
    C: FnMut(usize, [u32; 3]) -> Flow,
{
    let count = triangle_count(mode, n)?;

    for t in 0..count {
        let [a, b, c] = corners(mode, t);
        let triangle = [fetch(a)?, fetch(b)?, fetch(c)?];
        if callback(t, triangle) == Flow::Stop {
            return Ok(t + 1);
        }
    }

    Ok(count)
}

impl Document {
    /// Enumerate the triangles of a primitive.
    ///
    /// Indexed primitives read their index accessor; non-indexed primitives
    /// draw `0..count` of their `POSITION` accessor.
    pub fn for_each_primitive_triangle<C>(
        &self,
        primitive: &Primitive,
        callback: C,
    ) -> GltfResult<usize>
    where
        C: FnMut(usize, [u32; 3]) -> Flow,
    {
        match primitive.indices {
            Some(indices) => {
                let view = self.accessor_view(indices)?;
                for_each_triangle(primitive.mode, view.count(), |i| view.read_index(i), callback)
            }
            None => {
                let n = self.primitive_vertex_count(primitive)?;
                for_each_triangle(primitive.mode, n, identity_index, callback)
            }
        }
    }

    /// Collect a primitive's triangles as a flat index list.
    pub fn primitive_triangles(&self, primitive: &Primitive) -> GltfResult<Vec<u32>> {
        let mut out = Vec::new();
        self.for_each_primitive_triangle(primitive, |_, tri| {
            out.extend_from_slice(&tri);
            Flow::Continue
        })?;
        Ok(out)
    }

    /// Element count of the primitive's `POSITION` accessor.
    pub fn primitive_vertex_count(&self, primitive: &Primitive) -> GltfResult<usize> {
        let position = self
            .find_attribute(primitive, Semantic::Position, 0)
            .ok_or_else(|| GltfError::parse("primitive.attributes", "missing POSITION attribute"))?;
        self.accessors
            .get(position)
            .map(|a| a.count)
            .ok_or_else(|| {
                GltfError::range(
                    "primitive.attributes.POSITION",
                    format!("accessor {} of {}", position, self.accessors.len()),
                )
            })
    }
}

fn identity_index(i: usize) -> GltfResult<u32> {
    u32::try_from(i).map_err(|_| GltfError::range("primitive", format!("vertex {} exceeds u32", i)))
}
