//! World-transform evaluation for a scene's node graph.
//!
//! Traversal is an iterative depth-first walk over an explicit stack with a
//! per-node visit state, so deep or cyclic graphs from untrusted input can
//! neither overflow the call stack nor loop forever. A node's world matrix
//! is written on first visit, before its children are pushed, so children
//! always read a finished parent matrix.

use tessel_math::{Aabb, Mat4, Mat4Ext};

use crate::document::{ComponentType, Document, ElementType, Semantic};
use crate::error::{GltfError, GltfResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    /// World matrix written, children still being walked
    Visiting,
    Done,
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    node: usize,
    /// Next child position within the node's child list
    cursor: usize,
}

/// Reusable scratch space holding per-node world matrices for one scene.
///
/// Sized once to a document's node count; recomputing for another scene
/// resets the state in place without reallocating.
#[derive(Clone, Debug)]
pub struct WorldCache {
    state: Vec<VisitState>,
    world: Vec<Mat4>,
    stack: Vec<Frame>,
    valid: bool,
    scene: Option<usize>,
}

impl WorldCache {
    /// Create a cache sized for `doc`.
    pub fn new(doc: &Document) -> Self {
        let nodes = doc.node_count();
        Self {
            state: vec![VisitState::Unvisited; nodes],
            world: vec![Mat4::IDENTITY; nodes],
            stack: Vec::with_capacity(nodes),
            valid: false,
            scene: None,
        }
    }

    /// Scene the cache currently holds, if the last computation succeeded.
    pub fn scene(&self) -> Option<usize> {
        if self.valid { self.scene } else { None }
    }

    fn reset(&mut self) {
        self.state.fill(VisitState::Unvisited);
        self.world.fill(Mat4::IDENTITY);
        self.stack.clear();
        self.valid = false;
        self.scene = None;
    }

    /// Compute world matrices for every node reachable from `scene`'s roots.
    ///
    /// On error (a cycle, a dangling node or scene index) the cache is left
    /// invalid and every query reports "not found" until the next
    /// successful computation.
    pub fn compute(&mut self, doc: &Document, scene: usize) -> GltfResult<()> {
        if self.state.len() != doc.node_count() {
            return Err(GltfError::invalid_argument(
                "world_cache",
                format!(
                    "cache sized for {} nodes, document has {}",
                    self.state.len(),
                    doc.node_count()
                ),
            ));
        }

        self.reset();

        let roots = doc.scene_roots(scene).ok_or_else(|| {
            GltfError::range(
                format!("scenes[{}]", scene),
                format!("scene {} of {}", scene, doc.scene_count()),
            )
        })?;

        for (i, &root) in roots.iter().enumerate() {
            let root = root as usize;
            let path = || format!("scenes[{}].nodes[{}]", scene, i);
            match self.state.get(root) {
                None => {
                    return Err(GltfError::range(
                        path(),
                        format!("node {} of {}", root, doc.node_count()),
                    ))
                }
                Some(VisitState::Done) => continue,
                Some(_) => {}
            }
            self.walk(doc, root, Mat4::IDENTITY)?;
        }

        self.valid = true;
        self.scene = Some(scene);
        log::debug!("Computed world matrices for scene {} ({} roots)", scene, roots.len());
        Ok(())
    }

    /// Depth-first walk from one root.
    fn walk(&mut self, doc: &Document, root: usize, parent: Mat4) -> GltfResult<()> {
        self.enter(doc, root, parent);
        self.stack.push(Frame { node: root, cursor: 0 });

        while let Some(top) = self.stack.last_mut() {
            let node = top.node;
            let children = doc.node_children(node).unwrap_or(&[]);

            let Some(&child) = children.get(top.cursor) else {
                self.state[node] = VisitState::Done;
                self.stack.pop();
                continue;
            };
            let position = top.cursor;
            top.cursor += 1;

            let child = child as usize;
            let path = || format!("nodes[{}].children[{}]", node, position);
            match self.state.get(child) {
                None => {
                    return Err(GltfError::range(
                        path(),
                        format!("node {} of {}", child, doc.node_count()),
                    ))
                }
                Some(VisitState::Visiting) => {
                    return Err(GltfError::parse(
                        path(),
                        format!("cycle: node {} is its own ancestor", child),
                    ))
                }
                // Shared descendant reached through an earlier path
                Some(VisitState::Done) => continue,
                Some(VisitState::Unvisited) => {}
            }

            // Every stacked node is Visiting, so an acyclic walk never holds
            // more frames than there are nodes.
            if self.stack.len() >= self.state.len() {
                return Err(GltfError::parse(path(), "traversal deeper than node count"));
            }

            let parent_world = self.world[node];
            self.enter(doc, child, parent_world);
            self.stack.push(Frame { node: child, cursor: 0 });
        }

        Ok(())
    }

    fn enter(&mut self, doc: &Document, node: usize, parent: Mat4) {
        let local = doc
            .node(node)
            .map(|n| n.transform.local_matrix())
            .unwrap_or(Mat4::IDENTITY);
        self.world[node] = parent * local;
        self.state[node] = VisitState::Visiting;
    }

    /// World matrix of `node` in `scene`.
    ///
    /// `None` unless the cache holds a successful computation for exactly
    /// that scene and the node was reached from it.
    pub fn world_matrix(&self, scene: usize, node: usize) -> Option<Mat4> {
        if !self.valid || self.scene != Some(scene) {
            return None;
        }
        match self.state.get(node) {
            Some(VisitState::Done) => Some(self.world[node]),
            _ => None,
        }
    }

    /// World-space bounds of every mesh instance in the computed scene.
    ///
    /// Returns `Ok(None)` when the cache does not hold `scene`. Primitives
    /// without a `POSITION` attribute, or whose positions are not plain f32
    /// VEC3, are skipped. A dangling mesh index or a malformed position
    /// accessor fails the whole query.
    pub fn world_bounds(&self, doc: &Document, scene: usize) -> GltfResult<Option<Aabb>> {
        if self.scene() != Some(scene) {
            return Ok(None);
        }

        let mut bounds = Aabb::EMPTY;
        for (index, node) in doc.nodes().iter().enumerate() {
            let (Some(mesh), Some(world)) = (node.mesh, self.world_matrix(scene, index)) else {
                continue;
            };
            let primitives = doc.mesh_primitives(mesh).ok_or_else(|| {
                GltfError::range(
                    format!("nodes[{}].mesh", index),
                    format!("mesh {} of {}", mesh, doc.mesh_count()),
                )
            })?;

            for primitive in primitives {
                let Some(accessor) = doc.find_attribute(primitive, Semantic::Position, 0) else {
                    continue;
                };
                let view = doc.accessor_view(accessor)?;
                if view.component_type() != ComponentType::F32
                    || view.element_type() != ElementType::Vec3
                    || view.normalized()
                {
                    log::debug!("Skipping non-f32 positions of accessor {} in bounds", accessor);
                    continue;
                }
                let local = view.bounds()?;
                bounds = Aabb::surrounding(&bounds, &world.transform_aabb(&local));
            }
        }
        Ok(Some(bounds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        Accessor, Attribute, Buffer, BufferView, IndexPool, Mesh, Node, NodeTransform, Primitive,
        Range, Scene,
    };
    use crate::error::ErrorKind;
    use tessel_math::Vec3;

    /// Build a document from `(translation, children)` per node and scene roots.
    fn graph(nodes: &[(f32, &[u32])], roots: &[u32]) -> Document {
        let mut pool = IndexPool::new();
        let nodes = nodes
            .iter()
            .map(|&(tx, children)| Node {
                children: pool.push_list(children),
                transform: NodeTransform::Matrix(Mat4::from_translation(Vec3::new(tx, 0.0, 0.0))),
                ..Default::default()
            })
            .collect();
        let scenes = vec![Scene {
            name: None,
            roots: pool.push_list(roots),
        }];
        Document {
            nodes,
            scenes,
            index_pool: pool,
            ..Default::default()
        }
    }

    fn x_of(cache: &WorldCache, node: usize) -> f32 {
        cache.world_matrix(0, node).unwrap().w_axis.x
    }

    #[test]
    fn test_chain_accumulates() {
        let doc = graph(&[(1.0, &[1]), (2.0, &[2]), (4.0, &[])], &[0]);
        let mut cache = WorldCache::new(&doc);
        cache.compute(&doc, 0).unwrap();

        assert_eq!(x_of(&cache, 0), 1.0);
        assert_eq!(x_of(&cache, 1), 3.0);
        assert_eq!(x_of(&cache, 2), 7.0);
    }

    #[test]
    fn test_shared_descendant_first_traversal_wins() {
        // Roots 0 and 1 both parent node 2
        let doc = graph(&[(1.0, &[2]), (10.0, &[2]), (0.5, &[])], &[0, 1]);
        let mut cache = WorldCache::new(&doc);
        cache.compute(&doc, 0).unwrap();

        assert_eq!(x_of(&cache, 2), 1.5);
        assert_eq!(x_of(&cache, 1), 10.0);
    }

    #[test]
    fn test_self_cycle_fails() {
        let doc = graph(&[(0.0, &[0])], &[0]);
        let mut cache = WorldCache::new(&doc);
        let err = cache.compute(&doc, 0).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.path(), "nodes[0].children[0]");
        assert!(cache.world_matrix(0, 0).is_none());
    }

    #[test]
    fn test_two_node_cycle_fails() {
        let doc = graph(&[(0.0, &[1]), (0.0, &[0])], &[0]);
        let mut cache = WorldCache::new(&doc);
        assert_eq!(cache.compute(&doc, 0).unwrap_err().kind(), ErrorKind::Parse);
        assert!(cache.scene().is_none());
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let n = 50_000u32;
        let children: Vec<Vec<u32>> = (0..n)
            .map(|i| if i + 1 < n { vec![i + 1] } else { vec![] })
            .collect();
        let nodes: Vec<(f32, &[u32])> = children.iter().map(|c| (1.0, c.as_slice())).collect();
        let doc = graph(&nodes, &[0]);

        let mut cache = WorldCache::new(&doc);
        cache.compute(&doc, 0).unwrap();
        assert_eq!(x_of(&cache, (n - 1) as usize), n as f32);
    }

    #[test]
    fn test_dangling_child_and_root() {
        let doc = graph(&[(0.0, &[7])], &[0]);
        let mut cache = WorldCache::new(&doc);
        assert_eq!(cache.compute(&doc, 0).unwrap_err().kind(), ErrorKind::Range);

        let doc = graph(&[(0.0, &[])], &[3]);
        let mut cache = WorldCache::new(&doc);
        let err = cache.compute(&doc, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(err.path(), "scenes[0].nodes[0]");

        assert_eq!(cache.compute(&doc, 5).unwrap_err().kind(), ErrorKind::Range);
    }

    #[test]
    fn test_query_requires_matching_scene() {
        let mut doc = graph(&[(1.0, &[]), (2.0, &[])], &[0]);
        let second_roots = doc.index_pool.push_list(&[1]);
        doc.scenes.push(Scene {
            name: None,
            roots: second_roots,
        });

        let mut cache = WorldCache::new(&doc);
        cache.compute(&doc, 0).unwrap();
        assert!(cache.world_matrix(0, 0).is_some());
        assert!(cache.world_matrix(0, 1).is_none(), "not reachable from scene 0");
        assert!(cache.world_matrix(1, 0).is_none(), "other scene");

        cache.compute(&doc, 1).unwrap();
        assert!(cache.world_matrix(0, 0).is_none());
        assert_eq!(cache.world_matrix(1, 1).unwrap().w_axis.x, 2.0);
    }

    fn position_accessor(component_type: ComponentType, count: usize) -> Accessor {
        Accessor {
            name: None,
            buffer_view: Some(0),
            byte_offset: 0,
            component_type,
            element_type: ElementType::Vec3,
            count,
            normalized: false,
        }
    }

    /// Root-only nodes at x = 10, 20, ... with the given mesh indices.
    ///
    /// Mesh 0 holds one f32 position at (1, 2, 3), mesh 1 a position accessor
    /// overrunning its view, mesh 2 u16 positions.
    fn mesh_doc(meshes: &[Option<usize>]) -> Document {
        let roots: Vec<u32> = (0..meshes.len() as u32).collect();
        let layout: Vec<(f32, &[u32])> = (0..meshes.len())
            .map(|i| (10.0 * (i + 1) as f32, &[][..]))
            .collect();
        let mut doc = graph(&layout, &roots);
        for (node, &mesh) in doc.nodes.iter_mut().zip(meshes) {
            node.mesh = mesh;
        }

        let data: Vec<u8> = [1.0f32, 2.0, 3.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        doc.buffers.push(Buffer {
            byte_length: data.len(),
            data: Some(data),
            ..Default::default()
        });
        doc.buffer_views.push(BufferView {
            buffer: 0,
            byte_length: 12,
            ..Default::default()
        });
        doc.accessors = vec![
            position_accessor(ComponentType::F32, 1),
            position_accessor(ComponentType::F32, 5),
            position_accessor(ComponentType::U16, 2),
        ];
        for i in 0..3 {
            doc.attributes.push(Attribute {
                semantic: Semantic::Position,
                set: 0,
                accessor: i,
            });
            doc.primitives.push(Primitive {
                attributes: Range::new(i, 1),
                ..Default::default()
            });
            doc.meshes.push(Mesh {
                name: None,
                primitives: Range::new(i, 1),
            });
        }
        doc
    }

    #[test]
    fn test_world_bounds_skips_non_float_positions() {
        let doc = mesh_doc(&[Some(0), Some(2), None]);
        let mut cache = WorldCache::new(&doc);
        cache.compute(&doc, 0).unwrap();

        let bounds = cache.world_bounds(&doc, 0).unwrap().unwrap();
        assert_eq!(bounds.min, Vec3::new(11.0, 2.0, 3.0));
        assert_eq!(bounds.max, Vec3::new(11.0, 2.0, 3.0));
    }

    #[test]
    fn test_world_bounds_reports_malformed_accessor() {
        let doc = mesh_doc(&[Some(0), Some(1)]);
        let mut cache = WorldCache::new(&doc);
        cache.compute(&doc, 0).unwrap();

        let err = cache.world_bounds(&doc, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.path(), "accessors[1].count");
    }

    #[test]
    fn test_world_bounds_reports_dangling_mesh() {
        let doc = mesh_doc(&[Some(0), Some(7)]);
        let mut cache = WorldCache::new(&doc);
        cache.compute(&doc, 0).unwrap();

        let err = cache.world_bounds(&doc, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(err.path(), "nodes[1].mesh");
    }

    #[test]
    fn test_world_bounds_needs_computed_scene() {
        let doc = mesh_doc(&[Some(0)]);
        let cache = WorldCache::new(&doc);
        assert!(cache.world_bounds(&doc, 0).unwrap().is_none());
    }

    #[test]
    fn test_cache_size_mismatch() {
        let doc = graph(&[(0.0, &[])], &[0]);
        let other = graph(&[(0.0, &[]), (0.0, &[])], &[0]);
        let mut cache = WorldCache::new(&doc);
        assert_eq!(cache.compute(&other, 0).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }
}
