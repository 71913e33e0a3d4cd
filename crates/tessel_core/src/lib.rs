//! Tessel Core - scene-interchange document loading for rendering.
//!
//! This crate provides:
//!
//! - **Document model**: flat arrays of scenes, nodes, meshes, accessors and
//!   buffers addressed by index, with a shared child/root index pool
//! - **Loading**: `.gltf` JSON and `.glb` binary containers, data URIs and
//!   external buffer files
//! - **Accessors**: bounds-checked views decoding every component type
//! - **Topology**: triangle lists, strips and fans as plain triangles
//! - **World transforms**: iterative scene-graph evaluation with cycle
//!   detection
//!
//! # Example
//!
//! ```ignore
//! use tessel_core::{load_gltf, WorldCache};
//!
//! let doc = load_gltf("scene.glb")?;
//! let mut cache = WorldCache::new(&doc);
//! cache.compute(&doc, doc.default_scene().unwrap_or(0))?;
//! println!("Loaded {} nodes, {} meshes", doc.node_count(), doc.mesh_count());
//! ```

pub mod accessor;
pub mod document;
pub mod error;
pub mod gltf;
pub mod mesh;
pub mod texture;
pub mod topology;
pub mod world;

// Re-export commonly used types
pub use accessor::{decode_component, AccessorView, MAX_COMPONENTS};
pub use document::{
    Accessor, AlphaMode, Asset, Attribute, Buffer, BufferTarget, BufferView, ComponentType,
    Document, ElementType, Filter, Image, ImageSource, IndexPool, Material, Mesh, Node,
    NodeTransform, Primitive, PrimitiveMode, Range, Sampler, Scene, Semantic, Texture, Wrap,
};
pub use error::{ErrorKind, GltfError, GltfResult};
pub use gltf::{load_glb_from_slice, load_gltf, load_gltf_from_slice, LoadOptions};
pub use mesh::MeshData;
pub use texture::{decode_image, DecodedImage};
pub use topology::{for_each_triangle, triangle_count, Flow};
pub use world::WorldCache;
