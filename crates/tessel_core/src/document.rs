//! In-memory document model.
//!
//! Every entity lives in a flat array owned by [`Document`] and refers to
//! other entities by index. Variable-length index lists (scene roots, node
//! children) share one [`IndexPool`] and are addressed with [`Range`]
//! handles; mesh primitives and primitive attributes use the same range
//! scheme over their own arrays. A document is built in one pass by the
//! loader and is read-only afterwards.

use tessel_math::{trs_matrix, Mat4, Quat, Vec3};

/// Half-open range `[first, first + count)` into one of the document's
/// shared arrays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Range {
    pub first: usize,
    pub count: usize,
}

impl Range {
    pub const EMPTY: Range = Range { first: 0, count: 0 };

    pub fn new(first: usize, count: usize) -> Self {
        Self { first, count }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Resolve against a slice; a range that does not fit yields `None`.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> Option<&'a [T]> {
        let end = self.first.checked_add(self.count)?;
        items.get(self.first..end)
    }
}

/// Grow-only pool holding every variable-length index list in the document.
#[derive(Clone, Debug, Default)]
pub struct IndexPool {
    indices: Vec<u32>,
}

impl IndexPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a list and return the handle addressing it.
    pub fn push_list(&mut self, list: &[u32]) -> Range {
        if list.is_empty() {
            return Range::EMPTY;
        }
        let first = self.indices.len();
        self.indices.extend_from_slice(list);
        Range::new(first, list.len())
    }

    /// Indices addressed by `range`, empty if the handle does not belong to this pool.
    pub fn get(&self, range: Range) -> &[u32] {
        range.slice(&self.indices).unwrap_or(&[])
    }

    /// Total number of pooled indices.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Document metadata from the `asset` object.
#[derive(Clone, Debug, Default)]
pub struct Asset {
    pub version: String,
    pub min_version: Option<String>,
    pub generator: Option<String>,
    pub copyright: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub name: Option<String>,
    /// Root node indices, in the index pool
    pub roots: Range,
}

/// A node's local transform.
///
/// An explicit matrix always takes precedence: when the source carries a
/// `matrix` the TRS properties are dropped entirely.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeTransform {
    /// Column-major 4x4 matrix
    Matrix(Mat4),
    Trs {
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    },
}

impl Default for NodeTransform {
    fn default() -> Self {
        NodeTransform::Trs {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl NodeTransform {
    /// The local matrix, `T * R * S` for the TRS form.
    pub fn local_matrix(&self) -> Mat4 {
        match *self {
            NodeTransform::Matrix(m) => m,
            NodeTransform::Trs {
                translation,
                rotation,
                scale,
            } => trs_matrix(translation, rotation, scale),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Node {
    pub name: Option<String>,
    pub mesh: Option<usize>,
    /// Child node indices, in the index pool
    pub children: Range,
    pub transform: NodeTransform,
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub name: Option<String>,
    /// Range into the document's primitive array
    pub primitives: Range,
}

/// Primitive draw mode (`mode` code 0..=6).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveMode {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => PrimitiveMode::Points,
            1 => PrimitiveMode::Lines,
            2 => PrimitiveMode::LineLoop,
            3 => PrimitiveMode::LineStrip,
            4 => PrimitiveMode::Triangles,
            5 => PrimitiveMode::TriangleStrip,
            6 => PrimitiveMode::TriangleFan,
            _ => return None,
        })
    }
}

/// Vertex attribute semantic, without its set index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Normal,
    Tangent,
    TexCoord,
    Color,
    Joints,
    Weights,
}

impl Semantic {
    /// Parse an attribute name such as `POSITION` or `TEXCOORD_1` into a
    /// semantic and set index. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<(Semantic, u32)> {
        match name {
            "POSITION" => return Some((Semantic::Position, 0)),
            "NORMAL" => return Some((Semantic::Normal, 0)),
            "TANGENT" => return Some((Semantic::Tangent, 0)),
            _ => {}
        }

        let (prefix, set) = name.rsplit_once('_')?;
        let semantic = match prefix {
            "TEXCOORD" => Semantic::TexCoord,
            "COLOR" => Semantic::Color,
            "JOINTS" => Semantic::Joints,
            "WEIGHTS" => Semantic::Weights,
            _ => return None,
        };
        if set.is_empty() || !set.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((semantic, set.parse().ok()?))
    }
}

/// One `(semantic, set) -> accessor` binding of a primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub semantic: Semantic,
    pub set: u32,
    pub accessor: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Primitive {
    pub mode: PrimitiveMode,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    /// Range into the document's attribute array
    pub attributes: Range,
}

/// Component storage type (`componentType` GL code).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            5120 => ComponentType::I8,
            5121 => ComponentType::U8,
            5122 => ComponentType::I16,
            5123 => ComponentType::U16,
            5125 => ComponentType::U32,
            5126 => ComponentType::F32,
            _ => return None,
        })
    }

    /// Size of one component in bytes.
    pub fn size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }
}

/// Element shape (`type` string).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "SCALAR" => ElementType::Scalar,
            "VEC2" => ElementType::Vec2,
            "VEC3" => ElementType::Vec3,
            "VEC4" => ElementType::Vec4,
            "MAT2" => ElementType::Mat2,
            "MAT3" => ElementType::Mat3,
            "MAT4" => ElementType::Mat4,
            _ => return None,
        })
    }

    /// Number of components per element (1..=16).
    pub fn component_count(self) -> usize {
        match self {
            ElementType::Scalar => 1,
            ElementType::Vec2 => 2,
            ElementType::Vec3 => 3,
            ElementType::Vec4 | ElementType::Mat2 => 4,
            ElementType::Mat3 => 9,
            ElementType::Mat4 => 16,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Accessor {
    pub name: Option<String>,
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub element_type: ElementType,
    pub count: usize,
    pub normalized: bool,
}

/// Intended GPU binding of a buffer view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferTarget {
    ArrayBuffer,
    ElementArrayBuffer,
}

impl BufferTarget {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            34962 => Some(BufferTarget::ArrayBuffer),
            34963 => Some(BufferTarget::ElementArrayBuffer),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BufferView {
    pub name: Option<String>,
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    /// Distance between elements in bytes, 0 when tightly packed
    pub byte_stride: usize,
    pub target: Option<BufferTarget>,
}

#[derive(Clone, Debug, Default)]
pub struct Buffer {
    pub name: Option<String>,
    pub uri: Option<String>,
    pub byte_length: usize,
    /// Loaded bytes; `None` when the buffer's source was not loaded
    pub data: Option<Vec<u8>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

impl AlphaMode {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "OPAQUE" => AlphaMode::Opaque,
            "MASK" => AlphaMode::Mask,
            "BLEND" => AlphaMode::Blend,
            _ => return None,
        })
    }
}

/// Metallic-roughness material parameters.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: Option<String>,
    pub base_color_factor: [f32; 4],
    /// Texture index of the base color map
    pub base_color_texture: Option<usize>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0; 3],
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Texture {
    pub name: Option<String>,
    pub sampler: Option<usize>,
    pub source: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl Filter {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            9728 => Filter::Nearest,
            9729 => Filter::Linear,
            9984 => Filter::NearestMipmapNearest,
            9985 => Filter::LinearMipmapNearest,
            9986 => Filter::NearestMipmapLinear,
            9987 => Filter::LinearMipmapLinear,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Wrap {
    ClampToEdge,
    MirroredRepeat,
    #[default]
    Repeat,
}

impl Wrap {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            33071 => Wrap::ClampToEdge,
            33648 => Wrap::MirroredRepeat,
            10497 => Wrap::Repeat,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct Sampler {
    pub name: Option<String>,
    pub mag_filter: Option<Filter>,
    pub min_filter: Option<Filter>,
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
}

/// Where an image's encoded bytes come from.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageSource {
    /// External file, relative to the document's base directory
    Uri(String),
    /// Embedded base64 payload, already decoded
    DataUri { mime_type: String, data: Vec<u8> },
    /// Bytes of a buffer view
    BufferView { view: usize, mime_type: String },
}

#[derive(Clone, Debug)]
pub struct Image {
    pub name: Option<String>,
    pub source: ImageSource,
}

/// A loaded scene-interchange document.
///
/// Owns every entity array, the shared index pool and all loaded buffer
/// bytes. Query methods never mutate, so a loaded document can be shared
/// across threads for reading.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pub(crate) asset: Asset,
    pub(crate) default_scene: Option<usize>,
    pub(crate) scenes: Vec<Scene>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) meshes: Vec<Mesh>,
    pub(crate) primitives: Vec<Primitive>,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) accessors: Vec<Accessor>,
    pub(crate) buffer_views: Vec<BufferView>,
    pub(crate) buffers: Vec<Buffer>,
    pub(crate) materials: Vec<Material>,
    pub(crate) textures: Vec<Texture>,
    pub(crate) images: Vec<Image>,
    pub(crate) samplers: Vec<Sampler>,
    pub(crate) index_pool: IndexPool,
}

impl Document {
    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// The scene named by the top-level `scene` key, if any.
    pub fn default_scene(&self) -> Option<usize> {
        self.default_scene
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn accessors(&self) -> &[Accessor] {
        &self.accessors
    }

    pub fn buffer_views(&self) -> &[BufferView] {
        &self.buffer_views
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn samplers(&self) -> &[Sampler] {
        &self.samplers
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn accessor_count(&self) -> usize {
        self.accessors.len()
    }

    pub fn scene(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn mesh(&self, index: usize) -> Option<&Mesh> {
        self.meshes.get(index)
    }

    pub fn accessor(&self, index: usize) -> Option<&Accessor> {
        self.accessors.get(index)
    }

    /// Root node indices of a scene.
    pub fn scene_roots(&self, scene: usize) -> Option<&[u32]> {
        self.scenes.get(scene).map(|s| self.index_pool.get(s.roots))
    }

    /// Child node indices of a node.
    pub fn node_children(&self, node: usize) -> Option<&[u32]> {
        self.nodes.get(node).map(|n| self.index_pool.get(n.children))
    }

    /// Primitives of a mesh.
    pub fn mesh_primitives(&self, mesh: usize) -> Option<&[Primitive]> {
        let mesh = self.meshes.get(mesh)?;
        mesh.primitives.slice(&self.primitives)
    }

    /// Attribute bindings of a primitive.
    pub fn primitive_attributes(&self, primitive: &Primitive) -> &[Attribute] {
        primitive.attributes.slice(&self.attributes).unwrap_or(&[])
    }

    /// Accessor bound to `(semantic, set)` on a primitive.
    pub fn find_attribute(
        &self,
        primitive: &Primitive,
        semantic: Semantic,
        set: u32,
    ) -> Option<usize> {
        self.primitive_attributes(primitive)
            .iter()
            .find(|a| a.semantic == semantic && a.set == set)
            .map(|a| a.accessor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_pool_ranges() {
        let mut pool = IndexPool::new();
        let a = pool.push_list(&[0, 1, 2]);
        let empty = pool.push_list(&[]);
        let b = pool.push_list(&[7]);

        assert_eq!(pool.get(a), &[0, 1, 2]);
        assert_eq!(pool.get(empty), &[] as &[u32]);
        assert_eq!(pool.get(b), &[7]);
        assert_eq!(pool.len(), 4);

        // A foreign handle resolves to nothing rather than panicking
        assert!(pool.get(Range::new(3, 5)).is_empty());
        assert!(pool.get(Range::new(usize::MAX, 2)).is_empty());
    }

    #[test]
    fn test_semantic_parse() {
        assert_eq!(Semantic::parse("POSITION"), Some((Semantic::Position, 0)));
        assert_eq!(Semantic::parse("TEXCOORD_1"), Some((Semantic::TexCoord, 1)));
        assert_eq!(Semantic::parse("COLOR_0"), Some((Semantic::Color, 0)));
        assert_eq!(Semantic::parse("WEIGHTS_12"), Some((Semantic::Weights, 12)));
        assert_eq!(Semantic::parse("TEXCOORD_"), None);
        assert_eq!(Semantic::parse("TEXCOORD_+1"), None);
        assert_eq!(Semantic::parse("_BATCHID"), None);
        assert_eq!(Semantic::parse("POSITION_0"), None);
    }

    #[test]
    fn test_component_and_element_sizes() {
        assert_eq!(ComponentType::from_code(5123), Some(ComponentType::U16));
        assert_eq!(ComponentType::from_code(5124), None);
        assert_eq!(ComponentType::F32.size(), 4);
        assert_eq!(ElementType::parse("MAT3").map(|e| e.component_count()), Some(9));
        assert_eq!(ElementType::parse("vec3"), None);
    }

    #[test]
    fn test_matrix_transform_wins() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(NodeTransform::Matrix(m).local_matrix(), m);
        assert_eq!(NodeTransform::default().local_matrix(), Mat4::IDENTITY);
    }
}
