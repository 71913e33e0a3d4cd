//! High-level document loading.
//!
//! This module provides the main entry points for loading `.gltf` (JSON)
//! and `.glb` (binary container) files and populating the flat document
//! model from the parsed JSON tree.
//!
//! Loading is all-or-nothing: the first error aborts the load and every
//! partially built array is dropped with the builder.

use std::path::{Path, PathBuf};

use base64::Engine;
use tessel_math::{Mat4, Quat, Vec3};

use crate::document::{
    Accessor, AlphaMode, Asset, Attribute, Buffer, BufferTarget, BufferView, ComponentType,
    Document, ElementType, Filter, Image, ImageSource, Material, Mesh, Node, NodeTransform,
    Primitive, PrimitiveMode, Range, Sampler, Scene, Semantic, Texture, Wrap,
};
use crate::error::{GltfError, GltfResult};
use crate::gltf::glb::{is_glb, parse_glb};
use crate::gltf::json;

/// Options controlling how external resources are resolved.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Directory relative URIs are resolved against
    pub base_dir: Option<PathBuf>,
    /// Read buffers stored in external files; when false they are left unloaded
    pub load_external_buffers: bool,
    /// Reject buffers declaring more bytes than this
    pub max_buffer_size: Option<u64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            base_dir: None,
            load_external_buffers: true,
            max_buffer_size: None,
        }
    }
}

impl LoadOptions {
    /// Default options resolving URIs against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            ..Default::default()
        }
    }

    /// Join a relative URI onto the base directory.
    ///
    /// `path` names the URI's location for error reporting; escapes that
    /// decode to invalid UTF-8 are a `Parse` error there.
    pub fn resolve(&self, uri: &str, path: &str) -> GltfResult<PathBuf> {
        let leaf = percent_decode(uri).ok_or_else(|| {
            GltfError::parse(path, format!("{:?} decodes to invalid UTF-8", uri))
        })?;
        Ok(match &self.base_dir {
            Some(base) => base.join(leaf),
            None => PathBuf::from(leaf),
        })
    }
}

/// Load a `.gltf` or `.glb` file.
///
/// Files with a `.glb` extension are always parsed as a binary container;
/// otherwise the format is detected from the magic bytes. Relative URIs
/// resolve against the file's directory.
///
/// # Example
///
/// ```ignore
/// use tessel_core::load_gltf;
///
/// let doc = load_gltf("scene.glb")?;
/// println!("{} nodes, {} meshes", doc.node_count(), doc.mesh_count());
/// ```
pub fn load_gltf<P: AsRef<Path>>(path: P) -> GltfResult<Document> {
    let path = path.as_ref();
    let bytes = read_file(path, None)?;
    let options = LoadOptions {
        base_dir: path.parent().map(Path::to_path_buf),
        ..Default::default()
    };

    let is_glb_file = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("glb"));
    if is_glb_file {
        load_glb_from_slice(&bytes, &options)
    } else {
        load_gltf_from_slice(&bytes, &options)
    }
}

/// Load a binary container, rejecting anything that is not a well-formed GLB.
pub fn load_glb_from_slice(bytes: &[u8], options: &LoadOptions) -> GltfResult<Document> {
    let glb = parse_glb(bytes)?;
    Document::from_json(glb.json, glb.bin, options)
}

/// Load a document from in-memory bytes (JSON text or GLB container).
pub fn load_gltf_from_slice(bytes: &[u8], options: &LoadOptions) -> GltfResult<Document> {
    if is_glb(bytes) {
        load_glb_from_slice(bytes, options)
    } else {
        Document::from_json(bytes, None, options)
    }
}

impl Document {
    /// Populate a document from JSON text and an optional GLB binary payload.
    pub fn from_json(
        json: &[u8],
        bin: Option<&[u8]>,
        options: &LoadOptions,
    ) -> GltfResult<Document> {
        let root: json::Root = serde_json::from_slice(json)?;
        let doc = DocumentBuilder::new(options, bin).build(root)?;

        log::info!(
            "Loaded document: {} scenes, {} nodes, {} meshes, {} accessors, {} buffers",
            doc.scene_count(),
            doc.node_count(),
            doc.mesh_count(),
            doc.accessor_count(),
            doc.buffers.len()
        );
        Ok(doc)
    }
}

/// Read a file, optionally requiring an exact byte length.
pub fn read_file(path: &Path, expected_len: Option<usize>) -> GltfResult<Vec<u8>> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| GltfError::io(display.clone(), e))?;
    if let Some(expected) = expected_len {
        if bytes.len() != expected {
            return Err(GltfError::parse(
                display,
                format!("file has {} bytes, expected {}", bytes.len(), expected),
            ));
        }
    }
    Ok(bytes)
}

/// Decode a `data:<mime>;base64,<payload>` URI into `(mime, bytes)`.
///
/// Returns `Ok(None)` for URIs that are not data URIs.
pub fn decode_data_uri(uri: &str, path: &str) -> GltfResult<Option<(String, Vec<u8>)>> {
    let Some(rest) = uri.strip_prefix("data:") else {
        return Ok(None);
    };
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| GltfError::parse(path, "data URI without ',' separator"))?;
    let mime = header.strip_suffix(";base64").ok_or_else(|| {
        GltfError::unsupported(path, "only base64 data URIs are supported")
    })?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| GltfError::parse(path, format!("bad base64 payload: {}", e)))?;
    Ok(Some((mime.to_string(), bytes)))
}

/// Decode `%XX` escapes in a relative URI.
///
/// Malformed escapes are kept literally. Returns `None` when the decoded
/// bytes are not UTF-8.
fn percent_decode(uri: &str) -> Option<String> {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'%')
            .then(|| bytes.get(i + 1..i + 3))
            .flatten()
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

fn to_usize(value: u64, path: impl FnOnce() -> String) -> GltfResult<usize> {
    usize::try_from(value)
        .map_err(|_| GltfError::parse(path(), format!("{} does not fit in memory", value)))
}

/// Internal builder for populating a Document from the raw JSON tree.
struct DocumentBuilder<'a> {
    doc: Document,
    options: &'a LoadOptions,
    bin: Option<&'a [u8]>,
}

impl<'a> DocumentBuilder<'a> {
    fn new(options: &'a LoadOptions, bin: Option<&'a [u8]>) -> Self {
        Self {
            doc: Document::default(),
            options,
            bin,
        }
    }

    fn build(mut self, root: json::Root) -> GltfResult<Document> {
        self.process_asset(root.asset)?;

        for (i, buffer) in root.buffers.into_iter().enumerate() {
            self.process_buffer(i, buffer)?;
        }
        for (i, view) in root.buffer_views.into_iter().enumerate() {
            self.process_buffer_view(i, view)?;
        }
        for (i, accessor) in root.accessors.into_iter().enumerate() {
            self.process_accessor(i, accessor)?;
        }
        for (i, mesh) in root.meshes.into_iter().enumerate() {
            self.process_mesh(i, mesh)?;
        }
        for node in root.nodes {
            self.process_node(node);
        }
        for scene in root.scenes {
            let roots = self.doc.index_pool.push_list(&scene.nodes);
            self.doc.scenes.push(Scene {
                name: scene.name,
                roots,
            });
        }
        for (i, material) in root.materials.into_iter().enumerate() {
            self.process_material(i, material)?;
        }
        for texture in root.textures {
            self.doc.textures.push(Texture {
                name: texture.name,
                sampler: texture.sampler.map(|s| s as usize),
                source: texture.source.map(|s| s as usize),
            });
        }
        for (i, image) in root.images.into_iter().enumerate() {
            self.process_image(i, image)?;
        }
        for (i, sampler) in root.samplers.into_iter().enumerate() {
            self.process_sampler(i, sampler)?;
        }

        if let Some(scene) = root.scene {
            let scene = scene as usize;
            if scene >= self.doc.scenes.len() {
                return Err(GltfError::range(
                    "scene",
                    format!("scene {} of {}", scene, self.doc.scenes.len()),
                ));
            }
            self.doc.default_scene = Some(scene);
        }

        Ok(self.doc)
    }

    fn process_asset(&mut self, asset: json::Asset) -> GltfResult<()> {
        let major = asset.version.split('.').next().unwrap_or_default();
        if major != "2" {
            return Err(GltfError::unsupported(
                "asset.version",
                format!("document version {} is not 2.x", asset.version),
            ));
        }
        self.doc.asset = Asset {
            version: asset.version,
            min_version: asset.min_version,
            generator: asset.generator,
            copyright: asset.copyright,
        };
        Ok(())
    }

    fn process_buffer(&mut self, index: usize, raw: json::Buffer) -> GltfResult<()> {
        let path = format!("buffers[{}]", index);

        if let Some(limit) = self.options.max_buffer_size {
            if raw.byte_length > limit {
                return Err(GltfError::parse(
                    path,
                    format!("byteLength {} exceeds limit {}", raw.byte_length, limit),
                ));
            }
        }
        let byte_length = to_usize(raw.byte_length, || format!("{}.byteLength", path))?;

        let data = match raw.uri.as_deref() {
            Some(uri) => match decode_data_uri(uri, &format!("{}.uri", path))? {
                Some((_, bytes)) => {
                    if bytes.len() != byte_length {
                        return Err(GltfError::parse(
                            format!("{}.uri", path),
                            format!(
                                "payload has {} bytes, byteLength is {}",
                                bytes.len(),
                                byte_length
                            ),
                        ));
                    }
                    Some(bytes)
                }
                None if self.options.load_external_buffers => {
                    let file = self.options.resolve(uri, &format!("{}.uri", path))?;
                    log::debug!("{}: reading {}", path, file.display());
                    Some(read_file(&file, Some(byte_length))?)
                }
                None => {
                    log::debug!("{}: external buffer {} left unloaded", path, uri);
                    None
                }
            },
            None => match self.bin {
                Some(bin) if index == 0 => {
                    // The BIN chunk is padded to 4 bytes
                    if bin.len() < byte_length || bin.len() - byte_length > 3 {
                        return Err(GltfError::parse(
                            path,
                            format!(
                                "BIN chunk has {} bytes, byteLength is {}",
                                bin.len(),
                                byte_length
                            ),
                        ));
                    }
                    Some(bin[..byte_length].to_vec())
                }
                _ => {
                    log::debug!("{}: no uri and no binary chunk", path);
                    None
                }
            },
        };

        self.doc.buffers.push(Buffer {
            name: raw.name,
            uri: raw.uri,
            byte_length,
            data,
        });
        Ok(())
    }

    fn process_buffer_view(&mut self, index: usize, raw: json::BufferView) -> GltfResult<()> {
        let path = format!("bufferViews[{}]", index);

        let buffer = raw.buffer as usize;
        let buffer_length = self
            .doc
            .buffers
            .get(buffer)
            .map(|b| b.byte_length)
            .ok_or_else(|| {
                GltfError::range(
                    format!("{}.buffer", path),
                    format!("buffer {} of {}", buffer, self.doc.buffers.len()),
                )
            })?;

        let byte_offset = to_usize(raw.byte_offset, || format!("{}.byteOffset", path))?;
        let byte_length = to_usize(raw.byte_length, || format!("{}.byteLength", path))?;
        let fits = byte_offset
            .checked_add(byte_length)
            .is_some_and(|end| end <= buffer_length);
        if !fits {
            return Err(GltfError::parse(
                path,
                format!(
                    "offset {} + length {} exceeds buffer length {}",
                    byte_offset, byte_length, buffer_length
                ),
            ));
        }

        let byte_stride = match raw.byte_stride {
            None => 0,
            Some(stride) if (4..=252).contains(&stride) && stride % 4 == 0 => stride as usize,
            Some(stride) => {
                return Err(GltfError::parse(
                    format!("{}.byteStride", path),
                    format!("stride {} must be a multiple of 4 in 4..=252", stride),
                ))
            }
        };

        let target = match raw.target {
            None => None,
            Some(code) => Some(BufferTarget::from_code(code).ok_or_else(|| {
                GltfError::parse(format!("{}.target", path), format!("unknown target {}", code))
            })?),
        };

        self.doc.buffer_views.push(BufferView {
            name: raw.name,
            buffer,
            byte_offset,
            byte_length,
            byte_stride,
            target,
        });
        Ok(())
    }

    fn process_accessor(&mut self, index: usize, raw: json::Accessor) -> GltfResult<()> {
        let path = format!("accessors[{}]", index);

        let component_type = ComponentType::from_code(raw.component_type).ok_or_else(|| {
            GltfError::parse(
                format!("{}.componentType", path),
                format!("unknown component type {}", raw.component_type),
            )
        })?;
        let element_type = ElementType::parse(&raw.element_type).ok_or_else(|| {
            GltfError::parse(
                format!("{}.type", path),
                format!("unknown element type {:?}", raw.element_type),
            )
        })?;

        self.doc.accessors.push(Accessor {
            name: raw.name,
            buffer_view: raw.buffer_view.map(|v| v as usize),
            byte_offset: to_usize(raw.byte_offset, || format!("{}.byteOffset", path))?,
            component_type,
            element_type,
            count: to_usize(raw.count, || format!("{}.count", path))?,
            normalized: raw.normalized,
        });
        Ok(())
    }

    fn process_mesh(&mut self, index: usize, raw: json::Mesh) -> GltfResult<()> {
        let first = self.doc.primitives.len();

        for (p, primitive) in raw.primitives.into_iter().enumerate() {
            let path = format!("meshes[{}].primitives[{}]", index, p);

            let code = primitive.mode.unwrap_or(4);
            let mode = PrimitiveMode::from_code(code).ok_or_else(|| {
                GltfError::parse(format!("{}.mode", path), format!("unknown mode {}", code))
            })?;

            let attr_first = self.doc.attributes.len();
            for (name, accessor) in &primitive.attributes {
                match Semantic::parse(name) {
                    Some((semantic, set)) => self.doc.attributes.push(Attribute {
                        semantic,
                        set,
                        accessor: *accessor as usize,
                    }),
                    None => log::warn!("Skipping unknown attribute {} at {}", name, path),
                }
            }
            let attributes = Range::new(attr_first, self.doc.attributes.len() - attr_first);

            self.doc.primitives.push(Primitive {
                mode,
                indices: primitive.indices.map(|i| i as usize),
                material: primitive.material.map(|m| m as usize),
                attributes,
            });
        }

        self.doc.meshes.push(Mesh {
            name: raw.name,
            primitives: Range::new(first, self.doc.primitives.len() - first),
        });
        Ok(())
    }

    fn process_node(&mut self, raw: json::Node) {
        // An explicit matrix wins; TRS fields alongside it are ignored.
        let transform = match raw.matrix {
            Some(m) => NodeTransform::Matrix(Mat4::from_cols_array(&m)),
            None => NodeTransform::Trs {
                translation: raw.translation.map(Vec3::from_array).unwrap_or(Vec3::ZERO),
                rotation: raw.rotation.map(Quat::from_array).unwrap_or(Quat::IDENTITY),
                scale: raw.scale.map(Vec3::from_array).unwrap_or(Vec3::ONE),
            },
        };

        let children = self.doc.index_pool.push_list(&raw.children);
        self.doc.nodes.push(Node {
            name: raw.name,
            mesh: raw.mesh.map(|m| m as usize),
            children,
            transform,
        });
    }

    fn process_material(&mut self, index: usize, raw: json::Material) -> GltfResult<()> {
        let defaults = Material::default();
        let pbr = raw.pbr_metallic_roughness;

        let alpha_mode = match raw.alpha_mode.as_deref() {
            None => AlphaMode::Opaque,
            Some(name) => AlphaMode::parse(name).ok_or_else(|| {
                GltfError::parse(
                    format!("materials[{}].alphaMode", index),
                    format!("unknown alpha mode {:?}", name),
                )
            })?,
        };

        self.doc.materials.push(Material {
            name: raw.name,
            base_color_factor: pbr.base_color_factor.unwrap_or(defaults.base_color_factor),
            base_color_texture: pbr.base_color_texture.map(|t| t.index as usize),
            metallic_factor: pbr.metallic_factor.unwrap_or(defaults.metallic_factor),
            roughness_factor: pbr.roughness_factor.unwrap_or(defaults.roughness_factor),
            emissive_factor: raw.emissive_factor.unwrap_or(defaults.emissive_factor),
            alpha_mode,
            alpha_cutoff: raw.alpha_cutoff.unwrap_or(defaults.alpha_cutoff),
            double_sided: raw.double_sided,
        });
        Ok(())
    }

    fn process_image(&mut self, index: usize, raw: json::Image) -> GltfResult<()> {
        let path = format!("images[{}]", index);

        let source = match (raw.uri, raw.buffer_view) {
            (Some(uri), _) => match decode_data_uri(&uri, &format!("{}.uri", path))? {
                Some((mime_type, data)) => ImageSource::DataUri { mime_type, data },
                None => ImageSource::Uri(uri),
            },
            (None, Some(view)) => {
                let view = view as usize;
                if view >= self.doc.buffer_views.len() {
                    return Err(GltfError::range(
                        format!("{}.bufferView", path),
                        format!("buffer view {} of {}", view, self.doc.buffer_views.len()),
                    ));
                }
                let mime_type = raw.mime_type.ok_or_else(|| {
                    GltfError::parse(
                        format!("{}.mimeType", path),
                        "bufferView image without mimeType",
                    )
                })?;
                ImageSource::BufferView { view, mime_type }
            }
            (None, None) => {
                return Err(GltfError::parse(path, "image has neither uri nor bufferView"));
            }
        };

        self.doc.images.push(Image {
            name: raw.name,
            source,
        });
        Ok(())
    }

    fn process_sampler(&mut self, index: usize, raw: json::Sampler) -> GltfResult<()> {
        let path = format!("samplers[{}]", index);

        let filter = |code: Option<u32>, field: &str| -> GltfResult<Option<Filter>> {
            code.map(|c| {
                Filter::from_code(c).ok_or_else(|| {
                    GltfError::parse(format!("{}.{}", path, field), format!("unknown filter {}", c))
                })
            })
            .transpose()
        };
        let wrap = |code: Option<u32>, field: &str| -> GltfResult<Wrap> {
            match code {
                None => Ok(Wrap::default()),
                Some(c) => Wrap::from_code(c).ok_or_else(|| {
                    GltfError::parse(
                        format!("{}.{}", path, field),
                        format!("unknown wrap mode {}", c),
                    )
                }),
            }
        };

        let sampler = Sampler {
            name: raw.name,
            mag_filter: filter(raw.mag_filter, "magFilter")?,
            min_filter: filter(raw.min_filter, "minFilter")?,
            wrap_s: wrap(raw.wrap_s, "wrapS")?,
            wrap_t: wrap(raw.wrap_t, "wrapT")?,
        };
        self.doc.samplers.push(sampler);
        Ok(())
    }
}
