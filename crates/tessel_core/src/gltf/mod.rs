//! Scene-interchange file parsing.
//!
//! Handles both the JSON text form and the binary GLB container:
//! - `glb`: container header and chunk splitting
//! - `json`: raw `serde` schema of the JSON document
//! - `loader`: resource resolution and conversion into [`Document`](crate::Document)

mod glb;
mod json;
mod loader;

pub use glb::{is_glb, parse_glb, write_glb, Glb, CHUNK_BIN, CHUNK_JSON, GLB_MAGIC};
pub use loader::{
    decode_data_uri, load_glb_from_slice, load_gltf, load_gltf_from_slice, read_file, LoadOptions,
};
