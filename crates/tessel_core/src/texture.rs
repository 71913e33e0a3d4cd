//! Image resolution and decoding.
//!
//! Images can live in an external file, an embedded data URI or a buffer
//! view. [`decode_image`] resolves whichever source an image uses and
//! decodes it into 8-bit RGBA through the `image` crate.

use crate::document::{Document, ImageSource};
use crate::error::{GltfError, GltfResult};
use crate::gltf::{read_file, LoadOptions};

/// A decoded image in row-major RGBA8.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Four bytes per pixel
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    /// RGBA of pixel `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let p = self.rgba.get(offset..offset + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}

/// Load and decode image `index`.
///
/// External URIs resolve against `options.base_dir`.
pub fn decode_image(
    doc: &Document,
    index: usize,
    options: &LoadOptions,
) -> GltfResult<DecodedImage> {
    let path = format!("images[{}]", index);
    let image = doc.images().get(index).ok_or_else(|| {
        GltfError::range(path.clone(), format!("image {} of {}", index, doc.images().len()))
    })?;

    let owned;
    let bytes: &[u8] = match &image.source {
        ImageSource::Uri(uri) => {
            owned = read_file(&options.resolve(uri, &format!("{}.uri", path))?, None)?;
            &owned
        }
        ImageSource::DataUri { data, .. } => data,
        ImageSource::BufferView { view, .. } => doc.buffer_view_bytes(*view)?,
    };

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| GltfError::parse(path.clone(), format!("image decoding error: {}", e)))?
        .to_rgba8();

    let (width, height) = decoded.dimensions();
    log::debug!("Decoded {}: {}x{}", path, width, height);

    Ok(DecodedImage {
        width,
        height,
        rgba: decoded.into_raw(),
    })
}

impl Document {
    /// Bytes covered by buffer view `index`.
    pub fn buffer_view_bytes(&self, index: usize) -> GltfResult<&[u8]> {
        let path = || format!("bufferViews[{}]", index);
        let view = self.buffer_views.get(index).ok_or_else(|| {
            GltfError::range(
                path(),
                format!("buffer view {} of {}", index, self.buffer_views.len()),
            )
        })?;
        let buffer = self.buffers.get(view.buffer).ok_or_else(|| {
            GltfError::range(
                format!("{}.buffer", path()),
                format!("buffer {} of {}", view.buffer, self.buffers.len()),
            )
        })?;
        let data = buffer.data.as_deref().ok_or_else(|| {
            GltfError::invalid_argument(
                format!("buffers[{}]", view.buffer),
                "buffer data not loaded",
            )
        })?;

        view.byte_offset
            .checked_add(view.byte_length)
            .and_then(|end| data.get(view.byte_offset..end))
            .ok_or_else(|| GltfError::parse(path(), "buffer view exceeds its buffer"))
    }
}
