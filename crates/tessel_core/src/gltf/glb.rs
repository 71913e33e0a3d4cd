//! Binary container (GLB) framing.
//!
//! Layout: a 12-byte header (`magic`, `version`, `length`, all little-endian
//! u32) followed by chunks of `length`, `type`, payload. The first chunk
//! must be JSON; an optional BIN chunk may follow; chunks of any other type
//! are skipped.

use crate::error::{GltfError, GltfResult};

/// `"glTF"` read as a little-endian u32.
pub const GLB_MAGIC: u32 = 0x4654_6C67;
/// `"JSON"` chunk type.
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
/// `"BIN\0"` chunk type.
pub const CHUNK_BIN: u32 = 0x004E_4942;

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// Payload slices of a parsed GLB, borrowed from the input buffer.
#[derive(Clone, Copy, Debug)]
pub struct Glb<'a> {
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}

/// True when `bytes` starts with the GLB magic.
pub fn is_glb(bytes: &[u8]) -> bool {
    read_u32(bytes, 0) == Some(GLB_MAGIC)
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let raw: [u8; 4] = bytes.get(offset..end)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

/// Parse GLB framing.
///
/// Validates the header strictly (the declared total length must equal the
/// buffer length) and every chunk header, then returns the JSON payload and
/// the optional BIN payload.
pub fn parse_glb(bytes: &[u8]) -> GltfResult<Glb<'_>> {
    if bytes.len() < HEADER_LEN {
        return Err(GltfError::parse(
            "glb.header",
            format!("{} bytes is shorter than the 12-byte header", bytes.len()),
        ));
    }

    let header = |offset| read_u32(bytes, offset).unwrap_or_default();
    let (magic, version, total_length) = (header(0), header(4), header(8));

    if magic != GLB_MAGIC {
        return Err(GltfError::parse(
            "glb.header.magic",
            format!("bad magic 0x{:08X}", magic),
        ));
    }
    if version != 2 {
        return Err(GltfError::parse(
            "glb.header.version",
            format!("unsupported container version {}", version),
        ));
    }
    if usize::try_from(total_length).ok() != Some(bytes.len()) {
        return Err(GltfError::parse(
            "glb.header.length",
            format!("header declares {} bytes, buffer has {}", total_length, bytes.len()),
        ));
    }

    let mut json: Option<&[u8]> = None;
    let mut bin: Option<&[u8]> = None;
    let mut offset = HEADER_LEN;
    let mut chunk_index = 0usize;

    while offset < bytes.len() {
        let path = format!("glb.chunk[{}]", chunk_index);

        let remaining = bytes.len() - offset;
        if remaining < CHUNK_HEADER_LEN {
            return Err(GltfError::parse(
                path,
                format!("{} trailing bytes cannot hold a chunk header", remaining),
            ));
        }

        let chunk_length = read_u32(bytes, offset).unwrap_or_default();
        let chunk_type = read_u32(bytes, offset + 4).unwrap_or_default();
        let payload_start = offset + CHUNK_HEADER_LEN;

        if chunk_length % 4 != 0 {
            return Err(GltfError::parse(
                path,
                format!("chunk length {} is not a multiple of 4", chunk_length),
            ));
        }
        let payload_len = usize::try_from(chunk_length)
            .ok()
            .filter(|&len| len <= bytes.len() - payload_start)
            .ok_or_else(|| {
                GltfError::parse(
                    path.clone(),
                    format!(
                        "chunk length {} exceeds the {} remaining bytes",
                        chunk_length,
                        bytes.len() - payload_start
                    ),
                )
            })?;
        let payload = &bytes[payload_start..payload_start + payload_len];

        match chunk_type {
            CHUNK_JSON => {
                if json.is_some() {
                    return Err(GltfError::parse(path, "second JSON chunk"));
                }
                json = Some(payload);
            }
            CHUNK_BIN => {
                if json.is_none() {
                    return Err(GltfError::parse(path, "BIN chunk before JSON chunk"));
                }
                if bin.is_some() {
                    return Err(GltfError::parse(path, "second BIN chunk"));
                }
                bin = Some(payload);
            }
            other => {
                if json.is_none() {
                    return Err(GltfError::parse(
                        path,
                        format!("first chunk must be JSON, found type 0x{:08X}", other),
                    ));
                }
                log::warn!("Skipping unknown GLB chunk type 0x{:08X} at {}", other, path);
            }
        }

        log::debug!("{}: type 0x{:08X}, {} bytes", path, chunk_type, payload_len);

        offset = payload_start + payload_len;
        chunk_index += 1;
    }

    let json = json.ok_or_else(|| GltfError::parse("glb", "missing JSON chunk"))?;
    Ok(Glb { json, bin })
}

/// Assemble a GLB from a JSON document and an optional binary payload.
///
/// The JSON chunk is padded with spaces and the BIN chunk with zeros to a
/// 4-byte boundary. Used to produce containers for tests and tools.
pub fn write_glb(json: &[u8], bin: Option<&[u8]>) -> Vec<u8> {
    fn padded(len: usize) -> usize {
        (len + 3) & !3
    }

    let json_len = padded(json.len());
    let bin_len = bin.map(|b| padded(b.len()));
    let total = HEADER_LEN
        + CHUNK_HEADER_LEN
        + json_len
        + bin_len.map_or(0, |len| CHUNK_HEADER_LEN + len);

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json_len as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(json);
    out.resize(out.len() + json_len - json.len(), b' ');

    if let (Some(bin), Some(bin_len)) = (bin, bin_len) {
        out.extend_from_slice(&(bin_len as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(bin);
        out.resize(out.len() + bin_len - bin.len(), 0);
    }

    out
}
