//! Accessor resolution and component decoding.
//!
//! [`AccessorView`] is a bounds-checked window over the bytes an accessor
//! describes. Every offset is computed with checked arithmetic and validated
//! against the declared buffer view and buffer lengths before any byte is
//! read, so a view can only ever index memory inside its buffer.

use tessel_math::{Aabb, Vec2, Vec3};

use crate::document::{Accessor, ComponentType, Document, ElementType};
use crate::error::{GltfError, GltfResult};

/// Upper bound on components per element (MAT4).
pub const MAX_COMPONENTS: usize = 16;

/// Validated view over an accessor's elements.
#[derive(Clone, Copy, Debug)]
pub struct AccessorView<'a> {
    /// Bytes from the first element's start to the last element's end
    data: &'a [u8],
    count: usize,
    stride: usize,
    elem_size: usize,
    component_type: ComponentType,
    element_type: ElementType,
    normalized: bool,
    index: usize,
}

impl Document {
    /// Resolve accessor `index` into a validated view.
    ///
    /// Fails with `Range` for dangling indices, `Parse` for layouts that do
    /// not fit their buffer view or overflow, and `Unsupported` for
    /// accessors without a buffer view.
    pub fn accessor_view(&self, index: usize) -> GltfResult<AccessorView<'_>> {
        let path = || format!("accessors[{}]", index);

        let accessor = self.accessors.get(index).ok_or_else(|| {
            GltfError::range(path(), format!("accessor {} of {}", index, self.accessors.len()))
        })?;

        let elem_size = element_size(accessor).ok_or_else(|| {
            GltfError::parse(path(), "element size overflows")
        })?;

        let Some(view_index) = accessor.buffer_view else {
            if accessor.count == 0 {
                return Ok(AccessorView::empty(accessor, elem_size, index));
            }
            return Err(GltfError::unsupported(
                format!("{}.bufferView", path()),
                "accessor without a buffer view",
            ));
        };

        let view = self.buffer_views.get(view_index).ok_or_else(|| {
            GltfError::range(
                format!("{}.bufferView", path()),
                format!("buffer view {} of {}", view_index, self.buffer_views.len()),
            )
        })?;

        let stride = if view.byte_stride == 0 { elem_size } else { view.byte_stride };
        if stride < elem_size {
            return Err(GltfError::parse(
                format!("bufferViews[{}].byteStride", view_index),
                format!("stride {} is smaller than element size {}", stride, elem_size),
            ));
        }

        // Offset first, then the last element relative to it, so a huge
        // count cannot overflow before the comparison.
        if accessor.byte_offset > view.byte_length {
            return Err(GltfError::parse(
                format!("{}.byteOffset", path()),
                format!(
                    "offset {} is past buffer view length {}",
                    accessor.byte_offset, view.byte_length
                ),
            ));
        }
        let end = if accessor.count == 0 {
            accessor.byte_offset
        } else {
            (accessor.count - 1)
                .checked_mul(stride)
                .and_then(|last| last.checked_add(elem_size))
                .and_then(|span| span.checked_add(accessor.byte_offset))
                .filter(|&end| end <= view.byte_length)
                .ok_or_else(|| {
                    GltfError::parse(
                        format!("{}.count", path()),
                        format!(
                            "{} elements of stride {} do not fit buffer view length {}",
                            accessor.count, stride, view.byte_length
                        ),
                    )
                })?
        };

        if accessor.count == 0 {
            return Ok(AccessorView::empty(accessor, elem_size, index));
        }

        let buffer = self.buffers.get(view.buffer).ok_or_else(|| {
            GltfError::range(
                format!("bufferViews[{}].buffer", view_index),
                format!("buffer {} of {}", view.buffer, self.buffers.len()),
            )
        })?;
        let data = buffer.data.as_deref().ok_or_else(|| {
            GltfError::invalid_argument(
                format!("buffers[{}]", view.buffer),
                "buffer data is not loaded",
            )
        })?;

        let view_end = view
            .byte_offset
            .checked_add(view.byte_length)
            .filter(|&e| e <= data.len())
            .ok_or_else(|| {
                GltfError::parse(
                    format!("bufferViews[{}]", view_index),
                    format!("view exceeds buffer of {} bytes", data.len()),
                )
            })?;
        let view_bytes = &data[view.byte_offset..view_end];

        Ok(AccessorView {
            data: &view_bytes[accessor.byte_offset..end],
            count: accessor.count,
            stride,
            elem_size,
            component_type: accessor.component_type,
            element_type: accessor.element_type,
            normalized: accessor.normalized,
            index,
        })
    }

    /// Componentwise bounds of a non-normalized f32 VEC3 accessor.
    pub fn accessor_bounds(&self, index: usize) -> GltfResult<Aabb> {
        let view = self.accessor_view(index)?;
        view.bounds()
    }
}

/// Component count times component size, with a checked multiply.
fn element_size(accessor: &Accessor) -> Option<usize> {
    accessor
        .element_type
        .component_count()
        .checked_mul(accessor.component_type.size())
}

/// Decode one component starting at `bytes[0]` to float.
///
/// Fails with `InvalidArgument` when `bytes` is shorter than
/// `component_type.size()`.
pub fn decode_component(
    bytes: &[u8],
    component_type: ComponentType,
    normalized: bool,
) -> GltfResult<f32> {
    if bytes.len() < component_type.size() {
        return Err(GltfError::invalid_argument(
            "component",
            format!(
                "{:?} needs {} bytes, got {}",
                component_type,
                component_type.size(),
                bytes.len()
            ),
        ));
    }

    let value = match component_type {
        ComponentType::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        ComponentType::U8 => {
            let v = f32::from(bytes[0]);
            if normalized { v / 255.0 } else { v }
        }
        ComponentType::U16 => {
            let v = f32::from(u16::from_le_bytes([bytes[0], bytes[1]]));
            if normalized { v / 65535.0 } else { v }
        }
        // Never normalized; converted through f64 so large values round once.
        ComponentType::U32 => {
            f64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])) as f32
        }
        ComponentType::I8 => {
            let v = bytes[0] as i8;
            match (normalized, v) {
                (true, i8::MIN) => -1.0,
                (true, v) => f32::from(v) / 127.0,
                (false, v) => f32::from(v),
            }
        }
        ComponentType::I16 => {
            let v = i16::from_le_bytes([bytes[0], bytes[1]]);
            match (normalized, v) {
                (true, i16::MIN) => -1.0,
                (true, v) => f32::from(v) / 32767.0,
                (false, v) => f32::from(v),
            }
        }
    };
    Ok(value)
}

impl<'a> AccessorView<'a> {
    fn empty(accessor: &Accessor, elem_size: usize, index: usize) -> Self {
        Self {
            data: &[],
            count: 0,
            stride: elem_size,
            elem_size,
            component_type: accessor.component_type,
            element_type: accessor.element_type,
            normalized: accessor.normalized,
            index,
        }
    }

    fn err_path(&self) -> String {
        format!("accessors[{}]", self.index)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn normalized(&self) -> bool {
        self.normalized
    }

    /// Raw bytes of element `index`.
    pub fn element_bytes(&self, index: usize) -> GltfResult<&'a [u8]> {
        if index >= self.count {
            return Err(GltfError::range(
                self.err_path(),
                format!("element {} of {}", index, self.count),
            ));
        }
        // index < count, so index * stride + elem_size <= data.len() was
        // established when the view was built.
        let start = index * self.stride;
        Ok(&self.data[start..start + self.elem_size])
    }

    /// Decode element `index` into `out`, returning the component count.
    ///
    /// `out` is untouched when the index is out of range.
    pub fn read(&self, index: usize, out: &mut [f32; MAX_COMPONENTS]) -> GltfResult<usize> {
        let bytes = self.element_bytes(index)?;
        let size = self.component_type.size();
        let components = self.element_type.component_count();
        let mut decoded = [0.0; MAX_COMPONENTS];
        for (c, slot) in decoded.iter_mut().take(components).enumerate() {
            *slot = decode_component(&bytes[c * size..], self.component_type, self.normalized)?;
        }
        out[..components].copy_from_slice(&decoded[..components]);
        Ok(components)
    }

    fn expect_shape(&self, element_type: ElementType) -> GltfResult<()> {
        if self.element_type != element_type {
            return Err(GltfError::parse(
                self.err_path(),
                format!("expected {:?} elements, found {:?}", element_type, self.element_type),
            ));
        }
        Ok(())
    }

    /// Decode a VEC3 element.
    pub fn read_vec3(&self, index: usize) -> GltfResult<Vec3> {
        self.expect_shape(ElementType::Vec3)?;
        let mut out = [0.0; MAX_COMPONENTS];
        self.read(index, &mut out)?;
        Ok(Vec3::new(out[0], out[1], out[2]))
    }

    /// Decode a VEC2 element.
    pub fn read_vec2(&self, index: usize) -> GltfResult<Vec2> {
        self.expect_shape(ElementType::Vec2)?;
        let mut out = [0.0; MAX_COMPONENTS];
        self.read(index, &mut out)?;
        Ok(Vec2::new(out[0], out[1]))
    }

    /// Read an index-buffer element as an exact integer.
    ///
    /// Only unsigned SCALAR accessors qualify.
    pub fn read_index(&self, index: usize) -> GltfResult<u32> {
        self.expect_shape(ElementType::Scalar)?;
        let bytes = self.element_bytes(index)?;
        match self.component_type {
            ComponentType::U8 => Ok(u32::from(bytes[0])),
            ComponentType::U16 => Ok(u32::from(u16::from_le_bytes([bytes[0], bytes[1]]))),
            ComponentType::U32 => Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            other => Err(GltfError::parse(
                self.err_path(),
                format!("index accessor has component type {:?}", other),
            )),
        }
    }

    /// Fold componentwise min/max over every element.
    ///
    /// Requires a non-normalized f32 VEC3 accessor.
    pub fn bounds(&self) -> GltfResult<Aabb> {
        if self.component_type != ComponentType::F32
            || self.element_type != ElementType::Vec3
            || self.normalized
        {
            return Err(GltfError::parse(
                self.err_path(),
                format!(
                    "bounds need non-normalized F32 Vec3, found {}{:?} {:?}",
                    if self.normalized { "normalized " } else { "" },
                    self.component_type,
                    self.element_type
                ),
            ));
        }

        let mut aabb = Aabb::EMPTY;
        for i in 0..self.count {
            aabb.grow(self.read_vec3(i)?);
        }
        Ok(aabb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Buffer, BufferView};
    use crate::error::ErrorKind;

    fn accessor(
        view: Option<usize>,
        offset: usize,
        ct: ComponentType,
        et: ElementType,
        count: usize,
    ) -> Accessor {
        Accessor {
            name: None,
            buffer_view: view,
            byte_offset: offset,
            component_type: ct,
            element_type: et,
            count,
            normalized: false,
        }
    }

    fn doc_with(bytes: Vec<u8>, view: BufferView, accessors: Vec<Accessor>) -> Document {
        Document {
            buffers: vec![Buffer {
                byte_length: bytes.len(),
                data: Some(bytes),
                ..Default::default()
            }],
            buffer_views: vec![view],
            accessors,
            ..Default::default()
        }
    }

    fn whole_view(len: usize, stride: usize) -> BufferView {
        BufferView {
            buffer: 0,
            byte_offset: 0,
            byte_length: len,
            byte_stride: stride,
            ..Default::default()
        }
    }

    fn decode(bytes: &[u8], component_type: ComponentType, normalized: bool) -> f32 {
        decode_component(bytes, component_type, normalized).unwrap()
    }

    #[test]
    fn test_decode_normalized_unsigned() {
        assert_eq!(decode(&[255], ComponentType::U8, true), 1.0);
        assert_eq!(decode(&[0], ComponentType::U8, true), 0.0);
        assert_eq!(decode(&[255], ComponentType::U8, false), 255.0);
        assert_eq!(decode(&[0xFF, 0xFF], ComponentType::U16, true), 1.0);
    }

    #[test]
    fn test_decode_normalized_signed() {
        assert_eq!(decode(&[0x80], ComponentType::I8, true), -1.0);
        assert_eq!(decode(&[0x81], ComponentType::I8, true), -1.0);
        assert_eq!(decode(&[0x7F], ComponentType::I8, true), 1.0);
        assert_eq!(decode(&[0x80], ComponentType::I8, false), -128.0);
        assert_eq!(decode(&0x8000u16.to_le_bytes(), ComponentType::I16, true), -1.0);
        assert_eq!(decode(&32767i16.to_le_bytes(), ComponentType::I16, true), 1.0);
    }

    #[test]
    fn test_decode_u32_ignores_normalized() {
        let bytes = 7u32.to_le_bytes();
        assert_eq!(decode(&bytes, ComponentType::U32, true), 7.0);
    }

    #[test]
    fn test_decode_large_u32() {
        // Above 2^24 f32 cannot hold every integer; the nearest value wins.
        let v = (1u32 << 24) + 1;
        assert_eq!(decode(&v.to_le_bytes(), ComponentType::U32, false), 16_777_216.0);

        let v = (1u32 << 24) + 3;
        assert_eq!(decode(&v.to_le_bytes(), ComponentType::U32, false), 16_777_220.0);

        assert_eq!(decode(&u32::MAX.to_le_bytes(), ComponentType::U32, false), 4_294_967_296.0);
    }

    #[test]
    fn test_decode_short_slice_is_invalid_argument() {
        let err = decode_component(&[1, 2], ComponentType::F32, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert!(decode_component(&[], ComponentType::U8, false).is_err());
        assert!(decode_component(&[1], ComponentType::I16, true).is_err());
    }

    #[test]
    fn test_f32_bits_preserved() {
        let values = [1.5f32, -0.0, f32::MIN_POSITIVE, 1.0e-42, f32::MAX];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let doc = doc_with(
            bytes,
            whole_view(20, 0),
            vec![accessor(Some(0), 0, ComponentType::F32, ElementType::Scalar, 5)],
        );
        let view = doc.accessor_view(0).unwrap();

        let mut out = [0.0; MAX_COMPONENTS];
        for (i, v) in values.iter().enumerate() {
            view.read(i, &mut out).unwrap();
            assert_eq!(out[0].to_bits(), v.to_bits());
            assert_eq!(out[0].to_le_bytes(), view.element_bytes(i).unwrap());
        }
    }

    #[test]
    fn test_strided_read() {
        // Two VEC2<u16> elements with 8-byte stride, interleaved with junk
        let bytes = vec![1, 0, 2, 0, 0xAA, 0xAA, 0xAA, 0xAA, 3, 0, 4, 0];
        let doc = doc_with(
            bytes,
            whole_view(12, 8),
            vec![accessor(Some(0), 0, ComponentType::U16, ElementType::Vec2, 2)],
        );
        let view = doc.accessor_view(0).unwrap();
        assert_eq!(view.stride(), 8);
        assert_eq!(view.read_vec2(1).unwrap(), Vec2::new(3.0, 4.0));
    }

    #[test]
    fn test_rejects_stride_smaller_than_element() {
        let doc = doc_with(
            vec![0; 64],
            whole_view(64, 4),
            vec![accessor(Some(0), 0, ComponentType::F32, ElementType::Vec3, 2)],
        );
        let err = doc.accessor_view(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.path(), "bufferViews[0].byteStride");
    }

    #[test]
    fn test_rejects_last_element_past_view() {
        let doc = doc_with(
            vec![0; 24],
            whole_view(24, 0),
            vec![
                accessor(Some(0), 0, ComponentType::F32, ElementType::Vec3, 3),
                accessor(Some(0), 4, ComponentType::F32, ElementType::Vec3, 2),
                accessor(Some(0), 28, ComponentType::F32, ElementType::Vec3, 0),
                accessor(Some(0), 0, ComponentType::F32, ElementType::Vec3, usize::MAX),
            ],
        );
        assert_eq!(doc.accessor_view(0).unwrap_err().path(), "accessors[0].count");
        assert_eq!(doc.accessor_view(1).unwrap_err().path(), "accessors[1].count");
        assert_eq!(doc.accessor_view(2).unwrap_err().path(), "accessors[2].byteOffset");
        assert_eq!(doc.accessor_view(3).unwrap_err().kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_exact_fit_is_accepted() {
        let doc = doc_with(
            vec![0; 24],
            whole_view(24, 0),
            vec![accessor(Some(0), 12, ComponentType::F32, ElementType::Vec3, 1)],
        );
        let view = doc.accessor_view(0).unwrap();
        assert_eq!(view.count(), 1);
        assert!(view.element_bytes(1).is_err());
    }

    #[test]
    fn test_empty_and_dangling() {
        let doc = doc_with(
            vec![0; 4],
            whole_view(4, 0),
            vec![
                accessor(None, 0, ComponentType::F32, ElementType::Scalar, 0),
                accessor(None, 0, ComponentType::F32, ElementType::Scalar, 3),
                accessor(Some(5), 0, ComponentType::F32, ElementType::Scalar, 1),
            ],
        );
        assert!(doc.accessor_view(0).unwrap().is_empty());
        assert_eq!(doc.accessor_view(1).unwrap_err().kind(), ErrorKind::Unsupported);
        assert_eq!(doc.accessor_view(2).unwrap_err().kind(), ErrorKind::Range);
        assert_eq!(doc.accessor_view(9).unwrap_err().kind(), ErrorKind::Range);
    }

    #[test]
    fn test_missing_buffer_data() {
        let mut doc = doc_with(
            vec![0; 4],
            whole_view(4, 0),
            vec![accessor(Some(0), 0, ComponentType::F32, ElementType::Scalar, 1)],
        );
        doc.buffers[0].data = None;
        let err = doc.accessor_view(0).unwrap_err();
        assert_eq!(err.path(), "buffers[0]");
    }

    #[test]
    fn test_read_out_of_range_leaves_output_untouched() {
        let doc = doc_with(
            vec![0; 4],
            whole_view(4, 0),
            vec![accessor(Some(0), 0, ComponentType::F32, ElementType::Scalar, 1)],
        );
        let view = doc.accessor_view(0).unwrap();
        let mut out = [42.0; MAX_COMPONENTS];
        assert_eq!(view.read(1, &mut out).unwrap_err().kind(), ErrorKind::Range);
        assert!(out.iter().all(|&v| v == 42.0));
    }

    #[test]
    fn test_read_index_types() {
        let doc = doc_with(
            vec![7, 0, 9, 0],
            whole_view(4, 0),
            vec![
                accessor(Some(0), 0, ComponentType::U16, ElementType::Scalar, 2),
                accessor(Some(0), 0, ComponentType::I16, ElementType::Scalar, 2),
            ],
        );
        let view = doc.accessor_view(0).unwrap();
        assert_eq!(view.read_index(1).unwrap(), 9);
        let err = doc.accessor_view(1).unwrap().read_index(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_bounds_fold() {
        let points = [[1.0f32, -2.0, 3.0], [-1.0, 5.0, 0.0]];
        let bytes: Vec<u8> = points.iter().flatten().flat_map(|v| v.to_le_bytes()).collect();
        let doc = doc_with(
            bytes,
            whole_view(24, 0),
            vec![
                accessor(Some(0), 0, ComponentType::F32, ElementType::Vec3, 2),
                accessor(Some(0), 0, ComponentType::F32, ElementType::Vec2, 3),
            ],
        );

        let aabb = doc.accessor_bounds(0).unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 5.0, 3.0));
        assert_eq!(doc.accessor_bounds(1).unwrap_err().kind(), ErrorKind::Parse);
    }
}
