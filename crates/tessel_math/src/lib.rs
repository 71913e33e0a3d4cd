// Re-export glam for convenience
pub use glam::*;

// Tessel math types
mod aabb;
mod transform;
pub use aabb::Aabb;
pub use transform::{trs_matrix, Mat4Ext};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mat4_column_major_layout() {
        let m = Mat4::from_cols_array(&[
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            5.0, 6.0, 7.0, 1.0,
        ]);
        assert_eq!(m.w_axis.truncate(), Vec3::new(5.0, 6.0, 7.0));
    }
}
