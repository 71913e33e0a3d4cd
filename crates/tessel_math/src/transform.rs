// Transform utilities for Mat4
//
// Node transforms are column-major, column-vector: world = parent * local,
// local = T * R * S.

use glam::{Mat4, Quat, Vec3, Vec4};
use crate::Aabb;

/// Build the local matrix `T * R * S` from translation, rotation and scale.
///
/// The quaternion is expanded as given; it is not renormalized, so a
/// non-unit quaternion contributes its squared length to the basis.
pub fn trs_matrix(translation: Vec3, rotation: Quat, scale: Vec3) -> Mat4 {
    let (x, y, z, w) = (rotation.x, rotation.y, rotation.z, rotation.w);

    let xx = x * x;
    let yy = y * y;
    let zz = z * z;
    let xy = x * y;
    let xz = x * z;
    let yz = y * z;
    let wx = w * x;
    let wy = w * y;
    let wz = w * z;

    // Rotation basis columns, each scaled by its axis scale
    let x_axis = Vec4::new(1.0 - 2.0 * (yy + zz), 2.0 * (xy + wz), 2.0 * (xz - wy), 0.0) * scale.x;
    let y_axis = Vec4::new(2.0 * (xy - wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz + wx), 0.0) * scale.y;
    let z_axis = Vec4::new(2.0 * (xz + wy), 2.0 * (yz - wx), 1.0 - 2.0 * (xx + yy), 0.0) * scale.z;
    let w_axis = translation.extend(1.0);

    Mat4::from_cols(x_axis, y_axis, z_axis, w_axis)
}

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }

        let mut result = Aabb::EMPTY;
        for corner in aabb.corners() {
            result.grow(self.transform_point3(corner));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat_close(a: Mat4, b: Mat4) {
        let (a, b) = (a.to_cols_array(), b.to_cols_array());
        for i in 0..16 {
            assert!((a[i] - b[i]).abs() < 1e-5, "element {}: {} vs {}", i, a[i], b[i]);
        }
    }

    #[test]
    fn test_trs_identity() {
        let m = trs_matrix(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);
        assert_eq!(m, Mat4::IDENTITY);
    }

    #[test]
    fn test_trs_matches_glam_for_unit_quaternion() {
        let t = Vec3::new(1.0, 2.0, 3.0);
        let r = Quat::from_rotation_y(std::f32::consts::FRAC_PI_3);
        let s = Vec3::new(2.0, 0.5, 4.0);

        let ours = trs_matrix(t, r, s);
        let glam = Mat4::from_scale_rotation_translation(s, r, t);
        assert_mat_close(ours, glam);
    }

    #[test]
    fn test_trs_is_translate_rotate_scale_order() {
        let t = Vec3::new(10.0, 0.0, 0.0);
        let r = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let s = Vec3::splat(2.0);

        let composed = Mat4::from_translation(t) * Mat4::from_quat(r) * Mat4::from_scale(s);
        assert_mat_close(trs_matrix(t, r, s), composed);

        // (1,0,0) -> scaled to (2,0,0) -> rotated to (0,2,0) -> translated
        let p = trs_matrix(t, r, s).transform_point3(Vec3::X);
        assert!((p - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_trs_does_not_normalize_quaternion() {
        // Zero quaternion expands to an identity rotation block
        let m = trs_matrix(Vec3::ZERO, Quat::from_xyzw(0.0, 0.0, 0.0, 0.0), Vec3::ONE);
        assert_eq!(m, Mat4::IDENTITY);

        // w only enters the basis multiplied by x, y or z
        let m = trs_matrix(Vec3::ZERO, Quat::from_xyzw(0.0, 0.0, 0.0, 2.0), Vec3::ONE);
        assert_eq!(m, Mat4::IDENTITY);

        // A non-unit axis component is not rescaled
        let m = trs_matrix(Vec3::ZERO, Quat::from_xyzw(2.0, 0.0, 0.0, 0.0), Vec3::ONE);
        assert_eq!(m.y_axis.y, 1.0 - 2.0 * 4.0);
    }

    #[test]
    fn test_transform_aabb_translation() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let mat = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        let out = mat.transform_aabb(&aabb);

        assert_eq!(out.min, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(out.max, Vec3::new(6.0, 1.0, 1.0));
        assert!(mat.transform_aabb(&Aabb::EMPTY).is_empty());
    }
}
