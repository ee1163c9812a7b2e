//! Spatial transform of a renderable entity.
//!
//! Rotation is stored as Euler angles in radians and composed in Y, X, Z
//! order, so `mat4()` is `T * Ry * Rx * Rz * S`.

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

/// Translation, non-uniform scale and Euler rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub scale: Vec3,
    /// Euler angles in radians, applied as yaw (Y), pitch (X), roll (Z).
    pub rotation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    /// Rotation as a quaternion, Y then X then Z.
    #[inline]
    pub fn orientation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y,
            self.rotation.x,
            self.rotation.z,
        )
    }

    /// Model matrix.
    pub fn mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation(), self.translation)
    }

    /// Normal matrix: `R * S⁻¹`, rescaled by the geometric mean of the scale.
    ///
    /// This is the inverse-transpose of the model matrix's upper 3x3 times
    /// `cbrt(|det|)`, so normals stay perpendicular under non-uniform scale
    /// and a uniform scale cancels to the rotation alone. A degenerate
    /// transform (zero scale on any axis) yields the identity instead of NaNs.
    pub fn normal_matrix(&self) -> Mat3 {
        const EPSILON: f32 = 1e-6;

        let volume = (self.scale.x * self.scale.y * self.scale.z).abs();
        if volume < EPSILON {
            return Mat3::IDENTITY;
        }
        let mean = volume.cbrt();
        Mat3::from_quat(self.orientation()) * Mat3::from_diagonal(Vec3::splat(mean) / self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_mat3(a: Mat3, b: Mat3) -> bool {
        a.to_cols_array()
            .iter()
            .zip(b.to_cols_array().iter())
            .all(|(x, y)| (x - y).abs() < EPSILON)
    }

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPSILON
    }

    #[test]
    fn test_transform_default() {
        let t = Transform::default();
        assert_eq!(t.translation, Vec3::ZERO);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.rotation, Vec3::ZERO);
        assert_eq!(t.mat4(), Mat4::IDENTITY);
        assert_eq!(t.normal_matrix(), Mat3::IDENTITY);
    }

    #[test]
    fn test_mat4_without_rotation_or_scale_is_translation() {
        for translation in [
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-4.5, 0.0, 10.0),
            Vec3::ZERO,
        ] {
            let t = Transform::new().with_translation(translation);
            assert_eq!(t.mat4(), Mat4::from_translation(translation));
        }
    }

    #[test]
    fn test_rotation_order_is_yxz() {
        let rotation = Vec3::new(0.3, 1.1, -0.7);
        let t = Transform::new().with_rotation(rotation);

        let expected = Mat4::from_rotation_y(rotation.y)
            * Mat4::from_rotation_x(rotation.x)
            * Mat4::from_rotation_z(rotation.z);
        assert!(approx_eq_mat3(
            Mat3::from_mat4(t.mat4()),
            Mat3::from_mat4(expected)
        ));
    }

    #[test]
    fn test_yaw_turns_forward_axis() {
        let t = Transform::new().with_rotation(Vec3::new(0.0, FRAC_PI_2, 0.0));
        let forward = t.mat4().transform_vector3(Vec3::NEG_Z);
        assert!(approx_eq_vec3(forward, Vec3::NEG_X));
    }

    #[test]
    fn test_normal_matrix_uniform_scale_is_rotation() {
        let rotation = Vec3::new(0.4, -0.9, 0.2);
        let t = Transform::new()
            .with_rotation(rotation)
            .with_scale(Vec3::splat(3.0))
            .with_translation(Vec3::new(5.0, -1.0, 2.0));

        let rotation_only = Mat3::from_quat(t.orientation());
        assert!(approx_eq_mat3(t.normal_matrix(), rotation_only));
    }

    #[test]
    fn test_normal_matrix_non_uniform_scale() {
        let t = Transform::new()
            .with_rotation(Vec3::new(0.2, 0.5, -0.3))
            .with_scale(Vec3::new(1.0, 2.0, 4.0));
        let linear = Mat3::from_mat4(t.mat4());
        assert!(approx_eq_mat3(
            t.normal_matrix(),
            linear.inverse().transpose() * 2.0
        ));

        // A surface tilted 45 degrees keeps its normal perpendicular after stretching.
        let tangent = linear * Vec3::new(1.0, 1.0, 0.0);
        let normal = t.normal_matrix() * Vec3::new(1.0, -1.0, 0.0);
        assert!(tangent.dot(normal).abs() < EPSILON);
    }

    #[test]
    fn test_normal_matrix_degenerate_scale() {
        let t = Transform::new().with_scale(Vec3::new(1.0, 0.0, 1.0));
        let normal = t.normal_matrix();
        assert_eq!(normal, Mat3::IDENTITY);
        assert!(normal.to_cols_array().iter().all(|v| v.is_finite()));
    }
}
