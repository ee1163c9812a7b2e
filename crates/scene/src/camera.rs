//! Camera matrices.
//!
//! Projections map depth to Vulkan's 0..1 range and flip Y so that +Y is up
//! on screen.

use glam::{Mat4, Vec3};

/// Projection and view matrices, read-only while a frame is recorded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Right-handed perspective projection. `fov_y` is in radians.
    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        debug_assert!(aspect > 0.0, "aspect ratio must be positive");
        self.projection = flip_y(Mat4::perspective_rh(fov_y, aspect, near, far));
    }

    /// Places the camera at `position` looking at `target`, with +Y up.
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3) {
        self.view = Mat4::look_at_rh(position, target, Vec3::Y);
    }

    #[inline]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    #[inline]
    pub fn projection_view(&self) -> Mat4 {
        self.projection * self.view
    }
}

fn flip_y(mut projection: Mat4) -> Mat4 {
    projection.y_axis.y *= -1.0;
    projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_perspective_depth_range() {
        let mut camera = Camera::new();
        camera.set_perspective(60f32.to_radians(), 1.0, 0.1, 100.0);

        let near = camera.projection() * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far = camera.projection() * Vec4::new(0.0, 0.0, -100.0, 1.0);
        assert!((near.z / near.w).abs() < EPSILON);
        assert!((far.z / far.w - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_projection_flips_y() {
        let mut camera = Camera::new();
        camera.set_perspective(1.0, 1.0, 0.1, 10.0);

        let up = camera.projection() * Vec4::new(0.0, 1.0, -1.0, 1.0);
        assert!(up.y / up.w < 0.0);
    }

    #[test]
    fn test_view_target_centers_target() {
        let mut camera = Camera::new();
        camera.set_view_target(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO);

        let target = camera.view().transform_point3(Vec3::ZERO);
        assert!(target.x.abs() < EPSILON);
        assert!(target.y.abs() < EPSILON);
        assert!(target.z < 0.0);
    }

    #[test]
    fn test_projection_view_composition() {
        let mut camera = Camera::new();
        camera.set_perspective(1.0, 1.5, 0.1, 50.0);
        camera.set_view_target(Vec3::new(1.0, 0.0, 0.0), Vec3::NEG_Z);

        assert_eq!(
            camera.projection_view(),
            camera.projection() * camera.view()
        );
    }
}
