//! Shader-visible data blocks.
//!
//! These structures must match the GLSL layouts in `shaders/default.vert`
//! and `shaders/default.frag` exactly. All of them are `#[repr(C)]` and
//! implement `Pod` and `Zeroable` for byte casting.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use cadence_scene::Transform;

/// Per-frame uniform data, bound at set 0, binding 0.
///
/// # Memory Layout
///
/// - Offset 0: projection * view (64 bytes)
/// - Offset 64: light direction, w unused (16 bytes)
/// - Total size: 80 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GlobalUbo {
    /// Combined view-projection matrix.
    pub projection_view: Mat4,
    /// Direction towards the light in world space.
    pub light_direction: Vec4,
}

impl GlobalUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates the block with a normalized light direction.
    pub fn new(projection_view: Mat4, light_direction: Vec3) -> Self {
        Self {
            projection_view,
            light_direction: light_direction.normalize_or_zero().extend(0.0),
        }
    }
}

/// Per-object push-constant block.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: normal matrix in the upper 3x3, entity color in the fourth
///   column (64 bytes)
/// - Total size: 128 bytes, the minimum every Vulkan device guarantees
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ObjectPushConstants {
    /// Model matrix (object to world space).
    pub model: Mat4,
    /// Normal matrix in the upper 3x3. Column 3 holds the color tint as
    /// `(r, g, b, 1)`.
    pub normal_matrix: Mat4,
}

impl ObjectPushConstants {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(transform: &Transform, color: Vec3) -> Self {
        let mut normal_matrix = Mat4::from_mat3(transform.normal_matrix());
        normal_matrix.w_axis = color.extend(1.0);
        Self {
            model: transform.mat4(),
            normal_matrix,
        }
    }
}
