//! Built-in demo geometry.

use glam::{Vec2, Vec3};

use cadence_rhi::Vertex;

/// Faces of the unit cube: outward normal, tangent axes and color.
const FACES: [(Vec3, Vec3, Vec3, Vec3); 6] = [
    // +X
    (Vec3::X, Vec3::NEG_Z, Vec3::Y, Vec3::new(0.8, 0.8, 0.1)),
    // -X
    (Vec3::NEG_X, Vec3::Z, Vec3::Y, Vec3::new(0.9, 0.9, 0.9)),
    // +Y
    (Vec3::Y, Vec3::X, Vec3::NEG_Z, Vec3::new(0.9, 0.6, 0.1)),
    // -Y
    (Vec3::NEG_Y, Vec3::X, Vec3::Z, Vec3::new(0.8, 0.1, 0.1)),
    // +Z
    (Vec3::Z, Vec3::X, Vec3::Y, Vec3::new(0.1, 0.1, 0.8)),
    // -Z
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y, Vec3::new(0.1, 0.8, 0.1)),
];

/// Cube spanning `[-0.5, 0.5]` on every axis, four vertices per face.
pub fn cube() -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v, color) in FACES {
        let base = vertices.len() as u32;
        let center = normal * 0.5;
        for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            vertices.push(Vertex::new(
                center + u * su + v * sv,
                color,
                normal,
                Vec2::new(su + 0.5, sv + 0.5),
            ));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_counts() {
        let (vertices, indices) = cube();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn test_cube_vertices_on_their_face() {
        let (vertices, _) = cube();
        for vertex in vertices {
            assert!((vertex.position.dot(vertex.normal) - 0.5).abs() < 1e-6);
            assert!(vertex.position.abs().max_element() <= 0.5 + 1e-6);
        }
    }
}
