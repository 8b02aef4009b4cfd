use glam::{Mat4, Vec3, Vec4};

use crate::log::LogCategory;
use crate::log_warning;

const LOG: LogCategory = LogCategory::new("polygon_light");

/// Maximum vertex count of a polygon light. Surfaces with more vertices are
/// clipped (with a warning) down to this count by [`PolygonLight::from_vertices`].
pub const MAX_POLYGON_LIGHT_VERTICES: usize = 7;

/// An emissive surface participating as an area light in the ray-tracing
/// pass.
#[derive(Clone, Debug)]
pub struct PolygonLight {
    pub vertices: [Vec3; MAX_POLYGON_LIGHT_VERTICES],
    pub vertex_count: u8,
    /// Plane equation `(normal, distance)`.
    pub plane: Vec4,
    pub center: Vec3,
    pub area: f32,
    pub emissive_radiance: Vec3,
    /// Static emissive surfaces are added at map load and persist; dynamic
    /// ones (animated textures, moving brushes) are appended per frame and
    /// discarded on the next `frame_begin`.
    pub dynamic: bool,
    pub transform: Option<Mat4>,
}

impl PolygonLight {
    /// Builds a polygon light from a surface's world-space vertex loop,
    /// computing its plane, centroid, and area. Surfaces with more than
    /// [`MAX_POLYGON_LIGHT_VERTICES`] vertices are clipped down to that
    /// count, with a warning, before anything else is computed.
    pub fn from_vertices(vertices: &[Vec3], emissive_radiance: Vec3, dynamic: bool, transform: Option<Mat4>) -> Self {
        debug_assert!(vertices.len() >= 3, "a polygon light needs at least 3 vertices");

        if vertices.len() > MAX_POLYGON_LIGHT_VERTICES {
            log_warning!(LOG, "polygon light surface has {} vertices, clipping to {MAX_POLYGON_LIGHT_VERTICES}", vertices.len());
        }
        let vertex_count = vertices.len().min(MAX_POLYGON_LIGHT_VERTICES);
        let vertices = &vertices[..vertex_count];

        let mut stored = [Vec3::ZERO; MAX_POLYGON_LIGHT_VERTICES];
        stored[..vertices.len()].copy_from_slice(vertices);

        let center = vertices.iter().copied().sum::<Vec3>() / vertices.len() as f32;

        // Fan triangulation around the centroid for area and the normal
        // (Newell's method equivalent for a small convex polygon).
        let mut normal = Vec3::ZERO;
        let mut area = 0.0f32;
        for i in 0..vertices.len() {
            let a = vertices[i];
            let b = vertices[(i + 1) % vertices.len()];
            let cross = (a - center).cross(b - center);
            area += cross.length() * 0.5;
            normal += cross;
        }
        let normal = normal.normalize_or_zero();
        let distance = -normal.dot(center);

        Self {
            vertices: stored,
            vertex_count: vertices.len() as u8,
            plane: Vec4::new(normal.x, normal.y, normal.z, distance),
            center,
            area,
            emissive_radiance,
            dynamic,
            transform,
        }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices[..self.vertex_count as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_area_and_center_are_correct() {
        let verts = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let poly = PolygonLight::from_vertices(&verts, Vec3::new(10.0, 10.0, 10.0), true, None);
        assert!((poly.area - 1.0).abs() < 1e-4);
        assert!((poly.center - Vec3::new(0.5, 0.5, 0.0)).length() < 1e-4);
        assert!((poly.plane.truncate().normalize() - Vec3::Z).length() < 1e-3
            || (poly.plane.truncate().normalize() + Vec3::Z).length() < 1e-3);
    }

    #[test]
    fn surfaces_with_too_many_vertices_are_clipped_to_the_cap() {
        let verts: Vec<Vec3> = (0..12)
            .map(|i| {
                let angle = i as f32 / 12.0 * std::f32::consts::TAU;
                Vec3::new(angle.cos(), angle.sin(), 0.0)
            })
            .collect();
        let poly = PolygonLight::from_vertices(&verts, Vec3::ONE, false, None);
        assert_eq!(poly.vertex_count as usize, MAX_POLYGON_LIGHT_VERTICES);
        assert_eq!(poly.vertices().len(), MAX_POLYGON_LIGHT_VERTICES);
    }
}
