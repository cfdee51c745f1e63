use std::collections::{BTreeMap, BTreeSet};

use glam::{IVec3, Quat, Vec3};
use serde::Serialize;

use crate::autofield::{Autofield, FieldTag};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectorBoundary {
    pub kernel: Vec3,
    pub vertices: Vec<Vec3>,
    /// One autofield per boundary triangle: an `IntVector3` of vertex
    /// indices, wall-shape tags, and optionally the `Identifier` of the
    /// plane the triangle belongs to.
    pub triangles: Vec<Autofield>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectorTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for SectorTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl SectorTransform {
    /// Scale, then rotate, then translate a sector-local point.
    pub fn apply(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * point)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sector {
    pub boundary: SectorBoundary,
    pub transform: SectorTransform,
    pub cell_floor: f32,
    pub cell_height: f32,
    pub sector_id: i32,
    pub tags: Autofield,
}

impl Sector {
    pub fn ceiling(&self) -> f32 {
        self.cell_floor + self.cell_height
    }

    /// Look up the three corners named by a triangle's vertex indices. The
    /// first index that falls outside the vertex list is returned as the
    /// error.
    pub fn resolve_triangle(&self, indices: IVec3) -> Result<[Vec3; 3], i32> {
        let vertex = |index: i32| {
            usize::try_from(index)
                .ok()
                .and_then(|slot| self.boundary.vertices.get(slot).copied())
                .ok_or(index)
        };
        Ok([vertex(indices.x)?, vertex(indices.y)?, vertex(indices.z)?])
    }

    /// Check that every triangle carrying vertex indices stays inside this
    /// sector's vertex list. Returns `(triangle, bad index)` on failure.
    pub fn check_triangles(&self) -> Result<(), (usize, i32)> {
        for (slot, triangle) in self.boundary.triangles.iter().enumerate() {
            if let Some(indices) = triangle.int_vector3() {
                self.resolve_triangle(indices)
                    .map_err(|index| (slot, index))?;
            }
        }
        Ok(())
    }

    pub fn baked_vertices(&self) -> Vec<Vec3> {
        self.boundary
            .vertices
            .iter()
            .map(|vertex| self.transform.apply(*vertex))
            .collect()
    }

    pub fn baked_kernel(&self) -> Vec3 {
        self.transform.apply(self.boundary.kernel)
    }

    /// Apply the transform to the boundary in place and reset it to identity.
    pub fn bake(&mut self) {
        self.boundary.vertices = self.baked_vertices();
        self.boundary.kernel = self.baked_kernel();
        self.transform = SectorTransform::default();
    }
}

/// Trigger/partition plane assembled from every sector triangle that names
/// the same line id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaneDef {
    pub id: i32,
    pub vertices: Vec<Vec3>,
    pub tags: BTreeSet<FieldTag>,
}

impl PlaneDef {
    pub fn new(id: i32, tags: BTreeSet<FieldTag>) -> Self {
        Self {
            id,
            vertices: Vec::new(),
            tags,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.vertices
            .chunks_exact(3)
            .map(|corners| [corners[0], corners[1], corners[2]])
    }
}

/// The level model handed to geometry building.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelData {
    pub sectors: Vec<Sector>,
    pub plane_defs: BTreeMap<i32, PlaneDef>,
}

impl LevelData {
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty() && self.plane_defs.is_empty()
    }

    pub fn sector(&self, sector_id: i32) -> Option<&Sector> {
        self.sectors
            .iter()
            .find(|sector| sector.sector_id == sector_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn triangle(indices: [i32; 3]) -> Autofield {
        let mut field = Autofield::new();
        field
            .insert(Value::IntVector3(IVec3::from_array(indices)))
            .expect("indices");
        field
    }

    fn unit_sector() -> Sector {
        Sector {
            boundary: SectorBoundary {
                kernel: Vec3::new(0.25, 0.25, 0.0),
                vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                triangles: vec![triangle([0, 1, 2])],
            },
            cell_floor: 1.0,
            cell_height: 2.5,
            ..Sector::default()
        }
    }

    #[test]
    fn resolves_triangle_corners() {
        let sector = unit_sector();
        let corners = sector
            .resolve_triangle(IVec3::new(2, 0, 1))
            .expect("in range");
        assert_eq!(corners, [Vec3::Y, Vec3::ZERO, Vec3::X]);
        assert_eq!(sector.resolve_triangle(IVec3::new(0, 3, 1)), Err(3));
        assert_eq!(sector.resolve_triangle(IVec3::new(-1, 0, 1)), Err(-1));
        assert!((sector.ceiling() - 3.5).abs() < f32::EPSILON);
    }

    #[test]
    fn check_triangles_reports_offending_slot() {
        let mut sector = unit_sector();
        assert!(sector.check_triangles().is_ok());
        sector.boundary.triangles.push(triangle([0, 1, 7]));
        assert_eq!(sector.check_triangles(), Err((1, 7)));
    }

    #[test]
    fn bake_applies_scale_rotation_translation() {
        let mut sector = unit_sector();
        sector.transform = SectorTransform {
            position: Vec3::new(10.0, 0.0, 0.0),
            rotation: Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(2.0),
        };
        sector.bake();
        let moved = sector.boundary.vertices[1];
        assert!((moved - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-5, "{moved}");
        assert_eq!(sector.transform, SectorTransform::default());
    }

    #[test]
    fn plane_def_groups_vertices_into_triangles() {
        let mut plane = PlaneDef::new(3, BTreeSet::new());
        plane.vertices.extend([Vec3::ZERO, Vec3::X, Vec3::Y]);
        plane.vertices.extend([Vec3::Z, Vec3::X, Vec3::Y]);
        assert_eq!(plane.triangle_count(), 2);
        assert_eq!(plane.triangles().nth(1), Some([Vec3::Z, Vec3::X, Vec3::Y]));
    }
}
