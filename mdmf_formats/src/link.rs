use std::collections::BTreeMap;

use crate::autofield::Autofield;
use crate::error::LinkError;
use crate::level::{PlaneDef, Sector};

/// Build one [`PlaneDef`] per `Lines` entry and collect into it every sector
/// triangle that names the entry's id. Vertices are taken from the sector's
/// untransformed boundary.
pub fn link_planes(
    line_defs: &BTreeMap<i32, Autofield>,
    sectors: &[Sector],
) -> Result<BTreeMap<i32, PlaneDef>, LinkError> {
    let mut planes: BTreeMap<i32, PlaneDef> = line_defs
        .iter()
        .map(|(&id, field)| (id, PlaneDef::new(id, field.tags().clone())))
        .collect();

    for sector in sectors {
        for triangle in &sector.boundary.triangles {
            let (Some(plane_id), Some(indices)) = (triangle.identifier(), triangle.int_vector3())
            else {
                continue;
            };
            let plane = planes.get_mut(&plane_id).ok_or(LinkError::UnknownPlane {
                plane_id,
                sector_id: sector.sector_id,
            })?;
            let corners =
                sector
                    .resolve_triangle(indices)
                    .map_err(|index| LinkError::VertexOutOfRange {
                        sector_id: sector.sector_id,
                        index,
                        count: sector.boundary.vertices.len(),
                    })?;
            plane.vertices.extend(corners);
        }
    }

    for plane in planes.values() {
        log::debug!(
            "plane {} linked with {} triangles",
            plane.id,
            plane.triangle_count()
        );
    }
    Ok(planes)
}
