// Map - merged triangle soup of one game map.
//
// Built once from the parsed client entities, read-only afterwards.
// Source assets are Z-up; everything stored here is Y-up so the grid
// passes iterate over X/Z with Y as height.

use crate::error::GeodataError;
use crate::geometry::{Aabb, Triangle, Vec3};

/// Contiguous index sub-range contributed by one source entity, kept
/// for spatial filtering.
#[derive(Clone, Copy, Debug, Default)]
struct EntityView {
    start_index: usize,
    index_count: usize,
    bounding_box: Aabb,
}

pub struct Map {
    name: String,
    bounding_box: Aabb,
    vertices: Vec<Vec3>,
    indices: Vec<u32>,
    entities: Vec<EntityView>,
}

impl Map {
    /// `bounding_box` is in the source (Z-up) convention.
    pub fn new(name: &str, bounding_box: Aabb) -> Self {
        Self {
            name: name.to_string(),
            bounding_box: bounding_box.swap_y_with_z(),
            vertices: Vec::new(),
            indices: Vec::new(),
            entities: Vec::new(),
        }
    }

    /// Append one entity's triangles. Positions and normals are in the
    /// source (Z-up) convention; winding is fixed against the averaged
    /// vertex normals so face normals of floors end up pointing up.
    pub fn add_entity(
        &mut self,
        positions: &[Vec3],
        normals: &[Vec3],
        indices: &[u32],
    ) -> Result<(), GeodataError> {
        if positions.len() != normals.len() {
            return Err(GeodataError::MalformedMesh(format!(
                "entity has {} positions but {} normals",
                positions.len(),
                normals.len()
            )));
        }
        if indices.len() % 3 != 0 {
            return Err(GeodataError::MalformedMesh(format!(
                "entity index count {} is not divisible by 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(GeodataError::MalformedMesh(format!(
                "entity index {} out of bounds ({} vertices)",
                bad,
                positions.len()
            )));
        }

        let vertex_base = self.vertices.len() as u32;
        let mut entity_view = EntityView {
            start_index: self.indices.len(),
            ..Default::default()
        };

        let mut swapped_normals = Vec::with_capacity(normals.len());
        for (position, normal) in positions.iter().zip(normals) {
            // Swap Y-up with Z-up
            let vertex = Vec3::new(position.x, position.z, position.y);
            self.vertices.push(vertex);
            swapped_normals.push(Vec3::new(normal.x, normal.z, normal.y).normalized());

            if entity_view.index_count == 0 && self.vertices.len() == vertex_base as usize + 1 {
                entity_view.bounding_box = Aabb::from_point(vertex);
            } else {
                entity_view.bounding_box.merge(vertex);
            }
        }

        for triangle in indices.chunks_exact(3) {
            let (i0, i1, i2) = (triangle[0], triangle[1], triangle[2]);

            // Try to fix winding
            let average_normal = swapped_normals[i0 as usize]
                .add(swapped_normals[i1 as usize])
                .add(swapped_normals[i2 as usize])
                .scale(1.0 / 3.0)
                .normalized();

            let face_normal = Triangle::new(
                self.vertices[(vertex_base + i2) as usize],
                self.vertices[(vertex_base + i1) as usize],
                self.vertices[(vertex_base + i0) as usize],
            )
            .normal();

            if average_normal.dot(face_normal) >= 0.0 {
                self.indices.push(vertex_base + i2);
                self.indices.push(vertex_base + i1);
                self.indices.push(vertex_base + i0);
            } else {
                self.indices.push(vertex_base + i0);
                self.indices.push(vertex_base + i1);
                self.indices.push(vertex_base + i2);
            }

            entity_view.index_count += 3;
        }

        self.entities.push(entity_view);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bounding box in the source (Z-up) convention.
    pub fn bounding_box(&self) -> Aabb {
        self.bounding_box.swap_y_with_z()
    }

    /// Bounding box in the pipeline (Y-up) convention.
    pub fn internal_bounding_box(&self) -> Aabb {
        self.bounding_box
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Triangle by index into the flattened index list.
    pub fn triangle(&self, index: usize) -> Triangle {
        Triangle::new(
            self.vertices[self.indices[index * 3] as usize],
            self.vertices[self.indices[index * 3 + 1] as usize],
            self.vertices[self.indices[index * 3 + 2] as usize],
        )
    }

    /// Triangles whose bounding box overlaps `query` (Y-up convention),
    /// pre-filtered by entity bounding box.
    pub fn triangles_intersecting(&self, query: &Aabb) -> Vec<Triangle> {
        let mut triangles = Vec::new();

        for entity_view in &self.entities {
            if !query.intersects(&entity_view.bounding_box) {
                continue;
            }

            for index in (entity_view.start_index..entity_view.start_index + entity_view.index_count)
                .step_by(3)
            {
                let triangle = Triangle::new(
                    self.vertices[self.indices[index] as usize],
                    self.vertices[self.indices[index + 1] as usize],
                    self.vertices[self.indices[index + 2] as usize],
                );

                if query.intersects(&triangle.bounding_box()) {
                    triangles.push(triangle);
                }
            }
        }

        triangles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_entity() -> (Vec<Vec3>, Vec<Vec3>, Vec<u32>) {
        // Flat quad at source height z=0, normals up (source +z)
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 0.0),
            Vec3::new(100.0, 100.0, 0.0),
            Vec3::new(0.0, 100.0, 0.0),
        ];
        let normals = vec![Vec3::new(0.0, 0.0, 1.0); 4];
        let indices = vec![0, 1, 2, 0, 2, 3];
        (positions, normals, indices)
    }

    #[test]
    fn test_axis_swap_on_ingest() {
        let bb = Aabb::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(100.0, 100.0, 5.0));
        let mut map = Map::new("quad", bb);
        let (positions, normals, indices) = quad_entity();
        map.add_entity(&positions, &normals, &indices).unwrap();

        // Height (source z) is on the Y axis internally
        assert!(map.vertices().iter().all(|v| v.y == 0.0));
        assert_eq!(map.internal_bounding_box().min.y, -5.0);
        assert_eq!(map.bounding_box().min.z, -5.0);
    }

    #[test]
    fn test_winding_fixed_up() {
        let bb = Aabb::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(100.0, 100.0, 5.0));
        let mut map = Map::new("quad", bb);
        let (positions, normals, indices) = quad_entity();
        map.add_entity(&positions, &normals, &indices).unwrap();

        for i in 0..map.triangle_count() {
            assert!(map.triangle(i).normal().y > 0.99);
        }
    }

    #[test]
    fn test_rejects_out_of_bounds_index() {
        let bb = Aabb::default();
        let mut map = Map::new("bad", bb);
        let (positions, normals, _) = quad_entity();
        let result = map.add_entity(&positions, &normals, &[0, 1, 9]);
        assert!(result.is_err());
    }

    #[test]
    fn test_spatial_filter_uses_entity_bounds() {
        let bb = Aabb::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(100.0, 100.0, 5.0));
        let mut map = Map::new("quad", bb);
        let (positions, normals, indices) = quad_entity();
        map.add_entity(&positions, &normals, &indices).unwrap();

        let hit = Aabb::new(Vec3::new(40.0, -1.0, 40.0), Vec3::new(60.0, 1.0, 60.0));
        assert!(!map.triangles_intersecting(&hit).is_empty());

        let miss = Aabb::new(Vec3::new(500.0, -1.0, 500.0), Vec3::new(600.0, 1.0, 600.0));
        assert!(map.triangles_intersecting(&miss).is_empty());
    }
}
