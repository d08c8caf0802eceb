// NSWE calculation - per-span directional passability.
//
// Two passes over the voxelized map:
// 1. Simple: neighbor span height differences decide each direction;
//    ambiguous climbs are reclassified Complex.
// 2. Complex: a sphere proxy is slid across the cell boundary against
//    the real mesh; an overhanging contact forbids the direction.
//
// Both passes read neighbor columns but never mutate them, so they are
// computed row-parallel into fresh results and applied afterwards.

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::geometry::{Intersection, Sphere, Triangle, Vec3};
use crate::heightfield::{Area, Direction, DirectionMask, Heightfield, Span, WalkabilityClass};
use crate::map::Map;
use crate::settings::BuilderSettings;
use crate::voxelizer::VoxelizedMap;

/// Lateral step and vertical drop step of the slide simulation, in
/// world units. Load-bearing for output parity; do not tune.
const SLIDE_DELTA: f32 = 1.0;

/// Radius of the slide proxy, in world units.
const SPHERE_RADIUS: f32 = 16.0;

/// Contacts whose weighted normal has a vertical slope below this are
/// overhanging obstructions rather than walkable ground.
const OBSTRUCTION_SLOPE: f32 = 0.3;

/// Run both passes in order.
pub fn calculate_nswe(voxelized: &mut VoxelizedMap, map: &Map, settings: &BuilderSettings) {
    info!("Simple NSWE calculation");
    calculate_simple_nswe(&mut voxelized.heightfield, settings);

    info!("Collision detection");
    calculate_complex_nswe(
        &mut voxelized.heightfield,
        map,
        &voxelized.triangle_index,
        settings,
    );
}

/// Decide passability from span height differences alone. Climbs
/// between the two climb thresholds reclassify the span Complex for
/// the collision pass.
pub fn calculate_simple_nswe(hf: &mut Heightfield, settings: &BuilderSettings) {
    let actor_height_cells = (settings.actor_height / hf.cell_height) as i32;
    let min_climb_cells = (settings.min_walkable_climb / hf.cell_height) as i32;
    let max_climb_cells = (settings.max_walkable_climb / hf.cell_height) as i32;

    let rows: Vec<Vec<Vec<Area>>> = (0..hf.height)
        .into_par_iter()
        .map(|y| {
            debug!("Simple NSWE row {}/{}", y + 1, hf.height);
            (0..hf.width)
                .map(|x| {
                    let column = hf.column(x, y);
                    (0..column.len())
                        .map(|i| {
                            simple_span_area(
                                hf,
                                x,
                                y,
                                column,
                                i,
                                actor_height_cells,
                                min_climb_cells,
                                max_climb_cells,
                            )
                        })
                        .collect()
                })
                .collect()
        })
        .collect();

    for (y, row) in rows.into_iter().enumerate() {
        for (x, areas) in row.into_iter().enumerate() {
            let column = hf.column_mut(x as i32, y as i32);
            for (span, area) in column.iter_mut().zip(areas) {
                span.area = area;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn simple_span_area(
    hf: &Heightfield,
    x: i32,
    y: i32,
    column: &[Span],
    i: usize,
    actor_height_cells: i32,
    min_climb_cells: i32,
    max_climb_cells: i32,
) -> Area {
    let span = column[i];
    let mut area = span.area;

    if area.class == WalkabilityClass::Null {
        return area;
    }

    let bottom = span.max;
    let top = Heightfield::span_top(column, i);

    for direction in Direction::ALL {
        let (dx, dy) = direction.offset();
        let side_x = x + dx;
        let side_y = y + dy;

        // Allow moving outside of the map
        if !hf.in_bounds(side_x, side_y) {
            area.nswe.allow(direction);
            continue;
        }

        let mut direction_allowed = false;
        let neighbour_column = hf.column(side_x, side_y);

        for (j, neighbour) in neighbour_column.iter().enumerate() {
            let neighbour_bottom = neighbour.max;
            let neighbour_top = Heightfield::span_top(neighbour_column, j);

            let height = top.min(neighbour_top) - bottom.max(neighbour_bottom);
            let diff = neighbour_bottom - bottom;

            if height > actor_height_cells {
                if span.area.class <= WalkabilityClass::Steep
                    || neighbour.area.class <= WalkabilityClass::Steep
                {
                    // Forbid going up on steep surfaces
                    direction_allowed = diff <= min_climb_cells;
                } else {
                    direction_allowed = diff <= max_climb_cells;

                    // Mark ambiguous climbs for sphere-to-mesh collision
                    // detection
                    if diff.abs() >= min_climb_cells && diff.abs() <= max_climb_cells {
                        area.class = WalkabilityClass::Complex;
                    }
                }

                break;
            }
        }

        if direction_allowed {
            area.nswe.allow(direction);
        }
    }

    area
}

/// Confirm directions of Complex spans against the real mesh.
pub fn calculate_complex_nswe(
    hf: &mut Heightfield,
    map: &Map,
    triangle_index: &[Vec<u32>],
    settings: &BuilderSettings,
) {
    let fetch_radius = (settings.actor_radius * 2.0 / settings.cell_size).ceil() as i32;

    let rows: Vec<Vec<(i32, usize, DirectionMask)>> = (0..hf.height)
        .into_par_iter()
        .map(|y| {
            debug!("Collision row {}/{}", y + 1, hf.height);
            let mut resolved = Vec::new();
            let mut cache: HashMap<i32, Vec<Triangle>> = HashMap::new();

            for x in 0..hf.width {
                let column = hf.column(x, y);

                for (i, span) in column.iter().enumerate() {
                    if span.area.class != WalkabilityClass::Complex {
                        continue;
                    }

                    let mut nswe = span.area.nswe;

                    for direction in Direction::ALL {
                        // Directions already forbidden by the simple pass
                        // stay forbidden
                        if !nswe.allows(direction) {
                            continue;
                        }

                        let (dx, dy) = direction.offset();

                        // Skip map edges
                        if !hf.in_bounds(x + dx, y + dy) {
                            continue;
                        }

                        let triangles = cache.entry(x).or_insert_with(|| {
                            triangles_at_columns(hf, map, triangle_index, x, y, fetch_radius)
                        });

                        if slide_sphere_until_collision(
                            hf, x, y, span.max, direction, triangles, settings,
                        ) {
                            nswe.forbid(direction);
                        }
                    }

                    if nswe != span.area.nswe {
                        resolved.push((x, i, nswe));
                    }
                }
            }

            resolved
        })
        .collect();

    for (y, row) in rows.into_iter().enumerate() {
        for (x, i, nswe) in row {
            hf.column_mut(x, y as i32)[i].area.nswe = nswe;
        }
    }
}

/// Slide a sphere proxy across the cell boundary, dropping it onto the
/// surface at every step. Returns true when an overhanging contact
/// blocks the way.
fn slide_sphere_until_collision(
    hf: &Heightfield,
    x: i32,
    y: i32,
    top: i32,
    direction: Direction,
    triangles: &[Triangle],
    settings: &BuilderSettings,
) -> bool {
    let (dx, dy) = direction.offset();
    let half_cell = hf.cell_size / 2.0;

    // Place the sphere half a cell back from the shared boundary, two
    // radii above the span surface
    let mut sphere = Sphere::new(
        Vec3::new(
            hf.bmin.x + (x as f32 - dx as f32 * 0.5) * hf.cell_size + half_cell,
            hf.bmin.y + top as f32 * hf.cell_height + SPHERE_RADIUS * 2.0,
            hf.bmin.z + (y as f32 - dy as f32 * 0.5) * hf.cell_size + half_cell,
        ),
        SPHERE_RADIUS,
    );

    let steps = (hf.cell_size * 1.5 / SLIDE_DELTA) as i32;
    let mut intersection = Intersection::default();

    for _ in 0..steps {
        drop_sphere(&mut sphere, triangles, settings.max_walkable_climb);

        sphere.center.x += dx as f32 * SLIDE_DELTA;
        sphere.center.z += dy as f32 * SLIDE_DELTA;

        for triangle in triangles {
            if sphere.intersects(triangle, &mut intersection) {
                let slope = intersection
                    .normal
                    .scale(intersection.depth)
                    .vertical_slope();

                if slope < OBSTRUCTION_SLOPE {
                    return true;
                }
            }
        }

        sphere.center.y += SLIDE_DELTA;
    }

    false
}

/// Lower the sphere until it rests on the mesh or falls a bounded climb
/// distance, then lift it just off the contact.
fn drop_sphere(sphere: &mut Sphere, triangles: &[Triangle], max_walkable_climb: f32) {
    let original_y = sphere.center.y;

    while original_y - sphere.center.y < max_walkable_climb * 2.0 {
        if sphere.intersects_any(triangles) {
            if sphere.center.y != original_y {
                sphere.center.y += SLIDE_DELTA;
            }

            return;
        }

        sphere.center.y -= SLIDE_DELTA;
    }
}

/// Candidate triangles for a column and its neighborhood, gathered
/// from the voxelizer's contribution index.
fn triangles_at_columns(
    hf: &Heightfield,
    map: &Map,
    triangle_index: &[Vec<u32>],
    x: i32,
    y: i32,
    radius: i32,
) -> Vec<Triangle> {
    let mut column_indices: BTreeSet<u32> = BTreeSet::new();

    for dy in y - radius..=y + radius {
        for dx in x - radius..=x + radius {
            if !hf.in_bounds(dx, dy) {
                continue;
            }

            column_indices.extend(&triangle_index[(dx + dy * hf.width) as usize]);
        }
    }

    column_indices
        .into_iter()
        .map(|index| map.triangle(index as usize))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Aabb;
    use crate::voxelizer::build_heightfield;

    fn settings() -> BuilderSettings {
        BuilderSettings::default()
    }

    fn empty_field(width: i32, height: i32) -> Heightfield {
        Heightfield::new(
            width,
            height,
            Vec3::new(0.0, -8.0, 0.0),
            Vec3::new(width as f32 * 16.0, 1000.0, height as f32 * 16.0),
            16.0,
            8.0,
        )
    }

    fn plateau_field(diff_cells: i32) -> Heightfield {
        // Two columns side by side, right one raised by diff_cells
        let mut hf = empty_field(2, 1);
        hf.add_span(0, 0, 0, 2, WalkabilityClass::Flat);
        hf.add_span(1, 0, 0, 2 + diff_cells, WalkabilityClass::Flat);
        hf
    }

    #[test]
    fn test_boundary_directions_always_allowed() {
        let mut hf = empty_field(3, 3);
        for y in 0..3 {
            for x in 0..3 {
                hf.add_span(x, y, 0, 2, WalkabilityClass::Flat);
            }
        }
        calculate_simple_nswe(&mut hf, &settings());

        // Corner column: both out-of-grid directions allowed
        let area = hf.column(0, 0)[0].area;
        assert!(area.nswe.allows(Direction::North));
        assert!(area.nswe.allows(Direction::West));
    }

    #[test]
    fn test_flat_grid_fully_connected() {
        let mut hf = empty_field(3, 3);
        for y in 0..3 {
            for x in 0..3 {
                hf.add_span(x, y, 0, 2, WalkabilityClass::Flat);
            }
        }
        calculate_simple_nswe(&mut hf, &settings());

        for y in 0..3 {
            for x in 0..3 {
                let area = hf.column(x, y)[0].area;
                assert_eq!(area.nswe, DirectionMask::ALL);
                assert_eq!(area.class, WalkabilityClass::Flat);
            }
        }
    }

    #[test]
    fn test_small_climb_allowed_without_reclassification() {
        // 8 world units, below min_walkable_climb (16)
        let mut hf = plateau_field(1);
        calculate_simple_nswe(&mut hf, &settings());

        let area = hf.column(0, 0)[0].area;
        assert!(area.nswe.allows(Direction::East));
        assert_eq!(area.class, WalkabilityClass::Flat);
    }

    #[test]
    fn test_large_climb_forbidden() {
        // 96 world units, above max_walkable_climb (80)
        let mut hf = plateau_field(12);
        calculate_simple_nswe(&mut hf, &settings());

        let area = hf.column(0, 0)[0].area;
        assert!(!area.nswe.allows(Direction::East));
        assert_eq!(area.class, WalkabilityClass::Flat);

        // Dropping down the same ledge is allowed
        let other = hf.column(1, 0)[0].area;
        assert!(other.nswe.allows(Direction::West));
    }

    #[test]
    fn test_ambiguous_climb_marked_complex() {
        // 40 world units, between the climb thresholds
        let mut hf = plateau_field(5);
        calculate_simple_nswe(&mut hf, &settings());

        let area = hf.column(0, 0)[0].area;
        assert!(area.nswe.allows(Direction::East));
        assert_eq!(area.class, WalkabilityClass::Complex);
    }

    #[test]
    fn test_steep_neighbour_uses_min_climb() {
        let mut hf = empty_field(2, 1);
        hf.add_span(0, 0, 0, 2, WalkabilityClass::Flat);
        hf.add_span(1, 0, 0, 7, WalkabilityClass::Steep);
        calculate_simple_nswe(&mut hf, &settings());

        // 40 units up a steep surface: min climb (16) governs
        let area = hf.column(0, 0)[0].area;
        assert!(!area.nswe.allows(Direction::East));
    }

    #[test]
    fn test_no_clearance_means_forbidden() {
        let mut hf = empty_field(2, 1);
        hf.add_span(0, 0, 0, 2, WalkabilityClass::Flat);
        // Neighbour column has a ceiling right above its floor
        hf.add_span(1, 0, 0, 2, WalkabilityClass::Flat);
        hf.add_span(1, 0, 4, 30, WalkabilityClass::Flat);
        calculate_simple_nswe(&mut hf, &settings());

        let area = hf.column(0, 0)[0].area;
        assert!(!area.nswe.allows(Direction::East));
    }

    fn stepped_floor() -> Map {
        // Lower floor west of x=32, upper floor 40 units higher east of
        // it, joined by a sheer riser. The 40-unit climb falls between
        // the climb thresholds, so only the collision pass can see that
        // the riser is a sheer face and not stairs.
        let bb = Aabb::new(Vec3::new(0.0, 0.0, -8.0), Vec3::new(64.0, 64.0, 128.0));
        let mut map = Map::new("stepped", bb);

        let lower = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(32.0, 0.0, 0.0),
            Vec3::new(32.0, 64.0, 0.0),
            Vec3::new(0.0, 64.0, 0.0),
        ];
        let up = vec![Vec3::new(0.0, 0.0, 1.0); 4];
        map.add_entity(&lower, &up, &[0, 1, 2, 0, 2, 3]).unwrap();

        let upper = vec![
            Vec3::new(32.0, 0.0, 40.0),
            Vec3::new(64.0, 0.0, 40.0),
            Vec3::new(64.0, 64.0, 40.0),
            Vec3::new(32.0, 64.0, 40.0),
        ];
        map.add_entity(&upper, &up, &[0, 1, 2, 0, 2, 3]).unwrap();

        let riser = vec![
            Vec3::new(32.0, 0.0, 0.0),
            Vec3::new(32.0, 64.0, 0.0),
            Vec3::new(32.0, 64.0, 40.0),
            Vec3::new(32.0, 0.0, 40.0),
        ];
        let west = vec![Vec3::new(-1.0, 0.0, 0.0); 4];
        map.add_entity(&riser, &west, &[0, 1, 2, 0, 2, 3]).unwrap();

        map
    }

    #[test]
    fn test_collision_forbids_sheer_riser() {
        let map = stepped_floor();
        let mut voxelized = build_heightfield(&map, &settings());
        calculate_simple_nswe(&mut voxelized.heightfield, &settings());

        // The simple pass lets the climb through but flags it for
        // confirmation
        let area = voxelized.heightfield.column(1, 1)[0].area;
        assert_eq!(area.class, WalkabilityClass::Complex);
        assert!(area.nswe.allows(Direction::East));

        calculate_complex_nswe(
            &mut voxelized.heightfield,
            &map,
            &voxelized.triangle_index,
            &settings(),
        );

        let area = voxelized.heightfield.column(1, 1)[0].area;
        assert!(!area.nswe.allows(Direction::East));
    }

    #[test]
    fn test_collision_keeps_open_floor_passable() {
        let bb = Aabb::new(Vec3::new(0.0, 0.0, -8.0), Vec3::new(64.0, 64.0, 128.0));
        let mut map = Map::new("open", bb);
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(64.0, 0.0, 0.0),
            Vec3::new(64.0, 64.0, 0.0),
            Vec3::new(0.0, 64.0, 0.0),
        ];
        let normals = vec![Vec3::new(0.0, 0.0, 1.0); 4];
        map.add_entity(&positions, &normals, &[0, 1, 2, 0, 2, 3])
            .unwrap();

        let mut voxelized = build_heightfield(&map, &settings());
        calculate_simple_nswe(&mut voxelized.heightfield, &settings());

        voxelized.heightfield.column_mut(1, 1)[0].area.class = WalkabilityClass::Complex;

        calculate_complex_nswe(
            &mut voxelized.heightfield,
            &map,
            &voxelized.triangle_index,
            &settings(),
        );

        let area = voxelized.heightfield.column(1, 1)[0].area;
        assert_eq!(area.nswe, DirectionMask::ALL);
    }
}
