// Voxelizer - rasterizes the map's triangle soup into a heightfield.
//
// Triangles are classified by slope first; everything that is not
// back-facing is clipped cell-by-cell into solid spans. Each touched
// column also remembers which triangles contributed to it, so the
// collision refinement pass can query the mesh without scanning the
// whole soup.

use tracing::info;

use crate::geometry::{Aabb, Triangle, Vec3};
use crate::heightfield::{Heightfield, MAX_HEIGHT, WalkabilityClass, calc_grid_size};
use crate::map::Map;
use crate::settings::BuilderSettings;

// "Nearly vertical" surfaces keep their walls; only clearly
// back-facing triangles are dropped.
const BACKFACE_SLOPE: f32 = -0.01;

/// Heightfield plus the per-column contributing triangle lists.
pub struct VoxelizedMap {
    pub heightfield: Heightfield,
    pub triangle_index: Vec<Vec<u32>>,
}

/// Classify every map triangle by the vertical component of its face
/// normal against `cos(max_walkable_angle)`.
pub fn classify_triangles(map: &Map, max_walkable_angle: f32) -> Vec<WalkabilityClass> {
    let walkable_slope = max_walkable_angle.to_radians().cos();

    (0..map.triangle_count())
        .map(|i| {
            let slope = map.triangle(i).normal().vertical_slope();

            if slope < BACKFACE_SLOPE {
                WalkabilityClass::Null
            } else if slope < walkable_slope {
                WalkabilityClass::Steep
            } else {
                WalkabilityClass::Flat
            }
        })
        .collect()
}

/// Build the filtered heightfield for a map.
pub fn build_heightfield(map: &Map, settings: &BuilderSettings) -> VoxelizedMap {
    let bb = map.internal_bounding_box();
    let (width, height) = calc_grid_size(bb.min, bb.max, settings.cell_size);

    let mut heightfield = Heightfield::new(
        width,
        height,
        bb.min,
        bb.max,
        settings.cell_size,
        settings.cell_height,
    );
    let mut triangle_index = vec![Vec::new(); (width.max(0) * height.max(0)) as usize];

    let classes = classify_triangles(map, settings.max_walkable_angle);

    info!(
        "Rasterizing {} triangles into {}x{} grid",
        map.triangle_count(),
        width,
        height
    );

    for (i, &class) in classes.iter().enumerate() {
        if class == WalkabilityClass::Null {
            continue;
        }
        rasterize_triangle(
            &mut heightfield,
            &mut triangle_index,
            i as u32,
            &map.triangle(i),
            class,
        );
    }

    // Drop pockets the actor cannot stand in
    let actor_height_cells = (settings.actor_height / settings.cell_height) as i32;
    heightfield.filter_low_clearance_spans(actor_height_cells);

    VoxelizedMap {
        heightfield,
        triangle_index,
    }
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Z,
}

fn axis_value(v: Vec3, axis: Axis) -> f32 {
    match axis {
        Axis::X => v.x,
        Axis::Z => v.z,
    }
}

/// Split a convex polygon along the plane `axis == offset`. Vertices at
/// or below the offset go to `below`, the rest to `above`; crossing
/// edges contribute the interpolated intersection to both halves.
fn split_poly(poly: &[Vec3], below: &mut Vec<Vec3>, above: &mut Vec<Vec3>, offset: f32, axis: Axis) {
    below.clear();
    above.clear();

    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        let da = offset - axis_value(a, axis);
        let db = offset - axis_value(b, axis);

        if (da >= 0.0) != (db >= 0.0) {
            let t = da / (da - db);
            let v = a.add(b.sub(a).scale(t));
            below.push(v);
            above.push(v);
        }

        if db >= 0.0 {
            below.push(b);
            if db == 0.0 {
                above.push(b);
            }
        } else {
            above.push(b);
        }
    }
}

/// Clip one triangle against the grid, inserting a span per touched
/// cell and recording the triangle in the column's contribution list.
fn rasterize_triangle(
    hf: &mut Heightfield,
    triangle_index: &mut [Vec<u32>],
    index: u32,
    triangle: &Triangle,
    class: WalkabilityClass,
) {
    if hf.width <= 0 || hf.height <= 0 {
        return;
    }

    let bb = triangle.bounding_box();
    let grid_bb = Aabb::new(hf.bmin, hf.bmax);
    if !bb.intersects(&grid_bb) {
        return;
    }

    let ics = 1.0 / hf.cell_size;
    let ich = 1.0 / hf.cell_height;

    let z0 = (((bb.min.z - hf.bmin.z) * ics).floor() as i32).clamp(0, hf.height - 1);
    let z1 = (((bb.max.z - hf.bmin.z) * ics).floor() as i32).clamp(0, hf.height - 1);

    // Slice the triangle into grid rows, then each row into cells
    let mut rest: Vec<Vec3> = vec![triangle.a, triangle.b, triangle.c];
    let mut row: Vec<Vec3> = Vec::with_capacity(7);
    let mut scratch: Vec<Vec3> = Vec::with_capacity(7);
    let mut cell: Vec<Vec3> = Vec::with_capacity(7);

    for z in z0..=z1 {
        if rest.is_empty() {
            break;
        }

        let row_end = hf.bmin.z + (z + 1) as f32 * hf.cell_size;
        split_poly(&rest, &mut row, &mut scratch, row_end, Axis::Z);
        std::mem::swap(&mut rest, &mut scratch);

        if row.len() < 3 {
            continue;
        }

        let row_bb = row
            .iter()
            .fold(Aabb::from_point(row[0]), |mut acc, &v| {
                acc.merge(v);
                acc
            });
        let x0 = (((row_bb.min.x - hf.bmin.x) * ics).floor() as i32).clamp(0, hf.width - 1);
        let x1 = (((row_bb.max.x - hf.bmin.x) * ics).floor() as i32).clamp(0, hf.width - 1);

        let mut row_rest = row.clone();
        for x in x0..=x1 {
            if row_rest.is_empty() {
                break;
            }

            let cell_end = hf.bmin.x + (x + 1) as f32 * hf.cell_size;
            split_poly(&row_rest, &mut cell, &mut scratch, cell_end, Axis::X);
            std::mem::swap(&mut row_rest, &mut scratch);

            if cell.len() < 3 {
                continue;
            }

            let mut y_min = cell[0].y;
            let mut y_max = cell[0].y;
            for v in &cell[1..] {
                y_min = y_min.min(v.y);
                y_max = y_max.max(v.y);
            }

            // Entirely below or above the heightfield volume
            if y_max < hf.bmin.y || y_min > hf.bmax.y {
                continue;
            }

            let smin_f = (y_min - hf.bmin.y) * ich;
            let smax_f = (y_max - hf.bmin.y) * ich;
            let smin = (smin_f.floor() as i32).clamp(0, MAX_HEIGHT);
            let smax = (smax_f.ceil() as i32).clamp(smin + 1, MAX_HEIGHT);

            hf.add_span(x, z, smin, smax, class);

            let column = &mut triangle_index[(x + z * hf.width) as usize];
            if column.last() != Some(&index) {
                column.push(index);
            }
        }
    }
}
