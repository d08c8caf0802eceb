// Heightfield - voxelized map geometry.
//
// A 2D grid of columns; every column owns a height-sorted Vec of spans
// (solid vertical intervals). The walkable surface of a span is its
// top, the free space above it reaches to the next span's bottom.

use crate::geometry::Vec3;

/// Sentinel ceiling for the topmost span of a column.
pub const MAX_HEIGHT: i32 = 0xffff;

/// Walkability classification of a span surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum WalkabilityClass {
    /// Not walkable (back-facing or filtered out)
    #[default]
    Null = 0,
    /// Walkable but steeper than the walkable angle
    Steep = 1,
    /// Walkable within the walkable angle
    Flat = 2,
    /// Needs sphere-to-mesh collision confirmation
    Complex = 3,
}

/// Cardinal grid direction. Grid x grows east, grid y grows south.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    West,
    East,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// Grid offset towards the neighbor column.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::East => (1, 0),
        }
    }

    fn bit(self) -> u8 {
        match self {
            Direction::North => 0x8,
            Direction::South => 0x4,
            Direction::West => 0x2,
            Direction::East => 0x1,
        }
    }
}

/// 4-bit NSWE allow-mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectionMask(u8);

impl DirectionMask {
    pub const NONE: DirectionMask = DirectionMask(0);
    pub const ALL: DirectionMask = DirectionMask(0xf);

    pub fn allow(&mut self, direction: Direction) {
        self.0 |= direction.bit();
    }

    pub fn forbid(&mut self, direction: Direction) {
        self.0 &= !direction.bit();
    }

    pub fn allows(&self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        DirectionMask(bits & 0xf)
    }
}

/// Per-span walkability: classification plus resolved NSWE mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Area {
    pub class: WalkabilityClass,
    pub nswe: DirectionMask,
}

/// Solid vertical interval within one column, `min..max` in cell-height
/// units above the heightfield floor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Span {
    pub min: i32,
    pub max: i32,
    pub area: Area,
}

/// Spans with tops within this distance keep the better classification
/// when merged.
const CLASS_MERGE_THRESHOLD: i32 = 1;

pub struct Heightfield {
    pub width: i32,
    pub height: i32,
    pub bmin: Vec3,
    pub bmax: Vec3,
    pub cell_size: f32,
    pub cell_height: f32,
    columns: Vec<Vec<Span>>,
}

/// Grid size covering `bmin..bmax` at `cell_size` resolution over the
/// two horizontal axes (X and Z).
pub fn calc_grid_size(bmin: Vec3, bmax: Vec3, cell_size: f32) -> (i32, i32) {
    let width = ((bmax.x - bmin.x) / cell_size + 0.5) as i32;
    let height = ((bmax.z - bmin.z) / cell_size + 0.5) as i32;
    (width, height)
}

impl Heightfield {
    pub fn new(
        width: i32,
        height: i32,
        bmin: Vec3,
        bmax: Vec3,
        cell_size: f32,
        cell_height: f32,
    ) -> Self {
        Self {
            width,
            height,
            bmin,
            bmax,
            cell_size,
            cell_height,
            columns: vec![Vec::new(); (width.max(0) * height.max(0)) as usize],
        }
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn column(&self, x: i32, y: i32) -> &[Span] {
        &self.columns[(x + y * self.width) as usize]
    }

    pub fn column_mut(&mut self, x: i32, y: i32) -> &mut Vec<Span> {
        &mut self.columns[(x + y * self.width) as usize]
    }

    /// Free space above span `i` of a column: the next span's bottom,
    /// or the sentinel ceiling for the topmost span.
    pub fn span_top(column: &[Span], i: usize) -> i32 {
        column.get(i + 1).map_or(MAX_HEIGHT, |next| next.min)
    }

    /// Insert a solid interval, merging with overlapping spans. The
    /// merged extent is the union; the classification is upgraded to
    /// the better class when the merged tops are close together.
    pub fn add_span(&mut self, x: i32, y: i32, min: i32, max: i32, class: WalkabilityClass) {
        debug_assert!(self.in_bounds(x, y));
        debug_assert!(min <= max);

        let column = self.column_mut(x, y);

        let mut new_min = min;
        let mut new_max = max;
        let mut new_class = class;

        // All spans overlapping [min, max] collapse into the new span
        let start = column.partition_point(|span| span.max < min);
        let mut end = start;
        while end < column.len() && column[end].min <= max {
            let span = &column[end];
            new_min = new_min.min(span.min);
            new_max = new_max.max(span.max);
            if new_max - span.max <= CLASS_MERGE_THRESHOLD {
                new_class = new_class.max(span.area.class);
            }
            end += 1;
        }

        column.splice(
            start..end,
            std::iter::once(Span {
                min: new_min,
                max: new_max,
                area: Area {
                    class: new_class,
                    nswe: DirectionMask::NONE,
                },
            }),
        );
    }

    /// Mark spans without standing room above them as Null so they
    /// drop out of the NSWE passes and the exported cells.
    pub fn filter_low_clearance_spans(&mut self, actor_height_cells: i32) {
        for column in &mut self.columns {
            for i in 0..column.len() {
                let ceiling = column.get(i + 1).map_or(MAX_HEIGHT, |next| next.min);
                if ceiling - column[i].max < actor_height_cells {
                    column[i].area.class = WalkabilityClass::Null;
                }
            }
        }
    }

    /// Total number of spans over all columns.
    pub fn span_count(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }
}
