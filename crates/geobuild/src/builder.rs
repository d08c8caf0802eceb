// Build pipeline - triangle soup in, packed geodata out.
//
// Voxelize, resolve NSWE, turn the surviving span tops into geodata
// cells, pack them into the export buffer and compress the blocks.

use tracing::{info, warn};

use crate::compressor::Compressor;
use crate::error::GeodataError;
use crate::export::{
    BlockType, ExportBuffer, Geodata, GeodataCell, MAP_HEIGHT_CELLS, MAP_WIDTH_CELLS,
};
use crate::heightfield::{DirectionMask, Heightfield, WalkabilityClass};
use crate::map::Map;
use crate::nswe;
use crate::settings::BuilderSettings;
use crate::voxelizer;

/// Elevation marker for columns without any walkable surface.
const SENTINEL_HEIGHT: i16 = -0x4000;

pub struct Builder;

impl Builder {
    pub fn build(map: &Map, settings: &BuilderSettings) -> Result<ExportBuffer, GeodataError> {
        info!("Building geodata for map '{}'", map.name());

        let mut voxelized = voxelizer::build_heightfield(map, settings);
        nswe::calculate_nswe(&mut voxelized, map, settings);

        let geodata = assemble_cells(&voxelized.heightfield, settings);

        let mut buffer = ExportBuffer::new();
        buffer.reset(&geodata)?;
        Compressor::new(&mut buffer).compress();

        Ok(buffer)
    }
}

/// Convert span tops into geodata cells. Columns without an exportable
/// span get a sentinel cell so the packed form stays dense.
fn assemble_cells(hf: &Heightfield, settings: &BuilderSettings) -> Geodata {
    // Cell elevations are absolute and measured at the actor's waist
    let cell_elevation = hf.bmin.y + settings.actor_height / 2.0;

    let mut geodata = Geodata::default();
    let mut black_holes = 0u32;

    for y in 0..hf.height.min(MAP_HEIGHT_CELLS) {
        for x in 0..hf.width.min(MAP_WIDTH_CELLS) {
            let mut exported = false;

            for span in hf.column(x, y) {
                if span.area.class == WalkabilityClass::Null {
                    continue;
                }

                if span.area.nswe.is_empty() {
                    black_holes += 1;
                }

                geodata.cells.push(GeodataCell {
                    x: x as i16,
                    y: y as i16,
                    z: (cell_elevation + span.max as f32 * hf.cell_height) as i16,
                    block_type: BlockType::Multilayer,
                    nswe: span.area.nswe,
                });
                exported = true;
            }

            if !exported {
                geodata.cells.push(GeodataCell {
                    x: x as i16,
                    y: y as i16,
                    z: SENTINEL_HEIGHT,
                    block_type: BlockType::Complex,
                    nswe: DirectionMask::NONE,
                });
            }
        }
    }

    if black_holes > 0 {
        warn!("{} cells are unreachable from any direction", black_holes);
    }

    info!("Assembled {} cells", geodata.cells.len());
    geodata
}
