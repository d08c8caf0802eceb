// Block compressor - downgrades blocks to the cheapest storage flavor
// that still reproduces the same cells.

use tracing::info;

use crate::export::{
    BLOCK_HEIGHT_CELLS, BLOCK_WIDTH_CELLS, BlockType, ExportBuffer, MAP_HEIGHT_BLOCKS,
    MAP_WIDTH_BLOCKS,
};

pub struct Compressor<'a> {
    buffer: &'a mut ExportBuffer,
}

impl<'a> Compressor<'a> {
    pub fn new(buffer: &'a mut ExportBuffer) -> Self {
        Self { buffer }
    }

    /// Rewrite every block type in place. A block where any column
    /// stacks layers stays Multilayer; a single-layer block with one
    /// shared height and NSWE mask collapses to Simple; everything
    /// else becomes Complex.
    pub fn compress(&mut self) {
        let mut simple = 0u32;
        let mut complex = 0u32;
        let mut multilayer = 0u32;

        for x in 0..MAP_WIDTH_BLOCKS {
            for y in 0..MAP_HEIGHT_BLOCKS {
                if self.is_multilayer_block(x, y) {
                    self.buffer.set_block_type(x, y, BlockType::Multilayer);
                    multilayer += 1;
                } else if self.is_simple_block(x, y) {
                    let height = self.buffer.cell(x, y, 0, 0, 0).z;
                    self.buffer.set_block_type(x, y, BlockType::Simple);
                    self.buffer.set_block_height(x, y, height);
                    simple += 1;
                } else {
                    self.buffer.set_block_type(x, y, BlockType::Complex);
                    complex += 1;
                }
            }
        }

        info!(
            "Compressed blocks: {} simple, {} complex, {} multilayer",
            simple, complex, multilayer
        );
    }

    fn is_multilayer_block(&self, x: i32, y: i32) -> bool {
        for cx in 0..BLOCK_WIDTH_CELLS {
            for cy in 0..BLOCK_HEIGHT_CELLS {
                if self.buffer.column_layers(x, y, cx, cy) > 1 {
                    return true;
                }
            }
        }
        false
    }

    fn is_simple_block(&self, x: i32, y: i32) -> bool {
        let first = self.buffer.packed_cell(x, y, 0, 0, 0);
        for cx in 0..BLOCK_WIDTH_CELLS {
            for cy in 0..BLOCK_HEIGHT_CELLS {
                if self.buffer.packed_cell(x, y, cx, cy, 0) != first {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{Geodata, GeodataCell};
    use crate::heightfield::DirectionMask;

    fn cell(x: i16, y: i16, z: i16, nswe: u8) -> GeodataCell {
        GeodataCell {
            x,
            y,
            z,
            block_type: BlockType::Multilayer,
            nswe: DirectionMask::from_bits(nswe),
        }
    }

    fn fill_block(cells: &mut Vec<GeodataCell>, z: i16, nswe: u8) {
        for cx in 0..8 {
            for cy in 0..8 {
                cells.push(cell(cx, cy, z, nswe));
            }
        }
    }

    #[test]
    fn test_uniform_block_becomes_simple() {
        let mut cells = Vec::new();
        fill_block(&mut cells, 32, 0xf);

        let mut buffer = ExportBuffer::new();
        buffer.reset(&Geodata { cells }).unwrap();
        Compressor::new(&mut buffer).compress();

        assert_eq!(buffer.block(0, 0), BlockType::Simple);
        assert_eq!(buffer.cell(0, 0, 0, 0, 0).z, 32);
    }

    #[test]
    fn test_varied_heights_become_complex() {
        let mut cells = Vec::new();
        fill_block(&mut cells, 32, 0xf);
        cells[0].z = 64;

        let mut buffer = ExportBuffer::new();
        buffer.reset(&Geodata { cells }).unwrap();
        Compressor::new(&mut buffer).compress();

        assert_eq!(buffer.block(0, 0), BlockType::Complex);
    }

    #[test]
    fn test_varied_nswe_blocks_simple_downgrade() {
        let mut cells = Vec::new();
        fill_block(&mut cells, 32, 0xf);
        cells[0].nswe = DirectionMask::from_bits(0x7);

        let mut buffer = ExportBuffer::new();
        buffer.reset(&Geodata { cells }).unwrap();
        Compressor::new(&mut buffer).compress();

        assert_eq!(buffer.block(0, 0), BlockType::Complex);
    }

    #[test]
    fn test_stacked_column_stays_multilayer() {
        let mut cells = Vec::new();
        fill_block(&mut cells, 32, 0xf);
        cells.push(cell(0, 0, 200, 0xf));

        let mut buffer = ExportBuffer::new();
        buffer.reset(&Geodata { cells }).unwrap();
        Compressor::new(&mut buffer).compress();

        assert_eq!(buffer.block(0, 0), BlockType::Multilayer);
    }

    #[test]
    fn test_compression_preserves_cells() {
        let mut cells = Vec::new();
        fill_block(&mut cells, 32, 0xf);

        let mut buffer = ExportBuffer::new();
        buffer.reset(&Geodata { cells }).unwrap();
        let before = buffer.convert_to_geodata();
        Compressor::new(&mut buffer).compress();
        let after = buffer.convert_to_geodata();

        // Simple block expands to a single representative cell
        let in_block: Vec<_> = after.cells.iter().filter(|c| c.x < 8 && c.y < 8).collect();
        assert_eq!(in_block.len(), 1);
        assert_eq!(in_block[0].z, before.cells[0].z);
        assert_eq!(in_block[0].nswe, before.cells[0].nswe);
    }
}
