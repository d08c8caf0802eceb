// ExportBuffer - dense packed form of one map's geodata.
//
// The whole playable grid is a fixed 256x256 array of blocks, each
// block an 8x8 square of cell columns, each column up to MAX_LAYERS
// packed height+NSWE records. Heights are quantized so a record fits
// the 12 height bits of the wire format.

use crate::error::GeodataError;
use crate::heightfield::DirectionMask;

pub const MAP_WIDTH_BLOCKS: i32 = 256;
pub const MAP_HEIGHT_BLOCKS: i32 = 256;
pub const BLOCK_WIDTH_CELLS: i32 = 8;
pub const BLOCK_HEIGHT_CELLS: i32 = 8;
pub const MAP_WIDTH_CELLS: i32 = MAP_WIDTH_BLOCKS * BLOCK_WIDTH_CELLS;
pub const MAP_HEIGHT_CELLS: i32 = MAP_HEIGHT_BLOCKS * BLOCK_HEIGHT_CELLS;
pub const MAX_LAYERS: i32 = 64;

/// Height quantization unit
const HEIGHT_STEP: i16 = 8;

/// Storage flavor of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockType {
    /// One shared height for the whole block
    #[default]
    Simple = 0,
    /// One layer per cell
    Complex = 1,
    /// Full per-cell layer stacks
    Multilayer = 2,
}

impl BlockType {
    pub fn from_u8(value: u8) -> Result<Self, GeodataError> {
        match value {
            0 => Ok(BlockType::Simple),
            1 => Ok(BlockType::Complex),
            2 => Ok(BlockType::Multilayer),
            other => Err(GeodataError::InvalidBlockType(other)),
        }
    }
}

/// One sparse geodata record: grid position, quantizable elevation,
/// destination block type and the resolved NSWE flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeodataCell {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub block_type: BlockType,
    pub nswe: DirectionMask,
}

/// Cell list form of a map's geodata.
#[derive(Clone, Debug, Default)]
pub struct Geodata {
    pub cells: Vec<GeodataCell>,
}

/// Packed layer record: quantized height in the upper 12 bits, NSWE in
/// the lower 4. This is exactly the wire encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PackedCell(u16);

impl PackedCell {
    pub fn pack(z: i16, nswe: DirectionMask) -> Self {
        PackedCell((((z as u16) << 1) & 0xfff0) | nswe.bits() as u16)
    }

    pub fn height(self) -> i16 {
        ((self.0 & 0xfff0) as i16) >> 1
    }

    pub fn nswe(self) -> DirectionMask {
        DirectionMask::from_bits((self.0 & 0xf) as u8)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Self {
        PackedCell(bits)
    }
}

/// Quantize a height to the export grid: unaligned heights round up to
/// the next multiple of the quantization unit, aligned heights are
/// already representable and stay put (rounding is idempotent).
pub fn round_height(height: i16) -> i16 {
    if height % HEIGHT_STEP == 0 {
        height
    } else {
        (height / HEIGHT_STEP + 1) * HEIGHT_STEP
    }
}

pub struct ExportBuffer {
    blocks: Vec<BlockType>,
    columns: Vec<u8>,
    cells: Vec<PackedCell>,
}

impl Default for ExportBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportBuffer {
    pub fn new() -> Self {
        Self {
            blocks: vec![BlockType::default(); (MAP_WIDTH_BLOCKS * MAP_HEIGHT_BLOCKS) as usize],
            columns: vec![0; (MAP_WIDTH_CELLS * MAP_HEIGHT_CELLS) as usize],
            cells: vec![
                PackedCell::default();
                (MAP_WIDTH_CELLS * MAP_HEIGHT_CELLS * MAX_LAYERS) as usize
            ],
        }
    }

    /// Clear and repopulate from a cell list. Cells are stable-sorted
    /// by elevation first so the layers of a column end up
    /// bottom-to-top.
    pub fn reset(&mut self, geodata: &Geodata) -> Result<(), GeodataError> {
        self.blocks.fill(BlockType::default());
        self.columns = vec![0; (MAP_WIDTH_CELLS * MAP_HEIGHT_CELLS) as usize];
        // Reallocate instead of filling; sparse maps then only commit
        // the pages they actually write
        self.cells = vec![
            PackedCell::default();
            (MAP_WIDTH_CELLS * MAP_HEIGHT_CELLS * MAX_LAYERS) as usize
        ];

        // Sort cells by Z for correct order of the layers
        let mut sorted_cells = geodata.cells.clone();
        sorted_cells.sort_by_key(|cell| cell.z);

        for cell in &sorted_cells {
            let column_index = (cell.y as i32 + cell.x as i32 * MAP_WIDTH_CELLS) as usize;
            let block_index = (cell.y as i32 / BLOCK_HEIGHT_CELLS
                + cell.x as i32 / BLOCK_WIDTH_CELLS * MAP_WIDTH_BLOCKS)
                as usize;

            self.blocks[block_index] = cell.block_type;

            if self.columns[column_index] as i32 >= MAX_LAYERS - 1 {
                return Err(GeodataError::TooManyLayers {
                    x: cell.x,
                    y: cell.y,
                });
            }

            self.columns[column_index] += 1;
            let layer = self.columns[column_index] as usize - 1;
            self.cells[column_index * MAX_LAYERS as usize + layer] =
                PackedCell::pack(round_height(cell.z), cell.nswe);
        }

        Ok(())
    }

    /// Expand the packed form back into a cell list.
    pub fn convert_to_geodata(&self) -> Geodata {
        let mut geodata = Geodata::default();

        for x in 0..MAP_WIDTH_BLOCKS {
            for y in 0..MAP_HEIGHT_BLOCKS {
                match self.block(x, y) {
                    BlockType::Simple => {
                        geodata.cells.push(self.cell(x, y, 0, 0, 0));
                    }
                    BlockType::Complex => {
                        for cx in 0..BLOCK_WIDTH_CELLS {
                            for cy in 0..BLOCK_HEIGHT_CELLS {
                                geodata.cells.push(self.cell(x, y, cx, cy, 0));
                            }
                        }
                    }
                    BlockType::Multilayer => {
                        for cx in 0..BLOCK_WIDTH_CELLS {
                            for cy in 0..BLOCK_HEIGHT_CELLS {
                                let layers = self.column_layers(x, y, cx, cy);
                                for layer in 0..layers as i32 {
                                    geodata.cells.push(self.cell(x, y, cx, cy, layer));
                                }
                            }
                        }
                    }
                }
            }
        }

        geodata
    }

    pub fn block(&self, x: i32, y: i32) -> BlockType {
        self.blocks[(y + x * MAP_WIDTH_BLOCKS) as usize]
    }

    pub fn column_layers(&self, x: i32, y: i32, cx: i32, cy: i32) -> u8 {
        self.columns[Self::column_index(x, y, cx, cy)]
    }

    pub fn cell(&self, x: i32, y: i32, cx: i32, cy: i32, layer: i32) -> GeodataCell {
        let column_x = x * BLOCK_WIDTH_CELLS + cx;
        let column_y = y * BLOCK_HEIGHT_CELLS + cy;
        let packed = self.cells[Self::column_index(x, y, cx, cy) * MAX_LAYERS as usize
            + layer as usize];

        GeodataCell {
            x: column_x as i16,
            y: column_y as i16,
            z: packed.height(),
            block_type: self.block(x, y),
            nswe: packed.nswe(),
        }
    }

    /// Raw packed record, used by the compressor and the serializer.
    pub fn packed_cell(&self, x: i32, y: i32, cx: i32, cy: i32, layer: i32) -> PackedCell {
        self.cells[Self::column_index(x, y, cx, cy) * MAX_LAYERS as usize + layer as usize]
    }

    pub fn set_block_type(&mut self, x: i32, y: i32, block_type: BlockType) {
        self.blocks[(y + x * MAP_WIDTH_BLOCKS) as usize] = block_type;
    }

    pub fn set_block_height(&mut self, x: i32, y: i32, height: i16) {
        let cell_index = Self::column_index(x, y, 0, 0) * MAX_LAYERS as usize;
        let nswe = self.cells[cell_index].nswe();
        self.cells[cell_index] = PackedCell::pack(round_height(height), nswe);
    }

    fn column_index(x: i32, y: i32, cx: i32, cy: i32) -> usize {
        ((y * BLOCK_HEIGHT_CELLS + cy) + (x * BLOCK_WIDTH_CELLS + cx) * MAP_WIDTH_CELLS) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_round_height_rounds_up() {
        assert_eq!(round_height(25), 32);
        assert_eq!(round_height(-13), 0);
        assert_eq!(round_height(1), 8);
    }

    #[test]
    fn test_round_height_idempotent() {
        for h in [-16384, -32, 0, 8, 32, 1000] {
            assert_eq!(round_height(h), h);
            assert_eq!(round_height(round_height(h + 3)), round_height(h + 3));
        }
    }

    #[test]
    fn test_packed_cell_roundtrip() {
        for z in [-16384i16, -1024, 0, 8, 4088] {
            let packed = PackedCell::pack(z, DirectionMask::ALL);
            assert_eq!(packed.height(), z);
            assert_eq!(packed.nswe(), DirectionMask::ALL);
        }
    }

    #[test]
    fn test_reset_then_convert_reproduces_quantized_cells() {
        let mut buffer = ExportBuffer::new();
        let geodata = Geodata {
            cells: vec![cell(10, 10, 25, 0xf), cell(10, 10, 101, 0x5), cell(10, 11, -13, 0xa)],
        };
        buffer.reset(&geodata).unwrap();

        let converted = buffer.convert_to_geodata();
        let at = |x: i16, y: i16| -> Vec<GeodataCell> {
            converted
                .cells
                .iter()
                .copied()
                .filter(|c| c.x == x && c.y == y)
                .collect()
        };

        let stack = at(10, 10);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[0].z, round_height(25));
        assert_eq!(stack[0].nswe.bits(), 0xf);
        assert_eq!(stack[1].z, round_height(101));
        assert_eq!(stack[1].nswe.bits(), 0x5);

        assert_eq!(at(10, 11)[0].z, round_height(-13));
    }

    #[test]
    fn test_layers_sorted_bottom_to_top() {
        let mut buffer = ExportBuffer::new();
        // Deliberately unsorted input
        let geodata = Geodata {
            cells: vec![cell(0, 0, 800, 0xf), cell(0, 0, -800, 0xf), cell(0, 0, 0, 0xf)],
        };
        buffer.reset(&geodata).unwrap();

        assert_eq!(buffer.column_layers(0, 0, 0, 0), 3);
        let heights: Vec<i16> = (0..3).map(|l| buffer.cell(0, 0, 0, 0, l).z).collect();
        assert_eq!(heights, vec![-800, 0, 800]);
    }

    #[test]
    fn test_layer_capacity_is_fatal() {
        let mut buffer = ExportBuffer::new();
        let cells: Vec<GeodataCell> = (0..MAX_LAYERS)
            .map(|layer| cell(0, 0, (layer * 96) as i16, 0xf))
            .collect();
        let geodata = Geodata { cells };

        assert!(matches!(
            buffer.reset(&geodata),
            Err(GeodataError::TooManyLayers { x: 0, y: 0 })
        ));
    }

    #[test]
    fn test_layer_count_within_bounds_accepted() {
        let mut buffer = ExportBuffer::new();
        let cells: Vec<GeodataCell> = (0..MAX_LAYERS - 1)
            .map(|layer| cell(0, 0, (layer * 96) as i16, 0xf))
            .collect();
        let geodata = Geodata { cells };

        buffer.reset(&geodata).unwrap();
        assert_eq!(buffer.column_layers(0, 0, 0, 0) as i32, MAX_LAYERS - 1);
    }
}
