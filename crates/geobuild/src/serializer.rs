// L2J geodata wire format.
//
// Blocks are written in x-major order. A block starts with its type
// byte: a Simple block carries one raw height, a Complex block 64
// packed records, a Multilayer block a layer count byte per cell
// followed by that many packed records, bottom layer first. A packed
// record is the quantized height shifted into the upper 12 bits with
// the NSWE mask in the lower 4.

use geobuild_shared::util::ByteBuffer;

use crate::error::GeodataError;
use crate::export::{
    BLOCK_HEIGHT_CELLS, BLOCK_WIDTH_CELLS, BlockType, ExportBuffer, Geodata, GeodataCell,
    MAP_HEIGHT_BLOCKS, MAP_WIDTH_BLOCKS, MAX_LAYERS, PackedCell,
};
use crate::heightfield::DirectionMask;

pub struct L2jSerializer;

impl L2jSerializer {
    pub fn serialize(&self, buffer: &ExportBuffer) -> ByteBuffer {
        let mut out = ByteBuffer::new();

        for x in 0..MAP_WIDTH_BLOCKS {
            for y in 0..MAP_HEIGHT_BLOCKS {
                let block_type = buffer.block(x, y);
                out.write_u8(block_type as u8);

                match block_type {
                    BlockType::Simple => {
                        out.write_i16(buffer.cell(x, y, 0, 0, 0).z);
                    }
                    BlockType::Complex => {
                        for cx in 0..BLOCK_WIDTH_CELLS {
                            for cy in 0..BLOCK_HEIGHT_CELLS {
                                out.write_u16(buffer.packed_cell(x, y, cx, cy, 0).bits());
                            }
                        }
                    }
                    BlockType::Multilayer => {
                        for cx in 0..BLOCK_WIDTH_CELLS {
                            for cy in 0..BLOCK_HEIGHT_CELLS {
                                let layers = buffer.column_layers(x, y, cx, cy);
                                out.write_u8(layers);
                                for layer in 0..layers as i32 {
                                    out.write_u16(buffer.packed_cell(x, y, cx, cy, layer).bits());
                                }
                            }
                        }
                    }
                }
            }
        }

        out
    }

    pub fn deserialize(&self, input: &mut ByteBuffer) -> Result<Geodata, GeodataError> {
        let mut geodata = Geodata::default();

        for x in 0..MAP_WIDTH_BLOCKS {
            for y in 0..MAP_HEIGHT_BLOCKS {
                let block_type = BlockType::from_u8(input.read_u8()?)?;

                match block_type {
                    BlockType::Simple => {
                        let z = input.read_i16()?;
                        geodata.cells.push(GeodataCell {
                            x: (x * BLOCK_WIDTH_CELLS) as i16,
                            y: (y * BLOCK_HEIGHT_CELLS) as i16,
                            z,
                            block_type,
                            // A simple block is one flat walkable plate
                            nswe: DirectionMask::ALL,
                        });
                    }
                    BlockType::Complex => {
                        for cx in 0..BLOCK_WIDTH_CELLS {
                            for cy in 0..BLOCK_HEIGHT_CELLS {
                                let packed = PackedCell::from_bits(input.read_u16()?);
                                geodata.cells.push(Self::unpack(x, y, cx, cy, block_type, packed));
                            }
                        }
                    }
                    BlockType::Multilayer => {
                        for cx in 0..BLOCK_WIDTH_CELLS {
                            for cy in 0..BLOCK_HEIGHT_CELLS {
                                let layers = input.read_u8()?;
                                // Packed columns always hold 1..MAX_LAYERS
                                // records; anything else is a corrupt file
                                if layers == 0 {
                                    return Err(GeodataError::EmptyColumn {
                                        x: (x * BLOCK_WIDTH_CELLS + cx) as i16,
                                        y: (y * BLOCK_HEIGHT_CELLS + cy) as i16,
                                    });
                                }
                                if layers as i32 > MAX_LAYERS - 1 {
                                    return Err(GeodataError::TooManyLayers {
                                        x: (x * BLOCK_WIDTH_CELLS + cx) as i16,
                                        y: (y * BLOCK_HEIGHT_CELLS + cy) as i16,
                                    });
                                }
                                for _ in 0..layers {
                                    let packed = PackedCell::from_bits(input.read_u16()?);
                                    geodata
                                        .cells
                                        .push(Self::unpack(x, y, cx, cy, block_type, packed));
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(geodata)
    }

    fn unpack(x: i32, y: i32, cx: i32, cy: i32, block_type: BlockType, packed: PackedCell) -> GeodataCell {
        GeodataCell {
            x: (x * BLOCK_WIDTH_CELLS + cx) as i16,
            y: (y * BLOCK_HEIGHT_CELLS + cy) as i16,
            z: packed.height(),
            block_type,
            nswe: packed.nswe(),
        }
    }
}
