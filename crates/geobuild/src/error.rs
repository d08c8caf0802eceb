// Error taxonomy for the geodata pipeline.
//
// Everything here aborts the current map's build; recoverable
// conditions (empty grids, empty columns) are handled with sentinel
// records instead of errors, and content issues such as black holes are
// only warned about.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeodataError {
    /// A column hit the packed layer capacity. The export format cannot
    /// represent it, so the whole map build is aborted.
    #[error("too many layers in column: {x} {y}")]
    TooManyLayers { x: i16, y: i16 },

    /// A serialized multilayer column carried no records at all.
    #[error("empty column: {x} {y}")]
    EmptyColumn { x: i16, y: i16 },

    /// A block carried a type tag outside Simple/Complex/Multilayer.
    #[error("invalid block type: {0}")]
    InvalidBlockType(u8),

    /// Input mesh data violated the triangle soup contract.
    #[error("malformed mesh: {0}")]
    MalformedMesh(String),

    /// Truncated or unreadable serialized geodata.
    #[error("geodata io error: {0}")]
    Io(#[from] std::io::Error),
}
