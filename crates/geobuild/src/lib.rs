// geobuild - walkability geodata generation
//
// Turns a map's merged triangle soup into the packed block/column/layer
// grid ("geodata") consumed by the pathfinding server:
//
//   Map -> Voxelizer -> simple NSWE -> complex NSWE -> cells -> ExportBuffer
//
// The passes are one-shot batch transforms per map; nothing here is
// incremental.

pub mod builder;
pub mod compressor;
pub mod error;
pub mod export;
pub mod geometry;
pub mod heightfield;
pub mod map;
pub mod mesh;
pub mod nswe;
pub mod serializer;
pub mod settings;
pub mod voxelizer;

pub use builder::Builder;
pub use error::GeodataError;
pub use export::{ExportBuffer, Geodata, GeodataCell};
pub use map::Map;
pub use settings::BuilderSettings;
