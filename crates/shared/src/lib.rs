// geobuild - Shared Library
// Components used by both the geodata pipeline and its tooling.

pub mod log;
pub mod util;
