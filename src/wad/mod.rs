pub mod level;
pub mod loader;
pub mod raw;

pub use level::{RawLevel, RawLevelError};
pub use loader::{LoadError, LoadedMap, load_map};
pub use raw::{LumpInfo, Wad, WadBuilder, WadError, WadKind};
