pub mod bsp;
mod geometry;
pub mod samples;

pub use geometry::{
    Aabb, Level, LevelError, MapObject, Node, NodeId, Sector, SectorId, Seg, SegmentId, Subsector,
    SubsectorId, Vertex, VertexId,
};

pub use bsp::{CHILD_MASK, Child, SUBSECTOR_BIT};
