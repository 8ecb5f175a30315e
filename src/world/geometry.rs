use glam::IVec2;
use thiserror::Error;

use crate::math::{
    fixed::{Fixed, to_fixed},
    trig::{Angle, point_to_angle},
};
use crate::world::bsp::Child;

pub type VertexId = u16;
pub type SegmentId = u16;
pub type SectorId = u16;
pub type SubsectorId = u16;
pub type NodeId = u16;

/// Runtime snapshot of one map (immutable after construction).
#[derive(Debug)]
pub struct Level {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub segs: Vec<Seg>,
    pub sectors: Vec<Sector>,
    pub subsectors: Vec<Subsector>,
    pub nodes: Vec<Node>,
}

/*----------------------- simple primitives --------------------------*/

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub pos: IVec2,
}

impl Vertex {
    #[inline(always)]
    pub fn fx(&self) -> Fixed {
        to_fixed(self.pos.x)
    }
    #[inline(always)]
    pub fn fy(&self) -> Fixed {
        to_fixed(self.pos.y)
    }
}

#[derive(Clone, Debug)]
pub struct Seg {
    pub v1: VertexId,
    pub v2: VertexId,
    pub front_sector: SectorId,
    /// `None` ⇒ one-sided (solid) wall.
    pub back_sector: Option<SectorId>,
    /// Direction of `v1 → v2`.
    pub angle: Angle,
}

#[derive(Clone, Debug)]
pub struct Sector {
    pub floor_h: i32,
    pub ceil_h: i32,
    pub color: u8,
}

#[derive(Clone, Debug)]
pub struct Subsector {
    pub sector: SectorId,
    pub first_seg: SegmentId,
    pub seg_count: u16,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: IVec2, // (left, bottom)
    pub max: IVec2, // (right, top)
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = IVec2>) -> Self {
        let mut b = Aabb {
            min: IVec2::MAX,
            max: IVec2::MIN,
        };
        for p in points {
            b.min = b.min.min(p);
            b.max = b.max.max(p);
        }
        b
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// BSP splitter. `child[0]` lies on the right of `(dx, dy)`, `child[1]` on
/// the left; `bbox` follows the same order.
#[derive(Clone, Debug)]
pub struct Node {
    pub x: i32,
    pub y: i32,
    pub dx: i32,
    pub dy: i32,
    pub bbox: [Aabb; 2],
    pub child: [u16; 2],
}

/// Anything the sprite pass draws.
#[derive(Clone, Debug)]
pub struct MapObject {
    pub x: Fixed,
    pub y: Fixed,
    /// Feet height.
    pub z: Fixed,
    pub height: Fixed,
    pub health: i32,
    pub active: bool,
    /// Leaf holding the object; resolved through the BSP when absent.
    pub subsector: Option<SubsectorId>,
}

impl MapObject {
    /// Active object standing at map position `(x, y)` on `floor`.
    pub fn at(x: i32, y: i32, floor: i32, height: i32, health: i32) -> Self {
        Self {
            x: to_fixed(x),
            y: to_fixed(y),
            z: to_fixed(floor),
            height: to_fixed(height),
            health,
            active: true,
            subsector: None,
        }
    }
}

/*------------------------------ errors ------------------------------*/

#[derive(Error, Debug, PartialEq)]
pub enum LevelError {
    #[error("level has no subsectors")]
    Empty,

    #[error("seg {seg} references vertex {vertex} (have {count})")]
    BadVertex {
        seg: usize,
        vertex: VertexId,
        count: usize,
    },

    #[error("seg {seg} references sector {sector} (have {count})")]
    BadSector {
        seg: usize,
        sector: SectorId,
        count: usize,
    },

    #[error("subsector {subsector} seg range {first}+{count} exceeds {total} segs")]
    BadSegRange {
        subsector: usize,
        first: SegmentId,
        count: u16,
        total: usize,
    },

    #[error("subsector {subsector} references sector {sector}")]
    BadSubsectorSector { subsector: usize, sector: SectorId },

    #[error("node {node} child {child:#06x} is out of range")]
    BadChild { node: usize, child: u16 },

    #[error("node {node} child {child} does not precede its parent")]
    ChildAfterParent { node: usize, child: NodeId },
}

/*--------------------------- construction ---------------------------*/

impl Seg {
    /// Seg between two vertices with its angle derived from the geometry.
    pub fn between(
        vertices: &[Vertex],
        v1: VertexId,
        v2: VertexId,
        front_sector: SectorId,
        back_sector: Option<SectorId>,
    ) -> Self {
        let a = vertices[v1 as usize];
        let b = vertices[v2 as usize];
        Seg {
            v1,
            v2,
            front_sector,
            back_sector,
            angle: point_to_angle(b.fx() - a.fx(), b.fy() - a.fy()),
        }
    }
}

impl Level {
    /// Assemble a level, rejecting any dangling index.
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Vertex>,
        segs: Vec<Seg>,
        sectors: Vec<Sector>,
        subsectors: Vec<Subsector>,
        nodes: Vec<Node>,
    ) -> Result<Self, LevelError> {
        let level = Level {
            name: name.into(),
            vertices,
            segs,
            sectors,
            subsectors,
            nodes,
        };
        level.validate()?;
        Ok(level)
    }

    fn validate(&self) -> Result<(), LevelError> {
        if self.subsectors.is_empty() {
            return Err(LevelError::Empty);
        }

        for (i, seg) in self.segs.iter().enumerate() {
            for v in [seg.v1, seg.v2] {
                if v as usize >= self.vertices.len() {
                    return Err(LevelError::BadVertex {
                        seg: i,
                        vertex: v,
                        count: self.vertices.len(),
                    });
                }
            }
            for s in std::iter::once(seg.front_sector).chain(seg.back_sector) {
                if s as usize >= self.sectors.len() {
                    return Err(LevelError::BadSector {
                        seg: i,
                        sector: s,
                        count: self.sectors.len(),
                    });
                }
            }
        }

        for (i, ss) in self.subsectors.iter().enumerate() {
            if ss.first_seg as usize + ss.seg_count as usize > self.segs.len() {
                return Err(LevelError::BadSegRange {
                    subsector: i,
                    first: ss.first_seg,
                    count: ss.seg_count,
                    total: self.segs.len(),
                });
            }
            if ss.sector as usize >= self.sectors.len() {
                return Err(LevelError::BadSubsectorSector {
                    subsector: i,
                    sector: ss.sector,
                });
            }
        }

        for (i, node) in self.nodes.iter().enumerate() {
            for &child in &node.child {
                if !self.child_in_range(child) {
                    return Err(LevelError::BadChild { node: i, child });
                }
                // children are stored before their parent, so the tree has no cycles
                if let Child::Node(c) = Child::decode(child)
                    && c as usize >= i
                {
                    return Err(LevelError::ChildAfterParent { node: i, child: c });
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn segs_of(&self, ss: SubsectorId) -> std::ops::Range<usize> {
        let ss = &self.subsectors[ss as usize];
        let first = ss.first_seg as usize;
        first..first + ss.seg_count as usize
    }
}
