use crate::math::fixed::Fixed;
use crate::world::geometry::{Level, Node, NodeId, SubsectorId};

pub const CHILD_MASK: u16 = 0x7FFF;

pub const SUBSECTOR_BIT: u16 = 0x8000;

/// Decoded BSP child reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Child {
    Node(NodeId),
    Subsector(SubsectorId),
}

impl Child {
    #[inline(always)]
    pub fn decode(raw: u16) -> Self {
        if raw & SUBSECTOR_BIT != 0 {
            Child::Subsector(raw & CHILD_MASK)
        } else {
            Child::Node(raw)
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────
//                       Level – public helpers
// ──────────────────────────────────────────────────────────────────────────
impl Level {
    /// Raw root reference: `nodes.len()-1`, or subsector 0 for a node-less map.
    #[inline(always)]
    pub fn bsp_root(&self) -> u16 {
        match self.nodes.len() {
            0 => SUBSECTOR_BIT,
            n => (n - 1) as u16,
        }
    }

    pub(crate) fn child_in_range(&self, raw: u16) -> bool {
        match Child::decode(raw) {
            Child::Node(n) => (n as usize) < self.nodes.len(),
            Child::Subsector(s) => (s as usize) < self.subsectors.len(),
        }
    }

    /// Walk the BSP and return the subsector containing the fixed-point
    /// position `(x, y)`.
    pub fn locate_subsector(&self, x: Fixed, y: Fixed) -> SubsectorId {
        let mut raw = self.bsp_root();
        loop {
            match Child::decode(raw) {
                Child::Subsector(ss) => return ss,
                Child::Node(n) => {
                    let node = &self.nodes[n as usize];
                    raw = node.child[node.point_side(x, y)];
                }
            }
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────
//                       Node geometry helpers
// ──────────────────────────────────────────────────────────────────────────
impl Node {
    /// 0 = right of the splitter (front), 1 = left (back).
    ///
    /// Axis-aligned splitters take a shortcut; the general case compares the
    /// two halves of the 2-D cross product in 64 bits.
    #[inline]
    pub fn point_side(&self, x: Fixed, y: Fixed) -> usize {
        let nx = (self.x as i64) << 16;
        let ny = (self.y as i64) << 16;
        let (x, y) = (x as i64, y as i64);

        if self.dx == 0 {
            return if x <= nx {
                (self.dy > 0) as usize
            } else {
                (self.dy < 0) as usize
            };
        }
        if self.dy == 0 {
            return if y <= ny {
                (self.dx < 0) as usize
            } else {
                (self.dx > 0) as usize
            };
        }

        let left = self.dy as i64 * (x - nx);
        let right = (y - ny) * self.dx as i64;
        if right < left { 0 } else { 1 }
    }
}

// ──────────────────────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fixed::to_fixed;
    use crate::world::{geometry::Aabb, samples};
    use glam::IVec2;

    fn node(x: i32, y: i32, dx: i32, dy: i32) -> Node {
        let b = Aabb {
            min: IVec2::ZERO,
            max: IVec2::ZERO,
        };
        Node {
            x,
            y,
            dx,
            dy,
            bbox: [b, b],
            child: [SUBSECTOR_BIT, SUBSECTOR_BIT | 1],
        }
    }

    #[test]
    fn axis_fast_paths_agree_with_cross_product() {
        // northward splitter at x = 10: east is the right side
        let n = node(10, 0, 0, 64);
        assert_eq!(n.point_side(to_fixed(20), to_fixed(5)), 0);
        assert_eq!(n.point_side(to_fixed(0), to_fixed(5)), 1);

        // eastward splitter at y = 0: south is the right side
        let n = node(0, 0, 64, 0);
        assert_eq!(n.point_side(to_fixed(5), to_fixed(-3)), 0);
        assert_eq!(n.point_side(to_fixed(5), to_fixed(3)), 1);

        // diagonal splitter, general path
        let n = node(0, 0, 64, 64);
        assert_eq!(n.point_side(to_fixed(10), to_fixed(0)), 0);
        assert_eq!(n.point_side(to_fixed(0), to_fixed(10)), 1);
    }

    #[test]
    fn decode_children() {
        assert_eq!(Child::decode(0x8003), Child::Subsector(3));
        assert_eq!(Child::decode(0x0003), Child::Node(3));
    }

    #[test]
    fn locate_in_cells() {
        let lvl = samples::cells(&[(0, 128); 5]).unwrap();
        for cell in 0..5 {
            let x = to_fixed(cell * samples::CELL_LENGTH + 17);
            assert_eq!(lvl.locate_subsector(x, to_fixed(3)), cell as u16);
        }
    }

    #[test]
    fn nodeless_level_is_one_leaf() {
        let lvl = samples::corridor(512, 32).unwrap();
        assert_eq!(lvl.bsp_root(), SUBSECTOR_BIT);
        assert_eq!(lvl.locate_subsector(to_fixed(100), 0), 0);
    }

    #[test]
    fn root_children_sit_on_their_sides() {
        let lvl = samples::cells(&[(0, 128); 4]).unwrap();
        let Child::Node(root) = Child::decode(lvl.bsp_root()) else {
            panic!("cells level has nodes");
        };
        let root = &lvl.nodes[root as usize];
        for side in 0..=1 {
            let bb = &root.bbox[side];
            let mid = (bb.min + bb.max) / 2;
            assert_eq!(root.point_side(to_fixed(mid.x), to_fixed(mid.y)), side);
        }
    }
}
