//! Small hand-built levels for the demo binaries and tests.
//!
//! ```text
//!  cells(&[a, b, c])               corridor(len, hw)
//!
//!   y=+64 ┌────┬────┬────┐          y=+hw ─────────────┐
//!         │ a  │ b  │ c  │                             │ x=len
//!   y=-64 └────┴────┴────┘          y=-hw ─────────────┘
//!         x=0  128  256  384
//! ```

use glam::IVec2;

use crate::config::{COLOR_DARK, COLOR_LIGHT, COLOR_WHITE};
use crate::world::{
    bsp::SUBSECTOR_BIT,
    geometry::{Aabb, Level, LevelError, MapObject, Node, Sector, Seg, Subsector, Vertex},
};

pub const CELL_LENGTH: i32 = 128;
pub const CELL_HALF_WIDTH: i32 = 64;

const PALETTE: [u8; 3] = [COLOR_DARK, COLOR_LIGHT, COLOR_WHITE];

fn vertex(x: i32, y: i32) -> Vertex {
    Vertex {
        pos: IVec2::new(x, y),
    }
}

/// A row of square-ish cells along +x, each its own sector with the given
/// `(floor, ceiling)`. Neighbouring cells share two-sided boundaries; the
/// outer walls are solid. A cell whose ceiling is at or below its
/// neighbour's floor acts as a closed door.
pub fn cells(heights: &[(i32, i32)]) -> Result<Level, LevelError> {
    let n = heights.len();
    if n == 0 {
        return Err(LevelError::Empty);
    }

    // vertex 2k = (kL, -H), 2k+1 = (kL, +H)
    let vertices: Vec<Vertex> = (0..=n as i32)
        .flat_map(|k| {
            [
                vertex(k * CELL_LENGTH, -CELL_HALF_WIDTH),
                vertex(k * CELL_LENGTH, CELL_HALF_WIDTH),
            ]
        })
        .collect();

    let sectors: Vec<Sector> = heights
        .iter()
        .enumerate()
        .map(|(i, &(floor_h, ceil_h))| Sector {
            floor_h,
            ceil_h,
            color: PALETTE[i % PALETTE.len()],
        })
        .collect();

    let mut segs = Vec::with_capacity(n * 4);
    let mut subsectors = Vec::with_capacity(n);
    for i in 0..n {
        let (sb, st) = (2 * i as u16, 2 * i as u16 + 1);
        let (eb, et) = (sb + 2, st + 2);
        let s = i as u16;
        let west = (i > 0).then(|| s - 1);
        let east = (i + 1 < n).then(|| s + 1);

        let first = segs.len() as u16;
        // clockwise so the cell interior is on each seg's right
        segs.push(Seg::between(&vertices, sb, st, s, west));
        segs.push(Seg::between(&vertices, st, et, s, None));
        segs.push(Seg::between(&vertices, et, eb, s, east));
        segs.push(Seg::between(&vertices, eb, sb, s, None));
        subsectors.push(Subsector {
            sector: s,
            first_seg: first,
            seg_count: 4,
        });
    }

    let mut nodes = Vec::new();
    build_cell_nodes(0, n, &mut nodes);

    Level::new("CELLS", vertices, segs, sectors, subsectors, nodes)
}

fn cell_box(lo: usize, hi: usize) -> Aabb {
    Aabb {
        min: IVec2::new(lo as i32 * CELL_LENGTH, -CELL_HALF_WIDTH),
        max: IVec2::new(hi as i32 * CELL_LENGTH, CELL_HALF_WIDTH),
    }
}

/// Split `lo..hi` at its middle with a northward line; east is the right side.
fn build_cell_nodes(lo: usize, hi: usize, nodes: &mut Vec<Node>) -> u16 {
    if hi - lo == 1 {
        return SUBSECTOR_BIT | lo as u16;
    }
    let mid = (lo + hi) / 2;
    let east = build_cell_nodes(mid, hi, nodes);
    let west = build_cell_nodes(lo, mid, nodes);
    nodes.push(Node {
        x: mid as i32 * CELL_LENGTH,
        y: -CELL_HALF_WIDTH,
        dx: 0,
        dy: 2 * CELL_HALF_WIDTH,
        bbox: [cell_box(mid, hi), cell_box(lo, mid)],
        child: [east, west],
    });
    (nodes.len() - 1) as u16
}

/// Straight corridor from `x = 0` to `x = length`, `2 * half_width` wide,
/// closed at the far end and open behind `x = 0`.
pub fn corridor(length: i32, half_width: i32) -> Result<Level, LevelError> {
    let vertices = vec![
        vertex(0, half_width),
        vertex(length, half_width),
        vertex(length, -half_width),
        vertex(0, -half_width),
    ];
    let segs = vec![
        Seg::between(&vertices, 0, 1, 0, None),
        Seg::between(&vertices, 1, 2, 0, None),
        Seg::between(&vertices, 2, 3, 0, None),
    ];
    let sectors = vec![Sector {
        floor_h: 0,
        ceil_h: 128,
        color: COLOR_WHITE,
    }];
    let subsectors = vec![Subsector {
        sector: 0,
        first_seg: 0,
        seg_count: 3,
    }];
    Level::new("CORRIDOR", vertices, segs, sectors, subsectors, Vec::new())
}

/// Mixed-height cells with a closed door near the far end.
pub fn demo() -> Result<(Level, Vec<MapObject>), LevelError> {
    let level = cells(&[
        (0, 128),
        (8, 112),
        (0, 96),
        (24, 128),
        (0, 160),
        (0, 0),
        (0, 128),
    ])?;
    let objects = vec![
        MapObject::at(300, -20, 0, 56, 20),
        MapObject::at(420, 30, 24, 56, 60),
        MapObject::at(560, 0, 0, 32, 0),
    ];
    Ok((level, objects))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::bsp::Child;

    #[test]
    fn cells_tree_covers_every_leaf_once() {
        let lvl = cells(&[(0, 128); 7]).unwrap();
        assert_eq!(lvl.nodes.len(), 6);

        let mut seen = vec![0; 7];
        let mut stack = vec![lvl.bsp_root()];
        while let Some(raw) = stack.pop() {
            match Child::decode(raw) {
                Child::Subsector(ss) => seen[ss as usize] += 1,
                Child::Node(n) => stack.extend(lvl.nodes[n as usize].child),
            }
        }
        assert_eq!(seen, vec![1; 7]);
    }

    #[test]
    fn boundaries_link_neighbours() {
        let lvl = cells(&[(0, 128); 3]).unwrap();
        let middle: Vec<_> = lvl.segs_of(1).map(|i| lvl.segs[i].back_sector).collect();
        assert_eq!(middle, vec![Some(0), None, Some(2), None]);
    }

    #[test]
    fn empty_cells_rejected() {
        assert_eq!(cells(&[]).unwrap_err(), LevelError::Empty);
    }
}
