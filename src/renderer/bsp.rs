//! Front-to-back BSP walk with an explicit, bounded stack.
//!
//! The near child of every node is descended into immediately; the far child
//! is pushed only when its bounding box can still show something. Leaves
//! project their sprites, then feed their segs through [`Software::add_line`].

use log::trace;

use crate::{
    math::{
        fixed::{Fixed, to_fixed},
        trig::{ANG180, Angle, point_to_angle},
    },
    renderer::{RenderError, Software},
    world::{Aabb, Child, Level, MapObject, SegmentId, SubsectorId},
};

/// Pending far children: a fixed slot array and a top index.
#[derive(Clone, Debug)]
pub struct BspStack {
    slots: Vec<u16>,
    top: usize,
}

impl BspStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity],
            top: 0,
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.top = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.top
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.top == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn push(&mut self, child: u16) -> Result<(), RenderError> {
        let Some(slot) = self.slots.get_mut(self.top) else {
            return Err(RenderError::BspStackOverflow {
                capacity: self.slots.len(),
            });
        };
        *slot = child;
        self.top += 1;
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Option<u16> {
        if self.top == 0 {
            return None;
        }
        self.top -= 1;
        Some(self.slots[self.top])
    }
}

/* Silhouette corners per view-point cell, as indices into
 * [top, bottom, left, right]: (x1, y1, x2, y2). Cell 5 is inside the box. */
const BOXTOP: usize = 0;
const BOXBOTTOM: usize = 1;
const BOXLEFT: usize = 2;
const BOXRIGHT: usize = 3;

const CHECK_COORD: [[usize; 4]; 11] = [
    [BOXRIGHT, BOXTOP, BOXLEFT, BOXBOTTOM],
    [BOXRIGHT, BOXTOP, BOXLEFT, BOXTOP],
    [BOXRIGHT, BOXBOTTOM, BOXLEFT, BOXTOP],
    [0; 4],
    [BOXLEFT, BOXTOP, BOXLEFT, BOXBOTTOM],
    [0; 4],
    [BOXRIGHT, BOXBOTTOM, BOXRIGHT, BOXTOP],
    [0; 4],
    [BOXLEFT, BOXTOP, BOXRIGHT, BOXBOTTOM],
    [BOXLEFT, BOXBOTTOM, BOXRIGHT, BOXBOTTOM],
    [BOXLEFT, BOXBOTTOM, BOXRIGHT, BOXTOP],
];

/// Box covering both halves of node `raw`, if it is a node.
fn node_bbox(level: &Level, raw: u16) -> Option<Aabb> {
    match Child::decode(raw) {
        Child::Node(n) => {
            let node = &level.nodes[n as usize];
            Some(node.bbox[0].union(&node.bbox[1]))
        }
        Child::Subsector(_) => None,
    }
}

impl Software {
    pub(crate) fn render_bsp<F>(
        &mut self,
        level: &Level,
        objects: &[MapObject],
        inspect: &mut F,
    ) -> Result<(), RenderError>
    where
        F: FnMut(&Software, SubsectorId),
    {
        let mut current = level.bsp_root();
        loop {
            match Child::decode(current) {
                Child::Node(n) => {
                    let node = &level.nodes[n as usize];
                    let side = node.point_side(self.view.x, self.view.y);
                    let far = side ^ 1;
                    if self.check_bbox(&node.bbox[far]) {
                        self.bsp_stack.push(node.child[far])?;
                        self.stats.stack_high_water =
                            self.stats.stack_high_water.max(self.bsp_stack.len());
                    } else {
                        self.stats.boxes_rejected += 1;
                        trace!("node {n}: far side {far} rejected");
                    }
                    current = node.child[side];
                    continue;
                }
                Child::Subsector(ss) => {
                    self.subsector(level, objects, ss)?;
                    inspect(&*self, ss);
                }
            }

            if self.solid_segs.is_screen_full() {
                break;
            }

            // the box was visible when pushed; nearer leaves may have covered it since
            let next = loop {
                let Some(raw) = self.bsp_stack.pop() else {
                    break None;
                };
                match node_bbox(level, raw) {
                    Some(bb) if !self.check_bbox(&bb) => self.stats.boxes_rejected += 1,
                    _ => break Some(raw),
                }
            };
            match next {
                Some(raw) => current = raw,
                None => break,
            }
        }
        Ok(())
    }

    fn subsector(
        &mut self,
        level: &Level,
        objects: &[MapObject],
        ss: SubsectorId,
    ) -> Result<(), RenderError> {
        self.stats.subsectors.push(ss);
        self.project_sprites(objects, ss);
        for seg in level.segs_of(ss) {
            self.add_line(level, seg as SegmentId)?;
        }
        Ok(())
    }

    /// `true` if any part of `bbox` may be visible.
    pub(crate) fn check_bbox(&self, bbox: &Aabb) -> bool {
        let (vx, vy) = (self.view.x, self.view.y);
        let coords: [Fixed; 4] = [
            to_fixed(bbox.max.y),
            to_fixed(bbox.min.y),
            to_fixed(bbox.min.x),
            to_fixed(bbox.max.x),
        ];

        let boxx = if vx <= coords[BOXLEFT] {
            0
        } else if vx < coords[BOXRIGHT] {
            1
        } else {
            2
        };
        let boxy = if vy >= coords[BOXTOP] {
            0
        } else if vy > coords[BOXBOTTOM] {
            1
        } else {
            2
        };
        let pos = (boxy << 2) + boxx;
        if pos == 5 {
            return true;
        }

        let [x1, y1, x2, y2] = CHECK_COORD[pos].map(|i| coords[i]);
        let Some((sx1, sx2)) = self.clip_to_screen(
            point_to_angle(x1.wrapping_sub(vx), y1.wrapping_sub(vy)),
            point_to_angle(x2.wrapping_sub(vx), y2.wrapping_sub(vy)),
        ) else {
            return false;
        };

        !self.solid_segs.is_occluded(sx1, sx2 - 1)
    }

    /// Clip the global angle pair `angle1 ≥ angle2` (counter-clockwise
    /// span) to the field of view and map it to columns `x1..x2`
    /// (exclusive). `None` if nothing is left.
    fn clip_to_screen(&self, angle1: Angle, angle2: Angle) -> Option<(i32, i32)> {
        let span = angle1.wrapping_sub(angle2);
        // the whole view surrounds it
        if span >= ANG180 {
            return Some((0, self.projection.width));
        }

        let clip = self.view.clip_angle;
        let clip2 = clip.wrapping_add(clip);
        let mut a1 = angle1.wrapping_sub(self.view.angle);
        let mut a2 = angle2.wrapping_sub(self.view.angle);

        let tspan = a1.wrapping_add(clip);
        if tspan > clip2 {
            if tspan - clip2 >= span {
                return None;
            }
            a1 = clip;
        }
        let tspan = clip.wrapping_sub(a2);
        if tspan > clip2 {
            if tspan - clip2 >= span {
                return None;
            }
            a2 = clip.wrapping_neg();
        }

        let x1 = self.projection.angle_to_x(a1);
        let x2 = self.projection.angle_to_x(a2);
        (x1 < x2).then_some((x1, x2))
    }

    /// Cull, clip and classify one seg, then rasterize whatever part of it
    /// the solid segments still show.
    pub(crate) fn add_line(&mut self, level: &Level, seg_idx: SegmentId) -> Result<(), RenderError> {
        self.stats.segs_considered += 1;
        let seg = &level.segs[seg_idx as usize];
        let v1 = &level.vertices[seg.v1 as usize];
        let v2 = &level.vertices[seg.v2 as usize];
        let (vx, vy) = (self.view.x, self.view.y);

        // viewer on the seg's back side or on its line
        let cross = (v2.fx() as i64 - v1.fx() as i64) * (vy as i64 - v1.fy() as i64)
            - (v2.fy() as i64 - v1.fy() as i64) * (vx as i64 - v1.fx() as i64);
        if cross >= 0 {
            return Ok(());
        }

        let angle1 = point_to_angle(v1.fx().wrapping_sub(vx), v1.fy().wrapping_sub(vy));
        let angle2 = point_to_angle(v2.fx().wrapping_sub(vx), v2.fy().wrapping_sub(vy));
        if angle1.wrapping_sub(angle2) >= ANG180 {
            return Ok(());
        }
        let Some((x1, x2)) = self.clip_to_screen(angle1, angle2) else {
            return Ok(());
        };

        let front = &level.sectors[seg.front_sector as usize];
        let solid = match seg.back_sector {
            None => true,
            Some(b) => {
                let back = &level.sectors[b as usize];
                // closed door
                back.ceil_h <= front.floor_h || back.floor_h >= front.ceil_h
            }
        };

        let spans = if solid {
            self.solid_segs.clip_solid(x1, x2 - 1)?
        } else {
            self.solid_segs.clip_pass(x1, x2 - 1)
        };
        if spans.is_empty() {
            return Ok(());
        }

        let wall = self.setup_wall(level, seg_idx, angle1, solid)?;
        for span in spans {
            self.store_wall_range(&wall, span.first, span.last);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::math::trig::degrees_to_angle;
    use crate::renderer::{ViewPoint, view::View};
    use glam::IVec2;

    fn looking(x: i32, y: i32, deg: i32) -> Software {
        let mut sw = Software::new(RenderConfig::default()).unwrap();
        let eye = ViewPoint::new(to_fixed(x), to_fixed(y), to_fixed(41), degrees_to_angle(deg));
        sw.view = View::setup(eye, &sw.projection);
        sw
    }

    fn aabb(x0: i32, y0: i32, x1: i32, y1: i32) -> Aabb {
        Aabb {
            min: IVec2::new(x0, y0),
            max: IVec2::new(x1, y1),
        }
    }

    #[test]
    fn stack_is_bounded() {
        let mut s = BspStack::new(2);
        s.push(1).unwrap();
        s.push(2).unwrap();
        assert_eq!(s.push(3), Err(RenderError::BspStackOverflow { capacity: 2 }));
        assert_eq!(s.pop(), Some(2));
        assert_eq!(s.pop(), Some(1));
        assert_eq!(s.pop(), None);
        assert!(s.is_empty());
    }

    #[test]
    fn box_around_viewer_is_visible() {
        let sw = looking(0, 0, 0);
        assert!(sw.check_bbox(&aabb(-10, -10, 10, 10)));
    }

    #[test]
    fn box_behind_viewer_is_rejected() {
        let sw = looking(0, 0, 0);
        assert!(!sw.check_bbox(&aabb(-300, -20, -200, 20)));
        assert!(sw.check_bbox(&aabb(200, -20, 300, 20)));
    }

    #[test]
    fn box_outside_the_frustum_is_rejected() {
        // 60° to the left of a 90° field of view
        let sw = looking(0, 0, 0);
        assert!(!sw.check_bbox(&aabb(90, 250, 110, 270)));
    }

    #[test]
    fn occluded_box_is_rejected() {
        let mut sw = looking(0, 0, 0);
        let bb = aabb(200, -20, 300, 20);
        assert!(sw.check_bbox(&bb));

        // cover the middle of the screen
        sw.solid_segs.clip_solid(16, 47).unwrap();
        assert!(!sw.check_bbox(&bb));

        // a box wider than the covered range still peeks out
        assert!(sw.check_bbox(&aabb(200, -150, 300, 150)));
    }

    #[test]
    fn back_faces_are_culled() {
        use crate::world::samples;
        let level = samples::corridor(512, 32).unwrap();

        // outside the corridor looking at the north wall's back
        let mut sw = looking(256, 100, 270);
        sw.add_line(&level, 0).unwrap();
        assert!(sw.stats.wall_ranges.is_empty());

        // inside, facing it
        let mut sw = looking(256, 0, 90);
        sw.add_line(&level, 0).unwrap();
        assert!(!sw.stats.wall_ranges.is_empty());
    }
}
