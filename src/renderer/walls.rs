//! Per-column wall rasterization.
//!
//! Screen heights are tracked in 4.12 fixed point (`HEIGHTBITS`), stepped
//! linearly across a span together with the projection scale. Every column
//! tightens the clip bands. A column that gets pixels from the wall, or whose
//! band closes, records the wall's depth (nearest wins).

use bitflags::bitflags;

use crate::{
    config::{MAX_SCALE, MIN_SCALE, MINZ},
    math::{
        fixed::{FRACBITS, Fixed, approx_distance, fixed_div, fixed_mul, to_fixed},
        trig::{ANG90, Angle, sine},
    },
    renderer::{RenderError, Software, WallRange},
    world::{Level, SegmentId},
};

const HEIGHTBITS: u32 = 12;
const HEIGHTUNIT: Fixed = 1 << HEIGHTBITS;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WallMarks: u8 {
        /// One-sided or closed door: the column closes completely.
        const SOLID   = 0x01;
        /// Back ceiling is lower; an upper step is drawn.
        const TOP     = 0x02;
        /// Back floor is higher; a lower step is drawn.
        const BOTTOM  = 0x04;
        /// Ceiling height changes across the seg.
        const CEILING = 0x08;
        /// Floor height changes across the seg.
        const FLOOR   = 0x10;
    }
}

/// Per-column open window: rows `ceil + 1 ..= floor - 1` are still visible.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipBands {
    pub ceil: Vec<i32>,
    pub floor: Vec<i32>,
    height: i32,
}

impl ClipBands {
    pub fn new(width: usize, height: usize) -> Self {
        let mut c = Self {
            ceil: vec![0; width],
            floor: vec![0; width],
            height: height as i32,
        };
        c.reset();
        c
    }

    pub fn reset(&mut self) {
        self.ceil.fill(-1);
        self.floor.fill(self.height);
    }

    #[inline]
    pub fn is_closed(&self, x: usize) -> bool {
        self.ceil[x] + 1 >= self.floor[x]
    }
}

/// Seg constants shared by every span of one `add_line`.
#[derive(Clone, Debug)]
pub(crate) struct WallSetup {
    seg: SegmentId,
    marks: WallMarks,
    normal_angle: Angle,
    /// Perpendicular distance from the eye to the wall line.
    distance: Fixed,
    color: u8,
    // eye-relative heights, 4.12
    world_top: Fixed,
    world_bottom: Fixed,
    world_high: Fixed,
    world_low: Fixed,
}

impl Software {
    /// `angle1` is the global angle from the eye to `v1`.
    pub(crate) fn setup_wall(
        &self,
        level: &Level,
        seg_idx: SegmentId,
        angle1: Angle,
        solid: bool,
    ) -> Result<WallSetup, RenderError> {
        let seg = &level.segs[seg_idx as usize];
        let v1 = &level.vertices[seg.v1 as usize];

        let normal_angle = seg.angle.wrapping_add(ANG90);
        let offset = (normal_angle.wrapping_sub(angle1) as i32)
            .unsigned_abs()
            .min(ANG90);
        let hyp = approx_distance(
            v1.fx().wrapping_sub(self.view.x),
            v1.fy().wrapping_sub(self.view.y),
        );
        let distance = fixed_mul(hyp, sine(ANG90 - offset));
        if distance <= 0 {
            return Err(RenderError::DegenerateWall {
                seg: seg_idx,
                distance,
            });
        }

        let shift = FRACBITS - HEIGHTBITS;
        let eye = |h: i32| to_fixed(h).wrapping_sub(self.view.z) >> shift;

        let front = &level.sectors[seg.front_sector as usize];
        let (world_top, world_bottom) = (eye(front.ceil_h), eye(front.floor_h));
        let mut wall = WallSetup {
            seg: seg_idx,
            marks: WallMarks::SOLID,
            normal_angle,
            distance: distance.max(MINZ),
            color: front.color,
            world_top,
            world_bottom,
            world_high: world_top,
            world_low: world_bottom,
        };

        if let Some(back) = seg.back_sector.filter(|_| !solid) {
            let back = &level.sectors[back as usize];
            wall.world_high = eye(back.ceil_h);
            wall.world_low = eye(back.floor_h);

            let mut marks = WallMarks::empty();
            marks.set(WallMarks::TOP, wall.world_high < world_top);
            marks.set(WallMarks::BOTTOM, wall.world_low > world_bottom);
            marks.set(WallMarks::CEILING, wall.world_high != world_top);
            marks.set(WallMarks::FLOOR, wall.world_low != world_bottom);
            wall.marks = marks;
        }
        Ok(wall)
    }

    /// Projection scale of the wall along global direction `visangle`.
    fn scale_from_global_angle(&self, wall: &WallSetup, visangle: Angle) -> Fixed {
        let anglea = ANG90.wrapping_add(visangle.wrapping_sub(self.view.angle));
        let angleb = ANG90.wrapping_add(visangle.wrapping_sub(wall.normal_angle));
        let num = fixed_mul(self.projection.projection, sine(angleb));
        let den = fixed_mul(wall.distance, sine(anglea));

        if den > num >> FRACBITS {
            fixed_div(num, den).clamp(MIN_SCALE, MAX_SCALE)
        } else {
            MAX_SCALE
        }
    }

    /// Rasterize columns `start..=stop` of `wall`.
    pub(crate) fn store_wall_range(&mut self, wall: &WallSetup, start: i32, stop: i32) {
        self.stats.wall_ranges.push(WallRange {
            seg: wall.seg,
            first: start,
            last: stop,
        });

        let scale1 = self.scale_from_global_angle(
            wall,
            self.view.angle.wrapping_add(self.projection.x_to_angle(start)),
        );
        let scale_step = if stop > start {
            let scale2 = self.scale_from_global_angle(
                wall,
                self.view.angle.wrapping_add(self.projection.x_to_angle(stop)),
            );
            (scale2 - scale1) / (stop - start)
        } else {
            0
        };

        let center = self.projection.center_y_frac >> (FRACBITS - HEIGHTBITS);
        let edge = |world: Fixed| {
            (
                center - fixed_mul(world, scale1),
                -fixed_mul(scale_step, world),
            )
        };
        let (mut top_frac, top_step) = edge(wall.world_top);
        let (mut bottom_frac, bottom_step) = edge(wall.world_bottom);
        let (mut pix_high, pix_high_step) = edge(wall.world_high);
        let (mut pix_low, pix_low_step) = edge(wall.world_low);

        let height = self.projection.height;
        let mut scale = scale1;

        for x in start..=stop {
            let col = x as usize;
            let was_open = !self.clip.is_closed(col);
            let ceil = self.clip.ceil[col];
            let floor = self.clip.floor[col];

            let yl = ((top_frac + HEIGHTUNIT - 1) >> HEIGHTBITS).max(ceil + 1);
            let yh = (bottom_frac >> HEIGHTBITS).min(floor - 1);
            let mut drawn = false;

            if wall.marks.contains(WallMarks::SOLID) {
                self.framebuffer.fill_column(x, yl, yh, wall.color);
                drawn = yl <= yh;
                self.clip.ceil[col] = height;
                self.clip.floor[col] = -1;
            } else {
                let mut new_ceil = ceil;
                let mut new_floor = floor;

                if wall.marks.contains(WallMarks::TOP) {
                    let mid = (pix_high >> HEIGHTBITS).min(floor - 1);
                    if mid >= yl {
                        self.framebuffer.fill_column(x, yl, mid, wall.color);
                        new_ceil = mid;
                        drawn = true;
                    } else {
                        new_ceil = yl - 1;
                    }
                } else if wall.marks.contains(WallMarks::CEILING) {
                    new_ceil = yl - 1;
                }

                if wall.marks.contains(WallMarks::BOTTOM) {
                    let mid = ((pix_low + HEIGHTUNIT - 1) >> HEIGHTBITS).max(new_ceil + 1);
                    if mid <= yh {
                        self.framebuffer.fill_column(x, mid, yh, wall.color);
                        new_floor = mid;
                        drawn = true;
                    } else {
                        new_floor = yh + 1;
                    }
                } else if wall.marks.contains(WallMarks::FLOOR) {
                    new_floor = yh + 1;
                }

                // never reopen rows, never leave the screen range
                self.clip.ceil[col] = new_ceil.clamp(ceil, height);
                self.clip.floor[col] = new_floor.clamp(-1, floor);
            }

            if drawn || (was_open && self.clip.is_closed(col)) {
                let depth = fixed_div(self.projection.projection, scale);
                let d = &mut self.column_depth[col];
                if *d == 0 || depth < *d {
                    *d = depth;
                }
            }

            scale += scale_step;
            top_frac += top_step;
            bottom_frac += bottom_step;
            pix_high += pix_high_step;
            pix_low += pix_low_step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{COLOR_BLACK, COLOR_DARK, RenderConfig};
    use crate::math::trig::degrees_to_angle;
    use crate::renderer::{ViewPoint, view::View};
    use crate::world::samples;

    fn looking(x: Fixed, y: Fixed, deg: i32) -> Software {
        let mut sw = Software::new(RenderConfig::default()).unwrap();
        let eye = ViewPoint::new(x, y, to_fixed(41), degrees_to_angle(deg));
        sw.view = View::setup(eye, &sw.projection);
        sw
    }

    #[test]
    fn facing_wall_has_flat_depth() {
        let level = samples::corridor(512, 32).unwrap();
        let mut sw = looking(to_fixed(256), 0, 0);
        sw.add_line(&level, 1).unwrap();

        let r = sw.stats.wall_ranges[0];
        let depths = &sw.column_depth[r.first as usize..=r.last as usize];
        let (lo, hi) = (
            depths.iter().min().copied().unwrap(),
            depths.iter().max().copied().unwrap(),
        );
        assert!(lo > to_fixed(240), "depth {lo}");
        assert!(hi - lo < to_fixed(4), "{lo}..{hi}");

        for x in r.first..=r.last {
            assert!(sw.clip.is_closed(x as usize));
        }
        assert!(sw.clip.ceil[0] == -1 && sw.clip.floor[0] == 40);
    }

    #[test]
    fn portal_draws_both_steps_and_leaves_a_window() {
        // back cell: floor raised to 32, ceiling lowered to 96
        let level = samples::cells(&[(0, 128), (32, 96)]).unwrap();
        let mut sw = looking(to_fixed(16), 0, 0);
        // east boundary of cell 0
        sw.add_line(&level, 2).unwrap();

        let (ceil, floor) = (sw.clip.ceil[32], sw.clip.floor[32]);
        assert!((3..=5).contains(&ceil), "ceil {ceil}");
        assert!((22..=24).contains(&floor), "floor {floor}");

        let fb = &sw.framebuffer;
        assert_eq!(fb.pixel(32, 1), COLOR_DARK);
        assert_eq!(fb.pixel(32, 12), COLOR_BLACK);
        assert_eq!(fb.pixel(32, 28), COLOR_DARK);

        // the steps were drawn, so the column knows how far away they are
        let depth = sw.column_depth[32];
        assert!((to_fixed(100)..=to_fixed(116)).contains(&depth), "depth {depth}");
        assert!(sw.solid_segs.user_spans().is_empty());
    }

    #[test]
    fn equal_height_portal_leaves_clips_alone() {
        let level = samples::cells(&[(0, 128), (0, 128)]).unwrap();
        let mut sw = looking(to_fixed(16), 0, 0);
        sw.add_line(&level, 2).unwrap();

        assert!(!sw.stats.wall_ranges.is_empty());
        assert!(sw.clip.ceil.iter().all(|&c| c == -1));
        assert!(sw.clip.floor.iter().all(|&f| f == 40));
        assert!(sw.framebuffer.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn viewer_on_a_vertex_is_degenerate() {
        let level = samples::corridor(512, 32).unwrap();
        // one fixed unit below the north wall's first vertex
        let mut sw = looking(0, to_fixed(32) - 1, 45);
        let err = sw.add_line(&level, 0).unwrap_err();
        assert_eq!(err, RenderError::DegenerateWall { seg: 0, distance: 0 });
        assert!(!err.is_capacity());
    }

    #[test]
    fn scale_is_clamped() {
        let level = samples::corridor(512, 32).unwrap();
        let sw = looking(to_fixed(256), 0, 0);
        let wall = sw.setup_wall(&level, 1, degrees_to_angle(7), true).unwrap();

        for deg in [-44, -20, 0, 20, 44] {
            let s = sw.scale_from_global_angle(&wall, degrees_to_angle(deg));
            assert!((MIN_SCALE..=MAX_SCALE).contains(&s));
        }
        // grazing directions saturate rather than blow up
        let s = sw.scale_from_global_angle(&wall, degrees_to_angle(89));
        assert!((MIN_SCALE..=MAX_SCALE).contains(&s));
    }
}
