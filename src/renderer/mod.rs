//! Software BSP renderer.
//!
//! One [`Software`] value owns every piece of per-frame state (view, solid
//! segments, clip bands, column depth, BSP stack, vissprites and the packed
//! framebuffer). [`Software::render_frame`] resets it, walks the tree front
//! to back, rasterizes walls as their columns become visible and finally
//! draws the sprites collected along the way.
//!
//! ```text
//! ViewPoint ─► View ─► BSP walk ─► add_line ─► SolidSegs ─► wall columns
//!                         │                                   │ depth
//!                         └──► project sprites ──► sort ──► draw (occluded)
//! ```

pub mod bsp;
pub mod framebuffer;
pub mod solid_segs;
pub mod sprites;
pub mod view;
pub mod walls;

use log::{debug, warn};
use thiserror::Error;

use crate::{
    config::{ConfigError, RenderConfig},
    math::fixed::Fixed,
    world::{Level, MapObject, SegmentId, SubsectorId},
};

pub use bsp::BspStack;
pub use framebuffer::Framebuffer;
pub use solid_segs::{ClipRange, SolidSegs, Spans};
pub use sprites::VisSprite;
pub use view::{Projection, View, ViewPoint};
pub use walls::{ClipBands, WallMarks};

/// Reasons a frame is abandoned. Nothing drawn so far is meaningful.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("BSP stack overflow (capacity {capacity})")]
    BspStackOverflow { capacity: usize },

    #[error("solid segment list overflow (capacity {capacity})")]
    SolidSegOverflow { capacity: usize },

    #[error("seg {seg} projects at non-positive distance {distance}")]
    DegenerateWall { seg: SegmentId, distance: Fixed },
}

impl RenderError {
    /// A fixed-size buffer ran out, as opposed to bad geometry.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            RenderError::BspStackOverflow { .. } | RenderError::SolidSegOverflow { .. }
        )
    }
}

/// Columns `first..=last` of `seg` that reached the rasterizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WallRange {
    pub seg: SegmentId,
    pub first: i32,
    pub last: i32,
}

/// What the last frame did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderStats {
    /// Leaves in the order they were rendered.
    pub subsectors: Vec<SubsectorId>,
    pub segs_considered: usize,
    pub wall_ranges: Vec<WallRange>,
    pub boxes_rejected: usize,
    pub stack_high_water: usize,
    pub sprites_projected: usize,
    pub sprites_dropped: usize,
    pub sprite_pixels_drawn: usize,
    pub sprite_pixels_occluded: usize,
}

impl RenderStats {
    fn reset(&mut self) {
        self.subsectors.clear();
        self.wall_ranges.clear();
        self.segs_considered = 0;
        self.boxes_rejected = 0;
        self.stack_high_water = 0;
        self.sprites_projected = 0;
        self.sprites_dropped = 0;
        self.sprite_pixels_drawn = 0;
        self.sprite_pixels_occluded = 0;
    }
}

/// Frame render context.
pub struct Software {
    config: RenderConfig,
    projection: Projection,
    view: View,
    solid_segs: SolidSegs,
    clip: ClipBands,
    /// Distance of the nearest wall that closed each column; 0 = open.
    column_depth: Vec<Fixed>,
    bsp_stack: BspStack,
    sprites: Vec<VisSprite>,
    /// Leaf of every object for the current frame (`None` = inactive).
    object_leaf: Vec<Option<SubsectorId>>,
    framebuffer: Framebuffer,
    stats: RenderStats,
}

impl Software {
    pub fn new(config: RenderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (w, h) = (config.width, config.height);
        Ok(Self {
            projection: Projection::new(w, h, config.field_of_view),
            view: View::default(),
            solid_segs: SolidSegs::new(w, config.max_solid_segs()),
            clip: ClipBands::new(w, h),
            column_depth: vec![0; w],
            bsp_stack: BspStack::new(config.bsp_stack_depth),
            sprites: Vec::with_capacity(config.max_vissprites),
            object_leaf: Vec::new(),
            framebuffer: Framebuffer::new(w, h, config.format),
            stats: RenderStats::default(),
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    #[inline]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    #[inline]
    pub fn view(&self) -> &View {
        &self.view
    }

    #[inline]
    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    #[inline]
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    #[inline]
    pub fn solid_segs(&self) -> &SolidSegs {
        &self.solid_segs
    }

    #[inline]
    pub fn clip_bands(&self) -> &ClipBands {
        &self.clip
    }

    #[inline]
    pub fn column_depth(&self) -> &[Fixed] {
        &self.column_depth
    }

    /// Sprites of the last frame, far to near once drawing has run.
    #[inline]
    pub fn vissprites(&self) -> &[VisSprite] {
        &self.sprites
    }

    /// Render one frame from `eye`.
    pub fn render_frame(
        &mut self,
        level: &Level,
        objects: &[MapObject],
        eye: ViewPoint,
    ) -> Result<&Framebuffer, RenderError> {
        self.render_frame_with(level, objects, eye, |_, _| {})
    }

    /// [`render_frame`](Self::render_frame) that also hands the context to
    /// `inspect` after every rendered leaf.
    pub fn render_frame_with<F>(
        &mut self,
        level: &Level,
        objects: &[MapObject],
        eye: ViewPoint,
        mut inspect: F,
    ) -> Result<&Framebuffer, RenderError>
    where
        F: FnMut(&Software, SubsectorId),
    {
        self.begin_frame(level, objects, eye);

        if let Err(e) = self.render_bsp(level, objects, &mut inspect) {
            warn!("frame aborted: {e}");
            return Err(e);
        }
        self.draw_sprites(objects);

        let s = &self.stats;
        debug!(
            "frame: {} subsectors, {} segs, {} wall ranges, {} boxes rejected, stack peak {}, \
             sprites {} (+{} dropped), sprite px {}/{} occluded",
            s.subsectors.len(),
            s.segs_considered,
            s.wall_ranges.len(),
            s.boxes_rejected,
            s.stack_high_water,
            s.sprites_projected,
            s.sprites_dropped,
            s.sprite_pixels_drawn,
            s.sprite_pixels_occluded,
        );
        Ok(&self.framebuffer)
    }

    fn begin_frame(&mut self, level: &Level, objects: &[MapObject], eye: ViewPoint) {
        self.view = View::setup(eye, &self.projection);
        self.solid_segs.clear();
        self.clip.reset();
        self.column_depth.fill(0);
        self.bsp_stack.clear();
        self.sprites.clear();
        self.framebuffer.clear(self.config.clear_color);
        self.stats.reset();

        self.object_leaf.clear();
        self.object_leaf.extend(objects.iter().map(|o| {
            o.active
                .then(|| o.subsector.unwrap_or_else(|| level.locate_subsector(o.x, o.y)))
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{COLOR_BLACK, COLOR_LIGHT, VIEWHEIGHT};
    use crate::math::fixed::to_fixed;
    use crate::math::trig::{ANG180, degrees_to_angle};
    use crate::world::samples;

    fn eye(x: i32, y: i32, floor: i32, deg: i32) -> ViewPoint {
        ViewPoint::new(
            to_fixed(x),
            to_fixed(y),
            to_fixed(floor + VIEWHEIGHT),
            degrees_to_angle(deg),
        )
    }

    fn renderer() -> Software {
        Software::new(RenderConfig::default()).unwrap()
    }

    fn ranges_of(stats: &RenderStats, seg: SegmentId) -> Vec<(i32, i32)> {
        stats
            .wall_ranges
            .iter()
            .filter(|r| r.seg == seg)
            .map(|r| (r.first, r.last))
            .collect()
    }

    #[test]
    fn bad_config_is_rejected() {
        let cfg = RenderConfig {
            max_vissprites: 0,
            ..RenderConfig::default()
        };
        assert!(Software::new(cfg).is_err());
    }

    #[test]
    fn straight_corridor_is_symmetric() {
        let level = samples::corridor(512, 32).unwrap();
        let mut sw = renderer();
        sw.render_frame(&level, &[], eye(16, 0, 0, 0)).unwrap();

        let stats = sw.stats();
        assert_eq!(stats.subsectors, vec![0]);

        // seg 0 = north wall (left half), seg 2 = south wall (right half)
        let north = ranges_of(stats, 0);
        let south = ranges_of(stats, 2);
        assert_eq!(north.len(), 1);
        assert_eq!(south.len(), 1);
        let (n0, n1) = north[0];
        let (s0, s1) = south[0];
        assert_eq!(n0, 0);
        assert_eq!(s1, 63);
        assert!((n1 - (63 - s0)).abs() <= 1, "north ends {n1}, south starts {s0}");

        // far wall fills the gap between them
        let end = ranges_of(stats, 1);
        assert_eq!(end, vec![(n1 + 1, s0 - 1)]);

        assert!(sw.column_depth().iter().all(|&d| d > 0));
        assert!(sw.solid_segs().is_screen_full());

        // near side walls are deeper at the screen edge than the far wall
        assert!(sw.column_depth()[0] < sw.column_depth()[32]);
    }

    #[test]
    fn fully_blocked_view_stops_after_one_leaf() {
        // 4 units (MINZ) in front of the east wall of the last cell
        let level = samples::cells(&[(0, 128); 4]).unwrap();
        let mut sw = renderer();
        sw.render_frame(&level, &[], eye(4 * samples::CELL_LENGTH - 4, 0, 0, 0))
            .unwrap();

        let stats = sw.stats();
        assert_eq!(stats.subsectors, vec![3]);
        assert_eq!(sw.solid_segs().user_spans(), &[ClipRange::new(0, 63)]);
        assert!(sw.solid_segs().is_screen_full());
        // both cells behind the viewer fail the box test
        assert_eq!(stats.boxes_rejected, 2);
        assert_eq!(stats.stack_high_water, 0);
    }

    #[test]
    fn cells_are_visited_front_to_back() {
        let level = samples::cells(&[(0, 128); 7]).unwrap();
        let mut sw = renderer();
        sw.render_frame(&level, &[], eye(20, 0, 0, 0)).unwrap();
        assert_eq!(sw.stats().subsectors, (0..7).collect::<Vec<u16>>());

        // and back to front when turned around at the other end
        sw.render_frame(&level, &[], eye(7 * samples::CELL_LENGTH - 20, 0, 0, 180))
            .unwrap();
        assert_eq!(sw.stats().subsectors, (0..7).rev().collect::<Vec<u16>>());
    }

    #[test]
    fn tiny_bsp_stack_aborts_the_frame() {
        let level = samples::cells(&[(0, 128); 7]).unwrap();
        let cfg = RenderConfig {
            bsp_stack_depth: 1,
            ..RenderConfig::default()
        };
        let mut sw = Software::new(cfg).unwrap();
        let err = sw.render_frame(&level, &[], eye(20, 0, 0, 0)).unwrap_err();
        assert_eq!(err, RenderError::BspStackOverflow { capacity: 1 });
        assert!(err.is_capacity());
        assert!(!RenderError::DegenerateWall { seg: 0, distance: 0 }.is_capacity());
    }

    #[test]
    fn clips_and_depth_only_tighten() {
        let (level, objects) = samples::demo().unwrap();
        let mut sw = renderer();

        let views = [
            (64, 0, 0),
            (64, 0, 30),
            (192, 0, -45),
            (448, 0, 180),
            (576, 0, 200),
            (832, 0, 135),
        ];
        for (x, y, deg) in views {
            let ss = level.locate_subsector(to_fixed(x), to_fixed(y));
            let floor = level.sectors[level.subsectors[ss as usize].sector as usize].floor_h;

            let mut prev: Option<(Vec<i32>, Vec<i32>, Vec<Fixed>)> = None;
            let mut seen = Vec::new();
            sw.render_frame_with(&level, &objects, eye(x, y, floor, deg), |sw, ss| {
                assert!(!seen.contains(&ss), "leaf {ss} visited twice");
                seen.push(ss);

                let now = (
                    sw.clip_bands().ceil.clone(),
                    sw.clip_bands().floor.clone(),
                    sw.column_depth().to_vec(),
                );
                if let Some((ceil, floor, depth)) = &prev {
                    for x in 0..ceil.len() {
                        assert!(now.0[x] >= ceil[x], "ceiling clip widened at {x}");
                        assert!(now.1[x] <= floor[x], "floor clip widened at {x}");
                        if depth[x] != 0 {
                            assert!(now.2[x] != 0 && now.2[x] <= depth[x], "depth grew at {x}");
                        }
                    }
                }
                prev = Some(now);
            })
            .unwrap();
        }
    }

    #[test]
    fn sprite_behind_wall_is_hidden() {
        // cell 1 is a closed door
        let level = samples::cells(&[(0, 128), (0, 0), (0, 128)]).unwrap();
        let mut sw = renderer();

        let empty = sw
            .render_frame(&level, &[], eye(64, 0, 0, 0))
            .unwrap()
            .as_bytes()
            .to_vec();

        // registered with the viewer's leaf but standing past the door
        let mut hidden = MapObject::at(320, 0, 0, 56, 100);
        hidden.subsector = Some(0);
        let fb = sw.render_frame(&level, &[hidden], eye(64, 0, 0, 0)).unwrap();
        assert_eq!(fb.as_bytes(), empty.as_slice());

        let stats = sw.stats();
        assert_eq!(stats.sprites_projected, 1);
        assert_eq!(stats.sprite_pixels_drawn, 0);
        assert!(stats.sprite_pixels_occluded > 0);
    }

    #[test]
    fn sprite_behind_a_step_is_hidden() {
        // cell 1 raises the floor above eye level; the imp stands in cell 2
        let level = samples::cells(&[(0, 128), (60, 128), (0, 128)]).unwrap();
        let mut sw = renderer();

        let empty = sw
            .render_frame(&level, &[], eye(64, 0, 0, 0))
            .unwrap()
            .as_bytes()
            .to_vec();
        let step_depth = sw.column_depth()[32];
        assert!(step_depth > 0 && step_depth < to_fixed(80), "depth {step_depth}");

        let imp = MapObject::at(320, 0, 0, 56, 100);
        let fb = sw.render_frame(&level, &[imp], eye(64, 0, 0, 0)).unwrap();
        assert_eq!(fb.as_bytes(), empty.as_slice());

        let stats = sw.stats();
        assert_eq!(stats.subsectors, vec![0, 1, 2]);
        assert_eq!(stats.sprites_projected, 1);
        assert_eq!(stats.sprite_pixels_drawn, 0);
        assert!(stats.sprite_pixels_occluded > 0);
    }

    #[test]
    fn sprite_in_front_of_wall_is_drawn() {
        let level = samples::cells(&[(0, 128), (0, 0), (0, 128)]).unwrap();
        let mut sw = renderer();
        let objects = [MapObject::at(100, 0, 0, 56, 100)];
        sw.render_frame(&level, &objects, eye(64, 0, 0, 0)).unwrap();

        let stats = sw.stats();
        assert_eq!(stats.sprites_projected, 1);
        assert_eq!(stats.sprite_pixels_occluded, 0);
        assert!(stats.sprite_pixels_drawn > 0);

        let vs = sw.vissprites()[0];
        assert_eq!(sw.framebuffer().pixel(vs.x1, vs.y2), COLOR_LIGHT);
        assert_eq!(sw.framebuffer().pixel(vs.x2, vs.y1), COLOR_LIGHT);
    }

    #[test]
    fn inactive_objects_are_ignored() {
        let level = samples::corridor(512, 32).unwrap();
        let mut ghost = MapObject::at(200, 0, 0, 56, 100);
        ghost.active = false;
        let mut sw = renderer();
        sw.render_frame(&level, &[ghost], eye(16, 0, 0, 0)).unwrap();
        assert_eq!(sw.stats().sprites_projected, 0);
    }

    #[test]
    fn frames_share_no_state() {
        let (level, objects) = samples::demo().unwrap();
        let mut sw = renderer();
        let a = sw
            .render_frame(&level, &objects, eye(64, 0, 0, 0))
            .unwrap()
            .as_bytes()
            .to_vec();
        let stats_a = sw.stats().clone();

        // something completely different in between
        sw.render_frame(&level, &objects, eye(832, 0, 0, 180)).unwrap();

        let b = sw.render_frame(&level, &objects, eye(64, 0, 0, 0)).unwrap();
        assert_eq!(a.as_slice(), b.as_bytes());
        assert_eq!(&stats_a, sw.stats());
        assert!(a.iter().any(|&px| px != COLOR_BLACK));
    }

    #[test]
    fn both_angle_profiles_render_alike() {
        let level = samples::corridor(512, 32).unwrap();
        let mut sw = renderer();
        let wide = sw
            .render_frame(&level, &[], ViewPoint::new(to_fixed(16), 0, to_fixed(41), ANG180 >> 3))
            .unwrap()
            .as_bytes()
            .to_vec();
        let narrow = sw
            .render_frame(&level, &[], ViewPoint::new(to_fixed(16), 0, to_fixed(41), 0x1000u16))
            .unwrap();
        assert_eq!(wide.as_slice(), narrow.as_bytes());
    }
}
