//! Bounding-box sprites: projected while their leaf is rendered, drawn as
//! outlines after the walls, occluded per column by the wall depth.

use log::trace;

use crate::{
    config::{COLOR_DARK, COLOR_LIGHT, MAX_SCALE, MIN_SCALE, MINZ},
    math::fixed::{FRACBITS, FRACUNIT, Fixed, fixed_div, fixed_mul},
    renderer::Software,
    world::{MapObject, SubsectorId},
};

/// Visual half-width floor, so thin objects stay visible.
const MIN_RADIUS: Fixed = 16 * FRACUNIT;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisSprite {
    pub x1: i32, // inclusive
    pub x2: i32, // inclusive
    pub y1: i32,
    pub y2: i32,
    pub scale: Fixed,
    /// View-space depth, comparable with the column depth.
    pub depth: Fixed,
    /// Index into the frame's object slice.
    pub object: usize,
}

impl Software {
    /// Queue every active object registered to `ss`.
    pub(crate) fn project_sprites(&mut self, objects: &[MapObject], ss: SubsectorId) {
        for (i, obj) in objects.iter().enumerate() {
            if self.object_leaf.get(i).copied().flatten() != Some(ss) {
                continue;
            }
            let Some(vs) = self.project_sprite(obj, i) else {
                continue;
            };
            if self.sprites.len() >= self.config.max_vissprites {
                self.stats.sprites_dropped += 1;
                trace!("vissprite list full, dropping object {i}");
                continue;
            }
            self.sprites.push(vs);
            self.stats.sprites_projected += 1;
        }
    }

    fn project_sprite(&self, obj: &MapObject, index: usize) -> Option<VisSprite> {
        let v = &self.view;
        let p = &self.projection;

        let tr_x = obj.x.wrapping_sub(v.x);
        let tr_y = obj.y.wrapping_sub(v.y);
        let tz = fixed_mul(tr_x, v.cos) + fixed_mul(tr_y, v.sin);
        if tz < MINZ {
            return None;
        }
        let tx = fixed_mul(tr_x, v.sin) - fixed_mul(tr_y, v.cos);
        if (tx as i64).abs() > (tz as i64) << 2 {
            return None;
        }

        let xscale = fixed_div(p.projection, tz).clamp(MIN_SCALE, MAX_SCALE);
        let center = (p.center_x_frac + fixed_mul(tx, xscale)) >> FRACBITS;
        let half = fixed_mul((obj.height / 2).max(MIN_RADIUS), xscale) >> FRACBITS;
        let (x1, x2) = (center - half, center + half);
        if x2 < 0 || x1 >= p.width {
            return None;
        }

        let row = |z: Fixed| (p.center_y_frac - fixed_mul(z.wrapping_sub(v.z), xscale)) >> FRACBITS;
        let (y1, y2) = (row(obj.z + obj.height), row(obj.z));
        if y2 < 0 || y1 >= p.height {
            return None;
        }

        Some(VisSprite {
            x1: x1.max(0),
            x2: x2.min(p.width - 1),
            y1: y1.max(0),
            y2: y2.min(p.height - 1),
            scale: xscale,
            depth: tz,
            object: index,
        })
    }

    /// Far to near; a pixel is drawn only where no nearer wall closed the column.
    pub(crate) fn draw_sprites(&mut self, objects: &[MapObject]) {
        // stable: equal scales keep traversal order
        self.sprites.sort_by_key(|vs| vs.scale);

        for i in 0..self.sprites.len() {
            let vs = self.sprites[i];
            let alive = objects.get(vs.object).is_some_and(|o| o.health > 0);
            let color = if alive { COLOR_LIGHT } else { COLOR_DARK };

            for x in vs.x1..=vs.x2 {
                let wall = self.column_depth[x as usize];
                let visible = wall == 0 || vs.depth < wall;

                let edge = x == vs.x1 || x == vs.x2;
                let rows = (vs.y1..=vs.y2).filter(|&y| edge || y == vs.y1 || y == vs.y2);

                for y in rows {
                    if visible {
                        self.framebuffer.set_pixel(x, y, color);
                        self.stats.sprite_pixels_drawn += 1;
                    } else {
                        self.stats.sprite_pixels_occluded += 1;
                    }
                }
            }
        }
    }
}
