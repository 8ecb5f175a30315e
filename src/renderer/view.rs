//! Camera state and the angle ↔ column projection tables.

use crate::math::{
    fixed::{FRACBITS, FRACUNIT, Fixed, fixed_div, fixed_mul},
    trig::{ANG90, ANGLETOFINESHIFT, Angle, BinaryAngle, FINEANGLES, cosine, fine_tangent, sine},
};

/// Where the frame is rendered from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewPoint {
    pub x: Fixed,
    pub y: Fixed,
    /// Eye height (absolute, not relative to the floor).
    pub z: Fixed,
    pub angle: Angle,
}

impl ViewPoint {
    /// Accepts either angle profile.
    pub fn new<A: BinaryAngle>(x: Fixed, y: Fixed, z: Fixed, angle: A) -> Self {
        Self {
            x,
            y,
            z,
            angle: angle.to_bam32(),
        }
    }
}

/// Per-frame camera with cached trig.
#[derive(Clone, Copy, Debug, Default)]
pub struct View {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub angle: Angle,
    pub sin: Fixed,
    pub cos: Fixed,
    /// Half field of view; anything wider is off screen.
    pub clip_angle: Angle,
}

impl View {
    pub fn setup(eye: ViewPoint, projection: &Projection) -> Self {
        Self {
            x: eye.x,
            y: eye.y,
            z: eye.z,
            angle: eye.angle,
            sin: sine(eye.angle),
            cos: cosine(eye.angle),
            clip_angle: projection.clip_angle,
        }
    }
}

/*──────────────────────────── projection ───────────────────────────────*/

/// Screen-geometry constants and lookup tables, built once per resolution.
#[derive(Clone, Debug)]
pub struct Projection {
    pub width: i32,
    pub height: i32,
    pub center_x: i32,
    pub center_y: i32,
    pub center_x_frac: Fixed,
    pub center_y_frac: Fixed,
    /// `center_x / tan(fov / 2)` in 16.16; scale of a wall at unit distance.
    pub projection: Fixed,
    pub clip_angle: Angle,
    angle_to_x: Vec<i32>,
    x_to_angle: Vec<Angle>,
}

impl Projection {
    /// `fov` is the horizontal field of view in fine angles.
    pub fn new(width: usize, height: usize, fov: usize) -> Self {
        let width = width as i32;
        let height = height as i32;
        let center_x = width / 2;
        let center_y = height / 2;
        let center_x_frac = center_x << FRACBITS;
        let center_y_frac = center_y << FRACBITS;

        let focal = fixed_div(center_x_frac, fine_tangent(FINEANGLES / 4 + fov / 2));

        // fine angle (relative, −90°..+90°) → column; −1 / width+1 mark
        // directions outside the field of view
        let mut angle_to_x: Vec<i32> = (0..FINEANGLES / 2)
            .map(|i| {
                let t = fine_tangent(i);
                if t > FRACUNIT * 2 {
                    -1
                } else if t < -FRACUNIT * 2 {
                    width + 1
                } else {
                    let t = fixed_mul(t, focal);
                    let x = (center_x_frac - t + FRACUNIT - 1) >> FRACBITS;
                    x.clamp(-1, width + 1)
                }
            })
            .collect();

        // smallest angle that maps onto each column
        let x_to_angle: Vec<Angle> = (0..=width)
            .map(|x| {
                let i = angle_to_x
                    .iter()
                    .position(|&ax| ax <= x)
                    .unwrap_or(FINEANGLES / 2 - 1);
                ((i as Angle) << ANGLETOFINESHIFT).wrapping_sub(ANG90)
            })
            .collect();

        for ax in &mut angle_to_x {
            *ax = (*ax).clamp(0, width);
        }

        Self {
            width,
            height,
            center_x,
            center_y,
            center_x_frac,
            center_y_frac,
            projection: focal,
            clip_angle: x_to_angle[0],
            angle_to_x,
            x_to_angle,
        }
    }

    /// Screen column of a view-relative angle already clipped to the
    /// field of view. Always in `0..=width`.
    #[inline]
    pub fn angle_to_x(&self, relative: Angle) -> i32 {
        let i = (relative.wrapping_add(ANG90) >> ANGLETOFINESHIFT) as usize;
        self.angle_to_x[i.min(self.angle_to_x.len() - 1)]
    }

    /// View-relative angle of column `x` (`0..=width`).
    #[inline]
    pub fn x_to_angle(&self, x: i32) -> Angle {
        self.x_to_angle[x.clamp(0, self.width) as usize]
    }
}
