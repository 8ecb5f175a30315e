//! Binary angles and compressed trigonometry.
//!
//! ```text
//! BAM32  0x0000_0000 = 0°   0x4000_0000 = 90°   0x8000_0000 = 180°
//! BAM16  0x0000      = 0°   0x4000      = 90°   0x8000      = 180°
//! fine   8192 steps per turn  (BAM32 >> 19)
//! ```
//!
//! The three classic tables (sine, tangent, tan→angle) are stored at a
//! quarter of the fine resolution and compressed with
//! [`CompressedTable`]. Reconstruction is exact against the double-precision
//! [`reference`] generators.

use once_cell::sync::Lazy;

use crate::math::{
    fixed::Fixed,
    tables::{CompressedTable, TableError},
};

/// 32-bit binary angle measure (full turn = 2^32, wraps naturally).
pub type Angle = u32;

/// 16-bit binary angle measure (full turn = 2^16).
pub type Angle16 = u16;

pub const ANG45: Angle = 0x2000_0000;
pub const ANG90: Angle = 0x4000_0000;
pub const ANG180: Angle = 0x8000_0000;
pub const ANG270: Angle = 0xC000_0000;

pub const FINEANGLES: usize = 8192;
pub const FINEMASK: usize = FINEANGLES - 1;
pub const ANGLETOFINESHIFT: u32 = 19;

pub const SLOPEBITS: u32 = 11;
pub const SLOPERANGE: usize = 1 << SLOPEBITS;

/// Fine indices folded into one stored sample.
const REDUCE_SHIFT: u32 = 2;

const SINE_SAMPLES: usize = (FINEANGLES / 4) >> REDUCE_SHIFT;
const TANGENT_SAMPLES: usize = (FINEANGLES / 4) >> REDUCE_SHIFT;
const TANTOANGLE_SAMPLES: usize = (SLOPERANGE >> REDUCE_SHIFT) + 1;

/// Steep near the asymptote, flat near zero.
const TANGENT_LAYOUT: [(usize, u32); 3] = [(64, 1), (256, 3), (TANGENT_SAMPLES, 5)];
const SINE_LAYOUT: [(usize, u32); 1] = [(SINE_SAMPLES, 2)];
const TANTOANGLE_LAYOUT: [(usize, u32); 1] = [(TANTOANGLE_SAMPLES, 5)];

/*──────────────────────────── angle profiles ───────────────────────────*/

/// Anything that can be read as a binary angle.
pub trait BinaryAngle: Copy {
    fn to_bam32(self) -> Angle;
    fn from_bam32(angle: Angle) -> Self;

    /// Index into the fine (8192-step) angle space.
    #[inline(always)]
    fn fine_index(self) -> usize {
        (self.to_bam32() >> ANGLETOFINESHIFT) as usize
    }
}

impl BinaryAngle for Angle {
    #[inline(always)]
    fn to_bam32(self) -> Angle {
        self
    }
    #[inline(always)]
    fn from_bam32(angle: Angle) -> Self {
        angle
    }
}

impl BinaryAngle for Angle16 {
    #[inline(always)]
    fn to_bam32(self) -> Angle {
        (self as Angle) << 16
    }
    #[inline(always)]
    fn from_bam32(angle: Angle) -> Self {
        (angle >> 16) as Angle16
    }
}

/// Whole degrees → BAM32.
pub fn degrees_to_angle(deg: i32) -> Angle {
    ((deg.rem_euclid(360) as u64) << 32).div_euclid(360) as Angle
}

/// BAM32 → whole degrees (truncating).
pub fn angle_to_degrees(angle: Angle) -> i32 {
    ((angle as u64 * 360) >> 32) as i32
}

/*──────────────────────────── table sources ────────────────────────────*/

/// Double-precision generators the compressed tables must reproduce.
pub mod reference {
    use super::{FINEANGLES, SLOPERANGE};
    use std::f64::consts::{PI, TAU};

    const SCALE: f64 = 65536.0;

    /// First-quadrant sine, sample `r` covers fine angles `4r..4r+4`.
    pub fn sine_quarter(r: usize) -> i32 {
        let a = (4 * r + 2) as f64 * TAU / FINEANGLES as f64;
        (a.sin() * SCALE).round() as i32
    }

    /// Tangent over `(-90°, 0°]`, sample `t` covers fine indices `4t..4t+4`.
    pub fn tangent_half(t: usize) -> i32 {
        let a = ((4 * t + 2) as f64 - 2048.0) * PI / 4096.0;
        (a.tan() * SCALE).round() as i32
    }

    /// Arctangent of slope `4u / 2048` as BAM32.
    pub fn tan_to_angle(u: usize) -> i32 {
        let slope = (4 * u) as f64 / SLOPERANGE as f64;
        let bam = slope.atan() * 4_294_967_296.0 / TAU;
        bam.round() as i64 as i32
    }
}

struct TrigTables {
    sine: CompressedTable,
    tangent: CompressedTable,
    tan_to_angle: CompressedTable,
}

impl TrigTables {
    fn build() -> Result<Self, TableError> {
        let sine: Vec<i32> = (0..SINE_SAMPLES).map(reference::sine_quarter).collect();
        let tangent: Vec<i32> = (0..TANGENT_SAMPLES).map(reference::tangent_half).collect();
        let atan: Vec<i32> = (0..TANTOANGLE_SAMPLES).map(reference::tan_to_angle).collect();

        Ok(Self {
            sine: CompressedTable::compress(&sine, &SINE_LAYOUT)?,
            tangent: CompressedTable::compress(&tangent, &TANGENT_LAYOUT)?,
            tan_to_angle: CompressedTable::compress(&atan, &TANTOANGLE_LAYOUT)?,
        })
    }
}

static TABLES: Lazy<TrigTables> =
    Lazy::new(|| TrigTables::build().expect("trig residuals fit in 32 bits"));

/// Bytes held by all three compressed tables.
pub fn table_storage_bytes() -> usize {
    let t = &*TABLES;
    t.sine.storage_bytes() + t.tangent.storage_bytes() + t.tan_to_angle.storage_bytes()
}

/*──────────────────────────────── lookups ──────────────────────────────*/

/// Sine of fine angle `fine` (any value, wrapped) as 16.16.
#[inline]
pub fn fine_sine(fine: usize) -> Fixed {
    let r = (fine & FINEMASK) >> REDUCE_SHIFT;
    let q = SINE_SAMPLES;
    match r / q {
        0 => TABLES.sine.get(r),
        1 => TABLES.sine.get(2 * q - 1 - r),
        2 => -TABLES.sine.get(r - 2 * q),
        _ => -TABLES.sine.get(4 * q - 1 - r),
    }
}

#[inline]
pub fn fine_cosine(fine: usize) -> Fixed {
    fine_sine(fine.wrapping_add(FINEANGLES / 4))
}

#[inline]
pub fn sine<A: BinaryAngle>(angle: A) -> Fixed {
    fine_sine(angle.fine_index())
}

#[inline]
pub fn cosine<A: BinaryAngle>(angle: A) -> Fixed {
    fine_cosine(angle.fine_index())
}

/// Tangent for fine index `0..FINEANGLES/2` (−90°..+90°), 16.16.
#[inline]
pub fn fine_tangent(fine: usize) -> Fixed {
    let fine = fine & (FINEANGLES / 2 - 1);
    if fine >= FINEANGLES / 4 {
        -TABLES.tangent.get((FINEANGLES / 2 - 1 - fine) >> REDUCE_SHIFT)
    } else {
        TABLES.tangent.get(fine >> REDUCE_SHIFT)
    }
}

/// Angle whose tangent is `slope / SLOPERANGE`, for `slope` in `0..=SLOPERANGE`.
#[inline]
pub fn tan_to_angle(slope: usize) -> Angle {
    TABLES.tan_to_angle.get(slope.min(SLOPERANGE) >> REDUCE_SHIFT) as Angle
}

/// `num / den` scaled to `0..=SLOPERANGE`; tiny denominators saturate.
#[inline]
pub fn slope_div(num: u32, den: u32) -> usize {
    if den < 512 {
        return SLOPERANGE;
    }
    let ans = ((num as u64) << 3) / (den >> 8) as u64;
    ans.min(SLOPERANGE as u64) as usize
}

/// Direction of vector `(dx, dy)` as BAM32 (0 = east, counter-clockwise).
pub fn point_to_angle(dx: Fixed, dy: Fixed) -> Angle {
    if dx == 0 && dy == 0 {
        return 0;
    }
    let (x, y) = (dx.unsigned_abs(), dy.unsigned_abs());
    let atan = |num, den| tan_to_angle(slope_div(num, den));

    match (dx >= 0, dy >= 0) {
        // octants 0 / 1
        (true, true) if x > y => atan(y, x),
        (true, true) => ANG90 - 1 - atan(x, y),
        // octants 7 / 6
        (true, false) if x > y => atan(y, x).wrapping_neg(),
        (true, false) => ANG270 + atan(x, y),
        // octants 3 / 2
        (false, true) if x > y => ANG180 - 1 - atan(y, x),
        (false, true) => ANG90 + atan(x, y),
        // octants 4 / 5
        (false, false) if x > y => ANG180 + atan(y, x),
        (false, false) => ANG270 - 1 - atan(x, y),
    }
}
