//! 16.16 fixed-point arithmetic.
//!
//! * [`fixed_mul`] / [`fixed_div`] use native 64-bit intermediates.
//! * [`soft`] carries the same contract for cores without a wide multiplier
//!   or a hardware divider; both renditions agree bit for bit.
//!
//! Division never traps: when the quotient cannot be represented the result
//! saturates to `i32::MAX` / `i32::MIN` with the sign of the true quotient.
//! Division by zero falls into the same branch.

/// Signed 16.16 fixed-point value.
pub type Fixed = i32;

pub const FRACBITS: u32 = 16;
pub const FRACUNIT: Fixed = 1 << FRACBITS;

pub const MAXINT: Fixed = i32::MAX;
pub const MININT: Fixed = i32::MIN;

/// Whole map units → fixed.
#[inline(always)]
pub const fn to_fixed(units: i32) -> Fixed {
    units << FRACBITS
}

/// Fixed → whole map units (floor).
#[inline(always)]
pub const fn from_fixed(v: Fixed) -> i32 {
    v >> FRACBITS
}

#[inline(always)]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    ((a as i64 * b as i64) >> FRACBITS) as Fixed
}

/// `true` when `a / b` does not fit a 16.16 value (or `b == 0`).
#[inline(always)]
fn div_overflows(a: Fixed, b: Fixed) -> bool {
    (a.unsigned_abs() >> 14) >= b.unsigned_abs()
}

#[inline(always)]
fn saturate(a: Fixed, b: Fixed) -> Fixed {
    if (a ^ b) < 0 { MININT } else { MAXINT }
}

#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if div_overflows(a, b) {
        return saturate(a, b);
    }
    (((a as i64) << FRACBITS) / b as i64) as Fixed
}

/// Cheap Euclidean distance: `|dx| + |dy| - min/2`.
///
/// Overestimates by at most ~12 % which is fine for perspective scaling.
#[inline]
pub fn approx_distance(dx: Fixed, dy: Fixed) -> Fixed {
    let dx = dx.unsigned_abs() as u64;
    let dy = dy.unsigned_abs() as u64;
    let d = dx + dy - (dx.min(dy) >> 1);
    d.min(MAXINT as u64) as Fixed
}

/*──────────────────────── narrow-core rendition ────────────────────────*/

/// Multiply/divide using only 16×16 products and shift-subtract division.
pub mod soft {
    use super::{FRACBITS, Fixed, div_overflows, saturate};

    /// Product of two 16.16 values built from their 16-bit halves.
    ///
    /// The unsigned low×low term is split into 8-bit quarters so its
    /// partial sums never leave 32 bits; the carry out of the discarded
    /// low half is added back explicitly.
    pub fn mul(a: Fixed, b: Fixed) -> Fixed {
        let ah = a >> 16;
        let bh = b >> 16;
        let al = (a & 0xFFFF) as u32;
        let bl = (b & 0xFFFF) as u32;

        let hh = (ah * bh) << 16;
        let hl = ah * bl as i32;
        let lh = al as i32 * bh;

        let (al_hi, al_lo) = (al >> 8, al & 0xFF);
        let (bl_hi, bl_lo) = (bl >> 8, bl & 0xFF);
        let high = al_hi * bl_hi;
        let mid = al_hi * bl_lo + al_lo * bl_hi;
        let low = al_lo * bl_lo;
        let carry = ((mid & 0xFF) + (low >> 8)) >> 8;
        let ll = (high + (mid >> 8) + carry) as i32;

        hh.wrapping_add(hl).wrapping_add(lh).wrapping_add(ll)
    }

    /// Shift-subtract division producing 16 fractional bits.
    pub fn div(a: Fixed, b: Fixed) -> Fixed {
        if div_overflows(a, b) {
            return saturate(a, b);
        }
        let n = a.unsigned_abs();
        let d = b.unsigned_abs();

        // dividend is `n << 16`; walk its 48 bits MSB first
        let mut rem: u32 = 0;
        let mut quot: u32 = 0;
        for bit in (0..32 + FRACBITS).rev() {
            let next = if bit >= FRACBITS {
                (n >> (bit - FRACBITS)) & 1
            } else {
                0
            };
            // rem < d <= 2^31, so the shift cannot lose bits
            rem = (rem << 1) | next;
            quot <<= 1;
            if rem >= d {
                rem -= d;
                quot |= 1;
            }
        }

        let q = quot as Fixed;
        if (a ^ b) < 0 { q.wrapping_neg() } else { q }
    }
}
