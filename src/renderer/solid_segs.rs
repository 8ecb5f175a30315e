//! Horizontal occlusion: the sorted list of fully covered column ranges.
//!
//! ```text
//!  [MIN..-1]  [a..b]  [c..d]  …  [width..MAX]
//!  sentinel   user entries, sorted, gaps ≥ 1   sentinel
//! ```
//!
//! The sentinels only bound the searches; user ranges never merge into
//! them, so a completely covered screen is exactly one `[0, width-1]` entry
//! between the two.

use smallvec::SmallVec;

use crate::renderer::RenderError;

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct ClipRange {
    pub first: i32,
    pub last: i32,
}

impl ClipRange {
    #[inline(always)]
    pub const fn new(first: i32, last: i32) -> Self {
        Self { first, last }
    }
}

/// Visible pieces of a clipped range, left to right.
pub type Spans = SmallVec<[ClipRange; 8]>;

#[derive(Clone, Debug)]
pub struct SolidSegs {
    segs: Vec<ClipRange>,
    width: i32,
    capacity: usize,
}

impl SolidSegs {
    /// `capacity` counts the two sentinels.
    pub fn new(width: usize, capacity: usize) -> Self {
        let mut s = Self {
            segs: Vec::with_capacity(capacity.max(2)),
            width: width as i32,
            capacity: capacity.max(2),
        };
        s.clear();
        s
    }

    /// Reset to the two sentinels.
    pub fn clear(&mut self) {
        self.segs.clear();
        self.segs.push(ClipRange::new(i32::MIN, -1));
        self.segs.push(ClipRange::new(self.width, i32::MAX));
    }

    /// Every entry including the sentinels.
    #[inline]
    pub fn entries(&self) -> &[ClipRange] {
        &self.segs
    }

    /// Covered on-screen ranges.
    #[inline]
    pub fn user_spans(&self) -> &[ClipRange] {
        &self.segs[1..self.segs.len() - 1]
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_screen_full(&self) -> bool {
        self.segs.len() == 3 && self.segs[1] == ClipRange::new(0, self.width - 1)
    }

    /// `true` when `first..=last` lies inside one covered range.
    pub fn is_occluded(&self, first: i32, last: i32) -> bool {
        let mut i = 0;
        while self.segs[i].last < last {
            i += 1;
        }
        first >= self.segs[i].first
    }

    #[inline]
    fn clamp(&self, first: i32, last: i32) -> Option<(i32, i32)> {
        let first = first.max(0);
        let last = last.min(self.width - 1);
        (first <= last).then_some((first, last))
    }

    /// First entry (after the left sentinel) that touches or follows `first`.
    #[inline]
    fn find_start(&self, first: i32) -> usize {
        let mut start = 1;
        while self.segs[start].last < first - 1 {
            start += 1;
        }
        start
    }

    fn insert(&mut self, at: usize, range: ClipRange) -> Result<(), RenderError> {
        if self.segs.len() >= self.capacity {
            return Err(RenderError::SolidSegOverflow {
                capacity: self.capacity,
            });
        }
        self.segs.insert(at, range);
        Ok(())
    }

    /// Mark `first..=last` as solid; returns the pieces that were visible
    /// before the insertion.
    pub fn clip_solid(&mut self, first: i32, last: i32) -> Result<Spans, RenderError> {
        let mut out = Spans::new();
        let Some((first, last)) = self.clamp(first, last) else {
            return Ok(out);
        };
        let right = self.segs.len() - 1;
        let start = self.find_start(first);

        if first < self.segs[start].first {
            if start == right || last < self.segs[start].first - 1 {
                // disjoint from everything: new entry
                out.push(ClipRange::new(first, last));
                self.insert(start, ClipRange::new(first, last))?;
                return Ok(out);
            }
            // grows `start` to the left
            out.push(ClipRange::new(first, self.segs[start].first - 1));
            self.segs[start].first = first;
        }

        if last <= self.segs[start].last {
            return Ok(out);
        }

        let mut next = start;
        while next + 1 < right && last >= self.segs[next + 1].first - 1 {
            out.push(ClipRange::new(
                self.segs[next].last + 1,
                self.segs[next + 1].first - 1,
            ));
            next += 1;
            if last <= self.segs[next].last {
                self.segs[start].last = self.segs[next].last;
                self.segs.drain(start + 1..=next);
                return Ok(out);
            }
        }

        out.push(ClipRange::new(self.segs[next].last + 1, last));
        self.segs[start].last = last;
        self.segs.drain(start + 1..=next);
        Ok(out)
    }

    /// Visible pieces of `first..=last` without marking anything.
    pub fn clip_pass(&self, first: i32, last: i32) -> Spans {
        let mut out = Spans::new();
        let Some((first, last)) = self.clamp(first, last) else {
            return out;
        };
        let right = self.segs.len() - 1;
        let mut start = self.find_start(first);

        if first < self.segs[start].first {
            if start == right || last < self.segs[start].first - 1 {
                out.push(ClipRange::new(first, last));
                return out;
            }
            out.push(ClipRange::new(first, self.segs[start].first - 1));
        }

        if last <= self.segs[start].last {
            return out;
        }

        while start + 1 < right && last >= self.segs[start + 1].first - 1 {
            out.push(ClipRange::new(
                self.segs[start].last + 1,
                self.segs[start + 1].first - 1,
            ));
            start += 1;
            if last <= self.segs[start].last {
                return out;
            }
        }

        out.push(ClipRange::new(self.segs[start].last + 1, last));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn with(width: usize, ranges: &[(i32, i32)]) -> SolidSegs {
        let mut s = SolidSegs::new(width, width.div_ceil(2) + 2);
        for &(a, b) in ranges {
            s.clip_solid(a, b).unwrap();
        }
        s
    }

    fn spans(v: &[(i32, i32)]) -> Vec<ClipRange> {
        v.iter().map(|&(a, b)| ClipRange::new(a, b)).collect()
    }

    /// Maximal runs of `flag == want` in `lo..=hi`.
    fn runs(cover: &[bool], lo: i32, hi: i32, want: bool) -> Vec<ClipRange> {
        let mut out = Vec::new();
        let mut x = lo;
        while x <= hi {
            if cover[x as usize] == want {
                let start = x;
                while x <= hi && cover[x as usize] == want {
                    x += 1;
                }
                out.push(ClipRange::new(start, x - 1));
            } else {
                x += 1;
            }
        }
        out
    }

    #[test]
    fn merge_chain_of_touching_spans() {
        let mut s = with(64, &[(0, 5), (8, 11), (14, 20)]);

        // bridges both gaps (6-7 and 12-13)
        let shown = s.clip_solid(6, 13).unwrap();
        assert_eq!(shown.as_slice(), spans(&[(6, 7), (12, 13)]).as_slice());
        assert_eq!(s.user_spans(), spans(&[(0, 20)]).as_slice());
    }

    #[test]
    fn emits_only_uncovered_pieces() {
        let mut s = with(64, &[(3, 4)]);
        let shown = s.clip_solid(0, 9).unwrap();
        assert_eq!(shown.as_slice(), spans(&[(0, 2), (5, 9)]).as_slice());
        assert_eq!(s.user_spans(), spans(&[(0, 9)]).as_slice());

        // fully hidden
        assert!(s.clip_solid(2, 7).unwrap().is_empty());
    }

    #[test]
    fn pass_walls_never_write() {
        let s = with(64, &[(10, 19), (30, 39)]);
        let before = s.entries().to_vec();
        let shown = s.clip_pass(5, 45);
        assert_eq!(shown.as_slice(), spans(&[(5, 9), (20, 29), (40, 45)]).as_slice());
        assert_eq!(s.entries(), before.as_slice());
        assert!(s.clip_pass(12, 17).is_empty());
    }

    #[test]
    fn sentinels_stay_distinct() {
        let mut s = with(16, &[]);
        assert!(!s.is_screen_full());
        s.clip_solid(0, 7).unwrap();
        s.clip_solid(8, 15).unwrap();
        assert!(s.is_screen_full());
        assert_eq!(s.entries()[0], ClipRange::new(i32::MIN, -1));
        assert_eq!(s.entries()[2], ClipRange::new(16, i32::MAX));
        s.clear();
        assert_eq!(s.entries().len(), 2);
    }

    #[test]
    fn out_of_screen_input_is_clamped() {
        let mut s = with(16, &[]);
        let shown = s.clip_solid(-10, 40).unwrap();
        assert_eq!(shown.as_slice(), spans(&[(0, 15)]).as_slice());
        assert!(s.is_screen_full());
    }

    #[test]
    fn overflow_is_an_error() {
        let mut s = SolidSegs::new(16, 3);
        s.clip_solid(2, 3).unwrap();
        let err = s.clip_solid(6, 7).unwrap_err();
        assert!(matches!(err, RenderError::SolidSegOverflow { capacity: 3 }));
        // merging never needs a slot
        s.clip_solid(4, 5).unwrap();
    }

    #[test]
    fn occlusion_query() {
        let s = with(64, &[(10, 20)]);
        assert!(s.is_occluded(12, 18));
        assert!(s.is_occluded(10, 20));
        assert!(!s.is_occluded(9, 15));
        assert!(!s.is_occluded(15, 21));
        assert!(!s.is_occluded(30, 40));
    }

    #[test]
    fn random_insertions_match_interval_reference() {
        const W: usize = 64;
        let mut rng = StdRng::seed_from_u64(0xC011_0511);

        for _round in 0..300 {
            let mut s = SolidSegs::new(W, W.div_ceil(2) + 2);
            let mut cover = [false; W];

            for _ in 0..rng.gen_range(1..40) {
                let a = rng.gen_range(-4..W as i32 + 4);
                let b = (a + rng.gen_range(0..12)).min(W as i32 + 8);
                let (lo, hi) = (a.max(0), b.min(W as i32 - 1));

                let expect_shown = if lo <= hi { runs(&cover, lo, hi, false) } else { vec![] };

                if rng.gen_bool(0.3) {
                    let before = s.entries().to_vec();
                    assert_eq!(s.clip_pass(a, b).to_vec(), expect_shown);
                    assert_eq!(s.entries(), before.as_slice());
                    continue;
                }

                let shown = s.clip_solid(a, b).unwrap();
                assert_eq!(shown.to_vec(), expect_shown, "insert {a}..={b}");
                for x in lo.max(0)..=hi {
                    cover[x as usize] = true;
                }

                // list mirrors the coverage and keeps its shape
                assert_eq!(s.user_spans(), runs(&cover, 0, W as i32 - 1, true).as_slice());
                let e = s.entries();
                assert!(e.len() >= 2);
                assert!(e.windows(2).all(|p| p[0].last + 1 < p[1].first || p[0].first < 0));
                assert_eq!(s.is_screen_full(), cover.iter().all(|&c| c));
            }
        }
    }
}
