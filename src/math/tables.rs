//! Lossless anchor + slope + residual compression for lookup tables.
//!
//! A table is cut into regions. Each region samples the source every
//! `1 << shift` entries (an *anchor*) and stores the average step to the
//! next anchor. Every other entry stores only its residual against that
//! straight line:
//!
//! ```text
//! value[i] = anchor[g] + avg_delta[g] * pos + residual[k]
//!   g   = anchor_base   + (local >> shift)
//!   pos = local & (interval - 1)
//!   k   = residual_base + local - (local >> shift) - 1
//! ```
//!
//! Steep parts of a curve get a short interval, flat parts a long one, so
//! residuals stay small while the anchor count stays low. Residuals are
//! stored at the narrowest width that holds all of them.

use smallvec::SmallVec;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TableError {
    #[error("regions cover {covered} entries but the table has {len}")]
    Coverage { covered: usize, len: usize },

    #[error("residual {residual} at index {index} does not fit 32 bits")]
    ResidualOverflow { index: usize, residual: i64 },

    #[error("region shift {0} is out of range")]
    BadShift(u32),
}

/// One contiguous run of entries sharing a sampling interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub start: usize,
    pub end: usize,
    pub shift: u32,
    pub anchor_base: usize,
    pub residual_base: usize,
}

/// Residual storage, narrowed once after compression.
#[derive(Clone, Debug)]
enum Residuals {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
}

impl Residuals {
    fn narrow(wide: Vec<i32>) -> Self {
        if wide.iter().all(|&r| i8::try_from(r).is_ok()) {
            Self::I8(wide.into_iter().map(|r| r as i8).collect())
        } else if wide.iter().all(|&r| i16::try_from(r).is_ok()) {
            Self::I16(wide.into_iter().map(|r| r as i16).collect())
        } else {
            Self::I32(wide)
        }
    }

    #[inline(always)]
    fn get(&self, k: usize) -> i32 {
        match self {
            Self::I8(v) => v[k] as i32,
            Self::I16(v) => v[k] as i32,
            Self::I32(v) => v[k],
        }
    }

    fn bytes(&self) -> usize {
        match self {
            Self::I8(v) => v.len(),
            Self::I16(v) => v.len() * 2,
            Self::I32(v) => v.len() * 4,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompressedTable {
    regions: SmallVec<[Region; 3]>,
    anchors: Vec<i32>,
    avg_deltas: Vec<i32>,
    residuals: Residuals,
    len: usize,
}

impl CompressedTable {
    /// Compress `values`. `layout` lists `(end, shift)` per region, in order;
    /// the last `end` must equal `values.len()`.
    pub fn compress(values: &[i32], layout: &[(usize, u32)]) -> Result<Self, TableError> {
        let mut regions = SmallVec::new();
        let mut anchors = Vec::new();
        let mut avg_deltas = Vec::new();
        let mut residuals = Vec::new();

        let mut start = 0;
        for &(end, shift) in layout {
            if shift == 0 || shift > 16 {
                return Err(TableError::BadShift(shift));
            }
            if end <= start || end > values.len() {
                return Err(TableError::Coverage {
                    covered: end,
                    len: values.len(),
                });
            }
            let region = Region {
                start,
                end,
                shift,
                anchor_base: anchors.len(),
                residual_base: residuals.len(),
            };
            let interval = 1usize << shift;

            for group in (start..end).step_by(interval) {
                let anchor = values[group] as i64;
                // slope toward the next anchor; the tail of the table uses
                // its last entry so the line still ends on a real sample
                let (target, span) = if group + interval < values.len() {
                    (values[group + interval] as i64, interval as i64)
                } else {
                    let last = values.len() - 1;
                    (values[last] as i64, (last - group) as i64)
                };
                let avg = if span > 0 { (target - anchor) / span } else { 0 };
                let avg = i32::try_from(avg).map_err(|_| TableError::ResidualOverflow {
                    index: group,
                    residual: avg,
                })? as i64;

                anchors.push(anchor as i32);
                avg_deltas.push(avg as i32);

                for index in group + 1..(group + interval).min(end) {
                    let pos = (index - group) as i64;
                    let residual = values[index] as i64 - (anchor + avg * pos);
                    let residual = i32::try_from(residual)
                        .map_err(|_| TableError::ResidualOverflow { index, residual })?;
                    residuals.push(residual);
                }
            }

            regions.push(region);
            start = end;
        }

        if start != values.len() {
            return Err(TableError::Coverage {
                covered: start,
                len: values.len(),
            });
        }

        Ok(Self {
            regions,
            anchors,
            avg_deltas,
            residuals: Residuals::narrow(residuals),
            len: values.len(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes held by anchors, slopes and residuals.
    pub fn storage_bytes(&self) -> usize {
        (self.anchors.len() + self.avg_deltas.len()) * 4 + self.residuals.bytes()
    }

    /// Reconstruct entry `index`. Out-of-range indices clamp to the last entry.
    #[inline]
    pub fn get(&self, index: usize) -> i32 {
        if self.len == 0 {
            return 0;
        }
        let index = index.min(self.len - 1);
        let region = self
            .regions
            .iter()
            .find(|r| index < r.end)
            .unwrap_or(&self.regions[self.regions.len() - 1]);

        let local = index - region.start;
        let group = local >> region.shift;
        let pos = local & ((1 << region.shift) - 1);
        let anchor = self.anchors[region.anchor_base + group];
        if pos == 0 {
            return anchor;
        }
        let avg = self.avg_deltas[region.anchor_base + group];
        let residual = self.residuals.get(region.residual_base + local - group - 1);
        anchor
            .wrapping_add(avg.wrapping_mul(pos as i32))
            .wrapping_add(residual)
    }
}
