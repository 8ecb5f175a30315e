//! Render configuration and compile-time limits.
//!
//! The defaults describe the smallest deployment the renderer targets:
//! a 64×40 panel, 2 bits per pixel, stored column by column.

use thiserror::Error;

use crate::math::{
    fixed::{FRACUNIT, Fixed},
    trig::{Angle, Angle16, BinaryAngle, FINEANGLES},
};

/*──────────────────────────── fixed limits ─────────────────────────────*/

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 40;

/// Pending far children the traversal can hold.
pub const BSP_STACK_SIZE: usize = 32;
pub const MAX_VISSPRITES: usize = 8;

/// 90° in fine angles.
pub const FIELD_OF_VIEW: usize = 2048;

/// Eye height above the floor in map units.
pub const VIEWHEIGHT: i32 = 41;

/// Near plane; walls and sprites closer than this are clamped or rejected.
pub const MINZ: Fixed = 4 * FRACUNIT;

/// Projection scale clamp.
pub const MIN_SCALE: Fixed = 256;
pub const MAX_SCALE: Fixed = 64 * FRACUNIT;

/*─────────────────────────────── colours ───────────────────────────────*/

pub const COLOR_BLACK: u8 = 0;
pub const COLOR_DARK: u8 = 1;
pub const COLOR_LIGHT: u8 = 2;
pub const COLOR_WHITE: u8 = 3;

/*──────────────────────────── pixel format ─────────────────────────────*/

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitDepth {
    One = 1,
    Two = 2,
    Four = 4,
}

impl BitDepth {
    #[inline(always)]
    pub const fn bits(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn pixels_per_byte(self) -> usize {
        8 / self.bits()
    }

    #[inline(always)]
    pub const fn max_color(self) -> u8 {
        ((1u16 << self.bits()) - 1) as u8
    }

    pub fn from_bits(bits: u8) -> Result<Self, ConfigError> {
        match bits {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            other => Err(ConfigError::BitDepth(other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Consecutive bytes walk along a row.
    RowMajor,
    /// Consecutive bytes walk down a column.
    ColumnMajor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelFormat {
    pub depth: BitDepth,
    pub layout: Layout,
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self {
            depth: BitDepth::Two,
            layout: Layout::ColumnMajor,
        }
    }
}

/*──────────────────────────── angle profile ────────────────────────────*/

/// How raw angles coming from outside the renderer are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AngleProfile {
    #[default]
    Bam32,
    Bam16,
}

impl AngleProfile {
    pub fn to_bam32(self, raw: u32) -> Angle {
        match self {
            AngleProfile::Bam32 => raw,
            AngleProfile::Bam16 => (raw as Angle16).to_bam32(),
        }
    }
}

/*──────────────────────────── render config ────────────────────────────*/

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("screen {width}x{height} is outside 2x2 ..= 4096x4096")]
    Screen { width: usize, height: usize },

    #[error("unsupported bit depth {0} (expected 1, 2 or 4)")]
    BitDepth(u8),

    #[error("field of view {0} fine angles is outside {min}..={max}", min = FOV_MIN, max = FOV_MAX)]
    FieldOfView(usize),

    #[error("{what} capacity must be at least 1")]
    Capacity { what: &'static str },
}

const FOV_MIN: usize = FINEANGLES / 32;
const FOV_MAX: usize = FINEANGLES * 5 / 16;

#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub bsp_stack_depth: usize,
    pub max_vissprites: usize,
    /// Horizontal field of view in fine angles.
    pub field_of_view: usize,
    pub clear_color: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            format: PixelFormat::default(),
            bsp_stack_depth: BSP_STACK_SIZE,
            max_vissprites: MAX_VISSPRITES,
            field_of_view: FIELD_OF_VIEW,
            clear_color: COLOR_BLACK,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=4096).contains(&self.width) || !(2..=4096).contains(&self.height) {
            return Err(ConfigError::Screen {
                width: self.width,
                height: self.height,
            });
        }
        if !(FOV_MIN..=FOV_MAX).contains(&self.field_of_view) {
            return Err(ConfigError::FieldOfView(self.field_of_view));
        }
        if self.bsp_stack_depth == 0 {
            return Err(ConfigError::Capacity { what: "BSP stack" });
        }
        if self.max_vissprites == 0 {
            return Err(ConfigError::Capacity { what: "vissprite" });
        }
        Ok(())
    }

    /// Worst case: every other column covered, plus both sentinels.
    #[inline]
    pub fn max_solid_segs(&self) -> usize {
        self.width.div_ceil(2) + 2
    }

    /// Bytes needed by the packed framebuffer.
    pub fn framebuffer_len(&self) -> usize {
        let ppb = self.format.depth.pixels_per_byte();
        match self.format.layout {
            Layout::RowMajor => self.width.div_ceil(ppb) * self.height,
            Layout::ColumnMajor => self.height.div_ceil(ppb) * self.width,
        }
    }
}
