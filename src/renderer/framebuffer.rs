//! Packed low-bit-depth framebuffer.
//!
//! Pixels are packed MSB first: in a 2 bpp byte the leftmost (row-major) or
//! topmost (column-major) pixel lives in bits 7..6.
//!
//! ```text
//! column-major, 2 bpp, height 40:   byte = x * 10 + y / 4
//! row-major,    2 bpp, width  64:   byte = y * 16 + x / 4
//! ```

use crate::config::{BitDepth, Layout, PixelFormat};

#[derive(Clone, Debug)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    format: PixelFormat,
    /// Bytes per row (row-major) or per column (column-major).
    stride: usize,
    bytes: Vec<u8>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Self {
        let ppb = format.depth.pixels_per_byte();
        let (stride, lines) = match format.layout {
            Layout::RowMajor => (width.div_ceil(ppb), height),
            Layout::ColumnMajor => (height.div_ceil(ppb), width),
        };
        Self {
            width,
            height,
            format,
            stride,
            bytes: vec![0; stride * lines],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `color` replicated into every pixel slot of one byte.
    #[inline]
    fn fill_byte(depth: BitDepth, color: u8) -> u8 {
        let c = color & depth.max_color();
        match depth {
            BitDepth::One => 0u8.wrapping_sub(c),
            BitDepth::Two => c * 0x55,
            BitDepth::Four => c * 0x11,
        }
    }

    pub fn clear(&mut self, color: u8) {
        let b = Self::fill_byte(self.format.depth, color);
        self.bytes.fill(b);
    }

    /// Byte index and bit shift of pixel `(x, y)`.
    #[inline(always)]
    fn locate(&self, x: usize, y: usize) -> (usize, u32) {
        let depth = self.format.depth;
        let ppb = depth.pixels_per_byte();
        let (line, along) = match self.format.layout {
            Layout::RowMajor => (y, x),
            Layout::ColumnMajor => (x, y),
        };
        let shift = (ppb - 1 - along % ppb) * depth.bits();
        (line * self.stride + along / ppb, shift as u32)
    }

    /// Out-of-range coordinates are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, color: u8) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let max = self.format.depth.max_color();
        let (i, shift) = self.locate(x as usize, y as usize);
        let mask = max << shift;
        self.bytes[i] = (self.bytes[i] & !mask) | ((color & max) << shift);
    }

    /// Out-of-range coordinates read as 0.
    #[inline]
    pub fn pixel(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return 0;
        }
        let (i, shift) = self.locate(x as usize, y as usize);
        (self.bytes[i] >> shift) & self.format.depth.max_color()
    }

    /// Vertical run `y1..=y2` in column `x`, clipped to the screen.
    ///
    /// Column-major buffers write whole bytes between the partial ends.
    pub fn fill_column(&mut self, x: i32, y1: i32, y2: i32, color: u8) {
        if x < 0 || x as usize >= self.width {
            return;
        }
        let y1 = y1.max(0);
        let y2 = y2.min(self.height as i32 - 1);
        if y1 > y2 {
            return;
        }

        if self.format.layout == Layout::RowMajor {
            for y in y1..=y2 {
                self.set_pixel(x, y, color);
            }
            return;
        }

        let ppb = self.format.depth.pixels_per_byte() as i32;
        let fill = Self::fill_byte(self.format.depth, color);
        let base = x as usize * self.stride;

        let mut y = y1;
        while y <= y2 && y % ppb != 0 {
            self.set_pixel(x, y, color);
            y += 1;
        }
        while y + ppb - 1 <= y2 {
            self.bytes[base + (y / ppb) as usize] = fill;
            y += ppb;
        }
        while y <= y2 {
            self.set_pixel(x, y, color);
            y += 1;
        }
    }

    /// Expand to one `u32` per pixel, row-major, through `palette`.
    pub fn to_rgb(&self, palette: &[u32], out: &mut Vec<u32>) {
        out.clear();
        out.reserve(self.width * self.height);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let c = self.pixel(x, y) as usize;
                out.push(palette.get(c).copied().unwrap_or(0));
            }
        }
    }
}
