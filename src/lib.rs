//! Fixed-point BSP wall renderer for tiny packed framebuffers.
//!
//! ```text
//! wad ──► world::Level ──► renderer::Software ──► Framebuffer (1/2/4 bpp)
//!               ▲                  │
//!       world::samples         math (16.16, BAM tables)
//! ```

pub mod config;
pub mod math;
pub mod renderer;
pub mod wad;
pub mod world;

pub use config::{AngleProfile, RenderConfig};
pub use renderer::{Framebuffer, RenderError, RenderStats, Software, ViewPoint};
pub use world::{Level, MapObject};
