//! Render one frame and report what the renderer did.
//!
//! ```bash
//! cargo run --release -- --ascii                       # built-in demo level
//! cargo run --release -- --wad doom1.wad --map E1M1 --ascii
//! cargo run --release -- --x 64 --angle 30 --bpp 1 --layout row --out fb.bin
//! ```

use std::{fs, path::PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};

use microdoom_rs::{
    config::{AngleProfile, BitDepth, Layout, PixelFormat, RenderConfig, VIEWHEIGHT},
    math::{
        fixed::{from_fixed, to_fixed},
        trig::{Angle16, BinaryAngle, angle_to_degrees, degrees_to_angle, table_storage_bytes},
    },
    renderer::{Framebuffer, Software, ViewPoint},
    wad::{Wad, load_map},
    world::{Level, MapObject, samples},
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Bam32,
    Bam16,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutArg {
    Row,
    Column,
}

/// CLI options handled via `clap` derive.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    /// WAD holding the map; the built-in demo level is used without one
    #[arg(long, value_name = "FILE")]
    wad: Option<PathBuf>,

    /// Map marker (`E1M1`, `MAP01`, …); defaults to the first map
    #[arg(long, requires = "wad")]
    map: Option<String>,

    /// Eye position in map units; defaults to the player start
    #[arg(long, allow_hyphen_values = true)]
    x: Option<i32>,
    #[arg(long, allow_hyphen_values = true)]
    y: Option<i32>,
    /// Absolute eye height; defaults to the floor below plus view height
    #[arg(long, allow_hyphen_values = true)]
    z: Option<i32>,

    /// View direction in degrees, counter-clockwise from +x
    #[arg(long, allow_hyphen_values = true)]
    angle: Option<i32>,

    /// Width of the angle handed to the renderer
    #[arg(long, value_enum, default_value = "bam32")]
    angle_profile: ProfileArg,

    #[arg(long, default_value_t = 64)]
    width: usize,
    #[arg(long, default_value_t = 40)]
    height: usize,
    /// Bits per pixel: 1, 2 or 4
    #[arg(long, default_value_t = 2)]
    bpp: u8,
    #[arg(long, value_enum, default_value = "column")]
    layout: LayoutArg,

    /// Write the packed framebuffer bytes here
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Print the frame as text
    #[arg(long)]
    ascii: bool,
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    let config = RenderConfig {
        width: opts.width,
        height: opts.height,
        format: PixelFormat {
            depth: BitDepth::from_bits(opts.bpp)?,
            layout: match opts.layout {
                LayoutArg::Row => Layout::RowMajor,
                LayoutArg::Column => Layout::ColumnMajor,
            },
        },
        ..RenderConfig::default()
    };

    // ─────────── level & start ────────
    let (level, objects, start) = match &opts.wad {
        Some(path) => {
            let wad = Wad::from_file(path).with_context(|| format!("reading {}", path.display()))?;
            let marker = match &opts.map {
                Some(name) => wad
                    .level_by_name(name)
                    .with_context(|| format!("no map {name} in {}", path.display()))?,
                None => match wad.level_indices().first() {
                    Some(&m) => m,
                    None => bail!("{} contains no maps", path.display()),
                },
            };
            let map = load_map(&wad, marker)?;
            (map.level, map.objects, map.player_start)
        }
        None => {
            let (level, objects) = samples::demo()?;
            (level, objects, None)
        }
    };

    let eye = view_point(&opts, &level, start);
    println!(
        "map {}: eye ({}, {}, {}) facing {}°",
        level.name,
        from_fixed(eye.x),
        from_fixed(eye.y),
        from_fixed(eye.z),
        angle_to_degrees(eye.angle)
    );

    // ─────────── render ───────────────
    let mut renderer = Software::new(config)?;
    let fb = renderer.render_frame(&level, &objects, eye)?;

    if opts.ascii {
        print!("{}", ascii(fb));
    }
    if let Some(out) = &opts.out {
        fs::write(out, fb.as_bytes()).with_context(|| format!("writing {}", out.display()))?;
        println!("wrote {} bytes to {}", fb.as_bytes().len(), out.display());
    }

    report(&renderer, &objects);
    Ok(())
}

/// Command-line overrides on top of the map's start (or the demo default).
fn view_point(opts: &Opts, level: &Level, start: Option<ViewPoint>) -> ViewPoint {
    let default = start.unwrap_or(ViewPoint::new(
        to_fixed(64),
        0,
        to_fixed(VIEWHEIGHT),
        0u32,
    ));
    let x = opts.x.map_or(default.x, to_fixed);
    let y = opts.y.map_or(default.y, to_fixed);

    let z = match opts.z {
        Some(z) => to_fixed(z),
        None if opts.x.is_some() || opts.y.is_some() || start.is_none() => {
            let ss = level.locate_subsector(x, y);
            let sector = level.subsectors[ss as usize].sector as usize;
            to_fixed(level.sectors[sector].floor_h + VIEWHEIGHT)
        }
        None => default.z,
    };

    let Some(deg) = opts.angle else {
        return ViewPoint { x, y, z, ..default };
    };
    let angle = degrees_to_angle(deg);
    match opts.angle_profile {
        ProfileArg::Bam32 => ViewPoint::new(x, y, z, angle),
        ProfileArg::Bam16 => {
            let raw = Angle16::from_bam32(angle) as u32;
            ViewPoint::new(x, y, z, AngleProfile::Bam16.to_bam32(raw))
        }
    }
}

fn ascii(fb: &Framebuffer) -> String {
    const RAMP: &[u8] = b" .:-=+*#%@";
    let max = fb.format().depth.max_color() as usize;

    let mut out = String::with_capacity((fb.width() + 1) * fb.height());
    for y in 0..fb.height() as i32 {
        for x in 0..fb.width() as i32 {
            let c = fb.pixel(x, y) as usize;
            out.push(RAMP[c * (RAMP.len() - 1) / max] as char);
        }
        out.push('\n');
    }
    out
}

fn report(renderer: &Software, objects: &[MapObject]) {
    let s = renderer.stats();
    println!("subsectors     {:?}", s.subsectors);
    println!("segs           {}", s.segs_considered);
    println!("wall ranges    {}", s.wall_ranges.len());
    println!("boxes rejected {}", s.boxes_rejected);
    println!(
        "bsp stack      {}/{}",
        s.stack_high_water,
        renderer.config().bsp_stack_depth
    );
    println!(
        "sprites        {} of {} objects ({} dropped)",
        s.sprites_projected,
        objects.len(),
        s.sprites_dropped
    );
    println!(
        "sprite pixels  {} drawn, {} occluded",
        s.sprite_pixels_drawn, s.sprite_pixels_occluded
    );
    println!("trig tables    {} bytes", table_storage_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use microdoom_rs::math::trig::{ANG90, ANG180};

    fn eye_for(args: &[&str]) -> ViewPoint {
        let level = samples::corridor(512, 32).unwrap();
        let opts = Opts::parse_from(std::iter::once("microdoom").chain(args.iter().copied()));
        view_point(&opts, &level, None)
    }

    #[test]
    fn angle_flag_converts_degrees() {
        assert_eq!(eye_for(&["--angle", "90"]).angle, ANG90);
        assert_eq!(eye_for(&["--angle", "-180"]).angle, ANG180);
        assert_eq!(eye_for(&[]).angle, 0);
    }

    #[test]
    fn bam16_profile_keeps_the_high_half() {
        let wide = eye_for(&["--angle", "37"]).angle;
        let narrow = eye_for(&["--angle", "37", "--angle-profile", "bam16"]).angle;
        assert_eq!(narrow, wide & 0xFFFF_0000);
        assert_ne!(narrow, wide);
    }
}
