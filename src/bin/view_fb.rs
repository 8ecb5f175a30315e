//! Walk a level and watch the packed framebuffer, scaled up.
//!
//! ```bash
//! cargo run --release --bin view_fb                       # demo level
//! cargo run --release --bin view_fb -- --wad doom1.wad --map E1M1
//! ```
//!
//! ←/→ turn, ↑/↓ (or W/S) walk, A/D strafe, Esc quits.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use minifb::{Key, Scale, Window, WindowOptions};

use microdoom_rs::{
    config::{RenderConfig, VIEWHEIGHT},
    math::{
        fixed::{Fixed, fixed_mul, to_fixed},
        trig::{ANG90, Angle, cosine, sine},
    },
    renderer::{Software, ViewPoint},
    wad::{Wad, load_map},
    world::{Level, samples},
};

const STEP: Fixed = to_fixed(6);
const TURN: Angle = ANG90 / 24;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    #[arg(long, value_name = "FILE")]
    wad: Option<PathBuf>,

    #[arg(long, requires = "wad")]
    map: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    let (level, objects, start) = match &opts.wad {
        Some(path) => {
            let wad = Wad::from_file(path)?;
            let marker = match &opts.map {
                Some(name) => wad.level_by_name(name),
                None => wad.level_indices().first().copied(),
            }
            .context("map not found")?;
            let map = load_map(&wad, marker)?;
            (map.level, map.objects, map.player_start)
        }
        None => {
            let (level, objects) = samples::demo()?;
            (level, objects, None)
        }
    };
    println!("level: {}", level.name);

    let mut eye = start.unwrap_or(ViewPoint::new(to_fixed(64), 0, 0, 0u32));
    let config = RenderConfig::default();
    let (w, h) = (config.width, config.height);

    let max = config.format.depth.max_color() as u32;
    let palette: Vec<u32> = (0..=max)
        .map(|c| {
            let g = c * 255 / max;
            g << 16 | g << 8 | g
        })
        .collect();

    let mut renderer = Software::new(config)?;
    let mut rgb = vec![0u32; w * h];

    let mut win = Window::new(
        "microdoom - packed framebuffer",
        w,
        h,
        WindowOptions {
            scale: Scale::X8,
            ..WindowOptions::default()
        },
    )?;
    win.set_target_fps(35);

    let mut acc_time = Duration::ZERO;
    let mut acc_frames = 0usize;
    let mut last_print = Instant::now();

    while win.is_open() && !win.is_key_down(Key::Escape) {
        /* input ----------------------------------------------------------- */
        if win.is_key_down(Key::Left) {
            eye.angle = eye.angle.wrapping_add(TURN);
        }
        if win.is_key_down(Key::Right) {
            eye.angle = eye.angle.wrapping_sub(TURN);
        }
        let mut forward = 0;
        if win.is_key_down(Key::Up) || win.is_key_down(Key::W) {
            forward += STEP;
        }
        if win.is_key_down(Key::Down) || win.is_key_down(Key::S) {
            forward -= STEP;
        }
        let mut side = 0;
        if win.is_key_down(Key::A) {
            side += STEP;
        }
        if win.is_key_down(Key::D) {
            side -= STEP;
        }
        let (sin, cos) = (sine(eye.angle), cosine(eye.angle));
        eye.x += fixed_mul(forward, cos) - fixed_mul(side, sin);
        eye.y += fixed_mul(forward, sin) + fixed_mul(side, cos);
        eye.z = eye_height(&level, eye.x, eye.y);

        /* draw ------------------------------------------------------------ */
        let t0 = Instant::now();
        match renderer.render_frame(&level, &objects, eye) {
            Ok(fb) => fb.to_rgb(&palette, &mut rgb),
            Err(e) => eprintln!("{e}"),
        }
        acc_time += t0.elapsed();
        acc_frames += 1;
        win.update_with_buffer(&rgb, w, h)?;

        if last_print.elapsed() >= Duration::from_secs(3) {
            let avg_us = acc_time.as_secs_f64() * 1e6 / acc_frames as f64;
            println!(
                "avg render: {avg_us:.1} µs  ({} subsectors, {} wall ranges)",
                renderer.stats().subsectors.len(),
                renderer.stats().wall_ranges.len()
            );
            acc_time = Duration::ZERO;
            acc_frames = 0;
            last_print = Instant::now();
        }
    }
    Ok(())
}

fn eye_height(level: &Level, x: Fixed, y: Fixed) -> Fixed {
    let ss = level.locate_subsector(x, y);
    let sector = level.subsectors[ss as usize].sector as usize;
    to_fixed(level.sectors[sector].floor_h + VIEWHEIGHT)
}
