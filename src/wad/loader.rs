// ──────────────────────────────────────────────────────────────────────────
// wad/loader.rs
//
//  *   RawLevel   (wad::level)   ──╮
//  *   sector adjacency            │   --->  world::Level
//  *   THINGS                      ╯         + MapObjects + player start
// ──────────────────────────────────────────────────────────────────────────

use crate::{
    config::{COLOR_DARK, COLOR_LIGHT, COLOR_WHITE, VIEWHEIGHT},
    math::{fixed::to_fixed, trig::degrees_to_angle},
    renderer::ViewPoint,
    wad::level::{self as raw_level, RawLevelError},
    wad::raw::{Wad, WadError},
    world::{self as geo, LevelError, MapObject, SectorId},
};
use glam::IVec2;
use log::{debug, info};
use thiserror::Error;

/// Linedef flag: the line has a sector on both sides.
pub const ML_TWOSIDED: i16 = 0x0004;
/// Thing option: only spawned in multiplayer games.
pub const MTF_MULTIPLAYER: i16 = 0x0010;

const PLAYER1_START: i16 = 1;

/// Colours handed out to sectors, in preference order.
const SECTOR_COLORS: [u8; 3] = [COLOR_DARK, COLOR_LIGHT, COLOR_WHITE];

/*──────────────────────────── Error type ───────────────────────────*/

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Wad(#[from] WadError),

    #[error(transparent)]
    RawLevel(#[from] RawLevelError),

    #[error(transparent)]
    Level(#[from] LevelError),

    #[error("seg {seg} references linedef {linedef}")]
    BadLinedef { seg: usize, linedef: i16 },

    #[error("linedef {linedef} side {side} references sidedef {sidedef}")]
    BadSidedef {
        linedef: usize,
        side: usize,
        sidedef: i16,
    },

    #[error("sidedef {sidedef} references sector {sector}")]
    BadSector { sidedef: usize, sector: i16 },

    #[error("subsector {0} has no segs")]
    EmptySubsector(usize),
}

/// A map compiled into renderer tables.
#[derive(Debug)]
pub struct LoadedMap {
    pub level: geo::Level,
    pub objects: Vec<MapObject>,
    /// Player 1 start at eye height, when the map has one.
    pub player_start: Option<ViewPoint>,
}

/*====================================================================*/
/*                       Public API                                   */
/*====================================================================*/

/// Compile the map at directory index `marker`.
pub fn load_map(wad: &Wad, marker: usize) -> Result<LoadedMap, LoadError> {
    let raw = wad.parse_level(marker)?;

    /*----- 1. sidedef → sector, validated once ---------------------------*/
    let side_sector: Vec<SectorId> = raw
        .sidedefs
        .iter()
        .enumerate()
        .map(|(i, s)| match usize::try_from(s.sector) {
            Ok(n) if n < raw.sectors.len() => Ok(n as SectorId),
            _ => Err(LoadError::BadSector {
                sidedef: i,
                sector: s.sector,
            }),
        })
        .collect::<Result<_, _>>()?;

    let sides_of = |linedef: usize| -> Result<[Option<SectorId>; 2], LoadError> {
        let ld = &raw.linedefs[linedef];
        let mut out = [None; 2];
        for side in 0..2 {
            let sd = ld.sidenum[side];
            if side == 1 && (sd < 0 || ld.flags & ML_TWOSIDED == 0) {
                continue;
            }
            let sector = usize::try_from(sd)
                .ok()
                .and_then(|i| side_sector.get(i).copied())
                .ok_or(LoadError::BadSidedef {
                    linedef,
                    side,
                    sidedef: sd,
                })?;
            out[side] = Some(sector);
        }
        Ok(out)
    };

    /*----- 2. Convert raw → geo lists ------------------------------------*/
    let vertices: Vec<geo::Vertex> = raw
        .vertices
        .iter()
        .map(raw_to_geo::vertex_from)
        .collect();

    let segs: Vec<geo::Seg> = raw
        .segs
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let ld = usize::try_from(s.linedef)
                .ok()
                .filter(|&l| l < raw.linedefs.len())
                .ok_or(LoadError::BadLinedef {
                    seg: i,
                    linedef: s.linedef,
                })?;
            let sides = sides_of(ld)?;
            let side = (s.side != 0) as usize;
            let front = sides[side].ok_or(LoadError::BadSidedef {
                linedef: ld,
                side,
                sidedef: raw.linedefs[ld].sidenum[side],
            })?;
            Ok(raw_to_geo::seg_from(s, front, sides[side ^ 1]))
        })
        .collect::<Result<_, LoadError>>()?;

    // a leaf's sector is the front sector of its first seg
    let subsectors: Vec<geo::Subsector> = raw
        .subsectors
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let first = s.first_seg as u16 as usize;
            let sector = segs
                .get(first)
                .filter(|_| s.seg_count > 0)
                .map(|seg| seg.front_sector)
                .ok_or(LoadError::EmptySubsector(i))?;
            Ok(raw_to_geo::subsector_from(s, sector))
        })
        .collect::<Result<_, LoadError>>()?;

    let nodes: Vec<geo::Node> = raw.nodes.iter().map(raw_to_geo::node_from).collect();

    /*----- 3. Sector colours ---------------------------------------------*/
    let mut edges = Vec::new();
    for ld in 0..raw.linedefs.len() {
        if let [Some(a), Some(b)] = sides_of(ld)? {
            edges.push((a, b));
        }
    }
    let colors = color_sectors(raw.sectors.len(), &edges);

    let sectors: Vec<geo::Sector> = raw
        .sectors
        .iter()
        .zip(colors)
        .map(|(s, color)| geo::Sector {
            floor_h: s.floor_h as i32,
            ceil_h: s.ceil_h as i32,
            color,
        })
        .collect();

    let level = geo::Level::new(raw.name, vertices, segs, sectors, subsectors, nodes)?;

    /*----- 4. Things -----------------------------------------------------*/
    let (objects, player_start) = spawn_things(&level, &raw.things);

    info!(
        "loaded {}: {} segs, {} subsectors, {} nodes, {} sectors, {} objects",
        level.name,
        level.segs.len(),
        level.subsectors.len(),
        level.nodes.len(),
        level.sectors.len(),
        objects.len()
    );

    Ok(LoadedMap {
        level,
        objects,
        player_start,
    })
}

/// Greedy colouring in sector order: each sector takes the first colour no
/// already-coloured neighbour uses. When every colour is taken the one
/// fewest neighbours use wins.
pub fn color_sectors(count: usize, edges: &[(SectorId, SectorId)]) -> Vec<u8> {
    let mut adj = vec![Vec::new(); count];
    for &(a, b) in edges {
        if a != b {
            adj[a as usize].push(b as usize);
            adj[b as usize].push(a as usize);
        }
    }

    let mut colors: Vec<Option<usize>> = vec![None; count];
    for s in 0..count {
        let mut used = [0usize; SECTOR_COLORS.len()];
        for &n in &adj[s] {
            if let Some(c) = colors[n] {
                used[c] += 1;
            }
        }
        let pick = match used.iter().position(|&u| u == 0) {
            Some(c) => c,
            None => {
                debug!("sector {s}: all colours taken by neighbours");
                (0..used.len()).min_by_key(|&c| used[c]).unwrap_or(0)
            }
        };
        colors[s] = Some(pick);
    }

    colors
        .into_iter()
        .map(|c| SECTOR_COLORS[c.unwrap_or(0)])
        .collect()
}

/// `(height, health)` of every thing type that is drawn as an object.
fn thing_info(type_: i16) -> Option<(i32, i32)> {
    Some(match type_ {
        3004 => (56, 20), // zombieman
        9 => (56, 30), // shotgun guy
        65 => (56, 70), // chaingunner
        3001 => (56, 60), // imp
        3002 | 58 => (56, 150), // demon, spectre
        3006 => (56, 100), // lost soul
        3005 => (56, 400), // cacodemon
        3003 => (64, 1000), // baron
        2035 => (42, 20), // barrel
        // corpses
        15 | 18 | 19 | 20 | 21 | 22 => (16, 0),
        _ => return None,
    })
}

fn spawn_things(
    level: &geo::Level,
    things: &[raw_level::RawThing],
) -> (Vec<MapObject>, Option<ViewPoint>) {
    let mut objects = Vec::new();
    let mut start = None;

    for t in things {
        if t.options & MTF_MULTIPLAYER != 0 {
            continue;
        }
        let (x, y) = (to_fixed(t.x as i32), to_fixed(t.y as i32));
        let ss = level.locate_subsector(x, y);
        let floor = level.sectors[level.subsectors[ss as usize].sector as usize].floor_h;

        if t.type_ == PLAYER1_START {
            let z = to_fixed(floor + VIEWHEIGHT);
            start = Some(ViewPoint::new(x, y, z, degrees_to_angle(t.angle as i32)));
            continue;
        }
        let Some((height, health)) = thing_info(t.type_) else {
            continue;
        };
        objects.push(MapObject {
            subsector: Some(ss),
            ..MapObject::at(t.x as i32, t.y as i32, floor, height, health)
        });
    }
    (objects, start)
}

/*====================================================================*/
/*                  Raw → Geo helpers (local)                         */
/*====================================================================*/
mod raw_to_geo {
    use super::*;

    pub fn vertex_from(r: &raw_level::RawVertex) -> geo::Vertex {
        geo::Vertex {
            pos: IVec2::new(r.x as i32, r.y as i32),
        }
    }

    pub fn seg_from(
        r: &raw_level::RawSeg,
        front_sector: SectorId,
        back_sector: Option<SectorId>,
    ) -> geo::Seg {
        geo::Seg {
            v1: r.v1 as u16,
            v2: r.v2 as u16,
            front_sector,
            back_sector,
            angle: (r.angle as u16 as u32) << 16,
        }
    }

    pub fn subsector_from(r: &raw_level::RawSubsector, sector: SectorId) -> geo::Subsector {
        geo::Subsector {
            sector,
            first_seg: r.first_seg as u16,
            seg_count: r.seg_count as u16,
        }
    }

    const BOXTOP: usize = 0;
    const BOXBOTTOM: usize = 1;
    const BOXLEFT: usize = 2;
    const BOXRIGHT: usize = 3;

    #[inline]
    fn raw_bbox_to_aabb(raw: &[i16; 4]) -> geo::Aabb {
        geo::Aabb {
            min: IVec2::new(raw[BOXLEFT] as i32, raw[BOXBOTTOM] as i32),
            max: IVec2::new(raw[BOXRIGHT] as i32, raw[BOXTOP] as i32),
        }
    }

    pub fn node_from(r: &raw_level::RawNode) -> geo::Node {
        geo::Node {
            x: r.x as i32,
            y: r.y as i32,
            dx: r.dx as i32,
            dy: r.dy as i32,
            bbox: [raw_bbox_to_aabb(&r.bbox[0]), raw_bbox_to_aabb(&r.bbox[1])],
            child: r.child,
        }
    }
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::math::trig::{ANG90, ANG180};
    use crate::renderer::Software;
    use crate::wad::level::fixture;

    fn two_rooms() -> LoadedMap {
        let wad = Wad::from_bytes(fixture::two_rooms()).unwrap();
        load_map(&wad, 0).expect("load")
    }

    #[test]
    fn level_tables_compile() {
        let map = two_rooms();
        let lvl = &map.level;
        assert_eq!(lvl.name, "E1M1");
        assert_eq!(lvl.vertices[3].pos, IVec2::new(256, 128));
        assert_eq!(lvl.subsectors[0].sector, 0);
        assert_eq!(lvl.subsectors[1].sector, 1);

        // the split line is a portal from both sides
        assert_eq!(lvl.segs[2].back_sector, Some(1));
        assert_eq!(lvl.segs[4].front_sector, 1);
        assert_eq!(lvl.segs[4].back_sector, Some(0));
        assert_eq!(lvl.segs[0].back_sector, None);

        assert_eq!(lvl.segs[0].angle, ANG90);
        assert_eq!(lvl.segs[3].angle, ANG180);
        assert_eq!(lvl.nodes[0].bbox[0].min, IVec2::new(128, 0));
        assert_eq!(lvl.nodes[0].bbox[0].max, IVec2::new(256, 128));
    }

    #[test]
    fn neighbours_get_different_colours() {
        let map = two_rooms();
        let s = &map.level.sectors;
        assert_eq!(s[0].color, COLOR_DARK);
        assert_eq!(s[1].color, COLOR_LIGHT);
        assert_eq!((s[1].floor_h, s[1].ceil_h), (16, 112));
    }

    #[test]
    fn things_become_objects_and_start() {
        let map = two_rooms();

        let start = map.player_start.unwrap();
        assert_eq!((start.x, start.y), (to_fixed(64), to_fixed(64)));
        assert_eq!(start.z, to_fixed(VIEWHEIGHT));
        assert_eq!(start.angle, ANG90);

        // the multiplayer zombieman and the bonus are skipped
        assert_eq!(map.objects.len(), 1);
        let imp = &map.objects[0];
        assert_eq!(imp.subsector, Some(1));
        assert_eq!(imp.z, to_fixed(16));
        assert_eq!((imp.height, imp.health), (to_fixed(56), 60));
    }

    #[test]
    fn loaded_map_renders() {
        let map = two_rooms();
        let mut sw = Software::new(RenderConfig::default()).unwrap();
        let eye = map.player_start.unwrap();
        let eye = ViewPoint { angle: 0, ..eye };
        sw.render_frame(&map.level, &map.objects, eye).unwrap();

        let stats = sw.stats();
        assert_eq!(stats.subsectors, vec![0, 1]);
        assert!(sw.solid_segs().is_screen_full());
        assert_eq!(stats.sprites_projected, 1);
    }

    #[test]
    fn greedy_colouring() {
        // triangle plus a pendant: 0-1, 1-2, 2-0, 2-3
        let c = color_sectors(4, &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        assert_eq!(c, vec![COLOR_DARK, COLOR_LIGHT, COLOR_WHITE, COLOR_DARK]);

        // K4: the fourth sector reuses the least used colour
        let k4 = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];
        let c = color_sectors(4, &k4);
        assert_eq!(&c[..3], &[COLOR_DARK, COLOR_LIGHT, COLOR_WHITE]);
        assert_eq!(c[3], COLOR_DARK);
    }

    #[test]
    fn dangling_sidedef_is_reported() {
        let mut bytes = fixture::two_rooms();
        let wad = Wad::from_bytes(bytes.clone()).unwrap();
        // point linedef 0's front side at sidedef 99
        let at = wad.lumps()[2].offset as usize + 10;
        bytes[at..at + 2].copy_from_slice(&99i16.to_le_bytes());
        let wad = Wad::from_bytes(bytes).unwrap();
        let err = load_map(&wad, 0).unwrap_err();
        assert!(matches!(
            err,
            LoadError::BadSidedef {
                linedef: 0,
                side: 0,
                sidedef: 99
            }
        ));
    }

    #[test]
    fn self_referencing_node_is_rejected() {
        let mut bytes = fixture::two_rooms();
        let wad = Wad::from_bytes(bytes.clone()).unwrap();
        // both children of node 0 point back at node 0
        let at = wad.lumps()[7].offset as usize + 24;
        bytes[at..at + 4].fill(0);
        let wad = Wad::from_bytes(bytes).unwrap();
        let err = load_map(&wad, 0).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Level(LevelError::ChildAfterParent { node: 0, child: 0 })
        ));
    }
}
