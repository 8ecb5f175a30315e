use crate::wad::{Wad, WadError};
use bincode::Decode;
use once_cell::sync::Lazy;
use regex::Regex;

/*=======================================================================*/
/*                         Raw binary structs                            */
/*=======================================================================*/

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawThing {
    pub x: i16,
    pub y: i16,
    pub angle: i16,
    pub type_: i16,
    pub options: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawLinedef {
    pub v1: i16,
    pub v2: i16,
    pub flags: i16,
    pub special: i16,
    pub tag: i16,
    pub sidenum: [i16; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawSidedef {
    pub x_off: i16,
    pub y_off: i16,
    pub top_tex: [u8; 8],
    pub bottom_tex: [u8; 8],
    pub mid_tex: [u8; 8],
    pub sector: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawVertex {
    pub x: i16,
    pub y: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawSeg {
    pub v1: i16,
    pub v2: i16,
    /// 16-bit binary angle of `v1 → v2`.
    pub angle: i16,
    pub linedef: i16,
    /// 0 = seg runs along the linedef's front side.
    pub side: i16,
    pub offset: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawSubsector {
    pub seg_count: i16,
    pub first_seg: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawNode {
    pub x: i16,
    pub y: i16,
    pub dx: i16,
    pub dy: i16,
    /// `[top, bottom, left, right]` for the right then the left child.
    pub bbox: [[i16; 4]; 2],
    pub child: [u16; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawSector {
    pub floor_h: i16,
    pub ceil_h: i16,
    pub floor_tex: [u8; 8],
    pub ceil_tex: [u8; 8],
    pub light: i16,
    pub special: i16,
    pub tag: i16,
}

/*=======================================================================*/
/*                     Aggregate returned by `parse_level`               */
/*=======================================================================*/
#[derive(Debug)]
pub struct RawLevel {
    pub name: String,
    pub things: Vec<RawThing>,
    pub linedefs: Vec<RawLinedef>,
    pub sidedefs: Vec<RawSidedef>,
    pub vertices: Vec<RawVertex>,
    pub segs: Vec<RawSeg>,
    pub subsectors: Vec<RawSubsector>,
    pub nodes: Vec<RawNode>,
    pub sectors: Vec<RawSector>,
}

/*=======================================================================*/
/*                                Errors                                 */
/*=======================================================================*/

#[derive(Debug, thiserror::Error)]
pub enum RawLevelError {
    #[error("marker index {0} out of bounds")]
    MarkerOob(usize),

    #[error("expected lump `{0}` not found after level marker")]
    Missing(&'static str),

    #[error(transparent)]
    Wad(#[from] WadError),
}

/// Lumps that follow a map marker, in directory order.
pub const MAP_LUMPS: [&str; 8] = [
    "THINGS", "LINEDEFS", "SIDEDEFS", "VERTEXES", "SEGS", "SSECTORS", "NODES", "SECTORS",
];

/*=======================================================================*/
/*                     Convenience helpers on `Wad`                      */
/*=======================================================================*/
impl Wad {
    /// Directory indices of every map marker (`E#M#`, `MAP##`).
    pub fn level_indices(&self) -> Vec<usize> {
        static RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^(E[1-4]M[1-9]|MAP[0-3][0-9])$").expect("map marker pattern")
        });

        self.lumps()
            .iter()
            .enumerate()
            .filter(|(_, l)| l.size == 0 && RE.is_match(Self::lump_name_str(&l.name)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Index of the marker called `name`, if any.
    pub fn level_by_name(&self, name: &str) -> Option<usize> {
        self.level_indices()
            .into_iter()
            .find(|&i| Self::lump_name_str(&self.lumps()[i].name).eq_ignore_ascii_case(name))
    }

    /// `start` if the lump there is called `name`.
    fn idx_of(&self, start: usize, name: &'static str) -> Result<usize, RawLevelError> {
        let l = self.lumps().get(start).ok_or(RawLevelError::Missing(name))?;
        match Self::lump_name_str(&l.name) == name {
            true => Ok(start),
            false => Err(RawLevelError::Missing(name)),
        }
    }

    /// Decode the eight mandatory lumps of a classic map.
    pub fn parse_level(&self, marker_idx: usize) -> Result<RawLevel, RawLevelError> {
        if marker_idx >= self.lumps().len() {
            return Err(RawLevelError::MarkerOob(marker_idx));
        }

        let mut idx = [0usize; 8];
        for (k, name) in MAP_LUMPS.iter().enumerate() {
            idx[k] = self.idx_of(marker_idx + 1 + k, name)?;
        }
        // REJECT / BLOCKMAP are not needed by the renderer

        Ok(RawLevel {
            name: Self::lump_name_str(&self.lumps()[marker_idx].name).into(),
            things: self.lump_to_vec(idx[0])?,
            linedefs: self.lump_to_vec(idx[1])?,
            sidedefs: self.lump_to_vec(idx[2])?,
            vertices: self.lump_to_vec(idx[3])?,
            segs: self.lump_to_vec(idx[4])?,
            subsectors: self.lump_to_vec(idx[5])?,
            nodes: self.lump_to_vec(idx[6])?,
            sectors: self.lump_to_vec(idx[7])?,
        })
    }
}

/*=======================================================================*/
/*                           Test fixture                                */
/*=======================================================================*/


#[cfg(test)]
mod tests {
    use super::*;

    fn wad() -> Wad {
        Wad::from_bytes(fixture::two_rooms()).unwrap()
    }

    #[test]
    fn first_map_parses() {
        let wad = wad();
        let m0 = wad.level_indices()[0];
        let lvl = wad.parse_level(m0).expect("level decode");
        assert_eq!(lvl.name, "E1M1");
        assert_eq!(lvl.vertices.len(), 6);
        assert_eq!(lvl.segs.len(), 8);
        assert_eq!(lvl.sidedefs[3].sector, 1);
        assert_eq!(Wad::lump_name_str(&lvl.sectors[0].floor_tex), "FLOOR4_8");
        assert_eq!(lvl.things.first().unwrap().type_, 1); // player 1 start
        assert_eq!(lvl.nodes[0].child, [0x8001, 0x8000]);
    }

    #[test]
    fn markers_are_found_by_name() {
        let wad = wad();
        assert_eq!(wad.level_indices(), vec![0]);
        assert_eq!(wad.level_by_name("e1m1"), Some(0));
        assert_eq!(wad.level_by_name("MAP01"), None);
    }

    #[test]
    fn bad_marker_oob() {
        let wad = wad();
        let err = wad.parse_level(wad.lumps().len() + 10).unwrap_err();
        assert!(matches!(err, RawLevelError::MarkerOob(_)));
    }

    #[test]
    fn missing_things_guard() {
        let wad = wad();
        // LINEDEFS is not a marker; the lump after it is not THINGS
        let err = wad.parse_level(2).unwrap_err();
        assert!(matches!(err, RawLevelError::Missing("THINGS")));
    }
}
