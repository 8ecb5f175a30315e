//! # WAD container
//!
//! * Holds the whole file in RAM.
//! * Provides zero-copy access to individual lumps.
//! * Decodes binary lumps into typed vectors with **bincode 2**.
//!
//! Both `IWAD` and `PWAD` headers are accepted; a PWAD carrying a single map
//! is the usual way to feed a hand-made level to the renderer.

use bincode::{Decode, config, decode_from_slice};
use byteorder::{LittleEndian as LE, ReadBytesExt};
use std::{collections::HashMap, fs, io, mem, path::Path};
use thiserror::Error;

const HEADER_SIZE: usize = 12;
const DIR_ENTRY_SIZE: usize = 16;

/// One entry in the lump directory (16 bytes on disk).
#[derive(Clone, Debug)]
pub struct LumpInfo {
    pub name: [u8; 8],
    pub offset: u32,
    pub size: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WadKind {
    Iwad,
    Pwad,
}

/// Entire WAD in memory (raw bytes + parsed directory).
#[derive(Debug)]
pub struct Wad {
    kind: WadKind,
    lumps: Vec<LumpInfo>,
    bytes: Vec<u8>,
    by_name: HashMap<String, usize>,
}

#[derive(Error, Debug)]
pub enum WadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("file is neither an IWAD nor a PWAD")]
    BadMagic,

    #[error("file is {0} bytes, shorter than the WAD header")]
    Truncated(usize),

    #[error("directory extends beyond end of file")]
    DirectoryOutOfBounds,

    #[error("lump index {0} out of range")]
    BadIndex(usize),

    #[error("lump {name} (# {index}) slice {offset}+{size} past EOF ({file_size})")]
    BadOffset {
        index: usize,
        name: String,
        offset: u32,
        size: u32,
        file_size: usize,
    },

    #[error("lump {name} (# {index}) size {size} not multiple of element {elem_size}")]
    BadLumpSize {
        index: usize,
        name: String,
        size: usize,
        elem_size: usize,
    },

    #[error("lump {name} (# {index}) element {elem}: {source}")]
    BadElement {
        index: usize,
        name: String,
        elem: usize,
        source: bincode::error::DecodeError,
    },
}

impl Wad {
    pub fn kind(&self) -> WadKind {
        self.kind
    }

    /// Directory as a read-only slice.
    pub fn lumps(&self) -> &[LumpInfo] {
        &self.lumps
    }

    /// `&str` view of an 8-byte lump name (trimmed at the first NUL).
    pub fn lump_name_str(name: &[u8; 8]) -> &str {
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        std::str::from_utf8(&name[..end]).unwrap_or("?")
    }

    /// Raw bytes of lump `idx`.
    pub fn lump_bytes(&self, idx: usize) -> Result<&[u8], WadError> {
        let l = self.lumps.get(idx).ok_or(WadError::BadIndex(idx))?;
        let start = l.offset as usize;
        Ok(&self.bytes[start..start + l.size as usize])
    }

    /// Last lump called `name` (case-sensitive like vanilla Doom).
    pub fn find_lump(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Decode lump `idx` as a packed array of little-endian `T`.
    ///
    /// An empty lump decodes to an empty vector.
    pub fn lump_to_vec<T>(&self, idx: usize) -> Result<Vec<T>, WadError>
    where
        T: Decode<()>,
    {
        let bytes = self.lump_bytes(idx)?;
        let elem = mem::size_of::<T>();
        let name = || Self::lump_name_str(&self.lumps[idx].name).to_owned();

        if bytes.len() % elem != 0 {
            return Err(WadError::BadLumpSize {
                index: idx,
                name: name(),
                size: bytes.len(),
                elem_size: elem,
            });
        }

        let cfg = config::standard()
            .with_fixed_int_encoding()
            .with_little_endian();
        let mut out = Vec::with_capacity(bytes.len() / elem);
        let mut slice = bytes;

        while !slice.is_empty() {
            let (val, read) =
                decode_from_slice::<T, _>(slice, cfg).map_err(|e| WadError::BadElement {
                    index: idx,
                    name: name(),
                    elem: out.len(),
                    source: e,
                })?;
            out.push(val);
            slice = &slice[read..];
        }
        Ok(out)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WadError> {
        Self::from_bytes(fs::read(path)?)
    }

    /// Parse an in-memory WAD image.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, WadError> {
        if bytes.len() < HEADER_SIZE {
            return Err(WadError::Truncated(bytes.len()));
        }
        let kind = match &bytes[..4] {
            b"IWAD" => WadKind::Iwad,
            b"PWAD" => WadKind::Pwad,
            _ => return Err(WadError::BadMagic),
        };

        let mut hdr = &bytes[4..HEADER_SIZE];
        let num_lumps = hdr.read_u32::<LE>()? as usize;
        let dir_offset = hdr.read_u32::<LE>()? as usize;

        let dir_end = num_lumps
            .checked_mul(DIR_ENTRY_SIZE)
            .and_then(|n| n.checked_add(dir_offset))
            .filter(|&end| end <= bytes.len())
            .ok_or(WadError::DirectoryOutOfBounds)?;

        let mut lumps = Vec::with_capacity(num_lumps);
        let mut cur = &bytes[dir_offset..dir_end];
        for _ in 0..num_lumps {
            let offset = cur.read_u32::<LE>()?;
            let size = cur.read_u32::<LE>()?;
            let mut name = [0u8; 8];
            io::Read::read_exact(&mut cur, &mut name)?;
            lumps.push(LumpInfo { name, offset, size });
        }

        // every lump slice must lie inside the file
        for (i, l) in lumps.iter().enumerate() {
            let end = l.offset as usize + l.size as usize;
            if end > bytes.len() {
                return Err(WadError::BadOffset {
                    index: i,
                    name: Self::lump_name_str(&l.name).into(),
                    offset: l.offset,
                    size: l.size,
                    file_size: bytes.len(),
                });
            }
        }

        // later lumps shadow earlier ones
        let mut by_name = HashMap::with_capacity(lumps.len());
        for (i, l) in lumps.iter().enumerate().rev() {
            by_name
                .entry(Self::lump_name_str(&l.name).to_owned())
                .or_insert(i);
        }

        Ok(Self {
            kind,
            lumps,
            bytes,
            by_name,
        })
    }
}

/// Assembles WAD images in memory; used by tests and by tools that emit
/// small PWADs.
#[derive(Default)]
pub struct WadBuilder {
    lumps: Vec<(String, Vec<u8>)>,
}

impl WadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lump(mut self, name: &str, data: Vec<u8>) -> Self {
        self.lumps.push((name.to_owned(), data));
        self
    }

    /// Serialize as a PWAD: header, lump data, directory.
    pub fn build(self) -> Vec<u8> {
        let data_len: usize = self.lumps.iter().map(|(_, d)| d.len()).sum();
        let dir_offset = HEADER_SIZE + data_len;

        let mut out = Vec::with_capacity(dir_offset + self.lumps.len() * DIR_ENTRY_SIZE);
        out.extend_from_slice(b"PWAD");
        out.extend_from_slice(&(self.lumps.len() as u32).to_le_bytes());
        out.extend_from_slice(&(dir_offset as u32).to_le_bytes());

        let mut dir = Vec::with_capacity(self.lumps.len() * DIR_ENTRY_SIZE);
        for (name, data) in &self.lumps {
            dir.extend_from_slice(&(out.len() as u32).to_le_bytes());
            dir.extend_from_slice(&(data.len() as u32).to_le_bytes());
            let mut raw = [0u8; 8];
            for (d, s) in raw.iter_mut().zip(name.bytes()) {
                *d = s;
            }
            dir.extend_from_slice(&raw);
            out.extend_from_slice(data);
        }
        out.extend_from_slice(&dir);
        out
    }
}
