//! Versioned binary framing for persisted contexts and tiles.
//!
//! Every saved object starts with a [`SaveableHeader`] (magic number, packed
//! library version, class name, context id) followed by a length-prefixed
//! body the concrete class serializes itself. Loads validate the header
//! before touching the body and are all-or-nothing.

use crate::error::{HeError, HeResult};
use std::io::{Read, Write};

pub const MAGIC_NUMBER: u32 = 0x4854_494C; // "HTIL"
pub const MAX_CLASS_NAME_LEN: usize = 100;

pub const VERSION_MAJOR: u8 = 0;
pub const VERSION_MINOR: u8 = 1;
pub const VERSION_PATCH: u8 = 0;
pub const VERSION_TWEAK: u8 = 0;

/// Packs major/minor/patch/tweak into one u32, most significant byte first.
pub fn pack_version(major: u8, minor: u8, patch: u8, tweak: u8) -> u32 {
    u32::from_be_bytes([major, minor, patch, tweak])
}

pub fn library_version() -> u32 {
    pack_version(VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH, VERSION_TWEAK)
}

/// A stored version is supported as long as its major component matches.
pub fn is_version_supported(stored: u32) -> bool {
    stored.to_be_bytes()[0] == VERSION_MAJOR
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveableHeader {
    pub magic: u32,
    pub version: u32,
    pub class_name: String,
    pub context_id: i32,
}

impl SaveableHeader {
    pub fn new(class_name: &str, context_id: i32) -> Self {
        Self {
            magic: MAGIC_NUMBER,
            version: library_version(),
            class_name: class_name.to_string(),
            context_id,
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> HeResult<()> {
        if self.class_name.len() > MAX_CLASS_NAME_LEN {
            return Err(HeError::invalid_argument(format!(
                "class name longer than {MAX_CLASS_NAME_LEN} bytes"
            )));
        }
        w.write_all(&self.magic.to_le_bytes())?;
        w.write_all(&self.version.to_le_bytes())?;
        let name = self.class_name.as_bytes();
        w.write_all(&(name.len() as u32).to_le_bytes())?;
        w.write_all(name)?;
        w.write_all(&self.context_id.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> HeResult<Self> {
        let magic = read_u32(r)?;
        if magic != MAGIC_NUMBER {
            return Err(HeError::BadMagic);
        }
        let version = read_u32(r)?;
        if !is_version_supported(version) {
            return Err(HeError::UnsupportedVersion { stored: version });
        }
        let name_len = read_u32(r)? as usize;
        if name_len > MAX_CLASS_NAME_LEN {
            return Err(HeError::Encoding {
                message: format!("stored class name length {name_len} exceeds limit"),
            });
        }
        let mut name = vec![0u8; name_len];
        r.read_exact(&mut name)?;
        let class_name = String::from_utf8(name).map_err(|e| HeError::Encoding {
            message: e.to_string(),
        })?;
        let mut id = [0u8; 4];
        r.read_exact(&mut id)?;
        Ok(Self {
            magic,
            version,
            class_name,
            context_id: i32::from_le_bytes(id),
        })
    }

    /// Validates the stored class name against the expected one.
    pub fn verify_class(&self, expected: &str) -> HeResult<()> {
        if self.class_name != expected {
            return Err(HeError::ClassNameMismatch {
                expected: expected.to_string(),
                actual: self.class_name.clone(),
            });
        }
        Ok(())
    }

    /// Validates the stored context id against the owning context.
    pub fn verify_context_id(&self, expected: i32) -> HeResult<()> {
        if self.context_id != expected {
            return Err(HeError::ContextIdMismatch {
                expected,
                stored: self.context_id,
            });
        }
        Ok(())
    }
}

/// Objects persistable through the versioned header framing.
pub trait Saveable {
    fn class_name(&self) -> &'static str;
    fn context_id(&self) -> i32;
    fn save_body(&self) -> HeResult<Vec<u8>>;

    fn save<W: Write>(&self, w: &mut W) -> HeResult<()> {
        SaveableHeader::new(self.class_name(), self.context_id()).write_to(w)?;
        let body = self.save_body()?;
        write_body(w, &body)
    }
}

pub fn write_body<W: Write>(w: &mut W, body: &[u8]) -> HeResult<()> {
    w.write_all(&(body.len() as u64).to_le_bytes())?;
    w.write_all(body)?;
    Ok(())
}

pub fn read_body<R: Read>(r: &mut R) -> HeResult<Vec<u8>> {
    let mut len = [0u8; 8];
    r.read_exact(&mut len)?;
    let mut body = vec![0u8; u64::from_le_bytes(len) as usize];
    r.read_exact(&mut body)?;
    Ok(body)
}

fn read_u32<R: Read>(r: &mut R) -> HeResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
