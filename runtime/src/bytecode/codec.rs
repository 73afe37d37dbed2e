//! Blob wire format
//!
//! ```text
//! [0..4)   u32 LE: length L of the constant section
//! [4..4+L) constant section
//! [4+L..)  raw bytecode
//! ```
//!
//! The constant section is a `u32 LE` count followed by tagged entries:
//! `0x01` + `f64 LE` for numbers, `0x02` + `u32 LE` length + UTF-8 for text.

use std::io::{Cursor, Read};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use crate::bytecode::{BytecodeModule, Constant};

const TAG_NUMBER: u8 = 0x01;
const TAG_TEXT: u8 = 0x02;

const LENGTH_PREFIX: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Blob too short: {0} bytes, need at least 4")]
    TooShort(usize),

    #[error("Constant section length {declared} overruns blob ({available} bytes available)")]
    LengthOverrun { declared: usize, available: usize },

    #[error("Malformed constant section: {0}")]
    MalformedConstants(String),

    #[error("Constant section of {0} bytes does not fit a u32 length prefix")]
    SectionTooLarge(usize),
}

impl CodecError {
    fn malformed(err: impl std::fmt::Display) -> Self {
        CodecError::MalformedConstants(err.to_string())
    }
}

/// Serialize a code buffer and its constant pool into a blob
pub fn encode(code: &[u8], constants: &[Constant]) -> Result<Vec<u8>, CodecError> {
    let section = encode_constants(constants)?;
    let declared = u32::try_from(section.len())
        .map_err(|_| CodecError::SectionTooLarge(section.len()))?;

    let mut blob = Vec::with_capacity(LENGTH_PREFIX + section.len() + code.len());
    blob.extend_from_slice(&declared.to_le_bytes());
    blob.extend_from_slice(&section);
    blob.extend_from_slice(code);
    Ok(blob)
}

/// Split a blob back into its code buffer and constant pool
///
/// Numbers always come back as `Constant::Float`.
pub fn decode(blob: &[u8]) -> Result<BytecodeModule, CodecError> {
    if blob.len() < LENGTH_PREFIX {
        return Err(CodecError::TooShort(blob.len()));
    }

    let mut prefix = &blob[..LENGTH_PREFIX];
    let declared = prefix.read_u32::<LittleEndian>().map_err(CodecError::malformed)? as usize;
    let available = blob.len() - LENGTH_PREFIX;
    if declared > available {
        return Err(CodecError::LengthOverrun { declared, available });
    }

    let section = &blob[LENGTH_PREFIX..LENGTH_PREFIX + declared];
    let constants = decode_constants(section)?;
    let code = blob[LENGTH_PREFIX + declared..].to_vec();

    Ok(BytecodeModule { code, constants })
}

fn encode_constants(constants: &[Constant]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    let count = u32::try_from(constants.len())
        .map_err(|_| CodecError::SectionTooLarge(constants.len()))?;
    out.write_u32::<LittleEndian>(count).map_err(CodecError::malformed)?;

    for constant in constants {
        match constant {
            Constant::Integer(i) => {
                out.push(TAG_NUMBER);
                out.write_f64::<LittleEndian>(*i as f64).map_err(CodecError::malformed)?;
            }
            Constant::Float(f) => {
                out.push(TAG_NUMBER);
                out.write_f64::<LittleEndian>(*f).map_err(CodecError::malformed)?;
            }
            Constant::String(s) => {
                let len = u32::try_from(s.len())
                    .map_err(|_| CodecError::SectionTooLarge(s.len()))?;
                out.push(TAG_TEXT);
                out.write_u32::<LittleEndian>(len).map_err(CodecError::malformed)?;
                out.extend_from_slice(s.as_bytes());
            }
        }
    }

    Ok(out)
}

fn decode_constants(section: &[u8]) -> Result<Vec<Constant>, CodecError> {
    let mut reader = Cursor::new(section);
    let count = reader.read_u32::<LittleEndian>().map_err(CodecError::malformed)? as usize;

    // Each entry is at least 5 bytes, so a count larger than that is a lie.
    if count > section.len() / 5 {
        return Err(CodecError::MalformedConstants(format!(
            "{} entries cannot fit in {} bytes",
            count,
            section.len()
        )));
    }

    let mut constants = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = reader.read_u8().map_err(CodecError::malformed)?;
        let constant = match tag {
            TAG_NUMBER => Constant::Float(reader.read_f64::<LittleEndian>().map_err(CodecError::malformed)?),
            TAG_TEXT => {
                let len = reader.read_u32::<LittleEndian>().map_err(CodecError::malformed)? as usize;
                let remaining = section.len() - reader.position() as usize;
                if len > remaining {
                    return Err(CodecError::MalformedConstants(format!(
                        "text entry of {} bytes with only {} remaining",
                        len, remaining
                    )));
                }
                let mut bytes = vec![0u8; len];
                reader.read_exact(&mut bytes).map_err(CodecError::malformed)?;
                Constant::String(String::from_utf8(bytes).map_err(CodecError::malformed)?)
            }
            _ => return Err(CodecError::MalformedConstants(format!("Unknown constant tag: {}", tag))),
        };
        constants.push(constant);
    }

    if reader.position() as usize != section.len() {
        return Err(CodecError::MalformedConstants(format!(
            "{} trailing bytes after {} entries",
            section.len() - reader.position() as usize,
            count
        )));
    }

    Ok(constants)
}
