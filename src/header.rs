//! Dump header parsing and validation.
//!
//! Two wire layouts share the same magic words:
//!
//! * **extended** (format 1.2 and later): versioned, variable register count,
//!   optional process metadata.
//! * **legacy**: the pre-versioning ARM9 layout with exactly 17 registers.
//!
//! The caller picks the layout. The extended reader refuses older dumps
//! instead of guessing, so a legacy file is never misread as extended.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cursor::{read_u32_le, FieldReader};
use crate::error::{DumpError, Result};

pub const DUMP_MAGIC: [u32; 2] = [0xDEADC0DE, 0xDEADCAFE];

/// Both layouts start their register dump at this offset.
pub const HEADER_SIZE: usize = 40;

/// Oldest extended format understood, major 1 / minor 2.
pub const MIN_EXTENDED_VERSION: u32 = (1 << 16) | 2;

/// Register count of the legacy layout: r0-r12, sp, lr, pc, cpsr.
pub const LEGACY_REGISTER_COUNT: usize = 17;

/// Processor id the firmware writes for the ARM9.
pub const ARM9_PROCESSOR_ID: u32 = 9;

/// Wire layout of a dump file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Extended,
    Legacy,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Extended => write!(f, "extended"),
            Layout::Legacy => write!(f, "legacy"),
        }
    }
}

/// The CPU that took the exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Processor {
    Arm9,
    /// ARM11 MPCore; extended dumps carry the core index in the upper half
    /// of the processor field.
    Arm11 { core: u32 },
    /// Legacy dumps name the processor by bare number.
    Numbered { id: u32 },
}

impl Processor {
    fn from_extended(raw: u32) -> Self {
        if raw == ARM9_PROCESSOR_ID {
            Processor::Arm9
        } else {
            Processor::Arm11 { core: raw >> 16 }
        }
    }

    fn from_legacy(raw: u32) -> Self {
        if raw == ARM9_PROCESSOR_ID {
            Processor::Arm9
        } else {
            Processor::Numbered { id: raw }
        }
    }

    pub fn is_arm9(&self) -> bool {
        matches!(self, Processor::Arm9)
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Processor::Arm9 => write!(f, "ARM9"),
            Processor::Arm11 { core } => write!(f, "ARM11 (core {})", core),
            Processor::Numbered { id } => write!(f, "ARM{}", id),
        }
    }
}

/// Header of a versioned dump (format 1.2+).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub version: u32,
    pub processor: Processor,
    pub exception_type: u32,
    pub register_count: usize,
    pub code_dump_size: u32,
    pub stack_dump_size: u32,
    pub additional_data_size: u32,
}

impl ExtendedHeader {
    pub fn version_major(&self) -> u32 {
        self.version >> 16
    }

    pub fn version_minor(&self) -> u32 {
        self.version & 0xFFFF
    }
}

/// Header of a pre-versioning dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyHeader {
    pub processor: Processor,
    pub exception_type: u32,
    pub code_dump_size: u32,
    pub stack_dump_size: u32,
}

/// A validated dump header in one of the two layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Extended(ExtendedHeader),
    Legacy(LegacyHeader),
}

impl Header {
    pub fn layout(&self) -> Layout {
        match self {
            Header::Extended(_) => Layout::Extended,
            Header::Legacy(_) => Layout::Legacy,
        }
    }

    pub fn processor(&self) -> Processor {
        match self {
            Header::Extended(h) => h.processor,
            Header::Legacy(h) => h.processor,
        }
    }

    pub fn exception_type(&self) -> u32 {
        match self {
            Header::Extended(h) => h.exception_type,
            Header::Legacy(h) => h.exception_type,
        }
    }

    pub fn register_count(&self) -> usize {
        match self {
            Header::Extended(h) => h.register_count,
            Header::Legacy(_) => LEGACY_REGISTER_COUNT,
        }
    }

    pub fn code_dump_size(&self) -> u32 {
        match self {
            Header::Extended(h) => h.code_dump_size,
            Header::Legacy(h) => h.code_dump_size,
        }
    }

    pub fn stack_dump_size(&self) -> u32 {
        match self {
            Header::Extended(h) => h.stack_dump_size,
            Header::Legacy(h) => h.stack_dump_size,
        }
    }

    pub fn additional_data_size(&self) -> u32 {
        match self {
            Header::Extended(h) => h.additional_data_size,
            Header::Legacy(_) => 0,
        }
    }
}

/// Check the magic words. Nothing else is read until they match.
fn check_magic(data: &[u8]) -> Result<()> {
    let magic = match (read_u32_le(data, 0), read_u32_le(data, 4)) {
        (Ok(m0), Ok(m1)) => [m0, m1],
        _ => {
            return Err(DumpError::InvalidFormat(format!(
                "file is {} bytes, too short for the dump magic",
                data.len()
            )))
        }
    };
    if magic != DUMP_MAGIC {
        return Err(DumpError::InvalidFormat(format!(
            "expected magic {:08x} {:08x}, got {:08x} {:08x}",
            DUMP_MAGIC[0], DUMP_MAGIC[1], magic[0], magic[1]
        )));
    }
    Ok(())
}

/// Validate the header of `data` against the requested layout.
pub fn parse_header(data: &[u8], layout: Layout) -> Result<Header> {
    check_magic(data)?;

    let header = match layout {
        Layout::Extended => Header::Extended(parse_extended(data)?),
        Layout::Legacy => Header::Legacy(parse_legacy(data)?),
    };
    debug!("Parsed {} header: {:?}", layout, header);
    Ok(header)
}

fn parse_extended(data: &[u8]) -> Result<ExtendedHeader> {
    let mut reader = FieldReader::at(data, 8);
    let version = reader.u32()?;
    if version < MIN_EXTENDED_VERSION {
        return Err(DumpError::UnsupportedVersion {
            found: version,
            minimum: MIN_EXTENDED_VERSION,
        });
    }

    let processor = reader.u32()?;
    let exception_type = reader.u32()?;
    let _reserved = reader.u32()?;
    let register_dump_size = reader.u32()?;
    let code_dump_size = reader.u32()?;
    let stack_dump_size = reader.u32()?;
    let additional_data_size = reader.u32()?;

    let register_count = (register_dump_size / 4) as usize;
    if register_count < LEGACY_REGISTER_COUNT {
        return Err(DumpError::InvalidFormat(format!(
            "register dump holds {} registers, at least {} required",
            register_count, LEGACY_REGISTER_COUNT
        )));
    }

    let header = ExtendedHeader {
        version,
        processor: Processor::from_extended(processor),
        exception_type,
        register_count,
        code_dump_size,
        stack_dump_size,
        additional_data_size,
    };
    debug!(
        "Dump format version {}.{}",
        header.version_major(),
        header.version_minor()
    );
    Ok(header)
}

fn parse_legacy(data: &[u8]) -> Result<LegacyHeader> {
    let mut reader = FieldReader::at(data, 12);
    let processor = reader.u32()?;
    let exception_type = reader.u32()?;
    let _reserved = reader.block(8)?;
    let code_dump_size = reader.u32()?;
    let stack_dump_size = reader.u32()?;

    Ok(LegacyHeader {
        processor: Processor::from_legacy(processor),
        exception_type,
        code_dump_size,
        stack_dump_size,
    })
}
