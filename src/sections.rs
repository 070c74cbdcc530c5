//! Slicing of the variable-length regions that follow the header.
//!
//! Regions are laid out back to back right after the 40-byte header:
//! registers, code dump, stack dump and (extended only) additional data.
//! Declared sizes are taken at face value; if the file is shorter than they
//! claim, extraction fails instead of truncating.

use serde::Serialize;
use tracing::{debug, warn};

use crate::cursor::FieldReader;
use crate::error::Result;
use crate::header::{Header, HEADER_SIZE};
use crate::registers::RegisterSet;

/// Fixed stack top used by third-party homebrew loaders on the ARM9.
pub const LEGACY_HOMEBREW_STACK_BASE: u32 = 0x2700_0000;

/// Length of the process name field in the additional data.
pub const PROCESS_NAME_LEN: usize = 8;

/// Process that was running on the ARM11 when the exception was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub name: String,
    pub title_id: u64,
}

/// The regions of a dump, borrowed from the file buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sections<'a> {
    pub registers: RegisterSet,
    pub code_dump: &'a [u8],
    pub stack_dump: &'a [u8],
    pub process: Option<ProcessInfo>,
}

/// Stack size actually worth showing for a legacy dump.
///
/// Homebrew loaders put their stack top at [`LEGACY_HOMEBREW_STACK_BASE`];
/// when `sp` lies within `declared` bytes below it (both ends inclusive) the
/// firmware captured memory past the stack, so the window is cut at the base.
pub fn legacy_stack_size(sp: u32, declared: u32) -> u32 {
    let base = LEGACY_HOMEBREW_STACK_BASE;
    if base.saturating_sub(declared) <= sp && sp <= base {
        base - sp
    } else {
        declared
    }
}

/// Extract all regions described by `header` from `data`.
pub fn extract_sections<'a>(data: &'a [u8], header: &Header) -> Result<Sections<'a>> {
    let mut reader = FieldReader::at(data, HEADER_SIZE);

    let register_count = header.register_count();
    let register_bytes = reader.block(register_count * 4)?;
    let registers = RegisterSet::new(
        register_bytes
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect(),
    );

    let code_dump = reader.block(header.code_dump_size() as usize)?;

    let stack_dump_size = match header {
        Header::Extended(_) => header.stack_dump_size(),
        Header::Legacy(_) => {
            let declared = header.stack_dump_size();
            let effective = legacy_stack_size(registers.sp(), declared);
            if effective != declared {
                warn!(
                    "Stack pointer 0x{:08x} is below the homebrew stack base, showing 0x{:x} of 0x{:x} stack bytes",
                    registers.sp(),
                    effective,
                    declared
                );
            }
            effective
        }
    };
    let stack_dump = reader.block(stack_dump_size as usize)?;

    let process = match header.additional_data_size() {
        0 => None,
        size => {
            let additional = reader.block(size as usize)?;
            let mut fields = FieldReader::new(additional);
            Some(ProcessInfo {
                name: fields.ascii(PROCESS_NAME_LEN)?,
                title_id: fields.u64()?,
            })
        }
    };

    if reader.offset() < data.len() {
        debug!(
            "{} trailing bytes after the last region",
            data.len() - reader.offset()
        );
    }
    debug!(
        "Extracted {} registers, {} code bytes, {} stack bytes",
        registers.len(),
        code_dump.len(),
        stack_dump.len()
    );

    Ok(Sections {
        registers,
        code_dump,
        stack_dump,
        process,
    })
}
