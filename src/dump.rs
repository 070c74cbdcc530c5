//! A fully decoded exception dump.

use tracing::{debug, warn};

use crate::classify::{
    capture_incomplete, classify, data_access, fault_status, Classification, DataAccess,
};
use crate::error::Result;
use crate::header::{parse_header, Header, Layout, Processor};
use crate::registers::RegisterSet;
use crate::sections::{extract_sections, ProcessInfo};

/// Decoded view of a dump file. Memory windows borrow from the file buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionDump<'a> {
    pub header: Header,
    pub registers: RegisterSet,
    pub code_dump: &'a [u8],
    pub stack_dump: &'a [u8],
    pub process: Option<ProcessInfo>,
}

impl<'a> ExceptionDump<'a> {
    /// Decode a complete dump file using the given wire layout.
    ///
    /// Any failure aborts the whole decode; there is no partial result.
    pub fn parse(data: &'a [u8], layout: Layout) -> Result<Self> {
        debug!("Decoding {} byte dump as {} layout", data.len(), layout);
        let header = parse_header(data, layout)?;
        let sections = extract_sections(data, &header)?;

        if capture_incomplete(&header, &sections.registers) {
            warn!("Data abort taken from abort/undefined mode, code and stack dumps may be incorrect");
        }

        Ok(Self {
            header,
            registers: sections.registers,
            code_dump: sections.code_dump,
            stack_dump: sections.stack_dump,
            process: sections.process,
        })
    }

    pub fn layout(&self) -> Layout {
        self.header.layout()
    }

    pub fn processor(&self) -> Processor {
        self.header.processor()
    }

    pub fn classification(&self) -> Classification {
        classify(&self.header, &self.registers, self.code_dump)
    }

    pub fn fault_status(&self) -> Option<&'static str> {
        fault_status(&self.header, &self.registers)
    }

    pub fn data_access(&self) -> Option<DataAccess> {
        data_access(&self.header, &self.registers)
    }

    /// Address of the first code dump byte. The dump ends with the
    /// instruction at `pc`, so the start is found by backing off the dump
    /// size from the end of that instruction.
    pub fn code_dump_address(&self) -> u32 {
        self.registers
            .pc()
            .wrapping_sub(self.code_dump.len() as u32)
            .wrapping_add(self.registers.instruction_width())
    }

    /// The stack dump starts at `sp`.
    pub fn stack_dump_address(&self) -> u32 {
        self.registers.sp()
    }
}
