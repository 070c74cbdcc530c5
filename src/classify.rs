//! Exception classification.
//!
//! The exception vector the firmware trapped gives the base label. For
//! prefetch aborts on extended dumps, the instruction at the faulting `pc`
//! (the tail of the code dump) distinguishes kernel panics and `svcBreak`
//! debug breaks from genuine aborts. Classification never fails.

use std::fmt;

use serde::Serialize;

use crate::cursor::{read_u16_le, read_u32_le};
use crate::header::Header;
use crate::registers::{RegisterSet, CPSR_MODE_MASK, CPSR_THUMB_BIT, DFSR, FAR, IFSR};

/// `bkpt 0xFFFE` as the kernel emits it on panic.
pub const ARM_KERNEL_PANIC: u32 = 0xE12F_FF7E;

/// `svc 0x3C` (svcBreak), ARM encoding.
pub const ARM_SVC_BREAK: u32 = 0xEF00_003C;

/// `svc 0x3C` (svcBreak), Thumb encoding.
pub const THUMB_SVC_BREAK: u32 = 0xDF3C;

/// FPEXC.EX: the VFP coprocessor is in the exceptional state.
pub const FPEXC_EXCEPTION_BIT: u32 = 1 << 31;

/// CPSR modes in which a data abort cannot capture a clean dump
/// (abort and undefined).
pub const CPSR_MODE_ABORT: u32 = 0x7;
pub const CPSR_MODE_UNDEFINED: u32 = 0xB;

/// Break reasons passed in r0 to svcBreak.
pub const SVC_BREAK_REASONS: [&str; 3] = ["panic", "assertion failed", "user-related"];

/// Bits of IFSR/DFSR compared against [`FAULT_STATUS`].
pub const FSR_STATUS_MASK: u32 = 0xF;

/// DFSR.WnR: the aborted access was a write.
pub const DFSR_WRITE_BIT: u32 = 1 << 11;

/// ARM11 fault status encodings. The imprecise external abort code needs
/// FS[4], which the mask drops, so that entry is never matched.
pub const FAULT_STATUS: [(u32, &str); 15] = [
    (0b1, "Alignment"),
    (0b100, "Instr.cache maintenance op."),
    (0b1100, "Ext.Abort on translation - Lv1"),
    (0b1110, "Ext.Abort on translation - Lv2"),
    (0b101, "Translation - Section"),
    (0b111, "Translation - Page"),
    (0b11, "Access bit - Section"),
    (0b110, "Access bit - Page"),
    (0b1001, "Domain - Section"),
    (0b1011, "Domain - Page"),
    (0b1101, "Permission - Section"),
    (0b1111, "Permission - Page"),
    (0b1000, "Precise External Abort"),
    (0b10110, "Imprecise External Abort"),
    (0b10, "Debug event"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExceptionKind {
    Fiq,
    UndefinedInstruction,
    PrefetchAbort,
    DataAbort,
    Unknown,
}

impl ExceptionKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ExceptionKind::Fiq,
            1 => ExceptionKind::UndefinedInstruction,
            2 => ExceptionKind::PrefetchAbort,
            3 => ExceptionKind::DataAbort,
            _ => ExceptionKind::Unknown,
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionKind::Fiq => write!(f, "FIQ"),
            ExceptionKind::UndefinedInstruction => write!(f, "undefined instruction"),
            ExceptionKind::PrefetchAbort => write!(f, "prefetch abort"),
            ExceptionKind::DataAbort => write!(f, "data abort"),
            ExceptionKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Finer cause of an exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Refinement {
    KernelPanic,
    /// Reason index from r0; `None` when it is outside the known table.
    SvcBreak { reason: Option<usize> },
    VfpException,
}

impl Refinement {
    fn svc_break(r0: u32) -> Self {
        let reason = r0 as usize;
        Refinement::SvcBreak {
            reason: (reason < SVC_BREAK_REASONS.len()).then_some(reason),
        }
    }
}

impl fmt::Display for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refinement::KernelPanic => write!(f, "(kernel panic)"),
            Refinement::SvcBreak {
                reason: Some(reason),
            } => match SVC_BREAK_REASONS.get(*reason) {
                Some(name) => write!(f, "(svcBreak: {})", name),
                None => write!(f, "(svcBreak)"),
            },
            Refinement::SvcBreak { reason: None } => write!(f, "(svcBreak)"),
            Refinement::VfpException => write!(f, "(VFP exception)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub kind: ExceptionKind,
    pub detail: Option<Refinement>,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} {}", self.kind, detail),
            None => write!(f, "{}", self.kind),
        }
    }
}

fn last_word(code_dump: &[u8]) -> Option<u32> {
    read_u32_le(code_dump, code_dump.len().checked_sub(4)?).ok()
}

fn last_halfword(code_dump: &[u8]) -> Option<u32> {
    read_u16_le(code_dump, code_dump.len().checked_sub(2)?)
        .ok()
        .map(u32::from)
}

fn classify_prefetch_abort(registers: &RegisterSet, code_dump: &[u8]) -> Option<Refinement> {
    // The Thumb test compares the masked flag against 1, which it never
    // equals: Thumb svcBreaks are not recognized.
    let thumb_flag = registers.cpsr() & CPSR_THUMB_BIT;
    if thumb_flag == 0 && code_dump.len() >= 4 {
        match last_word(code_dump)? {
            ARM_KERNEL_PANIC => Some(Refinement::KernelPanic),
            ARM_SVC_BREAK => Some(Refinement::svc_break(registers.r0())),
            _ => None,
        }
    } else if thumb_flag == 1 && code_dump.len() >= 2 {
        let instr = last_word(code_dump).or_else(|| last_halfword(code_dump))?;
        (instr == THUMB_SVC_BREAK).then(|| Refinement::svc_break(registers.r0()))
    } else {
        None
    }
}

/// Classify the exception recorded in a dump.
pub fn classify(header: &Header, registers: &RegisterSet, code_dump: &[u8]) -> Classification {
    let kind = ExceptionKind::from_code(header.exception_type());

    let detail = match header {
        Header::Legacy(_) => None,
        Header::Extended(_) if kind == ExceptionKind::PrefetchAbort => {
            classify_prefetch_abort(registers, code_dump)
        }
        Header::Extended(h) => registers
            .fpexc()
            .filter(|fpexc| !h.processor.is_arm9() && fpexc & FPEXC_EXCEPTION_BIT != 0)
            .map(|_| Refinement::VfpException),
    };

    Classification { kind, detail }
}

/// True when a data abort was taken from abort or undefined mode, in which
/// case the firmware could not reliably capture code and stack.
pub fn capture_incomplete(header: &Header, registers: &RegisterSet) -> bool {
    let mode = registers.cpsr() & CPSR_MODE_MASK;
    ExceptionKind::from_code(header.exception_type()) == ExceptionKind::DataAbort
        && (mode == CPSR_MODE_ABORT || mode == CPSR_MODE_UNDEFINED)
}

/// Direction of the memory access that caused a data abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Read,
    Write,
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessType::Read => write!(f, "Read"),
            AccessType::Write => write!(f, "Write"),
        }
    }
}

/// Faulting address and access direction of a data abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataAccess {
    pub address: u32,
    pub access: AccessType,
}

/// Only extended ARM11 dumps carry the fault status registers.
fn has_fault_registers(header: &Header) -> bool {
    matches!(header, Header::Extended(h) if !h.processor.is_arm9())
}

/// Name of the fault status recorded for a prefetch abort (IFSR) or data
/// abort (DFSR). `None` for other exceptions and unknown codes.
pub fn fault_status(header: &Header, registers: &RegisterSet) -> Option<&'static str> {
    if !has_fault_registers(header) {
        return None;
    }
    let fsr = match ExceptionKind::from_code(header.exception_type()) {
        ExceptionKind::PrefetchAbort => registers.get(IFSR)?,
        ExceptionKind::DataAbort => registers.get(DFSR)?,
        _ => return None,
    };
    FAULT_STATUS
        .iter()
        .find(|(code, _)| *code == fsr & FSR_STATUS_MASK)
        .map(|(_, name)| *name)
}

/// Fault address and access direction of a data abort.
pub fn data_access(header: &Header, registers: &RegisterSet) -> Option<DataAccess> {
    if !has_fault_registers(header)
        || ExceptionKind::from_code(header.exception_type()) != ExceptionKind::DataAbort
    {
        return None;
    }
    let dfsr = registers.get(DFSR)?;
    Some(DataAccess {
        address: registers.get(FAR)?,
        access: if dfsr & DFSR_WRITE_BIT != 0 {
            AccessType::Write
        } else {
            AccessType::Read
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{ExtendedHeader, LegacyHeader, Processor};
    use crate::registers::{CPSR, DFSR, FAR, FPEXC, IFSR};

    fn extended(exception_type: u32, processor: Processor) -> Header {
        Header::Extended(ExtendedHeader {
            version: (1 << 16) | 2,
            processor,
            exception_type,
            register_count: 23,
            code_dump_size: 48,
            stack_dump_size: 0,
            additional_data_size: 0,
        })
    }

    fn registers(r0: u32, cpsr: u32) -> RegisterSet {
        let mut values = vec![0u32; 23];
        values[0] = r0;
        values[CPSR] = cpsr;
        RegisterSet::new(values)
    }

    fn code_ending_with(instr: &[u8]) -> Vec<u8> {
        let mut code = vec![0u8; 44];
        code.extend_from_slice(instr);
        code
    }

    const ARM11: Processor = Processor::Arm11 { core: 0 };

    #[test]
    fn test_base_labels() {
        let regs = registers(0, 0x10);
        let labels: Vec<String> = (0..6)
            .map(|code| classify(&extended(code, ARM11), &regs, &[]).to_string())
            .collect();
        assert_eq!(
            labels,
            [
                "FIQ",
                "undefined instruction",
                "prefetch abort",
                "data abort",
                "unknown",
                "unknown"
            ]
        );
    }

    #[test]
    fn test_kernel_panic() {
        let code = code_ending_with(&[0x7E, 0xFF, 0x2F, 0xE1]);
        let result = classify(&extended(2, ARM11), &registers(0, 0x13), &code);
        assert_eq!(result.kind, ExceptionKind::PrefetchAbort);
        assert_eq!(result.detail, Some(Refinement::KernelPanic));
        assert_eq!(result.to_string(), "prefetch abort (kernel panic)");
    }

    #[test]
    fn test_arm_svc_break_reasons() {
        let code = code_ending_with(&[0x3C, 0x00, 0x00, 0xEF]);
        let expected = [
            (0, "(svcBreak: panic)"),
            (1, "(svcBreak: assertion failed)"),
            (2, "(svcBreak: user-related)"),
            (3, "(svcBreak)"),
            (5, "(svcBreak)"),
        ];
        for (r0, detail) in expected {
            let result = classify(&extended(2, ARM11), &registers(r0, 0x10), &code);
            assert_eq!(result.kind, ExceptionKind::PrefetchAbort);
            assert_eq!(result.detail.map(|d| d.to_string()).as_deref(), Some(detail));
        }
    }

    #[test]
    fn test_unmatched_instruction_has_no_detail() {
        let code = code_ending_with(&[0x00, 0x00, 0xA0, 0xE1]);
        let result = classify(&extended(2, ARM11), &registers(0, 0x10), &code);
        assert_eq!(result.detail, None);
        assert_eq!(result.to_string(), "prefetch abort");
    }

    #[test]
    fn test_short_code_dump_has_no_detail() {
        let result = classify(&extended(2, ARM11), &registers(0, 0x10), &[0x2F, 0xE1]);
        assert_eq!(result.detail, None);
        let result = classify(&extended(2, ARM11), &registers(0, 0x10), &[]);
        assert_eq!(result.detail, None);
    }

    /// Known discrepancy: the Thumb flag is tested against 1 after masking
    /// with 0x20, so a Thumb `svc 0x3C` is never reported as svcBreak.
    /// Kept until the intended condition is confirmed upstream.
    #[test]
    fn test_thumb_svc_break_not_recognized() {
        let mut code = vec![0u8; 46];
        code.extend_from_slice(&[0x3C, 0xDF]);
        let result = classify(&extended(2, ARM11), &registers(1, 0x30), &code);
        assert_eq!(result.kind, ExceptionKind::PrefetchAbort);
        assert_eq!(result.detail, None);

        // The ARM encodings are not matched in Thumb state either.
        let code = code_ending_with(&[0x7E, 0xFF, 0x2F, 0xE1]);
        let result = classify(&extended(2, ARM11), &registers(0, 0x30), &code);
        assert_eq!(result.detail, None);
    }

    #[test]
    fn test_vfp_exception_on_arm11() {
        let mut values = registers(0, 0x10).values().to_vec();
        values[FPEXC] = 0xC000_0000;
        let regs = RegisterSet::new(values);

        let result = classify(&extended(1, ARM11), &regs, &[]);
        assert_eq!(result.to_string(), "undefined instruction (VFP exception)");

        // not reported for the ARM9
        let result = classify(&extended(1, Processor::Arm9), &regs, &[]);
        assert_eq!(result.detail, None);

        // prefetch aborts are refined from the code dump instead
        let result = classify(&extended(2, ARM11), &regs, &[]);
        assert_eq!(result.detail, None);
    }

    #[test]
    fn test_legacy_is_never_refined() {
        let header = Header::Legacy(LegacyHeader {
            processor: Processor::Arm9,
            exception_type: 2,
            code_dump_size: 48,
            stack_dump_size: 0,
        });
        let code = code_ending_with(&[0x7E, 0xFF, 0x2F, 0xE1]);
        let regs = RegisterSet::new(vec![0; 17]);
        let result = classify(&header, &regs, &code);
        assert_eq!(result.kind, ExceptionKind::PrefetchAbort);
        assert_eq!(result.detail, None);
    }

    #[test]
    fn test_capture_incomplete() {
        let header = extended(3, ARM11);
        assert!(capture_incomplete(&header, &registers(0, 0x17)));
        assert!(capture_incomplete(&header, &registers(0, 0x1B)));
        assert!(!capture_incomplete(&header, &registers(0, 0x13)));
        assert!(!capture_incomplete(&extended(2, ARM11), &registers(0, 0x17)));
    }

    fn fault_registers(dfsr: u32, ifsr: u32, far: u32) -> RegisterSet {
        let mut values = vec![0u32; 23];
        values[CPSR] = 0x10;
        values[DFSR] = dfsr;
        values[IFSR] = ifsr;
        values[FAR] = far;
        RegisterSet::new(values)
    }

    #[test]
    fn test_data_abort_fault_status() {
        let header = extended(3, ARM11);

        let regs = fault_registers(0x805, 0, 0x0800_1234);
        assert_eq!(fault_status(&header, &regs), Some("Translation - Section"));
        assert_eq!(
            data_access(&header, &regs),
            Some(DataAccess {
                address: 0x0800_1234,
                access: AccessType::Write
            })
        );

        let regs = fault_registers(0x00D, 0, 0x1000);
        assert_eq!(fault_status(&header, &regs), Some("Permission - Section"));
        assert_eq!(data_access(&header, &regs).map(|a| a.access), Some(AccessType::Read));
    }

    #[test]
    fn test_unmatched_fault_status() {
        let header = extended(3, ARM11);
        assert_eq!(fault_status(&header, &fault_registers(0x000, 0, 0)), None);
        assert_eq!(fault_status(&header, &fault_registers(0x800, 0, 0)), None);
        // FS[4] is masked off, so 0b10110 reads as 0b0110
        assert_eq!(
            fault_status(&header, &fault_registers(0x016, 0, 0)),
            Some("Access bit - Page")
        );
        // the access type is still known without a status match
        assert_eq!(
            data_access(&header, &fault_registers(0x800, 0, 0x20)),
            Some(DataAccess {
                address: 0x20,
                access: AccessType::Write
            })
        );
    }

    #[test]
    fn test_prefetch_abort_uses_ifsr() {
        let regs = fault_registers(0x805, 0x002, 0x1000);
        assert_eq!(fault_status(&extended(2, ARM11), &regs), Some("Debug event"));
        assert_eq!(data_access(&extended(2, ARM11), &regs), None);
    }

    #[test]
    fn test_fault_status_only_for_arm11_aborts() {
        let regs = fault_registers(0x805, 0x805, 0x1000);
        assert_eq!(fault_status(&extended(3, Processor::Arm9), &regs), None);
        assert_eq!(data_access(&extended(3, Processor::Arm9), &regs), None);
        assert_eq!(fault_status(&extended(1, ARM11), &regs), None);
        assert_eq!(fault_status(&extended(0, ARM11), &regs), None);

        let legacy = Header::Legacy(LegacyHeader {
            processor: Processor::Numbered { id: 11 },
            exception_type: 3,
            code_dump_size: 0,
            stack_dump_size: 0,
        });
        assert_eq!(fault_status(&legacy, &regs), None);
        assert_eq!(data_access(&legacy, &regs), None);
    }

    #[test]
    fn test_out_of_table_svc_break_reason_displays_plainly() {
        let refinement = Refinement::SvcBreak { reason: Some(7) };
        assert_eq!(refinement.to_string(), "(svcBreak)");
    }
}
