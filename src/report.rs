//! Crash report rendering.
//!
//! The text report has a fixed section order: processor, exception type,
//! fault status and access type (ARM11 aborts), current process (when
//! known), register table, code dump, stack dump.

use serde::Serialize;

use crate::classify::{AccessType, Classification};
use crate::dump::ExceptionDump;
use crate::error::Result;
use crate::header::{Layout, Processor};
use crate::hexdump::{self, DEFAULT_PLACEHOLDER, DEFAULT_ROW_WIDTH};
use crate::registers::{register_name, CPSR};

const REGISTER_NAME_WIDTH: usize = 15;
const REGISTER_VALUE_WIDTH: usize = 20;

/// Hex dump geometry used by the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub row_width: usize,
    pub placeholder: char,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            row_width: DEFAULT_ROW_WIDTH,
            placeholder: DEFAULT_PLACEHOLDER,
        }
    }
}

fn register_cell(name: &str, value: u32) -> String {
    format!(
        "{:<name_w$}{:<value_w$}",
        name,
        format!("{:08x}", value),
        name_w = REGISTER_NAME_WIDTH,
        value_w = REGISTER_VALUE_WIDTH
    )
}

/// Two registers per row; an odd register count ends with a half row.
/// A blank line separates r0-lr/pc from the status registers when the dump
/// carries the extended register bank.
fn format_register_table(report: &mut String, values: &[u32]) {
    let count = values.len();
    for i in (0..count - count % 2).step_by(2) {
        if i == CPSR {
            report.push('\n');
        }
        report.push_str(&register_cell(&register_name(i), values[i]));
        report.push_str(&register_cell(&register_name(i + 1), values[i + 1]));
        report.push('\n');
    }
    if count % 2 == 1 {
        report.push_str(&register_cell(&register_name(count - 1), values[count - 1]));
        report.push('\n');
    }
}

/// Render the text report for a decoded dump.
pub fn format_report(dump: &ExceptionDump<'_>, options: &ReportOptions) -> String {
    let mut report = String::new();

    report.push_str(&format!("Processor: {}\n", dump.processor()));
    report.push_str(&format!("Exception type: {}\n", dump.classification()));
    if let Some(status) = dump.fault_status() {
        report.push_str(&format!("Fault status: {}\n", status));
    }
    if let Some(access) = dump.data_access() {
        report.push_str(&format!(
            "Access type: {} (far {:08x})\n",
            access.access, access.address
        ));
    }
    if let Some(process) = &dump.process {
        report.push_str(&format!(
            "Current process: {} ({:016x})\n",
            process.name, process.title_id
        ));
    }

    report.push_str("\nRegister dump:\n\n");
    format_register_table(&mut report, dump.registers.values());

    report.push_str("\nCode dump:\n\n");
    report.push_str(&hexdump::render(
        dump.code_dump_address(),
        dump.code_dump,
        options.row_width,
        options.placeholder,
    ));
    report.push('\n');

    report.push_str("\nStack dump:\n\n");
    report.push_str(&hexdump::render(
        dump.stack_dump_address(),
        dump.stack_dump,
        options.row_width,
        options.placeholder,
    ));
    report.push('\n');

    report
}

#[derive(Debug, Serialize)]
pub struct RegisterEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessEntry {
    pub name: String,
    pub title_id: String,
}

#[derive(Debug, Serialize)]
pub struct MemoryWindow {
    pub base_address: String,
    pub size: usize,
    pub bytes: String,
}

impl MemoryWindow {
    fn new(base: u32, data: &[u8]) -> Self {
        Self {
            base_address: format!("0x{:08X}", base),
            size: data.len(),
            bytes: hex::encode(data),
        }
    }
}

/// Machine-readable form of a decoded dump.
#[derive(Debug, Serialize)]
pub struct DumpSummary {
    pub layout: Layout,
    pub processor: Processor,
    pub exception: Classification,
    pub description: String,
    pub fault_status: Option<&'static str>,
    pub access_type: Option<AccessType>,
    pub fault_address: Option<String>,
    pub process: Option<ProcessEntry>,
    pub registers: Vec<RegisterEntry>,
    pub code_dump: MemoryWindow,
    pub stack_dump: MemoryWindow,
}

impl DumpSummary {
    pub fn from_dump(dump: &ExceptionDump<'_>) -> Self {
        let exception = dump.classification();
        let data_access = dump.data_access();
        Self {
            layout: dump.layout(),
            processor: dump.processor(),
            exception,
            description: exception.to_string(),
            fault_status: dump.fault_status(),
            access_type: data_access.map(|a| a.access),
            fault_address: data_access.map(|a| format!("0x{:08X}", a.address)),
            process: dump.process.as_ref().map(|p| ProcessEntry {
                name: p.name.clone(),
                title_id: format!("{:016x}", p.title_id),
            }),
            registers: dump
                .registers
                .named()
                .map(|r| RegisterEntry {
                    name: r.name,
                    value: format!("0x{:08X}", r.value),
                })
                .collect(),
            code_dump: MemoryWindow::new(dump.code_dump_address(), dump.code_dump),
            stack_dump: MemoryWindow::new(dump.stack_dump_address(), dump.stack_dump),
        }
    }
}

/// Render the decoded dump as pretty-printed JSON.
pub fn format_json(dump: &ExceptionDump<'_>) -> Result<String> {
    Ok(serde_json::to_string_pretty(&DumpSummary::from_dump(dump))?)
}
