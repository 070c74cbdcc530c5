//! Exception Dump Parser
//!
//! Decodes the crash dumps written by the ARM9/ARM11 exception handlers of
//! the console firmware into a human-readable report: processor, exception
//! classification, register table and annotated code/stack hex dumps.

pub mod classify;
pub mod config;
pub mod cursor;
pub mod dump;
pub mod error;
pub mod header;
pub mod hexdump;
pub mod registers;
pub mod report;
pub mod sections;

pub use config::{Config, OutputFormat};
pub use dump::ExceptionDump;
pub use error::{DumpError, Result};
pub use header::Layout;
pub use report::{format_json, format_report, ReportOptions};

/// Decode `data` and render it in the requested output format.
pub fn decode_to_string(
    data: &[u8],
    layout: Layout,
    format: OutputFormat,
    options: &ReportOptions,
) -> Result<String> {
    let dump = ExceptionDump::parse(data, layout)?;
    match format {
        OutputFormat::Text => Ok(format_report(&dump, options)),
        OutputFormat::Json => format_json(&dump),
    }
}
