//! Annotated hex dump rendering.
//!
//! ```text
//! 00100000:  00 00 a0 e1 1e ff 2f e1  3c 00 00 ef 7e ff 2f e1   |....../.<...~./.|
//! ```

use std::fmt::Write;

pub const DEFAULT_ROW_WIDTH: usize = 16;
pub const DEFAULT_PLACEHOLDER: char = '.';

/// Render `bytes` as rows of `row_width` bytes labelled from `base_address`.
///
/// Each row has an 8-digit address, the bytes in hex with an extra gap at
/// the midpoint of the row, then the printable ASCII characters between
/// pipes, with `placeholder` standing in for everything else. The hex
/// column is padded so the gutter lines up on a short final row. Rows are
/// joined with newlines; empty input renders as an empty string.
pub fn render(base_address: u32, bytes: &[u8], row_width: usize, placeholder: char) -> String {
    let row_width = row_width.max(1);
    let hex_width = row_width * 3 + 1;
    let mut rows = Vec::with_capacity(bytes.len().div_ceil(row_width));

    for (row, chunk) in bytes.chunks(row_width).enumerate() {
        let mut hex = String::with_capacity(hex_width);
        for (i, byte) in chunk.iter().enumerate() {
            if i > 0 {
                hex.push(' ');
            }
            if row_width % 2 == 0 && i == row_width / 2 {
                hex.push(' ');
            }
            let _ = write!(hex, "{:02x}", byte);
        }

        let text: String = chunk
            .iter()
            .map(|&b| {
                if (0x20..0x7F).contains(&b) {
                    b as char
                } else {
                    placeholder
                }
            })
            .collect();

        let address = base_address.wrapping_add((row * row_width) as u32);
        rows.push(format!(
            "{:08X}:  {:<width$}  |{}|",
            address,
            hex,
            text,
            width = hex_width
        ));
    }

    rows.join("\n")
}
