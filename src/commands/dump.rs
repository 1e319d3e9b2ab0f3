//! Hex dump helper

/// Bytes shown by a short dump
pub const SHORT_DUMP_LEN: usize = 64;

const BYTES_PER_LINE: usize = 16;

/// Format `buf` as hex lines of 16 bytes, each prefixed with its offset
///
/// With `limit`, at most that many bytes are shown.
pub fn format_dump(buf: &[u8], limit: Option<usize>) -> Vec<String> {
    let len = limit.map_or(buf.len(), |l| l.min(buf.len()));
    buf[..len]
        .chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(i, line)| {
            let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
            format!("{:04x}: {}", i * BYTES_PER_LINE, hex.join(" "))
        })
        .collect()
}

/// Print a hex dump
pub fn print_dump(buf: &[u8], limit: Option<usize>) {
    for line in format_dump(buf, limit) {
        println!("{}", line);
    }
}
