//! Chunked line streaming
//!
//! Reads at most `chunk_size` bytes at a time and hands complete lines to a
//! callback. A line cut by a chunk boundary is kept in a pending buffer and
//! completed by the next read, so the callback sees the same lines for any
//! chunk size (down to one byte) and for multi-byte delimiters.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::config::ParserOptions;
use crate::errors::{HierarchyError, Result};

/// Feed every line of `reader` to `on_line(line_number, line)`
///
/// Line numbers start at 1. Lines are decoded as UTF-8; the delimiter is not
/// included. Processing of a chunk is synchronous; the only suspension point
/// is the next read.
pub async fn for_each_line<R, F>(mut reader: R, options: &ParserOptions, mut on_line: F) -> Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(usize, &str) -> Result<()>,
{
    options.validate()?;
    let delim = options.delimiter.as_bytes();

    let mut chunk = vec![0u8; options.chunk_size];
    let mut pending: Vec<u8> = Vec::new();
    // Offset in `pending` from which a delimiter could still start
    let mut scan_from = 0usize;
    let mut line_no = 0usize;
    let mut bytes_read = 0usize;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        bytes_read += n;
        pending.extend_from_slice(&chunk[..n]);

        let mut line_start = 0usize;
        while let Some(pos) = find(&pending[scan_from..], delim) {
            let line_end = scan_from + pos;
            line_no += 1;
            emit(&pending[line_start..line_end], line_no, &mut on_line)?;
            line_start = line_end + delim.len();
            scan_from = line_start;
        }

        pending.drain(..line_start);
        scan_from = pending.len().saturating_sub(delim.len() - 1);
    }

    if !pending.is_empty() {
        line_no += 1;
        emit(&pending, line_no, &mut on_line)?;
    }

    debug!(bytes_read, lines = line_no, "Finished streaming lines");
    Ok(())
}

fn emit<F>(bytes: &[u8], line_no: usize, on_line: &mut F) -> Result<()>
where
    F: FnMut(usize, &str) -> Result<()>,
{
    let line = std::str::from_utf8(bytes)
        .map_err(|e| HierarchyError::malformed(line_no, format!("invalid UTF-8: {e}")))?;
    on_line(line_no, line)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() == 1 {
        return haystack.iter().position(|b| *b == needle[0]);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
