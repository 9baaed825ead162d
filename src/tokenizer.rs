//! Separator detection, quote handling, and line assembly: turns a byte
//! stream into a [`CellMatrix`] by driving an [`InputBuffer`] and a [`Trie`].

use std::io::Read;

use log::debug;

use crate::buffer::InputBuffer;
use crate::config::ParserOptions;
use crate::error::Error;
use crate::matrix::{CellMatrix, ParseDiagnostics, UnexpectedCell};
use crate::trie::Trie;

const CANDIDATES: [u8; 5] = [b'\t', b';', b',', b'|', b' '];

/// Parse `source` into a [`CellMatrix`] according to `opts`.
pub fn parse(source: impl Read + 'static, opts: ParserOptions) -> Result<CellMatrix, Error> {
    let opts = opts.validate()?;
    let mut buf = InputBuffer::new(source, opts.read_buffer_size)?;
    buf.refill()?;

    let (separator, columns, space_separated_headers) = detect_separator(buf.live());
    debug!(
        "detected separator={separator:#04x} columns={columns} space_headers={space_separated_headers}"
    );

    let max_by_lines = (opts.max_line_count as u64).saturating_mul(columns as u64);
    let effective_cell_cap =
        (opts.max_cell_count as u64).min(max_by_lines).saturating_add(columns as u64) as usize;

    let mut builder = MatrixBuilder {
        trie: Trie::new(),
        columns,
        cells: Vec::new(),
        unexpected_cells: Vec::new(),
        line_size: 0,
        empty_cells_since_line_start: 0,
        processed_cell_count: 0,
        effective_cell_cap,
        separator,
        space_separated_headers,
        truncated: false,
        lines_completed: 0,
    };

    builder.run(&mut buf)?;

    let encoding = buf.encoding;
    let final_columns = if builder.cells.is_empty() { 0 } else { builder.columns };

    Ok(CellMatrix {
        columns: final_columns,
        cells: builder.cells,
        content: builder.trie.into_content(),
        unexpected_cells: builder.unexpected_cells,
        diagnostics: ParseDiagnostics {
            separator: builder.effective_separator(),
            space_separated_headers: builder.space_separated_headers,
            file_encoding: encoding,
            truncated: builder.truncated,
        },
    })
}

/// Guess the separator and column count from the header line, per the
/// priority TAB, `;`, `,`, `|`, space. Leading spaces/newlines are skipped
/// first. Returns `(separator, columns, space_separated_headers)`.
fn detect_separator(bytes: &[u8]) -> (u8, usize, bool) {
    let mut i = 0;
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\n' | b'\r') {
        i += 1;
    }
    let start = i;
    let mut end = bytes.len();
    for (j, &b) in bytes.iter().enumerate().skip(start) {
        if b == b'\n' || b == b'\r' {
            end = j;
            break;
        }
    }
    let line = &bytes[start..end];
    for &c in &CANDIDATES {
        let count = line.iter().filter(|&&b| b == c).count();
        if count > 0 {
            return (c, count + 1, c == b' ');
        }
    }
    (b'\t', 1, false)
}

/// Un-quote and trim a raw cell span. `n_quotes` is the number of `"` bytes
/// seen while scanning the span (0 if it was never in quoted mode).
fn extract_cell(raw: &[u8], n_quotes: usize) -> Vec<u8> {
    let span: &[u8] = if n_quotes > 0 && raw.len() >= 2 && raw.last() == Some(&b'"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };

    let bytes: Vec<u8> = if n_quotes > 1 {
        let mut out = Vec::with_capacity(span.len());
        let mut i = 0;
        while i < span.len() {
            if span[i] == b'"' && span.get(i + 1) == Some(&b'"') {
                out.push(b'"');
                i += 2;
            } else {
                out.push(span[i]);
                i += 1;
            }
        }
        out
    } else {
        span.to_vec()
    };

    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| b != b' ').map(|p| p + 1).unwrap_or(start);
    bytes[start..end].to_vec()
}

struct MatrixBuilder {
    trie: Trie,
    columns: usize,
    cells: Vec<u32>,
    unexpected_cells: Vec<UnexpectedCell>,
    line_size: usize,
    empty_cells_since_line_start: usize,
    processed_cell_count: usize,
    effective_cell_cap: usize,
    separator: u8,
    space_separated_headers: bool,
    truncated: bool,
    lines_completed: usize,
}

impl MatrixBuilder {
    fn effective_separator(&self) -> u8 {
        if self.space_separated_headers {
            b'\t'
        } else {
            self.separator
        }
    }

    fn current_separator(&self, is_header_line: bool) -> u8 {
        if self.space_separated_headers && !is_header_line {
            b'\t'
        } else {
            self.separator
        }
    }

    fn push_cell(&mut self, raw: Vec<u8>) {
        self.processed_cell_count += 1;
        let id = self.trie.lookup_or_insert(&raw);

        if id == 0 {
            if self.line_size == 0 {
                self.empty_cells_since_line_start += 1;
            } else {
                if self.line_size < self.columns {
                    self.cells.push(0);
                }
                self.line_size += 1;
            }
            return;
        }

        for _ in 0..self.empty_cells_since_line_start {
            if self.line_size < self.columns {
                self.cells.push(0);
            }
            self.line_size += 1;
        }
        self.empty_cells_since_line_start = 0;

        if self.line_size < self.columns {
            self.cells.push(id);
        } else {
            self.unexpected_cells.push(UnexpectedCell {
                line: self.lines_completed,
                column: self.line_size,
                bytes: raw,
            });
        }
        self.line_size += 1;
    }

    fn end_line(&mut self) {
        if self.line_size > 0 {
            while self.line_size < self.columns {
                self.cells.push(0);
                self.line_size += 1;
            }
            self.lines_completed += 1;
        }
        self.line_size = 0;
        self.empty_cells_since_line_start = 0;
    }

    fn run(&mut self, buf: &mut InputBuffer) -> Result<(), Error> {
        let mut is_header_line = true;
        let mut in_quote = false;
        let mut n_quotes = 0usize;
        // Scan cursor into the live window, relative to `buf`'s own `start`.
        // Persists across `refill()` calls within a single cell so a refill
        // never re-scans bytes already classified (which would re-open a
        // quote whose leading `"` had already flipped `in_quote` to true).
        let mut i = 0usize;

        loop {
            if self.processed_cell_count >= self.effective_cell_cap {
                debug!(
                    "cell cap {} reached after {} processed cells; truncating",
                    self.effective_cell_cap, self.processed_cell_count
                );
                self.truncated = true;
                break;
            }

            let live = buf.live();
            if i >= live.len() {
                if buf.at_eof() {
                    break;
                }
                buf.refill()?;
                continue;
            }

            let sep = self.current_separator(is_header_line);
            let mut terminator: Option<(usize, bool)> = None;

            while i < live.len() {
                let byte = live[i];
                if in_quote {
                    if byte == b'"' {
                        if live.get(i + 1) == Some(&b'"') {
                            n_quotes += 1;
                            i += 2;
                            continue;
                        }
                        n_quotes += 1;
                        in_quote = false;
                    }
                    i += 1;
                    continue;
                }
                if i == 0 && byte == b'"' {
                    in_quote = true;
                    n_quotes = 1;
                    i += 1;
                    continue;
                }
                if byte == sep {
                    terminator = Some((i, false));
                    break;
                }
                if byte == b'\n' || byte == b'\r' {
                    terminator = Some((i, true));
                    break;
                }
                i += 1;
            }

            if let Some((end, is_newline)) = terminator {
                let raw = extract_cell(&live[..end], n_quotes);
                self.push_cell(raw);
                buf.advance(end + 1);
                i = 0;
                n_quotes = 0;
                in_quote = false;
                if is_newline {
                    self.end_line();
                    is_header_line = false;
                }
                continue;
            }

            // No terminator in the currently live bytes: try for more. `i`
            // is left at `live.len()` so the next scan picks up exactly
            // where this one left off instead of re-scanning from byte 0.
            let before = live.len();
            buf.refill()?;
            if buf.live().len() == before {
                // Refilling made no progress: the buffer genuinely cannot
                // hold a bigger cell. Force-extract at the boundary; the
                // remainder becomes a fresh cell on the same line.
                debug!("cell exceeded buffer capacity ({before} bytes); force-extracting at boundary");
                let raw = extract_cell(&buf.live()[..i], n_quotes);
                self.push_cell(raw);
                buf.advance(i);
                i = 0;
                n_quotes = 0;
                in_quote = false;
            }
        }

        if self.line_size > 0 {
            self.end_line();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_str(s: &str) -> CellMatrix {
        parse(Cursor::new(s.as_bytes().to_vec()), ParserOptions::default()).unwrap()
    }

    fn cell<'a>(m: &'a CellMatrix, line: usize, col: usize) -> &'a [u8] {
        m.get(line, col).unwrap()
    }

    #[test]
    fn detects_tab_separator() {
        let m = parse_str("a\tb\tc\n1\t2\t3\n");
        assert_eq!(m.columns, 3);
        assert_eq!(cell(&m, 0, 0), b"a");
        assert_eq!(cell(&m, 1, 2), b"3");
    }

    #[test]
    fn detects_comma_separator() {
        let m = parse_str("a,b,c\n1,2,3\n");
        assert_eq!(m.diagnostics.separator, b',');
        assert_eq!(m.columns, 3);
    }

    #[test]
    fn detects_semicolon_before_comma() {
        let m = parse_str("a;b,c\n1;2,3\n");
        assert_eq!(m.diagnostics.separator, b';');
        assert_eq!(m.columns, 2);
    }

    #[test]
    fn space_separated_header_then_tab_body() {
        let m = parse_str("a b c\n1\t2\t3\n");
        assert!(m.diagnostics.space_separated_headers);
        assert_eq!(m.columns, 3);
        assert_eq!(cell(&m, 0, 1), b"b");
        assert_eq!(cell(&m, 1, 1), b"2");
    }

    #[test]
    fn quoted_cell_with_embedded_separator() {
        let m = parse_str("a,b\n\"hello, world\",2\n");
        assert_eq!(cell(&m, 1, 0), b"hello, world");
    }

    #[test]
    fn escaped_quotes_collapse() {
        let m = parse_str("a,b\n\"she said \"\"hi\"\"\",2\n");
        assert_eq!(cell(&m, 1, 0), b"she said \"hi\"");
    }

    #[test]
    fn trims_surrounding_spaces() {
        let m = parse_str("a,b\n  x  , y \n");
        assert_eq!(cell(&m, 1, 0), b"x");
        assert_eq!(cell(&m, 1, 1), b"y");
    }

    #[test]
    fn trailing_empty_column_is_kept() {
        let m = parse_str("a,b,c\n1,2,\n");
        assert_eq!(cell(&m, 1, 2), b"");
    }

    #[test]
    fn blank_line_is_dropped() {
        let m = parse_str("a,b\n1,2\n\n3,4\n");
        assert_eq!(m.lines(), 3);
        assert_eq!(cell(&m, 2, 0), b"3");
    }

    #[test]
    fn crlf_is_tolerated() {
        let m = parse_str("a,b\r\n1,2\r\n");
        assert_eq!(m.lines(), 2);
        assert_eq!(cell(&m, 1, 1), b"2");
    }

    #[test]
    fn repeated_values_intern_to_the_same_identifier() {
        let m = parse_str("a,b\nx,y\nx,y\n");
        let row1 = m.cells[m.columns..m.columns * 2].to_vec();
        let row2 = m.cells[m.columns * 2..m.columns * 3].to_vec();
        assert_eq!(row1, row2);
    }

    #[test]
    fn extra_cells_beyond_columns_are_recorded_as_unexpected() {
        let m = parse_str("a,b\n1,2,3,4\n");
        assert_eq!(m.unexpected_cells.len(), 2);
        assert_eq!(m.unexpected_cells[0].bytes, b"3");
        assert_eq!(m.unexpected_cells[1].bytes, b"4");
    }

    #[test]
    fn empty_input_yields_zero_columns() {
        let m = parse_str("");
        assert_eq!(m.columns, 0);
        assert!(m.cells.is_empty());
    }

    #[test]
    fn truncation_flag_set_when_cap_reached() {
        let opts = ParserOptions {
            max_line_count: 1,
            max_cell_count: u32::MAX,
            ..Default::default()
        };
        let m = parse(Cursor::new(b"a,b,c\n1,2,3\n4,5,6\n".to_vec()), opts).unwrap();
        assert!(m.diagnostics.truncated);
        assert_eq!(m.columns, 3);
    }

    #[test]
    fn quoted_cell_survives_a_buffer_refill_mid_field() {
        // Sized so the first refill's live window ends exactly at the last
        // content byte (header 4 bytes + opening quote + 4091 content bytes
        // = 4096 bytes = the whole buffer), so the closing quote and the
        // comma that ends the cell only become visible after a second
        // refill. Before the fix, resuming that scan restarted at byte 0
        // instead of where it left off, which re-saw the opening quote as a
        // close and let the embedded comma/newline below wrongly end the
        // cell early.
        let opts = ParserOptions {
            read_buffer_size: 4096,
            ..Default::default()
        };
        let content = format!("start,\nend{}", "x".repeat(4081));
        assert_eq!(content.len(), 4091);
        let input = format!("a,b\n\"{content}\",done\n");
        let m = parse(Cursor::new(input.into_bytes()), opts).unwrap();
        assert_eq!(m.columns, 2);
        assert_eq!(cell(&m, 1, 0), content.as_bytes());
        assert_eq!(cell(&m, 1, 1), b"done");
        assert!(m.unexpected_cells.is_empty());
    }

    #[test]
    fn oversized_cell_is_truncated_at_buffer_boundary() {
        let opts = ParserOptions {
            read_buffer_size: 4096,
            ..Default::default()
        };
        let huge = "x".repeat(5000);
        let input = format!("a,b\n{huge},done\n");
        let m = parse(Cursor::new(input.into_bytes()), opts).unwrap();
        assert_eq!(m.columns, 2);
        // The oversized cell was split at the buffer boundary, so the row
        // gained extra tokens and "done" landed beyond the header's columns.
        assert!(!m.unexpected_cells.is_empty());
    }
}
