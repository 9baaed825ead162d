use crate::buffer::FileEncoding;
use crate::error::Error;

/// A non-empty cell that appeared beyond the matrix's column count on its
/// line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnexpectedCell {
    pub line: usize,
    pub column: usize,
    pub bytes: Vec<u8>,
}

/// Per-parse diagnostics that don't fail the parse but are useful to report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseDiagnostics {
    pub separator: u8,
    pub space_separated_headers: bool,
    pub file_encoding: Option<FileEncoding>,
    pub truncated: bool,
}

/// The result of a parse: a dense cell/content matrix plus diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellMatrix {
    pub columns: usize,
    pub cells: Vec<u32>,
    pub content: Vec<Vec<u8>>,
    pub unexpected_cells: Vec<UnexpectedCell>,
    pub diagnostics: ParseDiagnostics,
}

impl CellMatrix {
    /// Number of lines, header included.
    pub fn lines(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.cells.len() / self.columns
        }
    }

    /// Number of data lines (header excluded).
    pub fn content_lines(&self) -> usize {
        self.lines().saturating_sub(1)
    }

    /// The byte content at `(line, column)`, or `None` if out of bounds.
    pub fn get(&self, line: usize, column: usize) -> Option<&[u8]> {
        if self.columns == 0 || column >= self.columns {
            return None;
        }
        let id = *self.cells.get(line * self.columns + column)? as usize;
        self.content.get(id).map(|v| v.as_slice())
    }

    /// Verify the structural invariants documented for this type:
    ///
    /// - content[0] is empty
    /// - every cell identifier is in range
    /// - the cell vector length is a multiple of `columns` (or both are zero)
    /// - identifiers appear in dense first-seen order
    pub fn check_consistency(&self) -> Result<(), Error> {
        if self.content.first().is_some_and(|c| !c.is_empty()) {
            return Err(Error::Inconsistent {
                reason: "content[0] is not empty".into(),
            });
        }

        if self.columns == 0 {
            if !self.cells.is_empty() {
                return Err(Error::Inconsistent {
                    reason: "columns is zero but cells is not empty".into(),
                });
            }
            if self.content.len() > 1 {
                return Err(Error::Inconsistent {
                    reason: "columns is zero but content holds more than the empty entry".into(),
                });
            }
        } else if self.cells.len() % self.columns != 0 {
            return Err(Error::Inconsistent {
                reason: format!(
                    "cell count {} is not a multiple of columns {}",
                    self.cells.len(),
                    self.columns
                ),
            });
        }

        let mut highest_seen: i64 = -1;
        for &id in &self.cells {
            let id = id as usize;
            if id >= self.content.len() {
                return Err(Error::Inconsistent {
                    reason: format!("cell identifier {id} has no content entry"),
                });
            }
            if id as i64 > highest_seen + 1 {
                return Err(Error::Inconsistent {
                    reason: format!(
                        "identifier {id} appears before {} has been seen",
                        id as i64 - 1
                    ),
                });
            }
            if id as i64 == highest_seen + 1 {
                highest_seen = id as i64;
            }
        }

        Ok(())
    }
}
