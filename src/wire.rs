//! Binary serialization of a [`CellMatrix`].
//!
//! Layout: version byte, `u16` columns, `u32` cell count, `u32` content
//! count, cell identifiers as varints, then content records of a varint
//! length followed by that many raw bytes.

use std::io::{self, Read, Write};

use crate::error::Error;
use crate::matrix::{CellMatrix, ParseDiagnostics};
use crate::varint;

pub const VERSION: u8 = 1;

pub fn write(matrix: &CellMatrix, out: &mut impl Write) -> io::Result<()> {
    out.write_all(&[VERSION])?;
    out.write_all(&(matrix.columns as u16).to_le_bytes())?;
    out.write_all(&(matrix.cells.len() as u32).to_le_bytes())?;
    out.write_all(&(matrix.content.len() as u32).to_le_bytes())?;

    for &id in &matrix.cells {
        varint::write(id, out)?;
    }
    for bytes in &matrix.content {
        varint::write(bytes.len() as u32, out)?;
        out.write_all(bytes)?;
    }
    Ok(())
}

pub fn read(input: &mut impl Read) -> Result<CellMatrix, Error> {
    let mut version = [0u8; 1];
    input.read_exact(&mut version)?;
    if version[0] != VERSION {
        return Err(Error::UnknownVersion { found: version[0] });
    }

    let mut u16_buf = [0u8; 2];
    input.read_exact(&mut u16_buf)?;
    let columns = u16::from_le_bytes(u16_buf) as usize;

    let mut u32_buf = [0u8; 4];
    input.read_exact(&mut u32_buf)?;
    let cell_count = u32::from_le_bytes(u32_buf) as usize;
    input.read_exact(&mut u32_buf)?;
    let content_count = u32::from_le_bytes(u32_buf) as usize;

    let mut cells = Vec::with_capacity(cell_count);
    for _ in 0..cell_count {
        cells.push(varint::read(input)?);
    }

    let mut content = Vec::with_capacity(content_count);
    for _ in 0..content_count {
        let len = varint::read(input)? as usize;
        let mut bytes = vec![0u8; len];
        input.read_exact(&mut bytes)?;
        content.push(bytes);
    }

    Ok(CellMatrix {
        columns,
        cells,
        content,
        unexpected_cells: Vec::new(),
        diagnostics: ParseDiagnostics::default(),
    })
}
