use crate::error::Error;

/// Minimum input buffer size this crate will accept.
pub const MIN_READ_BUFFER_SIZE: usize = 4096;

/// Options controlling how [`crate::tokenizer::parse`] reads and bounds its
/// input.
#[derive(Clone, Copy, Debug)]
pub struct ParserOptions {
    /// Upper bound on the number of data lines (header excluded).
    ///
    /// Default: `u32::MAX`
    pub max_line_count: u32,
    /// Upper bound on the number of cells (header excluded).
    ///
    /// Default: `u32::MAX`
    pub max_cell_count: u32,
    /// Capacity of the input buffer backing the scan.
    ///
    /// Default: 64 KiB
    pub read_buffer_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_line_count: u32::MAX,
            max_cell_count: u32::MAX,
            read_buffer_size: 64 * 1024,
        }
    }
}

impl ParserOptions {
    /// Validate this configuration, returning [`Error::OptionOutOfRange`] or
    /// [`Error::BufferTooSmall`] if any field is out of bounds.
    pub fn validate(self) -> Result<Self, Error> {
        if self.max_line_count == 0 {
            return Err(Error::OptionOutOfRange {
                field: "max_line_count",
                value: self.max_line_count as i64,
            });
        }
        if self.max_cell_count == 0 {
            return Err(Error::OptionOutOfRange {
                field: "max_cell_count",
                value: self.max_cell_count as i64,
            });
        }
        if self.read_buffer_size < MIN_READ_BUFFER_SIZE {
            return Err(Error::BufferTooSmall {
                requested: self.read_buffer_size,
                minimum: MIN_READ_BUFFER_SIZE,
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        ParserOptions::default().validate().unwrap();
    }

    #[test]
    fn rejects_small_buffer() {
        let opts = ParserOptions {
            read_buffer_size: 16,
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(Error::BufferTooSmall { .. })));
    }

    #[test]
    fn rejects_zero_caps() {
        let opts = ParserOptions {
            max_line_count: 0,
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(Error::OptionOutOfRange { .. })));

        let opts = ParserOptions {
            max_cell_count: 0,
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(Error::OptionOutOfRange { .. })));
    }
}
