use std::cmp;
use std::io::{self, Read};

use log::{debug, trace, warn};

use super::transcode::Utf16ToUtf8;
use super::FileEncoding;
use crate::error::Error;

/// A fixed-capacity byte window over an arbitrary [`Read`] source.
///
/// Bytes in `start..end` are live and unconsumed; the tokenizer advances
/// `start`, and [`InputBuffer::refill`] advances `end`.
pub struct InputBuffer {
    inner: Box<dyn Read>,
    buf: Box<[u8]>,
    start: usize,
    end: usize,
    eof: bool,
    pub encoding: Option<FileEncoding>,
}

impl InputBuffer {
    /// Construct a new buffer, sniffing the byte-order mark off `source`
    /// before the first fill.
    pub fn new(source: impl Read + 'static, capacity: usize) -> Result<Self, Error> {
        if capacity < 4 {
            return Err(Error::BufferTooSmall {
                requested: capacity,
                minimum: 4,
            });
        }

        let mut source = source;
        let mut probe = [0u8; 3];
        let n = read_fill(&mut source, &mut probe)?;
        let probe = &probe[..n];

        let (encoding, consumed, inner): (Option<FileEncoding>, usize, Box<dyn Read>) =
            if probe.starts_with(&[0xFF, 0xFE]) {
                debug!("detected UTF-16LE byte order mark");
                let rest = probe[2..].to_vec();
                let chained = io::Cursor::new(rest).chain(source);
                (
                    Some(FileEncoding::Utf16Le),
                    2,
                    Box::new(Utf16ToUtf8::new(chained, encoding_rs::UTF_16LE)),
                )
            } else if probe.starts_with(&[0xFE, 0xFF]) {
                debug!("detected UTF-16BE byte order mark");
                let rest = probe[2..].to_vec();
                let chained = io::Cursor::new(rest).chain(source);
                (
                    Some(FileEncoding::Utf16Be),
                    2,
                    Box::new(Utf16ToUtf8::new(chained, encoding_rs::UTF_16BE)),
                )
            } else if probe.starts_with(&[0xEF, 0xBB, 0xBF]) {
                debug!("detected UTF-8 byte order mark");
                (Some(FileEncoding::Utf8), 3, Box::new(source))
            } else {
                let chained = io::Cursor::new(probe.to_vec()).chain(source);
                (None, 0, Box::new(chained))
            };
        let _ = consumed;

        Ok(Self {
            inner,
            buf: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
            eof: false,
            encoding,
        })
    }

    #[inline]
    pub fn live(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.start = cmp::min(self.start + n, self.end);
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.end == self.buf.len() || self.eof
    }

    #[inline]
    pub fn at_eof(&self) -> bool {
        self.eof && self.start == self.end
    }

    /// Compact live bytes to the front of the window, then read as much as
    /// will fit. A zero-length read marks end-of-stream.
    pub fn refill(&mut self) -> Result<(), Error> {
        if self.eof {
            return Ok(());
        }
        let live = self.end - self.start;
        self.buf.copy_within(self.start..self.end, 0);
        self.start = 0;
        self.end = live;

        while self.end < self.buf.len() {
            match self.inner.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => self.end += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("error refilling input buffer: {e}");
                    return Err(Error::SourceFailure(e));
                }
            }
        }
        trace!("refilled input buffer: {} live bytes, eof={}", self.end - self.start, self.eof);
        Ok(())
    }
}

fn read_fill(source: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match source.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
