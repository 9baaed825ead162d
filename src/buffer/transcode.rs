//! Streaming UTF-16 -> UTF-8 transcoding adapter.

use std::io::{self, Read};

use encoding_rs::{Decoder, Encoding};

/// Wraps a byte source known to be UTF-16LE or UTF-16BE and exposes it as a
/// `Read` of the equivalent UTF-8 bytes.
///
/// Reads in fixed-size blocks and keeps the decoder's own internal state
/// across calls, so a UTF-16 surrogate pair split across a block boundary is
/// handled by `encoding_rs` rather than by hand-rolled tail buffering.
pub struct Utf16ToUtf8<R> {
    inner: R,
    decoder: Decoder,
    in_buf: Box<[u8]>,
    out_buf: Vec<u8>,
    out_pos: usize,
    eof: bool,
}

const IN_BLOCK: usize = 4096;

impl<R: Read> Utf16ToUtf8<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder_without_bom_handling(),
            in_buf: vec![0u8; IN_BLOCK].into_boxed_slice(),
            out_buf: Vec::new(),
            out_pos: 0,
            eof: false,
        }
    }

    fn refill_out(&mut self) -> io::Result<()> {
        if self.eof {
            return Ok(());
        }
        let n = self.inner.read(&mut self.in_buf)?;
        let last = n == 0;
        self.out_buf.clear();
        self.out_pos = 0;
        // Worst case every input byte maps to 3 UTF-8 bytes.
        self.out_buf.resize(n * 3 + 32, 0);
        let (_, _, written, _) =
            self.decoder
                .decode_to_utf8(&self.in_buf[..n], &mut self.out_buf, last);
        self.out_buf.truncate(written);
        if last {
            self.eof = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for Utf16ToUtf8<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.out_pos >= self.out_buf.len() && !self.eof {
            self.refill_out()?;
        }
        let available = &self.out_buf[self.out_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.out_pos += n;
        Ok(n)
    }
}
