use std::io;

use encoding_rs::{CoderResult, Decoder, Encoder, Encoding, UTF_8};

/// A character-level pull interface over an encoded byte stream.
///
/// This decodes bytes from the underlying reader in buffered chunks and
/// hands them out one `char` at a time, with single-character lookahead.
/// Decoding never fails: malformed sequences are replaced with U+FFFD.
pub(crate) struct DecodingReader<R> {
    rdr: R,
    decoder: Decoder,
    bytes: Vec<u8>,
    byte_start: usize,
    byte_end: usize,
    chars: Vec<char>,
    char_pos: usize,
    text: String,
    eof: bool,
    done: bool,
}

impl<R: io::Read> DecodingReader<R> {
    /// Create a new decoding reader.
    ///
    /// When `bom_sniffing` is enabled, a UTF-8 or UTF-16 byte-order mark at
    /// the start of the stream overrides `encoding`. Otherwise only the
    /// configured encoding's own BOM is stripped.
    pub fn new(
        rdr: R,
        encoding: &'static Encoding,
        bom_sniffing: bool,
        capacity: usize,
    ) -> DecodingReader<R> {
        let decoder = if bom_sniffing {
            encoding.new_decoder()
        } else {
            encoding.new_decoder_with_bom_removal()
        };
        DecodingReader {
            rdr,
            decoder,
            bytes: vec![0; capacity],
            byte_start: 0,
            byte_end: 0,
            chars: Vec::with_capacity(capacity),
            char_pos: 0,
            text: String::new(),
            eof: false,
            done: false,
        }
    }

    /// Return the next character, advancing past it.
    pub fn next_char(&mut self) -> io::Result<Option<char>> {
        self.fill()?;
        if self.char_pos < self.chars.len() {
            let c = self.chars[self.char_pos];
            self.char_pos += 1;
            Ok(Some(c))
        } else {
            Ok(None)
        }
    }

    /// Return the next character without advancing past it.
    pub fn peek_char(&mut self) -> io::Result<Option<char>> {
        self.fill()?;
        if self.char_pos < self.chars.len() {
            Ok(Some(self.chars[self.char_pos]))
        } else {
            Ok(None)
        }
    }

    /// Replenish the character buffer from the underlying stream.
    ///
    /// Returns with at least one character available unless the stream is
    /// exhausted and the decoder has been flushed.
    fn fill(&mut self) -> io::Result<()> {
        while self.char_pos >= self.chars.len() && !self.done {
            if self.byte_start >= self.byte_end && !self.eof {
                let n = self.rdr.read(&mut self.bytes)?;
                self.byte_start = 0;
                self.byte_end = n;
                if n == 0 {
                    self.eof = true;
                }
            }
            let last = self.eof && self.byte_start >= self.byte_end;
            self.text.clear();
            self.text.reserve(self.bytes.len().max(4));
            let (result, nread, _) = self.decoder.decode_to_string(
                &self.bytes[self.byte_start..self.byte_end],
                &mut self.text,
                last,
            );
            self.byte_start += nread;
            self.chars.clear();
            self.char_pos = 0;
            self.chars.extend(self.text.chars());
            if last && result == CoderResult::InputEmpty {
                self.done = true;
            }
        }
        Ok(())
    }
}

/// A character-level push interface over an encoded byte stream.
///
/// Text is encoded into an internal byte buffer which is written through
/// to the underlying stream once it reaches the configured capacity.
/// Unmappable characters are emitted as numeric character references.
/// UTF-16 output encodings fall back to UTF-8 via
/// `Encoding::output_encoding`.
pub(crate) struct EncodingWriter<W: io::Write> {
    wtr: W,
    // None means the output is UTF-8 and text passes through unencoded.
    encoder: Option<Encoder>,
    buf: Vec<u8>,
    capacity: usize,
}

impl<W: io::Write> EncodingWriter<W> {
    pub fn new(
        wtr: W,
        encoding: &'static Encoding,
        capacity: usize,
    ) -> EncodingWriter<W> {
        let encoder = if encoding == UTF_8 {
            None
        } else {
            Some(encoding.output_encoding().new_encoder())
        };
        EncodingWriter { wtr, encoder, buf: Vec::with_capacity(capacity), capacity }
    }

    /// Encode `text` into the internal buffer, writing through when full.
    pub fn write_str(&mut self, text: &str) -> io::Result<()> {
        match self.encoder {
            None => self.buf.extend_from_slice(text.as_bytes()),
            Some(ref mut encoder) => {
                let mut src = text;
                loop {
                    self.buf.reserve(src.len().max(16) * 4);
                    let (result, nread, _) =
                        encoder.encode_from_utf8_to_vec(src, &mut self.buf, false);
                    src = &src[nread..];
                    if src.is_empty() && result == CoderResult::InputEmpty {
                        break;
                    }
                }
            }
        }
        if self.buf.len() >= self.capacity {
            self.write_through()?;
        }
        Ok(())
    }

    /// Push buffered bytes to the underlying stream and flush it.
    pub fn flush(&mut self) -> io::Result<()> {
        self.write_through()?;
        self.wtr.flush()
    }

    /// Flush any pending encoder state, then the stream.
    ///
    /// This must be called once, at the end of output, for stateful
    /// encodings that need a closing escape sequence.
    pub fn finish(&mut self) -> io::Result<()> {
        if let Some(ref mut encoder) = self.encoder {
            loop {
                self.buf.reserve(16);
                let (result, _, _) =
                    encoder.encode_from_utf8_to_vec("", &mut self.buf, true);
                if result == CoderResult::InputEmpty {
                    break;
                }
            }
        }
        self.flush()
    }

    /// Return the underlying stream, discarding the buffer.
    ///
    /// Callers are expected to `finish` first.
    pub fn into_inner(self) -> W {
        self.wtr
    }

    fn write_through(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.wtr.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }
}
