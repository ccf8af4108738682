//! Character encoding detection and transcoding.
//!
//! The XML reader only understands UTF-8. [`DecodedInput`] sits in front of
//! it: on the first read it sniffs the byte order mark or the XML
//! declaration, and from then on transcodes the stream chunk by chunk into
//! UTF-8. UTF-8 input passes through untouched, minus its BOM.

use encoding_rs::{Decoder, Encoding, UTF_16BE, UTF_16LE, UTF_8};
use std::io::{self, BufRead, Read};

/// Bytes read up front to find a BOM or an XML declaration.
const SNIFF_LEN: u64 = 1024;

/// A [`BufRead`] yielding the UTF-8 form of an XML byte stream.
pub struct DecodedInput<R> {
    inner: R,
    /// `None` until sniffed, then `Some(None)` for UTF-8 passthrough
    decoder: Option<Option<Decoder>>,
    /// Sniffed or transcoded bytes not yet handed out
    pending: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<R: BufRead> DecodedInput<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decoder: None,
            pending: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    fn sniff(&mut self) -> io::Result<()> {
        let mut head = Vec::new();
        (&mut self.inner).take(SNIFF_LEN).read_to_end(&mut head)?;

        let (encoding, bom_len) = detect_encoding(&head);
        let body = &head[bom_len..];

        if encoding == UTF_8 {
            self.pending = body.to_vec();
            self.decoder = Some(None);
        } else {
            let mut decoder = encoding.new_decoder_without_bom_handling();
            transcode(&mut decoder, body, false, &mut self.pending)?;
            self.decoder = Some(Some(decoder));
        }
        self.pos = 0;
        Ok(())
    }

    /// Transcode the next chunk of the inner reader into `pending`.
    fn refill(&mut self, decoder: &mut Decoder) -> io::Result<()> {
        self.pending.clear();
        self.pos = 0;

        let input = self.inner.fill_buf()?;
        let read = input.len();
        let last = read == 0;
        transcode(decoder, input, last, &mut self.pending)?;
        self.inner.consume(read);

        if last {
            self.eof = true;
        }
        Ok(())
    }
}

impl<R: BufRead> Read for DecodedInput<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: BufRead> BufRead for DecodedInput<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.decoder.is_none() {
            self.sniff()?;
        }

        if self.pos < self.pending.len() {
            return Ok(&self.pending[self.pos..]);
        }

        match self.decoder.take() {
            Some(Some(mut decoder)) => {
                // A chunk can decode to nothing (e.g. half a UTF-16 code unit)
                let result = loop {
                    if self.eof || self.pos < self.pending.len() {
                        break Ok(());
                    }
                    if let Err(e) = self.refill(&mut decoder) {
                        break Err(e);
                    }
                };
                self.decoder = Some(Some(decoder));
                result?;
                Ok(&self.pending[self.pos..])
            }
            passthrough => {
                self.decoder = passthrough;
                self.inner.fill_buf()
            }
        }
    }

    fn consume(&mut self, amt: usize) {
        if self.pos < self.pending.len() {
            self.pos = (self.pos + amt).min(self.pending.len());
        } else if matches!(self.decoder, Some(None)) {
            self.inner.consume(amt);
        }
    }
}

/// Encoding named by a BOM, implied by UTF-16 byte patterns, or declared in
/// the XML declaration; UTF-8 otherwise. Returns the BOM length to skip.
fn detect_encoding(head: &[u8]) -> (&'static Encoding, usize) {
    if let Some(found) = Encoding::for_bom(head) {
        return found;
    }

    match head {
        [0x3C, 0x00, 0x3F, 0x00, ..] => return (UTF_16LE, 0),
        [0x00, 0x3C, 0x00, 0x3F, ..] => return (UTF_16BE, 0),
        _ => {}
    }

    let declared = declared_encoding(head)
        .filter(|encoding| *encoding != UTF_16LE && *encoding != UTF_16BE);
    (declared.unwrap_or(UTF_8), 0)
}

/// The `encoding` pseudo-attribute of a leading `<?xml ... ?>` declaration.
fn declared_encoding(head: &[u8]) -> Option<&'static Encoding> {
    let decl = head.strip_prefix(b"<?xml")?;
    let end = decl.windows(2).position(|w| w == b"?>")?;
    let decl = &decl[..end];

    let start = decl.windows(8).position(|w| w == b"encoding")? + 8;
    let rest = trim_start(&decl[start..]).strip_prefix(b"=")?;
    let rest = trim_start(rest);

    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let len = rest.iter().position(|&b| b == quote)?;
    Encoding::for_label(&rest[..len])
}

fn trim_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    &bytes[skip..]
}

fn transcode(
    decoder: &mut Decoder,
    input: &[u8],
    last: bool,
    out: &mut Vec<u8>,
) -> io::Result<()> {
    let needed = decoder.max_utf8_buffer_length(input.len()).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "input chunk too large to transcode")
    })?;

    let start = out.len();
    out.resize(start + needed, 0);
    let (_, _, written, _) = decoder.decode_to_utf8(input, &mut out[start..], last);
    out.truncate(start + written);
    Ok(())
}
