// src/livelog/codec.rs

//! Output encoding helpers.
//!
//! Persisted logs are stored as `base64(zlib(text))`. Raw process output is
//! normalised to UTF-8 before it is written anywhere; output that is not
//! valid UTF-8 is decoded as GBK, which is what Windows consoles commonly
//! emit.

use std::io::{self, Read};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderWriter;
use encoding_rs::GBK;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

/// Stream `reader` through zlib and base64, returning the encoded payload.
pub fn compress_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut buf = Vec::new();
    {
        let b64 = EncoderWriter::new(&mut buf, &STANDARD);
        let mut zlib = ZlibEncoder::new(b64, Compression::default());
        io::copy(&mut reader, &mut zlib)?;
        let mut b64 = zlib.finish()?;
        b64.finish()?;
    }
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Compress a string. The empty string encodes to the empty string.
pub fn compress_text(text: &str) -> io::Result<String> {
    if text.is_empty() {
        return Ok(String::new());
    }
    compress_reader(text.as_bytes())
}

/// Inverse of [`compress_text`].
pub fn decompress_text(encoded: &str) -> io::Result<String> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Ok(String::new());
    }

    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut out = Vec::new();
    ZlibDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Convert possibly non-UTF-8 bytes to a UTF-8 string.
pub fn to_utf8(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _had_errors) = GBK.decode_without_bom_handling(data);
            text.into_owned()
        }
    }
}

/// Incremental UTF-8 normaliser for chunked process output.
///
/// A multi-byte character split across two reads would look invalid on its
/// own; the incomplete tail is held back and prepended to the next chunk.
#[derive(Debug, Default)]
pub struct TextNormalizer {
    carry: Vec<u8>,
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalise one chunk. May return fewer bytes than were pushed if the
    /// chunk ended mid-character.
    pub fn push(&mut self, input: &[u8]) -> Vec<u8> {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(input);

        match std::str::from_utf8(&data) {
            Ok(_) => data,
            Err(e) if e.error_len().is_none() => {
                self.carry = data.split_off(e.valid_up_to());
                data
            }
            Err(_) => to_utf8(&data).into_bytes(),
        }
    }

    /// Flush whatever is still held back.
    pub fn finish(&mut self) -> Vec<u8> {
        let rest = std::mem::take(&mut self.carry);
        if rest.is_empty() {
            return rest;
        }
        to_utf8(&rest).into_bytes()
    }
}
