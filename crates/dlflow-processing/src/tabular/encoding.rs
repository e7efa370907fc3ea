//! Text encoding detection for delimited files.
//!
//! Only the encodings the pipeline can actually decode are reported:
//! UTF-8 (with or without BOM), ASCII, UTF-16 (BOM-marked) and ISO-8859-1 as
//! the fallback for arbitrary 8-bit text.

/// Bytes inspected when guessing the encoding.
pub const DETECTION_WINDOW: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Ascii,
    Utf8,
    Utf8Sig,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Ascii => "ascii",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Latin1 => "iso-8859-1",
        }
    }

    /// Whether the content can be fed to the CSV reader without transcoding.
    pub fn is_utf8_compatible(&self) -> bool {
        matches!(
            self,
            TextEncoding::Ascii | TextEncoding::Utf8 | TextEncoding::Utf8Sig
        )
    }

    /// Length of the byte-order mark this encoding starts with.
    pub fn bom_len(&self) -> usize {
        match self {
            TextEncoding::Utf8Sig => 3,
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => 2,
            _ => 0,
        }
    }

    /// Decode a whole buffer (BOM included) into UTF-8 text.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let body = &bytes[self.bom_len().min(bytes.len())..];
        match self {
            TextEncoding::Ascii | TextEncoding::Utf8 | TextEncoding::Utf8Sig => {
                String::from_utf8_lossy(body).into_owned()
            }
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                let units: Vec<u16> = body
                    .chunks_exact(2)
                    .map(|pair| {
                        if *self == TextEncoding::Utf16Le {
                            u16::from_le_bytes([pair[0], pair[1]])
                        } else {
                            u16::from_be_bytes([pair[0], pair[1]])
                        }
                    })
                    .collect();
                String::from_utf16_lossy(&units)
            }
            TextEncoding::Latin1 => body.iter().map(|&b| b as char).collect(),
        }
    }
}

/// Guess the encoding of `sample` (the first bytes of a file) with a confidence in `0..=1`.
pub fn detect(sample: &[u8]) -> (TextEncoding, f64) {
    if sample.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return (TextEncoding::Utf8Sig, 1.0);
    }
    if sample.starts_with(&[0xFF, 0xFE]) {
        return (TextEncoding::Utf16Le, 1.0);
    }
    if sample.starts_with(&[0xFE, 0xFF]) {
        return (TextEncoding::Utf16Be, 1.0);
    }
    if sample.is_ascii() {
        return (TextEncoding::Ascii, 1.0);
    }
    match std::str::from_utf8(sample) {
        Ok(_) => (TextEncoding::Utf8, 0.99),
        // A multi-byte sequence cut by the detection window is still UTF-8.
        Err(e) if e.error_len().is_none() => (TextEncoding::Utf8, 0.99),
        Err(_) => (TextEncoding::Latin1, 0.73),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_boms() {
        assert_eq!(detect(b"\xEF\xBB\xBFa,b").0, TextEncoding::Utf8Sig);
        assert_eq!(detect(b"\xFF\xFEa\x00").0, TextEncoding::Utf16Le);
    }

    #[test]
    fn detects_plain_text() {
        assert_eq!(detect(b"a,b\n1,2\n").0, TextEncoding::Ascii);
        assert_eq!(detect("ville,température\n".as_bytes()).0, TextEncoding::Utf8);
        assert_eq!(detect(b"ville,temp\xE9rature\n").0, TextEncoding::Latin1);
    }

    #[test]
    fn truncated_multibyte_sequence_is_still_utf8() {
        let text = "é".as_bytes();
        assert_eq!(detect(&[b'a', text[0]]).0, TextEncoding::Utf8);
    }

    #[test]
    fn decodes_latin1_and_utf16() {
        assert_eq!(TextEncoding::Latin1.decode(b"caf\xE9"), "café");
        assert_eq!(TextEncoding::Utf16Le.decode(b"\xFF\xFEa\x00,\x00b\x00"), "a,b");
        assert_eq!(TextEncoding::Utf8Sig.decode(b"\xEF\xBB\xBFx"), "x");
    }
}
