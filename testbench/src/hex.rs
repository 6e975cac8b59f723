//! Hex memory images.
//!
//! One 32-bit word per line, four whitespace-separated two-digit bytes, least
//! significant byte first:
//!
//! ```text
//! 93 00 20 00
//! 13 01 10 00
//! ```

use std::fmt;

use camino::Utf8Path;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use tracing::debug;

use crate::error::{HarnessError, Result};

const BYTES_PER_LINE: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Skip lines that do not hold exactly four tokens.
    #[default]
    Permissive,
    /// Reject them.
    Strict,
}

/// Byte image of an instruction memory preload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HexImage {
    bytes: Vec<u8>,
}

impl HexImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn parse(text: &str, mode: ParseMode) -> Result<Self> {
        let mut bytes = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != BYTES_PER_LINE {
                if mode == ParseMode::Strict && !tokens.is_empty() {
                    return Err(HarnessError::Format {
                        line: idx + 1,
                        message: format!(
                            "expected {BYTES_PER_LINE} bytes, found {} tokens",
                            tokens.len()
                        ),
                    });
                }
                continue;
            }
            for token in tokens {
                bytes.push(parse_byte(token).ok_or_else(|| HarnessError::Format {
                    line: idx + 1,
                    message: format!("`{token}` is not a hex byte"),
                })?);
            }
        }
        Ok(Self { bytes })
    }

    pub fn load(path: &Utf8Path, mode: ParseMode) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::io(format!("Failed to read hex image {path}"), e))?;
        let image = Self::parse(&text, mode)?;
        debug!(%path, bytes = image.len(), "loaded hex image");
        Ok(image)
    }

    /// `words` pseudo-random words, reproducible from `seed`.
    pub fn random(words: usize, seed: u64) -> Self {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let bytes = (0..words * BYTES_PER_LINE).map(|_| rng.r#gen()).collect();
        Self { bytes }
    }

    pub fn write(&self, path: &Utf8Path) -> Result<()> {
        std::fs::write(path, self.to_string())
            .map_err(|e| HarnessError::io(format!("Failed to write hex image {path}"), e))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Little-endian words; a trailing partial word is zero-padded.
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.bytes.chunks(BYTES_PER_LINE).map(|chunk| {
            let mut word = [0; BYTES_PER_LINE];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(word)
        })
    }
}

impl fmt::Display for HexImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.bytes.chunks(BYTES_PER_LINE) {
            let line: Vec<String> = chunk.iter().map(|byte| format!("{byte:02x}")).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

fn parse_byte(token: &str) -> Option<u8> {
    if token.is_empty() || token.len() > 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(token, 16).ok()
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn parses_words_in_file_order() {
        let image = HexImage::parse("12 34 56 78\n93 00 20 00\n", ParseMode::Strict).unwrap();
        assert_eq!(image.words().collect::<Vec<_>>(), vec![0x7856_3412, 0x0020_0093]);
    }

    #[test]
    fn permissive_mode_skips_short_lines() {
        let image = HexImage::parse("\n12 34\n// comment\naa bb cc dd\n", ParseMode::Permissive).unwrap();
        assert_eq!(image.bytes(), &[0xaa, 0xbb, 0xcc, 0xdd]);
    }

    #[test]
    fn strict_mode_reports_line_number() {
        let err = HexImage::parse("aa bb cc dd\n\n12 34\n", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, HarnessError::Format { line: 3, .. }));
    }

    #[test]
    fn non_hex_byte_is_a_format_error() {
        for mode in [ParseMode::Permissive, ParseMode::Strict] {
            let err = HexImage::parse("00 11 22 33\n00 1g 22 33\n", mode).unwrap_err();
            assert!(matches!(err, HarnessError::Format { line: 2, .. }));
        }
        assert!(HexImage::parse("+1 00 00 00", ParseMode::Permissive).is_err());
        assert!(HexImage::parse("100 00 00 00", ParseMode::Permissive).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.hex")).unwrap();
        assert!(matches!(
            HexImage::load(&path, ParseMode::Permissive),
            Err(HarnessError::Io { .. })
        ));
    }

    #[test]
    fn written_image_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("image.hex")).unwrap();
        let image = HexImage::random(16, 42);
        image.write(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 16);
        assert_eq!(HexImage::load(&path, ParseMode::Strict).unwrap(), image);
    }

    #[test]
    fn random_images_are_seeded() {
        assert_eq!(HexImage::random(8, 1), HexImage::random(8, 1));
        assert_ne!(HexImage::random(8, 1), HexImage::random(8, 2));
        assert_eq!(HexImage::random(8, 1).len(), 32);
    }

    #[test]
    fn display_uses_lowercase_bytes() {
        let image = HexImage::from_bytes(vec![0xab, 0x01, 0xff, 0x10, 0x7]);
        assert_eq!(image.to_string(), "ab 01 ff 10\n07\n");
    }
}
