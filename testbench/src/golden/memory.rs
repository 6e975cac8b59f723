use camino::Utf8Path;

use crate::error::{HarnessError, Result};
use crate::hex::{HexImage, ParseMode};

/// Result of one instruction fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fetch {
    pub word: u32,
    pub exception: bool,
}

/// Byte-addressed instruction store preloaded from a hex image.
#[derive(Clone, Debug)]
pub struct GoldenAddressableMemory {
    bytes: Vec<u8>,
}

impl GoldenAddressableMemory {
    pub fn new(image: &HexImage, size: usize) -> Result<Self> {
        if size == 0 || size % 4 != 0 {
            return Err(HarnessError::Configuration(format!(
                "memory size must be a non-zero multiple of 4, got {size}"
            )));
        }
        if image.len() > size {
            return Err(HarnessError::Configuration(format!(
                "image of {} bytes does not fit in {size} bytes of memory",
                image.len()
            )));
        }
        let mut bytes = vec![0; size];
        bytes[..image.len()].copy_from_slice(image.bytes());
        Ok(Self { bytes })
    }

    pub fn from_hex_file(path: &Utf8Path, size: usize) -> Result<Self> {
        Self::new(&HexImage::load(path, ParseMode::Permissive)?, size)
    }

    pub fn from_hex_str(text: &str, size: usize) -> Result<Self> {
        Self::new(&HexImage::parse(text, ParseMode::Permissive)?, size)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn fetch(&self, addr: u32) -> Fetch {
        let byte = |offset: u32| {
            addr.checked_add(offset)
                .and_then(|addr| self.bytes.get(addr as usize))
                .copied()
                .unwrap_or(0)
        };
        Fetch {
            word: u32::from_le_bytes([byte(0), byte(1), byte(2), byte(3)]),
            exception: addr % 4 != 0,
        }
    }
}
