/*++

Licensed under the Apache-2.0 license.

File Name:

   fuse.rs

Abstract:

    File contains the fuse values an operator burns for the OTFAD key and
    key scramble configuration.

--*/

use std::fmt;
use std::path::Path;

use otfad_image_types::*;

/// Key scramble fuse words
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct KeyScrambleFuses {
    pub key_scramble: u32,

    pub align: u32,
}

/// Fuse values, in the word order the fuse programming tool expects
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FuseReport {
    otfad_key: [u32; 4],
    key_scramble: Option<KeyScrambleFuses>,
}

impl FuseReport {
    pub fn new(otfad_key: &OtfadKey, key_scramble: Option<(&KeyScrambleSeed, u8)>) -> Self {
        Self {
            otfad_key: otfad_key_words(otfad_key),
            key_scramble: key_scramble.map(|(seed, align)| KeyScrambleFuses {
                key_scramble: u32::from_be_bytes(*seed),
                align: align_word(align),
            }),
        }
    }

    /// Read the OTFAD key and optional key scramble seed from their files.
    pub fn from_files(otfad_key: &Path, key_scramble: Option<(&Path, u8)>) -> OtfadResult<Self> {
        let key: OtfadKey = read_exact_file(otfad_key)?;
        let seed = match key_scramble {
            Some((path, align)) => Some((read_exact_file::<KEY_SCRAMBLE_BYTE_SIZE>(path)?, align)),
            None => None,
        };
        Ok(Self::new(&key, seed.as_ref().map(|(s, a)| (s, *a))))
    }

    pub fn otfad_key_words(&self) -> &[u32; 4] {
        &self.otfad_key
    }

    pub fn key_scramble(&self) -> Option<&KeyScrambleFuses> {
        self.key_scramble.as_ref()
    }
}

impl fmt::Display for FuseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Burn OTFAD key as follows:")?;
        for (idx, word) in self.otfad_key.iter().enumerate() {
            writeln!(f, "OTFAD KEY[{idx}]: 0x{word:08X}")?;
        }
        if let Some(scramble) = &self.key_scramble {
            writeln!(f, "Burn Key Scramble as follows:")?;
            writeln!(f, "KEY SCRAMBLE[0]: 0x{:08X}", scramble.key_scramble)?;
            writeln!(f, "Burn Key Scramble Align as follows:")?;
            writeln!(f, "KEY SCRAMBLE ALIGN[0]: 0x{:08X}", scramble.align)?;
        }
        Ok(())
    }
}

/// Word 0 comes from the last four key bytes, each group byte reversed.
fn otfad_key_words(key: &OtfadKey) -> [u32; 4] {
    let mut words = [0u32; 4];
    for (word, chunk) in words.iter_mut().zip(key.rchunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

fn align_word(align: u8) -> u32 {
    u32::from(align) << 8
}

fn read_exact_file<const N: usize>(path: &Path) -> OtfadResult<[u8; N]> {
    let data = std::fs::read(path).map_err(|err| OtfadError::InvalidInputFile {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    data.as_slice()
        .try_into()
        .map_err(|_| OtfadError::InvalidInputFile {
            path: path.to_path_buf(),
            reason: format!("is not of size {N} bytes"),
        })
}
