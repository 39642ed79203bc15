/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains data structures for the OTFAD Image Generator.

--*/

pub mod fake;
mod fuse;
mod generator;
pub mod layout;

pub use fuse::{FuseReport, KeyScrambleFuses};
pub use generator::ImageGenerator;
pub use layout::ValidatedLayout;

use otfad_image_types::*;
use std::path::{Path, PathBuf};

pub const KEY_WRAP_ENGINE: &str = "key_wrap";
pub const KEY_SCRAMBLER_ENGINE: &str = "key_scrambler";
pub const ENCRYPT_IMAGE_ENGINE: &str = "encrypt_image";

/// Key wrap request
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct KeyWrapRequest<'a> {
    /// OTFAD key, or the scrambled OTFAD key of this context
    pub kek: &'a Path,

    /// Image encryption key to wrap
    pub enc_key: &'a Path,

    pub counter: &'a Path,

    pub start_addr: u64,

    pub end_addr: u64,

    /// Mark the context valid. Cleared for dummy key blobs.
    pub valid: bool,

    pub output: &'a Path,
}

/// Key scramble request
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct KeyScrambleRequest<'a> {
    pub otfad_key: &'a Path,

    pub key_scramble: &'a Path,

    pub align: u8,

    /// OTFAD context, slot number - 1
    pub context: u8,

    pub output: &'a Path,
}

/// Region encryption request
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EncryptRequest<'a> {
    pub input_image: &'a Path,

    pub enc_key: &'a Path,

    pub counter: &'a Path,

    pub start_addr: u64,

    pub end_addr: u64,

    pub output: &'a Path,
}

/// Wraps a region key, counter and address range into a key blob
pub trait KeyWrapper {
    fn wrap(&self, req: &KeyWrapRequest) -> OtfadResult<()>;
}

/// Derives a per-context scrambled OTFAD key
pub trait KeyScrambler {
    fn scramble(&self, req: &KeyScrambleRequest) -> OtfadResult<()>;
}

/// AES-CTR encrypts one region of the input image
pub trait Encryptor {
    fn encrypt(&self, req: &EncryptRequest) -> OtfadResult<()>;
}

impl<T: KeyWrapper + ?Sized> KeyWrapper for &T {
    fn wrap(&self, req: &KeyWrapRequest) -> OtfadResult<()> {
        (**self).wrap(req)
    }
}

impl<T: KeyScrambler + ?Sized> KeyScrambler for &T {
    fn scramble(&self, req: &KeyScrambleRequest) -> OtfadResult<()> {
        (**self).scramble(req)
    }
}

impl<T: Encryptor + ?Sized> Encryptor for &T {
    fn encrypt(&self, req: &EncryptRequest) -> OtfadResult<()> {
        (**self).encrypt(req)
    }
}

/// Key scramble parameters
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct KeyScrambleConfig {
    /// 32-bit key scramble seed
    pub seed: PathBuf,

    pub align: u8,
}

/// Image Generator Configuration
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImageGeneratorConfig {
    pub otfad_key: PathBuf,

    /// Plaintext input image
    pub input_image: PathBuf,

    /// Present only when both the seed and the align value are configured
    pub key_scramble: Option<KeyScrambleConfig>,
}
