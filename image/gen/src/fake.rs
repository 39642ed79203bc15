/*++

Licensed under the Apache-2.0 license.

File Name:

   fake.rs

Abstract:

    Deterministic in-process stand-ins for the key wrap, key scrambler and
    image encryption engines. The output has the right shape but is not
    cryptographically meaningful.

--*/

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use otfad_image_types::*;

use crate::*;

/// Engine invocation recorded by [`FakeEngines`]
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FakeCall {
    Scramble {
        context: u8,
        align: u8,
        output: PathBuf,
    },
    Wrap {
        kek: PathBuf,
        enc_key: PathBuf,
        start_addr: u64,
        end_addr: u64,
        valid: bool,
        output: PathBuf,
    },
    Encrypt {
        start_addr: u64,
        end_addr: u64,
        output: PathBuf,
    },
}

#[derive(Debug, Default)]
pub struct FakeEngines {
    /// Where the encryption engine drops the boot header
    header: Option<PathBuf>,
    fail_engine: Option<&'static str>,
    calls: RefCell<Vec<FakeCall>>,
}

impl FakeEngines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the first [`BOOT_HEADER_BYTE_SIZE`] bytes of the input image to
    /// `path` on every encryption.
    pub fn with_header(mut self, path: impl Into<PathBuf>) -> Self {
        self.header = Some(path.into());
        self
    }

    /// Make every call to `engine` fail with exit status 1.
    pub fn failing(mut self, engine: &'static str) -> Self {
        self.fail_engine = Some(engine);
        self
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.borrow().clone()
    }

    fn check(&self, engine: &'static str) -> OtfadResult<()> {
        if self.fail_engine == Some(engine) {
            return Err(OtfadError::EngineFailed {
                engine,
                code: Some(1),
                stderr: String::from("injected failure"),
            });
        }
        Ok(())
    }
}

fn read(engine: &'static str, path: &Path) -> OtfadResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| OtfadError::EngineIo {
        engine,
        path: path.to_path_buf(),
        source,
    })
}

fn write(engine: &'static str, path: &Path, data: &[u8]) -> OtfadResult<()> {
    std::fs::write(path, data).map_err(|source| OtfadError::EngineIo {
        engine,
        path: path.to_path_buf(),
        source,
    })
}

fn xor_cycle(data: &mut [u8], key: &[u8]) {
    if key.is_empty() {
        return;
    }
    for (b, k) in data.iter_mut().zip(key.iter().cycle()) {
        *b ^= k;
    }
}

impl KeyScrambler for FakeEngines {
    fn scramble(&self, req: &KeyScrambleRequest) -> OtfadResult<()> {
        self.check(KEY_SCRAMBLER_ENGINE)?;
        let mut key = read(KEY_SCRAMBLER_ENGINE, req.otfad_key)?;
        let seed = read(KEY_SCRAMBLER_ENGINE, req.key_scramble)?;
        xor_cycle(&mut key, &seed);
        for b in key.iter_mut() {
            *b = b.rotate_left(u32::from(req.context)) ^ req.align;
        }
        write(KEY_SCRAMBLER_ENGINE, req.output, &key)?;
        self.calls.borrow_mut().push(FakeCall::Scramble {
            context: req.context,
            align: req.align,
            output: req.output.to_path_buf(),
        });
        Ok(())
    }
}

impl KeyWrapper for FakeEngines {
    fn wrap(&self, req: &KeyWrapRequest) -> OtfadResult<()> {
        self.check(KEY_WRAP_ENGINE)?;
        let kek = read(KEY_WRAP_ENGINE, req.kek)?;
        let mut key = read(KEY_WRAP_ENGINE, req.enc_key)?;
        let counter = read(KEY_WRAP_ENGINE, req.counter)?;
        xor_cycle(&mut key, &kek);

        let end_word = (req.end_addr as u32 & 0xFFFF_FFF8) | u32::from(req.valid);
        let mut blob = Vec::with_capacity(KEY_BLOB_BYTE_SIZE);
        blob.extend_from_slice(&key);
        blob.extend_from_slice(&counter);
        blob.extend_from_slice(&(req.start_addr as u32).to_le_bytes());
        blob.extend_from_slice(&end_word.to_le_bytes());
        blob.resize(KEY_BLOB_BYTE_SIZE, 0);
        write(KEY_WRAP_ENGINE, req.output, &blob)?;

        self.calls.borrow_mut().push(FakeCall::Wrap {
            kek: req.kek.to_path_buf(),
            enc_key: req.enc_key.to_path_buf(),
            start_addr: req.start_addr,
            end_addr: req.end_addr,
            valid: req.valid,
            output: req.output.to_path_buf(),
        });
        Ok(())
    }
}

impl Encryptor for FakeEngines {
    fn encrypt(&self, req: &EncryptRequest) -> OtfadResult<()> {
        self.check(ENCRYPT_IMAGE_ENGINE)?;
        let image = read(ENCRYPT_IMAGE_ENGINE, req.input_image)?;
        let key = read(ENCRYPT_IMAGE_ENGINE, req.enc_key)?;

        let start = req.start_addr.saturating_sub(QSPI_BASE_ADDR) as usize;
        let end = req.end_addr.saturating_sub(QSPI_BASE_ADDR) as usize;
        let Some(region) = image.get(start..end) else {
            return Err(OtfadError::EngineFailed {
                engine: ENCRYPT_IMAGE_ENGINE,
                code: Some(1),
                stderr: format!("region {start:#x}..{end:#x} outside input image"),
            });
        };
        let mut region = region.to_vec();
        xor_cycle(&mut region, &key);
        write(ENCRYPT_IMAGE_ENGINE, req.output, &region)?;

        if let Some(header) = &self.header {
            let len = image.len().min(BOOT_HEADER_BYTE_SIZE);
            write(ENCRYPT_IMAGE_ENGINE, header, &image[..len])?;
        }

        self.calls.borrow_mut().push(FakeCall::Encrypt {
            start_addr: req.start_addr,
            end_addr: req.end_addr,
            output: req.output.to_path_buf(),
        });
        Ok(())
    }
}
