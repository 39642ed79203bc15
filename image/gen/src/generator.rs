/*++

Licensed under the Apache-2.0 license.

File Name:

   generator.rs

Abstract:

    OTFAD key blob and encrypted region generator

--*/

use std::path::{Path, PathBuf};

use log::{info, warn};
use otfad_image_types::*;

use crate::*;

/// Image generator
pub struct ImageGenerator<W, S, E> {
    wrapper: W,
    scrambler: S,
    encryptor: E,
}

impl<W, S, E> ImageGenerator<W, S, E>
where
    W: KeyWrapper,
    S: KeyScrambler,
    E: Encryptor,
{
    /// Create an instance `ImageGenerator`
    pub fn new(wrapper: W, scrambler: S, encryptor: E) -> Self {
        Self {
            wrapper,
            scrambler,
            encryptor,
        }
    }

    /// Generate the key blob and encrypted region of every partition
    ///
    /// # Arguments
    ///
    /// * `config` - Image generator configuration
    /// * `layout` - Validated partition layout
    ///
    /// Every slot, enabled or not, ends up with a key blob and an encrypted
    /// image artifact at the paths in its [`PartitionArtifacts`].
    pub fn generate(
        &self,
        config: &ImageGeneratorConfig,
        layout: &ValidatedLayout,
    ) -> OtfadResult<()> {
        let table = layout.table();
        for partition in table.iter() {
            let kek = self.wrapping_key(config, partition)?;
            self.gen_keyblob(table, &kek, partition)?;
            self.gen_enc_image(config, partition)?;
        }
        Ok(())
    }

    /// OTFAD key used to wrap `partition`'s key blob
    fn wrapping_key(
        &self,
        config: &ImageGeneratorConfig,
        partition: &Partition,
    ) -> OtfadResult<PathBuf> {
        let Some(scramble) = &config.key_scramble else {
            return Ok(config.otfad_key.clone());
        };

        info!(
            "Generating OTFAD scrambled key for partition {}",
            partition.slot()
        );
        let output = &partition.artifacts().scrambled_key;
        self.scrambler.scramble(&KeyScrambleRequest {
            otfad_key: &config.otfad_key,
            key_scramble: &scramble.seed,
            align: scramble.align,
            context: partition.slot() - 1,
            output,
        })?;
        expect_len(KEY_SCRAMBLER_ENGINE, output, OTFAD_KEY_BYTE_SIZE as u64)?;
        Ok(output.clone())
    }

    fn gen_keyblob(
        &self,
        table: &PartitionTable,
        kek: &Path,
        partition: &Partition,
    ) -> OtfadResult<()> {
        let (donor, material) = table.key_donor(partition)?;
        if partition.is_enabled() {
            info!(
                "Generating wrapped image encryption key for partition {}",
                partition.slot()
            );
        } else {
            warn!(
                "Generating dummy wrapped image encryption key for partition {}",
                partition.slot()
            );
        }

        let output = &partition.artifacts().keyblob;
        self.wrapper.wrap(&KeyWrapRequest {
            kek,
            enc_key: &material.enc_key,
            counter: &material.counter,
            start_addr: donor.start_addr(),
            end_addr: donor.keyblob_end_addr(),
            valid: partition.is_enabled(),
            output,
        })?;
        expect_len(KEY_WRAP_ENGINE, output, KEY_BLOB_BYTE_SIZE as u64)
    }

    fn gen_enc_image(
        &self,
        config: &ImageGeneratorConfig,
        partition: &Partition,
    ) -> OtfadResult<()> {
        let output = &partition.artifacts().enc_image;
        match partition.keys() {
            KeySource::Own(material) => {
                info!(
                    "Generating encrypted image for partition {}",
                    partition.slot()
                );
                self.encryptor.encrypt(&EncryptRequest {
                    input_image: &config.input_image,
                    enc_key: &material.enc_key,
                    counter: &material.counter,
                    start_addr: partition.start_addr(),
                    end_addr: partition.end_addr(),
                    output,
                })?;
                expect_len(ENCRYPT_IMAGE_ENGINE, output, partition.size())
            }
            KeySource::BorrowedFromFirst => {
                warn!(
                    "Generating dummy encrypted image for partition {}",
                    partition.slot()
                );
                std::fs::File::create(output)
                    .map(drop)
                    .map_err(|err| OtfadError::io("creating dummy encrypted image", output, err))
            }
        }
    }
}

fn expect_len(engine: &'static str, path: &Path, expected: u64) -> OtfadResult<()> {
    let actual = std::fs::metadata(path)
        .map_err(|source| OtfadError::EngineIo {
            engine,
            path: path.to_path_buf(),
            source,
        })?
        .len();
    if actual != expected {
        return Err(OtfadError::EngineOutput {
            engine,
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}
