/*++

Licensed under the Apache-2.0 license.

File Name:

   config.rs

Abstract:

    File contains utilities for parsing configuration files

--*/

use anyhow::Context;
use log::warn;
use otfad_image_engines::{default_executable, ProcessEngines, DEFAULT_TIMEOUT};
use otfad_image_gen::*;
use otfad_image_types::*;
use serde_derive::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_WORK_DIR: &str = "result";
const DEFAULT_HEADER_FILE: &str = "header";

/// Boot Image Partition Configuration
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PartitionConfig {
    pub image_offset: Option<u64>,

    pub size: Option<u64>,

    pub image_enc_key: Option<PathBuf>,

    pub counter: Option<PathBuf>,
}

/// External Engine Configuration
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EngineConfig {
    pub key_wrap: Option<PathBuf>,

    pub key_scrambler: Option<PathBuf>,

    pub encrypt_image: Option<PathBuf>,

    pub timeout_secs: Option<u64>,
}

/// OTFAD Image Configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct OtfadConfig {
    pub otfad_key: PathBuf,

    pub input_image: PathBuf,

    pub output_file: PathBuf,

    pub key_scramble: Option<PathBuf>,

    pub key_scramble_align: Option<u32>,

    pub work_dir: Option<PathBuf>,

    pub header_file: Option<PathBuf>,

    #[serde(default)]
    pub engines: EngineConfig,

    pub boot_image_part1: Option<PartitionConfig>,

    pub boot_image_part2: Option<PartitionConfig>,

    pub boot_image_part3: Option<PartitionConfig>,

    pub boot_image_part4: Option<PartitionConfig>,
}

/// Configuration with every path resolved and every input file checked
#[derive(Debug)]
pub(crate) struct RunConfig {
    pub generator: ImageGeneratorConfig,

    pub partitions: [PartitionParams; PARTITION_COUNT],

    pub work_dir: PathBuf,

    pub output_file: PathBuf,

    pub header_file: PathBuf,

    pub engines: ProcessEngines,
}

/// Load OTFAD Image Configuration from file
pub(crate) fn load_config(path: &Path) -> anyhow::Result<OtfadConfig> {
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read the config file {}", path.display()))?;

    let config: OtfadConfig = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    Ok(config)
}

/// Load the configuration file and resolve it against its own directory
pub(crate) fn load_run_config(path: &Path) -> anyhow::Result<RunConfig> {
    let config_dir = path.parent().unwrap_or(Path::new(""));
    let config = load_config(path)?;
    let run_config = config
        .resolve(config_dir)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(run_config)
}

/// Check that `path` is a non-empty regular file, optionally of an exact size.
pub(crate) fn check_input_file(path: &Path, expected: Option<u64>) -> OtfadResult<()> {
    let invalid = |reason: String| OtfadError::InvalidInputFile {
        path: path.to_path_buf(),
        reason,
    };
    let meta = std::fs::metadata(path).map_err(|e| invalid(e.to_string()))?;
    if !meta.is_file() {
        return Err(invalid("not a regular file".into()));
    }
    match expected {
        _ if meta.len() == 0 => Err(invalid("file is empty".into())),
        Some(expected) if meta.len() != expected => Err(invalid(format!(
            "file is {} bytes, expected {expected}",
            meta.len()
        ))),
        _ => Ok(()),
    }
}

/// Validate the key scramble align value; only the low byte is meaningful.
pub(crate) fn scramble_align(align: u32) -> OtfadResult<u8> {
    u8::try_from(align).map_err(|_| OtfadError::InvalidScrambleAlign(align))
}

impl PartitionConfig {
    fn resolve(&self, config_dir: &Path) -> OtfadResult<PartitionParams> {
        let params = PartitionParams {
            image_offset: self.image_offset,
            size: self.size,
            image_enc_key: self.image_enc_key.as_ref().map(|p| config_dir.join(p)),
            counter: self.counter.as_ref().map(|p| config_dir.join(p)),
        };
        if let Some(enc_key) = &params.image_enc_key {
            check_input_file(enc_key, Some(IMAGE_ENC_KEY_BYTE_SIZE as u64))?;
        }
        if let Some(counter) = &params.counter {
            check_input_file(counter, Some(COUNTER_BYTE_SIZE as u64))?;
        }
        Ok(params)
    }
}

impl EngineConfig {
    fn resolve(&self, config_dir: &Path) -> ProcessEngines {
        let exe = |path: &Option<PathBuf>, name: &str| match path {
            Some(path) => config_dir.join(path),
            None => default_executable(name),
        };
        ProcessEngines {
            key_wrap: exe(&self.key_wrap, KEY_WRAP_ENGINE),
            key_scrambler: exe(&self.key_scrambler, KEY_SCRAMBLER_ENGINE),
            encrypt_image: exe(&self.encrypt_image, ENCRYPT_IMAGE_ENGINE),
            timeout: self
                .timeout_secs
                .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
        }
    }
}

impl OtfadConfig {
    fn key_scramble(&self, config_dir: &Path) -> OtfadResult<Option<KeyScrambleConfig>> {
        match (&self.key_scramble, self.key_scramble_align) {
            (Some(seed), Some(align)) => {
                let align = scramble_align(align)?;
                let seed = config_dir.join(seed);
                check_input_file(&seed, Some(KEY_SCRAMBLE_BYTE_SIZE as u64))?;
                Ok(Some(KeyScrambleConfig { seed, align }))
            }
            (None, None) => Ok(None),
            (Some(_), None) => {
                warn!("key_scramble is set without key_scramble_align, key scrambling disabled");
                Ok(None)
            }
            (None, Some(_)) => {
                warn!("key_scramble_align is set without key_scramble, key scrambling disabled");
                Ok(None)
            }
        }
    }

    fn partitions(&self) -> [Option<&PartitionConfig>; PARTITION_COUNT] {
        [
            self.boot_image_part1.as_ref(),
            self.boot_image_part2.as_ref(),
            self.boot_image_part3.as_ref(),
            self.boot_image_part4.as_ref(),
        ]
    }

    /// Resolve relative paths against `config_dir` and check the input files.
    pub(crate) fn resolve(&self, config_dir: &Path) -> OtfadResult<RunConfig> {
        let otfad_key = config_dir.join(&self.otfad_key);
        check_input_file(&otfad_key, Some(OTFAD_KEY_BYTE_SIZE as u64))?;
        let input_image = config_dir.join(&self.input_image);
        check_input_file(&input_image, None)?;
        let key_scramble = self.key_scramble(config_dir)?;

        let mut partitions: [PartitionParams; PARTITION_COUNT] = Default::default();
        for (params, config) in partitions.iter_mut().zip(self.partitions()) {
            if let Some(config) = config {
                *params = config.resolve(config_dir)?;
            }
        }

        let work_dir = config_dir.join(
            self.work_dir
                .as_deref()
                .unwrap_or(Path::new(DEFAULT_WORK_DIR)),
        );
        Ok(RunConfig {
            generator: ImageGeneratorConfig {
                otfad_key,
                input_image,
                key_scramble,
            },
            partitions,
            output_file: work_dir.join(&self.output_file),
            work_dir,
            header_file: self
                .header_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HEADER_FILE)),
            engines: self.engines.resolve(config_dir),
        })
    }
}
