/*++

Licensed under the Apache-2.0 license.

File Name:

   error.rs

Abstract:

    File contains the error type shared by the OTFAD image crates.

--*/

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type OtfadResult<T> = Result<T, OtfadError>;

/// Coarse classification of an [`OtfadError`]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    Configuration,
    Layout,
    ExternalEngine,
    Assembly,
}

#[derive(Debug, Error)]
pub enum OtfadError {
    #[error("at least boot image partition 1 parameters are required")]
    MissingFirstPartition,

    #[error("boot image partition {slot}: parameters missing: {missing}")]
    IncompletePartition { slot: u8, missing: String },

    #[error("boot image partitions must be enabled serially: partition {slot} is enabled but partition {gap} is not")]
    NonSerialPartitions { slot: u8, gap: u8 },

    #[error("key scramble align value can be max 0xFF, got {0:#x}")]
    InvalidScrambleAlign(u32),

    #[error("{}: {reason}", path.display())]
    InvalidInputFile { path: PathBuf, reason: String },

    #[error("boot image partition {slot}: image offset {offset:#x} overlaps partition {prev_slot} which ends at {prev_end:#x}")]
    PartitionOverlap {
        slot: u8,
        prev_slot: u8,
        prev_end: u64,
        offset: u64,
    },

    #[error("boot image partition {slot}: image offset + size ({end:#x}) exceeds input image length ({image_len:#x})")]
    PartitionExceedsImage { slot: u8, end: u64, image_len: u64 },

    #[error("boot image partition {slot}: address {addr:#x} is outside the 32-bit OTFAD address space")]
    AddressOutOfRange { slot: u8, addr: u64 },

    #[error("{engine}: failed to launch {}: {source}", exe.display())]
    EngineLaunch {
        engine: &'static str,
        exe: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{engine}: exited with status {code:?}\n{stderr}")]
    EngineFailed {
        engine: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{engine}: no result after {timeout:?}, process killed")]
    EngineTimeout {
        engine: &'static str,
        timeout: Duration,
    },

    #[error("{engine}: {} is {actual} bytes, expected {expected}", path.display())]
    EngineOutput {
        engine: &'static str,
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("{engine}: {}: {source}", path.display())]
    EngineIo {
        engine: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("combined key blobs are {0} bytes, the key blob window is {1} bytes")]
    KeyBlobsTooLarge(usize, usize),

    #[error("assembled image is {0} bytes, too short to hold the key blob window")]
    ImageTooShort(u64),

    #[error("{step} {}: {source}", path.display())]
    Io {
        step: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OtfadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingFirstPartition
            | Self::IncompletePartition { .. }
            | Self::NonSerialPartitions { .. }
            | Self::InvalidScrambleAlign(_)
            | Self::InvalidInputFile { .. } => ErrorKind::Configuration,
            Self::PartitionOverlap { .. }
            | Self::PartitionExceedsImage { .. }
            | Self::AddressOutOfRange { .. } => ErrorKind::Layout,
            Self::EngineLaunch { .. }
            | Self::EngineFailed { .. }
            | Self::EngineTimeout { .. }
            | Self::EngineOutput { .. }
            | Self::EngineIo { .. } => ErrorKind::ExternalEngine,
            Self::KeyBlobsTooLarge(..) | Self::ImageTooShort(_) | Self::Io { .. } => {
                ErrorKind::Assembly
            }
        }
    }

    /// Attach a path and the step being performed to an I/O error.
    pub fn io(step: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            step,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(
            OtfadError::MissingFirstPartition.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            OtfadError::NonSerialPartitions { slot: 3, gap: 2 }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            OtfadError::PartitionExceedsImage {
                slot: 1,
                end: 0x2000,
                image_len: 0x1000
            }
            .kind(),
            ErrorKind::Layout
        );
        assert_eq!(
            OtfadError::EngineTimeout {
                engine: "key_wrap",
                timeout: Duration::from_secs(1)
            }
            .kind(),
            ErrorKind::ExternalEngine
        );
        assert_eq!(OtfadError::ImageTooShort(12).kind(), ErrorKind::Assembly);
    }

    #[test]
    fn test_message_names_slot() {
        let err = OtfadError::PartitionOverlap {
            slot: 2,
            prev_slot: 1,
            prev_end: 0x3000,
            offset: 0x2000,
        };
        assert_eq!(
            err.to_string(),
            "boot image partition 2: image offset 0x2000 overlaps partition 1 which ends at 0x3000"
        );
    }
}
