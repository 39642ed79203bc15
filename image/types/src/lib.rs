/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains data structures and constants for the OTFAD encrypted
    boot image.

--*/

mod error;
mod partition;

pub use error::{ErrorKind, OtfadError, OtfadResult};
pub use partition::{
    KeySource, Partition, PartitionArtifacts, PartitionParams, PartitionTable, RegionKeyMaterial,
};

/// Number of OTFAD contexts, one per boot image partition
pub const PARTITION_COUNT: usize = 4;

/// QSPI flash controller base address
pub const QSPI_BASE_ADDR: u64 = 0xC000_0000;

/// Highest absolute address the OTFAD region descriptors can express
pub const MAX_ABSOLUTE_ADDR: u64 = u32::MAX as u64;

pub const OTFAD_KEY_BYTE_SIZE: usize = 16;
pub const IMAGE_ENC_KEY_BYTE_SIZE: usize = 16;
pub const COUNTER_BYTE_SIZE: usize = 8;
pub const KEY_SCRAMBLE_BYTE_SIZE: usize = 4;

/// Wrapped key (48 bytes) padded to 0x40
pub const KEY_BLOB_BYTE_SIZE: usize = 64;

/// Window at the start of the image overwritten by the concatenated key blobs
pub const KEY_BLOB_REGION_BYTE_SIZE: usize = KEY_BLOB_BYTE_SIZE * PARTITION_COUNT;

/// Boot header copied out of the input image by the encryption engine
pub const BOOT_HEADER_BYTE_SIZE: usize = 4096;

pub type OtfadKey = [u8; OTFAD_KEY_BYTE_SIZE];
pub type KeyScrambleSeed = [u8; KEY_SCRAMBLE_BYTE_SIZE];
