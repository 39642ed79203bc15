/*++

Licensed under the Apache-2.0 license.

File Name:

   partition.rs

Abstract:

    File contains the boot image partition descriptors.

--*/

use std::path::{Path, PathBuf};

use getset::{CopyGetters, Getters};

use crate::{OtfadError, OtfadResult, PARTITION_COUNT};

/// Boot image partition parameters as supplied by the configuration
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct PartitionParams {
    pub image_offset: Option<u64>,

    pub size: Option<u64>,

    pub image_enc_key: Option<PathBuf>,

    pub counter: Option<PathBuf>,
}

impl PartitionParams {
    /// Returns `None` for a disabled partition. Parameters are all-or-nothing.
    fn resolve(&self, slot: u8) -> OtfadResult<Option<(u64, u64, RegionKeyMaterial)>> {
        match (
            self.image_offset,
            self.size,
            &self.image_enc_key,
            &self.counter,
        ) {
            (Some(offset), Some(size), Some(enc_key), Some(counter)) => Ok(Some((
                offset,
                size,
                RegionKeyMaterial {
                    enc_key: enc_key.clone(),
                    counter: counter.clone(),
                },
            ))),
            (None, None, None, None) if slot == 1 => Err(OtfadError::MissingFirstPartition),
            (None, None, None, None) => Ok(None),
            _ => {
                let missing: Vec<&str> = [
                    ("image_offset", self.image_offset.is_none()),
                    ("size", self.size.is_none()),
                    ("image_enc_key", self.image_enc_key.is_none()),
                    ("counter", self.counter.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(OtfadError::IncompletePartition {
                    slot,
                    missing: missing.join(", "),
                })
            }
        }
    }
}

/// Image encryption key and counter files of one region
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RegionKeyMaterial {
    /// 128-bit image encryption key
    pub enc_key: PathBuf,

    /// 64-bit counter
    pub counter: PathBuf,
}

/// Where a partition's region key material comes from
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum KeySource {
    /// Enabled partition with its own key material
    Own(RegionKeyMaterial),

    /// Disabled partition. Its dummy key blob is wrapped from partition 1's
    /// key material and addresses so that every key blob has the same shape.
    BorrowedFromFirst,
}

/// Per-partition files produced in the working directory
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PartitionArtifacts {
    pub keyblob: PathBuf,

    pub enc_image: PathBuf,

    pub scrambled_key: PathBuf,
}

impl PartitionArtifacts {
    fn new(work_dir: &Path, slot: u8) -> Self {
        Self {
            keyblob: work_dir.join(format!("keyblob{slot}")),
            enc_image: work_dir.join(format!("enc_image{slot}")),
            scrambled_key: work_dir.join(format!("otfad_scrambled_key{slot}")),
        }
    }
}

/// Boot image partition
#[derive(Debug, Clone, Eq, PartialEq, Getters, CopyGetters)]
pub struct Partition {
    /// Slot number, 1 to 4
    #[getset(get_copy = "pub")]
    slot: u8,

    /// Offset of the region in the plaintext input image
    #[getset(get_copy = "pub")]
    image_offset: u64,

    /// Region size in bytes
    #[getset(get_copy = "pub")]
    size: u64,

    #[getset(get = "pub")]
    keys: KeySource,

    /// Absolute start address
    #[getset(get_copy = "pub")]
    start_addr: u64,

    /// Absolute exclusive end address, as given to the encryption engine
    #[getset(get_copy = "pub")]
    end_addr: u64,

    /// End address given to the key wrap engine
    #[getset(get_copy = "pub")]
    keyblob_end_addr: u64,

    #[getset(get = "pub")]
    artifacts: PartitionArtifacts,
}

impl Partition {
    fn new(
        slot: u8,
        region: Option<(u64, u64, RegionKeyMaterial)>,
        base_addr: u64,
        work_dir: &Path,
    ) -> Self {
        let (image_offset, size, keys) = match region {
            Some((offset, size, material)) => (offset, size, KeySource::Own(material)),
            None => (0, 0, KeySource::BorrowedFromFirst),
        };
        let start_addr = base_addr.saturating_add(image_offset);
        let end_addr = start_addr.saturating_add(size);
        Self {
            slot,
            image_offset,
            size,
            keys,
            start_addr,
            end_addr,
            keyblob_end_addr: end_addr,
            artifacts: PartitionArtifacts::new(work_dir, slot),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.keys, KeySource::Own(_))
    }

    /// Exclusive end of the region within the input image
    pub fn image_end(&self) -> u64 {
        self.image_offset.saturating_add(self.size)
    }

    /// Make the key blob range end on the last occupied address rather than
    /// one past it. Applying it twice has no further effect.
    pub fn trim_keyblob_end(&mut self) {
        self.keyblob_end_addr = self.end_addr.saturating_sub(1);
    }
}

/// The four boot image partitions, in slot order
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PartitionTable {
    partitions: [Partition; PARTITION_COUNT],
}

impl PartitionTable {
    /// Build the partition table from the per-slot configuration.
    ///
    /// # Arguments
    ///
    /// * `params` - Parameters of slots 1 to 4
    /// * `base_addr` - Flash controller base address added to every offset
    /// * `work_dir` - Directory the per-partition artifacts are written to
    pub fn new(
        params: &[PartitionParams; PARTITION_COUNT],
        base_addr: u64,
        work_dir: &Path,
    ) -> OtfadResult<Self> {
        let mut regions: [Option<(u64, u64, RegionKeyMaterial)>; PARTITION_COUNT] =
            Default::default();
        for (idx, p) in params.iter().enumerate() {
            regions[idx] = p.resolve(slot_number(idx))?;
        }

        let partitions = std::array::from_fn(|idx| {
            Partition::new(slot_number(idx), regions[idx].take(), base_addr, work_dir)
        });
        Ok(Self { partitions })
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Partition> {
        self.partitions.iter()
    }

    pub fn partitions(&self) -> &[Partition; PARTITION_COUNT] {
        &self.partitions
    }

    pub fn partitions_mut(&mut self) -> &mut [Partition; PARTITION_COUNT] {
        &mut self.partitions
    }

    pub fn first(&self) -> &Partition {
        &self.partitions[0]
    }

    pub fn get(&self, slot: u8) -> Option<&Partition> {
        usize::from(slot)
            .checked_sub(1)
            .and_then(|idx| self.partitions.get(idx))
    }

    /// Partition whose key material and addresses go into `partition`'s key blob.
    pub fn key_donor<'a>(
        &'a self,
        partition: &'a Partition,
    ) -> OtfadResult<(&'a Partition, &'a RegionKeyMaterial)> {
        let donor = match partition.keys() {
            KeySource::Own(_) => partition,
            KeySource::BorrowedFromFirst => self.first(),
        };
        match donor.keys() {
            KeySource::Own(material) => Ok((donor, material)),
            KeySource::BorrowedFromFirst => Err(OtfadError::MissingFirstPartition),
        }
    }

    pub fn enabled_count(&self) -> usize {
        self.partitions.iter().filter(|p| p.is_enabled()).count()
    }
}

fn slot_number(idx: usize) -> u8 {
    idx as u8 + 1
}
