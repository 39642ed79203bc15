/*++

Licensed under the Apache-2.0 license.

File Name:

   layout.rs

Abstract:

    File contains the boot image partition layout checks.

--*/

use otfad_image_types::*;

/// Partition table that passed every layout check, with key blob end
/// addresses adjusted for back-to-back partitions.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ValidatedLayout {
    table: PartitionTable,
    image_len: u64,
}

impl ValidatedLayout {
    pub fn table(&self) -> &PartitionTable {
        &self.table
    }

    /// Length of the plaintext input image the layout was checked against
    pub fn image_len(&self) -> u64 {
        self.image_len
    }
}

/// Validate the partition table against an input image of `image_len` bytes.
///
/// Checks run in order and the first failure is returned: serial
/// enablement, overlap between adjacent partitions, input image bounds,
/// then the 32-bit address space.
pub fn validate(mut table: PartitionTable, image_len: u64) -> OtfadResult<ValidatedLayout> {
    let enabled: [bool; PARTITION_COUNT] =
        std::array::from_fn(|idx| table.partitions()[idx].is_enabled());
    check_serial_enablement(&enabled)?;
    check_overlap(&table)?;
    check_image_bounds(&table, image_len)?;
    check_address_range(&table)?;
    adjust_boundaries(&mut table);
    Ok(ValidatedLayout { table, image_len })
}

/// Enabled partitions must be a prefix of slots 1..4 containing slot 1.
pub fn check_serial_enablement(enabled: &[bool; PARTITION_COUNT]) -> OtfadResult<()> {
    if !enabled[0] {
        return Err(OtfadError::MissingFirstPartition);
    }
    let mut gap = None;
    for (idx, &en) in enabled.iter().enumerate() {
        let slot = idx as u8 + 1;
        match (en, gap) {
            (false, None) => gap = Some(slot),
            (true, Some(gap)) => return Err(OtfadError::NonSerialPartitions { slot, gap }),
            _ => {}
        }
    }
    Ok(())
}

fn check_overlap(table: &PartitionTable) -> OtfadResult<()> {
    for pair in table.partitions().windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.is_enabled() && prev.image_end() > next.image_offset() {
            return Err(OtfadError::PartitionOverlap {
                slot: next.slot(),
                prev_slot: prev.slot(),
                prev_end: prev.image_end(),
                offset: next.image_offset(),
            });
        }
    }
    Ok(())
}

fn check_image_bounds(table: &PartitionTable, image_len: u64) -> OtfadResult<()> {
    // Highest failing slot is reported
    for p in table.iter().rev().filter(|p| p.is_enabled()) {
        if p.image_end() > image_len {
            return Err(OtfadError::PartitionExceedsImage {
                slot: p.slot(),
                end: p.image_end(),
                image_len,
            });
        }
    }
    Ok(())
}

/// The encryption engine takes the exclusive end address as a 32-bit value,
/// so a region may not reach the last byte of the address space.
fn check_address_range(table: &PartitionTable) -> OtfadResult<()> {
    for p in table.iter().filter(|p| p.is_enabled()) {
        if p.end_addr() > MAX_ABSOLUTE_ADDR {
            return Err(OtfadError::AddressOutOfRange {
                slot: p.slot(),
                addr: p.end_addr(),
            });
        }
    }
    Ok(())
}

/// The key wrap engine takes the last address of a region. When a region
/// ends exactly where the next enabled one starts, its key blob end is
/// pulled back by one byte so the two ranges do not meet.
fn adjust_boundaries(table: &mut PartitionTable) {
    let partitions = table.partitions_mut();
    for idx in 1..partitions.len() {
        let back_to_back = {
            let next = &partitions[idx];
            next.is_enabled() && partitions[idx - 1].image_end() == next.image_offset()
        };
        if back_to_back {
            partitions[idx - 1].trim_keyblob_end();
        }
    }
}
