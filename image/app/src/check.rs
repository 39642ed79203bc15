/*++

Licensed under the Apache-2.0 license.

File Name:

   check.rs

Abstract:

    File contains implementation of the layout check command.

--*/

use anyhow::Context;
use clap::ArgMatches;
use otfad_image_types::Partition;
use std::path::PathBuf;

use crate::create::load_layout;

fn describe(partition: &Partition) -> String {
    if !partition.is_enabled() {
        return format!("Partition {}: disabled", partition.slot());
    }
    format!(
        "Partition {}: offset {:#x} size {:#x} start {:#x} end {:#x} keyblob end {:#x}",
        partition.slot(),
        partition.image_offset(),
        partition.size(),
        partition.start_addr(),
        partition.end_addr(),
        partition.keyblob_end_addr()
    )
}

/// Run the command
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let config_path: &PathBuf = args
        .get_one::<PathBuf>("config")
        .with_context(|| "config arg not specified")?;

    let (_, layout) = load_layout(config_path)?;
    println!("Input image length: {:#x}", layout.image_len());
    for partition in layout.table().iter() {
        println!("{}", describe(partition));
    }
    Ok(())
}
