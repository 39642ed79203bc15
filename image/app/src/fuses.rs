/*++

Licensed under the Apache-2.0 license.

File Name:

   fuses.rs

Abstract:

    File contains implementation of the fuse report command.

--*/

use anyhow::Context;
use clap::ArgMatches;
use otfad_image_gen::FuseReport;
use std::path::PathBuf;

use crate::create::config::scramble_align;

/// Run the command
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let otfad_key: &PathBuf = args
        .get_one::<PathBuf>("otfad-key")
        .with_context(|| "otfad-key arg not specified")?;

    let key_scramble = match (
        args.get_one::<PathBuf>("key-scramble"),
        args.get_one::<u32>("key-scramble-align"),
    ) {
        (Some(seed), Some(&align)) => Some((seed.as_path(), scramble_align(align)?)),
        _ => None,
    };

    let report = FuseReport::from_files(otfad_key, key_scramble)?;
    print!("{report}");
    Ok(())
}
