/*++

Licensed under the Apache-2.0 license.

File Name:

   mod.rs

Abstract:

    File contains implementation of the OTFAD image create command.

--*/

pub(crate) mod config;

use anyhow::Context;
use clap::ArgMatches;
use log::{debug, info};
use otfad_image_exec::fs;
use otfad_image_gen::layout;
use otfad_image_gen::*;
use otfad_image_serde::assemble;
use otfad_image_types::*;
use std::path::{Path, PathBuf};

use config::RunConfig;

/// Load the configuration and validate the partition layout against the
/// input image.
pub(crate) fn load_layout(path: &Path) -> anyhow::Result<(RunConfig, ValidatedLayout)> {
    let run_config = config::load_run_config(path)?;
    let image_len = fs::file_len(&run_config.generator.input_image)?;
    let table = PartitionTable::new(
        &run_config.partitions,
        QSPI_BASE_ADDR,
        &run_config.work_dir,
    )?;
    let layout = layout::validate(table, image_len)?;
    Ok((run_config, layout))
}

/// Run the command
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let config_path: &PathBuf = args
        .get_one::<PathBuf>("config")
        .with_context(|| "config arg not specified")?;

    let (run_config, layout) = load_layout(config_path)?;
    info!(
        "{} boot image partition(s) configured",
        layout.table().enabled_count()
    );

    fs::recreate_dir(&run_config.work_dir)?;

    let engines = &run_config.engines;
    let gen = ImageGenerator::new(engines, engines, engines);
    gen.generate(&run_config.generator, &layout)?;

    let image = assemble(
        &run_config.header_file,
        &run_config.work_dir,
        layout.table(),
        &run_config.output_file,
    )?;
    debug!(
        "Key blobs {}, image length {:#x}",
        image.keyblobs.display(),
        image.len
    );

    let report = FuseReport::from_files(
        &run_config.generator.otfad_key,
        run_config
            .generator
            .key_scramble
            .as_ref()
            .map(|s| (s.seed.as_path(), s.align)),
    )?;
    print!("{report}");

    Ok(())
}
