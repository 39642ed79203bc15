/*++

Licensed under the Apache-2.0 license.

File Name:

   main.rs

Abstract:

    Main entry point OTFAD Imaging application

--*/
use std::path::PathBuf;

use clap::{arg, value_parser, Arg, ArgMatches, Command};
use log::LevelFilter;
use simple_logger::SimpleLogger;

mod check;
mod create;
mod fuses;

fn config_arg() -> Arg {
    arg!(--"config" <FILE> "OTFAD image configuration file")
        .required(true)
        .value_parser(value_parser!(PathBuf))
}

fn verbose(cmd: &ArgMatches) -> bool {
    cmd.get_flag("verbose")
        || cmd
            .subcommand()
            .is_some_and(|(_, args)| args.get_flag("verbose"))
}

/// Entry point
fn main() {
    let sub_cmds = vec![
        Command::new("create")
            .about("Create an OTFAD encrypted boot image")
            .arg(config_arg()),
        Command::new("check")
            .about("Validate the boot image partition layout without generating anything")
            .arg(config_arg()),
        Command::new("fuses")
            .about("Print the OTFAD key and key scramble fuse values")
            .arg(
                arg!(--"otfad-key" <FILE> "OTFAD key file (128-bit)")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"key-scramble" <FILE> "Key scramble file (32-bit)")
                    .required(false)
                    .requires("key-scramble-align")
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"key-scramble-align" <U32> "Key scramble align value, max 0xFF")
                    .required(false)
                    .requires("key-scramble")
                    .value_parser(value_parser!(u32)),
            ),
    ];

    let cmd = Command::new("otfad-image-app")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .arg(arg!(-v --verbose "Enable debug logging").global(true))
        .subcommands(sub_cmds)
        .about("OTFAD encrypted boot imaging tools")
        .get_matches();

    let level = if verbose(&cmd) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = SimpleLogger::new()
        .with_level(level)
        .without_timestamps()
        .init();

    let result = match cmd.subcommand() {
        Some(("create", args)) => create::run_cmd(args),
        Some(("check", args)) => check::run_cmd(args),
        Some(("fuses", args)) => fuses::run_cmd(args),
        _ => unreachable!(),
    };

    result.unwrap_or_else(|e| {
        log::error!("Error: {e:#}");
        std::process::exit(1);
    });
}
