mod rate;

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{builder::ValueParser, value_parser, Arg, ArgAction, Command};
use fsnorm_core::DEFAULT_MAX_ITEMS_PER_DIR;

pub use rate::parse_sample_rate;

pub const DEFAULT_CHUNKSIZE: &str = "1";

/// Parse a strictly positive count such as a worker or file limit.
pub fn parse_positive(value: &str) -> Result<NonZeroUsize, String> {
    value
        .trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| format!("'{value}' is not a positive integer"))
}

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Resample every audio file of a manifest to a single sampling rate")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("in_scpfile")
                .long("in-scpfile")
                .value_name("SCP")
                .help("Manifest of `<id> [<field>...] <path>` lines to normalize")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("out_scpfile")
                .long("out-scpfile")
                .value_name("SCP")
                .help("Where the `<id> <rate> <path>` manifest is written")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .value_name("OUTPUT_DIR")
                .help("Directory for resampled audio, created if missing")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("out_fs")
                .long("out-fs")
                .value_name("RATE")
                .help("Target sampling rate (e.g. 16000, 24k, 44.1kHz)")
                .required(true)
                .value_parser(ValueParser::new(parse_sample_rate)),
        )
        .arg(
            Arg::new("max_files")
                .short('m')
                .long("max-files")
                .value_name("COUNT")
                .help(format!(
                    "Maximum number of files per sub-directory [default: {DEFAULT_MAX_ITEMS_PER_DIR}]"
                ))
                .value_parser(ValueParser::new(parse_positive)),
        )
        .arg(
            Arg::new("nj")
                .short('j')
                .long("nj")
                .value_name("JOBS")
                .help("Number of parallel jobs [default: available parallelism]")
                .value_parser(ValueParser::new(parse_positive)),
        )
        .arg(
            Arg::new("chunksize")
                .long("chunksize")
                .value_name("COUNT")
                .help("Number of entries handed to a job at a time")
                .default_value(DEFAULT_CHUNKSIZE)
                .value_parser(ValueParser::new(parse_positive)),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Print where each entry would be written without processing it")
                .action(ArgAction::SetTrue),
        )
}
