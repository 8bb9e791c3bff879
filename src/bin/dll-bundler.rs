extern crate dll_bundler;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use dll_bundler::{bundle, BundleQuery, ExecutableStatus, LookupPath};
use log::{error, LevelFilter};
use std::path::PathBuf;

/// Copy the DLLs a Windows executable or library depends on next to it
#[derive(Parser, Debug)]
#[command(name = "dll-bundler", version)]
struct Args {
    /// Directory to look for DLLs in; repeatable, searched in the given order
    #[arg(short = 'L', value_name = "DLL_SEARCH_PATH")]
    search_paths: Vec<PathBuf>,

    /// Only report what would be copied
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Path for output in JSON format
    #[arg(short = 'j', long, value_name = "OUTPUT_JSON_PATH")]
    output_json_path: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Target file (.exe or .dll)
    #[arg(value_name = "EXE_OR_DLL")]
    inputs: Vec<PathBuf>,
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // plain messages, unless asked for more
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();
}

fn run(args: Args, binary_path: PathBuf) -> anyhow::Result<()> {
    let mut query = BundleQuery::new(&binary_path, args.search_paths)?;
    query.parameters.dry_run = args.dry_run;

    let lookup_path = LookupPath::new(&query);
    log::debug!(
        "Looking for dependencies of {} in: {}",
        binary_path.display(),
        lookup_path
            .search_path()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let executables = bundle(&query, lookup_path)?;

    for e in &executables {
        if let ExecutableStatus::NotFound = e.status {
            log::debug!("{} => not found", e.dllname);
        }
    }

    if let Some(json_output_path) = &args.output_json_path {
        let js = serde_json::to_string_pretty(&executables).context("Error serializing")?;
        fs_err::write(json_output_path, js)
            .context(format!("couldn't write to {}", json_output_path.display()))?;
        log::debug!("successfully wrote to {}", json_output_path.display());
    }

    Ok(())
}

fn main() {
    if std::env::args_os().len() < 2 {
        let _ = Args::command().print_help();
        return;
    }

    let mut args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => std::process::exit(0),
                _ => std::process::exit(-1),
            }
        }
    };

    init_logging(args.verbose);

    if args.inputs.len() != 1 {
        error!("Please indicate the binary file.");
        std::process::exit(1);
    }

    if args.search_paths.is_empty() {
        error!("Please indicate at least one DLL search path.");
        std::process::exit(1);
    }

    let binary_path = args.inputs.remove(0);
    if let Err(e) = run(args, binary_path) {
        error!("{e:#}");
        std::process::exit(1);
    }
}
