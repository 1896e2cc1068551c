//! tubstore: inspect and maintain tub record stores
//!
//! Usage:
//!   tubstore ls    data/                          # list tubs and record counts
//!   tubstore check data/tub_3_24-05-01 --fix      # find (and delete) corrupt records
//!   tubstore tar   data/tub_3_24-05-01 out.tar.gz # export a tub
//!   tubstore group data/tub_0,data/tub_1          # summary of several tubs
//!   tubstore split data/tub_0,data/tub_1 --config tubstore.toml

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tubstore::config::Config;
use tubstore::storage::archive::TarOptions;
use tubstore::{Tub, TubGroup, TubHandler};

#[derive(Parser)]
#[command(name = "tubstore", about = "Tub record store maintenance", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the tubs under a root directory.
    Ls {
        /// Directory holding tub_<n>_<date> directories.
        root: PathBuf,
    },
    /// Load every record of a tub and report the ones that fail.
    Check {
        tub: PathBuf,
        /// Delete corrupt records.
        #[arg(long)]
        fix: bool,
    },
    /// Write a gzip tar of a tub's metadata and records.
    Tar {
        tub: PathBuf,
        output: PathBuf,
        /// Also bundle image files.
        #[arg(long)]
        include_images: bool,
    },
    /// Summarise a comma-separated list of tubs.
    Group {
        tubs: String,
    },
    /// Show the train/validation split of a comma-separated list of tubs.
    Split {
        tubs: String,
        /// Path to the TOML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ls { root } => run_ls(root),
        Command::Check { tub, fix } => run_check(tub, fix),
        Command::Tar { tub, output, include_images } => run_tar(tub, output, include_images),
        Command::Group { tubs } => run_group(&tubs),
        Command::Split { tubs, config } => run_split(&tubs, config),
    };

    if let Err(e) = result {
        error!(error = %format!("{e:#}"), "Command failed");
        std::process::exit(1);
    }
}

fn run_ls(root: PathBuf) -> anyhow::Result<()> {
    let handler = TubHandler::new(&root)?;
    let tubs = handler.get_tub_list()?;
    println!("=== Tubs in {} ===", root.display());
    for path in &tubs {
        let tub = Tub::open(path).with_context(|| format!("open {}", path.display()))?;
        println!(
            "  {:<32} records: {:>7}  next ix: {}",
            path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            tub.get_num_records(),
            tub.current_ix()
        );
    }
    println!("Next tub number: {}", handler.next_tub_number()?);
    Ok(())
}

fn run_check(path: PathBuf, fix: bool) -> anyhow::Result<()> {
    let mut tub = Tub::open(&path).with_context(|| format!("open {}", path.display()))?;
    let report = tub.check(fix)?;
    println!("Scanned : {}", report.scanned);
    println!("Corrupt : {}", report.corrupt.len());
    for ix in &report.corrupt {
        println!("  record {ix}{}", if fix { " (deleted)" } else { "" });
    }
    println!("Readable: {}", report.readable());
    Ok(())
}

fn run_tar(path: PathBuf, output: PathBuf, include_images: bool) -> anyhow::Result<()> {
    let tub = Tub::open(&path).with_context(|| format!("open {}", path.display()))?;
    let options = TarOptions { include_images, ..Default::default() };
    let entries = tub
        .tar_records_with(&output, &options)
        .with_context(|| format!("write {}", output.display()))?;
    info!(entries, output = ?output, "Tub archived");
    Ok(())
}

fn run_group(list: &str) -> anyhow::Result<()> {
    let group = TubGroup::from_list(list)?;
    println!("Tubs    : {}", group.get_num_tubs());
    println!("Records : {}", group.get_num_records());
    println!("Fields  :");
    for (input, type_name) in group.schema().fields() {
        println!("  {input} ({type_name})");
    }
    Ok(())
}

fn run_split(list: &str, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };
    let group = TubGroup::from_list(list)?;
    let inputs: Vec<&str> = group.inputs().iter().map(String::as_str).collect();
    let (train, val) = group.get_train_val_gen(&inputs, &[], &config.training)?;
    println!("Batch size : {}", config.training.batch_size);
    println!("Train frac : {}", config.training.train_frac);
    println!("Seed       : {}", config.training.seed);
    println!("Train      : {} records", train.num_records());
    println!("Validation : {} records", val.num_records());
    Ok(())
}
