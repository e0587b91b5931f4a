use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use cdi_extract::dyuv::{DyuvOptions, DyuvSeed, DyuvSize};
use cdi_extract::extract::{self, ExtractMode};
use cdi_extract::volume::VolumeReader;
use clap::{Parser, Subcommand};

/// Supported still-image sizes for `extract-dyuv` / `extract-all`.
const SUPPORTED_DYUV_SIZES: [(u32, u32); 3] = [(384, 280), (384, 240), (360, 240)];

#[derive(Parser)]
#[command(name = "cdi-extract", about = "Extract files and media from a CD-i track image")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,

    /// Path to the input track image.
    input_path: PathBuf,

    /// Destination directory; defaults to the input file's parent directory.
    output_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print all files and directories in the track image.
    #[command(alias = "p")]
    Print,
    /// Copy files and directories (MPEG streams are not files).
    #[command(alias = "x")]
    ExtractFiles,
    /// Copy real-time MPEG streams.
    #[command(alias = "m")]
    ExtractMpegs,
    /// Decode DYUV-coded still images to PNG.
    #[command(alias = "d")]
    ExtractDyuv {
        #[arg(long, value_parser = parse_size)]
        dyuv_size: Option<(u32, u32)>,
        #[arg(long, value_parser = parse_triplet)]
        dyuv_init: Option<(u8, u8, u8)>,
        #[arg(long)]
        dyuv_no_interpolation: bool,
    },
    /// Copy everything (same as extract-files + extract-mpegs).
    #[command(alias = "a")]
    ExtractAll {
        #[arg(long, value_parser = parse_size)]
        dyuv_size: Option<(u32, u32)>,
        #[arg(long, value_parser = parse_triplet)]
        dyuv_init: Option<(u8, u8, u8)>,
        #[arg(long)]
        dyuv_no_interpolation: bool,
    },
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s.split_once(':').ok_or_else(|| "expected WIDTH:HEIGHT".to_string())?;
    let w: u32 = w.parse().map_err(|_| "invalid width".to_string())?;
    let h: u32 = h.parse().map_err(|_| "invalid height".to_string())?;
    if !SUPPORTED_DYUV_SIZES.contains(&(w, h)) {
        return Err(format!(
            "unsupported DYUV size {w}:{h}; supported sizes are {SUPPORTED_DYUV_SIZES:?}"
        ));
    }
    Ok((w, h))
}

fn parse_triplet(s: &str) -> Result<(u8, u8, u8), String> {
    let mut parts = s.split(':');
    let (Some(a), Some(b), Some(c), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err("expected Y:U:V".to_string());
    };
    let parse_one = |p: &str| p.parse::<u8>().map_err(|_| "invalid component".to_string());
    Ok((parse_one(a)?, parse_one(b)?, parse_one(c)?))
}

fn dyuv_options(
    dyuv_size: Option<(u32, u32)>,
    dyuv_init: Option<(u8, u8, u8)>,
    no_interpolation: bool,
) -> DyuvOptions {
    let (width, height) = dyuv_size.unwrap_or(SUPPORTED_DYUV_SIZES[0]);
    let seed = dyuv_init
        .map(|(y, u, v)| DyuvSeed { y, u, v })
        .unwrap_or_default();
    DyuvOptions {
        size: DyuvSize { width, height },
        seed,
        interpolate: !no_interpolation,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let output_path = cli.output_path.clone().unwrap_or_else(|| {
        cli.input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let file = File::open(&cli.input_path)
        .with_context(|| format!("failed to open track image: {}", cli.input_path.display()))?;
    let mut volume = VolumeReader::open(file)
        .with_context(|| format!("failed to parse volume: {}", cli.input_path.display()))?;

    match cli.command {
        Command::Print => {
            let mut count = 0usize;
            extract::run(
                &mut volume,
                &output_path,
                &ExtractMode::List,
                Some(&mut |path: &str| {
                    println!("{path}");
                    count += 1;
                    true
                }),
            )?;
            tracing::info!(files = count, "listed track image");
        }
        Command::ExtractFiles => {
            let stats = extract::run(&mut volume, &output_path, &ExtractMode::CopyFiles, None)?;
            tracing::info!(written = stats.files_written, errors = stats.errors, "extracted files");
        }
        Command::ExtractMpegs => {
            let stats = extract::run(&mut volume, &output_path, &ExtractMode::ExtractMpeg, None)?;
            tracing::info!(written = stats.files_written, errors = stats.errors, "extracted mpeg streams");
        }
        Command::ExtractDyuv {
            dyuv_size,
            dyuv_init,
            dyuv_no_interpolation,
        } => {
            let opts = dyuv_options(dyuv_size, dyuv_init, dyuv_no_interpolation);
            let stats = extract::run(
                &mut volume,
                &output_path,
                &ExtractMode::ExtractDyuv(opts),
                None,
            )?;
            tracing::info!(written = stats.files_written, errors = stats.errors, "decoded dyuv stills");
        }
        Command::ExtractAll {
            dyuv_size,
            dyuv_init,
            dyuv_no_interpolation,
        } => {
            let files = extract::run(&mut volume, &output_path, &ExtractMode::CopyFiles, None)?;
            let mpeg = extract::run(&mut volume, &output_path, &ExtractMode::ExtractMpeg, None)?;
            let opts = dyuv_options(dyuv_size, dyuv_init, dyuv_no_interpolation);
            let dyuv = extract::run(
                &mut volume,
                &output_path,
                &ExtractMode::ExtractDyuv(opts),
                None,
            )?;
            tracing::info!(
                files = files.files_written,
                mpeg = mpeg.files_written,
                dyuv = dyuv.files_written,
                "extracted everything"
            );
            if files.errors + mpeg.errors + dyuv.errors > 0 {
                bail!("one or more items failed to extract; see warnings above");
            }
        }
    }

    Ok(())
}
