mod cli;

use crate::cli::{CliArgs, Commands};
use chrono::Local;
use log::{LevelFilter, error, info};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use vsadapt::indexer::SystemRunner;
use vsadapt::indexer::info::{IndexFileInfo, IndexHeader};
use vsadapt::{Indexer, Result};

fn main() -> ExitCode {
    let start_time = Instant::now();

    let args = cli::parse_args();

    if let Err(e) = setup_logging(&args) {
        eprintln!("Error setting up logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Arguments: {:?}", args);

    match run(args) {
        Ok(()) => {
            info!("Done in {:.2?}", start_time.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed after {:.2?}: {}", start_time.elapsed(), e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up logging to stderr and optionally to a file.
fn setup_logging(args: &CliArgs) -> std::result::Result<(), fern::InitError> {
    let crate_level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut logger = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Info)
        .level_for("vsadapt", crate_level)
        .chain(std::io::stderr());

    let mut log_path = None;
    if args.log {
        let dir = args.log_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = dir.join(format!("vsadapt_{}.log", Local::now().format("%Y%m%d_%H%M%S")));
        logger = logger.chain(fern::log_file(&path)?);
        log_path = Some(path);
    }

    logger.apply()?;
    if let Some(path) = log_path {
        info!("Logging to file: {}", path.display());
    }
    Ok(())
}

fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Commands::Index { files, indexer, bin, output, no_force, extra } => {
            let indexer = Indexer::new(indexer);
            let mut config = indexer.config().clone().with_force(!no_force);
            if let Some(bin) = bin {
                config = config.with_bin_path(bin);
            }
            let indexer = indexer.with_config(config);

            let output = output.unwrap_or_else(|| indexer.derive_index_path(&files[0]));
            indexer.run_index(&SystemRunner, &files, &output, &extra)?;

            let parsed = indexer.parse_index_info(&output, -1)?;
            println!("Wrote {} ({} referenced files)", output.display(), parsed.videos.len());
        }
        Commands::Info { index, file_idx, json, indexer } => {
            let indexer = match indexer {
                Some(kind) => Indexer::new(kind),
                None => Indexer::for_index_path(&index)?,
            };
            let indexer = indexer.clone().with_config(indexer.config().clone().with_force(false));
            let parsed = indexer.parse_index_info(&index, file_idx)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&parsed)?);
            } else {
                print_summary(&parsed);
            }
        }
        Commands::Relink { index, paths } => {
            Indexer::for_index_path(&index)?.rewrite_referenced_paths(&index, &paths)?;
            println!("Updated {}", index.display());
        }
    }
    Ok(())
}

fn print_summary(info: &IndexFileInfo) {
    println!("Index: {}", info.path.display());
    for (i, video) in info.videos.iter().enumerate() {
        match video.size {
            Some(size) => println!("  [{}] {} ({} bytes)", i, video.path.display(), size),
            None => println!("  [{}] {}", i, video.path.display()),
        }
    }
    match &info.header {
        IndexHeader::D2v(header) => {
            if let Some((w, h)) = header.picture_size {
                println!("Picture size: {}x{}", w, h);
            }
            print_rate(header.frame_rate);
        }
        IndexHeader::Dgi(header) => {
            if let Some(tool) = &header.tool {
                println!("Written by: {}", tool);
            }
            print_rate(header.fps);
            if let Some(film) = header.film_percentage {
                println!("FILM: {:.2}%", film);
            }
        }
    }
    if let Some(frames) = info.frame_count() {
        println!("Frames: {}", frames);
    }
    println!("Data rows for file {}: {}", info.file_idx, info.frames.len());
}

fn print_rate(rate: Option<(u64, u64)>) {
    if let Some((num, den)) = rate.filter(|&(_, den)| den != 0) {
        println!("Frame rate: {}/{} ({:.3} fps)", num, den, num as f64 / den as f64);
    }
}
