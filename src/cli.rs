// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vsadapt::IndexerKind;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable logging to file (e.g., vsadapt_YYYYMMDD_HHMMSS.log)
    #[arg(long, global = true)]
    pub log: bool,

    /// Directory for the log file (default: current directory)
    #[arg(long, value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Debug-level logs for this crate
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index video files with an external indexer
    Index {
        /// Video files, in playback order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = IndexerKind::D2vWitch)]
        indexer: IndexerKind,

        /// Indexer binary (default: looked up on PATH)
        #[arg(long, value_name = "PATH", env = "VSADAPT_INDEXER_BIN")]
        bin: Option<PathBuf>,

        /// Index file to write (default: first file with the index extension)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Fail on corrupted index files instead of deleting them
        #[arg(long)]
        no_force: bool,

        /// Extra arguments passed to the indexer after `--`
        #[arg(last = true)]
        extra: Vec<String>,
    },
    /// Print the contents of an index file
    Info {
        index: PathBuf,

        /// Referenced file whose data rows are listed; negative lists none
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        file_idx: i64,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,

        /// Index format (default: from the file extension)
        #[arg(long, value_enum)]
        indexer: Option<IndexerKind>,
    },
    /// Point an index at moved video files
    Relink {
        index: PathBuf,

        /// New paths, one per referenced file, in order
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
