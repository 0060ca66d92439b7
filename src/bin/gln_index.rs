use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use glean::compression::compress::Codec;
use glean::core::config::Config;
use glean::core::error::Result;
use glean::core::types::MAX_WORKERS;
use glean::search::indexer::Indexer;

#[derive(Parser)]
#[command(name = "gln_index")]
#[command(about = "Build a glean full-text index of a directory tree", long_about = None)]
struct Args {
    /// Directory holding the index (`<dir>/.gln/`)
    #[arg(short = 'd', long, env = "GLN_DIR")]
    dir: Option<PathBuf>,

    /// Root of the tree to index
    #[arg(short = 'r', long, default_value = ".")]
    root: PathBuf,

    /// Number of tokenizer workers
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Keep token case instead of folding to lower case
    #[arg(short = 'c', long)]
    case_sensitive: bool,

    /// Compress the token vocabulary file
    #[arg(short = 'C', long)]
    compress: bool,

    /// Detect and drop stopwords
    #[arg(short = 's', long)]
    stopwords: bool,

    /// Index hidden files and directories too
    #[arg(long)]
    dotfiles: bool,

    /// Bucket compression codec
    #[arg(long, value_enum, default_value = "zstd")]
    codec: CodecArg,

    /// Ignore rules file
    #[arg(long, env = "GLN_FILTER_FILE")]
    filter_file: Option<PathBuf>,

    /// External path classifier program
    #[arg(long, env = "GLN_FILTER_CMD")]
    filter_cmd: Option<PathBuf>,

    /// Print build statistics as JSON
    #[arg(long)]
    stats: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum CodecArg {
    None,
    Lz4,
    Zstd,
    Snappy,
}

impl From<CodecArg> for Codec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::None => Codec::None,
            CodecArg::Lz4 => Codec::Lz4,
            CodecArg::Zstd => Codec::Zstd,
            CodecArg::Snappy => Codec::Snappy,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn config_from(args: &Args) -> Config {
    let mut config = Config::default();
    if let Some(dir) = &args.dir {
        config.index_dir = dir.clone();
    }
    config.root = args.root.clone();
    if let Some(workers) = args.workers {
        config.worker_count = workers.clamp(1, MAX_WORKERS);
    }
    config.case_sensitive = args.case_sensitive;
    config.compress_vocabulary = args.compress;
    config.use_stopwords = args.stopwords;
    config.index_dotfiles = args.dotfiles;
    config.codec = args.codec.into();
    config.filter_file = args.filter_file.clone();
    config.filter_command = args.filter_cmd.clone();
    config
}

fn run(args: Args) -> Result<()> {
    let indexer = Indexer::new(config_from(&args));
    let stats = indexer.build()?;
    if args.stats {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
