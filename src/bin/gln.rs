use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use glean::core::config::Config;
use glean::core::error::Result;
use glean::core::types::hash_word;
use glean::query::grep::NameMode;
use glean::query::parser::Query;
use glean::search::searcher::Searcher;

#[derive(Parser)]
#[command(name = "gln")]
#[command(about = "Query a glean index; QUERY may join patterns with AND, OR, NOT", long_about = None)]
struct Args {
    /// Directory holding the index (`<dir>/.gln/`)
    #[arg(short = 'd', long, env = "GLN_DIR")]
    dir: Option<PathBuf>,

    /// Dump both index files as JSON lines
    #[arg(short = 'D', long)]
    dump: bool,

    /// Print the hash of each line read from stdin
    #[arg(short = 'H', long)]
    hash: bool,

    /// Print only the names of matching files
    #[arg(short = 'n', long, conflicts_with = "no_names")]
    names_only: bool,

    /// Print matching lines without file names
    #[arg(short = 'N', long)]
    no_names: bool,

    /// Let patterns match inside tokens
    #[arg(short = 's', long)]
    subtoken: bool,

    /// Print the tokens each pattern matches and stop
    #[arg(short = 't', long)]
    tokens: bool,

    /// Print the grep pipeline instead of running it
    #[arg(short = 'g', long)]
    grep_only: bool,

    /// Show clause results (-v) and debug logging (-vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Patterns and operators
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 | 1 => "warn",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn hash_lines() -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let hash = hash_word(&line);
        writeln!(out, "{} {} 0x{:04x}", line, hash, hash)?;
    }
    Ok(())
}

fn run(args: Args) -> Result<ExitCode> {
    if args.hash {
        hash_lines()?;
        return Ok(ExitCode::SUCCESS);
    }

    let index_dir = args.dir.clone().unwrap_or_else(|| Config::default().index_dir);
    let searcher = Searcher::open(&index_dir, args.subtoken)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.dump {
        searcher.dump(&mut out)?;
        return Ok(ExitCode::SUCCESS);
    }

    let query = Query::from_terms(&args.query)?;
    if args.tokens {
        for clause in searcher.matching_tokens(query)?.clauses {
            for token in clause.tokens {
                writeln!(out, "{}", token)?;
            }
        }
        return Ok(ExitCode::SUCCESS);
    }
    if args.verbose > 0 {
        let (_, lines) = searcher.explain(query.clone())?;
        for line in lines {
            writeln!(out, "{}", line)?;
        }
    }

    let result = searcher.search(query)?;
    if result.files.is_empty() {
        eprintln!("No matching files found.");
        return Ok(ExitCode::SUCCESS);
    }

    let names = if args.names_only {
        NameMode::Only
    } else if args.no_names {
        NameMode::Hide
    } else {
        NameMode::Prefix
    };
    if args.grep_only {
        for pipeline in searcher.pipelines(&result, names) {
            writeln!(out, "{}", pipeline.render())?;
        }
        return Ok(ExitCode::SUCCESS);
    }
    let cwd = std::env::current_dir()?;
    searcher.grep(&result, names, &cwd, &mut out)?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
