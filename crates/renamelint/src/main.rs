//! Validator for rename lists: rejects malformed lines, self-renames, and
//! rename cycles. Exit status is 0 when every file is valid, 1 otherwise.

use {
    clap::Parser,
    kconfix::renames::RenameMap,
    std::{path::PathBuf, process::ExitCode},
};

/// Command line options.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Options {
    /// Rename files to validate.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Print a summary per file.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let options = Options::parse();

    let mut failed = false;

    for path in &options.files {
        match RenameMap::load(path) {
            Ok(map) => {
                if options.verbose {
                    eprintln!("{}: OK ({} renames)", path.display(), map.pairs().count());
                }
            }
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
