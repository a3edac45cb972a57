/// cxxd-index-chunk: the short-lived indexing child.
///
/// Receives one chunk of the project's sources, indexes them into a private
/// store and exits. Run as a separate OS process so the parent and every
/// sibling hold their own parser instance.
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "cxxd-index-chunk")]
#[command(about = "Index one chunk of a project's sources into a private symbol store", long_about = None)]
struct Cli {
    /// Project root the indexed paths are stored relative to
    #[arg(long)]
    project_root: PathBuf,

    /// Compiler flags file (JSON compilation database or plain .txt)
    #[arg(long)]
    compiler_flags: PathBuf,

    /// File with one source path per line
    #[arg(long)]
    input_list: PathBuf,

    /// Private store to write occurrences into
    #[arg(long)]
    output_db: PathBuf,

    /// Dedicated log file for this child
    #[arg(long)]
    log_file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cxxd::logging::init(&cli.log_file);
    info!(
        "Indexing chunk '{}' into '{}'",
        cli.input_list.display(),
        cli.output_db.display()
    );
    cxxd::services::source_code_model::indexer::index_file_list(
        &cli.project_root,
        &cli.input_list,
        &cli.compiler_flags,
        &cli.output_db,
    )
}
