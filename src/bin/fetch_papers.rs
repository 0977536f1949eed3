//! Download the built-in catalog of reference papers into the source directory.
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use docqa::{
    config::Config,
    download::{Downloader, Selection, catalog},
    logging,
};

#[derive(Parser)]
#[command(
    name = "fetch-papers",
    about = "Download reference AI papers for indexing"
)]
struct Cli {
    /// `0` for every paper, or comma-separated 1-based positions such as `1,3`.
    #[arg(long, default_value = "0")]
    select: String,
    /// Print the catalog and exit.
    #[arg(long)]
    list: bool,
    /// Target directory; defaults to SOURCE_DIR.
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let cli = Cli::parse();
    let papers = catalog();

    if cli.list {
        for (position, paper) in papers.iter().enumerate() {
            println!("{:>2}. {} ({})", position + 1, paper.name, paper.filename);
        }
        return Ok(());
    }

    logging::init_tracing();
    let selection: Selection = cli.select.parse()?;
    let selected = selection.apply(&papers)?;

    let dir = match cli.dir {
        Some(dir) => dir,
        None => Config::from_env()
            .context("cannot resolve SOURCE_DIR; pass --dir explicitly")?
            .source_dir,
    };

    let downloader = Downloader::new(dir, Duration::from_secs(cli.timeout_secs))?;
    println!(
        "Fetching {} paper(s) into {}",
        selected.len(),
        downloader.dir().display()
    );
    let report = downloader.download_all(&selected).await;

    println!(
        "Done: {} downloaded, {} already present, {} failed",
        report.downloaded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for (filename, error) in &report.failed {
        println!("  {filename}: {error}");
    }
    if report.available() == 0 {
        bail!("no papers available in {}", downloader.dir().display());
    }
    Ok(())
}
