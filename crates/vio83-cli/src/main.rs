//! run_harvest
//!
//! The harvest surface of the VIO83 knowledge engine: bulk metadata
//! harvesting from the open scholarly APIs, local filesystem scanning,
//! status reporting and resume. The first SIGINT requests a clean stop at
//! the next batch boundary; the second aborts.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use vio83_core::cancel;
use vio83_core::distill::DistillStore;
use vio83_core::harvest::{
    CrossrefAdapter, HarvestProgress, HarvestStateDb, HarvestStatus, Harvester, LocalScanner,
    OpenAlexAdapter, SourceAdapter, WikipediaAdapter,
};

mod logfile;

/// SIGINT exit code.
const EXIT_INTERRUPTED: i32 = 130;

/// VIO83 harvest runner
#[derive(Parser)]
#[command(name = "run_harvest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Harvest open knowledge sources into the distilled store")]
#[command(
    long_about = "Harvests document metadata from OpenAlex, Crossref and Wikipedia into the \
                  five-level distilled store, with resumable cursors and polite rate limiting.\n\
                  First Ctrl-C requests a clean stop, second aborts."
)]
struct Cli {
    /// Data directory (defaults to ./data, or VIO83_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest metadata from the open APIs
    Harvest {
        /// How many records to fetch
        #[arg(long)]
        target: u64,
        /// Source: openalex, crossref, wikipedia, or all
        #[arg(long, default_value = "openalex")]
        source: String,
        /// Ignore saved progress and start over
        #[arg(long)]
        fresh: bool,
    },

    /// Scan a local directory tree into the store
    Local {
        /// Directory to scan (defaults to the home directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Harvest all sources, then scan the local tree
    All {
        /// Per-source fetch target
        #[arg(long, default_value = "10000")]
        target: u64,
        /// Directory to scan
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Print a one-block summary of every source and the store
    Status,

    /// Continue every interrupted harvest from its stored cursor
    Resume,
}

fn main() {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| {
        std::env::var("VIO83_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"))
    });

    logfile::init_logging(&data_dir);
    install_signal_handler();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{} {e}", "failed to start runtime:".red());
            std::process::exit(1);
        }
    };

    let outcome = runtime.block_on(run(cli, data_dir.clone()));

    match outcome {
        Ok(()) if cancel::is_cancelled() => {
            println!("{}", "Stopped on request; progress saved.".yellow());
            std::process::exit(EXIT_INTERRUPTED);
        }
        Ok(()) => {}
        Err(e) => {
            let log_hint = data_dir.join("logs").display().to_string();
            eprintln!("{} {e:#}", "error:".red().bold());
            eprintln!("see the latest log under {log_hint}");
            std::process::exit(1);
        }
    }
}

/// First delivery requests a clean stop, second aborts the process.
fn install_signal_handler() {
    let result = ctrlc::set_handler(|| {
        let requests = cancel::request_stop();
        if requests == 1 {
            eprintln!(
                "\n{}",
                "Stop requested; finishing the current batch (Ctrl-C again to abort)".yellow()
            );
        } else {
            eprintln!("\n{}", "Aborting.".red());
            std::process::exit(EXIT_INTERRUPTED);
        }
    });
    if let Err(e) = result {
        tracing::warn!("could not install SIGINT handler: {e}");
    }
}

async fn run(cli: Cli, data_dir: PathBuf) -> anyhow::Result<()> {
    let store = Arc::new(DistillStore::open(Some(data_dir.clone())).context("opening store")?);
    let state = HarvestStateDb::open(&data_dir).context("opening harvest state")?;

    match cli.command {
        Commands::Harvest {
            target,
            source,
            fresh,
        } => {
            let harvester = Harvester::new(Arc::clone(&store), state);
            run_harvest_sources(&harvester, &source, target, !fresh).await
        }
        Commands::Local { path } => run_local(store, state, path),
        Commands::All { target, path } => {
            let harvester = Harvester::new(Arc::clone(&store), state.clone());
            run_harvest_sources(&harvester, "all", target, true).await?;
            if cancel::is_cancelled() {
                return Ok(());
            }
            run_local(store, state, path)
        }
        Commands::Status => run_status(&store, &state),
        Commands::Resume => run_resume(store, state).await,
    }
}

fn mailto() -> String {
    std::env::var("VIO83_MAILTO").unwrap_or_else(|_| "archivist@vio83.org".to_string())
}

fn make_adapter(source: &str) -> anyhow::Result<Box<dyn SourceAdapter>> {
    let mailto = mailto();
    let adapter: Box<dyn SourceAdapter> = match source {
        "openalex" => Box::new(OpenAlexAdapter::new(&mailto)?),
        "crossref" => Box::new(CrossrefAdapter::new(&mailto)?),
        "wikipedia" => Box::new(WikipediaAdapter::new("en", &mailto)?),
        other => anyhow::bail!("unknown source '{other}' (openalex|crossref|wikipedia|all)"),
    };
    Ok(adapter)
}

async fn run_harvest_sources(
    harvester: &Harvester,
    source: &str,
    target: u64,
    resume: bool,
) -> anyhow::Result<()> {
    let sources: Vec<&str> = if source == "all" {
        vec!["openalex", "crossref", "wikipedia"]
    } else {
        vec![source]
    };

    for name in sources {
        if cancel::is_cancelled() {
            break;
        }
        let adapter = make_adapter(name)?;
        println!(
            "{} {} (target {})",
            "Harvesting".green().bold(),
            name.cyan(),
            target
        );
        let progress = harvester.harvest(adapter.as_ref(), target, resume).await?;
        print_progress_line(&progress);
    }
    Ok(())
}

fn run_local(
    store: Arc<DistillStore>,
    state: HarvestStateDb,
    path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let base = match path {
        Some(p) => p,
        None => std::env::var("HOME")
            .map(PathBuf::from)
            .context("no --path given and HOME is unset")?,
    };

    println!("{} {}", "Scanning".green().bold(), base.display());
    let scanner = LocalScanner::new(store, state);
    let scan = scanner.scan(&base, true)?;
    println!(
        "  {} files seen, {} indexed, {:.1} MB",
        scan.files_scanned,
        scan.files_indexed,
        scan.bytes_original as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}

async fn run_resume(store: Arc<DistillStore>, state: HarvestStateDb) -> anyhow::Result<()> {
    let interrupted: Vec<HarvestProgress> = state
        .all_progress()?
        .into_iter()
        .filter(|p| matches!(p.status, HarvestStatus::Running | HarvestStatus::Paused))
        .collect();

    if interrupted.is_empty() {
        println!("{}", "Nothing to resume.".green());
        return Ok(());
    }

    let harvester = Harvester::new(store, state);
    for progress in interrupted {
        if cancel::is_cancelled() {
            break;
        }
        println!(
            "{} {} ({} / {} fetched)",
            "Resuming".green().bold(),
            progress.source.cyan(),
            progress.total_fetched,
            progress.target
        );
        let source = base_source_name(&progress.source);
        let adapter = make_adapter(source)?;
        let finished = harvester
            .harvest(adapter.as_ref(), progress.target, true)
            .await?;
        print_progress_line(&finished);
    }
    Ok(())
}

/// `wikipedia_it` resumes through the wikipedia adapter family.
fn base_source_name(source: &str) -> &str {
    if source.starts_with("wikipedia") {
        "wikipedia"
    } else {
        source
    }
}

fn run_status(store: &DistillStore, state: &HarvestStateDb) -> anyhow::Result<()> {
    println!("{}", "=== VIO83 Harvest Status ===".cyan().bold());

    let rows = state.all_progress()?;
    if rows.is_empty() {
        println!("  no harvests recorded yet");
    }
    for progress in &rows {
        print_progress_line(progress);
        if let Some(error) = &progress.last_error {
            println!("    {} {}", "last error:".red(), error);
        }
    }

    let stats = store.stats()?;
    println!("{}", "=== Distilled Store ===".cyan().bold());
    println!(
        "  L1 {}  L2 {}  L3 {}  L4 {}  L5 {}",
        stats.l1_count, stats.l2_count, stats.l3_count, stats.l4_count, stats.l5_count
    );
    println!(
        "  database size: {:.1} MB",
        stats.db_size_bytes as f64 / (1024.0 * 1024.0)
    );
    for (origin, count) in stats.by_origin.iter().take(8) {
        println!("  {:>10} from {}", count, origin.cyan());
    }

    let events = state.recent_events(5)?;
    if !events.is_empty() {
        println!("{}", "=== Recent Events ===".cyan().bold());
        for event in events {
            println!(
                "  {} [{}] {} - {}",
                event.at.format("%Y-%m-%d %H:%M:%S"),
                event.source,
                event.event_type,
                event.message
            );
        }
    }
    Ok(())
}

fn print_progress_line(progress: &HarvestProgress) {
    let status = match progress.status {
        HarvestStatus::Completed => "completed".green(),
        HarvestStatus::Running => "running".cyan(),
        HarvestStatus::Paused => "paused".yellow(),
        HarvestStatus::Error => "error".red(),
        HarvestStatus::Idle => "idle".normal(),
    };
    let eta = progress
        .eta_seconds()
        .map(|s| format!(", eta {s}s"))
        .unwrap_or_default();
    println!(
        "  {:<14} {:<10} {:>8} fetched  {:>8} inserted  {:.0}/s{}",
        progress.source,
        status,
        progress.total_fetched,
        progress.total_inserted,
        progress.speed(),
        eta
    );
}
