use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tagdrop::collect::collect_tracks;
use tagdrop::config::Settings;
use tagdrop::organize::{ConflictPolicy, DateSource, Organizer};
use tagdrop::session::{Outcome, Session};
use tagdrop::tags;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "tagdrop",
    version,
    about = "File audio tracks into <root>/<year>/<MM-YY>/<artist>/ by their tags",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Audio files or folders, in the order they were dropped
    paths: Vec<PathBuf>,

    /// Library root (defaults to the configured root, then the current directory)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Actually move files (default is dry-run preview)
    #[arg(long)]
    execute: bool,

    /// Scan subdirectories of dropped folders
    #[arg(short, long)]
    recursive: bool,

    /// File tracks under this date instead of today
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,

    /// What to do when the destination file already exists
    #[arg(long, value_enum)]
    on_conflict: Option<ConflictPolicy>,

    /// Settings file (defaults to ~/.config/tagdrop/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the tags a file would be organized by
    Inspect {
        file: PathBuf,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn relative_to<'a>(root: &Path, path: &'a Path) -> std::borrow::Cow<'a, str> {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn resolve_root(cli_root: Option<PathBuf>, settings: &Settings, execute: bool) -> Result<PathBuf> {
    let root = match cli_root.or_else(|| settings.root.clone()) {
        Some(p) => p,
        None => std::env::current_dir()
            .context("Could not determine current directory. Please pass --root.")?,
    };

    if !root.exists() {
        if !execute {
            return Ok(root);
        }
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root: {}", root.display()))?;
    }

    let root = std::fs::canonicalize(&root)
        .with_context(|| format!("Cannot resolve path: {}", root.display()))?;
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }
    Ok(root)
}

fn inspect(file: &Path) -> Result<ExitCode> {
    let snapshot = tags::read_tags(file)
        .with_context(|| format!("Cannot read tags of {}", file.display()))?;
    println!("{}", file.display().to_string().bold());
    print!("{}", snapshot);
    Ok(ExitCode::SUCCESS)
}

fn preview(session: &Session, organizer: &Organizer) -> usize {
    let root = organizer.root();
    let mut failures = 0;

    let plans = organizer.plan_all(session.pending());
    for (path, plan) in session.pending().iter().zip(plans) {
        match plan {
            Ok(plan) => {
                let note = if plan.in_place {
                    " (already in place)"
                } else if plan.renamed {
                    " (renamed)"
                } else {
                    ""
                };
                println!(
                    "  {}  {} {}{}",
                    file_label(path).green(),
                    "->".dimmed(),
                    relative_to(root, &plan.destination),
                    note.yellow()
                );
            }
            Err(e) => {
                failures += 1;
                println!("  {}  {}", file_label(path).red().bold(), e.to_string().dimmed());
            }
        }
    }

    failures
}

fn execute(session: &mut Session, organizer: &Organizer) -> usize {
    let root = organizer.root();
    let report = session.organize_all(organizer);

    for outcome in &report.outcomes {
        match outcome {
            Outcome::Moved(placement) => {
                let note = if placement.renamed { " (renamed)" } else { "" };
                println!(
                    "  {}  {} {}{}",
                    file_label(&placement.source).green(),
                    "->".dimmed(),
                    relative_to(root, &placement.destination),
                    note.yellow()
                );
            }
            Outcome::Failed { path, error } => {
                eprintln!(
                    "  {} {}: {}",
                    "ERROR".red().bold(),
                    path.display(),
                    error
                );
            }
        }
    }

    println!();
    println!(
        "Moved {} files successfully{}",
        report.moved(),
        if report.failed() > 0 {
            format!(", {} errors", report.failed())
        } else {
            String::new()
        }
    );

    if !session.is_empty() {
        println!("\nStill pending:");
        for path in session.pending() {
            let flag = if session.is_flagged(path) { "!" } else { " " };
            println!("  {} {}", flag.red().bold(), path.display());
        }
    }

    report.failed()
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Some(Commands::Inspect { file }) = &cli.command {
        return inspect(file);
    }

    if cli.paths.is_empty() {
        bail!("No tracks given. Usage: tagdrop [OPTIONS] <PATHS>...");
    }

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    settings.validate().map_err(anyhow::Error::msg)?;

    let root = resolve_root(cli.root, &settings, cli.execute)?;
    let dates = cli.date.map(DateSource::Fixed).unwrap_or(DateSource::Today);
    let organizer = Organizer::new(&root)
        .with_dates(dates)
        .with_conflict_policy(cli.on_conflict.unwrap_or(settings.on_conflict));

    let mode = if cli.execute {
        "EXECUTING"
    } else {
        "DRY RUN (use --execute to move files)"
    };
    let version = env!("CARGO_PKG_VERSION");
    println!("tagdrop v{} -- {}\n", version, mode.bold());
    println!("Root: {}", root.display().to_string().dimmed());

    let tracks = collect_tracks(&cli.paths, cli.recursive || settings.recursive)?;
    let mut session = Session::new();
    let queued = session.extend(tracks);
    println!("Queued {} tracks\n", queued.to_string().bold());

    if session.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }

    if !cli.execute {
        let failures = preview(&session, &organizer);
        println!(
            "\nSummary: {} tracks ready, {} cannot be organized",
            session.len() - failures,
            failures
        );
        return Ok(ExitCode::SUCCESS);
    }

    let failures = execute(&mut session, &organizer);
    Ok(if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
