// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotstash::{
    config::{OsFamily, Settings, SuggestionCatalog},
    path::{expand, StoreLayout},
    store::{ManagedEntry, Store},
    sync::{backup::BackupManager, SyncOutcome, Syncer},
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use inquire::MultiSelect;
use std::{fs, path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  dotstash [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file to use instead of the default.
    #[arg(short, long, global = true, value_name = "file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let settings = load_settings(self.config)?;
        match self.command {
            Command::Add(opts) => run_add(&settings, opts),
            Command::Sync => run_sync(&settings),
            Command::Status => run_status(&settings),
            Command::Discover(opts) => run_discover(&settings, opts),
            Command::Backups(opts) => run_backups(&settings, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Move paths into the store and replace them with links.
    #[command(override_usage = "dotstash add [options] <path>...")]
    Add(AddOptions),

    /// Repair every managed entry whose link is broken or missing.
    #[command(override_usage = "dotstash sync [options]")]
    Sync,

    /// Show link state of every managed entry.
    #[command(override_usage = "dotstash status [options]")]
    Status,

    /// Find well-known configuration paths not yet under management.
    #[command(override_usage = "dotstash discover [options]")]
    Discover(DiscoverOptions),

    /// List backup snapshots recorded for one managed path.
    #[command(override_usage = "dotstash backups [options] <path>")]
    Backups(BackupsOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Paths to bring under management, `~` and `$VAR` welcome.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DiscoverOptions {
    /// Suggestion catalog file to use instead of the builtin one.
    #[arg(short = 'C', long, value_name = "file")]
    pub catalog: Option<PathBuf>,

    /// List candidates without prompting to adopt them.
    #[arg(short, long)]
    pub list_only: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BackupsOptions {
    /// Managed path to list snapshots for.
    #[arg(required = true, value_name = "path")]
    pub path: String,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_settings(config: Option<PathBuf>) -> Result<Settings> {
    let path = match config {
        Some(path) => Some(path),
        None => dirs::config_dir()
            .map(|dir| dir.join("dotstash").join("config.toml"))
            .filter(|path| path.is_file()),
    };

    match path {
        Some(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("cannot read configuration at {}", path.display()))?;
            Ok(content.parse::<Settings>()?)
        }
        None => Ok(Settings::try_default()?),
    }
}

fn open_syncer(settings: &Settings) -> Result<Syncer> {
    let layout = StoreLayout::try_new(settings.store_root.clone())?;
    let backups = BackupManager::load(settings.backup_root.clone(), settings.retention_limit)?;

    Ok(Syncer::new(layout, backups))
}

fn run_add(settings: &Settings, opts: AddOptions) -> Result<()> {
    let mut syncer = open_syncer(settings)?;

    let mut entries = Vec::new();
    for raw in &opts.paths {
        let system_path = expand(raw, syncer.layout().home())?;
        entries.push(ManagedEntry::for_system_path(syncer.layout(), system_path));
    }

    let results = syncer.sync_all(&entries);
    render_results(&results, syncer.layout());

    Ok(())
}

fn run_sync(settings: &Settings) -> Result<()> {
    let mut syncer = open_syncer(settings)?;
    let store = Store::new(syncer.layout().clone());

    let report = store.check_all(store.enumerate_managed()?);
    println!("{} entries already linked", report.correct.len());
    if report.incorrect.is_empty() {
        println!("nothing to repair");
        return Ok(());
    }

    let results = syncer.sync_all(&report.incorrect);
    render_results(&results, syncer.layout());

    Ok(())
}

fn run_status(settings: &Settings) -> Result<()> {
    let layout = StoreLayout::try_new(settings.store_root.clone())?;
    let store = Store::new(layout.clone());

    let entries = store.enumerate_managed()?;
    if entries.is_empty() {
        println!("nothing under management yet, try `dotstash add` or `dotstash discover`");
        return Ok(());
    }

    let report = store.check_all(entries);
    for entry in &report.correct {
        println!("    linked  {}", layout.display(&entry.system_path));
    }
    for entry in &report.incorrect {
        println!("    broken  {}", layout.display(&entry.system_path));
    }
    println!(
        "{} linked, {} broken",
        report.correct.len(),
        report.incorrect.len()
    );

    Ok(())
}

fn run_discover(settings: &Settings, opts: DiscoverOptions) -> Result<()> {
    let mut syncer = open_syncer(settings)?;
    let store = Store::new(syncer.layout().clone());

    let catalog = match opts.catalog {
        Some(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("cannot read catalog at {}", path.display()))?;
            content.parse::<SuggestionCatalog>()?
        }
        None => SuggestionCatalog::builtin()?,
    };
    let os_family = OsFamily::current()
        .ok_or_else(|| anyhow!("no suggestion catalog covers this platform"))?;

    let candidates = store.discover_candidates(&catalog, os_family)?;
    if candidates.is_empty() {
        println!("nothing new to adopt");
        return Ok(());
    }

    if opts.list_only {
        for candidate in &candidates {
            println!("    {candidate}");
        }
        return Ok(());
    }

    let selected = MultiSelect::new("Adopt which configuration paths?", candidates).prompt()?;
    let entries: Vec<ManagedEntry> = selected
        .into_iter()
        .map(|candidate| ManagedEntry::for_system_path(syncer.layout(), candidate.system_path))
        .collect();

    let results = syncer.sync_all(&entries);
    render_results(&results, syncer.layout());

    Ok(())
}

fn run_backups(settings: &Settings, opts: BackupsOptions) -> Result<()> {
    let syncer = open_syncer(settings)?;

    let system_path = expand(&opts.path, syncer.layout().home())?;
    let entry = ManagedEntry::for_system_path(syncer.layout(), system_path);
    let key = entry.relative_key(syncer.layout());

    let snapshots = syncer.backups().list_snapshots(&key)?;
    if snapshots.is_empty() {
        println!("no snapshots recorded for {}", syncer.layout().display(&entry.system_path));
        return Ok(());
    }

    for snapshot in &snapshots {
        println!("    {}  {}", snapshot.stamp, snapshot.content_path.display());
    }

    Ok(())
}

fn render_results(
    results: &[(&ManagedEntry, dotstash::sync::Result<SyncOutcome>)],
    layout: &StoreLayout,
) {
    for (entry, result) in results {
        let path = layout.display(&entry.system_path);
        match result {
            Ok(SyncOutcome::AlreadyLinked) => println!("    unchanged  {path}"),
            Ok(SyncOutcome::Migrated { backed_up: true }) => {
                println!("    migrated   {path} (snapshot taken)")
            }
            Ok(SyncOutcome::Migrated { backed_up: false }) => {
                println!("    migrated   {path} (snapshot skipped, one per day)")
            }
            Ok(SyncOutcome::Recreated) => println!("    recreated  {path}"),
            Err(err) => println!("    failed     {path}: {err}"),
        }
    }
}
