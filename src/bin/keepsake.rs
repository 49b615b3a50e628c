//! # Keepsake CLI - Continuous folder backups
//!
//! Command-line frontend for the Keepsake engine.
//!
//! ## Usage
//! ```bash
//! # Point Keepsake at a backup folder
//! keepsake set-root /backups
//!
//! # Watch a folder (recursively, with filters)
//! keepsake add ~/documents --include "*.txt, *.md" --exclude "~*"
//!
//! # Rebuild the version index from the store
//! keepsake scan
//!
//! # List versions, optionally filtered by keywords
//! keepsake list report 2024
//!
//! # Run the watchers until Enter is pressed
//! keepsake watch
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use keepsake::codec::TIMESTAMP_FORMAT;
use keepsake::{BackupEngine, KeepsakeError, Result, SettingsStore, WatchedFolder};
use std::path::PathBuf;

/// Keepsake CLI - watch folders and version every change
#[derive(Parser)]
#[command(name = "keepsake")]
#[command(version)]
#[command(about = "Continuous folder backups with timestamped versions")]
#[command(long_about = None)]
struct Cli {
    /// Settings file (defaults to keepsake.json in the current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the folder that holds all versions
    SetRoot {
        /// Backup store location
        path: PathBuf,
    },

    /// Add a folder to the watch list
    Add {
        /// Folder to watch
        path: PathBuf,

        /// Watch only the folder itself, not its subfolders
        #[arg(long)]
        flat: bool,

        /// Include filters, comma separated (empty means everything)
        #[arg(short, long, default_value = "")]
        include: String,

        /// Exclude filters, comma separated
        #[arg(short, long, default_value = "")]
        exclude: String,
    },

    /// Rebuild the version index from the backup store
    Scan,

    /// List versioned files, filtered by keywords
    #[command(alias = "ls")]
    List {
        /// Keywords the original path must contain
        query: Vec<String>,
    },

    /// Show today's backups
    History,

    /// Watch the configured folders until Enter is pressed
    Watch,

    /// Delete versions of a file
    #[command(alias = "rm")]
    Delete {
        /// Original file the versions belong to
        file: PathBuf,

        /// Version timestamp (as shown by `list`); omit with --all
        timestamp: Option<String>,

        /// Delete every version of the file
        #[arg(long)]
        all: bool,
    },

    /// Open the diff tool on two versions of a file
    Diff {
        /// Original file the versions belong to
        file: PathBuf,

        /// First version timestamp
        first: String,

        /// Second version timestamp
        second: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli
        .config
        .unwrap_or_else(|| PathBuf::from("keepsake.json"));
    let store = SettingsStore::load(config);

    match cli.command {
        Commands::SetRoot { path } => cmd_set_root(&store, path),
        Commands::Add {
            path,
            flat,
            include,
            exclude,
        } => cmd_add(&store, path, flat, include, exclude),
        Commands::Scan => cmd_scan(&store),
        Commands::List { query } => cmd_list(&store, query.join(" ")),
        Commands::History => cmd_history(&store),
        Commands::Watch => cmd_watch(&store),
        Commands::Delete {
            file,
            timestamp,
            all,
        } => cmd_delete(&store, file, timestamp, all),
        Commands::Diff {
            file,
            first,
            second,
        } => cmd_diff(&store, file, first, second),
    }
}

fn cmd_set_root(store: &SettingsStore, path: PathBuf) -> Result<()> {
    store.settings().write().backup_root = Some(path.clone());
    store.save()?;
    println!(
        "{} Backup store set to {}",
        "✓".green().bold(),
        path.display().to_string().cyan()
    );
    Ok(())
}

fn cmd_add(
    store: &SettingsStore,
    path: PathBuf,
    flat: bool,
    include: String,
    exclude: String,
) -> Result<()> {
    {
        let settings = store.settings();
        let mut settings = settings.write();
        if settings.watched.iter().any(|f| f.path == path) {
            return Err(KeepsakeError::config(format!(
                "{} is already watched",
                path.display()
            )));
        }
        settings.watched.push(WatchedFolder {
            path: path.clone(),
            include_subfolders: !flat,
            include_filters: include,
            exclude_filters: exclude,
        });
    }
    store.save()?;
    println!(
        "{} Watching {}{}",
        "✓".green().bold(),
        path.display().to_string().cyan(),
        if flat { " (no subfolders)" } else { "" }
    );
    Ok(())
}

fn cmd_scan(store: &SettingsStore) -> Result<()> {
    let engine = BackupEngine::new(store.settings());
    println!("{}", "Scanning backup store...".blue().bold());
    let versions = engine.scan_backup_folder()?;
    println!(
        "{} Indexed {} version(s) across {} file(s)",
        "✓".green().bold(),
        versions.to_string().cyan(),
        engine.records("").len().to_string().cyan()
    );
    Ok(())
}

fn cmd_list(store: &SettingsStore, query: String) -> Result<()> {
    let engine = BackupEngine::new(store.settings());
    engine.scan_backup_folder()?;

    let records = engine.records(&query);
    if records.is_empty() {
        println!("No versions found");
        return Ok(());
    }

    for record in records {
        println!(
            "{} ({} version(s))",
            record.original_path.display().to_string().cyan().bold(),
            record.len()
        );
        for timestamp in &record.versions {
            println!("  {}", timestamp.format(TIMESTAMP_FORMAT));
        }
    }
    Ok(())
}

fn cmd_history(store: &SettingsStore) -> Result<()> {
    let engine = BackupEngine::new(store.settings());
    engine.scan_backup_folder()?;

    let entries = engine.today_history();
    if entries.is_empty() {
        println!("No backups today");
        return Ok(());
    }

    println!(
        "{} backup(s) today",
        engine.backups_today().to_string().green().bold()
    );
    for entry in entries {
        println!(
            "  {} {}",
            entry.timestamp.format("%H:%M:%S").to_string().yellow(),
            entry.original_path.display()
        );
    }
    Ok(())
}

fn cmd_watch(store: &SettingsStore) -> Result<()> {
    let engine = BackupEngine::new(store.settings());
    engine.scan_backup_folder()?;
    engine.start_watchers()?;

    let folders = store.settings().read().watched.len();
    println!(
        "{} Watching {} folder(s); press Enter to stop",
        "✓".green().bold(),
        folders.to_string().cyan()
    );

    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);

    engine.stop_watchers();
    println!(
        "{} backup(s) taken today",
        engine.backups_today().to_string().green().bold()
    );
    Ok(())
}

fn cmd_delete(
    store: &SettingsStore,
    file: PathBuf,
    timestamp: Option<String>,
    all: bool,
) -> Result<()> {
    let engine = BackupEngine::new(store.settings());
    engine.scan_backup_folder()?;

    if all {
        let deleted = engine.delete_file_versions(&file)?;
        println!(
            "{} Deleted {} version(s) of {}",
            "✓".green().bold(),
            deleted,
            file.display()
        );
        return Ok(());
    }

    let Some(timestamp) = timestamp else {
        return Err(KeepsakeError::config(
            "give a version timestamp, or --all for every version",
        ));
    };
    let timestamp = parse_timestamp(&timestamp)?;
    engine.delete_version(&file, timestamp)?;
    println!(
        "{} Deleted version {} of {}",
        "✓".green().bold(),
        timestamp.format(TIMESTAMP_FORMAT),
        file.display()
    );
    Ok(())
}

fn cmd_diff(store: &SettingsStore, file: PathBuf, first: String, second: String) -> Result<()> {
    let engine = BackupEngine::new(store.settings());
    engine.scan_backup_folder()?;
    engine.launch_diff(&file, parse_timestamp(&first)?, parse_timestamp(&second)?)
}

fn parse_timestamp(raw: &str) -> Result<chrono::NaiveDateTime> {
    chrono::NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|_| {
        KeepsakeError::config(format!(
            "invalid timestamp {:?}; expected the {} form shown by `list`",
            raw, "YYYY_MM_DD__HH_MM_SS"
        ))
    })
}
