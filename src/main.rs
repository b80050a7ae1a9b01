//! metacache - inspect cached file metadata
//!
//! Lists a directory and reads file properties through the metadata cache,
//! showing which passes hit the provider and which are served from cache.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use metacache::provider::local::SUPPORTED_PROPERTIES;
use metacache::{CacheConfig, Entry, FileEntry, FileSystemProvider, MetadataModel, Properties};

/// CLI command
#[derive(Debug)]
enum Command {
    /// Read metadata for every file in a directory
    Inspect { dir: PathBuf, names: Vec<String> },
    /// Show help
    Help,
}

fn print_help() {
    eprintln!(
        r#"metacache - Cached file metadata inspector

USAGE:
    metacache <dir> [property ...]
    metacache help

PROPERTIES:
    size, modificationTime, isDirectory, readOnly (default: all)

Each file is read three times: a cold pass that fetches, a warm pass
served from cache, and a pass after invalidation that fetches again.

ENVIRONMENT:
    METACACHE_CAPACITY   Maximum cached entries (default 10000)
    METACACHE_IDLE_SECS  Evict entries unused for this many seconds
    RUST_LOG             Log level (trace, debug, info, warn, error)
"#
    );
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return Err(anyhow!("Usage: metacache <dir> [property ...]"));
    }

    match args[1].as_str() {
        "help" | "--help" | "-h" => Ok(Command::Help),
        dir => {
            let names = if args.len() > 2 {
                args[2..].to_vec()
            } else {
                SUPPORTED_PROPERTIES.iter().map(|n| n.to_string()).collect()
            };
            Ok(Command::Inspect {
                dir: PathBuf::from(dir),
                names,
            })
        }
    }
}

/// Entries of a directory, sorted by path
async fn list_dir(dir: &Path) -> Result<Vec<FileEntry>> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory: {:?}", dir))?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(FileEntry::new(entry.path()).with_cached_url());
    }
    entries.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(entries)
}

fn print_pass(pass: &str, entries: &[FileEntry], results: &[Properties]) -> Result<()> {
    for (entry, properties) in entries.iter().zip(results) {
        let line = serde_json::json!({
            "pass": pass,
            "url": entry.cache_key(),
            "properties": properties,
        });
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let log_level = env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let (dir, names) = match command {
        Command::Inspect { dir, names } => (dir, names),
        Command::Help => {
            print_help();
            return Ok(());
        }
    };

    let config = CacheConfig::from_env()?;
    let model = MetadataModel::with_config(FileSystemProvider::new(), &config)?;
    model.on_update(|event| {
        info!(
            changed = event.entries.len(),
            names = ?event.names,
            "Metadata updated"
        );
    });

    let entries = list_dir(&dir).await?;
    info!(dir = %dir.display(), entries = entries.len(), "Inspecting directory");

    let cold = model.get(&entries, &names).await?;
    print_pass("cold", &entries, &cold)?;

    let fresh = model.has_fresh_cache(&entries, &names);
    let warm = model.get(&entries, &names).await?;
    info!(served_from_cache = fresh, "Warm pass complete");
    print_pass("warm", &entries, &warm)?;

    model.notify_entries_changed(&entries);
    let refreshed = model.get(&entries, &names).await?;
    print_pass("refreshed", &entries, &refreshed)?;

    Ok(())
}
