//! # CLI Module
//!
//! Command-line interface for the media catalog.
//!
//! ## Usage
//! ```bash
//! # List media files without cataloging them
//! media-catalog scan ~/Pictures
//!
//! # Index a folder into the catalog
//! media-catalog index /Volumes/EOS_DIGITAL/DCIM
//!
//! # Manage volumes
//! media-catalog volumes list
//! media-catalog volumes eject <uuid>
//!
//! # Fetch a rendition
//! media-catalog render media://thumbnail/<asset id> --out thumb.jpg
//! ```

use clap::{Parser, Subcommand};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use media_catalog::core::catalog::{Asset, Volume, VolumeStatus};
use media_catalog::error::{RenditionError, Result};
use media_catalog::events::{Event, EventChannel, IndexEvent, RunStatus, RunSummary};
use media_catalog::{EngineConfig, MediaLibrary};
use serde::Serialize;
use std::path::PathBuf;
use std::thread;

/// Media Catalog - track photos and videos across drives
#[derive(Parser, Debug)]
#[command(name = "media-catalog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog database path (overrides config)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Rendition cache directory (overrides config)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List media files under a directory
    Scan {
        /// Directory to scan
        path: PathBuf,
    },

    /// Index a directory into the catalog
    Index {
        /// Directory to index
        path: PathBuf,
    },

    /// Inspect and manage volumes
    Volumes {
        #[command(subcommand)]
        action: VolumeAction,
    },

    /// Resolve a media:// URI to a file
    Render {
        /// media://thumbnail/<id>, media://preview/<id> or media://original/<id>
        uri: String,

        /// Write the bytes here instead of printing the path
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show groups of probable duplicate files
    Duplicates,

    /// Delete cache files that no asset needs
    PruneCache,
}

#[derive(Subcommand, Debug)]
enum VolumeAction {
    /// List every volume ever seen
    List {
        /// Include hidden volumes
        #[arg(long)]
        all: bool,
    },
    /// Dismount an external volume
    Eject { uuid: String },
    /// Hide a volume until it is next used
    Hide { uuid: String },
    /// Change a volume's display label
    Rename { uuid: String, label: String },
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let term = Term::stderr();

    match cli.command {
        Commands::Scan { path } => run_scan(config, path, cli.json),
        Commands::Index { path } => run_index(&term, config, path, cli.json),
        Commands::Volumes { action } => run_volumes(&term, config, action, cli.json),
        Commands::Render { uri, out } => run_render(&term, config, &uri, out),
        Commands::Duplicates => run_duplicates(&term, config, cli.json),
        Commands::PruneCache => run_prune(&term, config, cli.json),
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(catalog) = &cli.catalog {
        config.catalog_path = catalog.clone();
    }
    if let Some(cache_dir) = &cli.cache_dir {
        config.rendition_dir = cache_dir.clone();
    }
    Ok(config)
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn run_scan(config: EngineConfig, path: PathBuf, json: bool) -> Result<()> {
    let library = MediaLibrary::open(config)?;
    let files = library.scan_directory(&path)?;

    if json {
        print_json(&files);
    } else {
        for file in &files {
            println!("{}", file.display());
        }
    }
    Ok(())
}

fn run_index(term: &Term, config: EngineConfig, path: PathBuf, json: bool) -> Result<()> {
    let (sender, receiver) = EventChannel::new();
    let library = MediaLibrary::builder(config).events(sender).build()?;

    let progress = if json {
        None
    } else {
        let pb = ProgressBar::new(0);
        if let Ok(bar_style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(bar_style.progress_chars("█▓░"));
        }
        Some(pb)
    };

    let progress_clone = progress.clone();
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(pb) = progress_clone.as_ref() else {
                continue;
            };
            match event {
                Event::Index(IndexEvent::Progress(p)) => {
                    pb.set_length(p.total as u64);
                    pb.set_position(p.indexed as u64);
                    let name = p
                        .current_file
                        .as_ref()
                        .and_then(|f| f.file_name())
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| p.status.to_string());
                    pb.set_message(name);
                }
                Event::Index(IndexEvent::Finished { .. }) => pb.finish_and_clear(),
                _ => {}
            }
        }
    });

    let volume = library.start_indexing(&path)?;
    let summary = library.wait_for_indexing();

    // Dropping the library drops every sender, ending the event thread.
    drop(library);
    event_thread.join().ok();

    match summary {
        Some(summary) if json => print_json(&summary),
        Some(summary) => print_summary(term, &volume, &summary),
        None => {
            term.write_line(&format!("{} Indexing stopped unexpectedly", style("✗").red().bold()))
                .ok();
        }
    }
    Ok(())
}

fn print_summary(term: &Term, volume: &Volume, summary: &RunSummary) {
    let marker = match summary.status {
        RunStatus::Completed => style("✓").green().bold(),
        RunStatus::Cancelled => style("○").yellow().bold(),
        _ => style("✗").red().bold(),
    };

    term.write_line(&format!("{} Indexing {}", marker, summary.status)).ok();
    term.write_line("").ok();
    term.write_line(&format!(
        "  {} on {} ({})",
        style(summary.root.display()).bold(),
        style(&volume.label).cyan(),
        style(volume.volume_type.as_str()).dim()
    ))
    .ok();
    term.write_line(&format!(
        "  {} of {} files indexed in {:.1}s",
        style(summary.indexed).cyan(),
        summary.total,
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();
    if summary.missing > 0 {
        term.write_line(&format!(
            "  {} files no longer found",
            style(summary.missing).yellow()
        ))
        .ok();
    }
    if let Some(error) = &summary.error {
        term.write_line(&format!("  {}", style(error).red())).ok();
    }
}

fn run_volumes(term: &Term, config: EngineConfig, action: VolumeAction, json: bool) -> Result<()> {
    let library = MediaLibrary::open(config)?;

    let volumes = match action {
        VolumeAction::List { all } => library
            .list_volumes()?
            .into_iter()
            .filter(|v| all || !v.hidden)
            .collect(),
        VolumeAction::Eject { uuid } => vec![library.eject(&uuid)?],
        VolumeAction::Hide { uuid } => vec![library.hide(&uuid)?],
        VolumeAction::Rename { uuid, label } => vec![library.rename(&uuid, &label)?],
    };

    if json {
        print_json(&volumes);
        return Ok(());
    }

    if volumes.is_empty() {
        term.write_line(&format!("{}", style("No volumes yet. Index a folder first.").dim()))
            .ok();
    }
    for volume in &volumes {
        let dot = match volume.status {
            VolumeStatus::Connected => style("●").green(),
            VolumeStatus::Disconnected => style("○").dim(),
        };
        let mount = volume
            .mount_point
            .as_ref()
            .map(|m| m.display().to_string())
            .unwrap_or_else(|| "not mounted".to_string());
        term.write_line(&format!(
            "{} {} {} {}",
            dot,
            style(&volume.label).bold(),
            style(format!("[{}]", volume.volume_type.as_str())).dim(),
            style(mount).dim()
        ))
        .ok();
        term.write_line(&format!("    {}", style(&volume.uuid).dim())).ok();
    }
    Ok(())
}

fn run_render(term: &Term, config: EngineConfig, uri: &str, out: Option<PathBuf>) -> Result<()> {
    let cache_dir = config.rendition_dir.clone();
    let library = MediaLibrary::open(config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| RenditionError::Io {
            path: cache_dir,
            source,
        })?;

    match out {
        Some(out) => {
            let bytes = runtime.block_on(library.read_uri(uri))?;
            std::fs::write(&out, &bytes).map_err(|source| RenditionError::Io {
                path: out.clone(),
                source,
            })?;
            term.write_line(&format!(
                "{} Wrote {} to {}",
                style("✓").green().bold(),
                format_bytes(bytes.len() as u64),
                out.display()
            ))
            .ok();
        }
        None => {
            let path = runtime.block_on(library.renditions().resolve_uri(uri))?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn run_duplicates(term: &Term, config: EngineConfig, json: bool) -> Result<()> {
    let library = MediaLibrary::open(config)?;
    let groups = library.duplicate_candidates()?;

    if json {
        print_json(&groups);
        return Ok(());
    }

    if groups.is_empty() {
        term.write_line(&format!("  {} No duplicate candidates", style("✓").green()))
            .ok();
        return Ok(());
    }

    for (i, group) in groups.iter().enumerate() {
        let size = group.first().map(|a| a.fingerprint.size).unwrap_or(0);
        term.write_line(&format!(
            "  {} {} files, {} each",
            style(format!("Group {}:", i + 1)).bold(),
            group.len(),
            format_bytes(size)
        ))
        .ok();
        for asset in group {
            term.write_line(&format!("    {} {}", style("○").dim(), describe(asset)))
                .ok();
        }
        term.write_line("").ok();
    }
    term.write_line(&format!(
        "{}",
        style("Candidates share size and leading bytes; compare before deleting anything.").dim()
    ))
    .ok();
    Ok(())
}

fn describe(asset: &Asset) -> String {
    format!(
        "{} {}",
        asset.relative_path,
        style(format!("({}, {})", &asset.volume_id, asset.status.as_str())).dim()
    )
}

fn run_prune(term: &Term, config: EngineConfig, json: bool) -> Result<()> {
    let library = MediaLibrary::open(config)?;
    let report = library.prune_cache()?;
    let stats = library.cache_stats()?;

    if json {
        print_json(&serde_json::json!({ "pruned": report, "remaining": stats }));
        return Ok(());
    }

    term.write_line(&format!(
        "{} Removed {} files ({})",
        style("✓").green().bold(),
        style(report.removed).cyan(),
        format_bytes(report.bytes_freed)
    ))
    .ok();
    term.write_line(&format!(
        "  {} files ({}) remain in {}",
        stats.files,
        format_bytes(stats.bytes),
        library.renditions().cache_dir().display()
    ))
    .ok();
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
