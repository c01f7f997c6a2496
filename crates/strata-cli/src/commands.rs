use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use strata_blob::{BlobStore, FsBlobStore};
use strata_resource::frame;
use strata_types::path::{checkpoint_dir, child_name, commit_key, join};
use strata_types::COMMIT_MARKER;
use strata_workspace::{discover_checkpoints, Checkpoint, Workspace, WorkspaceConfig};
use tracing::debug;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let store = Arc::new(
        FsBlobStore::open(&cli.root)
            .with_context(|| format!("cannot open store at {}", cli.root.display()))?,
    );
    let format = cli.format;
    debug!(
        store = %cli.root.display(),
        config = ?cli.config,
        default_root = %config.root,
        retention = config.retention,
        "resolved cli settings"
    );
    match cli.command {
        Command::Checkpoints(args) => {
            let root = working_root(&config, args.working_root);
            cmd_checkpoints(&*store, &root, format).await
        }
        Command::Show(args) => {
            let root = working_root(&config, args.working_root);
            cmd_show(&*store, &root, args.checkpoint, format).await
        }
        Command::Verify(args) => {
            let root = working_root(&config, args.working_root);
            cmd_verify(&*store, &root, args.checkpoint, format).await
        }
        Command::Prune(args) => {
            let root = working_root(&config, args.working_root);
            cmd_prune(store, &root, args.retention, format).await
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<WorkspaceConfig> {
    let config = match path {
        Some(path) => WorkspaceConfig::load(path)?,
        None => WorkspaceConfig::default(),
    };
    Ok(config.apply_env()?)
}

fn working_root(config: &WorkspaceConfig, arg: Option<String>) -> String {
    arg.unwrap_or_else(|| config.root.clone())
        .trim_end_matches('/')
        .to_string()
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Data gathering
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CheckpointRow {
    checkpoint: u64,
    created: Option<String>,
    committed: bool,
    resources: usize,
}

#[derive(Debug, Serialize)]
struct CheckpointListing {
    root: String,
    checkpoints: Vec<CheckpointRow>,
    failed: Vec<u64>,
    live_resources: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ResourceRow {
    key: String,
    size: usize,
    kind: Option<String>,
    compressed: Option<bool>,
    crc32: Option<String>,
    error: Option<String>,
}

impl ResourceRow {
    fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Serialize)]
struct CheckpointResources {
    checkpoint: u64,
    dir: String,
    committed: bool,
    resources: Vec<ResourceRow>,
}

/// Wall-clock time a minted checkpoint id stands for.
fn created_at(checkpoint: Checkpoint) -> Option<String> {
    let secs = i64::try_from(checkpoint.value()).ok()?;
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Resource blobs stored directly in `dir`, not in its subdirectories.
async fn direct_blobs(store: &dyn BlobStore, dir: &str) -> anyhow::Result<Vec<String>> {
    let paths = store
        .list(dir)
        .await
        .with_context(|| format!("cannot list {dir}"))?;
    Ok(paths
        .into_iter()
        .filter(|path| {
            child_name(dir, path)
                .is_some_and(|name| name != COMMIT_MARKER && join(dir, name) == *path)
        })
        .collect())
}

/// The live root is always complete; versioned checkpoints need a marker.
async fn is_committed(store: &dyn BlobStore, dir: &str, checkpoint: Checkpoint) -> anyhow::Result<bool> {
    if checkpoint.is_live() {
        return Ok(true);
    }
    let marker = commit_key(dir);
    store
        .exists(&marker)
        .await
        .with_context(|| format!("cannot check {marker}"))
}

async fn list_checkpoints(store: &dyn BlobStore, root: &str) -> anyhow::Result<CheckpointListing> {
    let discovered = discover_checkpoints(store, root).await?;
    let mut checkpoints = Vec::with_capacity(discovered.len());
    for &checkpoint in &discovered {
        let dir = checkpoint_dir(root, checkpoint);
        let resources = direct_blobs(store, &dir).await?;
        checkpoints.push(CheckpointRow {
            checkpoint: checkpoint.value(),
            created: created_at(checkpoint),
            committed: is_committed(store, &dir, checkpoint).await?,
            resources: resources.len(),
        });
    }
    let mut failed: Vec<u64> = store
        .children(root)
        .await
        .with_context(|| format!("cannot list {root}"))?
        .iter()
        .filter_map(|name| Checkpoint::parse_failed_marker(name))
        .map(Checkpoint::value)
        .collect();
    failed.sort_unstable_by(|a, b| b.cmp(a));
    let live_resources = direct_blobs(store, root).await?;
    Ok(CheckpointListing {
        root: root.to_string(),
        checkpoints,
        failed,
        live_resources,
    })
}

async fn inspect_checkpoint(
    store: &dyn BlobStore,
    root: &str,
    checkpoint: Checkpoint,
) -> anyhow::Result<CheckpointResources> {
    let dir = checkpoint_dir(root, checkpoint);
    let mut resources = Vec::new();
    for key in direct_blobs(store, &dir).await? {
        let bytes = store
            .read(&key)
            .await
            .with_context(|| format!("cannot read {key}"))?;
        let row = match frame::inspect(&bytes) {
            Ok(header) => ResourceRow {
                key,
                size: bytes.len(),
                kind: Some(header.kind.to_string()),
                compressed: Some(header.compressed),
                crc32: Some(hex::encode(header.crc32.to_be_bytes())),
                error: None,
            },
            Err(e) => ResourceRow {
                key,
                size: bytes.len(),
                kind: None,
                compressed: None,
                crc32: None,
                error: Some(e.to_string()),
            },
        };
        resources.push(row);
    }
    Ok(CheckpointResources {
        checkpoint: checkpoint.value(),
        committed: is_committed(store, &dir, checkpoint).await?,
        dir,
        resources,
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_checkpoints(store: &dyn BlobStore, root: &str, format: OutputFormat) -> anyhow::Result<()> {
    let listing = list_checkpoints(store, root).await?;
    if format == OutputFormat::Json {
        return print_json(&listing);
    }

    println!("Working root {}", listing.root.bold());
    if listing.checkpoints.is_empty() {
        println!("  No checkpoints.");
    }
    for row in &listing.checkpoints {
        println!(
            "  {}  {}  {} resources{}",
            row.checkpoint.to_string().yellow(),
            row.created.as_deref().unwrap_or("-").dimmed(),
            row.resources,
            if row.committed { String::new() } else { format!("  {}", "uncommitted".red()) }
        );
    }
    if !listing.live_resources.is_empty() {
        println!("Live root: {} resources", listing.live_resources.len());
    }
    for checkpoint in &listing.failed {
        println!("  {} {}", "failed:".red(), Checkpoint::new(*checkpoint).failed_marker());
    }
    Ok(())
}

async fn cmd_show(
    store: &dyn BlobStore,
    root: &str,
    checkpoint: Option<u64>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let checkpoint = match checkpoint {
        Some(value) => Checkpoint::new(value),
        None => discover_checkpoints(store, root)
            .await?
            .first()
            .copied()
            .unwrap_or(Checkpoint::LIVE),
    };
    let shown = inspect_checkpoint(store, root, checkpoint).await?;
    if format == OutputFormat::Json {
        return print_json(&shown);
    }

    let label = if checkpoint.is_live() { "live".to_string() } else { checkpoint.to_string() };
    println!("Checkpoint {} ({})", label.yellow().bold(), shown.dir);
    if !shown.committed {
        println!("  {}", "uncommitted: loads will skip this checkpoint".red());
    }
    if shown.resources.is_empty() {
        println!("  No resources.");
    }
    for row in &shown.resources {
        match &row.error {
            None => println!(
                "  {}  {} bytes  {}{}  crc {}",
                row.key.bold(),
                row.size,
                row.kind.as_deref().unwrap_or("?").cyan(),
                if row.compressed == Some(true) { " (zstd)" } else { "" },
                row.crc32.as_deref().unwrap_or("?").dimmed()
            ),
            Some(error) => println!("  {}  {} bytes  {}", row.key.bold(), row.size, error.red()),
        }
    }
    Ok(())
}

async fn cmd_verify(
    store: &dyn BlobStore,
    root: &str,
    checkpoint: Option<u64>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let targets = match checkpoint {
        Some(value) => vec![Checkpoint::new(value)],
        None => {
            let mut targets = discover_checkpoints(store, root).await?;
            targets.push(Checkpoint::LIVE);
            targets
        }
    };

    let mut reports = Vec::with_capacity(targets.len());
    for target in targets {
        reports.push(inspect_checkpoint(store, root, target).await?);
    }
    let total: usize = reports.iter().map(|r| r.resources.len()).sum();
    let failed: usize = reports
        .iter()
        .flat_map(|r| &r.resources)
        .filter(|row| !row.is_valid())
        .count();
    let uncommitted: Vec<u64> = reports
        .iter()
        .filter(|r| !r.committed)
        .map(|r| r.checkpoint)
        .collect();

    if format == OutputFormat::Json {
        print_json(&reports)?;
    } else {
        for report in &reports {
            if !report.committed {
                println!("  {} {}: uncommitted", "FAIL".red().bold(), report.dir);
            }
            for row in &report.resources {
                match &row.error {
                    None => println!("  {} {}", "ok".green(), row.key),
                    Some(error) => println!("  {} {}: {}", "FAIL".red().bold(), row.key, error),
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} resources failed verification");
    }
    if !uncommitted.is_empty() {
        anyhow::bail!("checkpoints never committed: {uncommitted:?}");
    }
    if format == OutputFormat::Text {
        println!("{} {} resources verified", "✓".green().bold(), total);
    }
    Ok(())
}

async fn cmd_prune(
    store: Arc<FsBlobStore>,
    root: &str,
    retention: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    anyhow::ensure!(retention > 0, "retention must be at least 1; 0 keeps only the live root and never prunes");
    let workspace = Workspace::open(store, root, Checkpoint::LIVE, retention).await?;
    let report = workspace.close().await;
    let pruned: Vec<u64> = report.pruned.iter().map(|cp| cp.value()).collect();

    if format == OutputFormat::Json {
        print_json(&serde_json::json!({
            "root": root,
            "retention": retention,
            "pruned": pruned,
            "failures": report.failures,
        }))?;
    } else if pruned.is_empty() {
        println!("Nothing to prune under {}.", root.bold());
    } else {
        for checkpoint in &pruned {
            println!("  {} {}", "pruned".yellow(), checkpoint);
        }
    }
    if report.failures > 0 {
        anyhow::bail!("{} checkpoints could not be pruned", report.failures);
    }
    Ok(())
}
