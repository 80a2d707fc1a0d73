//! vaultops - Bulk, cancellable file operations against encrypted volumes.
//!
//! Usage:
//!   vaultops init <DIR>                                Create an empty volume
//!   vaultops check <DIR>                               Tell whether DIR is a volume
//!   vaultops ls --volume <VOL> [PATH]                  List a volume directory
//!   vaultops cat --volume <VOL> <PATH>                 Print a volume file
//!   vaultops cp --volume <VOL> <SRC>... <DIR>          Copy inside (or into) a volume
//!   vaultops mv --volume <VOL> <SRC>... <DIR>          Move inside a volume
//!   vaultops import --volume <VOL> <HOST>... -t <DIR>  Import host files
//!   vaultops export --volume <VOL> <SRC>... -t <HOST>  Export volume files
//!   vaultops wipe <DIR>                                Securely destroy a volume
//!   vaultops copy-volume <DIR> <HOST>                  Duplicate a volume container
//!
//! Press Ctrl-C during an operation to cancel it after the current item.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vaultops_core::{
    file_name, is_volume_root, path_join, HostTree, OperationItem, OperationKind, OpsConfig,
    SessionId, TaskResult, Volume, VolumeError,
};
use vaultops_local::{collect_files, DirVolume, FsHostTree, LocalVolume, OverwriteWiper};
use vaultops_ops::{
    copy_volume, expand_items, expand_move_items, load_whole_file, wipe_nodes, LogSink,
    OperationExecutor, OpsResult, TaskSupervisor,
};

#[derive(Parser)]
#[command(
    name = "vaultops",
    version,
    about = "Bulk, cancellable file operations against encrypted volumes",
    long_about = "vaultops copies, moves, imports, exports and wipes files inside a volume.\n\n\
                  Every operation processes its items in order, stops at the first \
                  failure, and can be cancelled with Ctrl-C between two items."
)]
struct Cli {
    /// Output format for operation results
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Transfer buffer size in bytes
    #[arg(long, global = true, default_value_t = vaultops_core::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty volume
    Init {
        /// Directory that becomes the volume root
        dir: PathBuf,
    },

    /// Check whether a directory is a volume root
    Check {
        dir: PathBuf,
    },

    /// List a volume directory
    Ls {
        /// Volume root directory
        #[arg(long)]
        volume: PathBuf,

        #[arg(default_value = "/")]
        path: String,
    },

    /// Print a volume file to stdout
    Cat {
        /// Volume root directory
        #[arg(long)]
        volume: PathBuf,

        path: String,

        /// Refuse files larger than this many bytes
        #[arg(long)]
        max_size: Option<u64>,
    },

    /// Copy files or directories into a volume directory
    Cp {
        /// Volume root directory
        #[arg(long)]
        volume: PathBuf,

        /// Read the sources from this other volume instead
        #[arg(long)]
        from: Option<PathBuf>,

        /// Sources followed by the destination directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
    },

    /// Move files or directories inside a volume, merging directories
    Mv {
        /// Volume root directory
        #[arg(long)]
        volume: PathBuf,

        /// Sources followed by the destination directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
    },

    /// Import host files or directories into a volume directory
    Import {
        /// Volume root directory
        #[arg(long)]
        volume: PathBuf,

        /// Host sources
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Destination directory inside the volume
        #[arg(short, long, default_value = "/")]
        to: String,

        /// Securely wipe imported directories afterwards
        #[arg(long)]
        wipe_originals: bool,
    },

    /// Export volume files or directories into a host directory
    Export {
        /// Volume root directory
        #[arg(long)]
        volume: PathBuf,

        /// Volume sources
        #[arg(required = true)]
        sources: Vec<String>,

        /// Host destination directory
        #[arg(short, long)]
        to: PathBuf,
    },

    /// Securely wipe a whole volume container
    Wipe {
        dir: PathBuf,

        /// Overwrite passes per file
        #[arg(long, default_value = "1")]
        passes: u32,
    },

    /// Duplicate a volume container into a host directory
    CopyVolume {
        src: PathBuf,
        dst: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = OpsConfig::builder()
        .chunk_size(cli.chunk_size)
        .build()
        .map_err(vaultops_ops::OpsError::from)?;
    let app = App {
        supervisor: Arc::new(TaskSupervisor::new(LogSink, config.clone())),
        config,
        format: cli.format,
    };

    match cli.command {
        Command::Init { dir } => app.init(&dir),
        Command::Check { dir } => app.check(&dir),
        Command::Ls { volume, path } => app.ls(&volume, &path),
        Command::Cat {
            volume,
            path,
            max_size,
        } => app.cat(&volume, &path, max_size),
        Command::Cp {
            volume,
            from,
            paths,
        } => app.copy(&volume, from.as_deref(), paths).await,
        Command::Mv { volume, paths } => app.move_items(&volume, paths).await,
        Command::Import {
            volume,
            sources,
            to,
            wipe_originals,
        } => app.import(&volume, sources, &to, wipe_originals).await,
        Command::Export {
            volume,
            sources,
            to,
        } => app.export(&volume, sources, to).await,
        Command::Wipe { dir, passes } => app.wipe(dir, passes).await,
        Command::CopyVolume { src, dst } => app.copy_volume(src, dst).await,
    }
}

/// Log to stderr; `RUST_LOG` overrides the verbosity flag.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

struct App {
    supervisor: Arc<TaskSupervisor>,
    config: OpsConfig,
    format: OutputFormat,
}

impl App {
    fn open_volume(&self, dir: &Path) -> Result<Arc<dyn Volume>> {
        let backend = DirVolume::open(dir, &self.config)
            .wrap_err_with(|| format!("Cannot open volume {}", dir.display()))?;
        Ok(Arc::new(LocalVolume::new(backend)))
    }

    fn executor(&self, dir: &Path) -> Result<OperationExecutor> {
        Ok(OperationExecutor::new(
            Arc::clone(&self.supervisor),
            self.open_volume(dir)?,
        ))
    }

    fn init(&self, dir: &Path) -> Result<()> {
        DirVolume::create(dir, &self.config)
            .wrap_err_with(|| format!("Cannot create volume {}", dir.display()))?;
        println!("Created volume {}", dir.display());
        Ok(())
    }

    fn check(&self, dir: &Path) -> Result<()> {
        if !is_volume_root(dir, &self.config) {
            bail!("{} is not a volume", dir.display());
        }
        let header = DirVolume::read_header(dir, &self.config)?;
        match self.format {
            OutputFormat::Text => println!(
                "{} is a volume (version {}, {})",
                dir.display(),
                header.version,
                header.creator
            ),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&header)?),
        }
        Ok(())
    }

    fn ls(&self, dir: &Path, path: &str) -> Result<()> {
        let volume = self.open_volume(dir)?;
        let entries: Vec<_> = volume
            .list_dir(path)?
            .into_iter()
            .filter(|e| !e.is_parent_marker())
            .collect();

        match self.format {
            OutputFormat::Text => {
                for entry in &entries {
                    let modified = entry
                        .modified
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    if entry.is_dir() {
                        println!("{:>10}  {:16}  {}/", "-", modified, entry.name);
                    } else {
                        println!("{:>10}  {:16}  {}", format_size(entry.size), modified, entry.name);
                    }
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        }
        volume.close();
        Ok(())
    }

    fn cat(&self, dir: &Path, path: &str, max_size: Option<u64>) -> Result<()> {
        use std::io::Write;

        let volume = self.open_volume(dir)?;
        let data = load_whole_file(volume.as_ref(), path, None, max_size, self.config.chunk_size)
            .wrap_err_with(|| format!("Cannot read {path}"))?;
        volume.close();

        std::io::stdout().write_all(&data)?;
        info!(path, size = %format_size(data.len() as u64), "read file");
        Ok(())
    }

    async fn copy(&self, dir: &Path, from: Option<&Path>, mut paths: Vec<String>) -> Result<()> {
        let destination = paths.pop().ok_or_else(|| eyre!("Missing destination"))?;
        let executor = self.executor(dir)?;
        let remote = from.map(|d| self.open_volume(d)).transpose()?;
        let source_volume = remote.clone().unwrap_or_else(|| Arc::clone(executor.volume()));

        let items = expand_sources(source_volume.as_ref(), &paths, &destination, expand_items)?;
        let running = executor.copy(items, remote);
        let result = supervise(&self.supervisor, running.id(), running.wait()).await?;
        self.finish(OperationKind::Copy, &result, json!({ "destination": destination }))
    }

    async fn move_items(&self, dir: &Path, mut paths: Vec<String>) -> Result<()> {
        let destination = paths.pop().ok_or_else(|| eyre!("Missing destination"))?;
        let executor = self.executor(dir)?;

        let items = expand_sources(
            executor.volume().as_ref(),
            &paths,
            &destination,
            expand_move_items,
        )?;
        let running = executor.move_items(items);
        let result = supervise(&self.supervisor, running.id(), running.wait()).await?;
        self.finish(OperationKind::Move, &result, json!({ "destination": destination }))
    }

    async fn import(
        &self,
        dir: &Path,
        sources: Vec<PathBuf>,
        to: &str,
        wipe_originals: bool,
    ) -> Result<()> {
        let executor = self.executor(dir)?;
        let host = Arc::new(FsHostTree::new());

        let mut files = Vec::new();
        let mut directories = Vec::new();
        for source in sources {
            let name = host
                .name(&source)
                .ok_or_else(|| eyre!("{} has no file name", source.display()))?;
            let destination = path_join(to, &name);
            if host.is_dir(&source) {
                directories.push((source, destination));
            } else if host.is_file(&source) {
                files.push((destination, source));
            } else {
                bail!("{} does not exist", source.display());
            }
        }

        let bytes: u64 = files.iter().map(|(_, node)| host.size(node)).sum();
        if !files.is_empty() {
            let running = executor.import_files(Arc::clone(&host), files);
            let result = supervise(&self.supervisor, running.id(), running.wait()).await?;
            self.finish(
                OperationKind::Import,
                &result,
                json!({ "bytes": bytes, "size": format_size(bytes) }),
            )?;
        }

        for (source, destination) in directories {
            let running =
                executor.import_directory(Arc::clone(&host), source.clone(), destination.clone());
            let outcome = supervise(&self.supervisor, running.id(), running.wait()).await?;
            let bytes: u64 = outcome.sources.iter().map(|node| host.size(node)).sum();
            self.finish(
                OperationKind::Import,
                &outcome.result,
                json!({
                    "destination": destination,
                    "files": outcome.sources.len(),
                    "bytes": bytes,
                    "size": format_size(bytes),
                }),
            )?;

            if wipe_originals && outcome.result.is_success() {
                let running = executor.wipe(
                    Arc::clone(&host),
                    Arc::new(OverwriteWiper::default()),
                    outcome.sources,
                    Some(source),
                );
                let wiped = supervise(&self.supervisor, running.id(), running.wait()).await?;
                self.finish(
                    OperationKind::Wipe,
                    &wiped.result,
                    json!({ "root_removed": wiped.root_removed }),
                )?;
            }
        }
        Ok(())
    }

    async fn export(&self, dir: &Path, sources: Vec<String>, to: PathBuf) -> Result<()> {
        let executor = self.executor(dir)?;
        let host = Arc::new(FsHostTree::new());
        if !host.is_dir(&to) {
            bail!("{} is not a directory", to.display());
        }

        let items = sources
            .into_iter()
            .map(|source| {
                if !executor.volume().exists(&source) {
                    bail!("{source} does not exist in the volume");
                }
                let is_directory = is_volume_dir(executor.volume().as_ref(), &source);
                Ok(OperationItem::source_only(source, is_directory))
            })
            .collect::<Result<Vec<_>>>()?;

        let running = executor.export(host, to.clone(), items);
        let result = supervise(&self.supervisor, running.id(), running.wait()).await?;
        self.finish(
            OperationKind::Export,
            &result,
            json!({ "destination": to.display().to_string() }),
        )
    }

    async fn wipe(&self, dir: PathBuf, passes: u32) -> Result<()> {
        if !is_volume_root(&dir, &self.config) {
            bail!("{} is not a volume, refusing to wipe it", dir.display());
        }
        let host = FsHostTree::new();
        let files = collect_files(&host, &dir)?;
        let wiper = OverwriteWiper::new(passes);

        let session = self.supervisor.start(OperationKind::Wipe, Some(files.len()));
        let id = session.id();
        let root = dir.clone();
        let work = self.supervisor.run(session, move |ctx| {
            wipe_nodes(ctx, &host, &wiper, &files, Some(&root))
        });
        let outcome = supervise(&self.supervisor, id, work).await?;

        if outcome.root_removed == Some(false) {
            warn!(root = %dir.display(), "volume files wiped but the directory remains");
        }
        self.finish(
            OperationKind::Wipe,
            &outcome.result,
            json!({ "root_removed": outcome.root_removed }),
        )
    }

    async fn copy_volume(&self, src: PathBuf, dst: PathBuf) -> Result<()> {
        if !is_volume_root(&src, &self.config) {
            bail!("{} is not a volume", src.display());
        }
        let host = FsHostTree::new();

        let session = self.supervisor.start(OperationKind::CopyVolume, None);
        let id = session.id();
        let work = self
            .supervisor
            .run(session, move |ctx| copy_volume(ctx, &host, &src, &dst));
        let outcome = supervise(&self.supervisor, id, work).await?;

        let destination = outcome
            .destination_root
            .as_ref()
            .map(|root| root.display().to_string());
        let result = outcome.result.map(|node| node.display().to_string());
        self.finish(
            OperationKind::CopyVolume,
            &result,
            json!({ "destination_root": destination }),
        )
    }

    /// Print the outcome of one operation; a failed item becomes an error.
    fn finish(
        &self,
        kind: OperationKind,
        result: &TaskResult<String>,
        details: serde_json::Value,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                if result.cancelled {
                    println!("{}: cancelled", kind.title());
                } else if result.failed_item.is_none() {
                    println!("{}: done", kind.title());
                }
            }
            OutputFormat::Json => {
                let report = json!({
                    "operation": kind,
                    "cancelled": result.cancelled,
                    "failed_item": result.failed_item,
                    "details": details,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        match &result.failed_item {
            Some(item) => Err(eyre!("{} failed at {item}", kind.title())),
            None => Ok(()),
        }
    }
}

/// Wait for a session, cancelling it on the first Ctrl-C.
async fn supervise<R>(
    supervisor: &TaskSupervisor,
    id: SessionId,
    work: impl Future<Output = OpsResult<R>>,
) -> Result<R> {
    let mut work = std::pin::pin!(work);
    tokio::select! {
        result = &mut work => return Ok(result?),
        _ = tokio::signal::ctrl_c() => {
            warn!(session = %id, "interrupted, cancelling after the current item");
            supervisor.cancel(id);
        }
    }
    Ok(work.await?)
}

/// Directories have no file size in a volume.
fn is_volume_dir(volume: &dyn Volume, path: &str) -> bool {
    volume.exists(path) && volume.size(path).is_none()
}

type Expander = fn(&dyn Volume, &str, &str, bool) -> Result<Vec<OperationItem>, VolumeError>;

/// Expand every source into items placed inside `destination`.
fn expand_sources(
    volume: &dyn Volume,
    sources: &[String],
    destination: &str,
    expand: Expander,
) -> Result<Vec<OperationItem>> {
    let mut items = Vec::new();
    for source in sources {
        if !volume.exists(source) {
            bail!("{source} does not exist in the volume");
        }
        let target = path_join(destination, file_name(source));
        items.extend(expand(
            volume,
            source,
            &target,
            is_volume_dir(volume, source),
        )?);
    }
    Ok(items)
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
