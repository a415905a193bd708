//! VITRINE CLI
//!
//! Inspect recorded traces: list the context/action tree, resolve a request
//! the way a replay would, and decode the snapshot captured with an action.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vitrine_core::{ContextId, FrameId};
use vitrine_replay::{ActionRef, PageSnapshot, ResourceMatcher, TraceSession, TreeBuilder};
use vitrine_storage::{DirStore, StoreConfig};

#[derive(Parser)]
#[command(name = "vitrine")]
#[command(about = "VITRINE - browser trace inspection and snapshot replay", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the context/action tree
    Tree {
        /// Trace files, loaded in order
        #[arg(short, long = "trace", required = true, num_args = 1..)]
        traces: Vec<PathBuf>,
        /// Only this browser
        #[arg(short, long)]
        browser: Option<String>,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which recorded resource would answer a request
    Resolve {
        /// Trace files, loaded in order
        #[arg(short, long = "trace", required = true, num_args = 1..)]
        traces: Vec<PathBuf>,
        /// Recorded context id
        #[arg(short, long)]
        context: String,
        /// Request URL
        #[arg(short, long)]
        url: String,
        /// Recorded frame id preferred among candidates
        #[arg(short, long)]
        frame: Option<String>,
    },
    /// Decode the snapshot captured with an action
    Snapshot {
        /// Trace files, loaded in order
        #[arg(short, long = "trace", required = true, num_args = 1..)]
        traces: Vec<PathBuf>,
        /// Resource directory
        #[arg(short, long)]
        store: PathBuf,
        /// Action reference, `<trace>:<index>`
        #[arg(short, long)]
        action: ActionRef,
    },
}

/// Settings read from `--config`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct VitrineConfig {
    store: StoreConfig,
}

impl VitrineConfig {
    async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).wrap_err_with(|| format!("parsing config {}", path.display()))
    }
}

async fn open_session(traces: &[PathBuf]) -> Result<TraceSession> {
    TraceSession::open(traces).await.wrap_err("loading traces")
}

fn render_tree(session: &TraceSession, browser: Option<&str>, json: bool) -> Result<String> {
    let builder = TreeBuilder::new(session);
    let trees: Vec<_> = match browser {
        Some(name) => vec![builder.build(name)],
        None => session.index().browser_names().map(|name| builder.build(name)).collect(),
    };
    if json {
        return Ok(serde_json::to_string_pretty(&trees)?);
    }
    Ok(trees.iter().map(|t| t.render_text()).collect())
}

fn render_resolution(session: &TraceSession, context: &str, url: &str, frame: Option<&str>) -> Result<String> {
    let context = ContextId::new(context);
    if session.index().context(&context).is_none() {
        return Err(eyre!("context {} was never created in the loaded traces", context));
    }
    let frame = frame.map(FrameId::new);
    let resource = ResourceMatcher::new(session.index())
        .find(url, &context, frame.as_ref())
        .ok_or_else(|| eyre!("no recorded resource for {} in context {}", url, context))?;
    Ok(serde_json::to_string_pretty(resource)?)
}

fn render_snapshot(snapshot: &PageSnapshot) -> String {
    let mut out = String::new();
    for (depth, frame) in snapshot.frames.iter().enumerate() {
        let role = if depth == 0 { "root" } else { "child" };
        let _ = writeln!(
            out,
            "{} {} {} ({} bytes html, {} overrides)",
            role,
            frame.frame_id,
            frame.url,
            frame.html.len(),
            frame.resource_overrides.len()
        );
        for over in &frame.resource_overrides {
            let _ = writeln!(out, "  {} -> {}", over.url, over.content_hash);
        }
    }
    out
}

async fn load_snapshot(session: &TraceSession, store: StoreConfig, action: ActionRef) -> Result<PageSnapshot> {
    let event = session
        .action(action)
        .ok_or_else(|| eyre!("{} is not an action", action))?;
    let snapshot = event
        .snapshot
        .as_ref()
        .ok_or_else(|| eyre!("action {} has no snapshot", action))?;
    let store = DirStore::with_config(store);
    PageSnapshot::load(&store, snapshot)
        .await
        .wrap_err_with(|| format!("loading snapshot {}", snapshot.content_hash))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vitrine=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = VitrineConfig::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Tree {
            traces,
            browser,
            json,
        } => {
            let session = open_session(&traces).await?;
            print!("{}", render_tree(&session, browser.as_deref(), json)?);
        }
        Commands::Resolve {
            traces,
            context,
            url,
            frame,
        } => {
            let session = open_session(&traces).await?;
            println!("{}", render_resolution(&session, &context, &url, frame.as_deref())?);
        }
        Commands::Snapshot {
            traces,
            store,
            action,
        } => {
            let session = open_session(&traces).await?;
            let store = StoreConfig {
                root: store,
                ..config.store
            };
            let snapshot = load_snapshot(&session, store, action).await?;
            print!("{}", render_snapshot(&snapshot));
        }
    }
    Ok(())
}
