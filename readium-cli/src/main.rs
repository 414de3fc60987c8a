use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use readium_core::{
    document_id_for_path, Command, DocumentInfo, DocumentMetadata, DocumentProvider,
    FileStateStore, SessionConfig, SessionStore, StateStore,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "readium",
    version,
    about = "Inspect and edit persisted PDF reading sessions"
)]
struct Args {
    /// Directory holding the persisted session (overrides the config file)
    #[arg(long = "state-dir", global = true)]
    state_dir: Option<PathBuf>,

    /// Path to a readium.toml config file
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Open a document and make its session active
    Open {
        path: PathBuf,
        /// Page count reported by the renderer
        #[arg(long)]
        pages: u32,
    },
    /// Activate an already open session
    Switch { id: String },
    /// Close a session
    Close { id: String },
    /// Print the active session as JSON
    Status,
    /// Apply a JSON array of commands
    Apply { file: PathBuf },
    /// Export annotations and bookmarks of the active session
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import annotations into the active session
    Import { file: PathBuf },
    /// List recently opened files
    Recent,
}

/// Opens files without parsing them; the page count comes from the caller.
struct FilesystemProvider {
    page_count: u32,
}

#[async_trait]
impl DocumentProvider for FilesystemProvider {
    async fn open(&self, path: &Path) -> Result<DocumentInfo> {
        let absolute = path
            .canonicalize()
            .with_context(|| format!("failed to resolve path for {:?}", path))?;
        let size = fs::metadata(&absolute).ok().map(|meta| meta.len());
        let title = absolute
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        Ok(DocumentInfo {
            id: document_id_for_path(&absolute),
            url: format!("file://{}", absolute.display()),
            path: absolute,
            page_count: self.page_count,
            size,
            metadata: DocumentMetadata {
                title,
                ..Default::default()
            },
            outline: Vec::new(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport<'a> {
    active_document_id: Option<&'a str>,
    open_documents: Vec<String>,
    source_url: Option<&'a str>,
    current_page: u32,
    page_count: u32,
    page_order: &'a [u32],
    zoom: f32,
    rotation: u16,
    annotations: usize,
    bookmarks: usize,
    can_undo: bool,
    can_redo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::load_default()?,
    };
    let state_dir = args
        .state_dir
        .clone()
        .or_else(|| config.state_dir())
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&state_dir.join("logs"))?;

    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(state_dir.clone())?);
    let mut session = SessionStore::restore(config, store);

    run(&mut session, args.command).await?;

    session.persist()?;
    Ok(())
}

async fn run(session: &mut SessionStore, action: Action) -> Result<()> {
    let mut stdout = io::stdout();
    match action {
        Action::Open { path, pages } => {
            let provider = FilesystemProvider { page_count: pages };
            session
                .open_with(&provider, path.clone())
                .await
                .with_context(|| format!("failed to open {:?}", path))?;
            let id = session.active_document_id().unwrap_or_default();
            info!(%id, "opened document");
            writeln!(stdout, "{id}")?;
        }
        Action::Switch { id } => {
            session.switch_session(&id)?;
            info!(%id, "switched document session");
        }
        Action::Close { id } => {
            if !session.apply(Command::CloseSession { id: id.clone() }) {
                warn!(%id, "no open session to close");
            }
        }
        Action::Status => {
            let doc = session.document();
            let report = StatusReport {
                active_document_id: session.active_document_id(),
                open_documents: session.open_documents(),
                source_url: doc.source_url.as_deref(),
                current_page: doc.current_page(),
                page_count: doc.page_count(),
                page_order: doc.page_order(),
                zoom: doc.view().zoom,
                rotation: doc.view().rotation.degrees(),
                annotations: doc.annotations().len(),
                bookmarks: doc.bookmarks().len(),
                can_undo: doc.can_undo(),
                can_redo: doc.can_redo(),
            };
            serde_json::to_writer_pretty(&mut stdout, &report)?;
            writeln!(stdout)?;
        }
        Action::Apply { file } => {
            let source = fs::read_to_string(&file)
                .with_context(|| format!("failed to read command file {:?}", file))?;
            let commands: Vec<Command> = serde_json::from_str(&source)
                .with_context(|| format!("failed to decode command file {:?}", file))?;
            let total = commands.len();
            let changed = commands
                .into_iter()
                .map(|command| session.apply(command))
                .filter(|changed| *changed)
                .count();
            info!(total, changed, "applied commands");
            writeln!(stdout, "{changed}/{total} commands changed state")?;
        }
        Action::Export { output } => {
            let doc = session.document();
            match output {
                Some(path) => {
                    let written = doc.export_annotations_to_file(&path)?;
                    info!(?path, written, "exported annotations");
                }
                None => writeln!(stdout, "{}", doc.export_annotations()?)?,
            }
        }
        Action::Import { file } => {
            let json = fs::read_to_string(&file)
                .with_context(|| format!("failed to read import file {:?}", file))?;
            let count = session.document().annotations().len();
            if !session.apply(Command::ImportAnnotations { json }) {
                return Err(anyhow!("failed to import annotations from {:?}", file));
            }
            let added = session.document().annotations().len().saturating_sub(count);
            writeln!(stdout, "imported {added} annotations")?;
        }
        Action::Recent => {
            for file in session.recent_files().files() {
                writeln!(stdout, "{}\t{}", file.name, file.url)?;
            }
        }
    }
    Ok(())
}

fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "readium.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
