use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use highlight_notes_config::Config;
use highlight_notes_engine::anchoring::{Affinity, TextIndex};
use highlight_notes_engine::dom::to_html;
use highlight_notes_engine::{
    AnchorPatch, Document, DomRange, HighlightId, HighlightRepository, Highlighter, JsonFileStore,
    KeyValueStore, Resolved, SyncQueue, Syncer, resolve,
};

mod remote;

use remote::DirRemoteStore;

#[derive(Debug, Parser)]
#[command(name = "highlight-notes", version, about = "Anchor highlights and notes into HTML pages")]
struct Cli {
    /// Config file (defaults to ~/.config/highlight-notes/config.toml)
    #[arg(long, global = true, env = "HIGHLIGHT_NOTES_CONFIG")]
    config: Option<PathBuf>,

    /// Local store file, overriding the configured one
    #[arg(long, global = true, env = "HIGHLIGHT_NOTES_STORE")]
    store: Option<PathBuf>,

    /// User id attached to records pushed to a remote
    #[arg(long, global = true, env = "HIGHLIGHT_NOTES_USER")]
    user: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Highlight a char span of the page body and store it
    Anchor {
        html: PathBuf,
        #[arg(long)]
        url: String,
        #[arg(long)]
        start: usize,
        #[arg(long)]
        end: usize,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// Also push the new highlight to this remote directory
        #[arg(long)]
        remote: Option<PathBuf>,
    },
    /// Show where each stored highlight lands in the page
    Resolve {
        html: PathBuf,
        #[arg(long)]
        url: String,
    },
    /// Print the page with every resolvable highlight drawn in
    Render {
        html: PathBuf,
        #[arg(long)]
        url: String,
    },
    /// List stored highlights for a page
    List {
        #[arg(long)]
        url: String,
    },
    /// Change the color or note of a stored highlight
    Edit {
        #[arg(long)]
        url: String,
        id: String,
        #[arg(long)]
        color: Option<String>,
        /// New note; an empty string clears it
        #[arg(long)]
        note: Option<String>,
    },
    /// Delete a stored highlight
    Delete {
        #[arg(long)]
        url: String,
        id: String,
        #[arg(long)]
        remote: Option<PathBuf>,
    },
    /// Replay queued changes against a remote directory and pull its records
    Sync {
        #[arg(long)]
        url: String,
        #[arg(long)]
        remote: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    log::debug!("Config path: {}", config_path.display());
    let mut config = Config::load_or_default(&config_path)?;
    if let Some(store) = cli.store {
        config.storage.store_path = store;
    }
    log::debug!("Store path: {}", config.storage.store_path.display());
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&config.storage.store_path));
    let repo = HighlightRepository::new(store.clone());
    let user = cli.user.as_deref();

    match cli.command {
        Command::Anchor {
            html,
            url,
            start,
            end,
            color,
            note,
            remote,
        } => {
            let doc = read_page(&html).await?;
            let range = char_range(&doc, start, end)?;
            let mut highlighter = Highlighter::new(doc, url, repo, config.clone());
            if let Some(dir) = remote {
                highlighter = highlighter.with_syncer(syncer(&store, &config, dir, user));
            }
            let Some(anchor) = highlighter
                .create(&range, color.as_deref(), note.as_deref())
                .await?
            else {
                bail!("Selection {start}..{end} contains no text");
            };
            println!("{}", serde_json::to_string_pretty(&anchor)?);
        }
        Command::Resolve { html, url } => {
            let doc = read_page(&html).await?;
            for anchor in repo.load(&url).await? {
                let (span, status) = match resolve(&doc, doc.body(), &anchor, &config.anchoring) {
                    Resolved::Found(resolution) => {
                        let end = resolution.start_offset + anchor.quote.chars().count();
                        let status = if resolution.verified { "verified" } else { "fallback" };
                        (format!("{}..{end}", resolution.start_offset), status)
                    }
                    Resolved::NotFound(_) => ("-".to_string(), "not-found"),
                };
                println!("{}\t{span}\t{status}\t{}", anchor.id, anchor.quote);
            }
        }
        Command::Render { html, url } => {
            let doc = read_page(&html).await?;
            let mut highlighter = Highlighter::new(doc, url, repo, config.clone());
            highlighter.load().await?;
            let report = highlighter.apply_all();
            for id in &report.missing {
                log::warn!("Highlight {id} could not be placed");
            }
            let doc = highlighter.document();
            println!("{}", to_html(doc, doc.root()));
        }
        Command::List { url } => {
            for anchor in repo.load(&url).await? {
                let note = anchor.note().unwrap_or("");
                println!("{}\t{}\t{}\t{note}", anchor.id, anchor.color, anchor.quote);
            }
        }
        Command::Edit {
            url,
            id,
            color,
            note,
        } => {
            let patch = AnchorPatch {
                color,
                note: note.map(|n| Some(n).filter(|n| !n.is_empty())),
            };
            let id = HighlightId::from(id);
            match repo.update(&url, &id, &patch).await? {
                Some(anchor) => println!("{}", serde_json::to_string_pretty(&anchor)?),
                None => bail!("No highlight {id} for {url}"),
            }
        }
        Command::Delete { url, id, remote } => {
            let id = HighlightId::from(id);
            if !repo.delete(&url, &id).await? {
                bail!("No highlight {id} for {url}");
            }
            if let Some(dir) = remote {
                syncer(&store, &config, dir, user).push_delete(&id).await?;
            }
            println!("Deleted {id}");
        }
        Command::Sync { url, remote } => {
            let syncer = syncer(&store, &config, remote, user);
            if syncer.queue().recover().await? {
                log::info!("Recovered an interrupted sync sweep");
            }
            let report = syncer.process_queue().await?;
            println!(
                "Replayed {} queued change(s), {} still pending",
                report.processed, report.remaining
            );
            if report.dropped > 0 {
                println!("Dropped {} unreadable queued change(s)", report.dropped);
            }
            let added = syncer
                .pull(&url, &repo)
                .await
                .with_context(|| format!("Failed to pull highlights for {url}"))?;
            println!("Pulled {added} new highlight(s)");
        }
    }
    Ok(())
}

fn syncer(
    store: &Arc<dyn KeyValueStore>,
    config: &Config,
    dir: PathBuf,
    user: Option<&str>,
) -> Syncer {
    let queue = SyncQueue::new(store.clone(), config.sync.batch_size);
    let syncer = Syncer::new(Arc::new(DirRemoteStore::new(dir)), queue);
    match user {
        Some(user) => syncer.with_user(user),
        None => syncer,
    }
}

async fn read_page(path: &Path) -> Result<Document> {
    let html = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Document::parse_html(&html))
}

/// The range covering chars `start..end` of the page body's text.
fn char_range(doc: &Document, start: usize, end: usize) -> Result<DomRange> {
    let index = TextIndex::build(doc, doc.body());
    if start >= end || end > index.char_len() {
        bail!(
            "Span {start}..{end} is outside the page text ({} chars)",
            index.char_len()
        );
    }
    match (
        index.locate(start, Affinity::Start),
        index.locate(end, Affinity::End),
    ) {
        (Some(start), Some(end)) => Ok(DomRange::new(start, end)),
        _ => bail!("Span {start}..{end} does not map onto the page text"),
    }
}
