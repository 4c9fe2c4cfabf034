//! notetree - Inspect and reorganize a note tree from the command line.
//!
//! Usage:
//!   notetree show                     Print the tree
//!   notetree create note --in KEY     Create a note next to KEY
//!   notetree rename KEY NAME          Rename a node
//!   notetree delete KEY               Delete a node and its subtree
//!   notetree move KEY [--to DIR]      Drag a node into DIR (or the root)
//!   notetree link KEY                 Print a shareable link to a note
//!
//! The tree lives in a JSON file (`--tree`, default `notes.json`) holding the
//! nested root nodes. Every change goes through the same optimistic
//! lifecycle the explorer uses, against an in-memory server seeded from the
//! file; the server's copy is written back afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use itertools::Itertools;
use tracing_subscriber::EnvFilter;

use notetree_core::{ExplorerConfig, FailurePolicy, Node, NodeKey, NodeKind, TreeNode, TreeStore};
use notetree_dnd::{DndError, DragCoordinator, DropOutcome, Point, Rect};
use notetree_ops::{Lifecycle, LifecycleEvent, MemoryRemote, NameEditor, copy_link};

const ROW_HEIGHT: f32 = 20.0;
const PANEL_WIDTH: f32 = 240.0;

#[derive(Parser)]
#[command(
    name = "notetree",
    version,
    about = "Inspect and reorganize a note tree",
    long_about = "notetree edits a tree of notes and directories stored as JSON.\n\n\
                  Changes are applied locally first and then persisted, exactly \
                  as the explorer does it. Set NOTETREE_LOG=debug to trace them."
)]
struct Cli {
    /// Tree file (JSON array of root nodes)
    #[arg(short, long, default_value = "notes.json", global = true)]
    tree: PathBuf,

    /// Explorer configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// What to do with local changes the server rejects (keep-local, revert)
    #[arg(long, global = true)]
    policy: Option<FailurePolicy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the tree
    Show {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a note or directory
    Create {
        /// note or directory
        kind: NodeKind,

        /// Create inside this directory, or next to this note
        #[arg(long = "in")]
        anchor: Option<NodeKey>,
    },

    /// Rename a node
    Rename {
        key: NodeKey,
        name: String,
    },

    /// Delete a node and everything under it
    Delete {
        key: NodeKey,
    },

    /// Drag a node into a directory
    Move {
        key: NodeKey,

        /// Target directory (defaults to the root)
        #[arg(long)]
        to: Option<NodeKey>,
    },

    /// Print a shareable link to a note
    Link {
        key: NodeKey,

        /// Location the link is relative to
        #[arg(long, default_value = "http://localhost:3000/notes")]
        base: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let output = runtime.block_on(run(cli))?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("NOTETREE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Execute one command and return what to print.
async fn run(cli: Cli) -> Result<String> {
    let config = load_config(cli.config.as_deref(), cli.policy)?;
    let nodes = read_tree(&cli.tree)?;
    let remote = Arc::new(MemoryRemote::with_tree(nodes).context("Invalid tree file")?);

    let mut lifecycle = Lifecycle::new(Arc::clone(&remote), config);
    let mut store = TreeStore::new();
    lifecycle
        .load(&mut store)
        .await
        .context("Failed to load tree")?;

    let mut notice = None;
    match cli.command {
        Command::Show { format } => {
            return match format {
                OutputFormat::Text => Ok(render_tree(&store)),
                OutputFormat::Json => Ok(serde_json::to_string_pretty(&store.tree().to_nodes())?),
            };
        }
        Command::Link { key, base } => {
            let node = store
                .node(&key)
                .ok_or_else(|| eyre!("Unknown node: {key}"))?;
            return Ok(copy_link(&base, node)?);
        }
        Command::Create { kind, anchor } => {
            match kind {
                NodeKind::Note => lifecycle.create_note(&store, anchor.as_ref())?,
                NodeKind::Directory => lifecycle.create_directory(&store, anchor.as_ref())?,
            };
        }
        Command::Rename { key, name } => {
            let mut editor = NameEditor::begin(&store, &key)?;
            editor.set(name);
            if editor.commit(&mut lifecycle, &mut store)?.is_none() {
                notice = Some(format!("{key} already has that name"));
            }
        }
        Command::Delete { key } => {
            lifecycle.delete(&mut store, &key)?;
        }
        Command::Move { key, to } => {
            notice = drag(&mut lifecycle, &mut store, &key, to.as_ref())?;
        }
    }

    let events = lifecycle.settle(&mut store).await;
    for event in &events {
        match event {
            LifecycleEvent::Failed { request, error, .. } => {
                bail!("{} failed: {error}", request.request_type());
            }
            LifecycleEvent::Created { key, .. } => {
                notice = Some(format!("Created {key}"));
            }
            LifecycleEvent::Discarded { reason, .. } => {
                tracing::warn!(%reason, "server change could not be applied locally");
            }
            LifecycleEvent::Confirmed { .. } => {}
        }
    }

    write_tree(&cli.tree, &remote.snapshot())?;

    let tree = render_tree(&store);
    Ok(match notice {
        Some(notice) => format!("{notice}\n\n{tree}"),
        None => tree,
    })
}

fn load_config(path: Option<&Path>, policy: Option<FailurePolicy>) -> Result<ExplorerConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str::<ExplorerConfig>(&raw).context("Invalid config")?
        }
        None => ExplorerConfig::default(),
    };
    config
        .validate()
        .map_err(|reason| eyre!("Invalid config: {reason}"))?;
    if let Some(policy) = policy {
        config.failure_policy = policy;
    }
    Ok(config)
}

/// Read the tree file. A missing file is an empty tree.
fn read_tree(path: &Path) -> Result<Vec<TreeNode>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid tree file {}", path.display()))
}

fn write_tree(path: &Path, nodes: &[TreeNode]) -> Result<()> {
    let json = serde_json::to_string_pretty(nodes)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// One row per node, every directory open, children indented.
fn render_tree(store: &TreeStore) -> String {
    let tree = store.tree();
    if tree.is_empty() {
        return "(empty)".to_string();
    }

    let mut lines = Vec::with_capacity(tree.len());
    let mut stack = tree.roots().map(|node| (node, 0)).collect_vec();
    stack.reverse();
    while let Some((node, depth)) = stack.pop() {
        let marker = if node.is_directory() { "▾" } else { "•" };
        lines.push(format!(
            "{}{marker} {} [{}]",
            "  ".repeat(depth),
            node.name(),
            node.key()
        ));
        stack.extend(
            tree.children(Some(node.key()))
                .map(|child| (child, depth + 1))
                .collect_vec()
                .into_iter()
                .rev(),
        );
    }
    lines.into_iter().join("\n")
}

/// Lay the rows out top to bottom and register drop zones.
///
/// A directory's zone spans its own row and all of its descendants' rows.
/// The root zone covers the whole panel plus one empty row at the bottom.
/// Returns the keys in row order.
fn layout(store: &TreeStore, dnd: &mut DragCoordinator) -> Result<Vec<NodeKey>, DndError> {
    let tree = store.tree();
    let rows = tree
        .root_keys()
        .iter()
        .flat_map(|key| tree.subtree_keys(key))
        .collect_vec();

    let zones = dnd.zones_mut();
    zones.clear();
    zones.register_root(Rect::new(
        0.0,
        0.0,
        PANEL_WIDTH,
        (rows.len() + 1) as f32 * ROW_HEIGHT,
    ));
    for (row, key) in rows.iter().enumerate() {
        if !tree.get(key).is_some_and(Node::is_directory) {
            continue;
        }
        let span = tree.subtree_keys(key).len();
        zones.register_directory(
            tree,
            key,
            Rect::new(
                0.0,
                row as f32 * ROW_HEIGHT,
                PANEL_WIDTH,
                span as f32 * ROW_HEIGHT,
            ),
        )?;
    }
    Ok(rows)
}

fn row_center(row: usize) -> Point {
    Point::new(PANEL_WIDTH / 2.0, (row as f32 + 0.5) * ROW_HEIGHT)
}

/// Drag `key` from its row and release it over `to`'s row, or the empty row
/// below the tree.
fn drag(
    lifecycle: &mut Lifecycle<MemoryRemote>,
    store: &mut TreeStore,
    key: &NodeKey,
    to: Option<&NodeKey>,
) -> Result<Option<String>> {
    let mut dnd = DragCoordinator::new();
    let rows = layout(store, &mut dnd)?;
    let row_of = |target: &NodeKey| {
        rows.iter()
            .position(|k| k == target)
            .ok_or_else(|| eyre!("Unknown node: {target}"))
    };

    let release = match to {
        Some(dir) => {
            if !store.node(dir).is_some_and(Node::is_directory) {
                row_of(dir)?;
                return Err(DndError::NotADropTarget { key: dir.clone() }.into());
            }
            row_center(row_of(dir)?)
        }
        None => row_center(rows.len()),
    };

    let start = row_center(row_of(key)?);
    dnd.pointer_down(store, key, start)?;
    dnd.pointer_move(release)?;
    match dnd.pointer_up(release, lifecycle, store)? {
        DropOutcome::Moved { .. } => Ok(None),
        DropOutcome::SelfDrop { .. } => Ok(Some(format!("{key} is already there"))),
        DropOutcome::Rejected(err) => Err(err.into()),
        DropOutcome::Discarded => bail!("Released outside the tree"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn fixture() -> Vec<TreeNode> {
        vec![
            TreeNode::directory("d1", "A", None)
                .with_child(TreeNode::note("n1", "x", None))
                .with_child(TreeNode::directory("d2", "B", None)),
            TreeNode::note("n2", "y", None),
        ]
    }

    fn seeded() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.json");
        write_tree(&path, &fixture()).unwrap();
        (dir, path)
    }

    async fn invoke(path: &Path, args: &[&str]) -> Result<String> {
        let mut argv = vec!["notetree", "--tree", path.to_str().unwrap()];
        argv.extend_from_slice(args);
        run(Cli::try_parse_from(argv)?).await
    }

    fn parent_of(path: &Path, key: &str) -> Option<NodeKey> {
        let mut store = TreeStore::new();
        store.load(read_tree(path).unwrap()).unwrap();
        store
            .node(&NodeKey::new(key))
            .and_then(|node| node.parent_key().cloned())
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_tree() {
        let mut store = TreeStore::new();
        store.load(fixture()).unwrap();
        assert_eq!(
            render_tree(&store),
            "▾ A [d1]\n  • x [n1]\n  ▾ B [d2]\n• y [n2]"
        );
        assert_eq!(render_tree(&TreeStore::new()), "(empty)");
    }

    #[test]
    fn test_layout_nests_zones() {
        let mut store = TreeStore::new();
        store.load(fixture()).unwrap();
        let mut dnd = DragCoordinator::new();
        let rows = layout(&store, &mut dnd).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(dnd.zones().len(), 3);
        let over_n1 = dnd.zones().hit_test(row_center(1)).cloned();
        assert_eq!(
            over_n1.as_ref().and_then(|t| t.parent_key()),
            Some(&NodeKey::new("d1"))
        );
        let below = dnd.zones().hit_test(row_center(4)).cloned();
        assert_eq!(below.and_then(|t| t.parent_key().cloned()), None);
    }

    #[tokio::test]
    async fn test_move_writes_back() {
        let (_dir, path) = seeded();
        invoke(&path, &["move", "n2", "--to", "d2"]).await.unwrap();
        assert_eq!(parent_of(&path, "n2"), Some(NodeKey::new("d2")));

        invoke(&path, &["move", "n2"]).await.unwrap();
        assert_eq!(parent_of(&path, "n2"), None);
    }

    #[tokio::test]
    async fn test_move_into_note_fails() {
        let (_dir, path) = seeded();
        let err = invoke(&path, &["move", "d2", "--to", "n2"])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("drop targets"));
        assert_eq!(parent_of(&path, "d2"), Some(NodeKey::new("d1")));
    }

    #[tokio::test]
    async fn test_move_into_own_subtree_fails() {
        let (_dir, path) = seeded();
        assert!(invoke(&path, &["move", "d1", "--to", "d2"]).await.is_err());
    }

    #[tokio::test]
    async fn test_self_drop_is_reported() {
        let (_dir, path) = seeded();
        let output = invoke(&path, &["move", "n1", "--to", "d1"]).await.unwrap();
        assert!(output.starts_with("n1 is already there"));
    }

    #[tokio::test]
    async fn test_create_rename_delete() {
        let (_dir, path) = seeded();
        let output = invoke(&path, &["create", "note", "--in", "n1"]).await.unwrap();
        assert!(output.starts_with("Created note-1"));
        assert_eq!(parent_of(&path, "note-1"), Some(NodeKey::new("d1")));

        invoke(&path, &["rename", "n2", "Renamed"]).await.unwrap();
        let listing = invoke(&path, &["show"]).await.unwrap();
        assert!(listing.contains("• Renamed [n2]"));

        invoke(&path, &["delete", "d1"]).await.unwrap();
        let listing = invoke(&path, &["show"]).await.unwrap();
        assert_eq!(listing, "• Renamed [n2]");
    }

    #[tokio::test]
    async fn test_link() {
        let (_dir, path) = seeded();
        let link = invoke(&path, &["link", "n1", "--base", "https://notes.test/"])
            .await
            .unwrap();
        assert_eq!(link, "https://notes.test/n1");
        assert!(invoke(&path, &["link", "d1"]).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.json");
        assert_eq!(invoke(&path, &["show"]).await.unwrap(), "(empty)");
    }

    #[test]
    fn test_zero_debounce_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"content_debounce_ms": 0}"#).unwrap();
        let err = load_config(Some(&path), None).unwrap_err();
        assert!(err.to_string().contains("Content debounce must be greater than zero"));

        let config = load_config(None, Some(FailurePolicy::Revert)).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Revert);
    }
}
