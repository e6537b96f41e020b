//! `iavl-snapshot create|apply`: a thin CLI surface over `iavl-snapshot`.
//! This binary only wires flags to library calls and reports a single-line
//! error to stderr on failure.

use {
    clap::{Parser, Subcommand},
    iavl_storage::FileStorage,
    iavl_tree::{Tree, TreeConfig},
    std::{
        path::{Path, PathBuf},
        process::ExitCode,
    },
};

#[derive(Parser)]
#[command(name = "iavl-snapshot", about = "Create or apply a versioned IAVL+ tree snapshot")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serialize a tree version to a snapshot directory.
    Create {
        #[arg(long)]
        db_dir: PathBuf,
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        version: u32,
        #[arg(long, default_value_t = iavl_snapshot::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// Restore a version from a snapshot directory into a store.
    Apply {
        #[arg(long)]
        db_dir: PathBuf,
        #[arg(long)]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Create { db_dir, dir, version, chunk_size } => {
            let tree = open_tree(&db_dir)?;
            iavl_snapshot::create(&tree, &dir, version, chunk_size)?;
        },
        Command::Apply { db_dir, dir } => {
            let mut tree = open_tree(&db_dir)?;
            iavl_snapshot::apply(&mut tree, &dir)?;
            tree.storage().save()?;
        },
    }
    Ok(())
}

fn store_path(db_dir: &Path) -> PathBuf {
    db_dir.join("store.db")
}

fn open_tree(db_dir: &Path) -> anyhow::Result<Tree<FileStorage>> {
    std::fs::create_dir_all(db_dir)?;
    let storage = FileStorage::open(store_path(db_dir))?;
    Ok(Tree::new(storage, TreeConfig::default())?)
}
