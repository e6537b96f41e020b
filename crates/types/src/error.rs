use {crate::Hash, std::io};

/// All errors surfaced by the store, the tree, and the snapshot driver.
///
/// Variants are grouped into four kinds: precondition violations,
/// corruption, integrity failures (proof verification), and external I/O.
/// Keeping them in one enum lets every layer propagate with `?` instead of
/// defining a private error per crate.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    // ---------------------------- precondition violations ----------------------------
    #[error("cannot insert a falsy (empty) value")]
    EmptyValue,

    #[error("commitTransaction called with no active transaction")]
    CommitWithoutTransaction,

    #[error("revertTransaction called with no active transaction")]
    RevertWithoutTransaction,

    #[error("snapshot create: version {0} has no recorded root hash")]
    UnknownVersion(u32),

    #[error("snapshot apply: version {0} already exists in the destination store")]
    VersionAlreadyExists(u32),

    #[error("key does not exist, cannot prove non-existence of a present key")]
    KeyExists,

    #[error("key not found, cannot build a membership proof for an absent key")]
    KeyNotFound,

    #[error("prune range [{from}, {to}] invalid for current version {current}")]
    InvalidPruneRange { from: u32, to: u32, current: u32 },

    // --------------------------------- corruption ---------------------------------
    #[error("node with hash {0} referenced but not found in the nodes table")]
    MissingNode(Hash),

    #[error("malformed snapshot descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("unknown snapshot format: {0}")]
    UnknownSnapshotFormat(String),

    #[error("a single node's compact form ({0} bytes) exceeds the chunk size ({1} bytes)")]
    NodeExceedsChunkSize(usize, usize),

    // ------------------------------- integrity failure -------------------------------
    #[error("proof verification failed: key mismatch")]
    ProofKeyMismatch,

    #[error("proof verification failed: value mismatch")]
    ProofValueMismatch,

    #[error("proof verification failed: sibling-hash pair has neither side present")]
    ProofEmptySiblingPair,

    #[error("proof verification failed: recomputed hash does not match the root hash")]
    ProofRootMismatch,

    // ------------------------------- external I/O -------------------------------
    #[error("storage backend error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(String),
}

pub type TreeResult<T> = Result<T, TreeError>;
