//! Serializes a full tree version to a directory as content-addressed
//! chunks plus a JSON descriptor, and restores a version from that
//! directory into a (possibly different) store.

use {
    iavl_storage::Version,
    iavl_tree::{CompactNode, Tree},
    iavl_types::{pack, unpack, Hash, Storage, TreeError, TreeResult},
    md5::{Digest, Md5},
    serde::{Deserialize, Serialize},
    std::{fs, path::Path},
    tracing::{debug, info},
};

/// The only descriptor format this crate knows how to write or read.
const FORMAT: &str = "iavl-v1";

/// Default chunk size (also the CLI's default flag value) when a caller
/// doesn't need a different one.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct Descriptor {
    version: Version,
    #[serde(rename = "rootHash")]
    root_hash: Option<String>,
    format: String,
    timestamp: u64,
    chunks: Vec<String>,
}

/// `createSnapshot(version, chunkSize)`: resets `dir` and writes the
/// descriptor plus one file per chunk, filename = lowercase MD5 hex of the
/// chunk's packed content.
pub fn create<S: Storage>(tree: &Tree<S>, dir: &Path, version: Version, chunk_size: usize) -> TreeResult<()> {
    let root = tree.root_hash_at(version)?;

    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;

    let mut chunks = Vec::new();
    let mut current: Vec<CompactNode> = Vec::new();

    if let Some(root_hash) = root {
        collect_preorder(tree, root_hash, &mut |node| append_node(&mut chunks, &mut current, node, chunk_size, dir))?;
    }
    if !current.is_empty() {
        flush_chunk(&mut chunks, &mut current, dir)?;
    }

    let descriptor = Descriptor {
        version,
        root_hash: root.map(|h| h.to_base64()),
        format: FORMAT.to_string(),
        timestamp: now_unix_seconds(),
        chunks,
    };
    let json = serde_json::to_vec_pretty(&descriptor).map_err(|err| TreeError::Codec(err.to_string()))?;
    fs::write(dir.join("snapshot.json"), json)?;

    info!(version, chunks = descriptor.chunks.len(), dir = %dir.display(), "wrote snapshot");
    Ok(())
}

/// `applySnapshot(dir)`: rejects an unknown descriptor format or a
/// destination that already has `descriptor.version`, then rebuilds every
/// node at its originally recorded version.
pub fn apply<S: Storage>(tree: &mut Tree<S>, dir: &Path) -> TreeResult<()> {
    let bytes = fs::read(dir.join("snapshot.json"))?;
    let descriptor: Descriptor =
        serde_json::from_slice(&bytes).map_err(|err| TreeError::MalformedDescriptor(err.to_string()))?;

    if descriptor.format != FORMAT {
        return Err(TreeError::UnknownSnapshotFormat(descriptor.format));
    }
    if tree.contains_version(descriptor.version) {
        return Err(TreeError::VersionAlreadyExists(descriptor.version));
    }

    let root_hash = descriptor
        .root_hash
        .as_deref()
        .map(Hash::from_base64)
        .transpose()
        .map_err(|err| TreeError::MalformedDescriptor(err.to_string()))?;

    let mut nodes = Vec::new();
    for chunk_hash in &descriptor.chunks {
        let bytes = fs::read(dir.join(chunk_hash))?;
        let compacts: Vec<CompactNode> = unpack(&bytes)?;
        debug!(chunk_hash, nodes = compacts.len(), "read chunk");
        nodes.extend(compacts);
    }

    tree.restore_snapshot_version(descriptor.version, root_hash, nodes)?;
    info!(version = descriptor.version, dir = %dir.display(), "applied snapshot");
    Ok(())
}

fn collect_preorder<S, F>(tree: &Tree<S>, hash: Hash, visit: &mut F) -> TreeResult<()>
where
    S: Storage,
    F: FnMut(CompactNode) -> TreeResult<()>,
{
    let node = tree.load_node(hash)?;
    let children = node.child_hashes();
    visit(node.to_compact())?;

    if let Some((left, right)) = children {
        collect_preorder(tree, left, visit)?;
        collect_preorder(tree, right, visit)?;
    }
    Ok(())
}

fn append_node(
    chunks: &mut Vec<String>,
    current: &mut Vec<CompactNode>,
    node: CompactNode,
    chunk_size: usize,
    dir: &Path,
) -> TreeResult<()> {
    let mut tentative = current.clone();
    tentative.push(node.clone());
    let packed = pack(&tentative)?;

    if packed.len() <= chunk_size {
        *current = tentative;
        return Ok(());
    }

    if current.is_empty() {
        let alone = pack(&vec![node])?;
        return Err(TreeError::NodeExceedsChunkSize(alone.len(), chunk_size));
    }

    flush_chunk(chunks, current, dir)?;
    current.push(node);
    Ok(())
}

fn flush_chunk(chunks: &mut Vec<String>, current: &mut Vec<CompactNode>, dir: &Path) -> TreeResult<()> {
    let packed = pack(current)?;
    let hash = md5_hex(&packed);
    fs::write(dir.join(&hash), &packed)?;
    chunks.push(hash);
    current.clear();
    Ok(())
}

fn md5_hex(bytes: &[u8]) -> String {
    Md5::digest(bytes).iter().map(|byte| format!("{byte:02x}")).collect()
}

fn now_unix_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use {super::*, iavl_storage::MemStorage, iavl_tree::TreeConfig, tempfile::tempdir};

    fn tree() -> Tree<MemStorage> {
        Tree::new(MemStorage::new(), TreeConfig::default()).unwrap()
    }

    #[test]
    fn create_then_apply_round_trips_root_hash() {
        let mut source = tree();
        for (k, v) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")] {
            source.insert(k.as_bytes().to_vec(), &v.to_string()).unwrap();
        }
        let version = source.current_version();
        let root_hash = source.root_hash();

        let dir = tempdir().unwrap();
        create(&source, dir.path(), version, DEFAULT_CHUNK_SIZE).unwrap();

        let mut destination = tree();
        apply(&mut destination, dir.path()).unwrap();

        assert_eq!(destination.current_version(), version);
        assert_eq!(destination.root_hash(), root_hash);
        assert_eq!(destination.get::<String>(b"c").unwrap(), Some("3".to_string()));
    }

    #[test]
    fn create_on_empty_tree_produces_no_chunks() {
        let mut source = tree();
        source.remove(b"anything").unwrap(); // records an empty-root version
        let version = source.current_version();

        let dir = tempdir().unwrap();
        create(&source, dir.path(), version, DEFAULT_CHUNK_SIZE).unwrap();

        let descriptor_bytes = fs::read(dir.path().join("snapshot.json")).unwrap();
        let descriptor: Descriptor = serde_json::from_slice(&descriptor_bytes).unwrap();
        assert!(descriptor.chunks.is_empty());
        assert!(descriptor.root_hash.is_none());
    }

    #[test]
    fn create_fails_for_unknown_version() {
        let source = tree();
        let dir = tempdir().unwrap();
        assert!(matches!(create(&source, dir.path(), 99, DEFAULT_CHUNK_SIZE), Err(TreeError::UnknownVersion(99))));
    }

    #[test]
    fn apply_rejects_existing_version() {
        let mut source = tree();
        source.insert(b"a".to_vec(), &"1".to_string()).unwrap();
        let version = source.current_version();

        let dir = tempdir().unwrap();
        create(&source, dir.path(), version, DEFAULT_CHUNK_SIZE).unwrap();

        let mut destination = tree();
        destination.insert(b"a".to_vec(), &"1".to_string()).unwrap(); // same version already exists there too
        assert!(matches!(apply(&mut destination, dir.path()), Err(TreeError::VersionAlreadyExists(_))));
    }

    #[test]
    fn apply_rejects_unknown_format() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        let descriptor = Descriptor {
            version: 1,
            root_hash: None,
            format: "something-else".to_string(),
            timestamp: 0,
            chunks: vec![],
        };
        fs::write(dir.path().join("snapshot.json"), serde_json::to_vec(&descriptor).unwrap()).unwrap();

        let mut destination = tree();
        assert!(matches!(apply(&mut destination, dir.path()), Err(TreeError::UnknownSnapshotFormat(_))));
    }

    #[test]
    fn oversized_single_node_is_fatal() {
        let mut source = tree();
        source.insert(b"a".to_vec(), &"1".to_string()).unwrap();
        let version = source.current_version();

        let dir = tempdir().unwrap();
        assert!(matches!(create(&source, dir.path(), version, 1), Err(TreeError::NodeExceedsChunkSize(_, 1))));
    }
}
