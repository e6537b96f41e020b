//! The single-writer versioned session over the AVL+ tree.

use {
    crate::{
        avl,
        config::TreeConfig,
        node::{CompactNode, Node},
        proof::{self, ExistenceProof, NonExistenceProof},
        store::{RootHash, Store},
    },
    iavl_storage::Version,
    iavl_types::{pack, unpack, Hash, Storage, TreeError, TreeResult},
    serde::{de::DeserializeOwned, Serialize},
    tracing::warn,
};

/// Coordinates transactions, version advancement, pruning, and proofs over
/// a [`Store`]. Caches the current root in memory so reads don't have to
/// re-fetch it from storage on every call.
pub struct Tree<S> {
    store: Store<S>,
    root: Option<Node>,
}

impl<S: Storage> Tree<S> {
    /// Opens a tree over `base`, picking up the latest version already
    /// recorded there (or starting empty, for a fresh backend).
    pub fn new(base: S, config: TreeConfig) -> TreeResult<Self> {
        let store = Store::new(base, config)?;
        let mut tree = Self { store, root: None };
        tree.reload_root()?;
        Ok(tree)
    }

    fn reload_root(&mut self) -> TreeResult<()> {
        let version = self.store.current_version();
        self.root = match self.store.get_version(version)?.flatten() {
            Some(hash) => Some(self.store.get_node(hash)?),
            None => None,
        };
        Ok(())
    }

    pub fn current_version(&self) -> Version {
        self.store.current_version()
    }

    /// The backing storage, for callers (the CLI) that need to flush a
    /// file-backed store to disk themselves after a mutation.
    pub fn storage(&self) -> &S {
        self.store.base()
    }

    pub fn root_hash(&self) -> Option<Hash> {
        self.root.as_ref().map(Node::hash)
    }

    pub fn root_hash_at(&self, version: Version) -> TreeResult<RootHash> {
        self.store.get_version(version)?.ok_or(TreeError::UnknownVersion(version))
    }

    pub fn contains_version(&self, version: Version) -> bool {
        self.store.contains_version(version)
    }

    pub fn list_versions(&self) -> TreeResult<Vec<Version>> {
        self.store.list_versions()
    }

    /// Reachable-node count in storage (supplemented diagnostic).
    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    pub fn orphan_count(&self) -> usize {
        self.store.orphan_count()
    }

    /// Height of the current root, `0` for an empty tree (supplemented
    /// diagnostic; the field already exists on every Branch, just never
    /// surfaced at the facade).
    pub fn height(&self) -> u32 {
        self.root.as_ref().map_or(0, Node::height)
    }

    fn in_transaction<T>(&mut self, body: impl FnOnce(&mut Self, Version) -> TreeResult<T>) -> TreeResult<T> {
        let version = self.store.start_transaction();
        match body(self, version) {
            Ok(value) => {
                self.store.commit_transaction()?;
                Ok(value)
            },
            Err(err) => {
                self.store.revert_transaction()?;
                Err(err)
            },
        }
    }

    /// `insert(k, v)`. Rejects a falsy (empty) value, checked on the
    /// caller-supplied value itself: every msgpack encoding of `packed`
    /// carries at least a one-byte header, so checking post-pack emptiness
    /// would never reject anything.
    pub fn insert<V: Serialize + AsRef<[u8]>>(&mut self, key: impl Into<Vec<u8>>, value: &V) -> TreeResult<()> {
        if value.as_ref().is_empty() {
            return Err(TreeError::EmptyValue);
        }
        let key = key.into();
        let packed = pack(value)?;

        self.in_transaction(|this, version| {
            let mut root = match this.root.take() {
                Some(node) => avl::insert(&mut this.store, node, &key, packed)?,
                None => Node::leaf(key.clone(), packed),
            };
            avl::persist(&mut this.store, &mut root, version)?;
            this.store.put_version(version, Some(root.hash()));
            this.root = Some(root);
            Ok(())
        })
    }

    /// `remove(k)`. A no-op on an absent key, except that it still advances
    /// the version and re-records the (unchanged) root hash.
    pub fn remove(&mut self, key: &[u8]) -> TreeResult<()> {
        let key = key.to_vec();

        self.in_transaction(|this, version| {
            let mut new_root = match this.root.take() {
                Some(root) => avl::remove(&mut this.store, root, &key, version)?,
                None => None,
            };
            if let Some(node) = new_root.as_mut() {
                avl::persist(&mut this.store, node, version)?;
            }
            this.store.put_version(version, new_root.as_ref().map(Node::hash));
            this.root = new_root;
            Ok(())
        })
    }

    pub fn get<V: DeserializeOwned>(&self, key: &[u8]) -> TreeResult<Option<V>> {
        let Some(root) = &self.root else {
            return Ok(None);
        };
        match avl::find(&self.store, root, key)? {
            Some((value, _version)) => Ok(Some(unpack(&value)?)),
            None => Ok(None),
        }
    }

    pub fn has(&self, key: &[u8]) -> TreeResult<bool> {
        let Some(root) = &self.root else {
            return Ok(false);
        };
        Ok(avl::find(&self.store, root, key)?.is_some())
    }

    /// In-order `(key, value)` pairs of the current version (supplemented
    /// diagnostic; the core algorithms already name in-order traversal as a
    /// primitive, this is just its public, typed read path).
    pub fn iter<V: DeserializeOwned>(&self) -> TreeResult<Vec<(Vec<u8>, V)>> {
        let Some(root) = &self.root else {
            return Ok(vec![]);
        };
        let mut raw = Vec::new();
        avl::in_order(&self.store, root, &mut raw)?;
        raw.into_iter().map(|(k, v)| Ok((k, unpack(&v)?))).collect()
    }

    /// `prune(toV, fromV=1)`.
    pub fn prune(&mut self, to_version: Version) -> TreeResult<()> {
        self.prune_range(1, to_version)
    }

    pub fn prune_range(&mut self, from_version: Version, to_version: Version) -> TreeResult<()> {
        self.store.prune(from_version, to_version)
    }

    pub fn get_proof(&self, key: &[u8]) -> TreeResult<ExistenceProof> {
        let root = self.root.as_ref().ok_or(TreeError::KeyNotFound)?;
        proof::build_existence_proof(&self.store, root, key)
    }

    pub fn verify_proof<V: Serialize>(&self, existence_proof: &ExistenceProof, key: &[u8], value: &V) -> TreeResult<()> {
        let root_hash = self.root_hash().ok_or(TreeError::ProofRootMismatch)?;
        let packed = pack(value)?;
        let result = proof::verify_existence(existence_proof, key, &packed, root_hash);
        if let Err(err) = &result {
            warn!(?err, key = %String::from_utf8_lossy(key), "existence proof failed to verify");
        }
        result
    }

    pub fn get_non_existence_proof(&self, key: &[u8]) -> TreeResult<NonExistenceProof> {
        proof::build_non_existence_proof(&self.store, self.root.as_ref(), key)
    }

    pub fn verify_non_existence_proof(&self, non_existence_proof: &NonExistenceProof, key: &[u8]) -> TreeResult<()> {
        let result = proof::verify_non_existence(non_existence_proof, key, self.root_hash());
        if let Err(err) = &result {
            warn!(?err, key = %String::from_utf8_lossy(key), "non-existence proof failed to verify");
        }
        result
    }

    // ----------------------------- snapshot hooks -----------------------------
    // `crates/snapshot` drives `createSnapshot`/`applySnapshot` against this
    // narrow surface, keeping the chunking/descriptor format out of this crate.

    pub fn load_node(&self, hash: Hash) -> TreeResult<Node> {
        self.store.get_node(hash)
    }

    /// Writes one version's root and node set exactly as recorded in a
    /// snapshot, preserving each node's original version so hashes come out
    /// identical. Refreshes the cached root if `version` becomes the
    /// tree's current version.
    pub fn restore_snapshot_version(
        &mut self,
        version: Version,
        root: RootHash,
        nodes: impl IntoIterator<Item = CompactNode>,
    ) -> TreeResult<()> {
        self.store.restore_version(version, root, |store| {
            for compact in nodes {
                store.put_compact_node(compact)?;
            }
            Ok(())
        })?;

        if version == self.store.current_version() {
            self.reload_root()?;
        }
        Ok(())
    }
}

impl<S: Storage + Clone> Clone for Tree<S> {
    /// A fresh store handle (independent transaction stack, independent
    /// in-memory cache) over the same durable backing store.
    fn clone(&self) -> Self {
        Self { store: self.store.share(), root: self.root.clone() }
    }
}
