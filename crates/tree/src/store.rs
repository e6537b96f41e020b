use {
    crate::{
        config::TreeConfig,
        node::{branch_hash, leaf_hash, BranchNode, CompactNode, LeafNode, Node},
    },
    iavl_storage::{CacheStore, Map, MapKey, Set, Version},
    iavl_types::{Batch, Hash, Order, Storage, TreeError, TreeResult},
    tracing::{debug, trace},
};

/// A version's root: `None` denotes a committed-but-empty tree, distinct from
/// the version simply not existing at all.
pub type RootHash = Option<Hash>;

/// Wraps a backing `Storage` with the three logical tables (versions, nodes,
/// orphans), a nested-transaction stack, and the current version counter.
///
/// Nested transactions are modeled by keeping one cumulative `CacheStore`
/// overlay (so reads always see every write made so far, including by inner
/// frames) plus a stack of pre-frame snapshots of that overlay's pending
/// batch; reverting a frame restores its snapshot, discarding only that
/// frame's writes (and everything opened after it).
pub struct Store<S> {
    overlay: CacheStore<S>,
    snapshots: Vec<Batch>,
    current_version: Version,
    config: TreeConfig,
}

impl<S: Storage> Store<S> {
    /// Opens a store over `base`, picking up wherever a prior process left
    /// off: `current_version` is the largest version already recorded in
    /// the versions table, or `0` for a brand-new store.
    pub fn new(base: S, config: TreeConfig) -> TreeResult<Self> {
        let mut store = Self { overlay: CacheStore::new(base, None), snapshots: Vec::new(), current_version: 0, config };
        store.current_version = store.list_versions()?.into_iter().max().unwrap_or(0);
        Ok(store)
    }

    pub fn current_version(&self) -> Version {
        self.current_version
    }

    /// The backing storage, for callers that need to flush it themselves
    /// (e.g. a file-backed `Storage` with an explicit `save()`).
    pub fn base(&self) -> &S {
        self.overlay.base()
    }

    pub fn in_transaction(&self) -> bool {
        !self.snapshots.is_empty()
    }

    // ------------------------------- transactions -------------------------------

    /// `startTransaction`: on the outermost call, advances the version
    /// counter. Always pushes a new undo frame.
    pub fn start_transaction(&mut self) -> Version {
        if self.snapshots.is_empty() {
            self.current_version += 1;
            debug!(version = self.current_version, "advancing version for new transaction");
        }
        self.snapshots.push(self.overlay.pending().clone());
        self.current_version
    }

    /// `commitTransaction`: pops one frame; only the outermost commit
    /// flushes the underlying KV transaction.
    pub fn commit_transaction(&mut self) -> TreeResult<()> {
        if self.snapshots.is_empty() {
            return Err(TreeError::CommitWithoutTransaction);
        }
        self.snapshots.pop();
        if self.snapshots.is_empty() {
            debug!(version = self.current_version, "committing outermost transaction");
            self.overlay.commit();
        }
        Ok(())
    }

    /// `revertTransaction`: pops a frame and restores its pre-frame
    /// snapshot. Reverting the outermost frame also rolls the version
    /// counter back.
    pub fn revert_transaction(&mut self) -> TreeResult<()> {
        let Some(snapshot) = self.snapshots.pop() else {
            return Err(TreeError::RevertWithoutTransaction);
        };
        self.overlay.replace_pending(snapshot);
        if self.snapshots.is_empty() {
            debug!(version = self.current_version, "reverting outermost transaction");
            self.current_version -= 1;
        }
        Ok(())
    }

    /// Run `body` inside its own transaction, committing on success and
    /// reverting on failure. This is `transaction(body)`.
    pub fn transaction<T>(&mut self, body: impl FnOnce(&mut Self) -> TreeResult<T>) -> TreeResult<T> {
        self.start_transaction();
        match body(self) {
            Ok(value) => {
                self.commit_transaction()?;
                Ok(value)
            },
            Err(err) => {
                self.revert_transaction()?;
                Err(err)
            },
        }
    }

    // --------------------------------- versions ---------------------------------

    fn version_key(&self, version: Version) -> Vec<u8> {
        iavl_storage::prefixed_key(self.config.version_namespace.as_bytes(), &version.encode())
    }

    /// `putVersion(V, root?)`. An empty root is stored as zero-length bytes.
    pub fn put_version(&mut self, version: Version, root: RootHash) {
        let bytes = root.map(Hash::to_vec).unwrap_or_default();
        self.overlay.write(&self.version_key(version), &bytes);
    }

    /// `getVersion(V)`. `Ok(None)` means the version was never recorded;
    /// `Ok(Some(None))` means it was recorded with an empty (absent) root.
    pub fn get_version(&self, version: Version) -> TreeResult<Option<RootHash>> {
        match self.overlay.read(&self.version_key(version)) {
            None => Ok(None),
            Some(bytes) if bytes.is_empty() => Ok(Some(None)),
            Some(bytes) => Ok(Some(Some(Hash::try_from(bytes).map_err(|err| {
                TreeError::MalformedDescriptor(err.to_string())
            })?))),
        }
    }

    pub fn contains_version(&self, version: Version) -> bool {
        self.overlay.has(&self.version_key(version))
    }

    /// All recorded versions, ascending. Used by the CLI and tests.
    pub fn list_versions(&self) -> TreeResult<Vec<Version>> {
        let (start, end) = iavl_storage::namespace_bounds(self.config.version_namespace.as_bytes());
        let end_opt = if end.is_empty() { None } else { Some(end.as_slice()) };
        let prefix_len = self.config.version_namespace.len();
        self.overlay
            .scan(Some(&start), end_opt, Order::Ascending)
            .map(|(key, _)| {
                Version::decode(&key[prefix_len..]).map_err(|_| {
                    TreeError::MalformedDescriptor("bad version key".into())
                })
            })
            .collect()
    }

    /// The largest recorded version strictly below `version`, or `0` if
    /// none (`prevV` in the pruning algorithm below).
    pub fn last_version_before(&self, version: Version) -> TreeResult<Version> {
        Ok(self.list_versions()?.into_iter().filter(|v| *v < version).max().unwrap_or(0))
    }

    // ----------------------------------- nodes -----------------------------------

    pub fn put_node(&mut self, hash: Hash, node: &Node) -> TreeResult<()> {
        trace!(hash = %hash, "saving node");
        nodes_map(&self.config).save(&mut self.overlay, &hash, &node.to_compact())
    }

    pub fn get_node(&self, hash: Hash) -> TreeResult<Node> {
        let compact =
            nodes_map(&self.config).load(&self.overlay, &hash).map_err(|_| TreeError::MissingNode(hash))?;
        Ok(from_compact(hash, compact))
    }

    pub fn remove_node(&mut self, hash: Hash) {
        trace!(hash = %hash, "removing node");
        nodes_map(&self.config).remove(&mut self.overlay, &hash);
    }

    pub fn node_count(&self) -> usize {
        nodes_map(&self.config).count(&self.overlay)
    }

    /// Rebuild and persist a node from its compact form, preserving its
    /// recorded version so its hash comes out identical to the original.
    pub fn put_compact_node(&mut self, compact: CompactNode) -> TreeResult<Hash> {
        let hash = match &compact {
            CompactNode::Leaf(key, value, version) => leaf_hash(*version, key, value),
            CompactNode::Branch(_, version, _, _, left_hash, right_hash) => {
                branch_hash(*version, left_hash, right_hash)
            },
        };
        let node = from_compact(hash, compact);
        self.put_node(hash, &node)?;
        Ok(hash)
    }

    // ---------------------------------- orphans ----------------------------------

    /// `putOrphan(H, fromV, toV)`. `toV` is the last version in which the
    /// node at `H` was still live: `committingVersion - 1`.
    pub fn retire_node(&mut self, hash: Hash, from_version: Version, to_version: Version) {
        if from_version > to_version {
            trace!(hash = %hash, from_version, to_version, "node born and replaced within one version, deleting");
            self.remove_node(hash);
        } else {
            trace!(hash = %hash, from_version, to_version, "marking node as orphaned");
            orphans_set(&self.config).insert(&mut self.overlay, &(to_version, from_version, hash));
        }
    }

    pub fn orphan_count(&self) -> usize {
        orphans_set(&self.config).count(&self.overlay)
    }

    /// The orphan-driven pruning algorithm. Reclaims every node unreachable
    /// from any version outside `[from_version, to_version]` without
    /// walking the tree.
    pub fn prune(&mut self, from_version: Version, to_version: Version) -> TreeResult<()> {
        if from_version < 1 || to_version < from_version || to_version > self.current_version.saturating_sub(1) {
            return Err(TreeError::InvalidPruneRange {
                from: from_version,
                to: to_version,
                current: self.current_version,
            });
        }

        debug!(from_version, to_version, "pruning");
        let prev_version = self.last_version_before(from_version)?;

        // [u32be(fromV) inclusive, u32be(toV + 1) exclusive) on the leading
        // `toVersion` component covers exactly the orphans whose `toVersion`
        // lies in `[fromV, toV]`.
        let range_start = (from_version, 0, Hash::from_array([0u8; 32]));
        let range_end = (to_version + 1, 0, Hash::from_array([0u8; 32]));
        let orphans: Vec<(Version, Version, Hash)> = orphans_set(&self.config)
            .range(&self.overlay, Some(&range_start), Some(&range_end), Order::Ascending)
            .collect::<TreeResult<_>>()?;

        for (to_v, from_v, hash) in orphans {
            orphans_set(&self.config).remove(&mut self.overlay, &(to_v, from_v, hash));
            if prev_version < from_v {
                self.remove_node(hash);
            } else {
                orphans_set(&self.config).insert(&mut self.overlay, &(prev_version, from_v, hash));
            }
        }

        for version in from_version..=to_version {
            self.overlay.remove(&self.version_key(version));
        }

        Ok(())
    }

    /// Writes a snapshot's version and nodes outside the normal version-
    /// advancing transaction flow: `version` is whatever the descriptor
    /// says, not `current_version + 1`. Fails with
    /// `VersionAlreadyExists` if the destination already has that version.
    /// On success, `current_version` advances to `version` if it wasn't
    /// already ahead of it.
    pub fn restore_version(
        &mut self,
        version: Version,
        root: RootHash,
        body: impl FnOnce(&mut Self) -> TreeResult<()>,
    ) -> TreeResult<()> {
        if self.contains_version(version) {
            return Err(TreeError::VersionAlreadyExists(version));
        }

        self.snapshots.push(self.overlay.pending().clone());
        self.put_version(version, root);

        match body(self) {
            Ok(()) => {
                self.snapshots.pop();
                if self.snapshots.is_empty() {
                    self.overlay.commit();
                }
                self.current_version = self.current_version.max(version);
                Ok(())
            },
            Err(err) => {
                if let Some(snapshot) = self.snapshots.pop() {
                    self.overlay.replace_pending(snapshot);
                }
                Err(err)
            },
        }
    }

    /// Gives an independent `Store` handle over the same durable base but a
    /// fresh, empty transaction stack and cache, as `Tree::clone()` requires.
    pub fn share(&self) -> Self
    where
        S: Clone,
    {
        Self {
            overlay: CacheStore::new(self.overlay.base().clone(), None),
            snapshots: Vec::new(),
            current_version: self.current_version,
            config: self.config.clone(),
        }
    }
}

fn nodes_map(config: &TreeConfig) -> Map<'_, Hash, CompactNode> {
    Map::new(&config.node_namespace)
}

fn orphans_set(config: &TreeConfig) -> Set<'_, (Version, Version, Hash)> {
    Set::new(&config.orphan_namespace)
}

fn from_compact(hash: Hash, compact: CompactNode) -> Node {
    match compact {
        CompactNode::Leaf(key, value, version) => Node::Leaf(LeafNode::from_compact(hash, key, value, version)),
        CompactNode::Branch(key, version, left_height, right_height, left_hash, right_hash) => {
            Node::Branch(BranchNode::from_compact(hash, key, version, left_height, right_height, left_hash, right_hash))
        },
    }
}
