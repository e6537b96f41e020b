//! Existence and non-existence proof construction and verification.

use {
    crate::{
        avl::peek,
        node::{branch_hash, leaf_hash, Node},
        store::Store,
    },
    iavl_storage::Version,
    iavl_types::{Hash, Storage, TreeError, TreeResult},
    serde::{Deserialize, Serialize},
};

/// `(version, key, value)` for the leaf being proven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafTriple {
    pub version: Version,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// One Branch on the path from leaf to root: `(version, leftHash?, rightHash?)`.
/// Exactly one of `left`/`right` is present — the side the path did *not*
/// descend through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingTriple {
    pub version: Version,
    pub left: Option<Hash>,
    pub right: Option<Hash>,
}

/// A membership proof: the leaf plus its sibling path, child-to-root order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistenceProof {
    pub leaf: LeafTriple,
    pub path: Vec<SiblingTriple>,
}

/// A non-membership proof for `key`: existence proofs of its in-order
/// neighbors. At least one is present unless the tree is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonExistenceProof {
    pub key: Vec<u8>,
    pub left: Option<ExistenceProof>,
    pub right: Option<ExistenceProof>,
}

/// `getProof(key)`. Fails with `KeyNotFound` if `key` is absent.
pub fn build_existence_proof<S: Storage>(store: &Store<S>, root: &Node, key: &[u8]) -> TreeResult<ExistenceProof> {
    let (leaf, path) = walk(store, root, key)?;
    Ok(ExistenceProof { leaf, path })
}

fn walk<S: Storage>(store: &Store<S>, node: &Node, key: &[u8]) -> TreeResult<(LeafTriple, Vec<SiblingTriple>)> {
    match node {
        Node::Leaf(leaf) => {
            if leaf.key != key {
                return Err(TreeError::KeyNotFound);
            }
            Ok((LeafTriple { version: leaf.version, key: leaf.key.clone(), value: leaf.value.clone() }, vec![]))
        },
        Node::Branch(branch) => {
            if key < branch.key.as_slice() {
                let left = peek(store, &branch.left)?;
                let (leaf, mut path) = walk(store, &left, key)?;
                let right_hash = branch.right.hash().expect("right sibling must be persisted on a proven path");
                path.push(SiblingTriple { version: branch.version, left: None, right: Some(right_hash) });
                Ok((leaf, path))
            } else {
                let right = peek(store, &branch.right)?;
                let (leaf, mut path) = walk(store, &right, key)?;
                let left_hash = branch.left.hash().expect("left sibling must be persisted on a proven path");
                path.push(SiblingTriple { version: branch.version, left: Some(left_hash), right: None });
                Ok((leaf, path))
            }
        },
    }
}

/// Existence verification: recompute the root hash from the proof and
/// `value`, compare against `root_hash`. `value` must already be the
/// packed bytes, matching `leaf.value` byte-for-byte.
pub fn verify_existence(proof: &ExistenceProof, key: &[u8], value: &[u8], root_hash: Hash) -> TreeResult<()> {
    if proof.leaf.key != key {
        return Err(TreeError::ProofKeyMismatch);
    }
    if proof.leaf.value != value {
        return Err(TreeError::ProofValueMismatch);
    }

    let mut hash = leaf_hash(proof.leaf.version, key, value);
    for sibling in &proof.path {
        hash = match (sibling.left, sibling.right) {
            (Some(left), _) => branch_hash(sibling.version, &left, &hash),
            (_, Some(right)) => branch_hash(sibling.version, &hash, &right),
            (None, None) => return Err(TreeError::ProofEmptySiblingPair),
        };
    }

    if hash != root_hash {
        return Err(TreeError::ProofRootMismatch);
    }
    Ok(())
}

/// Non-existence verification: each present neighbor must independently
/// verify against `root_hash` and must lie on the correct side of `key`.
/// `root_hash` is `None` for an empty tree, the only case where both
/// neighbors may legitimately be absent.
pub fn verify_non_existence(proof: &NonExistenceProof, key: &[u8], root_hash: Option<Hash>) -> TreeResult<()> {
    if proof.key != key {
        return Err(TreeError::ProofKeyMismatch);
    }

    if proof.left.is_none() && proof.right.is_none() {
        return if root_hash.is_none() { Ok(()) } else { Err(TreeError::ProofRootMismatch) };
    }

    let root_hash = root_hash.ok_or(TreeError::ProofRootMismatch)?;

    if let Some(left) = &proof.left {
        verify_existence(left, &left.leaf.key, &left.leaf.value, root_hash)?;
        if left.leaf.key.as_slice() >= key {
            return Err(TreeError::ProofKeyMismatch);
        }
    }
    if let Some(right) = &proof.right {
        verify_existence(right, &right.leaf.key, &right.leaf.value, root_hash)?;
        if right.leaf.key.as_slice() <= key {
            return Err(TreeError::ProofKeyMismatch);
        }
    }
    Ok(())
}

/// `getNonExistenceProof(key)`. Fails with `KeyExists` if `key` is present.
/// `root` is `None` for an empty tree.
pub fn build_non_existence_proof<S: Storage>(
    store: &Store<S>,
    root: Option<&Node>,
    key: &[u8],
) -> TreeResult<NonExistenceProof> {
    let Some(root) = root else {
        return Ok(NonExistenceProof { key: key.to_vec(), left: None, right: None });
    };

    if crate::avl::find(store, root, key)?.is_some() {
        return Err(TreeError::KeyExists);
    }

    let left = left_neighbor(store, root, key, None)?
        .map(|neighbor_key| build_existence_proof(store, root, &neighbor_key))
        .transpose()?;
    let right = right_neighbor(store, root, key, None)?
        .map(|neighbor_key| build_existence_proof(store, root, &neighbor_key))
        .transpose()?;

    Ok(NonExistenceProof { key: key.to_vec(), left, right })
}

/// The largest key strictly less than `key`, or `None` if no such key
/// exists. `fallback` carries the last split key seen for which the
/// recursion went right (a descended split key is always a real, smaller
/// leaf key — useful if the chosen side turns out to overshoot).
fn left_neighbor<S: Storage>(
    store: &Store<S>,
    node: &Node,
    key: &[u8],
    fallback: Option<Vec<u8>>,
) -> TreeResult<Option<Vec<u8>>> {
    match node {
        Node::Leaf(leaf) => Ok(if leaf.key.as_slice() < key { Some(leaf.key.clone()) } else { fallback }),
        Node::Branch(branch) => {
            if key > branch.key.as_slice() {
                let right = peek(store, &branch.right)?;
                left_neighbor(store, &right, key, Some(branch.key.clone()))
            } else {
                let left = peek(store, &branch.left)?;
                left_neighbor(store, &left, key, fallback)
            }
        },
    }
}

/// The smallest key strictly greater than `key`, or `None` if no such key
/// exists. Symmetric to `left_neighbor`.
fn right_neighbor<S: Storage>(
    store: &Store<S>,
    node: &Node,
    key: &[u8],
    fallback: Option<Vec<u8>>,
) -> TreeResult<Option<Vec<u8>>> {
    match node {
        Node::Leaf(leaf) => Ok(if leaf.key.as_slice() > key { Some(leaf.key.clone()) } else { fallback }),
        Node::Branch(branch) => {
            if key < branch.key.as_slice() {
                let left = peek(store, &branch.left)?;
                right_neighbor(store, &left, key, Some(branch.key.clone()))
            } else {
                let right = peek(store, &branch.right)?;
                right_neighbor(store, &right, key, fallback)
            }
        },
    }
}

/// The mapping of an internal `ExistenceProof` onto a standard ICS23-style
/// binary proof format: SHA-256 leaf/inner hashing, fixed 32-byte children,
/// 4-byte fixed prefix length, child order `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalInnerOp {
    pub prefix: Vec<u8>,
    pub suffix: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalExistenceProof {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub leaf_prefix: Vec<u8>,
    pub path: Vec<ExternalInnerOp>,
}

pub fn to_external_spec(proof: &ExistenceProof) -> ExternalExistenceProof {
    let path = proof
        .path
        .iter()
        .map(|sibling| match (&sibling.left, &sibling.right) {
            (Some(left), None) => {
                let mut prefix = sibling.version.to_be_bytes().to_vec();
                prefix.extend_from_slice(left.as_bytes());
                ExternalInnerOp { prefix, suffix: vec![] }
            },
            (None, Some(right)) => ExternalInnerOp {
                prefix: sibling.version.to_be_bytes().to_vec(),
                suffix: right.to_vec(),
            },
            _ => unreachable!("an ExistenceProof's sibling triples always carry exactly one hash"),
        })
        .collect();

    ExternalExistenceProof {
        key: proof.leaf.key.clone(),
        value: proof.leaf.value.clone(),
        leaf_prefix: proof.leaf.version.to_be_bytes().to_vec(),
        path,
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{avl, config::TreeConfig, node::Node},
        iavl_storage::MemStorage,
    };

    fn build_tree() -> (Store<MemStorage>, Node) {
        let mut store = Store::new(MemStorage::new(), TreeConfig::default()).unwrap();
        store.start_transaction();
        let mut root = Node::leaf(b"a".to_vec(), b"1".to_vec());
        for (k, v) in [(&b"b"[..], &b"2"[..]), (&b"c"[..], &b"3"[..]), (&b"d"[..], &b"4"[..])] {
            root = avl::insert(&mut store, root, k, v.to_vec()).unwrap();
        }
        let version = store.current_version();
        avl::persist(&mut store, &mut root, version).unwrap();
        store.commit_transaction().unwrap();
        (store, root)
    }

    #[test]
    fn existence_proof_round_trips() {
        let (store, root) = build_tree();
        let proof = build_existence_proof(&store, &root, b"c").unwrap();
        assert!(verify_existence(&proof, b"c", b"3", root.hash()).is_ok());
    }

    #[test]
    fn existence_proof_rejects_wrong_value() {
        let (store, root) = build_tree();
        let proof = build_existence_proof(&store, &root, b"c").unwrap();
        assert!(matches!(
            verify_existence(&proof, b"c", b"wrong", root.hash()),
            Err(TreeError::ProofValueMismatch)
        ));
    }

    #[test]
    fn non_existence_proof_finds_both_neighbors() {
        let (store, root) = build_tree();
        let proof = build_non_existence_proof(&store, Some(&root), b"bz").unwrap();
        assert_eq!(proof.left.as_ref().unwrap().leaf.key, b"b");
        assert_eq!(proof.right.as_ref().unwrap().leaf.key, b"c");
        assert!(verify_existence(proof.left.as_ref().unwrap(), b"b", b"2", root.hash()).is_ok());
        assert!(verify_existence(proof.right.as_ref().unwrap(), b"c", b"3", root.hash()).is_ok());
    }

    #[test]
    fn non_existence_proof_rejects_present_key() {
        let (store, root) = build_tree();
        assert!(matches!(build_non_existence_proof(&store, Some(&root), b"c"), Err(TreeError::KeyExists)));
    }

    #[test]
    fn non_existence_proof_on_empty_tree_has_no_neighbors() {
        let store = Store::new(MemStorage::new(), TreeConfig::default()).unwrap();
        let proof = build_non_existence_proof(&store, None, b"anything").unwrap();
        assert!(proof.left.is_none() && proof.right.is_none());
    }
}
