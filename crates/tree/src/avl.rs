//! Insert, delete, balance, find, and persist over the node model.

use {
    crate::{
        node::{branch_hash, leaf_hash, Child, Node},
        store::Store,
    },
    iavl_storage::Version,
    iavl_types::{Hash, Storage, TreeResult},
};

/// Load a child into an owned `Node`, materializing it from the store the
/// first time it's touched.
fn materialize<S: Storage>(store: &Store<S>, child: Child) -> TreeResult<Node> {
    match child {
        Child::Hash(hash) => store.get_node(hash),
        Child::Node(node) => Ok(*node),
        Child::Taken => unreachable!("Child::Taken observed outside a single recursive step"),
    }
}

/// A read-only peek at a child without consuming it: reloads by hash for a
/// lazy reference, clones the in-memory subtree for an already-materialized
/// one. Used by the traversals that need to inspect a subtree (`find`,
/// `find_min`/`find_max`, in-order iteration) without taking ownership away
/// from their parent.
pub(crate) fn peek<S: Storage>(store: &Store<S>, child: &Child) -> TreeResult<Node> {
    match child {
        Child::Hash(hash) => store.get_node(*hash),
        Child::Node(node) => Ok((**node).clone()),
        Child::Taken => unreachable!("Child::Taken observed outside a single recursive step"),
    }
}

fn retire_identity<S: Storage>(store: &mut Store<S>, identity: Option<(Hash, Version)>, committing_version: Version) {
    if let Some((hash, from_version)) = identity {
        store.retire_node(hash, from_version, committing_version.saturating_sub(1));
    }
}

/// `insert(key, value)`.
pub fn insert<S: Storage>(store: &mut Store<S>, node: Node, key: &[u8], value: Vec<u8>) -> TreeResult<Node> {
    match node {
        Node::Leaf(mut leaf) => {
            if key == leaf.key.as_slice() {
                leaf.set_value(value);
                Ok(Node::Leaf(leaf))
            } else if key < leaf.key.as_slice() {
                Ok(Node::branch(leaf.key.clone(), Node::leaf(key.to_vec(), value), Node::Leaf(leaf)))
            } else {
                Ok(Node::branch(key.to_vec(), Node::Leaf(leaf), Node::leaf(key.to_vec(), value)))
            }
        },
        Node::Branch(mut branch) => {
            if key < branch.key.as_slice() {
                let left = materialize(store, branch.take_left())?;
                let new_left = insert(store, left, key, value)?;
                branch.set_left(new_left);
            } else {
                let right = materialize(store, branch.take_right())?;
                let new_right = insert(store, right, key, value)?;
                branch.set_right(new_right);
            }
            balance(store, Node::Branch(branch))
        },
    }
}

/// `remove(key)`. `Ok(None)` means the subtree is now empty.
pub fn remove<S: Storage>(
    store: &mut Store<S>,
    node: Node,
    key: &[u8],
    committing_version: Version,
) -> TreeResult<Option<Node>> {
    match node {
        Node::Leaf(leaf) => {
            if key == leaf.key.as_slice() {
                retire_identity(store, leaf.prev_identity(), committing_version);
                Ok(None)
            } else {
                Ok(Some(Node::Leaf(leaf)))
            }
        },
        Node::Branch(mut branch) => {
            if key < branch.key.as_slice() {
                let prev = branch.prev_identity();
                let left = materialize(store, branch.take_left())?;
                match remove(store, left, key, committing_version)? {
                    None => {
                        retire_identity(store, prev, committing_version);
                        let right = materialize(store, branch.take_right())?;
                        Ok(Some(right))
                    },
                    Some(new_left) => {
                        branch.set_left(new_left);
                        Ok(Some(balance(store, Node::Branch(branch))?))
                    },
                }
            } else {
                let going_equal = key == branch.key.as_slice();
                let prev = branch.prev_identity();
                let right = materialize(store, branch.take_right())?;
                match remove(store, right, key, committing_version)? {
                    None => {
                        retire_identity(store, prev, committing_version);
                        let left = materialize(store, branch.take_left())?;
                        Ok(Some(left))
                    },
                    Some(new_right) => {
                        if going_equal {
                            let min_key = find_min(store, &new_right)?;
                            branch.set_key(min_key);
                        }
                        branch.set_right(new_right);
                        Ok(Some(balance(store, Node::Branch(branch))?))
                    },
                }
            }
        },
    }
}

/// `balance(B)`. Only ever called on a `Branch`.
fn balance<S: Storage>(store: &mut Store<S>, node: Node) -> TreeResult<Node> {
    let Node::Branch(mut branch) = node else {
        return Ok(node);
    };

    match branch.balance_factor() {
        2 => {
            let mut left = materialize(store, branch.take_left())?;
            let left_bf = left.as_branch().map(|b| b.balance_factor()).unwrap_or(0);
            if left_bf < 0 {
                left = rotate_left(store, left)?;
            }
            branch.set_left(left);
            rotate_right(store, Node::Branch(branch))
        },
        -2 => {
            let mut right = materialize(store, branch.take_right())?;
            let right_bf = right.as_branch().map(|b| b.balance_factor()).unwrap_or(0);
            if right_bf > 0 {
                right = rotate_right(store, right)?;
            }
            branch.set_right(right);
            rotate_left(store, Node::Branch(branch))
        },
        _ => Ok(Node::Branch(branch)),
    }
}

/// Promote the right child to root: `B{l, B'{l', r'}} -> B'{B{l, l'}, r'}`.
fn rotate_left<S: Storage>(store: &mut Store<S>, node: Node) -> TreeResult<Node> {
    let Node::Branch(mut branch) = node else {
        unreachable!("rotate_left called on a non-Branch");
    };
    let pivot = materialize(store, branch.take_right())?;
    let Node::Branch(mut pivot) = pivot else {
        unreachable!("rotate_left pivot must be a Branch when bf == -2");
    };
    let pivot_left = materialize(store, pivot.take_left())?;
    branch.set_right(pivot_left);
    branch.mark_dirty();
    pivot.set_left(Node::Branch(branch));
    pivot.mark_dirty();
    Ok(Node::Branch(pivot))
}

/// Promote the left child to root: `B{B'{l', r'}, r} -> B'{l', B{r', r}}`.
fn rotate_right<S: Storage>(store: &mut Store<S>, node: Node) -> TreeResult<Node> {
    let Node::Branch(mut branch) = node else {
        unreachable!("rotate_right called on a non-Branch");
    };
    let pivot = materialize(store, branch.take_left())?;
    let Node::Branch(mut pivot) = pivot else {
        unreachable!("rotate_right pivot must be a Branch when bf == 2");
    };
    let pivot_right = materialize(store, pivot.take_right())?;
    branch.set_left(pivot_right);
    branch.mark_dirty();
    pivot.set_right(Node::Branch(branch));
    pivot.mark_dirty();
    Ok(Node::Branch(pivot))
}

/// `find(key)`: standard BST walk.
pub fn find<S: Storage>(store: &Store<S>, node: &Node, key: &[u8]) -> TreeResult<Option<(Vec<u8>, Version)>> {
    match node {
        Node::Leaf(leaf) => {
            Ok((leaf.key == key).then(|| (leaf.value.clone(), leaf.version)))
        },
        Node::Branch(branch) => {
            let child = if key < branch.key.as_slice() { peek(store, &branch.left)? } else { peek(store, &branch.right)? };
            find(store, &child, key)
        },
    }
}

/// The leftmost (minimum-key) leaf's key reachable from `node`.
pub fn find_min<S: Storage>(store: &Store<S>, node: &Node) -> TreeResult<Vec<u8>> {
    match node {
        Node::Leaf(leaf) => Ok(leaf.key.clone()),
        Node::Branch(branch) => find_min(store, &peek(store, &branch.left)?),
    }
}

/// The rightmost (maximum-key) leaf's key reachable from `node`.
pub fn find_max<S: Storage>(store: &Store<S>, node: &Node) -> TreeResult<Vec<u8>> {
    match node {
        Node::Leaf(leaf) => Ok(leaf.key.clone()),
        Node::Branch(branch) => find_max(store, &peek(store, &branch.right)?),
    }
}

/// Left-node-right traversal, used by the proof path and tests.
pub fn in_order<S: Storage>(store: &Store<S>, node: &Node, out: &mut Vec<(Vec<u8>, Vec<u8>)>) -> TreeResult<()> {
    match node {
        Node::Leaf(leaf) => {
            out.push((leaf.key.clone(), leaf.value.clone()));
            Ok(())
        },
        Node::Branch(branch) => {
            in_order(store, &peek(store, &branch.left)?, out)?;
            in_order(store, &peek(store, &branch.right)?, out)
        },
    }
}

/// Count of nodes (Leaves and Branches alike) reachable from `node`. Unlike
/// `in_order`, which yields only the key/value pairs carried by leaves, this
/// walks every node in the subtree, matching the nodes table's own count
/// once only one version's worth of nodes remains after pruning.
pub fn count_nodes<S: Storage>(store: &Store<S>, node: &Node) -> TreeResult<usize> {
    match node {
        Node::Leaf(_) => Ok(1),
        Node::Branch(branch) => {
            let left = count_nodes(store, &peek(store, &branch.left)?)?;
            let right = count_nodes(store, &peek(store, &branch.right)?)?;
            Ok(1 + left + right)
        },
    }
}

/// `persist(node, V)`: recursively persists dirty materialized children
/// bottom-up, then the node itself, emitting an orphan for its previous
/// identity if it had one.
pub fn persist<S: Storage>(store: &mut Store<S>, node: &mut Node, version: Version) -> TreeResult<()> {
    if let Node::Branch(branch) = node {
        if let Child::Node(child) = &mut branch.left {
            if child.is_dirty() {
                persist(store, child, version)?;
            }
        }
        if let Child::Node(child) = &mut branch.right {
            if child.is_dirty() {
                persist(store, child, version)?;
            }
        }
    }

    if !node.is_dirty() {
        return Ok(());
    }

    let prev = node.prev_identity();
    let new_hash = match node {
        Node::Leaf(leaf) => {
            leaf.version = version;
            leaf_hash(version, &leaf.key, &leaf.value)
        },
        Node::Branch(branch) => {
            branch.version = version;
            let left_hash = branch.left.hash().expect("left child persisted above");
            let right_hash = branch.right.hash().expect("right child persisted above");
            branch_hash(version, &left_hash, &right_hash)
        },
    };

    node.finalize(version, new_hash);
    store.put_node(new_hash, node)?;

    if let Some((old_hash, old_version)) = prev {
        store.retire_node(old_hash, old_version, version.saturating_sub(1));
    }

    Ok(())
}
