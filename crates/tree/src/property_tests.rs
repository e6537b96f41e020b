//! Universal invariants, checked against randomly generated insert/remove
//! sequences rather than literal fixtures: AVL balance, hash integrity,
//! get/insert/delete agreement with a reference model, the node-count and
//! orphan-count closure after full pruning, and proof soundness.

use {
    crate::{
        avl,
        config::TreeConfig,
        node::Node,
        proof,
        store::Store,
    },
    iavl_storage::MemStorage,
    proptest::prelude::*,
    std::collections::BTreeMap,
};

fn store() -> Store<MemStorage> {
    Store::new(MemStorage::new(), TreeConfig::default()).unwrap()
}

/// Recorded heights match the actual descendant heights, and every Branch's
/// `|leftHeight - rightHeight| <= 1`.
fn check_balance<S: iavl_types::Storage>(store: &Store<S>, node: &Node) -> u32 {
    match node {
        Node::Leaf(_) => 0,
        Node::Branch(branch) => {
            let left = avl::peek(store, &branch.left).unwrap();
            let right = avl::peek(store, &branch.right).unwrap();
            let left_height = check_balance(store, &left);
            let right_height = check_balance(store, &right);
            assert_eq!(left_height, branch.left_height(), "recorded left height drifted from actual subtree height");
            assert_eq!(right_height, branch.right_height(), "recorded right height drifted from actual subtree height");
            assert!(branch.balance_factor().abs() <= 1, "unbalanced branch: factor {}", branch.balance_factor());
            1 + left_height.max(right_height)
        },
    }
}

/// Every node's hash is a pure function of its own fields and its children's
/// hashes, recomputed bottom-up and compared against the stored hash.
fn check_hash_integrity<S: iavl_types::Storage>(store: &Store<S>, node: &Node) -> iavl_types::Hash {
    match node {
        Node::Leaf(leaf) => {
            let expected = crate::node::leaf_hash(leaf.version, &leaf.key, &leaf.value);
            assert_eq!(expected, node.hash(), "leaf hash does not match its own key/value/version");
            expected
        },
        Node::Branch(branch) => {
            let left = avl::peek(store, &branch.left).unwrap();
            let right = avl::peek(store, &branch.right).unwrap();
            let left_hash = check_hash_integrity(store, &left);
            let right_hash = check_hash_integrity(store, &right);
            let expected = crate::node::branch_hash(branch.version, &left_hash, &right_hash);
            assert_eq!(expected, node.hash(), "branch hash does not match its recorded version/children");
            expected
        },
    }
}

fn small_key() -> impl Strategy<Value = Vec<u8>> {
    (0u8..24).prop_map(|b| vec![b])
}

fn ops() -> impl Strategy<Value = Vec<(Vec<u8>, Option<Vec<u8>>)>> {
    proptest::collection::vec((small_key(), proptest::option::of(proptest::collection::vec(any::<u8>(), 0..8))), 1..80)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every committed version balances and stays consistent with a plain
    /// `BTreeMap` reference model for get/insert/delete.
    #[test]
    fn balanced_and_agrees_with_model(ops in ops()) {
        let mut store = store();
        let mut root: Option<Node> = None;
        let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

        for (key, value) in ops {
            store.start_transaction();
            let version = store.current_version();
            match &value {
                Some(value) => {
                    model.insert(key.clone(), value.clone());
                    root = Some(match root.take() {
                        Some(node) => avl::insert(&mut store, node, &key, value.clone()).unwrap(),
                        None => Node::leaf(key.clone(), value.clone()),
                    });
                },
                None => {
                    model.remove(&key);
                    root = match root.take() {
                        Some(node) => avl::remove(&mut store, node, &key, version).unwrap(),
                        None => None,
                    };
                },
            }
            if let Some(node) = root.as_mut() {
                avl::persist(&mut store, node, version).unwrap();
            }
            store.put_version(version, root.as_ref().map(Node::hash));
            store.commit_transaction().unwrap();

            if let Some(node) = &root {
                check_balance(&store, node);
                check_hash_integrity(&store, node);
            } else {
                prop_assert!(model.is_empty());
            }

            for (k, v) in &model {
                let found = avl::find(&store, root.as_ref().unwrap(), k).unwrap().map(|(v, _)| v);
                prop_assert_eq!(found, Some(v.clone()));
            }
        }
    }

    /// After pruning every version but the latest, the reachable-node count
    /// equals the nodes table's size and no orphans remain.
    #[test]
    fn pruning_closes_over_reachable_nodes(ops in ops()) {
        let mut store = store();
        let mut root: Option<Node> = None;

        for (key, value) in ops {
            store.start_transaction();
            let version = store.current_version();
            root = match value {
                Some(value) => Some(match root.take() {
                    Some(node) => avl::insert(&mut store, node, &key, value).unwrap(),
                    None => Node::leaf(key.clone(), value),
                }),
                None => match root.take() {
                    Some(node) => avl::remove(&mut store, node, &key, version).unwrap(),
                    None => None,
                },
            };
            if let Some(node) = root.as_mut() {
                avl::persist(&mut store, node, version).unwrap();
            }
            store.put_version(version, root.as_ref().map(Node::hash));
            store.commit_transaction().unwrap();
        }

        let current = store.current_version();
        if current > 1 {
            store.prune(1, current - 1).unwrap();
            prop_assert_eq!(store.list_versions().unwrap(), vec![current]);
            prop_assert_eq!(store.orphan_count(), 0);
            if let Some(node) = &root {
                prop_assert_eq!(avl::count_nodes(&store, node).unwrap(), store.node_count());
            } else {
                prop_assert_eq!(store.node_count(), 0);
            }
        }
    }

    /// `build_existence_proof`/`verify_existence` succeed for every key the
    /// model says is present; `build_non_existence_proof`/
    /// `verify_non_existence` succeed for a key the model says is absent.
    #[test]
    fn proofs_are_sound_and_complete(ops in ops(), probe in small_key()) {
        let mut store = store();
        let mut root: Option<Node> = None;
        let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

        for (key, value) in ops {
            store.start_transaction();
            let version = store.current_version();
            match &value {
                Some(value) => {
                    model.insert(key.clone(), value.clone());
                    root = Some(match root.take() {
                        Some(node) => avl::insert(&mut store, node, &key, value.clone()).unwrap(),
                        None => Node::leaf(key.clone(), value.clone()),
                    });
                },
                None => {
                    model.remove(&key);
                    root = match root.take() {
                        Some(node) => avl::remove(&mut store, node, &key, version).unwrap(),
                        None => None,
                    };
                },
            }
            if let Some(node) = root.as_mut() {
                avl::persist(&mut store, node, version).unwrap();
            }
            store.put_version(version, root.as_ref().map(Node::hash));
            store.commit_transaction().unwrap();
        }

        let Some(root) = root else {
            return Ok(());
        };
        let root_hash = root.hash();

        for (key, value) in &model {
            let existence_proof = proof::build_existence_proof(&store, &root, key).unwrap();
            prop_assert!(proof::verify_existence(&existence_proof, key, value, root_hash).is_ok());
        }

        if !model.contains_key(&probe) {
            let non_existence_proof = proof::build_non_existence_proof(&store, Some(&root), &probe).unwrap();
            prop_assert!(proof::verify_non_existence(&non_existence_proof, &probe, Some(root_hash)).is_ok());
        }
    }
}
