//! Literal end-to-end scenarios driven at the `avl`/`Store` layer directly,
//! with raw byte values rather than through the tree facade's codec, so the
//! root hashes only depend on the hashing scheme, not on a particular
//! pluggable value encoding.

use {
    crate::{avl, config::TreeConfig, node::Node, store::Store},
    iavl_storage::MemStorage,
    iavl_types::sha256,
};

fn store() -> Store<MemStorage> {
    Store::new(MemStorage::new(), TreeConfig::default()).unwrap()
}

/// Run one committed insert/remove batch over `root`, returning the new root.
fn commit(store: &mut Store<MemStorage>, root: Option<Node>, ops: &[(&[u8], Option<&[u8]>)]) -> Option<Node> {
    store.start_transaction();
    let version = store.current_version();
    let mut root = root;
    for (key, value) in ops {
        root = match value {
            Some(value) => Some(match root.take() {
                Some(node) => avl::insert(store, node, key, value.to_vec()).unwrap(),
                None => Node::leaf(key.to_vec(), value.to_vec()),
            }),
            None => match root.take() {
                Some(node) => avl::remove(store, node, key, version).unwrap(),
                None => None,
            },
        };
    }
    if let Some(node) = root.as_mut() {
        avl::persist(store, node, version).unwrap();
    }
    store.put_version(version, root.as_ref().map(Node::hash));
    store.commit_transaction().unwrap();
    root
}

#[test]
fn scenario_a_canonical_root_hashes() {
    let mut store = store();
    let root = commit(
        &mut store,
        None,
        &[
            (b"a", Some(b"1")),
            (b"b", Some(b"2")),
            (b"c", Some(b"3")),
            (b"z", Some(b"26")),
            (b"y", Some(b"25")),
            (b"x", Some(b"24")),
        ],
    );
    assert_eq!(store.current_version(), 6);
    assert_eq!(root.unwrap().hash().to_base64(), "A/+90ZpiaqwkFsYhzUbVxbk/Pdch27ZSiWTcEHh7MW8=");
}

#[test]
fn scenario_b_delete() {
    let mut store = store();
    let root = commit(
        &mut store,
        None,
        &[
            (b"a", Some(b"1")),
            (b"b", Some(b"2")),
            (b"c", Some(b"3")),
            (b"z", Some(b"26")),
            (b"y", Some(b"25")),
            (b"x", Some(b"24")),
        ],
    );
    let root = commit(&mut store, root, &[(b"c", None)]);
    assert_eq!(store.current_version(), 7);
    assert_eq!(root.unwrap().hash().to_base64(), "IDKolyyruogcFXX9UXkoUAM5SYN9qY0d4Fa97C1+QlQ=");
}

#[test]
fn scenario_c_atomic_insert() {
    let mut store = store();
    let mut root = commit(
        &mut store,
        None,
        &[
            (b"a", Some(b"1")),
            (b"b", Some(b"2")),
            (b"c", Some(b"3")),
            (b"z", Some(b"26")),
            (b"y", Some(b"25")),
            (b"x", Some(b"24")),
        ],
    );
    root = commit(&mut store, root, &[(b"c", None)]);
    root = commit(&mut store, root, &[(b"d", Some(b"4"))]);

    assert_eq!(store.current_version(), 8);
    assert_eq!(
        avl::find(&store, root.as_ref().unwrap(), b"d").unwrap().map(|(v, _)| v),
        Some(b"4".to_vec())
    );
    assert_eq!(root.unwrap().hash().to_base64(), "Tbm6G6K80K7r9cYdakFHzZ82YUbicfTVmYfzInlgmwI=");
}

#[test]
fn scenario_d_nested_revert_visibility() {
    let mut store = store();

    store.start_transaction();
    let outer_root = Node::leaf(b"e".to_vec(), b"5".to_vec());

    store.start_transaction();
    let inner_root = avl::insert(&mut store, outer_root.clone(), b"f", b"6".to_vec()).unwrap();
    assert!(avl::find(&store, &inner_root, b"e").unwrap().is_some());
    assert!(avl::find(&store, &inner_root, b"f").unwrap().is_some());
    store.revert_transaction().unwrap();

    assert!(avl::find(&store, &outer_root, b"e").unwrap().is_some());
    assert!(avl::find(&store, &outer_root, b"f").unwrap().is_none());

    store.commit_transaction().unwrap();

    assert!(avl::find(&store, &outer_root, b"e").unwrap().is_some());
    assert!(avl::find(&store, &outer_root, b"f").unwrap().is_none());
}

#[test]
fn scenario_e_deterministic_five_version_stress() {
    let mut store = store();
    let mut root: Option<Node> = None;

    let expected = [
        "DlnkZzZK0Wi5qE7yWoay02DQ+iZMGxtfcF7MRTPfbY0=",
        "kIQoB39f8b6ABzh2DEFw+igH9XXtVFwMQB4+9NzCVwM=",
        "PfNCD/GwaT3UPy3NyTntXQvWXBLRnpOFNk+WWtuIi1E=",
        "ZXz6Lq3MBJ6iLGHMpRLpkI2iQEzXFAi9TN86i0/+eL4=",
        "OOj3lSSFnvr303NSO7Oi5cT6SSqnUwEzEcwhVt8I7Z8=",
    ];

    for i in 1u32..=5 {
        store.start_transaction();
        let version = store.current_version();
        for j in 0u32..30 {
            let key = sha256(&[&j.to_be_bytes()]).as_bytes()[16..].to_vec();
            if i > 1 && (i + j) % 3 == 0 {
                root = match root.take() {
                    Some(node) => avl::remove(&mut store, node, &key, version).unwrap(),
                    None => None,
                };
            } else {
                let value = sha256(&[&(i * j).to_be_bytes()]).as_bytes()[16..].to_vec();
                root = Some(match root.take() {
                    Some(node) => avl::insert(&mut store, node, &key, value).unwrap(),
                    None => Node::leaf(key.clone(), value),
                });
            }
        }
        if let Some(node) = root.as_mut() {
            avl::persist(&mut store, node, version).unwrap();
        }
        store.put_version(version, root.as_ref().map(Node::hash));
        store.commit_transaction().unwrap();

        assert_eq!(root.as_ref().unwrap().hash().to_base64(), expected[(i - 1) as usize], "version {i}");
    }
}

#[test]
fn scenario_f_pruning_closure() {
    let mut store = store();
    let mut root: Option<Node> = None;

    for i in 1u32..=30 {
        store.start_transaction();
        let version = store.current_version();
        let key = sha256(&[&i.to_be_bytes()]).as_bytes()[16..].to_vec();
        let value = sha256(&[&(i * 7).to_be_bytes()]).as_bytes()[16..].to_vec();
        root = Some(match root.take() {
            Some(node) => avl::insert(&mut store, node, &key, value).unwrap(),
            None => Node::leaf(key.clone(), value),
        });
        if let Some(node) = root.as_mut() {
            avl::persist(&mut store, node, version).unwrap();
        }
        store.put_version(version, root.as_ref().map(Node::hash));
        store.commit_transaction().unwrap();
    }

    assert_eq!(store.current_version(), 30);
    store.prune(1, 29).unwrap();

    let remaining = store.list_versions().unwrap();
    assert_eq!(remaining, vec![30]);
    assert_eq!(store.orphan_count(), 0);

    let traversed = avl::count_nodes(&store, root.as_ref().unwrap()).unwrap();
    assert_eq!(traversed, store.node_count());
}
