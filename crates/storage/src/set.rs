use {
    crate::{
        key::MapKey,
        namespace::{namespace_bounds, prefixed_key},
    },
    iavl_types::{Order, Storage, TreeResult},
    std::marker::PhantomData,
};

/// A namespaced membership set over a `dyn Storage`: keys only, no values.
///
/// This backs the orphans table: `Set<(Version, Version, Hash)>` keyed
/// `(toVersion, fromVersion, hash)`. Pruning range-scans this set directly
/// rather than walking the tree.
pub struct Set<'a, K> {
    namespace: &'a [u8],
    _key: PhantomData<K>,
}

impl<'a, K> Set<'a, K> {
    pub const fn new(namespace: &'a str) -> Self {
        Self {
            namespace: namespace.as_bytes(),
            _key: PhantomData,
        }
    }
}

impl<'a, K: MapKey> Set<'a, K> {
    pub fn has(&self, store: &dyn Storage, key: &K) -> bool {
        store.has(&prefixed_key(self.namespace, &key.encode()))
    }

    pub fn insert(&self, store: &mut dyn Storage, key: &K) {
        store.write(&prefixed_key(self.namespace, &key.encode()), &[]);
    }

    pub fn remove(&self, store: &mut dyn Storage, key: &K) {
        store.remove(&prefixed_key(self.namespace, &key.encode()));
    }

    pub fn range<'s>(
        &self,
        store: &'s dyn Storage,
        min: Option<&K>,
        max: Option<&K>,
        order: Order,
    ) -> Box<dyn Iterator<Item = TreeResult<K>> + 's> {
        let (ns_start, ns_end) = namespace_bounds(self.namespace);
        let start = min.map_or(ns_start.clone(), |k| prefixed_key(self.namespace, &k.encode()));
        let end = max.map_or(ns_end.clone(), |k| prefixed_key(self.namespace, &k.encode()));
        let end_opt = if end.is_empty() { None } else { Some(end) };
        let namespace_len = self.namespace.len();

        Box::new(
            store
                .scan(Some(&start), end_opt.as_deref(), order)
                .map(move |(k, _)| K::decode(&k[namespace_len..])),
        )
    }

    pub fn keys<'s>(&self, store: &'s dyn Storage, order: Order) -> Box<dyn Iterator<Item = TreeResult<K>> + 's> {
        self.range(store, None, None, order)
    }

    pub fn count(&self, store: &dyn Storage) -> usize {
        self.keys(store, Order::Ascending).count()
    }
}
