use {
    crate::{
        key::MapKey,
        namespace::{namespace_bounds, prefixed_key},
    },
    iavl_types::{pack, unpack, Order, Storage, TreeResult},
    serde::{de::DeserializeOwned, Serialize},
    std::marker::PhantomData,
};

/// A namespaced, typed key/value accessor over a `dyn Storage`.
///
/// This is the nodes table: `Map<Hash, Node>`. Values are packed with the
/// pluggable codec; keys are encoded with `MapKey`.
pub struct Map<'a, K, V> {
    namespace: &'a [u8],
    _key: PhantomData<K>,
    _value: PhantomData<V>,
}

impl<'a, K, V> Map<'a, K, V> {
    pub const fn new(namespace: &'a str) -> Self {
        Self {
            namespace: namespace.as_bytes(),
            _key: PhantomData,
            _value: PhantomData,
        }
    }
}

impl<'a, K: MapKey, V: Serialize + DeserializeOwned> Map<'a, K, V> {
    pub fn has(&self, store: &dyn Storage, key: &K) -> bool {
        store.has(&prefixed_key(self.namespace, &key.encode()))
    }

    pub fn may_load(&self, store: &dyn Storage, key: &K) -> TreeResult<Option<V>> {
        store
            .read(&prefixed_key(self.namespace, &key.encode()))
            .map(|bytes| unpack(&bytes))
            .transpose()
    }

    pub fn load(&self, store: &dyn Storage, key: &K) -> TreeResult<V> {
        let bytes = store
            .read(&prefixed_key(self.namespace, &key.encode()))
            .ok_or_else(|| missing_key_error())?;
        unpack(&bytes)
    }

    pub fn save(&self, store: &mut dyn Storage, key: &K, value: &V) -> TreeResult<()> {
        let bytes = pack(value)?;
        store.write(&prefixed_key(self.namespace, &key.encode()), &bytes);
        Ok(())
    }

    pub fn remove(&self, store: &mut dyn Storage, key: &K) {
        store.remove(&prefixed_key(self.namespace, &key.encode()));
    }

    /// Iterate all `(key, value)` pairs in this namespace, in key order.
    pub fn range<'s>(
        &self,
        store: &'s dyn Storage,
        order: Order,
    ) -> Box<dyn Iterator<Item = TreeResult<(K, V)>> + 's> {
        let (start, end) = namespace_bounds(self.namespace);
        let end_opt = if end.is_empty() { None } else { Some(end.as_slice()) };
        let namespace_len = self.namespace.len();

        Box::new(store.scan(Some(&start), end_opt, order).map(move |(k, v)| {
            let key = K::decode(&k[namespace_len..])?;
            let value = unpack(&v)?;
            Ok((key, value))
        }))
    }

    pub fn keys<'s>(
        &self,
        store: &'s dyn Storage,
        order: Order,
    ) -> Box<dyn Iterator<Item = TreeResult<K>> + 's> {
        let (start, end) = namespace_bounds(self.namespace);
        let end_opt = if end.is_empty() { None } else { Some(end.as_slice()) };
        let namespace_len = self.namespace.len();

        Box::new(
            store
                .scan(Some(&start), end_opt, order)
                .map(move |(k, _)| K::decode(&k[namespace_len..])),
        )
    }

    pub fn count(&self, store: &dyn Storage) -> usize {
        self.keys(store, Order::Ascending).count()
    }
}

fn missing_key_error() -> iavl_types::TreeError {
    iavl_types::TreeError::Codec("key not found in map".into())
}
