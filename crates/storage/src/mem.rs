use {
    iavl_types::{Order, Record, Storage},
    std::collections::BTreeMap,
};

/// An in-memory, `BTreeMap`-backed `Storage`. Used in tests and as the CLI's
/// default backend when no production KV engine is wired in.
#[derive(Debug, Default, Clone)]
pub struct MemStorage {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemStorage {
    fn read(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn scan<'a>(
        &'a self,
        min: Option<&[u8]>,
        max: Option<&[u8]>,
        order: Order,
    ) -> Box<dyn Iterator<Item = Record> + 'a> {
        use std::ops::Bound;

        let min = min.map_or(Bound::Unbounded, |b| Bound::Included(b.to_vec()));
        let max = max.map_or(Bound::Unbounded, |b| Bound::Excluded(b.to_vec()));
        let range = self.data.range((min, max)).map(|(k, v)| (k.clone(), v.clone()));

        match order {
            Order::Ascending => Box::new(range.collect::<Vec<_>>().into_iter()),
            Order::Descending => {
                let mut items: Vec<_> = range.collect();
                items.reverse();
                Box::new(items.into_iter())
            },
        }
    }

    fn write(&mut self, key: &[u8], value: &[u8]) {
        self.data.insert(key.to_vec(), value.to_vec());
    }

    fn remove(&mut self, key: &[u8]) {
        self.data.remove(key);
    }
}
