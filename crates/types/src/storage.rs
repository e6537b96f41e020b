use crate::{Order, Record};

/// The abstract ordered key/value engine this crate is built on top of.
///
/// This is deliberately minimal — a synchronous, single-writer, ordered byte
/// store with range scans. It stands in for whatever production KV engine
/// (an embedded LSM/B-tree store, typically) backs the three logical tables
/// described by the versions, nodes, and orphans tables; this crate never
/// assumes anything about the engine beyond this trait.
pub trait Storage {
    fn read(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn scan<'a>(
        &'a self,
        min: Option<&[u8]>,
        max: Option<&[u8]>,
        order: Order,
    ) -> Box<dyn Iterator<Item = Record> + 'a>;

    fn write(&mut self, key: &[u8], value: &[u8]);

    fn remove(&mut self, key: &[u8]);

    /// Apply a batch of writes/deletes. The default implementation simply
    /// replays them one at a time; backends with native batch-write support
    /// should override this.
    fn flush(&mut self, batch: crate::Batch) {
        for (key, op) in batch {
            match op {
                crate::Op::Insert(value) => self.write(&key, &value),
                crate::Op::Delete => self.remove(&key),
            }
        }
    }

    fn has(&self, key: &[u8]) -> bool {
        self.read(key).is_some()
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn read(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).read(key)
    }

    fn scan<'a>(
        &'a self,
        min: Option<&[u8]>,
        max: Option<&[u8]>,
        order: Order,
    ) -> Box<dyn Iterator<Item = Record> + 'a> {
        (**self).scan(min, max, order)
    }

    fn write(&mut self, key: &[u8], value: &[u8]) {
        (**self).write(key, value)
    }

    fn remove(&mut self, key: &[u8]) {
        (**self).remove(key)
    }

    fn flush(&mut self, batch: crate::Batch) {
        (**self).flush(batch)
    }
}
