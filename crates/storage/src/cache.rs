use {
    iavl_types::{Batch, Op, Order, Record, Storage},
    std::{cmp::Ordering, iter, iter::Peekable, mem, ops::Bound},
};

/// A write-buffering overlay over a base `Storage`.
///
/// Reads are served from the pending batch first, falling back to the base
/// store; writes accumulate in the batch until `commit`/`consume` flushes
/// them. This is the building block the versioned `Store` stacks to
/// implement nested transactions: each `startTransaction` pushes one more
/// `CacheStore` frame, and `commitTransaction` merges a frame's batch into
/// its parent's instead of writing straight to the base engine until the
/// outermost frame commits.
///
/// Adapted from cw-multi-test's transaction overlay, by way of this
/// project's own `app::CacheStore`.
#[derive(Clone)]
pub struct CacheStore<S> {
    base: S,
    pending: Batch,
}

impl<S> CacheStore<S> {
    pub fn new(base: S, pending: Option<Batch>) -> Self {
        Self {
            base,
            pending: pending.unwrap_or_default(),
        }
    }

    /// Consume self, discard the base, return the underlying store and the
    /// pending (uncommitted) batch separately.
    pub fn disassemble(self) -> (S, Batch) {
        (self.base, self.pending)
    }

    pub fn pending(&self) -> &Batch {
        &self.pending
    }

    pub fn base(&self) -> &S {
        &self.base
    }

    /// Swap in a different pending batch, returning the old one. Used to
    /// implement nested-transaction revert: the caller snapshots `pending`
    /// before opening a frame and restores it here if the frame is reverted.
    pub fn replace_pending(&mut self, pending: Batch) -> Batch {
        mem::replace(&mut self.pending, pending)
    }
}

impl<S: Storage> CacheStore<S> {
    /// Flush the pending batch into the base store, in place.
    pub fn commit(&mut self) {
        let pending = mem::take(&mut self.pending);
        self.base.flush(pending);
    }

    /// Consume self, flush the pending batch, return the base store.
    pub fn consume(mut self) -> S {
        self.base.flush(self.pending);
        self.base
    }
}

impl<S: Storage> Storage for CacheStore<S> {
    fn read(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.pending.get(key) {
            Some(Op::Insert(value)) => Some(value.clone()),
            Some(Op::Delete) => None,
            None => self.base.read(key),
        }
    }

    fn scan<'a>(
        &'a self,
        min: Option<&[u8]>,
        max: Option<&[u8]>,
        order: Order,
    ) -> Box<dyn Iterator<Item = Record> + 'a> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Box::new(iter::empty());
            }
        }

        let base = self.base.scan(min, max, order);

        let min = min.map_or(Bound::Unbounded, |bytes| Bound::Included(bytes.to_vec()));
        let max = max.map_or(Bound::Unbounded, |bytes| Bound::Excluded(bytes.to_vec()));
        let pending_raw = self.pending.range((min, max));
        let pending: Box<dyn Iterator<Item = _>> = match order {
            Order::Ascending => Box::new(pending_raw),
            Order::Descending => Box::new(pending_raw.rev()),
        };

        Box::new(Merged::new(base, pending, order))
    }

    fn write(&mut self, key: &[u8], value: &[u8]) {
        self.pending.insert(key.to_vec(), Op::Insert(value.to_vec()));
    }

    fn remove(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), Op::Delete);
    }

    fn flush(&mut self, batch: Batch) {
        // a.extend(b) favors b's values on overlapping keys, which is exactly
        // what we want: the incoming (more recent) batch wins.
        self.pending.extend(batch);
    }
}

struct Merged<'a, B, P>
where
    B: Iterator<Item = Record>,
    P: Iterator<Item = (&'a Vec<u8>, &'a Op)>,
{
    base: Peekable<B>,
    pending: Peekable<P>,
    order: Order,
}

impl<'a, B, P> Merged<'a, B, P>
where
    B: Iterator<Item = Record>,
    P: Iterator<Item = (&'a Vec<u8>, &'a Op)>,
{
    fn new(base: B, pending: P, order: Order) -> Self {
        Self {
            base: base.peekable(),
            pending: pending.peekable(),
            order,
        }
    }

    fn take_pending(&mut self) -> Option<Record> {
        let (key, op) = self.pending.next()?;
        match op {
            Op::Insert(value) => Some((key.clone(), value.clone())),
            Op::Delete => self.next(),
        }
    }
}

impl<'a, B, P> Iterator for Merged<'a, B, P>
where
    B: Iterator<Item = Record>,
    P: Iterator<Item = (&'a Vec<u8>, &'a Op)>,
{
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        match (self.base.peek(), self.pending.peek()) {
            (Some((base_key, _)), Some((pending_key, _))) => {
                let ordering_raw = base_key.cmp(pending_key);
                let ordering = match self.order {
                    Order::Ascending => ordering_raw,
                    Order::Descending => ordering_raw.reverse(),
                };

                match ordering {
                    Ordering::Less => self.base.next(),
                    Ordering::Equal => {
                        self.base.next();
                        self.take_pending()
                    },
                    Ordering::Greater => self.take_pending(),
                }
            },
            (None, Some(_)) => self.take_pending(),
            (Some(_), None) => self.base.next(),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::MemStorage};

    fn make_test_case() -> (CacheStore<MemStorage>, Vec<Record>) {
        let mut base = MemStorage::new();
        base.write(&[1], &[1]);
        base.write(&[2], &[2]);
        base.write(&[4], &[4]);
        base.write(&[5], &[5]);
        base.write(&[6], &[6]);
        base.write(&[7], &[7]);

        let mut cached = CacheStore::new(base, None);
        cached.remove(&[2]);
        cached.write(&[3], &[3]);
        cached.write(&[6], &[255]);
        cached.remove(&[7]);
        cached.write(&[8], &[8]);

        let merged = vec![
            (vec![1], vec![1]),
            (vec![3], vec![3]),
            (vec![4], vec![4]),
            (vec![5], vec![5]),
            (vec![6], vec![255]),
            (vec![8], vec![8]),
        ];

        (cached, merged)
    }

    fn collect(store: &dyn Storage, order: Order) -> Vec<Record> {
        store.scan(None, None, order).collect()
    }

    #[test]
    fn iterator_merges_pending_over_base() {
        let (cached, mut merged) = make_test_case();
        assert_eq!(collect(&cached, Order::Ascending), merged);

        merged.reverse();
        assert_eq!(collect(&cached, Order::Descending), merged);
    }

    #[test]
    fn commit_flushes_into_base() {
        let (mut cached, merged) = make_test_case();
        cached.commit();
        let base = cached.disassemble().0;
        assert_eq!(collect(&base, Order::Ascending), merged);
    }
}
