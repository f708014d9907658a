//! Hash-consing pool of shared immutable payloads
//!
//! The exploration allocates a large number of location tuples, integer
//! valuations, edge tuples and zones, most of which repeat. A
//! [`SharedPool`] keeps one canonical reference-counted representative per
//! distinct payload: [`SharedPool::share`] turns an owned, possibly freshly
//! computed value into the canonical `Rc`, dropping the duplicate if the
//! payload is already known. Payloads are mutable while owned and must be
//! treated as immutable once shared.
//!
//! Reference counting is `Rc`'s; [`SharedPool::collect`] releases
//! representatives that are no longer referenced outside the pool.

use std::collections::HashSet;
use std::hash::Hash;
use std::rc::Rc;

/// Pool of canonical shared representatives
#[derive(Debug)]
pub struct SharedPool<T: Eq + Hash> {
    table: HashSet<Rc<T>>,
    block_size: usize,
}

impl<T: Eq + Hash> SharedPool<T> {
    /// Create a pool
    ///
    /// `block_size` is the reservation granularity of the underlying table
    /// and `table_size` its initial capacity.
    pub fn new(block_size: usize, table_size: usize) -> Self {
        assert!(block_size >= 1, "block size must be at least 1");
        SharedPool {
            table: HashSet::with_capacity(table_size),
            block_size,
        }
    }

    /// Number of live canonical representatives
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check whether the pool holds no representative
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Share an owned payload
    ///
    /// Returns the canonical representative for the payload: the existing
    /// one when an equal payload is already pooled (the argument is
    /// dropped), a new one otherwise. The result must not be mutated.
    pub fn share(&mut self, value: T) -> Rc<T> {
        if let Some(existing) = self.table.get(&value) {
            return Rc::clone(existing);
        }

        if self.table.len() == self.table.capacity() {
            self.table.reserve(self.block_size);
        }
        let shared = Rc::new(value);
        self.table.insert(Rc::clone(&shared));
        shared
    }

    /// Release representatives that are only referenced by the pool
    ///
    /// Returns the number of dropped entries.
    pub fn collect(&mut self) -> usize {
        let before = self.table.len();
        self.table.retain(|rc| Rc::strong_count(rc) > 1);
        before - self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_returns_canonical_representative() {
        let mut pool = SharedPool::new(4, 16);

        let a = pool.share(vec![1, 2, 3]);
        let b = pool.share(vec![1, 2, 3]);
        let c = pool.share(vec![4, 5]);

        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_share_equal_payload_same_identity() {
        let mut pool = SharedPool::new(1, 1);
        let a = pool.share("state".to_string());
        let b = pool.share("state".to_string());
        let other = pool.share("other".to_string());

        // share(a) == share(b) iff payload(a) == payload(b)
        assert!(Rc::ptr_eq(&a, &b));
        assert_ne!(*a, *other);
    }

    #[test]
    fn test_collect_releases_unreferenced() {
        let mut pool = SharedPool::new(4, 16);

        let kept = pool.share(vec![1]);
        {
            let _dropped = pool.share(vec![2]);
        }
        assert_eq!(pool.len(), 2);

        let freed = pool.collect();
        assert_eq!(freed, 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(*kept, vec![1]);
    }
}
