use bitflags::bitflags;
use crate::core::types::ContentHash;

/// Largest primes preceding increasing powers of 2. The last entry is
/// repeated so that growing past it reports the set as full.
pub const PRIMES: [usize; 30] = [
    3, 7, 13, 31, 61, 127, 251, 509, 1021, 2039,
    4093, 8191, 16381, 32749, 65521,
    131071, 262139, 524287, 1048573, 2097143, 4194301,
    8388593, 16777213, 33554393, 67108859, 134217689,
    268435399, 536870909, 1073741789, 1073741789,
];

pub const DEFAULT_MAX_CHAIN_LENGTH: usize = 50;

bitflags! {
    /// Outcome of `ChainedHashSet::store`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StoreStatus: u8 {
        const STORED = 0x01;
        const RESIZED = 0x02;
        const FULL = 0x04;
    }
}

/// A value that can live in a `ChainedHashSet`: it exposes the key it is
/// interned under and how that key hashes.
pub trait SetEntry {
    type Key: ?Sized + PartialEq;

    fn key(&self) -> &Self::Key;

    fn hash_key(key: &Self::Key) -> ContentHash;
}

/// Chain-length summary, for tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainStats {
    pub buckets: usize,
    pub entries: usize,
    pub min_chain: usize,
    pub max_chain: usize,
    pub avg_chain: f64,
}

/// Externally chained, resizable hash set of unique entries.
///
/// Entries live in an arena and chains are linked by index. Storing an entry
/// whose key is already present is a caller error and is not checked.
/// Chains are kept intact (not just the entries) because the index writer
/// serializes each bucket as a unit.
pub struct ChainedHashSet<E: SetEntry> {
    entries: Vec<E>,
    next: Vec<Option<u32>>,
    heads: Vec<Option<u32>>,
    max_size: usize,
    max_chain_length: usize,
}

impl<E: SetEntry> ChainedHashSet<E> {
    /// Create a set starting at `PRIMES[size_factor]` buckets.
    pub fn new(size_factor: usize) -> Self {
        let size = PRIMES[size_factor.min(PRIMES.len() - 1)];
        ChainedHashSet {
            entries: Vec::new(),
            next: Vec::new(),
            heads: vec![None; size],
            max_size: PRIMES[PRIMES.len() - 1],
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
        }
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(self.heads.len());
    }

    pub fn set_max_chain_length(&mut self, max_chain_length: usize) {
        self.max_chain_length = max_chain_length;
    }

    pub fn bucket_count(&self) -> usize {
        self.heads.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn bucket_of(&self, key: &E::Key) -> usize {
        E::hash_key(key) as usize % self.heads.len()
    }

    /// Find the slot holding `key`, moving it to the front of its chain.
    fn find(&mut self, key: &E::Key) -> Option<usize> {
        let b = self.bucket_of(key);
        let head = self.heads[b];
        let mut prev: Option<usize> = None;
        let mut cur = head.map(|i| i as usize);

        while let Some(i) = cur {
            if self.entries[i].key() == key {
                if let Some(p) = prev {
                    self.next[p] = self.next[i];
                    self.next[i] = head;
                    self.heads[b] = Some(i as u32);
                }
                return Some(i);
            }
            prev = Some(i);
            cur = self.next[i].map(|n| n as usize);
        }
        None
    }

    /// Get the canonical entry for `key`.
    pub fn get(&mut self, key: &E::Key) -> Option<&E> {
        self.find(key).map(|i| &self.entries[i])
    }

    pub fn get_mut(&mut self, key: &E::Key) -> Option<&mut E> {
        self.find(key).map(move |i| &mut self.entries[i])
    }

    pub fn contains(&mut self, key: &E::Key) -> bool {
        self.find(key).is_some()
    }

    /// Return the entry for `key`, storing `make()` first if it is absent.
    /// The status is empty when the entry already existed.
    pub fn get_or_store<F: FnOnce() -> E>(&mut self, key: &E::Key, make: F) -> (&mut E, StoreStatus) {
        if let Some(i) = self.find(key) {
            return (&mut self.entries[i], StoreStatus::empty());
        }
        let slot = self.entries.len();
        let status = self.store(make());
        (&mut self.entries[slot], status)
    }

    /// Store an entry. The caller guarantees its key is not already present.
    pub fn store(&mut self, entry: E) -> StoreStatus {
        let b = self.bucket_of(entry.key());
        let slot = self.entries.len();
        self.entries.push(entry);
        self.next.push(None);

        // At max size: push at the head, don't bother walking the chain.
        if self.heads.len() == self.max_size {
            self.next[slot] = self.heads[b];
            self.heads[b] = Some(slot as u32);
            return StoreStatus::STORED | StoreStatus::FULL;
        }

        let mut len = 0;
        let mut tail = None;
        let mut cur = self.heads[b];
        while let Some(i) = cur {
            len += 1;
            tail = Some(i as usize);
            cur = self.next[i as usize];
        }
        match tail {
            Some(t) => self.next[t] = Some(slot as u32),
            None => self.heads[b] = Some(slot as u32),
        }

        let mut status = StoreStatus::STORED;
        if len > self.max_chain_length {
            status |= self.grow();
        }
        status
    }

    fn grow(&mut self) -> StoreStatus {
        let size = self.heads.len();
        let next_size = PRIMES.iter().copied().find(|&p| p > size).unwrap_or(size);
        if next_size > self.max_size || next_size == size {
            return StoreStatus::FULL;
        }
        self.resize(next_size);
        StoreStatus::RESIZED
    }

    /// Switch to a larger bucket array, moving every entry to the front of
    /// its new chain.
    fn resize(&mut self, size: usize) {
        let old_heads = std::mem::replace(&mut self.heads, vec![None; size]);
        for head in old_heads {
            let mut cur = head;
            while let Some(i) = cur {
                let i = i as usize;
                cur = self.next[i];
                let b = E::hash_key(self.entries[i].key()) as usize % size;
                self.next[i] = self.heads[b];
                self.heads[b] = Some(i as u32);
            }
        }
    }

    /// Entries of bucket `b`, in chain order.
    pub fn bucket(&self, b: usize) -> BucketIter<'_, E> {
        BucketIter { set: self, cur: self.heads[b] }
    }

    /// All entries, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        (0..self.heads.len()).flat_map(move |b| self.bucket(b))
    }

    pub fn for_each<F: FnMut(&E)>(&self, f: F) {
        self.iter().for_each(f)
    }

    pub fn for_each_mut<F: FnMut(&mut E)>(&mut self, f: F) {
        self.entries.iter_mut().for_each(f)
    }

    /// Tear the set down, handing each entry to `finalizer`.
    pub fn destroy<F: FnMut(E)>(self, finalizer: F) {
        self.entries.into_iter().for_each(finalizer)
    }

    pub fn stats(&self) -> ChainStats {
        let mut min_chain = usize::MAX;
        let mut max_chain = 0;
        for b in 0..self.heads.len() {
            let len = self.bucket(b).count();
            min_chain = min_chain.min(len);
            max_chain = max_chain.max(len);
        }
        ChainStats {
            buckets: self.heads.len(),
            entries: self.entries.len(),
            min_chain,
            max_chain,
            avg_chain: self.entries.len() as f64 / self.heads.len() as f64,
        }
    }
}

pub struct BucketIter<'a, E: SetEntry> {
    set: &'a ChainedHashSet<E>,
    cur: Option<u32>,
}

impl<'a, E: SetEntry> Iterator for BucketIter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<&'a E> {
        let i = self.cur? as usize;
        self.cur = self.set.next[i];
        Some(&self.set.entries[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Num(u32);

    impl SetEntry for Num {
        type Key = u32;
        fn key(&self) -> &u32 {
            &self.0
        }
        fn hash_key(key: &u32) -> ContentHash {
            *key as ContentHash
        }
    }

    #[test]
    fn stored_keys_are_found() {
        let mut set = ChainedHashSet::new(0);
        for i in 0..5000u32 {
            assert!(set.store(Num(i)).contains(StoreStatus::STORED));
        }
        assert_eq!(set.len(), 5000);
        for i in 0..5000u32 {
            assert!(set.contains(&i));
            assert_eq!(set.get(&i), Some(&Num(i)));
        }
        assert!(!set.contains(&5000));
        assert_eq!(set.iter().count(), 5000);
    }

    #[test]
    fn long_chain_triggers_resize() {
        let mut set = ChainedHashSet::new(0);
        set.set_max_chain_length(2);
        // every key lands in bucket 0 of 3
        let statuses: Vec<_> = (0..4u32).map(|i| set.store(Num(i * 3))).collect();
        assert!(statuses[3].contains(StoreStatus::RESIZED));
        assert_eq!(set.bucket_count(), 7);
        for i in 0..4u32 {
            assert!(set.contains(&(i * 3)));
        }
    }

    #[test]
    fn never_grows_past_max_size() {
        let mut set = ChainedHashSet::new(0);
        set.set_max_size(13);
        set.set_max_chain_length(1);
        let mut saw_full = false;
        for i in 0..500u32 {
            let status = set.store(Num(i));
            saw_full |= status.contains(StoreStatus::FULL);
            assert!(set.bucket_count() <= 13);
        }
        assert!(saw_full);
        assert_eq!(set.bucket_count(), 13);
        assert_eq!(set.max_size(), 13);
        for i in 0..500u32 {
            assert!(set.contains(&i));
        }
    }

    #[test]
    fn lookup_moves_entry_to_chain_front() {
        let mut set = ChainedHashSet::new(0);
        for k in [0u32, 3, 6] {
            set.store(Num(k));
        }
        let order: Vec<u32> = set.bucket(0).map(|n| n.0).collect();
        assert_eq!(order, vec![0, 3, 6]);

        set.get(&6);
        let order: Vec<u32> = set.bucket(0).map(|n| n.0).collect();
        assert_eq!(order, vec![6, 0, 3]);
    }

    #[test]
    fn destroy_visits_every_entry() {
        let mut set = ChainedHashSet::new(2);
        for i in 0..100u32 {
            set.store(Num(i));
        }
        let mut seen = 0;
        set.destroy(|_| seen += 1);
        assert_eq!(seen, 100);
    }

    #[test]
    fn stats_summarize_chains() {
        let mut set = ChainedHashSet::new(1);
        for i in 0..14u32 {
            set.store(Num(i));
        }
        let stats = set.stats();
        assert_eq!(stats.buckets, 7);
        assert_eq!(stats.entries, 14);
        assert_eq!(stats.min_chain, 2);
        assert_eq!(stats.max_chain, 2);
    }
}
