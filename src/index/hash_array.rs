use crate::core::types::ContentHash;

/// Growable array of content hashes.
///
/// Set algebra (`union`, `intersection`, `complement`) requires both operands
/// sorted and deduplicated, and always returns a freshly owned array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashArray {
    hashes: Vec<ContentHash>,
}

impl HashArray {
    pub fn new() -> Self {
        HashArray { hashes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        HashArray { hashes: Vec::with_capacity(capacity) }
    }

    pub fn append(&mut self, value: ContentHash) {
        self.hashes.push(value);
    }

    pub fn extend_from_slice(&mut self, values: &[ContentHash]) {
        self.hashes.extend_from_slice(values);
    }

    pub fn get(&self, i: usize) -> Option<ContentHash> {
        self.hashes.get(i).copied()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn as_slice(&self) -> &[ContentHash] {
        &self.hashes
    }

    pub fn iter(&self) -> impl Iterator<Item = ContentHash> + '_ {
        self.hashes.iter().copied()
    }

    pub fn sort(&mut self) {
        self.hashes.sort_unstable();
    }

    /// Remove adjacent duplicates. The array must already be sorted.
    pub fn uniq(&mut self) {
        debug_assert!(self.is_sorted());
        self.hashes.dedup();
    }

    pub fn sort_uniq(&mut self) {
        self.sort();
        self.uniq();
    }

    pub fn is_sorted(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] <= w[1])
    }
}

impl From<Vec<ContentHash>> for HashArray {
    fn from(hashes: Vec<ContentHash>) -> Self {
        HashArray { hashes }
    }
}

impl FromIterator<ContentHash> for HashArray {
    fn from_iter<I: IntoIterator<Item = ContentHash>>(iter: I) -> Self {
        HashArray { hashes: iter.into_iter().collect() }
    }
}

/// Every hash in `a` or `b`.
pub fn union(a: &HashArray, b: &HashArray) -> HashArray {
    let (a, b) = (a.as_slice(), b.as_slice());
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            out.push(a[i]);
            i += 1;
        } else if a[i] > b[j] {
            out.push(b[j]);
            j += 1;
        } else {
            out.push(a[i]);
            i += 1;
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);

    debug_assert!(out.len() >= a.len().max(b.len()));
    HashArray::from(out)
}

/// Every hash in both `a` and `b`.
pub fn intersection(a: &HashArray, b: &HashArray) -> HashArray {
    let (a, b) = (a.as_slice(), b.as_slice());
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            i += 1;
        } else if a[i] > b[j] {
            j += 1;
        } else {
            out.push(a[i]);
            i += 1;
            j += 1;
        }
    }

    debug_assert!(out.len() <= a.len().min(b.len()));
    HashArray::from(out)
}

/// Every hash in `a` that is not in `b`.
pub fn complement(a: &HashArray, b: &HashArray) -> HashArray {
    let (a, b) = (a.as_slice(), b.as_slice());
    let mut out = Vec::with_capacity(a.len());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            out.push(a[i]);
            i += 1;
        } else if a[i] > b[j] {
            j += 1;
        } else {
            i += 1;
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);

    debug_assert!(out.len() <= a.len());
    HashArray::from(out)
}
