use std::collections::HashSet;

/// 64-bit content fingerprint: the first eight bytes of the MD5 digest,
/// little-endian. Stable across runs, processes and platforms.
pub fn fingerprint(value: &str) -> u64 {
    let digest = md5::compute(value.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.0[..8]);
    u64::from_le_bytes(prefix)
}

/// Set of fingerprints used for hash-based deduplication.
#[derive(Debug, Default, Clone)]
pub struct FingerprintSet(HashSet<u64>);

impl FingerprintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value`; returns `true` the first time it is seen.
    pub fn insert(&mut self, value: &str) -> bool {
        self.0.insert(fingerprint(value))
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.contains(&fingerprint(value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
