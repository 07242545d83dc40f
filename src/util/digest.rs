use std::collections::HashSet;

use sha2::{Digest, Sha256};

use super::{shingle::shingles, similarity::jaccard_similarity};

/// SHA-256 of a single shingle.
pub type ShingleDigest = [u8; 32];

pub fn digest_shingle(shingle: &str) -> ShingleDigest {
    Sha256::digest(shingle.as_bytes()).into()
}

/// Unique shingle digests of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestSet {
    digests: HashSet<ShingleDigest>,
}

impl DigestSet {
    pub fn from_text(text: &str, window_sizes: &[usize]) -> Self {
        let mut set = Self::default();
        for shingle in shingles(text, window_sizes) {
            set.insert_shingle(&shingle);
        }
        set
    }

    pub fn insert_shingle(&mut self, shingle: &str) -> bool {
        self.digests.insert(digest_shingle(shingle))
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Jaccard overlap with `other` as a fraction in `[0, 1]`.
    pub fn similarity(&self, other: &DigestSet) -> f64 {
        jaccard_similarity(&self.digests, &other.digests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(digest: &ShingleDigest) -> String {
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    #[test]
    fn digest_is_sha256() {
        assert_eq!(
            hex(&digest_shingle("abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn duplicate_shingles_collapse() {
        let mut set = DigestSet::default();
        assert!(set.insert_shingle("same words"));
        assert!(!set.insert_shingle("same words"));
        assert!(set.insert_shingle("other words"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn repeated_phrasing_collapses_in_from_text() {
        let set = DigestSet::from_text("x y x y", &[2]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn identical_text_yields_identical_sets() {
        let text = "a b c d e f g h i j k l m n";
        assert_eq!(
            DigestSet::from_text(text, &[5, 7, 9]),
            DigestSet::from_text(text, &[5, 7, 9])
        );
    }

    #[test]
    fn short_text_yields_empty_set() {
        assert!(DigestSet::from_text("too short", &[5]).is_empty());
    }
}
