/// A 32-byte BLAKE3 digest.
pub type Digest = [u8; 32];

/// Domain-separated, order-sensitive BLAKE3 digest over a sequence of keys.
///
/// The domain tag is prepended to every computation so a cell digest can
/// never collide with a digest of the same bytes taken for another purpose.
/// Keys are fed without delimiters: the digest of `["ab", "c"]` equals the
/// digest of `["a", "bc"]`, exactly as the digest of their concatenation.
pub struct KeyDigest {
    domain: &'static str,
}

impl KeyDigest {
    /// Digest of a cell's ordered item keys.
    pub const CELL: Self = Self {
        domain: "geostore-cell-v1",
    };

    /// Create a digest with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Digest the concatenation of `keys`, in iteration order.
    pub fn digest<I, K>(&self, keys: I) -> Digest
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut hasher = self.start();
        for key in keys {
            hasher.update(key.as_ref());
        }
        *hasher.finalize().as_bytes()
    }

    /// Digest an already concatenated byte string.
    pub fn digest_bytes(&self, data: &[u8]) -> Digest {
        let mut hasher = self.start();
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }

    /// Check that `keys` produce `expected`.
    pub fn verify<I, K>(&self, keys: I, expected: &[u8]) -> bool
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        self.digest(keys).as_slice() == expected
    }

    /// Short hex representation (first 8 characters) for logs.
    pub fn short_hex(digest: &[u8]) -> String {
        hex::encode(&digest[..digest.len().min(4)])
    }

    /// The domain tag used by this digest.
    pub fn domain(&self) -> &str {
        self.domain
    }

    fn start(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = KeyDigest::CELL.digest(["a", "b"]);
        let b = KeyDigest::CELL.digest(["a", "b"]);
        assert_eq!(a, b);
    }

    #[test]
    fn digest_equals_digest_of_concatenation() {
        let keys = ["station-1", "station-2", "x"];
        let concat: Vec<u8> = keys.iter().flat_map(|k| k.bytes()).collect();
        assert_eq!(
            KeyDigest::CELL.digest(keys),
            KeyDigest::CELL.digest_bytes(&concat)
        );
    }

    #[test]
    fn order_matters() {
        assert_ne!(
            KeyDigest::CELL.digest(["a", "b"]),
            KeyDigest::CELL.digest(["b", "a"])
        );
    }

    #[test]
    fn empty_sequence_has_stable_digest() {
        let empty: [&str; 0] = [];
        assert_eq!(KeyDigest::CELL.digest(empty), KeyDigest::CELL.digest_bytes(b""));
    }

    #[test]
    fn domains_separate_digests() {
        let custom = KeyDigest::new("other-v1");
        assert_ne!(custom.digest(["k"]), KeyDigest::CELL.digest(["k"]));
        assert_eq!(custom.domain(), "other-v1");
    }

    #[test]
    fn verify_detects_changes() {
        let d = KeyDigest::CELL.digest(["a"]);
        assert!(KeyDigest::CELL.verify(["a"], &d));
        assert!(!KeyDigest::CELL.verify(["a", "b"], &d));
    }

    #[test]
    fn short_hex_is_8_chars() {
        let d = KeyDigest::CELL.digest(["a"]);
        assert_eq!(KeyDigest::short_hex(&d).len(), 8);
    }
}
