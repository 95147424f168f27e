use kvlog_types::ValueId;

/// Normalize a payload before hashing or storing it.
///
/// Surrounding whitespace is not part of a value.
pub fn normalize(payload: &str) -> &str {
    payload.trim()
}

/// Domain-separated BLAKE3 content hasher.
///
/// The domain tag is prepended to every hash computation, so ids minted for
/// values never collide with hashes of the same bytes used elsewhere.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for value records.
    pub const VALUE: Self = Self {
        domain: "kvlog-value-v1",
    };

    /// Hash a payload as given, without normalizing it.
    pub fn hash(&self, payload: &str) -> ValueId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(payload.as_bytes());
        ValueId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that `payload` hashes to `expected`.
    pub fn verify(&self, payload: &str, expected: &ValueId) -> bool {
        self.hash(payload) == *expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let id1 = ContentHasher::VALUE.hash("hello world");
        let id2 = ContentHasher::VALUE.hash("hello world");
        assert_eq!(id1, id2);
    }

    #[test]
    fn different_payloads_differ() {
        assert_ne!(
            ContentHasher::VALUE.hash("hello"),
            ContentHasher::VALUE.hash("world")
        );
    }

    #[test]
    fn normalized_payloads_share_an_id() {
        assert_eq!(
            ContentHasher::VALUE.hash(normalize("  padded\n")),
            ContentHasher::VALUE.hash("padded")
        );
    }

    #[test]
    fn hash_does_not_normalize() {
        assert_ne!(
            ContentHasher::VALUE.hash(" padded"),
            ContentHasher::VALUE.hash("padded")
        );
    }

    #[test]
    fn domain_separation() {
        assert_ne!(
            ContentHasher::VALUE.hash("data"),
            ValueId::from_hash(*blake3::hash(b"data").as_bytes())
        );
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::VALUE.hash("original");
        assert!(ContentHasher::VALUE.verify("original", &id));
        assert!(!ContentHasher::VALUE.verify("tampered", &id));
    }

    #[test]
    fn normalize_trims_unicode_whitespace() {
        assert_eq!(normalize("\u{3000} value \t\r\n"), "value");
        assert_eq!(normalize("   "), "");
    }
}
