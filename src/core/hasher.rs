use sha1::Sha1;
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of normalized content.
///
/// Two captures are equal for diffing purposes iff their digests match.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-1 hex digest of a URL, used as a snapshot key.
pub fn url_hash(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        let text = "Help Center\n\nWhat is AgeGO?\nAn age verification service.";
        assert_eq!(content_hash(text), content_hash(text));
        assert_eq!(content_hash(text).len(), 64);
    }

    #[test]
    fn test_content_hash_known_vector() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_content_hash_distinguishes_whitespace() {
        assert_ne!(content_hash("A\nB"), content_hash("A\nB\n"));
    }

    #[test]
    fn test_url_hash_known_vector() {
        assert_eq!(url_hash("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(url_hash("https://example.com").len(), 40);
    }
}
