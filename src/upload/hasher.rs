//! Content hashing for content-addressed storage keys

use sha2::{Digest, Sha256};

/// Extension appended to every object key
///
/// Applied regardless of the uploaded image type.
pub const OBJECT_KEY_EXTENSION: &str = "png";

/// Lowercase hex SHA-256 of `data`
pub fn content_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Storage key for `data`: `<digest>.png`
pub fn object_key(data: &[u8]) -> String {
    format!("{}.{}", content_digest(data), OBJECT_KEY_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_length_and_case() {
        let digest = content_digest(b"Hello, World!");
        assert_eq!(digest.len(), 64); // SHA-256 = 32 bytes = 64 hex chars
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(
            content_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_is_stable() {
        let data = vec![7u8; 4096];
        assert_eq!(content_digest(&data), content_digest(&data.clone()));
    }

    #[test]
    fn test_single_bit_flip_changes_digest() {
        let original = b"\x89PNG\r\n\x1a\n\x00\x00".to_vec();
        let mut flipped = original.clone();
        flipped[9] ^= 0x01;
        assert_ne!(content_digest(&original), content_digest(&flipped));
    }

    #[test]
    fn test_object_key_format() {
        let key = object_key(b"abc");
        assert_eq!(
            key,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad.png"
        );
    }

    #[test]
    fn test_object_key_is_png_for_non_png_content() {
        // JPEG and GIF uploads still get a .png key
        let jpeg = b"\xff\xd8\xff\xe0\x00\x10JFIF";
        let gif = b"GIF89a\x01\x00\x01\x00";
        assert!(object_key(jpeg).ends_with(".png"));
        assert!(object_key(gif).ends_with(".png"));
    }
}
