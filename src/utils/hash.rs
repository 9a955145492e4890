use sha2::{Digest, Sha256};

/// 32-bit djb2 hash of the UTF-16 code units of `input`, as a signed decimal string.
///
/// Used for cache keys only; collisions are tolerated.
pub fn hash_string(input: &str) -> String {
    let mut hash: i32 = 5381;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_add(hash)
            .wrapping_add(i32::from(unit));
    }
    hash.to_string()
}

/// Lowercase hex SHA-256 digest
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_hash_empty_string_to_seed() {
        assert_eq!(hash_string(""), "5381");
    }

    #[test]
    fn should_hash_short_string() {
        // 5381 * 33 + 'a'(97)
        assert_eq!(hash_string("a"), "177670");
    }

    #[test]
    fn should_wrap_on_overflow() {
        let long = "x".repeat(64);

        let hash: i64 = hash_string(&long).parse().unwrap();

        assert!(hash >= i64::from(i32::MIN) && hash <= i64::from(i32::MAX));
    }

    #[test]
    fn should_be_deterministic() {
        assert_eq!(hash_string("gpt-4.1-nano|hello"), hash_string("gpt-4.1-nano|hello"));
        assert_ne!(hash_string("hello"), hash_string("hellp"));
    }

    #[test]
    fn should_produce_sha256_hex() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
