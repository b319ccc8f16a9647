//! Cryptographic Utilities

use base64::{Engine, engine::general_purpose};
use rand::{RngCore, rngs::OsRng};

/// Generate cryptographically secure random bytes
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Encode bytes as URL-safe base64 without padding
pub fn to_base64_url(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode standard base64 (as used by HTTP Basic credentials)
pub fn from_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(s)
}

/// Generate an opaque token of exactly `length` URL-safe characters
///
/// `length` random bytes are drawn and encoded; the encoding of n bytes is
/// never shorter than n characters, so the result is simply truncated.
pub fn random_token(length: usize) -> String {
    let mut token = to_base64_url(&random_bytes(length));
    token.truncate(length);
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes() {
        let bytes = random_bytes(32);
        assert_eq!(bytes.len(), 32);
        // Should not be all zeros (statistically)
        assert!(bytes.iter().any(|&b| b != 0));
        assert!(random_bytes(0).is_empty());
    }

    #[test]
    fn test_random_token_length_and_alphabet() {
        for length in [16, 24, 25, 64] {
            let token = random_token(length);
            assert_eq!(token.len(), length);
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }
    }

    #[test]
    fn test_random_tokens_differ() {
        assert_ne!(random_token(24), random_token(24));
    }

    #[test]
    fn test_base64_url_has_no_padding() {
        assert_eq!(to_base64_url(&[0xfb, 0xff]), "-_8");
    }

    #[test]
    fn test_from_base64() {
        assert_eq!(from_base64("YWxpY2U6cHdk").unwrap(), b"alice:pwd");
        assert!(from_base64("***").is_err());
    }
}
