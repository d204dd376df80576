use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 digest of `bytes` as uppercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(bytes))
}

/// HMAC-SHA256 of `bytes` keyed with `secret`, as uppercase hex.
pub fn hmac_sha256_hex(secret: &[u8], bytes: &[u8]) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(bytes);

    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}

/// Compare two digests without short-circuiting on the first differing byte.
///
/// Length is not secret: mismatched lengths return `false` immediately.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let actual_bytes = actual.as_bytes();

    if expected_bytes.len() != actual_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(actual_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
        );
    }

    #[test]
    fn test_hmac_differs_by_key() {
        let body = br#"{"timestamp":"2024-01-01T00:00:00.000Z"}"#;
        let a = hmac_sha256_hex(b"partner-a", body).unwrap();
        let b = hmac_sha256_hex(b"partner-b", body).unwrap();

        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_digests_match() {
        let digest = sha256_hex(b"payload");
        assert!(digests_match(&digest, &digest.clone()));

        let tampered = format!("0{}", &digest[1..]);
        assert!(!digests_match(&digest, &tampered));
        assert!(!digests_match(&digest, &digest[1..]));
    }
}
