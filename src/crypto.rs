use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;

const HKDF_SALT: &[u8] = b"factubic-v1";
const HKDF_INFO: &[u8] = b"hka-credentials";
const NONCE_LEN: usize = 12;

/// AES-256-GCM sealing for the HKA passwords and API keys kept in
/// `configurations`. Sealed values are the nonce followed by the ciphertext.
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// Derive the cipher key from `FACTUBIC_ENCRYPTION_KEY` with HKDF-SHA256.
    pub fn new(master_key: &str) -> Self {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), master_key.as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(HKDF_INFO, &mut okm)
            .expect("32 bytes is a valid HKDF-SHA256 output length");
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&okm)),
        }
    }

    pub fn seal(&self, secret: &str) -> Result<Vec<u8>, String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, secret.as_bytes())
            .map_err(|e| format!("Failed to seal credential: {e}"))?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Blank or absent secrets are not stored.
    pub fn seal_optional(&self, secret: Option<&str>) -> Result<Option<Vec<u8>>, String> {
        secret
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| self.seal(s))
            .transpose()
    }

    pub fn open(&self, sealed: &[u8]) -> Result<String, String> {
        if sealed.len() < NONCE_LEN {
            return Err("Sealed credential too short".to_string());
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| format!("Failed to open credential: {e}"))?;

        String::from_utf8(plaintext).map_err(|e| format!("Invalid UTF-8: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_only_with_the_sealing_key() {
        let sealed = CredentialCipher::new("key-one").seal("clave-secreta").unwrap();
        assert_eq!(
            CredentialCipher::new("key-one").open(&sealed).unwrap(),
            "clave-secreta"
        );
        assert!(CredentialCipher::new("key-two").open(&sealed).is_err());
        assert!(CredentialCipher::new("key-one").open(&sealed[..8]).is_err());
    }

    #[test]
    fn blank_secrets_are_not_stored() {
        let cipher = CredentialCipher::new("k");
        assert!(cipher.seal_optional(Some("  ")).unwrap().is_none());
        assert!(cipher.seal_optional(None).unwrap().is_none());
        assert!(cipher.seal_optional(Some("x")).unwrap().is_some());
    }
}
