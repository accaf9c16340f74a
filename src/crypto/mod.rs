//! RSA-OAEP/SHA-1 key-unwrap + AES-GCM (16-byte nonce) envelope decryption.
//!
//! Ported from the original Go `decryption.go`
//! (`monitor/lib/feat_flag/decryption.go`): the AES data key is sealed with
//! RSA-OAEP/SHA-1, then the payload is sealed with AES-GCM using a
//! *non-standard* 16-byte nonce (Go's `cipher.NewGCMWithNonceSize(block,
//! 16)`) rather than the usual 12-byte nonce — `aes-gcm`'s generic `AesGcm`
//! type parameterizes over nonce size precisely so we can match this.

use aes_gcm::aead::{generic_array::GenericArray, Aead, KeyInit};
use aes_gcm::aes::{Aes128, Aes256};
use aes_gcm::AesGcm;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use serde::Deserialize;
use sha1::Sha1;

use crate::error::{MonitorError, MonitorResult};

type Aes128GcmNonce16 = AesGcm<Aes128, aes_gcm::aead::consts::U16>;
type Aes256GcmNonce16 = AesGcm<Aes256, aes_gcm::aead::consts::U16>;

/// Wire shape of the sealed feature-flag payload: every field is
/// base64-standard-encoded, matching the original's `EncryptedData` struct.
#[derive(Debug, Clone, Deserialize)]
pub struct EncryptedEnvelope {
    pub aes_key: String,
    pub nonce: String,
    #[serde(rename = "ciphertext")]
    pub cipher_text: String,
    pub tag: String,
}

/// Parse a PEM-encoded RSA private key, trying PKCS#1 first and falling back
/// to PKCS#8 — the original only speaks PKCS#8 via `youmark/pkcs8`, but both
/// encodings are common for operator-provided keys, so we accept either.
pub fn parse_private_key(pem: &str) -> MonitorResult<RsaPrivateKey> {
    if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(pem) {
        return Ok(key);
    }
    RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|err| MonitorError::crypto(format!("failed to parse RSA private key: {err}")))
}

/// Unwrap the AES key with RSA-OAEP/SHA-1, then open the AES-GCM (16-byte
/// nonce) payload and deserialize the resulting JSON into `T`.
pub fn decrypt_envelope<T>(envelope: &EncryptedEnvelope, private_key: &RsaPrivateKey) -> MonitorResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let plaintext = decrypt_envelope_bytes(envelope, private_key)?;
    serde_json::from_slice(&plaintext)
        .map_err(|err| MonitorError::crypto(format!("failed to parse decrypted payload as json: {err}")))
}

/// Unwrap the AES key and open the AES-GCM payload, returning the raw
/// plaintext bytes.
pub fn decrypt_envelope_bytes(
    envelope: &EncryptedEnvelope,
    private_key: &RsaPrivateKey,
) -> MonitorResult<Vec<u8>> {
    let aes_key_sealed = STANDARD
        .decode(&envelope.aes_key)
        .map_err(|err| MonitorError::crypto(format!("error decoding aes key: {err}")))?;
    let nonce = STANDARD
        .decode(&envelope.nonce)
        .map_err(|err| MonitorError::crypto(format!("error decoding nonce: {err}")))?;
    let ciphertext = STANDARD
        .decode(&envelope.cipher_text)
        .map_err(|err| MonitorError::crypto(format!("error decoding ciphertext: {err}")))?;
    let tag = STANDARD
        .decode(&envelope.tag)
        .map_err(|err| MonitorError::crypto(format!("error decoding tag: {err}")))?;

    let aes_key = private_key
        .decrypt(Oaep::new::<Sha1>(), &aes_key_sealed)
        .map_err(|err| MonitorError::crypto(format!("error decrypting aes key: {err}")))?;

    let mut combined = ciphertext;
    combined.extend_from_slice(&tag);
    let nonce = GenericArray::from_slice(&nonce);

    let plaintext = match aes_key.len() {
        16 => {
            let cipher = Aes128GcmNonce16::new(GenericArray::from_slice(&aes_key));
            cipher
                .decrypt(nonce, combined.as_ref())
                .map_err(|err| MonitorError::crypto(format!("error decrypting ciphertext: {err}")))?
        }
        32 => {
            let cipher = Aes256GcmNonce16::new(GenericArray::from_slice(&aes_key));
            cipher
                .decrypt(nonce, combined.as_ref())
                .map_err(|err| MonitorError::crypto(format!("error decrypting ciphertext: {err}")))?
        }
        other => {
            return Err(MonitorError::crypto(format!(
                "unsupported aes key length: {other} bytes"
            )))
        }
    };

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::aead::rand_core::{OsRng, RngCore};
    use rsa::pkcs8::EncodePrivateKey;
    use rsa::traits::PublicKeyParts;

    fn gen_key_pair() -> (RsaPrivateKey, rsa::RsaPublicKey) {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let public_key = rsa::RsaPublicKey::from(&private_key);
        (private_key, public_key)
    }

    fn seal_envelope(
        public_key: &rsa::RsaPublicKey,
        plaintext: &[u8],
    ) -> EncryptedEnvelope {
        let mut aes_key = [0u8; 32];
        OsRng.fill_bytes(&mut aes_key);
        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);

        let cipher = Aes256GcmNonce16::new(GenericArray::from_slice(&aes_key));
        let sealed = cipher
            .encrypt(GenericArray::from_slice(&nonce), plaintext)
            .unwrap();
        let (ciphertext, tag) = sealed.split_at(sealed.len() - 16);

        let aes_key_sealed = public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha1>(), &aes_key)
            .unwrap();

        EncryptedEnvelope {
            aes_key: STANDARD.encode(aes_key_sealed),
            nonce: STANDARD.encode(nonce),
            cipher_text: STANDARD.encode(ciphertext),
            tag: STANDARD.encode(tag),
        }
    }

    #[test]
    fn round_trips_json_payload_through_the_envelope() {
        let (private_key, public_key) = gen_key_pair();
        let payload = serde_json::json!({"flag": "dark-mode", "enabled": true});
        let envelope = seal_envelope(&public_key, payload.to_string().as_bytes());

        let decrypted: serde_json::Value = decrypt_envelope(&envelope, &private_key).unwrap();
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn parse_private_key_accepts_pkcs8_pem() {
        let (private_key, _) = gen_key_pair();
        let pem = private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap();
        let parsed = parse_private_key(&pem).unwrap();
        assert_eq!(parsed.n(), private_key.n());
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let (private_key, public_key) = gen_key_pair();
        let mut envelope = seal_envelope(&public_key, b"{\"flag\":true}");
        // Flip a byte in the ciphertext to force an authentication failure.
        let mut raw = STANDARD.decode(&envelope.cipher_text).unwrap();
        raw[0] ^= 0xFF;
        envelope.cipher_text = STANDARD.encode(raw);

        let result: MonitorResult<serde_json::Value> = decrypt_envelope(&envelope, &private_key);
        assert!(result.is_err());
    }
}
