//! Cryptographic primitives for Bucket Chat.
//!
//! Wraps Ed25519 signing with strong types and base64 text forms.
//! Verification never errors: untrusted input is expected, so every failure
//! mode collapses to `false`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CoreError;

/// Public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Private key (seed) length in bytes.
pub const PRIVATE_KEY_LEN: usize = 32;

/// Signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, rejecting wrong lengths.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; PUBLIC_KEY_LEN] =
            bytes.try_into().map_err(|_| CoreError::InvalidPublicKey)?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, CoreError> {
        let bytes = BASE64
            .decode(s.trim())
            .map_err(|e| CoreError::DecodingError(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Short hex fingerprint for display and logs.
    pub fn fingerprint(&self) -> String {
        hex::encode(&Sha256::digest(self.0)[..8])
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = DalekSignature::from_bytes(&signature.0);
        verifying_key.verify(message, &sig).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; PUBLIC_KEY_LEN]> for PublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_LEN]);

impl Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Parse base64 text; `None` for bad encodings or wrong lengths.
    pub fn from_base64(s: &str) -> Option<Self> {
        let bytes = BASE64.decode(s).ok()?;
        let arr: [u8; SIGNATURE_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &hex::encode(self.0)[..16])
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; SIGNATURE_LEN]> for Signature {
    fn from(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }
}

/// A keypair for signing events.
///
/// This wraps ed25519-dalek's SigningKey.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let signing_key = SigningKey::generate(&mut rng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed (the private key bytes).
    pub fn from_seed(seed: &[u8; PRIVATE_KEY_LEN]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Create from private key bytes, rejecting wrong lengths.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let seed: [u8; PRIVATE_KEY_LEN] =
            bytes.try_into().map_err(|_| CoreError::InvalidPrivateKey)?;
        Ok(Self::from_seed(&seed))
    }

    pub fn from_private_base64(s: &str) -> Result<Self, CoreError> {
        let bytes = BASE64
            .decode(s.trim())
            .map_err(|e| CoreError::DecodingError(e.to_string()))?;
        Self::from_private_bytes(&bytes)
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing_key.sign(message);
        Signature(sig.to_bytes())
    }

    /// Get the raw seed bytes (secret key material).
    pub fn private_key_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        self.signing_key.to_bytes()
    }

    pub fn private_key_base64(&self) -> String {
        BASE64.encode(self.private_key_bytes())
    }

    /// Export for a key store.
    pub fn export(&self) -> KeypairExport {
        KeypairExport {
            public_key: self.public_key().to_base64(),
            private_key: self.private_key_base64(),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

/// Serialized form of a keypair, as handed to a key store.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeypairExport {
    pub public_key: String,
    pub private_key: String,
    pub created_at: DateTime<Utc>,
}

impl KeypairExport {
    /// Rebuild the keypair; the stored public key must match the private key.
    pub fn to_keypair(&self) -> Result<Keypair, CoreError> {
        let keypair = Keypair::from_private_base64(&self.private_key)?;
        if keypair.public_key().to_base64() != self.public_key {
            return Err(CoreError::InvalidPublicKey);
        }
        Ok(keypair)
    }
}

impl fmt::Debug for KeypairExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeypairExport")
            .field("public_key", &self.public_key)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Sign bytes, returning base64 signature text.
pub fn sign(data: &[u8], keypair: &Keypair) -> String {
    keypair.sign(data).to_base64()
}

/// Verify base64 signature text over `data` with raw public key bytes.
///
/// Returns `false` for malformed signatures, wrong-length keys and
/// mismatched data alike.
pub fn verify(data: &[u8], signature: &str, public_key: &[u8]) -> bool {
    let Ok(key) = PublicKey::from_slice(public_key) else {
        return false;
    };
    let Some(sig) = Signature::from_base64(signature) else {
        return false;
    };
    key.verify(data, &sig)
}
