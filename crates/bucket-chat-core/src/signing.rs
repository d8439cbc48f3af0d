//! Record-level signing and verification.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_bytes;
use crate::crypto::{self, Keypair, PublicKey};
use crate::event::Event;

/// Outcome of checking one event's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    /// Signature verifies against the sender's key.
    Valid,
    /// Signature present but does not verify.
    Invalid,
    /// No signature attached.
    Missing,
    /// No public key known for the sender.
    UnknownSender,
}

impl SignatureStatus {
    pub fn is_valid(self) -> bool {
        self == SignatureStatus::Valid
    }
}

/// Sign an event, replacing any existing signature.
pub fn sign_record(event: Event, keypair: &Keypair) -> Event {
    let signature = crypto::sign(&canonical_bytes(&event), keypair);
    event.with_signature(signature)
}

/// Verify an event's signature. `false` when absent, empty or wrong.
pub fn verify_record(event: &Event, public_key: &PublicKey) -> bool {
    match event.signature() {
        Some(sig) if !sig.is_empty() => {
            crypto::verify(&canonical_bytes(event), sig, public_key.as_bytes())
        }
        _ => false,
    }
}

/// Classify an event's signature, given the sender's key if known.
pub fn signature_status(event: &Event, public_key: Option<&PublicKey>) -> SignatureStatus {
    if !event.is_signed() {
        return SignatureStatus::Missing;
    }
    match public_key {
        None => SignatureStatus::UnknownSender,
        Some(pk) if verify_record(event, pk) => SignatureStatus::Valid,
        Some(_) => SignatureStatus::Invalid,
    }
}
