//! Attestation statement verification. Each registered format decodes its own
//! `attStmt` shape and validates the statement signature; the trust decision
//! over the resulting certificate chain is a separate step
//! ([`trust`]).

mod fido_u2f;
mod none;
mod packed;
pub(crate) mod trust;

use std::collections::HashMap;

use ciborium::value::Value;
use once_cell::sync::Lazy;

use crate::crypto::Crypto;
use crate::error::WebAuthnError;
use crate::types::AuthenticatorData;

/// Provenance class of an attestation statement.
/// [See more](https://www.w3.org/TR/webauthn/#sctn-attestation-types)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationType {
    Basic,
    SelfAttestation,
    AttCa,
    Ecdaa,
    None,
    Unknown,
}

/// Outcome of a statement verifier: the statement checked out, with this
/// provenance and this certificate chain to judge trust over.
#[derive(Debug, Clone)]
pub struct VerifiedAttestation {
    pub attestation_type: AttestationType,
    /// Certificate chain (DER, leaf first); empty for self, none and unknown
    /// attestation.
    pub trust_path: Vec<Vec<u8>>,
}

impl VerifiedAttestation {
    fn without_path(attestation_type: AttestationType) -> Self {
        Self {
            attestation_type,
            trust_path: vec![],
        }
    }
}

/// A verifier for one attestation statement format.
pub trait AttestationFormat: Send + Sync {
    fn verify(
        &self,
        crypto: &dyn Crypto,
        att_stmt: &Value,
        auth_data: &AuthenticatorData,
        raw_auth_data: &[u8],
        client_data_hash: &[u8; 32],
    ) -> Result<VerifiedAttestation, WebAuthnError>;
}

/// Formats an authenticator may claim but this RP has no verifier for. The
/// statement is accepted as opaque; the trust step refuses to mark it trusted.
struct UnknownFormat;

impl AttestationFormat for UnknownFormat {
    fn verify(
        &self,
        _crypto: &dyn Crypto,
        _att_stmt: &Value,
        _auth_data: &AuthenticatorData,
        _raw_auth_data: &[u8],
        _client_data_hash: &[u8; 32],
    ) -> Result<VerifiedAttestation, WebAuthnError> {
        Ok(VerifiedAttestation::without_path(AttestationType::Unknown))
    }
}

static UNKNOWN: UnknownFormat = UnknownFormat;

static FORMATS: Lazy<HashMap<&'static str, &'static dyn AttestationFormat>> = Lazy::new(|| {
    let mut formats: HashMap<&'static str, &'static dyn AttestationFormat> = HashMap::new();
    formats.insert("none", &none::NoneFormat);
    formats.insert("fido-u2f", &fido_u2f::FidoU2fFormat);
    formats.insert("packed", &packed::PackedFormat);
    formats
});

/// Resolves the verifier for an attestation format string.
pub fn verifier_for(fmt: &str) -> &'static dyn AttestationFormat {
    FORMATS.get(fmt).copied().unwrap_or(&UNKNOWN)
}
