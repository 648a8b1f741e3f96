mod cose;
mod ring;
mod x509;

pub use cose::{decode_credential_public_key, DecodedPublicKey};
pub use self::ring::{RingCrypto, SystemChallengeGenerator};
pub(crate) use x509::certificate_public_key;

use serde::{Deserialize, Serialize};

/// Identifies a cryptographic algorithm.
///
/// [See more](https://w3c.github.io/webauthn/#typedefdef-cosealgorithmidentifier)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoseAlgorithmIdentifier(pub i32);

impl CoseAlgorithmIdentifier {
    /// ECDSA with SHA-256 on P-256.
    pub const ES256: CoseAlgorithmIdentifier = CoseAlgorithmIdentifier(-7);
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    pub const RS256: CoseAlgorithmIdentifier = CoseAlgorithmIdentifier(-257);
}

/// Public key material in the form the verification backend consumes, together
/// with the algorithm it verifies under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyingKey {
    /// Uncompressed SEC1 point, `0x04 || x || y`; verifies ES256 signatures
    /// (ASN.1/DER-encoded ECDSA, as authenticators emit them).
    P256 { point: Vec<u8> },
    /// DER `RSAPublicKey`; verifies RS256 signatures.
    Rsa { public_key: Vec<u8> },
}

impl VerifyingKey {
    pub fn algorithm(&self) -> CoseAlgorithmIdentifier {
        match self {
            VerifyingKey::P256 { .. } => CoseAlgorithmIdentifier::ES256,
            VerifyingKey::Rsa { .. } => CoseAlgorithmIdentifier::RS256,
        }
    }
}

/// The cryptographic primitives the ceremonies are built from. Implementations
/// must be pure functions of their inputs; the pipelines call them from any
/// thread without synchronization.
pub trait Crypto: Send + Sync {
    /// SHA-256.
    fn hash(&self, data: &[u8]) -> [u8; 32];

    /// Verifies `signature` over `signed_data` under `key`.
    fn verify_signature(&self, key: &VerifyingKey, signed_data: &[u8], signature: &[u8]) -> bool;

    /// Whether `chain` (leaf first, DER) verifies up to one of `roots` (DER).
    fn check_cert_path(&self, chain: &[Vec<u8>], roots: &[Vec<u8>]) -> bool;
}

/// Constant-time equality for secret-bearing comparisons (challenge, token
/// binding id). Runtime does not depend on the position of the first
/// differing byte.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    ::ring::constant_time::verify_slices_are_equal(a, b).is_ok()
}
