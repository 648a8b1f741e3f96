//! Shared test fixtures: a `ring`-backed credential signer standing in for an
//! authenticator, an in-memory credential repository, static collaborator
//! stubs, and a minimal DER builder for attestation certificates.

use ciborium::value::Value;
use coset::{iana, CborSerializable, CoseKeyBuilder};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};

use crate::crypto::{Crypto, RingCrypto, VerifyingKey};
use crate::error::CollaboratorError;
use crate::storage::{
    ChallengeGenerator, CredentialRepository, MetadataService, RegisteredCredential,
};
use crate::types::{
    Aaguid, AuthenticatorData, AuthenticatorDataFlags, Challenge, CredentialId,
    PublicKeyCredentialDescriptor, UserHandle,
};

/// A P-256 keypair playing the authenticator's role in tests: it signs the
/// byte streams the pipelines verify.
pub(crate) struct P256Signer {
    keypair: EcdsaKeyPair,
    /// Uncompressed SEC1 point, `0x04 || x || y`.
    pub point: Vec<u8>,
}

impl P256Signer {
    pub fn generate() -> Self {
        let rng = SystemRandom::new();
        let document =
            EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng).unwrap();
        let keypair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, document.as_ref()).unwrap();
        let point = keypair.public_key().as_ref().to_vec();
        P256Signer { keypair, point }
    }

    /// ASN.1/DER-encoded ECDSA signature, as authenticators emit them.
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.keypair
            .sign(&SystemRandom::new(), data)
            .unwrap()
            .as_ref()
            .to_vec()
    }

    /// The credential public key in COSE_Key wire form.
    pub fn cose_public_key(&self) -> Vec<u8> {
        let (x, y) = self.point[1..].split_at(32);
        CoseKeyBuilder::new_ec2_pub_key(iana::EllipticCurve::P_256, x.to_owned(), y.to_owned())
            .algorithm(iana::Algorithm::ES256)
            .build()
            .to_vec()
            .unwrap()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey::P256 {
            point: self.point.clone(),
        }
    }
}

/// Builds authenticator data with attested credential data (UP | AT set,
/// counter 0) for `signer`'s public key, returning both the parsed struct and
/// the wire bytes.
pub(crate) fn attested_auth_data(
    rp_id: &[u8],
    aaguid: &[u8; 16],
    credential_id: &[u8],
    signer: &P256Signer,
) -> (AuthenticatorData, Vec<u8>) {
    let flags = AuthenticatorDataFlags::new()
        .with_user_present(true)
        .with_attested_data_included(true);
    let mut raw = RingCrypto.hash(rp_id).to_vec();
    raw.push(flags.into_bytes()[0]);
    raw.extend_from_slice(&0u32.to_be_bytes());
    raw.extend_from_slice(aaguid);
    raw.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
    raw.extend_from_slice(credential_id);
    raw.extend_from_slice(&signer.cose_public_key());
    (AuthenticatorData::parse(&raw).unwrap(), raw)
}

/// Header-only authenticator data for assertions.
pub(crate) fn assertion_auth_data(rp_id: &[u8], flags: u8, sign_count: u32) -> Vec<u8> {
    let mut raw = RingCrypto.hash(rp_id).to_vec();
    raw.push(flags);
    raw.extend_from_slice(&sign_count.to_be_bytes());
    raw
}

/// clientDataJSON in the 2018-03-20 shape. `extra` is spliced in verbatim
/// before the closing brace, e.g. `,"tokenBindingId":"YELLOWSUBMARINE"`.
pub(crate) fn client_data_json(challenge: &str, origin: &str, extra: &str) -> Vec<u8> {
    format!(
        r#"{{"challenge":"{challenge}","origin":"{origin}","hashAlgorithm":"SHA-256"{extra}}}"#
    )
    .into_bytes()
}

/// A CBOR map with text keys, in the given order.
pub(crate) fn cbor_map(entries: Vec<(String, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Value::Text(k), v))
            .collect(),
    )
}

/// Encodes an attestation object `{ fmt, authData, attStmt }`.
pub(crate) fn attestation_object_bytes(fmt: &str, auth_data: &[u8], att_stmt: Value) -> Vec<u8> {
    let object = cbor_map(vec![
        ("fmt".to_string(), Value::Text(fmt.to_string())),
        ("authData".to_string(), Value::Bytes(auth_data.to_vec())),
        ("attStmt".to_string(), att_stmt),
    ]);
    let mut bytes = vec![];
    ciborium::ser::into_writer(&object, &mut bytes).unwrap();
    bytes
}

/// In-memory credential store seeded at construction; reads only, like the
/// pipelines themselves.
#[derive(Default)]
pub(crate) struct MemoryRepository {
    entries: Vec<(String, RegisteredCredential)>,
}

impl MemoryRepository {
    pub fn new(entries: Vec<(String, RegisteredCredential)>) -> Self {
        MemoryRepository { entries }
    }
}

impl CredentialRepository for MemoryRepository {
    fn credential_ids_for_username(
        &self,
        username: &str,
    ) -> Result<Vec<PublicKeyCredentialDescriptor>, CollaboratorError> {
        Ok(self
            .entries
            .iter()
            .filter(|(name, _)| name == username)
            .map(|(_, cred)| cred.credential.clone())
            .collect())
    }

    fn user_handle_for_username(
        &self,
        username: &str,
    ) -> Result<Option<UserHandle>, CollaboratorError> {
        Ok(self
            .entries
            .iter()
            .find(|(name, _)| name == username)
            .map(|(_, cred)| cred.user_handle.clone()))
    }

    fn username_for_user_handle(
        &self,
        user_handle: &UserHandle,
    ) -> Result<Option<String>, CollaboratorError> {
        Ok(self
            .entries
            .iter()
            .find(|(_, cred)| &cred.user_handle == user_handle)
            .map(|(name, _)| name.clone()))
    }

    fn lookup(
        &self,
        credential_id: &CredentialId,
        user_handle: &UserHandle,
    ) -> Result<Option<RegisteredCredential>, CollaboratorError> {
        Ok(self
            .entries
            .iter()
            .find(|(_, cred)| {
                &cred.credential.id == credential_id && &cred.user_handle == user_handle
            })
            .map(|(_, cred)| cred.clone()))
    }

    fn lookup_all(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Vec<RegisteredCredential>, CollaboratorError> {
        Ok(self
            .entries
            .iter()
            .filter(|(_, cred)| &cred.credential.id == credential_id)
            .map(|(_, cred)| cred.clone())
            .collect())
    }
}

/// A repository whose every call fails, for collaborator-outage tests.
pub(crate) struct FailingRepository;

impl CredentialRepository for FailingRepository {
    fn credential_ids_for_username(
        &self,
        _username: &str,
    ) -> Result<Vec<PublicKeyCredentialDescriptor>, CollaboratorError> {
        Err("repository offline".into())
    }

    fn user_handle_for_username(
        &self,
        _username: &str,
    ) -> Result<Option<UserHandle>, CollaboratorError> {
        Err("repository offline".into())
    }

    fn username_for_user_handle(
        &self,
        _user_handle: &UserHandle,
    ) -> Result<Option<String>, CollaboratorError> {
        Err("repository offline".into())
    }

    fn lookup(
        &self,
        _credential_id: &CredentialId,
        _user_handle: &UserHandle,
    ) -> Result<Option<RegisteredCredential>, CollaboratorError> {
        Err("repository offline".into())
    }

    fn lookup_all(
        &self,
        _credential_id: &CredentialId,
    ) -> Result<Vec<RegisteredCredential>, CollaboratorError> {
        Err("repository offline".into())
    }
}

/// Always hands out the same challenge, so tests can pin the request bytes.
pub(crate) struct FixedChallenges(pub Challenge);

impl ChallengeGenerator for FixedChallenges {
    fn generate(&self) -> Result<Challenge, CollaboratorError> {
        Ok(self.0.clone())
    }
}

/// Metadata service with a fixed root set for every AAGUID.
pub(crate) struct StaticMetadata {
    roots: Vec<Vec<u8>>,
    metadata: Option<serde_json::Value>,
}

impl StaticMetadata {
    pub fn new(roots: Vec<Vec<u8>>, metadata: Option<serde_json::Value>) -> Self {
        StaticMetadata { roots, metadata }
    }
}

impl MetadataService for StaticMetadata {
    fn trust_roots(&self, _aaguid: &Aaguid) -> Result<Vec<Vec<u8>>, CollaboratorError> {
        Ok(self.roots.clone())
    }

    fn metadata(&self, _aaguid: &Aaguid) -> Result<Option<serde_json::Value>, CollaboratorError> {
        Ok(self.metadata.clone())
    }
}

// --- minimal DER, enough for a parseable X.509 v3 certificate ---

fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    match content.len() {
        len @ 0..=127 => out.push(len as u8),
        len @ 128..=255 => out.extend_from_slice(&[0x81, len as u8]),
        len => out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]),
    }
    out.extend_from_slice(content);
    out
}

/// `SEQUENCE { OID ecdsa-with-SHA256 }`
fn ecdsa_sha256_algorithm() -> Vec<u8> {
    der(
        0x30,
        &[0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02],
    )
}

/// A one-RDN name: `CN=<common_name>`.
fn name(common_name: &str) -> Vec<u8> {
    let mut atv_content = vec![0x06, 0x03, 0x55, 0x04, 0x03];
    atv_content.extend_from_slice(&der(0x0c, common_name.as_bytes()));
    der(0x30, &der(0x31, &der(0x30, &atv_content)))
}

/// `SubjectPublicKeyInfo` for an uncompressed P-256 point.
fn p256_spki(point: &[u8]) -> Vec<u8> {
    let mut algorithm = vec![0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
    algorithm.extend_from_slice(&[0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07]);
    let mut key_bits = vec![0x00];
    key_bits.extend_from_slice(point);
    let mut content = der(0x30, &algorithm);
    content.extend_from_slice(&der(0x03, &key_bits));
    der(0x30, &content)
}

/// Builds a minimal DER certificate binding `point` to `subject`. With a
/// `signer` the signature is a real ECDSA signature over the TBS bytes (so
/// chain checks pass); without one the signature is syntactically valid
/// garbage, fine for tests that only read the subject key.
pub(crate) fn build_certificate(
    subject: &str,
    issuer: &str,
    point: &[u8],
    signer: Option<&P256Signer>,
) -> Vec<u8> {
    let mut tbs_content = der(0xa0, &der(0x02, &[0x02]));
    tbs_content.extend_from_slice(&der(0x02, &[0x01]));
    tbs_content.extend_from_slice(&ecdsa_sha256_algorithm());
    tbs_content.extend_from_slice(&name(issuer));
    let mut validity = der(0x17, b"200101000000Z");
    validity.extend_from_slice(&der(0x17, b"400101000000Z"));
    tbs_content.extend_from_slice(&der(0x30, &validity));
    tbs_content.extend_from_slice(&name(subject));
    tbs_content.extend_from_slice(&p256_spki(point));
    let tbs = der(0x30, &tbs_content);

    let signature = match signer {
        Some(signer) => signer.sign(&tbs),
        None => der(0x30, &[der(0x02, &[0x01]), der(0x02, &[0x01])].concat()),
    };
    let mut signature_bits = vec![0x00];
    signature_bits.extend_from_slice(&signature);

    let mut cert_content = tbs;
    cert_content.extend_from_slice(&ecdsa_sha256_algorithm());
    cert_content.extend_from_slice(&der(0x03, &signature_bits));
    der(0x30, &cert_content)
}

/// A registration entry for the in-memory repository.
pub(crate) fn registered(
    credential_id: &[u8],
    user_handle: &[u8],
    signer: &P256Signer,
    signature_count: u32,
) -> RegisteredCredential {
    RegisteredCredential {
        credential: PublicKeyCredentialDescriptor::new(CredentialId(credential_id.to_vec())),
        user_handle: UserHandle(user_handle.to_vec()),
        public_key_cose: signer.cose_public_key(),
        signature_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::certificate_public_key;

    #[test]
    fn built_certificates_parse() {
        let signer = P256Signer::generate();
        let cert = build_certificate("Subject", "Issuer", &signer.point, None);
        let key = certificate_public_key(&cert).unwrap();
        assert_eq!(key, signer.verifying_key());
    }
}
