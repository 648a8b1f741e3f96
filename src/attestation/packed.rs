use ciborium::value::Value;
use serde::Deserialize;
use serde_bytes::ByteBuf;
use tracing::trace;

use crate::crypto::{self, decode_credential_public_key, Crypto};
use crate::error::WebAuthnError;
use crate::types::{AttestedCredentialData, AuthenticatorData};

use super::{AttestationFormat, AttestationType, VerifiedAttestation};

/// The `packed` format: a signature over `authData || clientDataHash`, made
/// either by an attestation certificate (Basic) or by the freshly created
/// credential key itself (Self).
/// [See more](https://www.w3.org/TR/webauthn/#packed-attestation)
pub(super) struct PackedFormat;

#[derive(Debug, Deserialize)]
struct PackedStatement {
    alg: i64,
    sig: ByteBuf,
    #[serde(default)]
    x5c: Option<Vec<ByteBuf>>,
    #[serde(default, rename = "ecdaaKeyId")]
    ecdaa_key_id: Option<ByteBuf>,
}

impl AttestationFormat for PackedFormat {
    fn verify(
        &self,
        crypto: &dyn Crypto,
        att_stmt: &Value,
        auth_data: &AuthenticatorData,
        raw_auth_data: &[u8],
        client_data_hash: &[u8; 32],
    ) -> Result<VerifiedAttestation, WebAuthnError> {
        let stmt: PackedStatement = att_stmt
            .deserialized()
            .map_err(|e| WebAuthnError::malformed("packed statement", e))?;
        if stmt.ecdaa_key_id.is_some() {
            return Err(WebAuthnError::AttestationFormatUnsupported(
                "packed (ECDAA)".into(),
            ));
        }

        let mut signed = Vec::with_capacity(raw_auth_data.len() + client_data_hash.len());
        signed.extend_from_slice(raw_auth_data);
        signed.extend_from_slice(client_data_hash);

        match stmt.x5c.as_deref() {
            Some([leaf, rest @ ..]) => {
                let key = crypto::certificate_public_key(leaf)?;
                if stmt.alg != i64::from(key.algorithm().0) {
                    return Err(WebAuthnError::AttestationStatementInvalid(format!(
                        "statement alg {} does not match the attestation certificate key",
                        stmt.alg
                    )));
                }
                if !crypto.verify_signature(&key, &signed, &stmt.sig) {
                    return Err(WebAuthnError::AttestationStatementInvalid(
                        "attestation signature does not verify".into(),
                    ));
                }
                trace!(
                    chain_len = rest.len() + 1,
                    "packed basic attestation verified"
                );
                Ok(VerifiedAttestation {
                    attestation_type: AttestationType::Basic,
                    trust_path: stmt
                        .x5c
                        .iter()
                        .flatten()
                        .map(|cert| cert.to_vec())
                        .collect(),
                })
            }
            _ => {
                let attested = attested_data(auth_data)?;
                let decoded = decode_credential_public_key(&attested.credential_public_key)?;
                if stmt.alg != i64::from(decoded.alg.0) {
                    return Err(WebAuthnError::AttestationStatementInvalid(format!(
                        "statement alg {} does not match the credential key",
                        stmt.alg
                    )));
                }
                if !crypto.verify_signature(&decoded.key, &signed, &stmt.sig) {
                    return Err(WebAuthnError::AttestationStatementInvalid(
                        "self attestation signature does not verify".into(),
                    ));
                }
                Ok(VerifiedAttestation {
                    attestation_type: AttestationType::SelfAttestation,
                    trust_path: vec![],
                })
            }
        }
    }
}

fn attested_data(auth_data: &AuthenticatorData) -> Result<&AttestedCredentialData, WebAuthnError> {
    auth_data.attested_credential_data.as_ref().ok_or_else(|| {
        WebAuthnError::AttestationStatementInvalid(
            "authenticator data carries no attested credential data".into(),
        )
    })
}
