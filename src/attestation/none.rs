use ciborium::value::Value;

use crate::crypto::Crypto;
use crate::error::WebAuthnError;
use crate::types::AuthenticatorData;

use super::{AttestationFormat, AttestationType, VerifiedAttestation};

/// The `none` format: an empty statement carrying no provenance at all.
pub(super) struct NoneFormat;

impl AttestationFormat for NoneFormat {
    fn verify(
        &self,
        _crypto: &dyn Crypto,
        att_stmt: &Value,
        _auth_data: &AuthenticatorData,
        _raw_auth_data: &[u8],
        _client_data_hash: &[u8; 32],
    ) -> Result<VerifiedAttestation, WebAuthnError> {
        match att_stmt {
            Value::Map(entries) if entries.is_empty() => Ok(VerifiedAttestation {
                attestation_type: AttestationType::None,
                trust_path: vec![],
            }),
            _ => Err(WebAuthnError::AttestationStatementInvalid(
                "`none` statement must be an empty map".into(),
            )),
        }
    }
}
