use ciborium::value::Value;
use serde::Deserialize;
use serde_bytes::ByteBuf;

use crate::crypto::{self, decode_credential_public_key, Crypto, VerifyingKey};
use crate::error::WebAuthnError;
use crate::types::AuthenticatorData;

use super::{AttestationFormat, AttestationType, VerifiedAttestation};

/// The `fido-u2f` format: a CTAP1-era registration signature over the U2F
/// signing base, made by the attestation certificate.
/// [See more](https://www.w3.org/TR/webauthn/#fido-u2f-attestation)
pub(super) struct FidoU2fFormat;

#[derive(Debug, Deserialize)]
struct FidoU2fStatement {
    sig: ByteBuf,
    x5c: Vec<ByteBuf>,
}

impl AttestationFormat for FidoU2fFormat {
    fn verify(
        &self,
        crypto: &dyn Crypto,
        att_stmt: &Value,
        auth_data: &AuthenticatorData,
        _raw_auth_data: &[u8],
        client_data_hash: &[u8; 32],
    ) -> Result<VerifiedAttestation, WebAuthnError> {
        let stmt: FidoU2fStatement = att_stmt
            .deserialized()
            .map_err(|e| WebAuthnError::malformed("fido-u2f statement", e))?;
        let leaf = stmt.x5c.first().ok_or_else(|| {
            WebAuthnError::AttestationStatementInvalid("fido-u2f x5c is empty".into())
        })?;

        let attested = auth_data.attested_credential_data.as_ref().ok_or_else(|| {
            WebAuthnError::AttestationStatementInvalid(
                "authenticator data carries no attested credential data".into(),
            )
        })?;
        let decoded = decode_credential_public_key(&attested.credential_public_key)?;
        let VerifyingKey::P256 { point } = &decoded.key else {
            return Err(WebAuthnError::AttestationStatementInvalid(
                "fido-u2f requires a P-256 credential key".into(),
            ));
        };

        // U2F registration signing base:
        // 0x00 || rpIdHash || clientDataHash || credentialId || publicKeyU2F
        let credential_id = &attested.credential_id.0;
        let mut signed = Vec::with_capacity(1 + 32 + 32 + credential_id.len() + point.len());
        signed.push(0x00);
        signed.extend_from_slice(&auth_data.rp_id_hash);
        signed.extend_from_slice(client_data_hash);
        signed.extend_from_slice(credential_id);
        signed.extend_from_slice(point);

        let leaf_key = crypto::certificate_public_key(leaf)?;
        if !matches!(leaf_key, VerifyingKey::P256 { .. }) {
            return Err(WebAuthnError::AttestationStatementInvalid(
                "fido-u2f requires a P-256 attestation certificate".into(),
            ));
        }
        if !crypto.verify_signature(&leaf_key, &signed, &stmt.sig) {
            return Err(WebAuthnError::AttestationStatementInvalid(
                "U2F registration signature does not verify".into(),
            ));
        }

        Ok(VerifiedAttestation {
            attestation_type: AttestationType::Basic,
            trust_path: stmt.x5c.iter().map(|cert| cert.to_vec()).collect(),
        })
    }
}
