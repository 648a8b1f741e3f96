use ciborium::value::Value;
use modular_bitfield::{bitfield, prelude::B3};
use serde::Deserialize;

use crate::error::WebAuthnError;

use super::{Aaguid, CredentialId};

/// rpIdHash (32) + flags (1) + signCount (4).
const AUTH_DATA_HEADER_LEN: usize = 37;

/// The flags byte of authenticator data.
/// [See more](https://www.w3.org/TR/webauthn/#authenticator-data)
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatorDataFlags {
    pub user_present: bool,
    pub rfu_1: bool,
    pub user_verified: bool,
    pub rfu_2: B3,
    pub attested_data_included: bool,
    pub extension_data_included: bool,
}

/// Credential material an authenticator attests to at registration time.
/// [See more](https://www.w3.org/TR/webauthn/#attested-credential-data)
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    pub aaguid: Aaguid,
    pub credential_id: CredentialId,
    /// The COSE_Key exactly as it appeared on the wire. Kept verbatim: these
    /// bytes are stored by the RP and re-used for assertion verification.
    pub credential_public_key: Vec<u8>,
}

/// Decoded authenticator-data block. Big-endian integers throughout; the
/// attested-credential-data and extensions sections are present only when the
/// corresponding flag bit is set.
/// [See more](https://www.w3.org/TR/webauthn/#authenticator-data)
#[derive(Debug)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: AuthenticatorDataFlags,
    pub sign_count: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    pub extensions: Option<Value>,
}

impl AuthenticatorData {
    pub fn parse(bytes: &[u8]) -> Result<Self, WebAuthnError> {
        if bytes.len() < AUTH_DATA_HEADER_LEN {
            return Err(WebAuthnError::MalformedInput(format!(
                "authenticator data truncated: {} bytes",
                bytes.len()
            )));
        }
        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&bytes[..32]);
        let flags = AuthenticatorDataFlags::from_bytes([bytes[32]]);
        let sign_count = u32::from_be_bytes([bytes[33], bytes[34], bytes[35], bytes[36]]);

        let mut offset = AUTH_DATA_HEADER_LEN;
        let attested_credential_data = if flags.attested_data_included() {
            Some(Self::parse_attested_data(bytes, &mut offset)?)
        } else {
            None
        };
        let extensions = if flags.extension_data_included() {
            Some(read_cbor_value(bytes, &mut offset)?)
        } else {
            None
        };
        if offset != bytes.len() {
            return Err(WebAuthnError::MalformedInput(format!(
                "{} trailing bytes after authenticator data",
                bytes.len() - offset
            )));
        }
        Ok(AuthenticatorData {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential_data,
            extensions,
        })
    }

    fn parse_attested_data(
        bytes: &[u8],
        offset: &mut usize,
    ) -> Result<AttestedCredentialData, WebAuthnError> {
        let rest = &bytes[*offset..];
        if rest.len() < 18 {
            return Err(WebAuthnError::MalformedInput(
                "attested credential data truncated".into(),
            ));
        }
        let mut aaguid = [0u8; 16];
        aaguid.copy_from_slice(&rest[..16]);
        let id_len = u16::from_be_bytes([rest[16], rest[17]]) as usize;
        if rest.len() < 18 + id_len {
            return Err(WebAuthnError::MalformedInput(
                "credential id extends past authenticator data".into(),
            ));
        }
        let credential_id = CredentialId(rest[18..18 + id_len].to_vec());
        *offset += 18 + id_len;

        // The credential public key is CBOR of unknown length; decode once to
        // find its extent, keep the wire bytes untouched.
        let key_start = *offset;
        read_cbor_value(bytes, offset)?;
        let credential_public_key = bytes[key_start..*offset].to_vec();

        Ok(AttestedCredentialData {
            aaguid: Aaguid(aaguid),
            credential_id,
            credential_public_key,
        })
    }
}

/// Decodes one CBOR value starting at `*offset`, advancing the offset past it.
fn read_cbor_value(bytes: &[u8], offset: &mut usize) -> Result<Value, WebAuthnError> {
    let mut reader = &bytes[*offset..];
    let before = reader.len();
    let value: Value = ciborium::de::from_reader(&mut reader)
        .map_err(|e| WebAuthnError::malformed("authenticator data CBOR", e))?;
    *offset += before - reader.len();
    Ok(value)
}

/// CBOR-decoded attestation object: `{ fmt, authData, attStmt }`.
/// `attStmt` stays an opaque CBOR value until the format-specific verifier
/// interprets it.
/// [See more](https://www.w3.org/TR/webauthn/#attestation-object)
#[derive(Debug)]
pub struct AttestationObject {
    pub fmt: String,
    pub auth_data: AuthenticatorData,
    /// Wire bytes of `authData`; signed data for `packed` statements.
    pub raw_auth_data: Vec<u8>,
    pub att_stmt: Value,
}

#[derive(Deserialize)]
struct RawAttestationObject {
    fmt: String,
    #[serde(rename = "authData", with = "serde_bytes")]
    auth_data: Vec<u8>,
    #[serde(rename = "attStmt")]
    att_stmt: Value,
}

impl AttestationObject {
    pub fn decode(bytes: &[u8]) -> Result<Self, WebAuthnError> {
        let raw: RawAttestationObject = ciborium::de::from_reader(bytes)
            .map_err(|e| WebAuthnError::malformed("attestation object", e))?;
        let auth_data = AuthenticatorData::parse(&raw.auth_data)?;
        Ok(AttestationObject {
            fmt: raw.fmt,
            auth_data,
            raw_auth_data: raw.auth_data,
            att_stmt: raw.att_stmt,
        })
    }
}

#[cfg(test)]
mod tests {
    use coset::{iana, CborSerializable, CoseKeyBuilder};

    use super::*;

    fn sample_cose_key() -> Vec<u8> {
        CoseKeyBuilder::new_ec2_pub_key(iana::EllipticCurve::P_256, vec![1; 32], vec![2; 32])
            .algorithm(iana::Algorithm::ES256)
            .build()
            .to_vec()
            .unwrap()
    }

    fn header(flags: AuthenticatorDataFlags, count: u32) -> Vec<u8> {
        let mut out = vec![0xab; 32];
        out.push(flags.into_bytes()[0]);
        out.extend_from_slice(&count.to_be_bytes());
        out
    }

    #[test]
    fn parses_assertion_header() {
        let bytes = header(AuthenticatorDataFlags::new().with_user_present(true), 0x539);
        let data = AuthenticatorData::parse(&bytes).unwrap();
        assert_eq!(data.rp_id_hash, [0xab; 32]);
        assert!(data.flags.user_present());
        assert!(!data.flags.user_verified());
        assert_eq!(data.sign_count, 0x539);
        assert!(data.attested_credential_data.is_none());
        assert!(data.extensions.is_none());
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(
            AuthenticatorData::parse(&[0u8; 36]),
            Err(WebAuthnError::MalformedInput(_))
        ));
    }

    #[test]
    fn parses_attested_credential_data() {
        let cose = sample_cose_key();
        let mut bytes = header(
            AuthenticatorDataFlags::new()
                .with_user_present(true)
                .with_attested_data_included(true),
            7,
        );
        bytes.extend_from_slice(&[0x11; 16]);
        bytes.extend_from_slice(&4u16.to_be_bytes());
        bytes.extend_from_slice(&[1, 3, 3, 7]);
        bytes.extend_from_slice(&cose);

        let data = AuthenticatorData::parse(&bytes).unwrap();
        let attested = data.attested_credential_data.unwrap();
        assert_eq!(attested.aaguid, Aaguid([0x11; 16]));
        assert_eq!(attested.credential_id, CredentialId(vec![1, 3, 3, 7]));
        assert_eq!(attested.credential_public_key, cose);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = header(AuthenticatorDataFlags::new().with_user_present(true), 0);
        bytes.push(0x00);
        assert!(matches!(
            AuthenticatorData::parse(&bytes),
            Err(WebAuthnError::MalformedInput(_))
        ));
    }

    #[test]
    fn at_flag_without_payload_is_malformed() {
        let bytes = header(AuthenticatorDataFlags::new().with_attested_data_included(true), 0);
        assert!(AuthenticatorData::parse(&bytes).is_err());
    }

    #[test]
    fn parses_extension_map() {
        let mut bytes = header(
            AuthenticatorDataFlags::new()
                .with_user_present(true)
                .with_extension_data_included(true),
            0,
        );
        let ext = Value::Map(vec![(
            Value::Text("example.ext".into()),
            Value::Bool(true),
        )]);
        ciborium::ser::into_writer(&ext, &mut bytes).unwrap();

        let data = AuthenticatorData::parse(&bytes).unwrap();
        assert_eq!(data.extensions, Some(ext));
    }

    #[test]
    fn attestation_object_round_trips_as_cbor_value() {
        let mut auth_data = header(
            AuthenticatorDataFlags::new()
                .with_user_present(true)
                .with_attested_data_included(true),
            0,
        );
        auth_data.extend_from_slice(&[0; 16]);
        auth_data.extend_from_slice(&1u16.to_be_bytes());
        auth_data.push(0xcc);
        auth_data.extend_from_slice(&sample_cose_key());

        let object = Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text("none".into())),
            (Value::Text("attStmt".into()), Value::Map(vec![])),
            (Value::Text("authData".into()), Value::Bytes(auth_data)),
        ]);
        let mut bytes = vec![];
        ciborium::ser::into_writer(&object, &mut bytes).unwrap();

        let decoded = AttestationObject::decode(&bytes).unwrap();
        assert_eq!(decoded.fmt, "none");
        assert!(decoded.auth_data.attested_credential_data.is_some());

        // Decode to a generic value and re-encode: identical bytes.
        let value: Value = ciborium::de::from_reader(bytes.as_slice()).unwrap();
        let mut reencoded = vec![];
        ciborium::ser::into_writer(&value, &mut reencoded).unwrap();
        assert_eq!(reencoded, bytes);
    }
}
