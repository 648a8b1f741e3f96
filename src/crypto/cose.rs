//! COSE_Key decoding. The support floor is EC2 on P-256 (ES256), the one
//! algorithm every WebAuthn authenticator implements.

use ciborium::value::Value;
use coset::{
    iana::{self, EnumI64},
    Algorithm, CborSerializable, CoseKey, KeyType, Label,
};

use crate::error::WebAuthnError;

use super::{CoseAlgorithmIdentifier, VerifyingKey};

/// A credential public key decoded out of its COSE_Key wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPublicKey {
    pub alg: CoseAlgorithmIdentifier,
    pub key: VerifyingKey,
}

/// Decodes the CBOR-encoded COSE credential public key embedded in attested
/// credential data (and stored by the RP between ceremonies).
pub fn decode_credential_public_key(bytes: &[u8]) -> Result<DecodedPublicKey, WebAuthnError> {
    let key = CoseKey::from_slice(bytes)
        .map_err(|e| WebAuthnError::malformed("COSE key", e))?;

    match key.kty {
        KeyType::Assigned(iana::KeyType::EC2) => decode_ec2(&key),
        other => Err(WebAuthnError::MalformedInput(format!(
            "unsupported COSE key type {other:?}"
        ))),
    }
}

fn decode_ec2(key: &CoseKey) -> Result<DecodedPublicKey, WebAuthnError> {
    let alg = match key.alg {
        Some(Algorithm::Assigned(iana::Algorithm::ES256)) => {
            CoseAlgorithmIdentifier(iana::Algorithm::ES256.to_i64() as i32)
        }
        Some(ref other) => {
            return Err(WebAuthnError::MalformedInput(format!(
                "unsupported COSE algorithm {other:?} for EC2 key"
            )))
        }
        None => {
            return Err(WebAuthnError::MalformedInput(
                "COSE key is missing the alg parameter".into(),
            ))
        }
    };

    let crv = ec2_param(key, iana::Ec2KeyParameter::Crv)
        .and_then(|v| v.as_integer())
        .map(i128::from)
        .ok_or_else(|| WebAuthnError::MalformedInput("EC2 key is missing crv".into()))?;
    if crv != iana::EllipticCurve::P_256.to_i64() as i128 {
        return Err(WebAuthnError::MalformedInput(format!(
            "unsupported EC2 curve {crv}"
        )));
    }

    let x = ec2_coordinate(key, iana::Ec2KeyParameter::X)?;
    let y = ec2_coordinate(key, iana::Ec2KeyParameter::Y)?;

    // "Octet-String-to-Elliptic-Curve-Point Conversion", uncompressed form,
    // as specified in https://www.secg.org/sec1-v2.pdf: 0x04 || x || y
    let mut point = Vec::with_capacity(1 + 32 + 32);
    point.push(0x04);
    point.extend_from_slice(x);
    point.extend_from_slice(y);

    Ok(DecodedPublicKey {
        alg,
        key: VerifyingKey::P256 { point },
    })
}

fn ec2_param(key: &CoseKey, param: iana::Ec2KeyParameter) -> Option<&Value> {
    key.params.iter().find_map(|(label, value)| match label {
        Label::Int(l) if *l == param as i64 => Some(value),
        _ => None,
    })
}

fn ec2_coordinate<'a>(
    key: &'a CoseKey,
    param: iana::Ec2KeyParameter,
) -> Result<&'a [u8], WebAuthnError> {
    let bytes = ec2_param(key, param)
        .and_then(|v| v.as_bytes())
        .ok_or_else(|| {
            WebAuthnError::MalformedInput(format!("EC2 key is missing coordinate {param:?}"))
        })?;
    if bytes.len() != 32 {
        return Err(WebAuthnError::MalformedInput(format!(
            "EC2 coordinate {param:?} has length {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}
