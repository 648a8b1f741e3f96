//! Attestation-certificate plumbing: extracting the subject public key and the
//! signed parts out of DER certificates. Parsing only; signature math stays in
//! the `Crypto` backend.

use x509_parser::der_parser::{oid, Oid};
use x509_parser::prelude::*;

use crate::error::WebAuthnError;

use super::{CoseAlgorithmIdentifier, VerifyingKey};

const OID_EC_PUBLIC_KEY: Oid<'static> = oid!(1.2.840 .10045 .2 .1);
const OID_RSA_ENCRYPTION: Oid<'static> = oid!(1.2.840 .113549 .1 .1 .1);
const OID_ECDSA_WITH_SHA256: Oid<'static> = oid!(1.2.840 .10045 .4 .3 .2);
const OID_SHA256_WITH_RSA: Oid<'static> = oid!(1.2.840 .113549 .1 .1 .11);

fn parse(der: &[u8]) -> Result<X509Certificate<'_>, WebAuthnError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| WebAuthnError::malformed("X.509 certificate", e))?;
    Ok(cert)
}

/// Extracts the subject public key of a DER certificate as a [`VerifyingKey`].
pub(crate) fn certificate_public_key(der: &[u8]) -> Result<VerifyingKey, WebAuthnError> {
    let cert = parse(der)?;
    let spki = &cert.tbs_certificate.subject_pki;
    let key_bytes = &spki.subject_public_key.data[..];

    if spki.algorithm.algorithm == OID_EC_PUBLIC_KEY {
        if key_bytes.len() != 65 || key_bytes[0] != 0x04 {
            return Err(WebAuthnError::MalformedInput(
                "certificate EC key is not an uncompressed P-256 point".into(),
            ));
        }
        Ok(VerifyingKey::P256 {
            point: key_bytes.to_vec(),
        })
    } else if spki.algorithm.algorithm == OID_RSA_ENCRYPTION {
        Ok(VerifyingKey::Rsa {
            public_key: key_bytes.to_vec(),
        })
    } else {
        Err(WebAuthnError::MalformedInput(format!(
            "unsupported certificate key algorithm {}",
            spki.algorithm.algorithm
        )))
    }
}

/// The pieces needed to check that a certificate was signed by some issuer
/// key: the raw TBS bytes, the signature algorithm, and the signature.
pub(crate) struct SignedParts {
    pub tbs: Vec<u8>,
    pub alg: CoseAlgorithmIdentifier,
    pub signature: Vec<u8>,
}

pub(crate) fn signed_parts(der: &[u8]) -> Result<SignedParts, WebAuthnError> {
    let cert = parse(der)?;
    let alg = if cert.signature_algorithm.algorithm == OID_ECDSA_WITH_SHA256 {
        CoseAlgorithmIdentifier::ES256
    } else if cert.signature_algorithm.algorithm == OID_SHA256_WITH_RSA {
        CoseAlgorithmIdentifier::RS256
    } else {
        return Err(WebAuthnError::MalformedInput(format!(
            "unsupported certificate signature algorithm {}",
            cert.signature_algorithm.algorithm
        )));
    };
    Ok(SignedParts {
        tbs: cert.tbs_certificate.as_ref().to_vec(),
        alg,
        signature: cert.signature_value.data.to_vec(),
    })
}
