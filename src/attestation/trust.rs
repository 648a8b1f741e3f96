//! Trust-anchor resolution: maps the AAGUID to the metadata service's root
//! certificates and judges the statement's trust path against them.

use tracing::debug;

use crate::crypto::Crypto;
use crate::error::WebAuthnError;
use crate::storage::MetadataService;
use crate::types::Aaguid;

use super::VerifiedAttestation;

/// Outcome of the trust lookup for one registration.
#[derive(Debug, Clone, Default)]
pub(crate) struct TrustResolution {
    pub trusted: bool,
    pub metadata: Option<serde_json::Value>,
}

/// Establishes whether `attestation`'s trust path chains up to a root the
/// metadata service knows for this authenticator model. Absent service, absent
/// roots or an empty trust path all resolve to untrusted; the registration
/// policy decides whether untrusted is acceptable.
pub(crate) fn resolve(
    metadata: Option<&dyn MetadataService>,
    crypto: &dyn Crypto,
    aaguid: &Aaguid,
    attestation: &VerifiedAttestation,
) -> Result<TrustResolution, WebAuthnError> {
    let Some(service) = metadata else {
        return Ok(TrustResolution::default());
    };
    let roots = service
        .trust_roots(aaguid)
        .map_err(WebAuthnError::CollaboratorFailure)?;
    if roots.is_empty() || attestation.trust_path.is_empty() {
        debug!(
            aaguid = %hex::encode(aaguid.0),
            "no trust anchors for authenticator model"
        );
        return Ok(TrustResolution::default());
    }
    if !crypto.check_cert_path(&attestation.trust_path, &roots) {
        return Ok(TrustResolution::default());
    }
    Ok(TrustResolution {
        trusted: true,
        metadata: service
            .metadata(aaguid)
            .map_err(WebAuthnError::CollaboratorFailure)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::attestation::AttestationType;
    use crate::crypto::RingCrypto;
    use crate::testutil::{build_certificate, P256Signer, StaticMetadata};

    use super::*;

    fn attestation(trust_path: Vec<Vec<u8>>) -> VerifiedAttestation {
        VerifiedAttestation {
            attestation_type: AttestationType::Basic,
            trust_path,
        }
    }

    #[test]
    fn untrusted_without_a_metadata_service() {
        let resolution = resolve(
            None,
            &RingCrypto,
            &Aaguid::ZERO,
            &attestation(vec![vec![1, 2, 3]]),
        )
        .unwrap();
        assert!(!resolution.trusted);
        assert!(resolution.metadata.is_none());
    }

    #[test]
    fn trusted_when_the_chain_reaches_a_known_root() {
        let root_signer = P256Signer::generate();
        let root = build_certificate("Vendor Root", "Vendor Root", &root_signer.point, None);
        let leaf_signer = P256Signer::generate();
        let leaf =
            build_certificate("Vendor Leaf", "Vendor Root", &leaf_signer.point, Some(&root_signer));
        let service = StaticMetadata::new(vec![root], Some(serde_json::json!({"vendor": "acme"})));

        let resolution = resolve(
            Some(&service),
            &RingCrypto,
            &Aaguid::ZERO,
            &attestation(vec![leaf]),
        )
        .unwrap();
        assert!(resolution.trusted);
        assert_eq!(
            resolution.metadata,
            Some(serde_json::json!({"vendor": "acme"}))
        );
    }

    #[test]
    fn untrusted_when_the_chain_does_not_verify() {
        let root_signer = P256Signer::generate();
        let root = build_certificate("Vendor Root", "Vendor Root", &root_signer.point, None);
        let stray_signer = P256Signer::generate();
        let stray = build_certificate("Stray", "Elsewhere", &stray_signer.point, None);
        let service = StaticMetadata::new(vec![root], None);

        let resolution = resolve(
            Some(&service),
            &RingCrypto,
            &Aaguid::ZERO,
            &attestation(vec![stray]),
        )
        .unwrap();
        assert!(!resolution.trusted);
    }
}
