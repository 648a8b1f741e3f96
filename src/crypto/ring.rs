//! Default [`Crypto`] backend on top of `ring`.

use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{self, UnparsedPublicKey};

use crate::error::CollaboratorError;
use crate::storage::ChallengeGenerator;
use crate::types::Challenge;

use super::{x509, Crypto, VerifyingKey};

/// `ring`-backed hash, signature and certificate-path verification.
#[derive(Debug, Default)]
pub struct RingCrypto;

impl Crypto for RingCrypto {
    fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(digest(&SHA256, data).as_ref());
        out
    }

    fn verify_signature(&self, key: &VerifyingKey, signed_data: &[u8], sig: &[u8]) -> bool {
        match key {
            VerifyingKey::P256 { point } => {
                UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, point)
                    .verify(signed_data, sig)
                    .is_ok()
            }
            VerifyingKey::Rsa { public_key } => {
                UnparsedPublicKey::new(&signature::RSA_PKCS1_2048_8192_SHA256, public_key)
                    .verify(signed_data, sig)
                    .is_ok()
            }
        }
    }

    fn check_cert_path(&self, chain: &[Vec<u8>], roots: &[Vec<u8>]) -> bool {
        let Some(last) = chain.last() else {
            return false;
        };
        for pair in chain.windows(2) {
            if !self.cert_signed_by(&pair[0], &pair[1]) {
                return false;
            }
        }
        roots.iter().any(|root| self.cert_signed_by(last, root))
    }
}

impl RingCrypto {
    fn cert_signed_by(&self, cert: &[u8], issuer: &[u8]) -> bool {
        let (parts, issuer_key) =
            match (x509::signed_parts(cert), x509::certificate_public_key(issuer)) {
                (Ok(parts), Ok(key)) => (parts, key),
                _ => return false,
            };
        if parts.alg != issuer_key.algorithm() {
            return false;
        }
        self.verify_signature(&issuer_key, &parts.tbs, &parts.signature)
    }
}

/// Draws 32 random octets per challenge from the system CSPRNG.
#[derive(Debug, Default)]
pub struct SystemChallengeGenerator;

const CHALLENGE_SIZE_BYTES: usize = 32;

impl ChallengeGenerator for SystemChallengeGenerator {
    fn generate(&self) -> Result<Challenge, CollaboratorError> {
        let rng = SystemRandom::new();
        let mut bytes = vec![0u8; CHALLENGE_SIZE_BYTES];
        rng.fill(&mut bytes)
            .map_err(|_| CollaboratorError::from("system rng failed"))?;
        Ok(Challenge(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{build_certificate, P256Signer};

    #[test]
    fn hashes_the_rp_id_of_the_fixtures() {
        let crypto = RingCrypto;
        assert_eq!(
            hex::encode(crypto.hash(b"localhost")),
            "49960de5880e8c687434170f6476605b8fe4aeb9a28632c7995cf3ba831d9763"
        );
    }

    #[test]
    fn verifies_a_p256_signature() {
        let crypto = RingCrypto;
        let signer = P256Signer::generate();
        let sig = signer.sign(b"signed bytes");
        assert!(crypto.verify_signature(&signer.verifying_key(), b"signed bytes", &sig));
        assert!(!crypto.verify_signature(&signer.verifying_key(), b"other bytes", &sig));

        let mut tampered = sig;
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        assert!(!crypto.verify_signature(&signer.verifying_key(), b"signed bytes", &tampered));
    }

    #[test]
    fn accepts_a_chain_ending_at_a_root() {
        let crypto = RingCrypto;
        let root_signer = P256Signer::generate();
        let root = build_certificate("Test Root", "Test Root", &root_signer.point, None);
        let leaf_signer = P256Signer::generate();
        let leaf =
            build_certificate("Test Leaf", "Test Root", &leaf_signer.point, Some(&root_signer));

        assert!(crypto.check_cert_path(&[leaf.clone()], &[root.clone()]));
        assert!(!crypto.check_cert_path(&[leaf.clone()], &[]));
        assert!(!crypto.check_cert_path(&[], &[root.clone()]));

        // A root that did not sign the leaf is not a path.
        let other_signer = P256Signer::generate();
        let other = build_certificate("Other Root", "Other Root", &other_signer.point, None);
        assert!(!crypto.check_cert_path(&[leaf], &[other]));
    }

    #[test]
    fn challenges_are_long_and_distinct() {
        let generator = SystemChallengeGenerator;
        let a = generator.generate().unwrap();
        let b = generator.generate().unwrap();
        assert_eq!(a.0.len(), CHALLENGE_SIZE_BYTES);
        assert_ne!(a, b);
    }
}
