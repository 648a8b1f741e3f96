//! Collaborator interfaces the verification core is parameterized over. The
//! core never persists anything itself: registrations, pending challenges and
//! metadata live behind these traits, and writes (storing a registration,
//! bumping a signature counter) happen in the calling layer after a ceremony
//! completes.

use crate::error::CollaboratorError;
use crate::types::{
    Aaguid, Challenge, CredentialId, PublicKeyCredentialDescriptor, UserHandle,
};

/// A credential registration as persisted by the calling layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCredential {
    pub credential: PublicKeyCredentialDescriptor,
    pub user_handle: UserHandle,
    /// COSE_Key wire bytes captured at registration time.
    pub public_key_cose: Vec<u8>,
    /// Last signature counter value observed for this credential.
    pub signature_count: u32,
}

/// Lookup interface over stored registrations. Implementations must be safe
/// for concurrent reads; the pipelines only ever read.
pub trait CredentialRepository: Send + Sync {
    fn credential_ids_for_username(
        &self,
        username: &str,
    ) -> Result<Vec<PublicKeyCredentialDescriptor>, CollaboratorError>;

    fn user_handle_for_username(
        &self,
        username: &str,
    ) -> Result<Option<UserHandle>, CollaboratorError>;

    fn username_for_user_handle(
        &self,
        user_handle: &UserHandle,
    ) -> Result<Option<String>, CollaboratorError>;

    /// The registration for `credential_id`, but only if it belongs to
    /// `user_handle`. Both must match.
    fn lookup(
        &self,
        credential_id: &CredentialId,
        user_handle: &UserHandle,
    ) -> Result<Option<RegisteredCredential>, CollaboratorError>;

    /// Every registration carrying `credential_id`, across all users. Used to
    /// enforce global credential-id uniqueness at registration.
    fn lookup_all(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Vec<RegisteredCredential>, CollaboratorError>;
}

/// Source of ceremony challenges: at least 16 cryptographically random octets
/// per draw, safe for concurrent draws.
pub trait ChallengeGenerator: Send + Sync {
    fn generate(&self) -> Result<Challenge, CollaboratorError>;
}

/// Attestation trust-root service, keyed by authenticator model (AAGUID).
pub trait MetadataService: Send + Sync {
    /// Root certificates (DER) trusted for the given authenticator model.
    fn trust_roots(&self, aaguid: &Aaguid) -> Result<Vec<Vec<u8>>, CollaboratorError>;

    /// Opaque metadata to attach to a successful, trusted registration.
    fn metadata(&self, aaguid: &Aaguid) -> Result<Option<serde_json::Value>, CollaboratorError> {
        let _ = aaguid;
        Ok(None)
    }
}
