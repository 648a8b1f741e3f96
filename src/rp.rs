//! The ceremony driver: a [`RelyingParty`] holds the immutable verification
//! policy plus the injected collaborators, issues ceremony options, and runs
//! the two verification pipelines. It owns no mutable state; concurrent
//! ceremonies need no coordination beyond what the collaborators provide.

use tracing::trace;

use crate::assertion::{self, AssertionFailure, AssertionResult};
use crate::crypto::{
    constant_time_eq, CoseAlgorithmIdentifier, Crypto, RingCrypto, SystemChallengeGenerator,
};
use crate::error::WebAuthnError;
use crate::registration::{self, RegistrationFailure, RegistrationResult};
use crate::storage::{ChallengeGenerator, CredentialRepository, MetadataService};
use crate::types::{
    AttestationConveyancePreference, AuthenticatorAssertionResponse,
    AuthenticatorAttestationResponse, AuthenticatorSelectionCriteria, ExtensionInputs,
    PublicKeyCredential, PublicKeyCredentialCreationOptions, PublicKeyCredentialDescriptor,
    PublicKeyCredentialParameters, PublicKeyCredentialRequestOptions, RelyingPartyIdentity,
    UserIdentity,
};

/// Server-side WebAuthn verifier for one relying party.
pub struct RelyingParty {
    pub(crate) rp: RelyingPartyIdentity,
    /// Exact origin strings assertions may come from. An empty list rejects
    /// every ceremony.
    pub(crate) origins: Vec<String>,
    pub(crate) credentials: Box<dyn CredentialRepository>,
    pub(crate) crypto: Box<dyn Crypto>,
    pub(crate) challenges: Box<dyn ChallengeGenerator>,
    pub(crate) metadata: Option<Box<dyn MetadataService>>,
    pub(crate) algorithms: Vec<CoseAlgorithmIdentifier>,
    pub(crate) attestation_preference: AttestationConveyancePreference,
    pub(crate) authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    pub(crate) allow_missing_token_binding: bool,
    pub(crate) allow_untrusted_attestation: bool,
    pub(crate) validate_signature_counter: bool,
    pub(crate) validate_type_attribute: bool,
}

impl RelyingParty {
    pub fn new(
        rp: RelyingPartyIdentity,
        origins: Vec<String>,
        credentials: Box<dyn CredentialRepository>,
    ) -> Self {
        RelyingParty {
            rp,
            origins,
            credentials,
            crypto: Box::new(RingCrypto),
            challenges: Box::new(SystemChallengeGenerator),
            metadata: None,
            algorithms: vec![CoseAlgorithmIdentifier::ES256],
            attestation_preference: AttestationConveyancePreference::None,
            authenticator_selection: None,
            allow_missing_token_binding: true,
            allow_untrusted_attestation: false,
            validate_signature_counter: true,
            validate_type_attribute: false,
        }
    }

    pub fn with_crypto(mut self, crypto: Box<dyn Crypto>) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn with_challenge_generator(mut self, challenges: Box<dyn ChallengeGenerator>) -> Self {
        self.challenges = challenges;
        self
    }

    pub fn with_metadata_service(mut self, metadata: Box<dyn MetadataService>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_algorithms(mut self, algorithms: Vec<CoseAlgorithmIdentifier>) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn with_attestation_preference(
        mut self,
        preference: AttestationConveyancePreference,
    ) -> Self {
        self.attestation_preference = preference;
        self
    }

    pub fn with_authenticator_selection(
        mut self,
        selection: AuthenticatorSelectionCriteria,
    ) -> Self {
        self.authenticator_selection = Some(selection);
        self
    }

    pub fn allow_missing_token_binding(mut self, allow: bool) -> Self {
        self.allow_missing_token_binding = allow;
        self
    }

    pub fn allow_untrusted_attestation(mut self, allow: bool) -> Self {
        self.allow_untrusted_attestation = allow;
        self
    }

    pub fn validate_signature_counter(mut self, validate: bool) -> Self {
        self.validate_signature_counter = validate;
        self
    }

    pub fn validate_type_attribute(mut self, validate: bool) -> Self {
        self.validate_type_attribute = validate;
        self
    }

    /// Issues registration options for `user`. The challenge comes from the
    /// injected generator and must be remembered by the caller alongside the
    /// returned options. When no explicit exclude list is given, the user's
    /// already-registered credentials are excluded so an authenticator will
    /// not create a second credential for the same account.
    pub fn start_registration(
        &self,
        user: UserIdentity,
        exclude_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
        extensions: Option<ExtensionInputs>,
    ) -> Result<PublicKeyCredentialCreationOptions, WebAuthnError> {
        let challenge = self
            .challenges
            .generate()
            .map_err(WebAuthnError::CollaboratorFailure)?;
        let exclude_credentials = match exclude_credentials {
            Some(exclude) => Some(exclude),
            None => {
                let registered = self
                    .credentials
                    .credential_ids_for_username(&user.name)
                    .map_err(WebAuthnError::CollaboratorFailure)?;
                if registered.is_empty() {
                    None
                } else {
                    Some(registered)
                }
            }
        };
        trace!(user = %user.name, challenge = %hex::encode(&challenge.0), "issuing registration options");
        Ok(PublicKeyCredentialCreationOptions {
            rp: self.rp.clone(),
            user,
            challenge,
            pub_key_cred_params: self
                .algorithms
                .iter()
                .map(|&alg| PublicKeyCredentialParameters::new(alg))
                .collect(),
            exclude_credentials,
            authenticator_selection: self.authenticator_selection.clone(),
            attestation: self.attestation_preference,
            extensions,
        })
    }

    /// Verifies the browser's response to a previously issued registration
    /// request. On success the caller persists the returned registration; on
    /// failure it gets the first rejecting step and its reason.
    pub fn finish_registration(
        &self,
        request: &PublicKeyCredentialCreationOptions,
        response: &PublicKeyCredential<AuthenticatorAttestationResponse>,
        token_binding: Option<&str>,
    ) -> Result<RegistrationResult, RegistrationFailure> {
        registration::run(self, request, response, token_binding)
    }

    /// Issues assertion options with the given allow list.
    pub fn start_assertion(
        &self,
        allow_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
        extensions: Option<ExtensionInputs>,
    ) -> Result<PublicKeyCredentialRequestOptions, WebAuthnError> {
        let challenge = self
            .challenges
            .generate()
            .map_err(WebAuthnError::CollaboratorFailure)?;
        Ok(PublicKeyCredentialRequestOptions {
            rp_id: self.rp.id.clone(),
            challenge,
            allow_credentials,
            extensions,
        })
    }

    /// Issues assertion options for a known username, resolving the allow
    /// list from the repository.
    pub fn start_assertion_for_username(
        &self,
        username: &str,
        extensions: Option<ExtensionInputs>,
    ) -> Result<PublicKeyCredentialRequestOptions, WebAuthnError> {
        let allow = self
            .credentials
            .credential_ids_for_username(username)
            .map_err(WebAuthnError::CollaboratorFailure)?;
        self.start_assertion(if allow.is_empty() { None } else { Some(allow) }, extensions)
    }

    /// Verifies the browser's response to a previously issued assertion
    /// request. `username` selects the username flow; pass `None` for the
    /// username-less flow, where the authenticator supplies the user handle.
    pub fn finish_assertion(
        &self,
        request: &PublicKeyCredentialRequestOptions,
        response: &PublicKeyCredential<AuthenticatorAssertionResponse>,
        username: Option<&str>,
        token_binding: Option<&str>,
    ) -> Result<AssertionResult, AssertionFailure> {
        assertion::run(self, request, response, username, token_binding)
    }
}

/// Token-binding agreement between the caller's transport and the client data:
/// both absent passes (when policy allows), both present must match, one side
/// alone is a mismatch. Compared in constant time.
pub(crate) fn check_token_binding(
    caller: Option<&str>,
    client: Option<&str>,
    allow_missing: bool,
) -> Result<(), WebAuthnError> {
    match (caller, client) {
        (Some(caller), Some(client)) => {
            if constant_time_eq(caller.as_bytes(), client.as_bytes()) {
                Ok(())
            } else {
                Err(WebAuthnError::TokenBindingMismatch)
            }
        }
        (None, None) => {
            if allow_missing {
                Ok(())
            } else {
                Err(WebAuthnError::TokenBindingMismatch)
            }
        }
        _ => Err(WebAuthnError::TokenBindingMismatch),
    }
}
