//! The registration (attestation) verification pipeline: an ordered list of
//! named steps, each a pure function from the state accumulated so far to the
//! next state. The driver walks the list and stops at the first rejection, so
//! the failure a caller sees always names the earliest check that failed.

use thiserror::Error;
use tracing::{debug, trace};

use crate::attestation::{self, AttestationType, VerifiedAttestation};
use crate::codec::base64url_decode;
use crate::crypto::{constant_time_eq, decode_credential_public_key};
use crate::error::WebAuthnError;
use crate::rp::{check_token_binding, RelyingParty};
use crate::types::{
    AttestationObject, AuthenticatorAttestationResponse, CollectedClientData,
    PublicKeyCredential, PublicKeyCredentialCreationOptions, PublicKeyCredentialDescriptor,
    UserVerificationRequirement,
};

/// The checks of the registration ceremony, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    ParseClientData,
    VerifyTypeAttribute,
    VerifyChallenge,
    VerifyOrigin,
    VerifyTokenBinding,
    ComputeClientDataHash,
    DecodeAttestationObject,
    VerifyRpIdHash,
    VerifyUserPresent,
    VerifyAttestationStatement,
    VerifyTrust,
    CheckCredentialUniqueness,
}

pub(crate) const REGISTRATION_STEPS: [RegistrationStep; 12] = [
    RegistrationStep::ParseClientData,
    RegistrationStep::VerifyTypeAttribute,
    RegistrationStep::VerifyChallenge,
    RegistrationStep::VerifyOrigin,
    RegistrationStep::VerifyTokenBinding,
    RegistrationStep::ComputeClientDataHash,
    RegistrationStep::DecodeAttestationObject,
    RegistrationStep::VerifyRpIdHash,
    RegistrationStep::VerifyUserPresent,
    RegistrationStep::VerifyAttestationStatement,
    RegistrationStep::VerifyTrust,
    RegistrationStep::CheckCredentialUniqueness,
];

/// A registration ceremony rejected at `step`.
#[derive(Debug, Error)]
#[error("registration rejected at {step:?}: {error}")]
pub struct RegistrationFailure {
    pub step: RegistrationStep,
    #[source]
    pub error: WebAuthnError,
}

/// What the RP stores when a registration ceremony succeeds.
#[derive(Debug)]
pub struct RegistrationResult {
    pub key_id: PublicKeyCredentialDescriptor,
    pub attestation_trusted: bool,
    pub attestation_type: AttestationType,
    pub attestation_metadata: Option<serde_json::Value>,
    /// COSE_Key wire bytes of the new credential public key.
    pub public_key_cose: Vec<u8>,
    /// Initial signature counter reported by the authenticator.
    pub signature_count: u32,
    pub warnings: Vec<String>,
}

pub(crate) struct RegistrationCtx<'a> {
    rp: &'a RelyingParty,
    request: &'a PublicKeyCredentialCreationOptions,
    response: &'a PublicKeyCredential<AuthenticatorAttestationResponse>,
    token_binding: Option<&'a str>,

    client_data: Option<CollectedClientData>,
    client_data_hash: Option<[u8; 32]>,
    attestation: Option<AttestationObject>,
    verified: Option<VerifiedAttestation>,
    attestation_trusted: bool,
    attestation_metadata: Option<serde_json::Value>,
    warnings: Vec<String>,
}

pub(crate) fn run(
    rp: &RelyingParty,
    request: &PublicKeyCredentialCreationOptions,
    response: &PublicKeyCredential<AuthenticatorAttestationResponse>,
    token_binding: Option<&str>,
) -> Result<RegistrationResult, RegistrationFailure> {
    debug!(credential = %response.id, "finishing registration ceremony");
    let mut ctx = RegistrationCtx::new(rp, request, response, token_binding);
    for step in REGISTRATION_STEPS {
        trace!(step = ?step, "running registration step");
        step.apply(&mut ctx).map_err(|error| {
            debug!(step = ?step, %error, "registration rejected");
            RegistrationFailure { step, error }
        })?;
    }
    Ok(ctx.into_result())
}

impl RegistrationStep {
    pub(crate) fn apply(self, ctx: &mut RegistrationCtx<'_>) -> Result<(), WebAuthnError> {
        match self {
            RegistrationStep::ParseClientData => ctx.parse_client_data(),
            RegistrationStep::VerifyTypeAttribute => ctx.verify_type_attribute(),
            RegistrationStep::VerifyChallenge => ctx.verify_challenge(),
            RegistrationStep::VerifyOrigin => ctx.verify_origin(),
            RegistrationStep::VerifyTokenBinding => ctx.verify_token_binding(),
            RegistrationStep::ComputeClientDataHash => ctx.compute_client_data_hash(),
            RegistrationStep::DecodeAttestationObject => ctx.decode_attestation_object(),
            RegistrationStep::VerifyRpIdHash => ctx.verify_rp_id_hash(),
            RegistrationStep::VerifyUserPresent => ctx.verify_user_present(),
            RegistrationStep::VerifyAttestationStatement => ctx.verify_attestation_statement(),
            RegistrationStep::VerifyTrust => ctx.verify_trust(),
            RegistrationStep::CheckCredentialUniqueness => ctx.check_credential_uniqueness(),
        }
    }
}

impl<'a> RegistrationCtx<'a> {
    pub(crate) fn new(
        rp: &'a RelyingParty,
        request: &'a PublicKeyCredentialCreationOptions,
        response: &'a PublicKeyCredential<AuthenticatorAttestationResponse>,
        token_binding: Option<&'a str>,
    ) -> Self {
        RegistrationCtx {
            rp,
            request,
            response,
            token_binding,
            client_data: None,
            client_data_hash: None,
            attestation: None,
            verified: None,
            attestation_trusted: false,
            attestation_metadata: None,
            warnings: vec![],
        }
    }

    fn client_data(&self) -> &CollectedClientData {
        self.client_data.as_ref().expect("ParseClientData has run")
    }

    fn attestation(&self) -> &AttestationObject {
        self.attestation
            .as_ref()
            .expect("DecodeAttestationObject has run")
    }

    fn parse_client_data(&mut self) -> Result<(), WebAuthnError> {
        self.client_data = Some(CollectedClientData::parse(
            &self.response.response.client_data_json,
        )?);
        Ok(())
    }

    fn verify_type_attribute(&mut self) -> Result<(), WebAuthnError> {
        if !self.rp.validate_type_attribute {
            return Ok(());
        }
        match self.client_data().type_.as_deref() {
            Some("webauthn.create") => Ok(()),
            other => Err(WebAuthnError::TypeMismatch {
                expected: "webauthn.create".into(),
                actual: other.unwrap_or("").into(),
            }),
        }
    }

    fn verify_challenge(&mut self) -> Result<(), WebAuthnError> {
        let claimed = base64url_decode(&self.client_data().challenge)?;
        if !constant_time_eq(&claimed, &self.request.challenge.0) {
            return Err(WebAuthnError::ChallengeMismatch);
        }
        Ok(())
    }

    fn verify_origin(&mut self) -> Result<(), WebAuthnError> {
        let origin = &self.client_data().origin;
        if !self.rp.origins.iter().any(|o| o == origin) {
            return Err(WebAuthnError::OriginMismatch(origin.clone()));
        }
        Ok(())
    }

    fn verify_token_binding(&mut self) -> Result<(), WebAuthnError> {
        // A registration with no token binding on either side always passes.
        check_token_binding(
            self.token_binding,
            self.client_data().token_binding_id.as_deref(),
            true,
        )
    }

    fn compute_client_data_hash(&mut self) -> Result<(), WebAuthnError> {
        let algorithm = &self.client_data().hash_algorithm;
        if algorithm != "SHA-256" {
            return Err(WebAuthnError::UnsupportedHashAlgorithm(algorithm.clone()));
        }
        self.client_data_hash = Some(self.rp.crypto.hash(&self.response.response.client_data_json));
        Ok(())
    }

    fn decode_attestation_object(&mut self) -> Result<(), WebAuthnError> {
        let attestation = AttestationObject::decode(&self.response.response.attestation_object)?;
        let Some(attested) = attestation.auth_data.attested_credential_data.as_ref() else {
            return Err(WebAuthnError::MalformedInput(
                "attested credential data missing from registration".into(),
            ));
        };
        // The credential key must decode before anything is stored.
        decode_credential_public_key(&attested.credential_public_key)?;
        self.attestation = Some(attestation);
        Ok(())
    }

    fn verify_rp_id_hash(&mut self) -> Result<(), WebAuthnError> {
        let expected = self.rp.crypto.hash(self.rp.rp.id.0.as_bytes());
        if self.attestation().auth_data.rp_id_hash != expected {
            return Err(WebAuthnError::RpIdHashMismatch);
        }
        Ok(())
    }

    fn verify_user_present(&mut self) -> Result<(), WebAuthnError> {
        let flags = &self.attestation().auth_data.flags;
        if !flags.user_present() {
            return Err(WebAuthnError::UserPresenceMissing);
        }
        let verification_required = self
            .request
            .authenticator_selection
            .as_ref()
            .map(|s| s.user_verification == UserVerificationRequirement::Required)
            .unwrap_or(false);
        if verification_required && !flags.user_verified() {
            return Err(WebAuthnError::UserVerificationRequired);
        }
        Ok(())
    }

    fn verify_attestation_statement(&mut self) -> Result<(), WebAuthnError> {
        let attestation = self.attestation();
        let client_data_hash = self
            .client_data_hash
            .as_ref()
            .expect("ComputeClientDataHash has run");
        let verifier = attestation::verifier_for(&attestation.fmt);
        trace!(fmt = %attestation.fmt, "verifying attestation statement");
        let verified = verifier.verify(
            self.rp.crypto.as_ref(),
            &attestation.att_stmt,
            &attestation.auth_data,
            &attestation.raw_auth_data,
            client_data_hash,
        )?;
        self.verified = Some(verified);
        Ok(())
    }

    fn verify_trust(&mut self) -> Result<(), WebAuthnError> {
        let verified = self.verified.as_ref().expect("statement has been verified");
        let aaguid = self
            .attestation()
            .auth_data
            .attested_credential_data
            .as_ref()
            .expect("attested data was checked at decode")
            .aaguid;
        let resolution = attestation::trust::resolve(
            self.rp.metadata.as_deref(),
            self.rp.crypto.as_ref(),
            &aaguid,
            verified,
        )?;

        let self_attested = verified.attestation_type == AttestationType::SelfAttestation;
        self.attestation_trusted =
            resolution.trusted || (self_attested && self.rp.allow_untrusted_attestation);
        self.attestation_metadata = resolution.metadata;

        if !resolution.trusted && !self.rp.allow_untrusted_attestation {
            return Err(WebAuthnError::AttestationUntrusted);
        }
        if !self.attestation_trusted {
            self.warnings
                .push("attestation statement is not linked to a trusted root".into());
        }
        Ok(())
    }

    fn check_credential_uniqueness(&mut self) -> Result<(), WebAuthnError> {
        let credential_id = &self
            .attestation()
            .auth_data
            .attested_credential_data
            .as_ref()
            .expect("attested data was checked at decode")
            .credential_id;
        let existing = self
            .rp
            .credentials
            .lookup_all(credential_id)
            .map_err(WebAuthnError::CollaboratorFailure)?;
        if !existing.is_empty() {
            return Err(WebAuthnError::DuplicateCredentialId);
        }
        Ok(())
    }

    fn into_result(self) -> RegistrationResult {
        let verified = self.verified.expect("pipeline has completed");
        let attestation = self.attestation.expect("pipeline has completed");
        let attested = attestation
            .auth_data
            .attested_credential_data
            .expect("attested data was checked at decode");
        RegistrationResult {
            key_id: PublicKeyCredentialDescriptor::new(attested.credential_id),
            attestation_trusted: self.attestation_trusted,
            attestation_type: verified.attestation_type,
            attestation_metadata: self.attestation_metadata,
            public_key_cose: attested.credential_public_key,
            signature_count: attestation.auth_data.sign_count,
            warnings: self.warnings,
        }
    }
}
