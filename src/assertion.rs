//! The assertion (authentication) verification pipeline. Same shape as the
//! registration pipeline: an ordered list of named steps over accumulating
//! state, first rejection wins.

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::codec::base64url_decode;
use crate::crypto::{constant_time_eq, decode_credential_public_key};
use crate::error::WebAuthnError;
use crate::rp::{check_token_binding, RelyingParty};
use crate::storage::RegisteredCredential;
use crate::types::{
    AuthenticatorAssertionResponse, AuthenticatorData, CollectedClientData, CredentialId,
    ExtensionInputs, PublicKeyCredential, PublicKeyCredentialRequestOptions, UserHandle,
};

/// The checks of the assertion ceremony, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionStep {
    ResolveCredential,
    ExtractFields,
    ParseClientData,
    VerifyTypeAttribute,
    VerifyChallenge,
    VerifyOrigin,
    VerifyTokenBinding,
    VerifyExtensions,
    VerifyRpIdHash,
    ComputeClientDataHash,
    VerifySignature,
    CheckSignatureCounter,
}

pub(crate) const ASSERTION_STEPS: [AssertionStep; 12] = [
    AssertionStep::ResolveCredential,
    AssertionStep::ExtractFields,
    AssertionStep::ParseClientData,
    AssertionStep::VerifyTypeAttribute,
    AssertionStep::VerifyChallenge,
    AssertionStep::VerifyOrigin,
    AssertionStep::VerifyTokenBinding,
    AssertionStep::VerifyExtensions,
    AssertionStep::VerifyRpIdHash,
    AssertionStep::ComputeClientDataHash,
    AssertionStep::VerifySignature,
    AssertionStep::CheckSignatureCounter,
];

/// An assertion ceremony rejected at `step`.
#[derive(Debug, Error)]
#[error("assertion rejected at {step:?}: {error}")]
pub struct AssertionFailure {
    pub step: AssertionStep,
    #[source]
    pub error: WebAuthnError,
}

/// A successfully verified assertion. `signature_count` is the value the
/// caller should persist for this credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    pub credential_id: CredentialId,
    pub signature_count: u32,
    pub success: bool,
    pub username: Option<String>,
    pub warnings: Vec<String>,
}

pub(crate) struct AssertionCtx<'a> {
    rp: &'a RelyingParty,
    request: &'a PublicKeyCredentialRequestOptions,
    response: &'a PublicKeyCredential<AuthenticatorAssertionResponse>,
    username: Option<&'a str>,
    token_binding: Option<&'a str>,

    stored: Option<RegisteredCredential>,
    resolved_username: Option<String>,
    auth_data: Option<AuthenticatorData>,
    client_data: Option<CollectedClientData>,
    client_data_hash: Option<[u8; 32]>,
    warnings: Vec<String>,
}

pub(crate) fn run(
    rp: &RelyingParty,
    request: &PublicKeyCredentialRequestOptions,
    response: &PublicKeyCredential<AuthenticatorAssertionResponse>,
    username: Option<&str>,
    token_binding: Option<&str>,
) -> Result<AssertionResult, AssertionFailure> {
    debug!(credential = %response.id, "finishing assertion ceremony");
    let mut ctx = AssertionCtx::new(rp, request, response, username, token_binding);
    for step in ASSERTION_STEPS {
        trace!(step = ?step, "running assertion step");
        step.apply(&mut ctx).map_err(|error| {
            debug!(step = ?step, %error, "assertion rejected");
            AssertionFailure { step, error }
        })?;
    }
    Ok(ctx.into_result())
}

impl AssertionStep {
    pub(crate) fn apply(self, ctx: &mut AssertionCtx<'_>) -> Result<(), WebAuthnError> {
        match self {
            AssertionStep::ResolveCredential => ctx.resolve_credential(),
            AssertionStep::ExtractFields => ctx.extract_fields(),
            AssertionStep::ParseClientData => ctx.parse_client_data(),
            AssertionStep::VerifyTypeAttribute => ctx.verify_type_attribute(),
            AssertionStep::VerifyChallenge => ctx.verify_challenge(),
            AssertionStep::VerifyOrigin => ctx.verify_origin(),
            AssertionStep::VerifyTokenBinding => ctx.verify_token_binding(),
            AssertionStep::VerifyExtensions => ctx.verify_extensions(),
            AssertionStep::VerifyRpIdHash => ctx.verify_rp_id_hash(),
            AssertionStep::ComputeClientDataHash => ctx.compute_client_data_hash(),
            AssertionStep::VerifySignature => ctx.verify_signature(),
            AssertionStep::CheckSignatureCounter => ctx.check_signature_counter(),
        }
    }
}

impl<'a> AssertionCtx<'a> {
    pub(crate) fn new(
        rp: &'a RelyingParty,
        request: &'a PublicKeyCredentialRequestOptions,
        response: &'a PublicKeyCredential<AuthenticatorAssertionResponse>,
        username: Option<&'a str>,
        token_binding: Option<&'a str>,
    ) -> Self {
        AssertionCtx {
            rp,
            request,
            response,
            username,
            token_binding,
            stored: None,
            resolved_username: None,
            auth_data: None,
            client_data: None,
            client_data_hash: None,
            warnings: vec![],
        }
    }

    fn client_data(&self) -> &CollectedClientData {
        self.client_data.as_ref().expect("ParseClientData has run")
    }

    fn auth_data(&self) -> &AuthenticatorData {
        self.auth_data.as_ref().expect("ExtractFields has run")
    }

    fn stored(&self) -> &RegisteredCredential {
        self.stored.as_ref().expect("ResolveCredential has run")
    }

    /// Step 1: resolve the stored public key for the claimed credential. On
    /// the username flow the user handle comes from the repository; on the
    /// username-less flow it comes from the authenticator response.
    fn resolve_credential(&mut self) -> Result<(), WebAuthnError> {
        let credential_id = &self.response.raw_id;
        if !self.request.allows(credential_id) {
            return Err(WebAuthnError::UnknownCredential);
        }

        let user_handle: UserHandle = match self.username {
            Some(username) => {
                let handle = self
                    .rp
                    .credentials
                    .user_handle_for_username(username)
                    .map_err(WebAuthnError::CollaboratorFailure)?
                    .ok_or(WebAuthnError::UnknownCredential)?;
                if let Some(claimed) = &self.response.response.user_handle {
                    if claimed != &handle {
                        return Err(WebAuthnError::UnknownCredential);
                    }
                }
                self.resolved_username = Some(username.to_owned());
                handle
            }
            None => {
                let handle = self
                    .response
                    .response
                    .user_handle
                    .clone()
                    .ok_or(WebAuthnError::UnknownCredential)?;
                self.resolved_username = self
                    .rp
                    .credentials
                    .username_for_user_handle(&handle)
                    .map_err(WebAuthnError::CollaboratorFailure)?;
                handle
            }
        };

        self.stored = Some(
            self.rp
                .credentials
                .lookup(credential_id, &user_handle)
                .map_err(WebAuthnError::CollaboratorFailure)?
                .ok_or(WebAuthnError::UnknownCredential)?,
        );
        Ok(())
    }

    /// Step 2: all three payload fields must be present and well formed; the
    /// authenticator-data header is decoded here.
    fn extract_fields(&mut self) -> Result<(), WebAuthnError> {
        let response = &self.response.response;
        if response.client_data_json.is_empty() {
            return Err(WebAuthnError::MalformedInput("clientDataJSON is empty".into()));
        }
        if response.signature.is_empty() {
            return Err(WebAuthnError::MalformedInput("signature is empty".into()));
        }
        self.auth_data = Some(AuthenticatorData::parse(&response.authenticator_data)?);
        Ok(())
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
            Some("webauthn.get") => Ok(()),
            other => Err(WebAuthnError::TypeMismatch {
                expected: "webauthn.get".into(),
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
        check_token_binding(
            self.token_binding,
            self.client_data().token_binding_id.as_deref(),
            self.rp.allow_missing_token_binding,
        )
    }

    /// Step 8: every extension the client echoes back must have been asked
    /// for. Keys, not values, are compared.
    fn verify_extensions(&mut self) -> Result<(), WebAuthnError> {
        let requested = self.request.extensions.as_ref();
        let client_data = self.client_data();
        for echoed in [
            client_data.client_extensions.as_ref(),
            client_data.authenticator_extensions.as_ref(),
        ]
        .into_iter()
        .flatten()
        {
            if let Some(key) = first_unrequested(echoed, requested) {
                return Err(WebAuthnError::ExtensionNotRequested(key));
            }
        }
        Ok(())
    }

    fn verify_rp_id_hash(&mut self) -> Result<(), WebAuthnError> {
        let expected = self.rp.crypto.hash(self.request.rp_id.0.as_bytes());
        if self.auth_data().rp_id_hash != expected {
            return Err(WebAuthnError::RpIdHashMismatch);
        }
        Ok(())
    }

    fn compute_client_data_hash(&mut self) -> Result<(), WebAuthnError> {
        let algorithm = &self.client_data().hash_algorithm;
        if algorithm != "SHA-256" {
            return Err(WebAuthnError::UnsupportedHashAlgorithm(algorithm.clone()));
        }
        self.client_data_hash = Some(self.rp.crypto.hash(&self.response.response.client_data_json));
        Ok(())
    }

    /// Step 11: the signature covers `authenticatorData || clientDataHash`,
    /// so any mutation of the client data, the rpIdHash, the flags byte or
    /// the counter bytes lands here.
    fn verify_signature(&mut self) -> Result<(), WebAuthnError> {
        let decoded = decode_credential_public_key(&self.stored().public_key_cose)?;
        let response = &self.response.response;
        let hash = self
            .client_data_hash
            .as_ref()
            .expect("ComputeClientDataHash has run");
        let mut signed = Vec::with_capacity(response.authenticator_data.len() + hash.len());
        signed.extend_from_slice(&response.authenticator_data);
        signed.extend_from_slice(hash);
        if !self
            .rp
            .crypto
            .verify_signature(&decoded.key, &signed, &response.signature)
        {
            return Err(WebAuthnError::SignatureInvalid);
        }
        Ok(())
    }

    /// Step 12: the counter must move forward. A counter that stays at zero
    /// belongs to an authenticator that never implements one and passes; a
    /// regression is treated as a cloned authenticator, fatally or as a
    /// warning depending on policy.
    fn check_signature_counter(&mut self) -> Result<(), WebAuthnError> {
        let received = self.auth_data().sign_count;
        let stored = self.stored().signature_count;
        if received > stored || stored == 0 {
            return Ok(());
        }
        if received != 0 {
            if self.rp.validate_signature_counter {
                return Err(WebAuthnError::CloneWarning { stored, received });
            }
            warn!(stored, received, "signature counter regressed");
            self.warnings.push(format!(
                "signature counter regressed from {stored} to {received}, possible cloned authenticator"
            ));
        }
        Ok(())
    }

    fn into_result(self) -> AssertionResult {
        let sign_count = self.auth_data().sign_count;
        AssertionResult {
            credential_id: self.response.raw_id.clone(),
            signature_count: sign_count,
            success: true,
            username: self.resolved_username,
            warnings: self.warnings,
        }
    }
}

/// The first key of `echoed` that is not a key of `requested`, if any.
fn first_unrequested(
    echoed: &ExtensionInputs,
    requested: Option<&ExtensionInputs>,
) -> Option<String> {
    echoed
        .keys()
        .find(|key| !requested.map(|r| r.contains_key(*key)).unwrap_or(false))
        .cloned()
}
