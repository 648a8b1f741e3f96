use thiserror::Error;

/// Error type for failures raised by an injected collaborator (credential
/// repository, challenge generator, metadata service). A collaborator failure
/// aborts the current ceremony only; the core never panics on one.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// The reasons a ceremony step can reject its input.
///
/// These are diagnostic kinds for the server side. Callers are expected to log
/// them and answer the browser with a generic "ceremony failed" message, so no
/// oracle information leaks to a client probing the verifier.
#[derive(Debug, Error)]
pub enum WebAuthnError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("challenge does not match the issued request")]
    ChallengeMismatch,

    #[error("origin `{0}` is not in the allow-list")]
    OriginMismatch(String),

    #[error("token binding id does not match")]
    TokenBindingMismatch,

    #[error("client data type mismatch: expected `{expected}`, got `{actual}`")]
    TypeMismatch { expected: String, actual: String },

    #[error("unsupported hash algorithm `{0}`")]
    UnsupportedHashAlgorithm(String),

    #[error("rpIdHash does not match the relying party id")]
    RpIdHashMismatch,

    #[error("user presence flag is not set")]
    UserPresenceMissing,

    #[error("user verification was required but the UV flag is not set")]
    UserVerificationRequired,

    #[error("credential is not registered for this user")]
    UnknownCredential,

    #[error("credential id is already registered")]
    DuplicateCredentialId,

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("attestation format `{0}` is not supported")]
    AttestationFormatUnsupported(String),

    #[error("attestation statement invalid: {0}")]
    AttestationStatementInvalid(String),

    #[error("attestation could not be verified as trusted")]
    AttestationUntrusted,

    #[error("signature counter regressed from {stored} to {received}, possible cloned authenticator")]
    CloneWarning { stored: u32, received: u32 },

    #[error("extension `{0}` was not requested")]
    ExtensionNotRequested(String),

    #[error("collaborator failure: {0}")]
    CollaboratorFailure(#[source] CollaboratorError),
}

impl WebAuthnError {
    /// Wraps a decode error from one of the binary codecs.
    pub(crate) fn malformed(context: &str, err: impl std::fmt::Display) -> Self {
        WebAuthnError::MalformedInput(format!("{context}: {err}"))
    }
}
