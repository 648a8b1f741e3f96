//! Server-side verification core for WebAuthn (W3C Candidate Recommendation,
//! 2018-03-20): validates registration (attestation) and authentication
//! (assertion) ceremonies for a relying party.
//!
//! The [`rp::RelyingParty`] façade issues ceremony options and runs the two
//! verification pipelines. Transport, session handling, challenge storage and
//! credential persistence are the caller's concern, reached only through the
//! traits in [`storage`]; the pipelines themselves are pure functions over
//! byte buffers and are safe to call from any number of threads.

pub mod assertion;
pub mod attestation;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod registration;
pub mod rp;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use assertion::{AssertionFailure, AssertionResult, AssertionStep};
pub use attestation::{AttestationType, VerifiedAttestation};
pub use error::{CollaboratorError, WebAuthnError};
pub use registration::{RegistrationFailure, RegistrationResult, RegistrationStep};
pub use rp::RelyingParty;
pub use storage::{
    ChallengeGenerator, CredentialRepository, MetadataService, RegisteredCredential,
};
