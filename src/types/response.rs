use serde::Deserialize;

use crate::error::WebAuthnError;

use super::{CredentialId, ExtensionInputs, UserHandle};

/// The credential object the browser hands back after a ceremony. `T` is the
/// attestation response for registration, the assertion response for
/// authentication.
/// [See more](https://w3c.github.io/webauthn/#publickeycredential)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredential<T> {
    /// base64url form of `raw_id`.
    pub id: String,
    pub raw_id: CredentialId,
    pub response: T,
    pub client_extension_results: Option<ExtensionInputs>,
}

/// Response payload of a registration ceremony.
/// [See more](https://w3c.github.io/webauthn/#authenticatorattestationresponse)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON", with = "serde_bytes")]
    pub client_data_json: Vec<u8>,
    #[serde(rename = "attestationObject", with = "serde_bytes")]
    pub attestation_object: Vec<u8>,
}

/// Response payload of an assertion ceremony.
/// [See more](https://w3c.github.io/webauthn/#authenticatorassertionresponse)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON", with = "serde_bytes")]
    pub client_data_json: Vec<u8>,
    #[serde(rename = "authenticatorData", with = "serde_bytes")]
    pub authenticator_data: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    #[serde(rename = "userHandle")]
    pub user_handle: Option<UserHandle>,
}

/// The client-side context document, parsed from `clientDataJSON` (UTF-8 JSON,
/// per the 2018-03-20 Candidate Recommendation). Unknown keys are tolerated
/// here: any addition changes the hash, so signature verification catches
/// tampering regardless.
///
/// Absence of an optional field is meaningful and distinct from an empty value
/// in every consumer, `tokenBindingId` in particular.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    /// base64url encoding of the challenge the client saw.
    pub challenge: String,
    pub origin: String,
    pub hash_algorithm: String,
    #[serde(default)]
    pub token_binding_id: Option<String>,
    #[serde(default)]
    pub client_extensions: Option<ExtensionInputs>,
    #[serde(default)]
    pub authenticator_extensions: Option<ExtensionInputs>,
}

impl CollectedClientData {
    pub fn parse(json: &[u8]) -> Result<Self, WebAuthnError> {
        serde_json::from_slice(json).map_err(|e| WebAuthnError::malformed("clientDataJSON", e))
    }
}
