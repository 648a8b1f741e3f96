use serde::{Deserialize, Serialize};

use crate::crypto::CoseAlgorithmIdentifier;

use super::{
    Challenge, CredentialId, PublicKeyCredentialDescriptor, PublicKeyType, RpId, UserHandle,
};

/// Extension inputs are an open map; the core only inspects its keys.
pub type ExtensionInputs = serde_json::Map<String, serde_json::Value>;

/// Attributes of the relying party issuing a ceremony.
/// [See more](https://w3c.github.io/webauthn/#dictdef-publickeycredentialrpentity)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelyingPartyIdentity {
    pub id: RpId,
    pub name: String,
    pub icon: Option<String>,
}

impl RelyingPartyIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RpId(id.into()),
            name: name.into(),
            icon: None,
        }
    }
}

/// Attributes of the user account a registration is made for.
/// [See more](https://w3c.github.io/webauthn/#dictdef-publickeycredentialuserentity)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: UserHandle,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub icon: Option<String>,
}

/// Identifies a crypto algorithm acceptable to the RP.
/// [See more](https://w3c.github.io/webauthn/#dictdef-publickeycredentialparameters)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicKeyCredentialParameters {
    #[serde(rename = "type")]
    pub type_: PublicKeyType,
    pub alg: CoseAlgorithmIdentifier,
}

impl PublicKeyCredentialParameters {
    pub fn new(alg: CoseAlgorithmIdentifier) -> Self {
        Self {
            type_: PublicKeyType::PublicKey,
            alg,
        }
    }
}

/// How much attestation information the RP wants conveyed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyancePreference {
    None,
    Indirect,
    Direct,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    Preferred,
    Discouraged,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthenticatorAttachment {
    #[serde(rename = "platform")]
    Platform,
    #[serde(rename = "cross-platform")]
    CrossPlatform,
}

/// Filters which authenticators may take part in a registration.
/// [See more](https://w3c.github.io/webauthn/#dictdef-authenticatorselectioncriteria)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelectionCriteria {
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    pub require_resident_key: bool,
    pub user_verification: UserVerificationRequirement,
}

impl Default for AuthenticatorSelectionCriteria {
    fn default() -> Self {
        Self {
            authenticator_attachment: None,
            require_resident_key: false,
            user_verification: UserVerificationRequirement::Preferred,
        }
    }
}

/// The registration request handed to `navigator.credentials.create()`,
/// remembered by the calling layer until the response arrives.
/// [See more](https://w3c.github.io/webauthn/#dictdef-publickeycredentialcreationoptions)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialCreationOptions {
    pub rp: RelyingPartyIdentity,
    pub user: UserIdentity,
    pub challenge: Challenge,
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    pub exclude_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    pub attestation: AttestationConveyancePreference,
    pub extensions: Option<ExtensionInputs>,
}

/// The assertion request handed to `navigator.credentials.get()`.
/// [See more](https://w3c.github.io/webauthn/#dictdef-publickeycredentialrequestoptions)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialRequestOptions {
    pub rp_id: RpId,
    pub challenge: Challenge,
    pub allow_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
    pub extensions: Option<ExtensionInputs>,
}

impl PublicKeyCredentialRequestOptions {
    /// Whether `id` satisfies this request's allow-list. An absent or empty
    /// list allows any credential.
    pub(crate) fn allows(&self, id: &CredentialId) -> bool {
        match &self.allow_credentials {
            Some(allowed) if !allowed.is_empty() => allowed.iter().any(|d| &d.id == id),
            _ => true,
        }
    }
}
