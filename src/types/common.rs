use serde::{Deserialize, Serialize};

use crate::codec;

/// Identifies the relying party (RP) of a credential. Must be a registrable
/// domain suffix of the effective origin.
/// [See more](https://w3c.github.io/webauthn/#rp-id)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpId(pub String);

/// Identifies a credential.
/// [See more](https://www.w3.org/TR/webauthn/#credential-id)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CredentialId(#[serde(with = "serde_bytes")] pub Vec<u8>);

impl CredentialId {
    /// The boundary representation used for `id` strings in browser payloads.
    pub fn to_base64url(&self) -> String {
        codec::base64url_encode(&self.0)
    }
}

/// Identifies a user's account within a particular RP. Opaque to the
/// authenticator; 1..64 bytes.
/// [See more](https://w3c.github.io/webauthn/#dom-publickeycredentialuserentity-id)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserHandle(#[serde(with = "serde_bytes")] pub Vec<u8>);

/// The random bytes a ceremony binds the client response to. Issued by the RP,
/// remembered by the calling layer until the response arrives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Challenge(#[serde(with = "serde_bytes")] pub Vec<u8>);

/// 128-bit authenticator model identifier, embedded in attested credential data.
/// [See more](https://www.w3.org/TR/webauthn/#aaguid)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Aaguid(pub [u8; 16]);

impl Aaguid {
    pub const ZERO: Aaguid = Aaguid([0; 16]);
}

/// Currently there's only 1 credential type (public key)
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyType {
    #[serde(rename = "public-key")]
    PublicKey,
}

/// Identifies a credential along with the transports it can be used on.
/// [See more](https://w3c.github.io/webauthn/#dictdef-publickeycredentialdescriptor)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicKeyCredentialDescriptor {
    #[serde(rename = "type")]
    pub type_: PublicKeyType,
    pub id: CredentialId,
    pub transports: Option<Vec<String>>,
}

impl PublicKeyCredentialDescriptor {
    pub fn new(id: CredentialId) -> Self {
        Self {
            type_: PublicKeyType::PublicKey,
            id,
            transports: None,
        }
    }
}
