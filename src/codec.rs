//! Boundary encoding between byte buffers and the strings WebAuthn clients
//! exchange. base64url without padding is the only string encoding the
//! ceremonies accept; everything past the boundary is raw bytes.

use crate::error::WebAuthnError;

/// Encodes bytes with the URL-safe alphabet, unpadded.
pub fn base64url_encode(data: &[u8]) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}

/// Decodes an unpadded URL-safe base64 string. Padded or otherwise malformed
/// input is rejected rather than fixed up.
pub fn base64url_decode(input: &str) -> Result<Vec<u8>, WebAuthnError> {
    base64::decode_config(input, base64::URL_SAFE_NO_PAD)
        .map_err(|e| WebAuthnError::malformed("base64url", e))
}
