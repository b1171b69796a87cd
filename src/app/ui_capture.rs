use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const PNG_MIME_TYPE: &str = "image/png";

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Base64 payload for an MCP image content block.
pub fn encode_png(bytes: &[u8]) -> Result<String, String> {
    if bytes.len() < PNG_SIGNATURE.len() {
        return Err("Screenshot data is empty".to_string());
    }
    if !bytes.starts_with(PNG_SIGNATURE) {
        return Err("Screenshot data is not a PNG".to_string());
    }
    Ok(STANDARD.encode(bytes))
}
