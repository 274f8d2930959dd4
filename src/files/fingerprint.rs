use base64::Engine;
use sha2::{Digest, Sha256};

/// Entity tag for an empty body; the same value every time.
const EMPTY_ETAG: &str = "\"0-47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=\"";

/// Computes the strong entity tag for `data`.
///
/// The tag is `"<length in hex>-<hash>"`, where `<hash>` is the first 27
/// characters of the base64-encoded SHA-256 digest of the contents.
pub fn fingerprint(data: &[u8]) -> String {
    if data.is_empty() {
        return EMPTY_ETAG.to_string();
    }
    let digest = Sha256::digest(data);
    let encoded = base64::engine::general_purpose::STANDARD.encode(digest);
    format!("\"{:x}-{}\"", data.len(), &encoded[..27])
}
