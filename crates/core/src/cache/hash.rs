//! Request key generation.

use sha2::{Digest, Sha256};

use crate::exchange::ProxyRequest;

/// Compute the storage key for a method and URL.
///
/// The fragment never takes part in the key and the method is case-folded.
pub fn compute_request_key(method: &str, url: &url::Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Storage key for a request.
pub fn request_key(request: &ProxyRequest) -> String {
    compute_request_key(&request.method, &request.url)
}
