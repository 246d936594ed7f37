//! # Signed-URL Digest Module
//!
//! Calcolo del digest compatibile con il verifier esterno (nginx
//! secure_link) che autorizza l'accesso agli asset statici pubblicati.
//!
//! La formula è `base64url(md5(expires ‖ uri ‖ " " ‖ secret))` con il
//! padding rimosso. Questo modulo NON implementa il server di verifica:
//! serve a generare link firmati e a testare il contratto del collaborator.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use md5::{Digest, Md5};

/// Verdict for a presented signature, mirroring the verifier's response
/// taxonomy: 200 (valid and fresh), 403 (missing or wrong digest),
/// 410 (valid digest, expired link). 404 belongs to the resource layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    Valid,
    Forbidden,
    Gone,
}

/// Compute the signature digest for a URI expiring at `expires`
/// (unix timestamp).
pub fn digest(expires: u64, uri: &str, secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(expires.to_string().as_bytes());
    hasher.update(uri.as_bytes());
    hasher.update(b" ");
    hasher.update(secret.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Check a presented digest against the expected one and the link expiry.
/// A wrong digest wins over staleness: an attacker must not learn whether
/// a guessed link would have been fresh.
pub fn validate(supplied: &str, expires: u64, uri: &str, secret: &str, now: u64) -> ValidationStatus {
    if supplied != digest(expires, uri, secret) {
        return ValidationStatus::Forbidden;
    }
    if now > expires {
        return ValidationStatus::Gone;
    }
    ValidationStatus::Valid
}
