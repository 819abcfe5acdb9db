//! Proof Key for Code Exchange (RFC 7636).
//!
//! Only the `S256` challenge method is supported. A fresh [`PkcePair`] is
//! generated for every authorization attempt and handed back to the caller;
//! nothing here retains the verifier.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use crate::error::{AuthEngineError, Result};

/// Length of the PKCE code verifier in bytes (before base64 encoding).
const PKCE_VERIFIER_BYTES: usize = 32;

/// The only supported `code_challenge_method`.
pub const PKCE_METHOD: &str = "S256";

/// A PKCE verifier and its derived `S256` challenge.
#[derive(Clone, Serialize, Deserialize)]
pub struct PkcePair {
    /// 43-character base64url string, kept secret until the token exchange.
    pub verifier: String,
    /// `BASE64URL(SHA256(verifier))`, unpadded.
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh pair from 32 bytes of system randomness.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEngineError::Random`] if the system CSPRNG fails.
    pub fn generate() -> Result<Self> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; PKCE_VERIFIER_BYTES];
        rng.fill(&mut bytes).map_err(|_| AuthEngineError::Random)?;

        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = challenge_for(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }

    /// The challenge method to send alongside [`PkcePair::challenge`].
    pub fn method(&self) -> &'static str {
        PKCE_METHOD
    }
}

impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Derive the `S256` code challenge for a verifier.
pub fn challenge_for(verifier: &str) -> String {
    let hash = digest::digest(&digest::SHA256, verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash.as_ref())
}

/// Check that a verifier satisfies the RFC 7636 length and alphabet rules.
pub fn is_valid_verifier(verifier: &str) -> bool {
    (43..=128).contains(&verifier.len())
        && verifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_is_correct_length() {
        let pair = PkcePair::generate().unwrap();
        // 32 bytes base64url encoded = 43 characters (no padding).
        assert_eq!(pair.verifier.len(), 43);
        assert!(is_valid_verifier(&pair.verifier));
    }

    #[test]
    fn verifier_is_url_safe() {
        let pair = PkcePair::generate().unwrap();
        for c in pair.verifier.chars() {
            assert!(
                c.is_ascii_alphanumeric() || c == '-' || c == '_',
                "unexpected character in verifier: {c}"
            );
        }
    }

    #[test]
    fn challenge_matches_verifier() {
        for _ in 0..16 {
            let pair = PkcePair::generate().unwrap();
            assert_eq!(pair.challenge, challenge_for(&pair.verifier));
            assert!(!pair.challenge.contains('='));
        }
    }

    #[test]
    fn challenge_is_rfc7636_test_vector() {
        // RFC 7636 Appendix B.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            challenge_for(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn generated_pairs_are_unique() {
        let a = PkcePair::generate().unwrap();
        let b = PkcePair::generate().unwrap();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn method_is_s256() {
        let pair = PkcePair::generate().unwrap();
        assert_eq!(pair.method(), "S256");
    }

    #[test]
    fn verifier_validation_rejects_bad_input() {
        assert!(!is_valid_verifier("short"));
        assert!(!is_valid_verifier(&"a".repeat(129)));
        assert!(!is_valid_verifier(&format!("{}!", "a".repeat(43))));
        assert!(is_valid_verifier(&"a~b.c_d-".repeat(6)));
    }

    #[test]
    fn debug_redacts_verifier() {
        let pair = PkcePair::generate().unwrap();
        let rendered = format!("{pair:?}");
        assert!(!rendered.contains(&pair.verifier));
        assert!(rendered.contains("<redacted>"));
    }
}
