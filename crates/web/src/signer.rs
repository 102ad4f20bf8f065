//! Message authentication for cookie values.
//!
//! A [`Signer`] computes a keyed MAC over a message and renders it as
//! lowercase hex. The key never leaves the signer.
//!
//! An empty key does not produce a usable signer: [`Signer::sign`] reports
//! [`SignerError::Unconfigured`] and [`Signer::verify`] rejects everything.

use std::fmt;
use std::str::FromStr;

use ring::hmac;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("signing key is empty")]
    Unconfigured,

    #[error("unknown signature algorithm `{0}`, expected one of sha256, sha384, sha512, sha1")]
    UnknownAlgorithm(String),
}

/// The HMAC digest used by a [`Signer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
    /// Only for verifying cookies minted by older deployments.
    LegacySha1,
}

impl SignatureAlgorithm {
    fn hmac(self) -> hmac::Algorithm {
        match self {
            SignatureAlgorithm::Sha256 => hmac::HMAC_SHA256,
            SignatureAlgorithm::Sha384 => hmac::HMAC_SHA384,
            SignatureAlgorithm::Sha512 => hmac::HMAC_SHA512,
            SignatureAlgorithm::LegacySha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha256 => "sha256",
            SignatureAlgorithm::Sha384 => "sha384",
            SignatureAlgorithm::Sha512 => "sha512",
            SignatureAlgorithm::LegacySha1 => "sha1",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "hmac-sha256" => Ok(SignatureAlgorithm::Sha256),
            "sha384" | "hmac-sha384" => Ok(SignatureAlgorithm::Sha384),
            "sha512" | "hmac-sha512" => Ok(SignatureAlgorithm::Sha512),
            "sha1" | "hmac-sha1" => Ok(SignatureAlgorithm::LegacySha1),
            _ => Err(SignerError::UnknownAlgorithm(s.to_owned())),
        }
    }
}

#[derive(Clone)]
pub struct Signer {
    key: Option<hmac::Key>,
    algorithm: SignatureAlgorithm,
}

impl Signer {
    pub fn new<K: AsRef<[u8]>>(key: K, algorithm: SignatureAlgorithm) -> Self {
        let key = key.as_ref();
        let key = (!key.is_empty()).then(|| hmac::Key::new(algorithm.hmac(), key));
        Self { key, algorithm }
    }

    /// A signer that refuses to sign and verifies nothing.
    pub fn unconfigured() -> Self {
        Self { key: None, algorithm: SignatureAlgorithm::default() }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    pub fn sign(&self, message: &str) -> Result<String, SignerError> {
        let key = self.key.as_ref().ok_or(SignerError::Unconfigured)?;
        let tag = hmac::sign(key, message.as_bytes());
        Ok(hex::encode(tag.as_ref()))
    }

    /// Checks `signature` against the MAC of `message` in constant time.
    pub fn verify(&self, message: &str, signature: &str) -> bool {
        let Some(key) = &self.key else {
            return false;
        };

        // sign() only ever emits lowercase hex
        if !signature.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return false;
        }
        let Ok(tag) = hex::decode(signature) else {
            return false;
        };

        hmac::verify(key, message.as_bytes(), &tag).is_ok()
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &self.algorithm)
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "Jefe";
    const DATA: &str = "what do ya want for nothing?";

    #[test]
    fn rfc_4231_sha256() {
        let signer = Signer::new(KEY, SignatureAlgorithm::Sha256);
        assert_eq!(signer.sign(DATA).unwrap(), "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
    }

    #[test]
    fn rfc_2202_sha1() {
        let signer = Signer::new(KEY, SignatureAlgorithm::LegacySha1);
        assert_eq!(signer.sign(DATA).unwrap(), "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79");
    }

    #[test]
    fn sign_then_verify() {
        for algorithm in [
            SignatureAlgorithm::Sha256,
            SignatureAlgorithm::Sha384,
            SignatureAlgorithm::Sha512,
            SignatureAlgorithm::LegacySha1,
        ] {
            let signer = Signer::new("secret", algorithm);
            let signature = signer.sign("verified").unwrap();

            assert!(signature.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
            assert!(signer.verify("verified", &signature));
            assert!(!signer.verify("verifiee", &signature));
        }
    }

    #[test]
    fn sign_is_deterministic() {
        let signer = Signer::new("secret", SignatureAlgorithm::Sha256);
        assert_eq!(signer.sign("verified"), signer.sign("verified"));
    }

    #[test]
    fn different_key_rejects() {
        let signature = Signer::new("secret", SignatureAlgorithm::Sha256).sign("verified").unwrap();
        assert!(!Signer::new("other", SignatureAlgorithm::Sha256).verify("verified", &signature));
        assert!(!Signer::new("secret", SignatureAlgorithm::Sha512).verify("verified", &signature));
    }

    #[test]
    fn malformed_signatures_reject() {
        let signer = Signer::new("secret", SignatureAlgorithm::Sha256);
        let signature = signer.sign("verified").unwrap();

        assert!(!signer.verify("verified", ""));
        assert!(!signer.verify("verified", " "));
        assert!(!signer.verify("verified", "zz"));
        assert!(!signer.verify("verified", "abc"));
        assert!(!signer.verify("verified", &signature[..signature.len() - 2]));
        assert!(!signer.verify("verified", &format!("{signature}00")));
        assert!(!signer.verify("verified", &signature.to_uppercase()));
    }

    #[test]
    fn empty_key_fails_closed() {
        let signer = Signer::new("", SignatureAlgorithm::Sha256);

        assert!(!signer.is_configured());
        assert_eq!(signer.sign("verified"), Err(SignerError::Unconfigured));
        assert!(!signer.verify("verified", ""));
        assert!(!signer.verify("verified", " "));
        assert!(!signer.verify("verified", "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"));
        assert!(!Signer::unconfigured().verify("", ""));
    }

    #[test]
    fn algorithm_names() {
        assert_eq!("sha256".parse(), Ok(SignatureAlgorithm::Sha256));
        assert_eq!("HMAC-SHA512".parse(), Ok(SignatureAlgorithm::Sha512));
        assert_eq!("sha1".parse(), Ok(SignatureAlgorithm::LegacySha1));
        assert!("md5".parse::<SignatureAlgorithm>().is_err());
        assert_eq!(SignatureAlgorithm::default().to_string(), "sha256");
    }
}
