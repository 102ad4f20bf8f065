use std::fmt;

use ring::constant_time::verify_slices_are_equal;
use serde::Deserialize;

/// Login form input. Held only while the login request is handled.
#[derive(Clone, Default, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").field("username", &self.username).field("password", &"***").finish()
    }
}

/// Decides whether a username and password may log in.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credential: &Credential) -> bool;
}

/// A single account fixed at startup.
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials").field("username", &self.username).finish_non_exhaustive()
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, credential: &Credential) -> bool {
        // compare both fields so timing does not reveal which one was wrong
        let username = verify_slices_are_equal(self.username.as_bytes(), credential.username.as_bytes()).is_ok();
        let password = verify_slices_are_equal(self.password.as_bytes(), credential.password.as_bytes()).is_ok();
        username & password
    }
}
