//! Admin authentication.
//!
//! Passwords are never stored; the configuration carries the hex SHA-256 of
//! the admin password and digests are compared in constant time.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::config::AdminConfig;
use crate::error::{Error, Result};

/// Checks a candidate password.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, password: &str) -> bool;
}

/// Single admin credential pair.
#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password_sha256: Option<[u8; 32]>,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("configured", &self.password_sha256.is_some())
            .finish()
    }
}

impl AdminCredentials {
    /// `password_sha256` is the hex digest; `None` disables admin login.
    pub fn new(username: impl Into<String>, password_sha256: Option<&str>) -> Result<Self> {
        let password_sha256 = password_sha256.map(decode_digest).transpose()?;
        Ok(Self {
            username: username.into(),
            password_sha256,
        })
    }

    pub fn from_config(config: &AdminConfig) -> Result<Self> {
        let credentials = Self::new(&config.username, config.password_sha256.as_deref())?;
        if credentials.password_sha256.is_none() {
            warn!("ADMIN_PASSWORD_SHA256 not set, admin login is disabled");
        }
        Ok(credentials)
    }

    /// Credentials for a plaintext password, hashed immediately.
    pub fn with_password(username: impl Into<String>, password: &str) -> Self {
        Self {
            username: username.into(),
            password_sha256: Some(sha256(password)),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_configured(&self) -> bool {
        self.password_sha256.is_some()
    }

    /// Check both username and password.
    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        let user_ok = username.as_bytes().ct_eq(self.username.as_bytes());
        let password_ok = self.verify(password);

        if bool::from(user_ok) && password_ok {
            Ok(())
        } else {
            Err(Error::AuthFailure)
        }
    }
}

impl CredentialVerifier for AdminCredentials {
    fn verify(&self, password: &str) -> bool {
        match &self.password_sha256 {
            Some(expected) => sha256(password)[..].ct_eq(&expected[..]).into(),
            None => false,
        }
    }
}

fn sha256(input: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(input.as_bytes()));
    out
}

/// Hex digest of a password, for writing into the configuration.
pub fn hash_password(password: &str) -> String {
    sha256(password).iter().map(|b| format!("{:02x}", b)).collect()
}

fn decode_digest(hex: &str) -> Result<[u8; 32]> {
    let hex = hex.trim();
    let invalid = || Error::InvalidConfig("admin password hash must be 64 hex characters".into());

    if hex.len() != 64 || !hex.is_ascii() {
        return Err(invalid());
    }

    let mut digest = [0u8; 32];
    for (i, byte) in digest.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    Ok(digest)
}
