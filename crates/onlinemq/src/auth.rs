//! Credentials and HTTP Basic authorization.
//!
//! The service authenticates every request with HTTP Basic auth, so a
//! connection is authenticated from the moment it is constructed: the
//! authorization value is computed once and reused for its whole lifetime.

use crate::error::ValidationError;
use base64::{engine::general_purpose, Engine as _};
use std::fmt;
use zeroize::Zeroizing;

/// User name and password for an OnlineMQ account.
///
/// Only the derived authorization value is kept. It is wiped from memory when
/// the credentials are dropped and never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    user: String,
    authorization: Zeroizing<String>,
}

impl Credentials {
    /// Create credentials, rejecting an empty user name
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let user = user.into();
        if user.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "user".to_string(),
            });
        }
        if user.contains(':') {
            return Err(ValidationError::InvalidFormat {
                field: "user".to_string(),
                message: "must not contain ':'".to_string(),
            });
        }

        let password = Zeroizing::new(password.into());
        let authorization = Zeroizing::new(basic_authorization(&user, &password));

        Ok(Self {
            user,
            authorization,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(&self) -> &str {
        &self.authorization
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn basic_authorization(user: &str, password: &str) -> String {
    let pair = Zeroizing::new(format!("{}:{}", user, password));
    format!("Basic {}", general_purpose::STANDARD.encode(pair.as_bytes()))
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
