//! API key validation

use thiserror::Error;

/// Header carrying the client credential
pub const API_KEY_HEADER: &str = "x-api-key";

/// Credential check failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No credential presented
    #[error("API key is required")]
    Unauthenticated,
    /// Credential presented but does not match
    #[error("Invalid API key")]
    Forbidden,
}

/// Proof that a request carried the configured credential
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorized {
    /// The accepted credential, used as the caller identity
    pub api_key: String,
}

/// Stateless check of a presented key against the configured secret
///
/// Only the BLAKE3 digest of the secret is kept; `blake3::Hash` equality is
/// constant-time.
#[derive(Clone)]
pub struct ApiKeyGuard {
    secret: blake3::Hash,
}

impl ApiKeyGuard {
    /// Create a guard for the given secret
    pub fn new(secret: &str) -> Self {
        Self {
            secret: digest(secret),
        }
    }

    /// Validate a presented credential
    pub fn authorize(&self, presented: Option<&str>) -> Result<Authorized, AuthError> {
        let presented = presented.ok_or(AuthError::Unauthenticated)?;

        if digest(presented) != self.secret {
            tracing::debug!("API key mismatch");
            return Err(AuthError::Forbidden);
        }

        Ok(Authorized {
            api_key: presented.to_string(),
        })
    }
}

impl std::fmt::Debug for ApiKeyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyGuard").finish_non_exhaustive()
    }
}

fn digest(key: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"portico:api_key:");
    hasher.update(key.as_bytes());
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize() {
        let guard = ApiKeyGuard::new("gateway-secret-key");

        let ok = guard.authorize(Some("gateway-secret-key")).unwrap();
        assert_eq!(ok.api_key, "gateway-secret-key");

        assert_eq!(guard.authorize(None), Err(AuthError::Unauthenticated));
        assert_eq!(guard.authorize(Some("wrong")), Err(AuthError::Forbidden));
        assert_eq!(guard.authorize(Some("")), Err(AuthError::Forbidden));
    }

    #[test]
    fn test_debug_hides_secret() {
        let guard = ApiKeyGuard::new("super-secret");
        assert!(!format!("{:?}", guard).contains("super-secret"));
    }
}
