//! Credential to player id resolution.

use banqi_rules::PlayerId;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

use crate::service::ServiceError;

/// Turns an opaque credential into an authenticated player id.
pub trait Authenticator {
    /// Resolves `credential`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Unauthorized`] for a missing or unknown credential.
    fn authenticate(&self, credential: &str) -> Result<PlayerId, ServiceError>;
}

/// Static bearer tokens mapped to player ids.
///
/// Accepts `"Bearer <token>"` or the bare token.
#[derive(Debug, Clone, Default)]
pub struct TokenAuthenticator {
    tokens: HashMap<String, PlayerId>,
}

impl TokenAuthenticator {
    /// Creates an authenticator over a token table.
    #[instrument(skip(tokens), fields(count = tokens.len()))]
    pub fn new(tokens: HashMap<String, PlayerId>) -> Self {
        Self { tokens }
    }

    fn token(credential: &str) -> &str {
        let trimmed = credential.trim();
        trimmed
            .strip_prefix("Bearer ")
            .map(str::trim)
            .unwrap_or(trimmed)
    }
}

impl Authenticator for TokenAuthenticator {
    #[instrument(skip(self, credential))]
    fn authenticate(&self, credential: &str) -> Result<PlayerId, ServiceError> {
        let token = Self::token(credential);
        if token.is_empty() {
            warn!("Missing credential");
            return Err(ServiceError::Unauthorized);
        }
        match self.tokens.get(token) {
            Some(player_id) => {
                debug!(%player_id, "Credential accepted");
                Ok(player_id.clone())
            }
            None => {
                warn!("Unknown credential");
                Err(ServiceError::Unauthorized)
            }
        }
    }
}
