use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::config::Config;
use crate::hub::Identity;
use crate::shared::AppError;

/// What a signed token asserts about its bearer
#[derive(Debug, Serialize, Deserialize)]
struct IdentityClaims {
    sub: String, // User id
    username: String,
    exp: i64,
    iat: i64,
}

/// Issues identity tokens and turns presented tokens back into a verified [`Identity`].
///
/// Keys are derived once from the shared secret.
#[derive(Clone)]
pub struct IdentityTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime_days: i64,
}

impl IdentityTokens {
    pub fn new(secret: &str, lifetime_days: i64) -> Self {
        let mut validation = Validation::default();
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime_days,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.jwt_secret, config.session_expiration_days)
    }

    /// Signs a token binding the identity for the configured lifetime
    #[instrument(skip_all, fields(user_id = %identity.user_id()))]
    pub fn issue(&self, identity: &Identity) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = IdentityClaims {
            sub: identity.user_id().to_string(),
            username: identity.username().to_string(),
            exp: (now + Duration::days(self.lifetime_days)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "Failed to sign identity token");
            AppError::Internal
        })
    }

    /// Checks signature and expiry, then rebuilds the identity the token was issued for
    #[instrument(skip_all)]
    pub fn verify(&self, token: &str) -> Result<Identity, AppError> {
        let claims = decode::<IdentityClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "Token failed verification");
                AppError::Unauthorized("Invalid authentication token".to_string())
            })?
            .claims;

        Identity::new(claims.sub, claims.username)
            .map_err(|e| AppError::Unauthorized(e.to_string()))
    }
}
