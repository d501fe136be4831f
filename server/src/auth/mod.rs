pub mod jwt;
pub mod middleware;

use thiserror::Error;

/// Why a connection or request was rejected by the authentication check.
/// The WebSocket handler maps these to distinct close codes.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

/// Authentication collaborator: given a bearer token, returns the
/// authenticated identity or rejects. The connection registry calls this
/// before admitting a connection to a channel.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<String, AuthError>;
}

/// JWT-backed authenticator used in production. Validates HS256 access
/// tokens against the server's signing secret.
pub struct JwtAuthenticator {
    secret: Vec<u8>,
}

impl JwtAuthenticator {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Result<String, AuthError> {
        let claims = jwt::validate_access_token(&self.secret, token).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            }
        })?;
        Ok(claims.sub)
    }
}
