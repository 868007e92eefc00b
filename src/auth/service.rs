use std::sync::Arc;

use log::info;

use crate::auth::passwords::verify_password;
use crate::auth::tokens::TokenSigner;
use crate::error_handling::types::AuthError;
use crate::storage::store::RiskStore;
use crate::storage::types::Owner;

/// Credential and token checks against the owner table.
///
/// All resolution failures (bad password, bad signature, expiry, unknown
/// subject) are reported through `AuthError`; the web layer collapses them
/// into one uniform 401 so callers cannot probe which part failed.
pub struct AuthService {
    store: Arc<RiskStore>,
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(store: Arc<RiskStore>, signer: TokenSigner) -> Self {
        Self { store, signer }
    }

    /// Verifies a username/password pair and issues an access token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let owner = self
            .store
            .owner_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &owner.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        info!("Issued token for {}", owner.username);
        self.signer.issue(&owner.username)
    }

    /// Resolves an `Authorization` header value to its owner.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<Owner, AuthError> {
        let header = header.ok_or(AuthError::InvalidToken)?;
        let token = strip_bearer(header).ok_or(AuthError::InvalidToken)?;
        let username = self.signer.verify(token)?;
        self.store
            .owner_by_username(&username)
            .await?
            .ok_or(AuthError::UnknownSubject)
    }
}

fn strip_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}
