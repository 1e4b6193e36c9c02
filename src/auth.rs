use async_trait::async_trait;

use crate::accounts::{Account, AccountDirectory};
use crate::observability::AUTH_FAILURES_TOTAL;

/// Where callers' credentials are checked. The HTTP layer only sees this trait.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn account_for_key(&self, api_key: &str) -> Option<Account>;
    async fn account_by_id(&self, id: &str) -> Option<Account>;
}

#[async_trait]
impl CredentialSource for AccountDirectory {
    async fn account_for_key(&self, api_key: &str) -> Option<Account> {
        self.by_api_key(api_key).cloned()
    }

    async fn account_by_id(&self, id: &str) -> Option<Account> {
        self.by_id(id).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingApiKey,
    InvalidApiKey,
    AccountInactive,
    BadSignature,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingApiKey => "MISSING_API_KEY",
            AuthError::InvalidApiKey => "INVALID_API_KEY",
            AuthError::AccountInactive => "ACCOUNT_INACTIVE",
            AuthError::BadSignature => "UNAUTHORIZED",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingApiKey => write!(f, "Missing API key"),
            AuthError::InvalidApiKey => write!(f, "Invalid API key"),
            AuthError::AccountInactive => write!(f, "Account is not active"),
            AuthError::BadSignature => write!(f, "Unauthorized"),
        }
    }
}

impl std::error::Error for AuthError {}

fn reject(err: AuthError) -> AuthError {
    metrics::counter!(AUTH_FAILURES_TOTAL, "reason" => err.code()).increment(1);
    err
}

/// Resolve an `x-api-key` value to an active account.
pub async fn authenticate(
    source: &dyn CredentialSource,
    api_key: Option<&str>,
) -> Result<Account, AuthError> {
    let key = api_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| reject(AuthError::MissingApiKey))?;
    let account = source
        .account_for_key(key)
        .await
        .ok_or_else(|| reject(AuthError::InvalidApiKey))?;
    if !account.is_active() {
        return Err(reject(AuthError::AccountInactive));
    }
    Ok(account)
}

/// The workflow tool sends the shared secret verbatim. With no secret
/// configured every request is refused.
pub fn verify_workflow_signature(secret: Option<&str>, header: Option<&str>) -> Result<(), AuthError> {
    match (secret, header) {
        (Some(secret), Some(sent)) if !secret.is_empty() && constant_time_eq(secret.as_bytes(), sent.as_bytes()) => {
            Ok(())
        }
        _ => Err(reject(AuthError::BadSignature)),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
