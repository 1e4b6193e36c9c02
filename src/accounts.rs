use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    /// Anything other than `active` locks the account out.
    #[serde(other)]
    Inactive,
}

/// A business using the portal. Each owns one engine and one API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub email: String,
    pub api_key: String,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub plan: Option<String>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[derive(Debug)]
pub enum AccountsError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Duplicate(&'static str, String),
    InvalidId(String),
}

/// Account ids name the WAL file, so they are limited to ASCII letters,
/// digits, `_` and `-`.
pub fn is_valid_account_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl std::fmt::Display for AccountsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountsError::Io(e) => write!(f, "cannot read accounts file: {e}"),
            AccountsError::Parse(e) => write!(f, "invalid accounts file: {e}"),
            AccountsError::Duplicate(what, value) => write!(f, "duplicate account {what}: {value}"),
            AccountsError::InvalidId(id) => {
                write!(f, "invalid account id {id:?}: use letters, digits, '_' or '-'")
            }
        }
    }
}

impl std::error::Error for AccountsError {}

/// Accounts loaded at startup, indexed by id and by API key.
#[derive(Debug, Default)]
pub struct AccountDirectory {
    by_id: HashMap<String, Account>,
    id_by_key: HashMap<String, String>,
}

impl AccountDirectory {
    /// Read a JSON array of accounts. A missing file yields an empty directory.
    pub fn load(path: &Path) -> Result<Self, AccountsError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "accounts file not found, every API key will be rejected");
                return Ok(Self::default());
            }
            Err(e) => return Err(AccountsError::Io(e)),
        };
        let accounts: Vec<Account> = serde_json::from_str(&text).map_err(AccountsError::Parse)?;
        let directory = Self::from_accounts(accounts)?;
        info!(
            path = %path.display(),
            accounts = directory.len(),
            "loaded accounts"
        );
        Ok(directory)
    }

    pub fn from_accounts(accounts: Vec<Account>) -> Result<Self, AccountsError> {
        let mut directory = Self::default();
        for account in accounts {
            if !is_valid_account_id(&account.id) {
                return Err(AccountsError::InvalidId(account.id));
            }
            if directory.by_id.contains_key(&account.id) {
                return Err(AccountsError::Duplicate("id", account.id));
            }
            if directory.id_by_key.contains_key(&account.api_key) {
                return Err(AccountsError::Duplicate("api key for", account.id));
            }
            directory
                .id_by_key
                .insert(account.api_key.clone(), account.id.clone());
            directory.by_id.insert(account.id.clone(), account);
        }
        Ok(directory)
    }

    pub fn by_api_key(&self, key: &str) -> Option<&Account> {
        self.id_by_key.get(key).and_then(|id| self.by_id.get(id))
    }

    pub fn by_id(&self, id: &str) -> Option<&Account> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
