use http::{HeaderMap, HeaderName};
use thiserror::Error;
use tracing::{debug, warn};

use crate::account::{Account, AccountStore, Role};
use crate::config::ConfigError;
use crate::error::StoreError;
use crate::repository::RepositoryError;

pub const DEFAULT_API_KEY_HEADER: &str = "apiKey";

/// Gate failures. `InvalidCredential` and `InsufficientRole` render the same
/// message so a caller cannot tell which check failed.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("No API key provided with request")]
    MissingCredential,
    #[error("The provided API Key is invalid or does not have the required permissions!")]
    InvalidCredential,
    #[error("The provided API Key is invalid or does not have the required permissions!")]
    InsufficientRole,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AccessError {
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AccessError::InvalidCredential | AccessError::InsufficientRole
        )
    }
}

/// Resolves the access key carried in a request header to an account and
/// checks its role against the set an operation allows. Roles are not
/// ordered: each one must be listed explicitly.
#[derive(Clone)]
pub struct AccessGate {
    accounts: AccountStore,
    header: HeaderName,
}

impl AccessGate {
    /// Fails when `header` cannot name an HTTP header, since no request
    /// could ever carry it.
    pub fn new(accounts: AccountStore, header: &str) -> Result<Self, ConfigError> {
        let header = HeaderName::from_bytes(header.trim().as_bytes()).map_err(|_| {
            ConfigError::TypeMismatch(
                "security.api_key_header".to_string(),
                "a valid HTTP header name".to_string(),
            )
        })?;
        Ok(Self { accounts, header })
    }

    pub fn header(&self) -> &str {
        self.header.as_str()
    }

    pub fn authorize(&self, headers: &HeaderMap, required: &[Role]) -> Result<Account, AccessError> {
        let credential = match headers.get(&self.header) {
            None => None,
            Some(value) => match value.to_str() {
                Ok(text) => Some(text),
                Err(_) => {
                    warn!(header = %self.header, "rejected request: credential is not valid text");
                    return Err(AccessError::InvalidCredential);
                }
            },
        };
        self.authorize_credential(credential, required)
    }

    /// Checks run in order: presence, lookup, role. The last-access stamp is
    /// written only after all of them pass, and a failure to write it does
    /// not fail the request.
    pub fn authorize_credential(
        &self,
        credential: Option<&str>,
        required: &[Role],
    ) -> Result<Account, AccessError> {
        let key = credential.map(strip_decoration).unwrap_or_default();
        if key.is_empty() {
            warn!("rejected request: no credential");
            return Err(AccessError::MissingCredential);
        }

        let account = match self.accounts.find_by_key(key) {
            Ok(account) => account,
            Err(StoreError::NotFound) => {
                warn!("rejected request: unknown credential");
                return Err(AccessError::InvalidCredential);
            }
            Err(StoreError::UnrecognizedRole(role)) => {
                warn!(%role, "rejected request: stored role is not recognized");
                return Err(AccessError::InsufficientRole);
            }
            Err(StoreError::Repository(err)) => return Err(AccessError::Repository(err)),
            Err(err) => {
                return Err(AccessError::Repository(RepositoryError::Store(
                    err.to_string(),
                )))
            }
        };

        if !required.contains(&account.role) {
            warn!(
                account_id = %account.id,
                role = %account.role,
                "rejected request: role not allowed"
            );
            return Err(AccessError::InsufficientRole);
        }

        if let Err(err) = self.accounts.update_last_access(key) {
            warn!(account_id = %account.id, error = %err, "failed to record last access");
        }
        debug!(account_id = %account.id, role = %account.role, "request authorized");
        Ok(account)
    }
}

/// Strips surrounding whitespace and any `{}`/`[]` wrapping left over from
/// copying a key out of API documentation.
pub fn strip_decoration(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '{' | '}' | '[' | ']'))
        .trim()
}
