use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::{timestamp, timestamp_value, Clock};
use crate::document::{from_document, id_value, to_document, ObjectId, ID_FIELD};
use crate::error::StoreError;
use crate::query::{Filter, Update};
use crate::range::TimeRange;
use crate::repository::{Collection, Database, RepositoryError};

pub const ACCOUNTS_COLLECTION: &str = "ApiUsers";

pub const FIELD_NAME: &str = "UserName";
pub const FIELD_EMAIL: &str = "Email";
pub const FIELD_ROLE: &str = "Role";
pub const FIELD_API_KEY: &str = "ApiKey";
pub const FIELD_CREATED: &str = "Created";
pub const FIELD_LAST_ACCESS: &str = "LastAccess";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Teacher,
    Student,
    Sensor,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Teacher, Role::Student, Role::Sensor];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
            Role::Sensor => "SENSOR",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid user role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_uppercase().as_str() {
            "TEACHER" => Ok(Role::Teacher),
            "STUDENT" => Ok(Role::Student),
            "SENSOR" => Ok(Role::Sensor),
            _ => Err(UnknownRole(input.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "UserName")]
    pub name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Role")]
    pub role: Role,
    #[serde(rename = "ApiKey")]
    pub api_key: String,
    #[serde(rename = "Created", with = "timestamp")]
    pub created: DateTime<Utc>,
    #[serde(rename = "LastAccess", with = "timestamp")]
    pub last_access: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Account persistence. Owns the `ApiUsers` collection; nothing else writes
/// to it.
#[derive(Clone)]
pub struct AccountStore {
    accounts: Collection,
    clock: Arc<dyn Clock>,
}

impl AccountStore {
    pub fn new(database: &Database, clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: database.collection(ACCOUNTS_COLLECTION),
            clock,
        }
    }

    /// Stores a new account with a freshly issued access key. Emails are
    /// unique; a second account with the same email is rejected. The
    /// uniqueness checks and the write are one store step, so concurrent
    /// creations cannot both succeed.
    pub fn create_account(&self, request: NewAccount) -> Result<Account, StoreError> {
        let by_email = Filter::eq(FIELD_EMAIL, Value::String(request.email.clone()));
        let now = self.clock.now();
        let mut account = Account {
            id: ObjectId::new(),
            name: request.name,
            email: request.email,
            role: request.role,
            api_key: String::new(),
            created: now,
            last_access: now,
        };
        loop {
            account.api_key = Uuid::new_v4().to_string();
            let guard = Filter::Or(vec![
                by_email.clone(),
                Filter::eq(FIELD_API_KEY, Value::String(account.api_key.clone())),
            ]);
            if self.accounts.insert_unless(&guard, to_document(&account)?)? {
                break;
            }
            if self.accounts.find_one(&by_email)?.is_some() {
                return Err(StoreError::DuplicateEmail);
            }
            debug!("issued access key collided, retrying");
        }
        info!(account_id = %account.id, role = %account.role, "account created");
        Ok(account)
    }

    /// Fails with `UnrecognizedRole` when the stored role text is not one
    /// of the known roles.
    pub fn find_by_key(&self, key: &str) -> Result<Account, StoreError> {
        let filter = Filter::eq(FIELD_API_KEY, Value::String(key.to_string()));
        let document = self.accounts.find_one(&filter)?.ok_or(StoreError::NotFound)?;
        let role = document.get(FIELD_ROLE).and_then(Value::as_str);
        if !Role::ALL.iter().any(|known| Some(known.as_str()) == role) {
            let role = role.map(str::to_string).unwrap_or_else(|| "<missing>".to_string());
            return Err(StoreError::UnrecognizedRole(role));
        }
        Ok(from_document(document)?)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Account, StoreError> {
        let id = ObjectId::parse(id)?;
        let document = self
            .accounts
            .find_one(&Filter::eq(ID_FIELD, id_value(&id)))?
            .ok_or(StoreError::NotFound)?;
        Ok(from_document(document)?)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.accounts.count(&Filter::Empty)?)
    }

    /// Moves `LastAccess` forward to now. Unknown keys are ignored, and a
    /// stored timestamp already ahead of the clock is left alone.
    pub fn update_last_access(&self, key: &str) -> Result<(), RepositoryError> {
        let now = timestamp_value(&self.clock.now());
        let filter = Filter::eq(FIELD_API_KEY, Value::String(key.to_string()))
            .and(Filter::lte(FIELD_LAST_ACCESS, now.clone()));
        let update = Update::new().set(FIELD_LAST_ACCESS, now);
        let matched = self.accounts.update_one(&filter, &update)?;
        debug!(matched, "last access updated");
        Ok(())
    }

    /// Returns whether an account was removed.
    pub fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let id = ObjectId::parse(id)?;
        let removed = self
            .accounts
            .delete_one(&Filter::eq(ID_FIELD, id_value(&id)))?;
        Ok(removed > 0)
    }

    pub fn delete_by_role_and_last_access_range(
        &self,
        role: Role,
        range: &TimeRange,
    ) -> Result<u64, StoreError> {
        let filter = Filter::eq(FIELD_ROLE, Value::String(role.as_str().to_string()))
            .and(range.filter(FIELD_LAST_ACCESS));
        let removed = self.accounts.delete_many(&filter)?;
        info!(%role, removed, "accounts deleted by last access range");
        Ok(removed)
    }

    /// Sets `role` on every account created inside `range`. Range ordering is
    /// the caller's responsibility.
    pub fn update_role_by_creation_range(
        &self,
        range: &TimeRange,
        role: Role,
    ) -> Result<u64, StoreError> {
        let update = Update::new().set(FIELD_ROLE, Value::String(role.as_str().to_string()));
        let updated = self
            .accounts
            .update_many(&range.filter(FIELD_CREATED), &update)?;
        info!(%role, updated, "account roles updated by creation range");
        Ok(updated)
    }
}
