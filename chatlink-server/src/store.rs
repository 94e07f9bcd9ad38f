use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chatlink_common::{Account, AccountId, Email};
use sled::{Db, Tree};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("corrupt account record: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("email already registered: {0}")]
    EmailTaken(Email),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: &AccountId) -> StoreResult<Option<Account>>;

    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &Email) -> StoreResult<Option<Account>>;

    /// Insert or overwrite the record. Fails with [`StoreError::EmailTaken`]
    /// if a different account owns the email.
    async fn save(&self, account: &Account) -> StoreResult<()>;
}

#[async_trait]
impl<T: AccountStore + ?Sized> AccountStore for Arc<T> {
    async fn find_by_id(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        (**self).find_by_id(id).await
    }

    async fn find_by_email(&self, email: &Email) -> StoreResult<Option<Account>> {
        (**self).find_by_email(email).await
    }

    async fn save(&self, account: &Account) -> StoreResult<()> {
        (**self).save(account).await
    }
}

/// sled-backed store: `accounts` maps id to JSON record, `emails` maps
/// email to id.
#[derive(Clone)]
pub struct SledAccountStore {
    accounts: Tree,
    emails: Tree,
}

impl SledAccountStore {
    pub fn new(db: &Db) -> StoreResult<Self> {
        Ok(Self {
            accounts: db.open_tree("accounts")?,
            emails: db.open_tree("emails")?,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::new(&sled::open(path)?)
    }

    /// Deleted when dropped.
    pub fn temporary() -> StoreResult<Self> {
        Self::new(&sled::Config::new().temporary(true).open()?)
    }

    fn account(&self, id: impl AsRef<[u8]>) -> StoreResult<Option<Account>> {
        match self.accounts.get(id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn claim_email(&self, account: &Account) -> StoreResult<()> {
        let id = account.id.0.as_bytes();
        match self
            .emails
            .compare_and_swap(account.email.as_str(), None as Option<&[u8]>, Some(id))?
        {
            Ok(()) => Ok(()),
            Err(existing) if existing.current.as_deref() == Some(id) => Ok(()),
            Err(_) => Err(StoreError::EmailTaken(account.email.clone())),
        }
    }
}

#[async_trait]
impl AccountStore for SledAccountStore {
    async fn find_by_id(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        self.account(id.0.as_bytes())
    }

    async fn find_by_email(&self, email: &Email) -> StoreResult<Option<Account>> {
        match self.emails.get(email.as_str())? {
            Some(id) => self.account(id),
            None => Ok(None),
        }
    }

    async fn save(&self, account: &Account) -> StoreResult<()> {
        self.claim_email(account)?;
        self.accounts
            .insert(account.id.0.as_bytes(), serde_json::to_vec(account)?)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_id(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        Ok(accounts.get(id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        Ok(accounts.values().find(|a| &a.email == email).cloned())
    }

    async fn save(&self, account: &Account) -> StoreResult<()> {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        if accounts
            .values()
            .any(|a| a.email == account.email && a.id != account.id)
        {
            return Err(StoreError::EmailTaken(account.email.clone()));
        }
        accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, email: &str) -> Account {
        Account::new(AccountId(id.into()), id, Email::normalize(email).unwrap())
    }

    async fn saves_and_finds(store: &dyn AccountStore) {
        let mut a = account("1", "a@x.com");
        store.save(&a).await.unwrap();

        let found = store.find_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(found, a);
        let found = store.find_by_email(&a.email).await.unwrap().unwrap();
        assert_eq!(found.id, a.id);

        a.received.insert(Email::normalize("b@x.com").unwrap());
        store.save(&a).await.unwrap();
        let found = store.find_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(found.received.len(), 1);

        assert!(store.find_by_id(&AccountId("2".into())).await.unwrap().is_none());
        let missing = Email::normalize("c@x.com").unwrap();
        assert!(store.find_by_email(&missing).await.unwrap().is_none());
    }

    async fn rejects_taken_email(store: &dyn AccountStore) {
        store.save(&account("1", "a@x.com")).await.unwrap();
        let err = store.save(&account("2", "a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken(e) if e.as_str() == "a@x.com"));
        assert!(store.find_by_id(&AccountId("2".into())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sled_saves_and_finds() {
        saves_and_finds(&SledAccountStore::temporary().unwrap()).await;
    }

    #[tokio::test]
    async fn sled_rejects_taken_email() {
        rejects_taken_email(&SledAccountStore::temporary().unwrap()).await;
    }

    #[tokio::test]
    async fn memory_saves_and_finds() {
        saves_and_finds(&MemoryAccountStore::new()).await;
    }

    #[tokio::test]
    async fn memory_rejects_taken_email() {
        rejects_taken_email(&MemoryAccountStore::new()).await;
    }

    #[tokio::test]
    async fn sled_reports_corrupt_records() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledAccountStore::new(&db).unwrap();
        db.open_tree("accounts").unwrap().insert("1", "not json").unwrap();
        let err = store.find_by_id(&AccountId("1".into())).await.unwrap_err();
        assert!(matches!(err, StoreError::Serde(_)));
    }
}
