use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chatlink_common::{AcceptedEvent, Account, AccountId, Email};

use crate::notifier::Notifier;
use crate::store::{AccountStore, StoreError, StoreResult};

/// Wraps a store and fails selected operations on demand.
pub struct FlakyStore<S> {
    inner: S,
    failing_saves: Mutex<HashSet<AccountId>>,
    failing_email_lookups: AtomicBool,
    saves: AtomicUsize,
}

impl<S: AccountStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_saves: Mutex::new(HashSet::new()),
            failing_email_lookups: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn fail_saves_for(&self, id: &AccountId) {
        self.failing_saves.lock().unwrap().insert(id.clone());
    }

    pub fn fail_email_lookups(&self, fail: bool) {
        self.failing_email_lookups.store(fail, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: AccountStore> AccountStore for FlakyStore<S> {
    async fn find_by_id(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &Email) -> StoreResult<Option<Account>> {
        if self.failing_email_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("lookup of {email} failed")));
        }
        self.inner.find_by_email(email).await
    }

    async fn save(&self, account: &Account) -> StoreResult<()> {
        if self.failing_saves.lock().unwrap().contains(&account.id) {
            return Err(StoreError::Unavailable(format!("write of {} failed", account.id)));
        }
        self.inner.save(account).await?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(AccountId, AcceptedEvent)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(AccountId, AcceptedEvent)> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, target: &AccountId, event: AcceptedEvent) {
        self.events.lock().unwrap().push((target.clone(), event));
    }
}
