use std::sync::Arc;

use chatlink_common::{AcceptedEvent, Account, AccountId, Email, RequestSet};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::notifier::Notifier;
use crate::store::{AccountStore, StoreError};

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type RequestResult<T> = Result<T, RequestError>;

fn invalid(message: &str) -> RequestError {
    RequestError::InvalidRequest(message.to_string())
}

fn not_found(message: &str) -> RequestError {
    RequestError::NotFound(message.to_string())
}

fn conflict(message: &str) -> RequestError {
    RequestError::Conflict(message.to_string())
}

#[derive(Clone)]
pub struct RequestCoordinator {
    store: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
}

impl RequestCoordinator {
    pub fn new(store: Arc<dyn AccountStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    async fn current(&self, id: &AccountId) -> RequestResult<Account> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found("User not found"))
    }

    /// Creates an account with empty request sets under a fresh id.
    pub async fn register(&self, name: &str, email: &str) -> RequestResult<Account> {
        let email = Email::parse_registration(email)
            .ok_or_else(|| invalid("Please enter a valid email address"))?;
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(conflict("User already exists with this email"));
        }
        let account = Account::new(AccountId(Uuid::new_v4().to_string()), name, email);
        match self.store.save(&account).await {
            Ok(()) => {}
            // lost a registration race for the same email
            Err(StoreError::EmailTaken(_)) => {
                return Err(conflict("User already exists with this email"))
            }
            Err(err) => return Err(err.into()),
        }
        info!(account = %account.id, email = %account.email, "registered account");
        Ok(account)
    }

    pub async fn profile(&self, current: &AccountId) -> RequestResult<Account> {
        self.current(current).await
    }

    pub async fn send(&self, current: &AccountId, recipient_email: &str) -> RequestResult<()> {
        let recipient_email = Email::normalize(recipient_email)
            .ok_or_else(|| invalid("Please provide recipient_email"))?;
        let sender = self.current(current).await?;
        if recipient_email == sender.email {
            return Err(invalid("You cannot send a chat request to yourself"));
        }

        let mut recipient = self
            .store
            .find_by_email(&recipient_email)
            .await?
            .ok_or_else(|| not_found("Recipient user not found"))?;
        // Only the recipient side is checked for duplicates.
        if recipient.received.contains(&sender.email) {
            return Err(conflict("Chat request already sent to this user"));
        }
        recipient.received.insert(sender.email.clone());
        self.store.save(&recipient).await?;
        debug!(from = %sender.email, to = %recipient_email, "recorded received request");

        // Re-read: the sender record may have moved on since it was loaded.
        if let Some(mut fresh) = self.store.find_by_id(current).await? {
            if fresh.sent.insert(recipient_email.clone()) {
                if let Err(err) = self.store.save(&fresh).await {
                    warn!(
                        from = %sender.email,
                        to = %recipient_email,
                        error = %err,
                        "recipient updated but sender write failed"
                    );
                    return Err(err.into());
                }
            }
        }

        info!(from = %sender.email, to = %recipient_email, "chat request sent");
        Ok(())
    }

    /// Returns the accepting account's `received` set after removal.
    pub async fn accept(&self, current: &AccountId, sender_email: &str) -> RequestResult<RequestSet> {
        let sender_email =
            Email::normalize(sender_email).ok_or_else(|| invalid("Please provide sender_email"))?;
        let mut account = self.current(current).await?;
        if !account.received.remove(&sender_email) {
            return Err(not_found("Chat request from this sender not found"));
        }
        self.store.save(&account).await?;

        let mut sender = match self.store.find_by_email(&sender_email).await {
            Ok(Some(sender)) => sender,
            Ok(None) => {
                warn!(account = %account.email, sender = %sender_email, "sender account missing, skipping sender update");
                return Ok(account.received);
            }
            Err(err) => {
                warn!(account = %account.email, sender = %sender_email, error = %err, "sender lookup failed, skipping sender update");
                return Ok(account.received);
            }
        };
        sender.sent.remove(&account.email);
        sender.accepted.insert(account.email.clone());
        if let Err(err) = self.store.save(&sender).await {
            warn!(
                account = %account.email,
                sender = %sender_email,
                error = %err,
                "request removed but sender write failed"
            );
            return Err(err.into());
        }

        self.notifier
            .notify(&sender.id, AcceptedEvent::new(account.email.clone()));
        info!(account = %account.email, sender = %sender_email, "chat request accepted");
        Ok(account.received)
    }

    pub async fn list_received(&self, current: &AccountId) -> RequestResult<RequestSet> {
        Ok(self.current(current).await?.received)
    }

    pub async fn list_accepted_sent_by_user(&self, current: &AccountId) -> RequestResult<RequestSet> {
        Ok(self.current(current).await?.accepted)
    }
}
