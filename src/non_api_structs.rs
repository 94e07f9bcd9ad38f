use serde::{Deserialize, Serialize};
use crate::{AccountId, Email};

/// Ordered sequence of emails with set semantics.
///
/// Insertion order is kept so listings come back in the order requests
/// arrived, but an email is never stored twice.
#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(transparent)]
pub struct RequestSet(Vec<Email>);

impl RequestSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn contains(&self, email: &Email) -> bool {
        self.0.contains(email)
    }
    /// Returns `false` if the email was already present.
    pub fn insert(&mut self, email: Email) -> bool {
        if self.contains(&email) {
            return false;
        }
        self.0.push(email);
        true
    }
    /// Returns `true` if anything was removed.
    pub fn remove(&mut self, email: &Email) -> bool {
        let before = self.0.len();
        self.0.retain(|e| e != email);
        self.0.len() != before
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Email> {
        self.0.iter()
    }
}

impl FromIterator<Email> for RequestSet {
    fn from_iter<I: IntoIterator<Item = Email>>(iter: I) -> Self {
        let mut set = RequestSet::new();
        for email in iter {
            set.insert(email);
        }
        set
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub sent: RequestSet,
    #[serde(default)]
    pub received: RequestSet,
    #[serde(default)]
    pub accepted: RequestSet,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>, email: Email) -> Self {
        Self {
            id,
            name: name.into().trim().to_string(),
            email,
            ..Default::default()
        }
    }
}
