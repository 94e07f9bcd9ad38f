pub mod non_api_structs;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use non_api_structs::{Account, RequestSet};

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct Url(pub String);

impl Url {
    /// Base of the per-account routes, e.g. `http://host:8000/<id>`.
    pub fn account(&self, id: &AccountId) -> Url {
        Url(self.0.trim_end_matches('/').to_string() + "/" + &id.0)
    }
    pub fn join(&self, path: impl AsRef<str>) -> Url {
        Url(self.0.trim_end_matches('/').to_string() + path.as_ref())
    }
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized email address: trimmed and lower-cased, never empty.
///
/// Emails are the relationship key between accounts, so every comparison
/// and every stored set entry goes through [`Email::normalize`].
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Email(pub String);

impl Email {
    pub fn normalize(raw: impl AsRef<str>) -> Option<Self> {
        let email = raw.as_ref().trim().to_lowercase();
        if email.is_empty() {
            return None;
        }
        Some(Self(email))
    }

    /// Registration input. The `local@domain.tld` shape is checked on the
    /// address as typed, so padded input is rejected rather than trimmed.
    pub fn parse_registration(raw: &str) -> Option<Self> {
        if !email_shape().is_match(raw) {
            return None;
        }
        Self::normalize(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn email_shape() -> &'static Regex {
    static EMAIL_SHAPE: OnceLock<Regex> = OnceLock::new();
    EMAIL_SHAPE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SSE event name used for [`AcceptedEvent`] pushes.
pub const ACCEPTED_EVENT: &str = "chat_request_accepted";

/// Pushed to the original sender when their chat request is accepted.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct AcceptedEvent {
    pub from: Email,
    pub message: String,
}

impl AcceptedEvent {
    pub fn new(from: Email) -> Self {
        let message = format!("{from} accepted your chat request");
        Self { from, message }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct SendChatRequest {
    pub recipient_email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct AcceptChatRequest {
    pub sender_email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct Ack {
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct AcceptedChatRequest {
    pub message: String,
    pub received_chat_requests: RequestSet,
}
