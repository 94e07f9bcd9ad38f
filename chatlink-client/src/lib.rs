use chatlink_common::{AcceptedEvent, ACCEPTED_EVENT};
use reqwest::{Response, StatusCode};
use thiserror::Error;

pub mod client {
    use reqwest::Client;
    use chatlink_common::{AcceptChatRequest, AcceptedChatRequest, Account, AccountId, NewAccount, RequestSet, SendChatRequest, Url};
    use anyhow::Result;
    use crate::{check, EventStream};

    pub async fn add_account(client: &Client, server: &Url, name: impl Into<String>, email: impl Into<String>) -> Result<Account> {
        let new_account = NewAccount { name: name.into(), email: email.into() };
        Ok(check(client.post(server.join("/add-account").0)
            .json(&new_account)
            .send()
            .await?)
            .await?
            .json::<_>()
            .await?)
    }
    pub async fn get_profile(client: &Client, server: &Url, account: &AccountId) -> Result<Account> {
        Ok(check(client.get(server.account(account).join("/private/get/profile").0)
            .send()
            .await?)
            .await?
            .json::<_>()
            .await?)
    }
    pub async fn send_chat_request(client: &Client, server: &Url, account: &AccountId, recipient_email: impl Into<String>) -> Result<()> {
        let request = SendChatRequest { recipient_email: recipient_email.into() };
        check(client.post(server.account(account).join("/private/post/send-chat-request").0)
            .json(&request)
            .send()
            .await?)
            .await?;
        Ok(())
    }
    /// Returns the account's remaining received requests.
    pub async fn accept_chat_request(client: &Client, server: &Url, account: &AccountId, sender_email: impl Into<String>) -> Result<RequestSet> {
        let request = AcceptChatRequest { sender_email: sender_email.into() };
        let accepted: AcceptedChatRequest = check(client
            .post(server.account(account).join("/private/post/accept-chat-request").0)
            .json(&request)
            .send()
            .await?)
            .await?
            .json()
            .await?;
        Ok(accepted.received_chat_requests)
    }
    pub async fn received_chat_requests(client: &Client, server: &Url, account: &AccountId) -> Result<RequestSet> {
        Ok(check(client.get(server.account(account).join("/private/get/received-chat-requests").0)
            .send()
            .await?)
            .await?
            .json::<_>()
            .await?)
    }
    pub async fn accepted_chat_requests(client: &Client, server: &Url, account: &AccountId) -> Result<RequestSet> {
        Ok(check(client.get(server.account(account).join("/private/get/accepted-chat-requests").0)
            .send()
            .await?)
            .await?
            .json::<_>()
            .await?)
    }
    /// Opens the account's live event channel. The server has joined the
    /// channel by the time this returns.
    pub async fn subscribe_events(client: &Client, server: &Url, account: &AccountId) -> Result<EventStream> {
        let response = check(client.get(server.account(account).join("/private/get/events").0)
            .send()
            .await?)
            .await?;
        Ok(EventStream::new(response))
    }
}

/// A non-2xx answer from the server.
#[derive(Error, Debug)]
#[error("server answered {status}: {message}")]
pub struct ServerError {
    pub status: StatusCode,
    pub message: String,
}

async fn check(response: Response) -> anyhow::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ServerError { status, message }.into())
}

/// Reads `chat_request_accepted` events off a server-sent event stream.
#[derive(Debug)]
pub struct EventStream {
    response: Response,
    buffer: Vec<u8>,
}

impl EventStream {
    fn new(response: Response) -> Self {
        Self { response, buffer: Vec::new() }
    }

    /// `None` once the server closes the stream. Keep-alives and unknown
    /// events are skipped.
    pub async fn next_event(&mut self) -> anyhow::Result<Option<AcceptedEvent>> {
        loop {
            while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
                let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
                if let Some(event) = parse_frame(&String::from_utf8_lossy(&frame))? {
                    return Ok(Some(event));
                }
            }
            match self.response.chunk().await? {
                Some(bytes) => self.buffer.extend_from_slice(&bytes),
                None => return Ok(None),
            }
        }
    }
}

// A field value loses exactly one leading space; `data` lines join with '\n'.
fn parse_frame(frame: &str) -> anyhow::Result<Option<AcceptedEvent>> {
    let mut name = None;
    let mut data: Option<String> = None;
    for line in frame.lines() {
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => name = Some(value),
            "data" => match data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }
    match (name, data) {
        (Some(ACCEPTED_EVENT), Some(data)) => Ok(Some(serde_json::from_str(&data)?)),
        _ => Ok(None),
    }
}
