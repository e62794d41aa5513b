use std::fmt;

use serde::{Deserialize, Serialize};

/// One set of login credentials plus the channels it watches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub phone: String,
    pub api_id: i32,
    pub api_hash: String,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl AccountConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            phone: self.phone.clone(),
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
        }
    }
}

/// A watched channel and the reply posted under each of its new messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub username: String,
    pub comment: String,
}

/// What the messaging service needs to open a connection for one account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub phone: String,
    pub api_id: i32,
    pub api_hash: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("phone", &self.phone)
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .finish()
    }
}

/// Opaque serialized authentication state for one account.
///
/// Produced and consumed only by the messaging adapter; the core just moves
/// the bytes between the adapter and the session file.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionToken(Vec<u8>);

impl SessionToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({} bytes)", self.0.len())
    }
}

/// Service-side identifier of a chat/channel (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityId(pub i64);

/// Message id within a channel (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A resolved channel. Compared by `id` only.
#[derive(Clone, Debug)]
pub struct EntityRef {
    pub id: EntityId,
    /// Username it was resolved from (normalized).
    pub username: String,
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityRef {}

/// A message that arrived in a channel (broadcast or supergroup).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelMessage {
    pub channel: EntityId,
    pub id: MessageId,
    pub text: Option<String>,
    /// Sent by the account that received it.
    pub outgoing: bool,
}

/// Inbound event delivered by a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceEvent {
    NewChannelMessage(ChannelMessage),
    /// Anything the bot does not react to.
    Other,
}
