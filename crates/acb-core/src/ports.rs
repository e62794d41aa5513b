use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::{Credentials, EntityRef, MessageId, ServiceEvent, SessionToken},
    Result,
};

/// Hexagonal port for the messaging service.
///
/// The wire protocol, encryption and RPC encoding live entirely in the adapter.
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Open one connection (a single attempt; retries are the caller's policy).
    ///
    /// An empty or unusable `token` starts a fresh, unauthorized session.
    async fn connect(
        &self,
        credentials: &Credentials,
        token: SessionToken,
    ) -> Result<Arc<dyn Connection>>;
}

/// One live connection for one account.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn is_authorized(&self) -> Result<bool>;

    /// Run the login challenge. The adapter decides which prompts to call and
    /// how often (e.g. re-asking for a rejected code).
    async fn sign_in(&self, prompts: &dyn AuthPrompts) -> Result<()>;

    /// Current serialized session state.
    fn session_token(&self) -> SessionToken;

    async fn resolve_channel(&self, username: &str) -> Result<EntityRef>;

    /// Post `text` into `channel` as a reply to `reply_to`.
    async fn send_reply(
        &self,
        channel: &EntityRef,
        reply_to: MessageId,
        text: &str,
    ) -> Result<MessageId>;

    /// Next inbound event; `None` once the stream is closed.
    async fn next_event(&self) -> Result<Option<ServiceEvent>>;
}

/// Answers the login challenge on behalf of one account.
#[async_trait]
pub trait AuthPrompts: Send + Sync {
    async fn phone_number(&self) -> Result<String>;
    async fn login_code(&self) -> Result<String>;
    async fn password(&self, hint: Option<&str>) -> Result<String>;
}

/// Interactive input collaborator (terminal or equivalent).
#[async_trait]
pub trait InputPrompt: Send + Sync {
    /// Show `prompt` and block until one line of input is available.
    async fn text(&self, prompt: &str) -> Result<String>;
}
