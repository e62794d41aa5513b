//! Telegram adapter (grammers, MTProto user client).
//!
//! This crate implements the `acb-core` messaging ports for user accounts.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use grammers_client::{
    types::{Chat, PackedChat, PasswordToken},
    Client, Config, FixedReconnect, InitParams, InputMessage, InvocationError, SignInError,
    Update,
};
use grammers_session::Session;
use tokio::{sync::Mutex, time::sleep};

use acb_core::{
    domain::{
        ChannelMessage, Credentials, EntityId, EntityRef, MessageId, ServiceEvent, SessionToken,
    },
    errors::Error,
    ports::{AuthPrompts, Connection, MessagingService},
    Result,
};

/// Login codes accepted before giving up on an account.
const MAX_CODE_ATTEMPTS: usize = 3;
/// Longest FLOOD_WAIT we sit out before failing a send.
const MAX_FLOOD_WAIT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy)]
pub struct TelegramService {
    /// Reconnects the sender attempts when an established connection drops.
    reconnection: &'static FixedReconnect,
}

impl TelegramService {
    pub fn new(reconnect_attempts: u32, reconnect_delay: Duration) -> Self {
        // The sender keeps a `'static` policy; one service lives per process.
        let reconnection = Box::leak(Box::new(FixedReconnect {
            attempts: reconnect_attempts as usize,
            delay: reconnect_delay,
        }));
        Self { reconnection }
    }
}

#[async_trait]
impl MessagingService for TelegramService {
    async fn connect(
        &self,
        credentials: &Credentials,
        token: SessionToken,
    ) -> Result<Arc<dyn Connection>> {
        let client = Client::connect(Config {
            session: load_session(&token),
            api_id: credentials.api_id,
            api_hash: credentials.api_hash.clone(),
            params: InitParams {
                reconnection_policy: self.reconnection,
                ..InitParams::default()
            },
        })
        .await
        .map_err(|e| Error::Connect(e.to_string()))?;

        tracing::debug!(account = %credentials.phone, "connected to telegram");
        Ok(Arc::new(TelegramConnection::new(client)))
    }
}

/// Unusable tokens start a fresh session (and therefore a new login).
fn load_session(token: &SessionToken) -> Session {
    if token.is_empty() {
        return Session::new();
    }
    match Session::load(token.as_bytes()) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = ?e, "stored session is unreadable; starting a new one");
            Session::new()
        }
    }
}

pub struct TelegramConnection {
    client: Client,
    /// Resolved channels by id; sending needs the access hash.
    chats: Mutex<HashMap<i64, PackedChat>>,
}

impl TelegramConnection {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            chats: Mutex::new(HashMap::new()),
        }
    }

    async fn with_flood_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: Future<Output = std::result::Result<T, InvocationError>>,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match flood_wait(&e) {
                    Some(wait) if attempts < MAX_RETRIES && wait <= MAX_FLOOD_WAIT => {
                        attempts += 1;
                        tracing::warn!(wait_secs = wait.as_secs(), "flood wait; retrying send");
                        sleep(wait).await;
                        continue;
                    }
                    _ => return Err(Error::Send(e.to_string())),
                },
            }
        }
    }
}

fn flood_wait(e: &InvocationError) -> Option<Duration> {
    match e {
        InvocationError::Rpc(rpc) if rpc.name == "FLOOD_WAIT" => {
            rpc.value.map(|secs| Duration::from_secs(u64::from(secs)))
        }
        _ => None,
    }
}

#[async_trait]
impl Connection for TelegramConnection {
    async fn is_authorized(&self) -> Result<bool> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| Error::Connect(e.to_string()))
    }

    async fn sign_in(&self, prompts: &dyn AuthPrompts) -> Result<()> {
        let phone = prompts.phone_number().await?;
        let login_token = self
            .client
            .request_login_code(&phone)
            .await
            .map_err(|e| Error::Auth(format!("requesting login code: {e}")))?;

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let code = prompts.login_code().await?;
            let reply = CodeReply::from(self.client.sign_in(&login_token, &code).await);
            match code_step(reply, attempt, &phone) {
                CodeStep::SignedIn => return Ok(()),
                CodeStep::Retry => {
                    tracing::warn!(account = %phone, attempt, "login code rejected");
                }
                CodeStep::Password(password_token) => {
                    // The token is consumed by the check, so the password gets one try.
                    let hint = password_token.hint().map(|h| h.to_string());
                    let password = prompts.password(hint.as_deref()).await?;
                    return self
                        .client
                        .check_password(password_token, password)
                        .await
                        .map(|_| ())
                        .map_err(|e| Error::Auth(format!("password rejected: {e}")));
                }
                CodeStep::Fail(e) => return Err(e),
            }
        }
    }

    fn session_token(&self) -> SessionToken {
        SessionToken::new(self.client.session().save())
    }

    async fn resolve_channel(&self, username: &str) -> Result<EntityRef> {
        let resolve_err = |reason: String| Error::Resolve {
            channel: username.to_string(),
            reason,
        };

        let chat = self
            .client
            .resolve_username(username)
            .await
            .map_err(|e| resolve_err(e.to_string()))?
            .ok_or_else(|| resolve_err("username not found".to_string()))?;

        if let Chat::User(_) = chat {
            return Err(resolve_err("is a user, not a channel".to_string()));
        }

        let id = chat.id();
        self.chats.lock().await.insert(id, chat.pack());
        Ok(EntityRef {
            id: EntityId(id),
            username: username.to_string(),
        })
    }

    async fn send_reply(
        &self,
        channel: &EntityRef,
        reply_to: MessageId,
        text: &str,
    ) -> Result<MessageId> {
        let packed = self
            .chats
            .lock()
            .await
            .get(&channel.id.0)
            .cloned()
            .ok_or_else(|| Error::Send(format!("channel {} is not resolved", channel.username)))?;

        let sent = self
            .with_flood_retry(|| {
                self.client.send_message(
                    packed.clone(),
                    InputMessage::text(text).reply_to(Some(reply_to.0)),
                )
            })
            .await?;
        Ok(MessageId(sent.id()))
    }

    async fn next_event(&self) -> Result<Option<ServiceEvent>> {
        let update = self
            .client
            .next_update()
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;
        Ok(Some(classify(&update)))
    }
}

/// The service's answer to a login code.
#[derive(Debug)]
enum CodeReply<P> {
    Accepted,
    InvalidCode,
    PasswordRequired(P),
    SignUpRequired,
    Failed(String),
}

impl<T> From<std::result::Result<T, SignInError>> for CodeReply<PasswordToken> {
    fn from(result: std::result::Result<T, SignInError>) -> Self {
        match result {
            Ok(_) => Self::Accepted,
            Err(SignInError::InvalidCode) => Self::InvalidCode,
            Err(SignInError::PasswordRequired(token)) => Self::PasswordRequired(token),
            Err(SignInError::SignUpRequired { .. }) => Self::SignUpRequired,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

#[derive(Debug)]
enum CodeStep<P> {
    SignedIn,
    Retry,
    Password(P),
    Fail(Error),
}

/// Next login step after the `attempt`-th code (1-based).
fn code_step<P>(reply: CodeReply<P>, attempt: usize, phone: &str) -> CodeStep<P> {
    match reply {
        CodeReply::Accepted => CodeStep::SignedIn,
        CodeReply::InvalidCode if attempt < MAX_CODE_ATTEMPTS => CodeStep::Retry,
        CodeReply::InvalidCode => CodeStep::Fail(Error::Auth(format!(
            "login code rejected {attempt} times"
        ))),
        CodeReply::PasswordRequired(token) => CodeStep::Password(token),
        CodeReply::SignUpRequired => CodeStep::Fail(Error::Auth(format!(
            "{phone} has no Telegram account; sign up with an official app first"
        ))),
        CodeReply::Failed(reason) => CodeStep::Fail(Error::Auth(reason)),
    }
}

/// Channel and supergroup messages are the only updates watchers see.
fn classify(update: &Update) -> ServiceEvent {
    let Update::NewMessage(message) = update else {
        return ServiceEvent::Other;
    };
    let chat = message.chat();
    if let Chat::User(_) = chat {
        return ServiceEvent::Other;
    }
    ServiceEvent::NewChannelMessage(ChannelMessage {
        channel: EntityId(chat.id()),
        id: MessageId(message.id()),
        text: Some(message.text().to_string()).filter(|t| !t.is_empty()),
        outgoing: message.outgoing(),
    })
}
