//! Fakes for the ports, shared by the unit tests.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::{Credentials, EntityId, EntityRef, MessageId, ServiceEvent, SessionToken},
    errors::Error,
    logging::{ActivityLog, LogLevel},
    ports::{AuthPrompts, Connection, InputPrompt, MessagingService},
    Result,
};

pub(crate) const VALID_CODE: &str = "12345";

pub(crate) fn tmp_dir(prefix: &str) -> PathBuf {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_nanos();
    let pid = std::process::id();
    let dir = PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ============== Activity log ==============

#[derive(Default)]
pub(crate) struct MemoryLog {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLog {
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn count(&self, level: LogLevel, message: &str) -> usize {
        self.messages(level).iter().filter(|m| *m == message).count()
    }

    pub fn count_prefix(&self, level: LogLevel, prefix: &str) -> usize {
        self.messages(level)
            .iter()
            .filter(|m| m.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl ActivityLog for MemoryLog {
    fn log(&self, level: LogLevel, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

// ============== Interactive input ==============

pub(crate) struct ScriptedInput {
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInput {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl InputPrompt for ScriptedInput {
    async fn text(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Input("input closed".to_string()))
    }
}

// ============== Messaging service ==============

#[derive(Default)]
pub(crate) struct FakeConnectionBuilder {
    authorized: bool,
    password: Option<String>,
    channels: HashMap<String, i64>,
    failing_replies: HashSet<i32>,
    event_failures: usize,
}

impl FakeConnectionBuilder {
    pub fn authorized(mut self) -> Self {
        self.authorized = true;
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_channel(mut self, username: &str, id: i64) -> Self {
        self.channels.insert(username.to_string(), id);
        self
    }

    /// Replies to message `id` fail with a send error.
    pub fn fail_reply_to(mut self, id: i32) -> Self {
        self.failing_replies.insert(id);
        self
    }

    /// The first `n` polls of the update stream fail with a transient error.
    pub fn fail_next_events(mut self, n: usize) -> Self {
        self.event_failures = n;
        self
    }

    pub fn build(self) -> Arc<FakeConnection> {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = if self.authorized {
            b"authorized-token".to_vec()
        } else {
            Vec::new()
        };
        Arc::new(FakeConnection {
            authorized: Mutex::new(self.authorized),
            password: self.password,
            channels: self.channels,
            failing_replies: self.failing_replies,
            token: Mutex::new(SessionToken::new(token)),
            phones_given: Mutex::new(Vec::new()),
            sends: Mutex::new(Vec::new()),
            events_tx: Mutex::new(Some(tx)),
            events_rx: tokio::sync::Mutex::new(rx),
            event_failures: Mutex::new(self.event_failures),
            event_polls: Mutex::new(0),
        })
    }
}

pub(crate) struct FakeConnection {
    authorized: Mutex<bool>,
    password: Option<String>,
    channels: HashMap<String, i64>,
    failing_replies: HashSet<i32>,
    token: Mutex<SessionToken>,
    phones_given: Mutex<Vec<String>>,
    sends: Mutex<Vec<(EntityId, MessageId, String)>>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<ServiceEvent>>>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServiceEvent>>,
    event_failures: Mutex<usize>,
    event_polls: Mutex<usize>,
}

impl FakeConnection {
    pub fn builder() -> FakeConnectionBuilder {
        FakeConnectionBuilder::default()
    }

    pub fn sends(&self) -> Vec<(EntityId, MessageId, String)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn phones_given(&self) -> Vec<String> {
        self.phones_given.lock().unwrap().clone()
    }

    pub fn push_event(&self, event: ServiceEvent) {
        if let Some(tx) = self.events_tx.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn event_polls(&self) -> usize {
        *self.event_polls.lock().unwrap()
    }

    pub fn close_events(&self) {
        self.events_tx.lock().unwrap().take();
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn is_authorized(&self) -> Result<bool> {
        Ok(*self.authorized.lock().unwrap())
    }

    async fn sign_in(&self, prompts: &dyn AuthPrompts) -> Result<()> {
        let phone = prompts.phone_number().await?;
        self.phones_given.lock().unwrap().push(phone);

        if prompts.login_code().await? != VALID_CODE {
            return Err(Error::Auth("invalid code".to_string()));
        }
        if let Some(expected) = &self.password {
            if prompts.password(Some("pet")).await? != *expected {
                return Err(Error::Auth("invalid password".to_string()));
            }
        }

        *self.authorized.lock().unwrap() = true;
        *self.token.lock().unwrap() = SessionToken::new(b"authorized-token".to_vec());
        Ok(())
    }

    fn session_token(&self) -> SessionToken {
        self.token.lock().unwrap().clone()
    }

    async fn resolve_channel(&self, username: &str) -> Result<EntityRef> {
        match self.channels.get(username) {
            Some(id) => Ok(EntityRef {
                id: EntityId(*id),
                username: username.to_string(),
            }),
            None => Err(Error::Resolve {
                channel: username.to_string(),
                reason: "no such username".to_string(),
            }),
        }
    }

    async fn send_reply(
        &self,
        channel: &EntityRef,
        reply_to: MessageId,
        text: &str,
    ) -> Result<MessageId> {
        if self.failing_replies.contains(&reply_to.0) {
            return Err(Error::Send("CHAT_WRITE_FORBIDDEN".to_string()));
        }
        let mut sends = self.sends.lock().unwrap();
        sends.push((channel.id, reply_to, text.to_string()));
        Ok(MessageId(1000 + sends.len() as i32))
    }

    async fn next_event(&self) -> Result<Option<ServiceEvent>> {
        *self.event_polls.lock().unwrap() += 1;
        {
            let mut failures = self.event_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Connect("transient read error".to_string()));
            }
        }
        Ok(self.events_rx.lock().await.recv().await)
    }
}

struct FakeAccount {
    connection: Arc<FakeConnection>,
    failures_left: u32,
    attempts: u32,
    tokens_seen: Vec<SessionToken>,
}

#[derive(Default)]
pub(crate) struct FakeService {
    accounts: Mutex<HashMap<String, FakeAccount>>,
}

impl FakeService {
    /// Register `phone`; its first `connect_failures` attempts fail.
    pub fn add(&self, phone: &str, connection: Arc<FakeConnection>, connect_failures: u32) {
        self.accounts.lock().unwrap().insert(
            phone.to_string(),
            FakeAccount {
                connection,
                failures_left: connect_failures,
                attempts: 0,
                tokens_seen: Vec::new(),
            },
        );
    }

    pub fn attempts(&self, phone: &str) -> u32 {
        self.accounts
            .lock()
            .unwrap()
            .get(phone)
            .map(|a| a.attempts)
            .unwrap_or(0)
    }

    /// Tokens passed to successful connects.
    pub fn tokens_seen(&self, phone: &str) -> Vec<SessionToken> {
        self.accounts
            .lock()
            .unwrap()
            .get(phone)
            .map(|a| a.tokens_seen.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessagingService for FakeService {
    async fn connect(
        &self,
        credentials: &Credentials,
        token: SessionToken,
    ) -> Result<Arc<dyn Connection>> {
        let mut accounts = self.accounts.lock().unwrap();
        let Some(acc) = accounts.get_mut(&credentials.phone) else {
            return Err(Error::Connect(format!(
                "unknown account {}",
                credentials.phone
            )));
        };
        acc.attempts += 1;
        if acc.failures_left > 0 {
            acc.failures_left -= 1;
            return Err(Error::Connect("network unreachable".to_string()));
        }
        acc.tokens_seen.push(token);
        let connection: Arc<dyn Connection> = acc.connection.clone();
        Ok(connection)
    }
}
