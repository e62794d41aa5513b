use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{AccountConfig, Credentials, ServiceEvent, SessionToken},
    errors::Error,
    logging::ActivityLog,
    ports::{AuthPrompts, Connection, InputPrompt, MessagingService},
    session::SessionStore,
    watcher::EventHandler,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connection attempts (at least one is always made).
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// A connected, authenticated account plus the watchers registered on it.
pub struct ClientHandle {
    account: String,
    connection: Arc<dyn Connection>,
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl ClientHandle {
    pub fn new(account: impl Into<String>, connection: Arc<dyn Connection>) -> Self {
        Self {
            account: account.into(),
            connection,
            handlers: Vec::new(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn connection(&self) -> Arc<dyn Connection> {
        self.connection.clone()
    }

    pub fn add_event_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Hand one event to every handler, in registration order.
    pub async fn dispatch(&self, event: &ServiceEvent) {
        for handler in &self.handlers {
            handler.handle(event).await;
        }
    }

    /// Pump the connection's events into the handlers until `shutdown` fires
    /// or the stream ends. Stream errors are logged and polling resumes after
    /// a backoff.
    pub async fn run_until(
        &self,
        shutdown: &CancellationToken,
        log: &dyn ActivityLog,
        backoff: StreamBackoff,
    ) {
        let mut delay = backoff.initial;
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                next = self.connection.next_event() => next,
            };
            match next {
                Ok(Some(event)) => {
                    delay = backoff.initial;
                    self.dispatch(&event).await;
                }
                Ok(None) => return,
                Err(e) => {
                    log.error(&format!(
                        "Update stream for {} failed: {e}; retrying in {}ms",
                        self.account,
                        delay.as_millis()
                    ));
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = backoff.next(delay);
                }
            }
        }
    }
}

/// Wait between polls of a failing update stream: doubles per consecutive
/// failure up to `max`, back to `initial` after the next event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamBackoff {
    pub initial: Duration,
    pub max: Duration,
}

impl StreamBackoff {
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

impl Default for StreamBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

/// Brings one account online: stored session, connect with retries,
/// interactive login if needed, session persisted.
#[derive(Clone)]
pub struct AccountClient {
    service: Arc<dyn MessagingService>,
    input: Arc<dyn InputPrompt>,
    store: SessionStore,
    log: Arc<dyn ActivityLog>,
    retry: RetryPolicy,
}

impl AccountClient {
    pub fn new(
        service: Arc<dyn MessagingService>,
        input: Arc<dyn InputPrompt>,
        store: SessionStore,
        log: Arc<dyn ActivityLog>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            input,
            store,
            log,
            retry,
        }
    }

    /// Errors come back as [`Error::Initialization`] carrying the phone.
    pub async fn initialize(&self, account: &AccountConfig) -> Result<ClientHandle> {
        self.try_initialize(account)
            .await
            .map_err(|e| e.for_account(&account.phone))
    }

    async fn try_initialize(&self, account: &AccountConfig) -> Result<ClientHandle> {
        let token = self.store.load(&account.phone).await;
        let connection = self
            .connect_with_retry(&account.credentials(), token)
            .await?;

        if !connection.is_authorized().await? {
            tracing::info!(account = %account.phone, "no valid session; starting interactive login");
            let prompts = AccountPrompts::new(&account.phone, self.input.clone());
            connection.sign_in(&prompts).await?;
        }

        self.store
            .save(&account.phone, &connection.session_token())
            .await?;

        self.log.info(&format!(
            "Client for {} is now connected and ready",
            account.phone
        ));

        Ok(ClientHandle::new(account.phone.clone(), connection))
    }

    async fn connect_with_retry(
        &self,
        credentials: &Credentials,
        token: SessionToken,
    ) -> Result<Arc<dyn Connection>> {
        let attempts = self.retry.attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match self.service.connect(credentials, token.clone()).await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    tracing::warn!(
                        account = %credentials.phone,
                        attempt,
                        attempts,
                        error = %e,
                        "connect attempt failed"
                    );
                    last_err = Some(e);
                    if attempt < attempts && !self.retry.delay.is_zero() {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Connect("no connection attempt made".to_string())))
    }
}

/// Login answers for one account: the phone comes from config, the code and
/// password from the interactive input.
pub struct AccountPrompts {
    phone: String,
    input: Arc<dyn InputPrompt>,
}

impl AccountPrompts {
    pub fn new(phone: &str, input: Arc<dyn InputPrompt>) -> Self {
        Self {
            phone: phone.to_string(),
            input,
        }
    }
}

#[async_trait]
impl AuthPrompts for AccountPrompts {
    async fn phone_number(&self) -> Result<String> {
        Ok(self.phone.clone())
    }

    async fn login_code(&self) -> Result<String> {
        let prompt = format!("[{}] Please enter the code you received: ", self.phone);
        Ok(self.input.text(&prompt).await?.trim().to_string())
    }

    async fn password(&self, hint: Option<&str>) -> Result<String> {
        let prompt = match hint.filter(|h| !h.is_empty()) {
            Some(h) => format!("[{}] Please enter your password (hint: {h}): ", self.phone),
            None => format!("[{}] Please enter your password: ", self.phone),
        };
        // Passwords may legitimately contain surrounding spaces; only drop the line ending.
        Ok(self
            .input
            .text(&prompt)
            .await?
            .trim_end_matches(['\r', '\n'])
            .to_string())
    }
}
