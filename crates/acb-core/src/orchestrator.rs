use std::{sync::Arc, time::Duration};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    account::{AccountClient, ClientHandle, RetryPolicy, StreamBackoff},
    config::Config,
    domain::AccountConfig,
    logging::ActivityLog,
    ports::{InputPrompt, MessagingService},
    session::SessionStore,
    watcher::ChannelWatcher,
    Result,
};

/// How a [`Orchestrator::run`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every account failed; nothing to serve.
    NoClients,
    /// Shutdown was requested before all accounts were initialized.
    Interrupted,
    /// Served `clients` accounts until shutdown was requested.
    Stopped { clients: usize },
}

/// Drives every configured account through initialize + watcher setup, then
/// keeps their update streams flowing until shutdown.
pub struct Orchestrator {
    accounts: AccountClient,
    watcher: ChannelWatcher,
    log: Arc<dyn ActivityLog>,
    stream_backoff: StreamBackoff,
}

impl Orchestrator {
    pub fn new(accounts: AccountClient, watcher: ChannelWatcher, log: Arc<dyn ActivityLog>) -> Self {
        Self {
            accounts,
            watcher,
            log,
            stream_backoff: StreamBackoff::default(),
        }
    }

    pub fn with_stream_backoff(mut self, backoff: StreamBackoff) -> Self {
        self.stream_backoff = backoff;
        self
    }

    /// Wire the production components from a loaded [`Config`].
    pub fn from_config(
        cfg: &Config,
        service: Arc<dyn MessagingService>,
        input: Arc<dyn InputPrompt>,
        log: Arc<dyn ActivityLog>,
    ) -> Self {
        let retry = RetryPolicy {
            attempts: cfg.connect_retries,
            delay: cfg.connect_retry_delay,
        };
        let accounts = AccountClient::new(
            service,
            input,
            SessionStore::new(&cfg.session_dir),
            log.clone(),
            retry,
        );
        let watcher = ChannelWatcher::new(log.clone(), cfg.channel_failure);
        let stream_backoff = StreamBackoff {
            initial: cfg.connect_retry_delay.max(Duration::from_millis(100)),
            ..StreamBackoff::default()
        };
        Self::new(accounts, watcher, log).with_stream_backoff(stream_backoff)
    }

    async fn start_account(&self, account: &AccountConfig) -> Result<ClientHandle> {
        let mut client = self.accounts.initialize(account).await?;
        self.watcher.setup(&mut client, account).await?;
        Ok(client)
    }

    /// Initialize accounts one at a time, in configuration order. A failed
    /// account is logged and skipped.
    pub async fn initialize_all(&self, accounts: &[AccountConfig]) -> Vec<ClientHandle> {
        let mut clients = Vec::with_capacity(accounts.len());
        for account in accounts {
            match self.start_account(account).await {
                Ok(client) => clients.push(client),
                Err(e) => self.log.error(&format!(
                    "Failed to initialize client for {}: {e}",
                    account.phone
                )),
            }
        }
        clients
    }

    pub async fn run(&self, accounts: &[AccountConfig], shutdown: CancellationToken) -> RunOutcome {
        let clients = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return RunOutcome::Interrupted,
            clients = self.initialize_all(accounts) => clients,
        };

        if clients.is_empty() {
            self.log.error("No clients were initialized successfully");
            return RunOutcome::NoClients;
        }

        let count = clients.len();
        self.log
            .info(&format!("Bot is running with {count} clients"));
        println!("Bot is running with {count} clients. Press Ctrl+C to stop.");

        let mut pumps = JoinSet::new();
        for client in clients {
            let shutdown = shutdown.clone();
            let log = self.log.clone();
            let backoff = self.stream_backoff;
            pumps.spawn(async move {
                client.run_until(&shutdown, log.as_ref(), backoff).await;
                if !shutdown.is_cancelled() {
                    log.error(&format!(
                        "Update stream for {} stopped: connection closed",
                        client.account()
                    ));
                }
            });
        }

        shutdown.cancelled().await;
        pumps.shutdown().await;

        RunOutcome::Stopped { clients: count }
    }
}
