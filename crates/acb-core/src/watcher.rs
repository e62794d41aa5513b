use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    account::ClientHandle,
    config::ChannelFailurePolicy,
    domain::{AccountConfig, ChannelConfig, ChannelMessage, EntityRef, ServiceEvent},
    logging::ActivityLog,
    ports::Connection,
    utils::{normalize_username, preview},
    Result,
};

/// Characters of the incoming message quoted in the activity log.
pub const PREVIEW_CHARS: usize = 30;

/// Reacts to events delivered by a connection. Must never fail the delivery loop.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &ServiceEvent);
}

/// Replies with a fixed comment to every new text message in one channel.
pub struct ChannelHandler {
    channel: ChannelConfig,
    entity: EntityRef,
    connection: Arc<dyn Connection>,
    log: Arc<dyn ActivityLog>,
}

impl ChannelHandler {
    pub fn new(
        channel: ChannelConfig,
        entity: EntityRef,
        connection: Arc<dyn Connection>,
        log: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            channel,
            entity,
            connection,
            log,
        }
    }

    fn matches<'a>(&self, event: &'a ServiceEvent) -> Option<&'a ChannelMessage> {
        match event {
            ServiceEvent::NewChannelMessage(msg) if msg.channel == self.entity.id => Some(msg),
            _ => None,
        }
    }

    async fn on_message(&self, msg: &ChannelMessage) {
        if msg.outgoing {
            return;
        }
        let Some(text) = msg.text.as_deref().filter(|t| !t.is_empty()) else {
            return;
        };

        let username = &self.channel.username;
        self.log.info(&format!(
            "New message in channel {username}: {}...",
            preview(text, PREVIEW_CHARS)
        ));

        match self
            .connection
            .send_reply(&self.entity, msg.id, &self.channel.comment)
            .await
        {
            Ok(_) => self
                .log
                .info(&format!("Comment posted successfully in {username}")),
            Err(e) => self
                .log
                .error(&format!("Failed to post comment in {username}: {e}")),
        }
    }
}

#[async_trait]
impl EventHandler for ChannelHandler {
    async fn handle(&self, event: &ServiceEvent) {
        if let Some(msg) = self.matches(event) {
            self.on_message(msg).await;
        }
    }
}

/// Resolves an account's channels and registers one [`ChannelHandler`] each.
#[derive(Clone)]
pub struct ChannelWatcher {
    log: Arc<dyn ActivityLog>,
    on_failure: ChannelFailurePolicy,
}

impl ChannelWatcher {
    pub fn new(log: Arc<dyn ActivityLog>, on_failure: ChannelFailurePolicy) -> Self {
        Self { log, on_failure }
    }

    /// Returns the number of handlers registered for this account.
    pub async fn setup(&self, client: &mut ClientHandle, account: &AccountConfig) -> Result<usize> {
        let connection = client.connection();
        let mut active = 0;

        for channel in &account.channels {
            let entity = match connection
                .resolve_channel(normalize_username(&channel.username))
                .await
            {
                Ok(entity) => entity,
                Err(e) => match self.on_failure {
                    ChannelFailurePolicy::SkipChannel => {
                        self.log.error(&format!(
                            "Failed to resolve channel {}: {e}",
                            channel.username
                        ));
                        continue;
                    }
                    ChannelFailurePolicy::FailAccount => {
                        return Err(e.for_account(&account.phone));
                    }
                },
            };

            client.add_event_handler(Arc::new(ChannelHandler::new(
                channel.clone(),
                entity,
                connection.clone(),
                self.log.clone(),
            )));
            active += 1;

            self.log
                .info(&format!("Handler set up for {}", channel.username));
        }

        Ok(active)
    }
}
