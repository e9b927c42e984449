//! The receive → webhook → reply/alert pipeline.

use crate::dispatch::NotificationDispatcher;
use hook_core::{Channel, InboundMessage, Modem, OutboundNotification, Webhook, WebhookOutcome};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn, Instrument};

/// Inbound messages wait here one at a time.
pub const INBOUND_CAPACITY: usize = 1;

/// Single-consumer channel between the modem collaborator and the handler.
pub fn inbound_channel() -> (mpsc::Sender<InboundMessage>, mpsc::Receiver<InboundMessage>) {
    mpsc::channel(INBOUND_CAPACITY)
}

/// Runs the pipeline for each received SMS.
#[derive(Clone)]
pub struct ReceiveHandler {
    webhook: Arc<dyn Webhook>,
    dispatcher: NotificationDispatcher,
    modem: Arc<dyn Modem>,
}

impl ReceiveHandler {
    pub fn new(
        webhook: Arc<dyn Webhook>,
        dispatcher: NotificationDispatcher,
        modem: Arc<dyn Modem>,
    ) -> Self {
        Self {
            webhook,
            dispatcher,
            modem,
        }
    }

    /// Process messages in arrival order until every sender is dropped.
    pub async fn run(&self, inbound: mpsc::Receiver<InboundMessage>) {
        self.run_until(inbound, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but also stops once `shutdown` resolves.
    /// A message already being handled is always finished first.
    pub async fn run_until<F>(&self, mut inbound: mpsc::Receiver<InboundMessage>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("waiting for SMS");
        loop {
            let message = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested, receive loop stopping");
                    return;
                }
                message = inbound.recv() => message,
            };
            match message {
                Some(message) => self.handle(message).await,
                None => break,
            }
        }
        info!("inbound channel closed");
    }

    /// Handle one SMS. Never fails: webhook faults become admin alerts and
    /// modem faults are logged.
    pub async fn handle(&self, message: InboundMessage) {
        let span = info_span!("sms", id = %message.id);
        self.handle_inner(message).instrument(span).await
    }

    async fn handle_inner(&self, message: InboundMessage) {
        info!(
            from = %message.sender,
            at = %message.received_at,
            text = %message.text,
            "SMS received"
        );

        info!("calling webhook");
        let outcome = self.webhook.call(&message).await;
        if let WebhookOutcome::Success { body } = &outcome {
            if body.is_empty() {
                info!("webhook answered with an empty body, no reply sent");
            }
        }

        for notification in self.dispatcher.dispatch(&message.sender, &outcome) {
            self.transmit(&message, &notification).await;
        }
    }

    async fn transmit(&self, message: &InboundMessage, notification: &OutboundNotification) {
        let result = match notification.channel {
            Channel::Reply => {
                info!(text = %notification.text, "replying to SMS");
                self.modem.reply(message, &notification.text).await
            }
            Channel::Admin => {
                warn!(
                    to = %notification.recipient,
                    text = %notification.text,
                    "notifying administrator"
                );
                self.modem.send(notification.as_send_request()).await
            }
        };
        match (result, notification.channel) {
            (Ok(()), Channel::Reply) => info!("reply sent"),
            (Ok(()), Channel::Admin) => info!("notification sent"),
            (Err(e), channel) => error!(
                ?channel,
                to = %notification.recipient,
                "sending SMS failed: {}",
                e
            ),
        }
    }
}
