//! # smshook
//!
//! Bridges a GSM modem to an HTTP decision webhook.
//!
//! ## Features
//!
//! - **Webhook forwarding**: every received SMS is posted as
//!   `{"number", "time", "message"}` with a hard timeout
//! - **Replies**: a non-empty 2xx answer goes back to the sender, cut to 100 characters
//! - **Admin alerts**: connection errors, timeouts, non-2xx statuses and anything
//!   unexpected reach a fixed administrator number as a short label, with the
//!   full diagnostic in the log
//! - **Decision endpoint**: the sample `POST /sms` webhook, served with axum
//! - **Configuration**: layered files plus `SMSHOOK__*` environment variables
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use smshook::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> smshook::Result<()> {
//!     let config = AppConfig::load()?;
//!     config.validate()?;
//!
//!     let modem = Arc::new(SerializedModem::new(ConsoleModem::stdout()));
//!     let handler = smshook::receive_handler(&config, modem);
//!     let (tx, rx) = inbound_channel();
//!     // hand `tx` to the modem collaborator, then:
//!     handler.run(rx).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod logging;
pub mod modem;

pub use crate::config::*;
pub use error::{Error, Result};

use std::future::Future;
use std::sync::Arc;

use dispatch::NotificationDispatcher;
use handler::ReceiveHandler;
use hook_core::Modem;
use hook_web_axum::AppState;
use hook_webhook::WebhookClient;
use tokio::net::TcpListener;

/// Wire the webhook client and dispatcher from `config` around `modem`.
pub fn receive_handler(config: &AppConfig, modem: Arc<dyn Modem>) -> ReceiveHandler {
    let webhook = WebhookClient::new(config.webhook.url.clone(), config.webhook.timeout());
    ReceiveHandler::new(
        Arc::new(webhook),
        NotificationDispatcher::from_config(&config.notify),
        modem,
    )
}

/// Serve the decision endpoint on `listener` until `shutdown` resolves.
pub async fn serve_decisions<F>(listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = hook_web_axum::router(AppState::default());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Common imports for smshook usage
pub mod prelude {
    pub use crate::config::{
        AppConfig, LoggingConfig, ModemConfig, NotifyConfig, ServerConfig, WebhookConfig,
    };
    pub use crate::dispatch::NotificationDispatcher;
    pub use crate::handler::{inbound_channel, ReceiveHandler};
    pub use crate::modem::{ConsoleModem, SerializedModem};
    pub use hook_core::*;
    pub use hook_webhook::WebhookClient;
}
