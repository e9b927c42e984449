//! SMS bridge: waits for SMS, asks the webhook, replies or alerts the admin.

use std::sync::Arc;

use smshook::handler::inbound_channel;
use smshook::modem::{listen_console, ConsoleModem, SerializedModem};
use smshook::{logging, AppConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> smshook::Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging);
    config.validate()?;

    info!(
        port = %config.modem.port,
        baud_rate = config.modem.baud_rate,
        pin = config.modem.pin.is_some(),
        "initializing modem (console stand-in)"
    );
    let modem = Arc::new(SerializedModem::new(ConsoleModem::stdout()));
    let handler = smshook::receive_handler(&config, modem);
    info!(
        url = %config.webhook.url,
        timeout_ms = config.webhook.timeout_ms,
        admin = %config.notify.admin_number,
        "webhook configured"
    );

    let (tx, rx) = inbound_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        if let Err(e) = listen_console(stdin.lock(), tx) {
            error!("console input failed: {}", e);
        }
    });

    handler
        .run_until(rx, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    info!("smshook stopped");
    Ok(())
}
