//! Sample decision endpoint: `POST /sms`.

use smshook::{logging, AppConfig};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> smshook::Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging);

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("waiting for requests on http://{}", addr);

    smshook::serve_decisions(listener, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("shutting down");
    })
    .await?;
    Ok(())
}
