//! Modem collaborators.
//!
//! The AT-command driver lives outside this crate. What is here:
//! - [`SerializedModem`], which guarantees one SMS-send at a time on any modem
//! - [`ConsoleModem`], a line-oriented stand-in used for development: inbound
//!   SMS are typed as `<number> <text>` lines, outbound SMS are printed.

use async_trait::async_trait;
use hook_core::{InboundMessage, Modem, ModemError, SendRequest};
use std::io::BufRead;
use time::OffsetDateTime;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Serializes sends to a shared modem so commands never interleave.
pub struct SerializedModem<M> {
    inner: M,
    lock: Mutex<()>,
}

impl<M: Modem> SerializedModem<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<M: Modem> Modem for SerializedModem<M> {
    async fn send(&self, req: SendRequest<'_>) -> Result<(), ModemError> {
        let _guard = self.lock.lock().await;
        self.inner.send(req).await
    }
}

/// Development modem writing every outbound SMS as `-> <to>: <text>`.
pub struct ConsoleModem<W = Stdout> {
    out: Mutex<W>,
}

impl ConsoleModem<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> ConsoleModem<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Modem for ConsoleModem<W> {
    async fn send(&self, req: SendRequest<'_>) -> Result<(), ModemError> {
        if req.to.trim().is_empty() {
            return Err(ModemError::Invalid("empty recipient".into()));
        }
        let line = format!("-> {}: {}\n", req.to, req.text);
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes())
            .await
            .map_err(|e| ModemError::Transport(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| ModemError::Transport(e.to_string()))
    }
}

/// Split a console line into `(number, text)`. Blank lines yield `None`.
pub fn parse_console_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((number, text)) => Some((number, text.trim_start())),
        None => Some((line, "")),
    }
}

/// Publish every console line as an inbound SMS until EOF or until the
/// receiving side goes away. Blocking: run it on a dedicated thread.
pub fn listen_console<R: BufRead>(
    reader: R,
    tx: mpsc::Sender<InboundMessage>,
) -> std::io::Result<()> {
    for line in reader.lines() {
        let line = line?;
        let Some((number, text)) = parse_console_line(&line) else {
            debug!("ignoring blank console line");
            continue;
        };
        let message = InboundMessage::new(number, OffsetDateTime::now_utc(), text);
        if tx.blocking_send(message).is_err() {
            warn!("receive handler is gone, console listener stopping");
            return Ok(());
        }
    }
    info!("console input closed");
    Ok(())
}
