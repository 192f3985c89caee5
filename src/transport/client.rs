//! WebSocket snapshot client
//!
//! Connects to the snapshot server, announces the pit capacity and answers
//! every snapshot through the [`Session`]. The session outlives individual
//! connections, so pit state carries over reconnects.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::session::{Session, SessionError};
use crate::config::ClientConfig;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

pub struct SnapshotClient {
    config: ClientConfig,
    session: Session,
    reconnect_attempts: u32,
}

impl SnapshotClient {
    pub fn new(config: ClientConfig, session: Session) -> Self {
        Self {
            config,
            session,
            reconnect_attempts: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run until the server closes the connection, reports an error, or
    /// reconnect attempts run out.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        loop {
            match self.connect_and_stream().await {
                Ok(()) => {
                    info!(url = %self.config.url, "snapshot server closed the connection");
                    return Ok(());
                }
                Err(ClientError::Session(e)) => {
                    error!(error = %e, "session ended by server");
                    return Err(e.into());
                }
                Err(ClientError::WebSocket(e)) => {
                    self.reconnect_attempts += 1;
                    if self.reconnect_attempts > self.config.max_reconnect_attempts {
                        error!(
                            attempts = self.reconnect_attempts,
                            "max reconnect attempts exceeded, giving up"
                        );
                        return Err(e.into());
                    }

                    warn!(
                        error = %e,
                        attempt = self.reconnect_attempts,
                        "snapshot connection failed, reconnecting"
                    );
                    tokio::time::sleep(self.config.reconnect_delay()).await;
                }
            }
        }
    }

    async fn connect_and_stream(&mut self) -> Result<(), ClientError> {
        info!(url = %self.config.url, "connecting to snapshot server");
        let (ws_stream, response) = connect_async(self.config.url.as_str()).await?;
        info!(status = %response.status(), "connected to snapshot server");

        self.reconnect_attempts = 0;

        let (mut write, mut read) = ws_stream.split();
        write.send(Message::Text(self.session.handshake()?)).await?;

        while let Some(msg) = read.next().await {
            match msg? {
                Message::Text(text) => {
                    if let Some(reply) = self.session.handle_text(&text)? {
                        write.send(Message::Text(reply)).await?;
                    }
                }
                Message::Close(_) => {
                    info!("snapshot server sent close");
                    break;
                }
                Message::Ping(data) => {
                    debug!(len = data.len(), "ping from snapshot server");
                }
                _ => {}
            }
        }

        Ok(())
    }
}
