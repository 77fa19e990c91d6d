use bestsweep_common::protocol::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt, stream::SplitStream};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsReader = SplitStream<WsStream>;

/// Game socket: intents go out through a writer task, server messages are
/// read on demand.
pub struct GameSocket {
    sender: mpsc::UnboundedSender<ClientMessage>,
    reader: WsReader,
    writer_task: JoinHandle<()>,
}

impl GameSocket {
    /// Connect to a hosted game
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to game socket: {}", url);

        let (ws_stream, _) = connect_async(url).await?;
        let (mut writer, reader) = ws_stream.split();
        let (sender, mut receiver) = mpsc::unbounded_channel::<ClientMessage>();

        let writer_task = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize intent: {}", e);
                        continue;
                    }
                };

                debug!("Sending intent: {}", json);
                if let Err(e) = writer.send(Message::Text(json.into())).await {
                    warn!("Failed to send intent: {}", e);
                    break;
                }
            }

            let _ = writer.close().await;
        });

        info!("Game socket connected");
        Ok(Self {
            sender,
            reader,
            writer_task,
        })
    }

    /// Cloneable handle for queueing intents
    pub fn get_sender(&self) -> mpsc::UnboundedSender<ClientMessage> {
        self.sender.clone()
    }

    pub fn send_message(&self, message: ClientMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| "Game socket writer closed")?;
        Ok(())
    }

    /// Next server message, or `None` once the connection is closed.
    pub async fn receive_message(&mut self) -> Result<Option<ServerMessage>> {
        while let Some(frame) = self.reader.next().await {
            match frame? {
                Message::Text(text) => {
                    debug!("Received message: {}", text);
                    return Ok(Some(serde_json::from_str(&text)?));
                }
                Message::Close(_) => {
                    info!("Game socket closed by server");
                    return Ok(None);
                }
                _ => continue,
            }
        }

        Ok(None)
    }

    /// Flush pending intents and close the connection
    pub async fn close(self) -> Result<()> {
        drop(self.sender);
        let _ = self.writer_task.await;
        Ok(())
    }
}
