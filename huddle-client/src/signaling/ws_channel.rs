use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use huddle_core::{ClientMessage, RoomId, ServerMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, error, info, warn};

use crate::config::ReconnectConfig;
use crate::error::{HuddleError, Result};
use crate::signaling::event::{EventTranslator, RoomEvent, SignalIntent};
use crate::signaling::signaling_output::{RoomEvents, SignalingConnector, SignalingOutput};

const EVENT_BUFFER: usize = 256;
const FLUSH_GRACE: Duration = Duration::from_secs(2);

/// Connects to a relay over WebSocket.
pub struct WsConnector {
    url: String,
    reconnect: ReconnectConfig,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, reconnect: ReconnectConfig) -> Self {
        Self {
            url: url.into(),
            reconnect,
        }
    }
}

#[async_trait]
impl SignalingConnector for WsConnector {
    async fn join(
        &self,
        room: &RoomId,
        display_name: &str,
    ) -> Result<(Arc<dyn SignalingOutput>, RoomEvents)> {
        // The first connection is made inline so a dead relay fails the join.
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| HuddleError::ChannelDisconnected(format!("{}: {}", self.url, e)))?;
        info!("Signaling connected to {}", self.url);

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let link = Arc::new(Link::default());
        let join = ClientMessage::JoinRoom {
            room_id: room.clone(),
            user_name: display_name.to_string(),
        }
        .encode()?;

        let supervisor = Supervisor {
            url: self.url.clone(),
            join,
            reconnect: self.reconnect.clone(),
            link: link.clone(),
            events_tx,
        };
        let handle = tokio::spawn(supervisor.run(ws));

        let output = WsSignaling {
            room: room.clone(),
            link,
            supervisor: Mutex::new(Some(handle)),
        };
        Ok((Arc::new(output), events_rx))
    }
}

/// State shared between the outbound handle and the connection supervisor.
#[derive(Default)]
struct Link {
    writer: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    closed: AtomicBool,
    shutdown: Notify,
}

impl Link {
    fn set_writer(&self, writer: Option<mpsc::UnboundedSender<Message>>) {
        if let Ok(mut guard) = self.writer.lock() {
            *guard = writer;
        }
    }

    fn take_writer(&self) -> Option<mpsc::UnboundedSender<Message>> {
        self.writer.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Queues a frame on the live connection. Returns false when there is none.
    fn push(&self, msg: Message) -> bool {
        match self.writer.lock() {
            Ok(guard) => guard.as_ref().is_some_and(|w| w.send(msg).is_ok()),
            Err(_) => false,
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Outbound side of a WebSocket signaling channel.
pub struct WsSignaling {
    room: RoomId,
    link: Arc<Link>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl SignalingOutput for WsSignaling {
    async fn send(&self, intent: SignalIntent) {
        if self.link.is_closed() {
            debug!("Signaling closed; dropping {}", intent.kind());
            return;
        }
        let kind = intent.kind();
        let text = match intent.into_message(&self.room).encode() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode {}: {}", kind, e);
                return;
            }
        };
        if !self.link.push(Message::text(text)) {
            warn!("Signaling link down; dropped {}", kind);
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        if self.link.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(writer) = self.link.take_writer() {
            let _ = writer.send(Message::Close(None));
        }
        self.link.shutdown.notify_one();

        let handle = self.supervisor.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if tokio::time::timeout(FLUSH_GRACE, handle).await.is_err() {
                warn!("Signaling supervisor did not stop in time");
            }
        }
        info!("Signaling channel for room {} closed", self.room);
        Ok(())
    }
}

struct Supervisor {
    url: String,
    join: String,
    reconnect: ReconnectConfig,
    link: Arc<Link>,
    events_tx: mpsc::Sender<RoomEvent>,
}

enum Disconnect {
    Lost(String),
    Shutdown,
    ConsumerGone,
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

impl Supervisor {
    async fn run(self, first: WsStream) {
        let mut translator = EventTranslator::default();
        let mut next = Some(first);
        let mut attempt: u32 = 0;

        loop {
            if let Some(ws) = next.take() {
                attempt = 0;
                match self.serve(ws, &mut translator).await {
                    Disconnect::Shutdown | Disconnect::ConsumerGone => break,
                    Disconnect::Lost(reason) => {
                        warn!("Signaling link lost: {}", reason);
                        if !self.report(reason).await {
                            break;
                        }
                    }
                }
            }

            if self.link.is_closed() {
                break;
            }

            let delay = self.reconnect.backoff(attempt);
            attempt = attempt.saturating_add(1);
            tokio::select! {
                _ = self.link.shutdown.notified() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => {
                    info!("Signaling reconnected to {}", self.url);
                    next = Some(ws);
                }
                Err(e) => {
                    debug!("Reconnect attempt {} failed: {}", attempt, e);
                }
            }
        }
        debug!("Signaling supervisor for {} stopped", self.url);
    }

    /// Emits a channel error. Returns false once nobody is listening.
    async fn report(&self, reason: String) -> bool {
        self.events_tx
            .send(RoomEvent::ChannelError { reason })
            .await
            .is_ok()
    }

    async fn serve(&self, ws: WsStream, translator: &mut EventTranslator) -> Disconnect {
        let (mut sink, mut stream) = ws.split();
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Message>();

        // Every connection starts by (re)joining the room.
        let _ = writer_tx.send(Message::text(self.join.clone()));
        self.link.set_writer(Some(writer_tx));

        let mut writer = tokio::spawn(async move {
            while let Some(msg) = writer_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if sink.send(msg).await.is_err() || closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let outcome = loop {
            tokio::select! {
                _ = self.link.shutdown.notified() => break Disconnect::Shutdown,
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !self.dispatch(text.as_str(), translator).await {
                            break Disconnect::ConsumerGone;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        break Disconnect::Lost("closed by relay".to_string())
                    }
                    Some(Ok(_)) => {}
                    Some(Err(WsError::ConnectionClosed)) | None => {
                        break Disconnect::Lost("connection closed".to_string())
                    }
                    Some(Err(e)) => break Disconnect::Lost(e.to_string()),
                },
            }
        };

        self.link.set_writer(None);
        match outcome {
            Disconnect::Shutdown => {
                if tokio::time::timeout(FLUSH_GRACE, &mut writer).await.is_err() {
                    writer.abort();
                }
            }
            _ => writer.abort(),
        }
        outcome
    }

    async fn dispatch(&self, text: &str, translator: &mut EventTranslator) -> bool {
        let events = match ServerMessage::decode(text).and_then(|m| translator.translate(m)) {
            Ok(events) => events,
            Err(e) => {
                warn!("Discarding relay message: {}", e);
                return true;
            }
        };
        for event in events {
            if self.events_tx.send(event).await.is_err() {
                return false;
            }
        }
        true
    }
}
