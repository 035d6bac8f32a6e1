use axum::Router;
use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{Message, WebSocket};
use axum::response::IntoResponse;
use axum::routing::get;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use huddle_core::{ClientMessage, ParticipantId, ServerMessage, UserInfo};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{info, warn};

struct Peer {
    name: Option<String>,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Clone, Default)]
struct RelayHub {
    peers: Arc<DashMap<ParticipantId, Peer>>,
    counter: Arc<AtomicU64>,
}

impl RelayHub {
    fn send(&self, to: &ParticipantId, msg: &ServerMessage) {
        if let Some(peer) = self.peers.get(to) {
            if let Ok(text) = serde_json::to_string(msg) {
                let _ = peer.tx.send(Message::Text(text.into()));
            }
        }
    }

    fn roster(&self) -> Vec<UserInfo> {
        let mut users: Vec<UserInfo> = self
            .peers
            .iter()
            .filter(|e| e.value().name.is_some())
            .map(|e| UserInfo {
                id: e.key().clone(),
                name: e.value().name.clone(),
            })
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    fn joined_ids(&self) -> Vec<ParticipantId> {
        self.roster().into_iter().map(|u| u.id).collect()
    }

    fn handle(&self, from: &ParticipantId, msg: ClientMessage) {
        match msg {
            ClientMessage::JoinRoom { user_name, .. } => {
                if let Some(mut peer) = self.peers.get_mut(from) {
                    peer.name = Some(user_name.clone());
                }
                self.send(
                    from,
                    &ServerMessage::Welcome {
                        user_id: from.clone(),
                    },
                );
                let users = self.roster();
                self.send(
                    from,
                    &ServerMessage::RoomUsers {
                        users: users.clone(),
                    },
                );
                for id in self.joined_ids().iter().filter(|id| *id != from) {
                    self.send(
                        id,
                        &ServerMessage::UserJoined {
                            user_id: from.clone(),
                            user_name: Some(user_name.clone()),
                            users: users.clone(),
                        },
                    );
                }
            }
            ClientMessage::LeaveRoom { .. } => self.remove(from),
            ClientMessage::Offer { to, offer } => self.send(
                &to,
                &ServerMessage::Offer {
                    from: from.clone(),
                    offer,
                },
            ),
            ClientMessage::Answer { to, answer } => self.send(
                &to,
                &ServerMessage::Answer {
                    from: from.clone(),
                    answer,
                },
            ),
            ClientMessage::IceCandidate { to, candidate } => self.send(
                &to,
                &ServerMessage::IceCandidate {
                    from: from.clone(),
                    candidate,
                },
            ),
            ClientMessage::ChatMessage { message, timestamp } => {
                let sender = self
                    .peers
                    .get(from)
                    .and_then(|p| p.name.clone())
                    .unwrap_or_else(|| from.fallback_name());
                let chat = ServerMessage::ChatMessage {
                    message,
                    sender,
                    sender_id: Some(from.clone()),
                    timestamp,
                };
                for id in self.joined_ids() {
                    self.send(&id, &chat);
                }
            }
        }
    }

    fn remove(&self, id: &ParticipantId) {
        if self.peers.remove(id).is_none() {
            return;
        }
        let users = self.roster();
        for other in self.joined_ids() {
            self.send(
                &other,
                &ServerMessage::UserLeft {
                    user_id: id.clone(),
                    users: users.clone(),
                },
            );
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<RelayHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: RelayHub) {
    let n = hub.counter.fetch_add(1, Ordering::SeqCst) + 1;
    let id = ParticipantId::from(format!("u{:03}", n));
    info!("Relay connection {}", id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.peers.insert(id.clone(), Peer { name: None, tx });

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sender.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let hub = hub.clone();
        let id = id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(msg) => hub.handle(&id, msg),
                        Err(e) => warn!("Invalid message from {}: {}", id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    hub.remove(&id);
    info!("Relay connection {} closed", id);
}

/// WebSocket relay on an ephemeral local port.
pub struct TestRelay {
    addr: SocketAddr,
    hub: RelayHub,
}

impl TestRelay {
    pub async fn start() -> Self {
        let hub = RelayHub::default();
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .with_state(hub.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind relay");
        let addr = listener.local_addr().expect("relay addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("relay server");
        });

        Self { addr, hub }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.hub.peers.len()
    }

    /// Closes every client connection from the relay side.
    pub fn kick_all(&self) {
        for entry in self.hub.peers.iter() {
            let _ = entry.value().tx.send(Message::Close(None));
        }
    }
}
