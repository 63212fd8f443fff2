use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use parley_types::events::{ClientCommand, ServerEvent};
use parley_types::models::UserId;

use crate::error::GatewayError;
use crate::hub::{CommandQueue, Hub};

/// Heartbeat interval: the client sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open, authenticated gateway socket that has not started pumping yet.
pub struct Connection {
    id: Uuid,
    socket: Socket,
    user_id: UserId,
    hub: Hub,
    commands: CommandQueue,
}

/// Open the realtime socket, authenticating the upgrade with the bearer token.
pub async fn connect(
    url: &str,
    token: &str,
    user_id: UserId,
    hub: Hub,
    commands: CommandQueue,
) -> Result<Connection, GatewayError> {
    let mut request = url.into_client_request()?;
    let bearer =
        HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| GatewayError::InvalidToken)?;
    request.headers_mut().insert(header::AUTHORIZATION, bearer);

    let (socket, _response) = tokio_tungstenite::connect_async(request).await?;
    let id = Uuid::new_v4();
    info!("Gateway connection {} open for {}", id, user_id);

    Ok(Connection {
        id,
        socket,
        user_id,
        hub,
        commands,
    })
}

impl Connection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Register the socket, then pump commands out and events in until either
    /// side closes. There is no reconnect.
    pub async fn run(self) -> Result<(), GatewayError> {
        let Connection {
            id,
            socket,
            user_id,
            hub,
            mut commands,
        } = self;
        let (mut sender, mut receiver) = socket.split();

        let register = serde_json::to_string(&ClientCommand::RegisterUserSocket(user_id.clone()))?;
        sender.send(Message::Text(register.into())).await?;

        let pong_received = Arc::new(AtomicBool::new(true));
        let pong_flag_send = pong_received.clone();
        let pong_flag_recv = pong_received.clone();

        // Outbound commands -> server, with heartbeat
        let mut send_task = tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;
            let mut missed_heartbeats: u8 = 0;

            loop {
                tokio::select! {
                    command = commands.recv() => {
                        let Some(command) = command else { break };
                        let text = match serde_json::to_string(&command) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!("Failed to encode command: {}", e);
                                continue;
                            }
                        };
                        trace!("-> {}", text);
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    _ = heartbeat.tick() => {
                        if pong_flag_send.swap(false, Ordering::Acquire) {
                            missed_heartbeats = 0;
                        } else {
                            missed_heartbeats += 1;
                            if missed_heartbeats >= 2 {
                                warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                                break;
                            }
                        }
                        if sender.send(Message::Ping(Default::default())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            let _ = sender.close().await;
        });

        // Server events -> hub
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            trace!("<- {}", event.name());
                            hub.publish(event);
                        }
                        Err(e) => {
                            let raw: String = text.chars().take(200).collect();
                            debug!("Ignoring unknown frame: {} -- raw: {}", e, raw);
                        }
                    },
                    Message::Pong(_) => {
                        pong_flag_recv.store(true, Ordering::Release);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        // Wait for either task to finish
        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        info!("Gateway connection {} closed", id);
        Ok(())
    }
}
