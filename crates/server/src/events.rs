use std::net::SocketAddr;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{info, warn};

use ghost_common::ids::{new_event_id, now_ms};
use ghost_protocol::{
    ClientSubscribe, EventEnvelope, EventError, EventHello, MessageCreated, MessageSeen,
    SubscribeOk,
};

use crate::app::SharedState;
use crate::state::{ChatState, MessageState, ServerState, SubscriberHandle, SubscriberScope};

/// Live-update fan-out: one websocket per open view, subscribed either to a
/// creator's dashboard or to a single anonymous thread. Events are pushed
/// on write; there is no polling.
pub async fn run_events_listener(app: SharedState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&app.config.events_bind_addr).await?;
    info!("events listening on {}", app.config.events_bind_addr);
    loop {
        let (stream, addr) = listener.accept().await?;
        let app = app.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_subscriber(stream, app, addr).await {
                warn!("subscriber {addr} error: {err}");
            }
        });
    }
}

async fn handle_subscriber(
    stream: TcpStream,
    app: SharedState,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_write.send(msg).await.is_err() {
                break;
            }
        }
    });

    let subscriber_id = new_event_id();
    // Cleanup must run however the read loop ends. A tab killed without a
    // close handshake surfaces as a transport error inside the loop, and a
    // garbage frame as a parse error; neither may strand the map entry or
    // the writer task.
    let result = read_loop(&app, &mut ws_read, &tx, &subscriber_id, addr).await;
    if app.state.write().await.remove_subscriber(&subscriber_id) {
        info!("subscriber {addr} detached");
    }
    writer.abort();
    result
}

async fn read_loop(
    app: &SharedState,
    ws_read: &mut SplitStream<WebSocketStream<TcpStream>>,
    tx: &mpsc::UnboundedSender<WsMessage>,
    subscriber_id: &str,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let hello = EventHello {
        server_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    send_event(tx, "event.hello", &hello)?;

    let mut subscribed = false;

    while let Some(msg) = ws_read.next().await {
        let msg = msg?;
        if !msg.is_text() {
            continue;
        }
        let env: EventEnvelope = serde_json::from_str(msg.to_text()?)?;

        if !subscribed {
            if env.event_type != "client.subscribe" {
                send_error(tx, "subscribe_required", "expected client.subscribe")?;
                warn!("subscriber {addr} sent {} before subscribing", env.event_type);
                break;
            }
            let request: ClientSubscribe = serde_json::from_value(env.payload)?;
            let scope = match resolve_scope(app, &request).await {
                Ok(scope) => scope,
                Err((code, message)) => {
                    send_error(tx, code, message)?;
                    warn!("subscriber {addr} rejected: {message}");
                    break;
                }
            };
            let label = match &scope {
                SubscriberScope::Creator(id) => format!("creator:{id}"),
                SubscriberScope::Chat(id) => format!("chat:{id}"),
            };
            app.state.write().await.add_subscriber(
                subscriber_id,
                SubscriberHandle {
                    scope,
                    tx: tx.clone(),
                },
            );
            subscribed = true;
            send_event(tx, "event.subscribed", &SubscribeOk { scope: label.clone() })?;
            info!("subscriber {addr} attached as {label}");
            continue;
        }

        match env.event_type.as_str() {
            "client.heartbeat" => {
                send_event(tx, "event.pong", &serde_json::json!({}))?;
            }
            other => {
                send_error(tx, "invalid_event", "unknown event type")?;
                warn!("subscriber {addr} sent unknown event type {other}");
            }
        }
    }

    Ok(())
}

async fn resolve_scope(
    app: &SharedState,
    request: &ClientSubscribe,
) -> Result<SubscriberScope, (&'static str, &'static str)> {
    if let Some(bearer) = &request.bearer {
        let claims = app
            .token_key
            .verify(bearer, now_ms())
            .map_err(|_| ("unauthorized", "invalid or expired bearer token"))?;
        let state = app.state.read().await;
        if !state.creators.contains_key(&claims.creator_id) {
            return Err(("not_found", "creator not found"));
        }
        return Ok(SubscriberScope::Creator(claims.creator_id));
    }
    if let (Some(anon_token), Some(chat_id)) = (&request.anon_token, &request.chat_id) {
        let state = app.state.read().await;
        let Some(chat) = state.chats.get(chat_id) else {
            return Err(("not_found", "chat not found"));
        };
        if chat.anon_token != *anon_token {
            return Err(("forbidden", "token does not match chat"));
        }
        return Ok(SubscriberScope::Chat(chat_id.clone()));
    }
    Err(("invalid_subscribe", "missing capability"))
}

fn send_event<T: serde::Serialize>(
    tx: &mpsc::UnboundedSender<WsMessage>,
    event_type: &str,
    payload: &T,
) -> anyhow::Result<()> {
    let env = EventEnvelope {
        event_type: event_type.to_string(),
        id: new_event_id(),
        ts: now_ms(),
        payload: serde_json::to_value(payload)?,
    };
    let text = serde_json::to_string(&env)?;
    tx.send(WsMessage::Text(text))?;
    Ok(())
}

fn send_error(
    tx: &mpsc::UnboundedSender<WsMessage>,
    code: &str,
    message: &str,
) -> anyhow::Result<()> {
    let payload = EventError {
        code: code.to_string(),
        message: message.to_string(),
    };
    send_event(tx, "event.error", &payload)
}

fn fanout<T: serde::Serialize>(
    state: &ServerState,
    chat: &ChatState,
    event_type: &str,
    payload: &T,
) {
    for handle in state.subscribers.values() {
        let interested = match &handle.scope {
            SubscriberScope::Creator(creator_id) => *creator_id == chat.creator_id,
            SubscriberScope::Chat(chat_id) => *chat_id == chat.chat_id,
        };
        if interested {
            let _ = send_event(&handle.tx, event_type, payload);
        }
    }
}

/// Push a freshly appended message to the thread's subscribers and the
/// owning creator's dashboard subscribers.
pub fn publish_message_created(state: &ServerState, chat: &ChatState, message: &MessageState) {
    let payload = MessageCreated {
        chat_id: chat.chat_id.clone(),
        message: message.view(),
    };
    fanout(state, chat, "message.created", &payload);
}

pub fn publish_message_seen(state: &ServerState, chat: &ChatState, message_id: &str) {
    let payload = MessageSeen {
        chat_id: chat.chat_id.clone(),
        message_id: message_id.to_string(),
    };
    fanout(state, chat, "message.seen", &payload);
}
