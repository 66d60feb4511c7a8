use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{SubscribeQuery, Topic};
use crate::services::{RealtimeHub, TopicReceiver};

/// Staff may follow any topic; patients only their own notification feed.
pub fn authorize_topic(user: &User, topic: &Topic) -> Result<(), AppError> {
    match topic {
        _ if user.is_staff() => Ok(()),
        Topic::User(id) if *id == user.id => Ok(()),
        _ => Err(AppError::Forbidden(format!("Not allowed to subscribe to {}", topic))),
    }
}

pub async fn subscribe_ws(
    State(hub): State<Arc<RealtimeHub>>,
    Extension(user): Extension<User>,
    Query(query): Query<SubscribeQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let topic: Topic = query.topic.parse()?;
    authorize_topic(&user, &topic)?;

    info!("User {} subscribing to {}", user.id, topic);
    let receiver = hub.subscribe(topic).await;

    Ok(ws.on_upgrade(move |socket| forward_events(socket, receiver, topic)))
}

async fn forward_events(socket: WebSocket, mut receiver: TopicReceiver, topic: Topic) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = receiver.recv() => match event {
                Ok(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber on {} lagged, skipped {} events", topic, skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("Subscriber on {} disconnected", topic);
}
