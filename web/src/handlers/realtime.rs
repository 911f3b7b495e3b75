//! Realtime channel authorization and websocket relay.
//!
//! A client first opens the websocket and receives its `socket_id`. For
//! each channel it wants, it asks `POST /api/v1/realtime/auth` for a grant
//! bound to that socket, then sends the grant back over the socket in a
//! `subscribe` message.
//!
//! A subscription lives as long as its grant. When the grant expires the
//! server sends `subscription_expired` and stops relaying; the client
//! re-authorizes and subscribes again with a fresh grant, which also
//! extends a subscription it still holds. A revoked guest token therefore
//! loses its channel within one grant lifetime.
//!
//! # Message Protocol
//!
//! **Server → Client:**
//! ```json
//! { "type": "connection_established", "socket_id": "1234.5678" }
//! { "type": "subscription_succeeded", "channel": "private-guest-booking-1042" }
//! { "type": "subscription_error", "channel": "...", "code": "INVALID_GRANT" }
//! { "type": "subscription_expired", "channel": "..." }
//! { "type": "event", "channel": "...", "envelope": { ... } }
//! { "type": "pong" }
//! { "type": "error", "message": "..." }
//! ```
//!
//! **Client → Server:**
//! ```json
//! { "type": "subscribe", "channel": "...", "auth": "k1:...", "expires_at": "..." }
//! { "type": "unsubscribe", "channel": "..." }
//! { "type": "ping" }
//! ```

use crate::error::AppError;
use crate::extractors::{GuestToken, StaffBearer};
use crate::relay::RelayHub;
use crate::state::{AppState, Backend};
use axum::{
    Json,
    extract::{
        State, WebSocketUpgrade,
        rejection::JsonRejection,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use stayline_auth::{ChannelGrant, Credential, GrantSigner};
use stayline_core::environment::Clock;
use stayline_core::event::EventEnvelope;
use stayline_core::ids::HotelId;
use stayline_runtime::metrics::RelayMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Most channels one socket may hold at once.
pub const MAX_SUBSCRIPTIONS_PER_SOCKET: usize = 16;

/// Outgoing messages queued per socket.
const OUTBOUND_BUFFER: usize = 64;

/// Body of `POST /api/v1/realtime/auth`.
#[derive(Debug, Deserialize)]
pub struct ChannelAuthRequest {
    /// Socket the grant is bound to.
    pub socket_id: String,
    /// Channel requested.
    pub channel_name: String,
    /// Hotel slug; required with a guest token.
    #[serde(default)]
    pub hotel: Option<String>,
}

/// `POST /api/v1/realtime/auth`
///
/// A bearer staff session takes precedence over a guest token.
///
/// # Errors
///
/// - 401 when neither credential is present or the staff session is unknown.
/// - 422 for a malformed body, socket id, or a guest request without `hotel`.
/// - 403 for a channel outside the caller's scope.
/// - 404 for any guest token problem.
pub async fn authorize_channel<B: Backend>(
    State(state): State<AppState<B>>,
    staff: Option<StaffBearer>,
    guest: Option<GuestToken>,
    body: Result<Json<ChannelAuthRequest>, JsonRejection>,
) -> Result<Json<ChannelGrant>, AppError> {
    let Json(request) = body.map_err(|e| AppError::invalid_input(e.body_text()))?;

    match (staff, guest) {
        (Some(StaffBearer(session_id)), _) => state
            .gateway
            .authorize(&Credential::Staff { session_id }, &request.socket_id, &request.channel_name)
            .await
            .map(Json)
            .map_err(AppError::for_staff),
        (None, Some(GuestToken(token))) => {
            let slug = request
                .hotel
                .ok_or_else(|| AppError::invalid_input("hotel is required with a guest token"))?;
            let hotel = HotelId::new(slug).map_err(|_| AppError::not_available())?;
            state
                .gateway
                .authorize(&Credential::Guest { token, hotel }, &request.socket_id, &request.channel_name)
                .await
                .map(Json)
                .map_err(AppError::for_guest)
        }
        (None, None) => Err(AppError::unauthenticated("Credential required")),
    }
}

/// Messages a client sends over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a channel with a grant from the auth endpoint.
    Subscribe {
        /// Channel name.
        channel: String,
        /// Grant signature.
        auth: String,
        /// Grant expiry.
        expires_at: DateTime<Utc>,
    },
    /// Leave a channel.
    Unsubscribe {
        /// Channel name.
        channel: String,
    },
    /// Keep-alive.
    Ping,
}

/// Messages the server sends over the socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection.
    ConnectionEstablished {
        /// Id to present to the auth endpoint.
        socket_id: String,
    },
    /// The grant was accepted.
    SubscriptionSucceeded {
        /// Channel name.
        channel: String,
    },
    /// The grant was refused.
    SubscriptionError {
        /// Channel name.
        channel: String,
        /// Reason code.
        code: &'static str,
    },
    /// The grant behind a subscription ran out; nothing more is relayed.
    SubscriptionExpired {
        /// Channel name.
        channel: String,
    },
    /// A relayed envelope.
    Event {
        /// Channel it was published on.
        channel: String,
        /// The envelope.
        envelope: EventEnvelope,
    },
    /// Answer to a ping.
    Pong,
    /// The client sent something unreadable.
    Error {
        /// Description.
        message: String,
    },
}

/// Why a subscribe message was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeRefusal {
    /// Signature, binding or expiry check failed.
    InvalidGrant,
    /// The socket already holds the maximum number of channels.
    TooManySubscriptions,
}

impl SubscribeRefusal {
    /// Wire code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidGrant => "INVALID_GRANT",
            Self::TooManySubscriptions => "TOO_MANY_SUBSCRIPTIONS",
        }
    }
}

/// Decide a subscribe message for `socket_id` holding `held` channels.
///
/// Re-subscribing to a channel the socket already holds does not count
/// against the limit, but the grant is still checked.
///
/// # Errors
///
/// Returns the [`SubscribeRefusal`] to report to the client.
#[allow(clippy::too_many_arguments)]
pub fn check_subscription(
    signer: &GrantSigner,
    socket_id: &str,
    channel: &str,
    auth: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    held: usize,
    already_held: bool,
) -> Result<(), SubscribeRefusal> {
    if !signer.verify(socket_id, channel, auth, expires_at, now) {
        return Err(SubscribeRefusal::InvalidGrant);
    }
    if !already_held && held >= MAX_SUBSCRIPTIONS_PER_SOCKET {
        return Err(SubscribeRefusal::TooManySubscriptions);
    }
    Ok(())
}

/// Monotonic deadline for a grant expiring at `expires_at`, as judged at `now`.
fn grant_deadline(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Instant {
    Instant::now() + (expires_at - now).to_std().unwrap_or_default()
}

/// A channel held by one socket.
struct Subscription {
    forwarder: JoinHandle<()>,
    deadline: watch::Sender<Instant>,
}

/// Socket ids look like `"{u32}.{u32}"`.
#[must_use]
pub fn new_socket_id() -> String {
    format!("{}.{}", rand::random::<u32>(), rand::random::<u32>())
}

/// `GET /api/v1/realtime/ws`
#[allow(clippy::unused_async)]
pub async fn websocket<B: Backend>(ws: WebSocketUpgrade, State(state): State<AppState<B>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket<B: Backend>(socket: WebSocket, state: AppState<B>) {
    let socket_id = new_socket_id();
    RelayMetrics::connection_opened();
    info!(socket_id = %socket_id, "Realtime socket connected");

    let (mut sink, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize realtime message");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let _ = tx
        .send(ServerMessage::ConnectionEstablished {
            socket_id: socket_id.clone(),
        })
        .await;

    let mut subscriptions: HashMap<String, Subscription> = HashMap::new();

    while let Some(Ok(frame)) = receiver.next().await {
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            Message::Binary(_) => {
                let _ = tx
                    .send(ServerMessage::Error {
                        message: "binary frames are not supported".to_string(),
                    })
                    .await;
                continue;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Subscribe {
                channel,
                auth,
                expires_at,
            }) => {
                subscriptions.retain(|_, held| !held.forwarder.is_finished());
                let now = state.resolver.tokens().clock().now();
                let decision = check_subscription(
                    state.gateway.signer(),
                    &socket_id,
                    &channel,
                    &auth,
                    expires_at,
                    now,
                    subscriptions.len(),
                    subscriptions.contains_key(&channel),
                );
                match decision {
                    Ok(()) => {
                        let deadline = grant_deadline(expires_at, now);
                        if let Some(held) = subscriptions.get(&channel) {
                            held.deadline.send_replace(deadline);
                        } else {
                            let (deadline_tx, deadline_rx) = watch::channel(deadline);
                            let forwarder =
                                spawn_forwarder(&state.relay, channel.clone(), deadline_rx, tx.clone()).await;
                            subscriptions.insert(
                                channel.clone(),
                                Subscription {
                                    forwarder,
                                    deadline: deadline_tx,
                                },
                            );
                        }
                        debug!(socket_id = %socket_id, channel = %channel, "Socket subscribed");
                        let _ = tx.send(ServerMessage::SubscriptionSucceeded { channel }).await;
                    }
                    Err(refusal) => {
                        warn!(socket_id = %socket_id, channel = %channel, code = refusal.code(), "Subscription refused");
                        let _ = tx
                            .send(ServerMessage::SubscriptionError {
                                channel,
                                code: refusal.code(),
                            })
                            .await;
                    }
                }
            }
            Ok(ClientMessage::Unsubscribe { channel }) => {
                if let Some(held) = subscriptions.remove(&channel) {
                    held.forwarder.abort();
                    debug!(socket_id = %socket_id, channel = %channel, "Socket unsubscribed");
                }
            }
            Ok(ClientMessage::Ping) => {
                let _ = tx.send(ServerMessage::Pong).await;
            }
            Err(e) => {
                let _ = tx
                    .send(ServerMessage::Error {
                        message: format!("unreadable message: {e}"),
                    })
                    .await;
            }
        }
    }

    for (_, held) in subscriptions.drain() {
        held.forwarder.abort();
    }
    drop(tx);
    let _ = writer.await;
    state.relay.prune().await;
    RelayMetrics::connection_closed();
    info!(socket_id = %socket_id, "Realtime socket disconnected");
}

/// Relay `channel` to the socket until the deadline passes.
///
/// A new value on `deadline` moves the cutoff; dropping its sender stops
/// the forwarder.
async fn spawn_forwarder(
    hub: &RelayHub,
    channel: String,
    mut deadline: watch::Receiver<Instant>,
    tx: mpsc::Sender<ServerMessage>,
) -> JoinHandle<()> {
    let mut envelopes = hub.subscribe(&channel).await;
    tokio::spawn(async move {
        loop {
            let until = *deadline.borrow_and_update();
            tokio::select! {
                () = tokio::time::sleep_until(until) => {
                    debug!(channel = %channel, "Channel grant expired");
                    let _ = tx.send(ServerMessage::SubscriptionExpired { channel: channel.clone() }).await;
                    break;
                }
                renewed = deadline.changed() => {
                    if renewed.is_err() {
                        break;
                    }
                }
                received = envelopes.recv() => match received {
                    Ok(envelope) => {
                        let message = ServerMessage::Event {
                            channel: channel.clone(),
                            envelope: Arc::unwrap_or_clone(envelope),
                        };
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %channel, skipped, "Socket fell behind, envelopes dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use stayline_auth::GatewayConfig;
    use stayline_testing::fixtures::envelope_for;
    use stayline_testing::{BookingFixture, test_epoch};
    use std::time::Duration as StdDuration;

    fn signer() -> GrantSigner {
        GrantSigner::new(&GatewayConfig::new("k1", b"secret".to_vec()))
    }

    #[test]
    fn socket_ids_are_accepted_by_the_gateway() {
        for _ in 0..32 {
            assert!(stayline_auth::gateway::is_valid_socket_id(&new_socket_id()));
        }
    }

    #[test]
    fn subscription_needs_a_grant_for_this_socket() {
        let signer = signer();
        let now = test_epoch();
        let expires = now + Duration::minutes(5);
        let channel = "private-guest-booking-7";
        let auth = signer.sign("1.2", channel, expires).unwrap();

        assert_eq!(check_subscription(&signer, "1.2", channel, &auth, expires, now, 0, false), Ok(()));
        assert_eq!(
            check_subscription(&signer, "3.4", channel, &auth, expires, now, 0, false),
            Err(SubscribeRefusal::InvalidGrant)
        );
        assert_eq!(
            check_subscription(&signer, "1.2", "private-guest-booking-8", &auth, expires, now, 0, false),
            Err(SubscribeRefusal::InvalidGrant)
        );
        assert_eq!(
            check_subscription(&signer, "1.2", channel, &auth, expires, expires, 0, false),
            Err(SubscribeRefusal::InvalidGrant)
        );
    }

    #[test]
    fn subscription_count_is_capped() {
        let signer = signer();
        let now = test_epoch();
        let expires = now + Duration::minutes(5);
        let channel = "private-guest-booking-7";
        let auth = signer.sign("1.2", channel, expires).unwrap();
        let cap = MAX_SUBSCRIPTIONS_PER_SOCKET;

        assert_eq!(
            check_subscription(&signer, "1.2", channel, &auth, expires, now, cap, false),
            Err(SubscribeRefusal::TooManySubscriptions)
        );
        assert_eq!(check_subscription(&signer, "1.2", channel, &auth, expires, now, cap, true), Ok(()));
    }

    #[test]
    fn client_messages_parse() {
        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, ClientMessage::Ping);

        let sub: ClientMessage = serde_json::from_str(
            r#"{"type":"subscribe","channel":"c","auth":"k1:x","expires_at":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(sub, ClientMessage::Subscribe { ref channel, .. } if channel == "c"));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"publish"}"#).is_err());
    }

    #[test]
    fn server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMessage::SubscriptionError {
            channel: "c".to_string(),
            code: SubscribeRefusal::InvalidGrant.code(),
        })
        .unwrap();
        assert_eq!(json["type"], "subscription_error");
        assert_eq!(json["code"], "INVALID_GRANT");
    }

    async fn next_message(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
        tokio::time::timeout(StdDuration::from_secs(2), rx.recv())
            .await
            .expect("message within two seconds")
            .expect("forwarder still sending")
    }

    #[tokio::test]
    async fn forwarder_relays_until_the_grant_expires() {
        let hub = RelayHub::new();
        let channel = "private-guest-booking-3";
        let (tx, mut rx) = mpsc::channel(8);
        let (_deadline, deadline_rx) = watch::channel(Instant::now() + StdDuration::from_millis(150));
        let forwarder = spawn_forwarder(&hub, channel.to_string(), deadline_rx, tx).await;

        let envelope = Arc::new(envelope_for(&BookingFixture::new(3, "grand-plaza").build(), 1));
        hub.publish(channel, envelope.clone()).await;
        assert!(matches!(next_message(&mut rx).await, ServerMessage::Event { .. }));

        assert_eq!(
            next_message(&mut rx).await,
            ServerMessage::SubscriptionExpired {
                channel: channel.to_string()
            }
        );
        forwarder.await.unwrap();
        assert_eq!(hub.publish(channel, envelope).await, 0);
    }

    #[tokio::test]
    async fn renewed_grant_moves_the_cutoff() {
        let hub = RelayHub::new();
        let channel = "private-hotel-grand-plaza-chat";
        let (tx, mut rx) = mpsc::channel(8);
        let (deadline, deadline_rx) = watch::channel(Instant::now() + StdDuration::from_millis(100));
        let _forwarder = spawn_forwarder(&hub, channel.to_string(), deadline_rx, tx).await;

        deadline.send_replace(Instant::now() + StdDuration::from_millis(600));
        tokio::time::sleep(StdDuration::from_millis(200)).await;

        let envelope = Arc::new(envelope_for(&BookingFixture::new(4, "grand-plaza").build(), 1));
        hub.publish(channel, envelope).await;
        assert!(matches!(next_message(&mut rx).await, ServerMessage::Event { .. }));
        assert!(matches!(
            next_message(&mut rx).await,
            ServerMessage::SubscriptionExpired { .. }
        ));
    }

    #[test]
    fn past_grant_expiry_means_an_immediate_cutoff() {
        let now = test_epoch();
        let before = Instant::now();
        assert!(grant_deadline(now - Duration::minutes(1), now) <= Instant::now());
        assert!(grant_deadline(now + Duration::minutes(10), now) >= before + StdDuration::from_secs(599));
    }
}
