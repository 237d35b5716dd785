use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex as StdMutex, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    futures::{SinkExt, StreamExt, future::BoxFuture, stream::SplitStream},
    tokio::{
        net::TcpStream,
        sync::{Mutex, mpsc, oneshot},
        task::JoinHandle,
        time::timeout,
    },
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
    tracing::{debug, info, trace, warn},
};

use {propwire_common::ApiError, propwire_config::RealtimeConfig, propwire_session::Session};

use crate::{
    auth::ChannelAuthorizer,
    protocol::{self, Channel, ConnectionEstablished, Frame},
    subscription::{EventHandlers, Registry, Subscription},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = StdMutex<HashMap<String, oneshot::Sender<()>>>;

/// Process-wide realtime channel manager.
///
/// Opens one connection lazily on the first `subscribe` and keeps it for
/// the process lifetime; `disconnect` is the explicit teardown. Cheap to
/// clone — clones share the connection, registry, and pending
/// confirmations.
#[derive(Clone)]
pub struct ChannelManager {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: RealtimeConfig,
    authorizer: ChannelAuthorizer,
    registry: Registry,
    conn: Mutex<Option<Connection>>,
    pending: Pending,
    /// Bumped on explicit disconnect and on every fresh dial so stale
    /// reconnect loops stand down instead of racing a newer connection.
    generation: AtomicU64,
}

struct Connection {
    socket_id: String,
    out: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl ChannelManager {
    /// `auth_endpoint` is the absolute URL of the backend's broadcast-auth
    /// route (API base joined with the configured auth path).
    pub fn new(
        cfg: RealtimeConfig,
        auth_endpoint: String,
        session: Arc<Session>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .build()
            .map_err(ApiError::network)?;
        let authorizer = ChannelAuthorizer::new(http, auth_endpoint, session);
        Ok(Self {
            inner: Arc::new(Inner {
                cfg,
                authorizer,
                registry: Registry::default(),
                conn: Mutex::new(None),
                pending: StdMutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        })
    }

    /// Bind handlers to a channel and wait for the transport to confirm.
    ///
    /// Re-subscribing a name that is already bound replaces its handlers
    /// (never stacks them). Private channels run the broadcast-auth round
    /// trip first; with no session token this fails with `Unauthenticated`
    /// before any transport activity.
    pub async fn subscribe(
        &self,
        channel: Channel,
        handlers: EventHandlers,
    ) -> Result<Subscription, ApiError> {
        if channel.is_private() && !self.inner.authorizer.session().is_authenticated() {
            return Err(ApiError::Unauthenticated);
        }

        let (socket_id, out) = self.ensure_connected().await?;
        let wire = channel.wire_name();

        let auth = if channel.is_private() {
            Some(self.inner.authorizer.authorize(&socket_id, &wire).await?)
        } else {
            None
        };

        if self.inner.registry.bind(&wire, handlers) {
            debug!(channel = %wire, "replacing existing channel binding");
        }

        let (tx, rx) = oneshot::channel();
        lock_pending(&self.inner.pending).insert(wire.clone(), tx);
        send_frame(&out, &Frame::subscribe(&wire, auth.as_deref()))?;

        let wait = Duration::from_secs(self.inner.cfg.connect_timeout_secs);
        match timeout(wait, rx).await {
            Ok(Ok(())) => {
                info!(channel = %wire, "channel bound");
                Ok(Subscription::new(channel, self.clone()))
            },
            Ok(Err(_)) => {
                self.abandon_bind(&wire);
                Err(ApiError::network(
                    "connection closed while awaiting subscription confirmation",
                ))
            },
            Err(_) => {
                self.abandon_bind(&wire);
                Err(ApiError::network(
                    "timed out waiting for subscription confirmation",
                ))
            },
        }
    }

    /// Unbind a channel. A name that is not bound is a no-op.
    pub async fn unsubscribe(&self, channel: &Channel) -> Result<(), ApiError> {
        let wire = channel.wire_name();
        if !self.inner.registry.unbind(&wire) {
            return Ok(());
        }
        if let Some(conn) = self.inner.conn.lock().await.as_ref() {
            // Best effort: the binding is already gone locally, so events
            // that race the unsubscribe frame are dropped by dispatch.
            let _ = send_frame(&conn.out, &Frame::unsubscribe(&wire));
        }
        debug!(channel = %wire, "channel unbound");
        Ok(())
    }

    pub fn is_subscribed(&self, channel: &Channel) -> bool {
        self.inner.registry.is_bound(&channel.wire_name())
    }

    /// Tear down the connection and every binding. Pending subscribes
    /// resolve as network errors; no reconnect is attempted.
    pub async fn disconnect(&self) {
        let mut guard = self.inner.conn.lock().await;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(conn) = guard.take() {
            conn.abort();
        }
        drop(guard);
        lock_pending(&self.inner.pending).clear();
        for name in self.inner.registry.bound_names() {
            self.inner.registry.unbind(&name);
        }
        info!("realtime connection closed");
    }

    fn abandon_bind(&self, wire: &str) {
        lock_pending(&self.inner.pending).remove(wire);
        self.inner.registry.unbind(wire);
    }

    async fn ensure_connected(
        &self,
    ) -> Result<(String, mpsc::UnboundedSender<Message>), ApiError> {
        let mut guard = self.inner.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            if !conn.reader.is_finished() {
                return Ok((conn.socket_id.clone(), conn.out.clone()));
            }
        }
        // A fresh dial supersedes any reconnect loop still backing off
        // for the previous connection: the moved generation stands it
        // down, keeping exactly one connection per process.
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let conn = dial(&self.inner, generation).await?;
        let handle = (conn.socket_id.clone(), conn.out.clone());
        if let Some(old) = guard.replace(conn) {
            old.abort();
        }
        Ok(handle)
    }
}

fn lock_pending(
    pending: &Pending,
) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<()>>> {
    match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn send_frame(out: &mpsc::UnboundedSender<Message>, frame: &Frame) -> Result<(), ApiError> {
    let payload = serde_json::to_string(frame).map_err(ApiError::network)?;
    out.send(Message::text(payload))
        .map_err(|_| ApiError::network("realtime connection closed"))
}

/// Open the WebSocket, complete the protocol handshake, and spawn the
/// writer and reader tasks. The reader owns reconnection on exit.
async fn dial(inner: &Arc<Inner>, generation: u64) -> Result<Connection, ApiError> {
    let connect_timeout = Duration::from_secs(inner.cfg.connect_timeout_secs);
    let url = inner.cfg.websocket_url();
    debug!(host = %inner.cfg.host, port = inner.cfg.port, "connecting realtime transport");

    let (ws, _response) = timeout(connect_timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| ApiError::network("realtime connect timed out"))?
        .map_err(ApiError::network)?;
    let (mut sink, mut stream) = ws.split();

    let established = timeout(connect_timeout, wait_for_established(&mut stream))
        .await
        .map_err(|_| ApiError::network("timed out waiting for connection_established"))??;

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let weak = Arc::downgrade(inner);
    let reader_out = out_tx.clone();
    let reader = tokio::spawn(async move {
        read_loop(stream, weak.clone(), reader_out).await;
        on_disconnect(weak, generation).await;
    });

    info!(socket_id = %established.socket_id, "realtime connection established");
    Ok(Connection {
        socket_id: established.socket_id,
        out: out_tx,
        reader,
        writer,
    })
}

async fn wait_for_established(
    stream: &mut SplitStream<WsStream>,
) -> Result<ConnectionEstablished, ApiError> {
    while let Some(msg) = stream.next().await {
        let msg = msg.map_err(ApiError::network)?;
        let Message::Text(text) = msg else { continue };
        let Ok(frame) = serde_json::from_str::<Frame>(text.as_str()) else {
            continue;
        };
        match frame.event.as_str() {
            protocol::EVENT_CONNECTION_ESTABLISHED => {
                let data = frame
                    .data
                    .ok_or_else(|| ApiError::network("connection_established without data"))?;
                return protocol::decode_data(&data).map_err(ApiError::network);
            },
            protocol::EVENT_ERROR => {
                return Err(ApiError::network(format!(
                    "server rejected connection: {:?}",
                    frame.data
                )));
            },
            _ => {},
        }
    }
    Err(ApiError::network("connection closed during handshake"))
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    inner: Weak<Inner>,
    out: mpsc::UnboundedSender<Message>,
) {
    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "realtime read error");
                break;
            },
        };
        match msg {
            Message::Text(text) => {
                let Some(inner) = inner.upgrade() else { break };
                handle_frame(&inner, &out, text.as_str());
            },
            Message::Ping(payload) => {
                let _ = out.send(Message::Pong(payload));
            },
            Message::Close(_) => {
                debug!("realtime connection closed by server");
                break;
            },
            _ => {},
        }
    }
}

fn handle_frame(inner: &Inner, out: &mpsc::UnboundedSender<Message>, raw: &str) {
    let frame: Frame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            trace!(error = %e, "ignoring unparseable frame");
            return;
        },
    };

    match frame.event.as_str() {
        protocol::EVENT_PING => {
            let _ = send_frame(out, &Frame::pong());
        },
        protocol::EVENT_SUBSCRIPTION_SUCCEEDED => {
            if let Some(channel) = frame.channel.as_deref() {
                if let Some(tx) = lock_pending(&inner.pending).remove(channel) {
                    let _ = tx.send(());
                }
            }
        },
        protocol::EVENT_ERROR => {
            warn!(data = ?frame.data, "server reported protocol error");
        },
        protocol::EVENT_CONNECTION_ESTABLISHED => {},
        event => {
            let Some(channel) = frame.channel.as_deref() else {
                trace!(event, "event without channel, dropping");
                return;
            };
            // Events arrive in transport delivery order per channel; no
            // local reordering or dedup.
            let payload = match frame.data.as_ref() {
                Some(data) => protocol::decode_data::<serde_json::Value>(data)
                    .unwrap_or_else(|_| data.clone()),
                None => serde_json::Value::Null,
            };
            inner.registry.dispatch(channel, event, payload);
        },
    }
}

/// Runs in the reader task after the stream ends. Unless the manager was
/// explicitly torn down, re-dial with capped backoff and re-run the bind
/// step for every registered channel (bind is idempotent; private channels
/// are re-authorized against the fresh socket id).
fn on_disconnect(inner: Weak<Inner>, generation: u64) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let Some(inner) = inner.upgrade() else { return };
        {
            // Generation moves only under this lock, so an equal value
            // here means no replacement connection has been installed.
            let mut guard = inner.conn.lock().await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            *guard = None;
        }
        lock_pending(&inner.pending).clear();
        if inner.registry.bound_names().is_empty() {
            debug!("realtime connection ended with no bindings");
            return;
        }
        warn!("realtime connection lost, reconnecting");

        let mut delay = Duration::from_secs(1);
        loop {
            tokio::time::sleep(delay).await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            match dial(&inner, generation).await {
                Ok(conn) => {
                    let mut guard = inner.conn.lock().await;
                    let superseded = inner.generation.load(Ordering::SeqCst) != generation
                        || guard.as_ref().is_some_and(|c| !c.reader.is_finished());
                    if superseded {
                        // A subscriber dialed its own replacement while
                        // this dial was in flight; that one stays.
                        conn.abort();
                        return;
                    }
                    let socket_id = conn.socket_id.clone();
                    let out = conn.out.clone();
                    if let Some(old) = guard.replace(conn) {
                        old.abort();
                    }
                    drop(guard);
                    resubscribe_all(&inner, &socket_id, &out).await;
                    info!("realtime connection re-established");
                    return;
                },
                Err(e) => {
                    warn!(error = %e, "reconnect attempt failed");
                    delay = (delay * 2).min(Duration::from_secs(30));
                },
            }
        }
    })
}

async fn resubscribe_all(inner: &Arc<Inner>, socket_id: &str, out: &mpsc::UnboundedSender<Message>) {
    for wire in inner.registry.bound_names() {
        let auth = if wire.starts_with("private-") {
            match inner.authorizer.authorize(socket_id, &wire).await {
                Ok(auth) => Some(auth),
                Err(e) => {
                    warn!(channel = %wire, error = %e, "re-authorization failed, dropping binding");
                    inner.registry.unbind(&wire);
                    continue;
                },
            }
        } else {
            None
        };
        let _ = send_frame(out, &Frame::subscribe(&wire, auth.as_deref()));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use {
        propwire_session::TokenStore,
        tempfile::tempdir,
        tokio::{net::TcpListener, sync::broadcast},
    };

    use super::*;

    /// Minimal Pusher-speaking server: counts accepted connections,
    /// confirms subscribes, drops the first connection right after its
    /// confirmation, and sends one `PropertyListed` event to every later
    /// connection per `events` signal.
    async fn spawn_stub_server(
        listener: TcpListener,
        accepted: Arc<AtomicUsize>,
        events: broadcast::Sender<()>,
    ) {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let n = accepted.fetch_add(1, Ordering::SeqCst) + 1;
            let mut events = events.subscribe();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let data = serde_json::json!({
                    "socket_id": format!("{n}.1"),
                    "activity_timeout": 120,
                })
                .to_string();
                let established = serde_json::json!({
                    "event": "pusher:connection_established",
                    "data": data,
                })
                .to_string();
                if ws.send(Message::text(established)).await.is_err() {
                    return;
                }

                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let frame: serde_json::Value =
                        serde_json::from_str(text.as_str()).unwrap_or_default();
                    if frame["event"] == protocol::EVENT_SUBSCRIBE {
                        let confirm = serde_json::json!({
                            "event": protocol::EVENT_SUBSCRIPTION_SUCCEEDED,
                            "channel": frame["data"]["channel"],
                            "data": "{}",
                        })
                        .to_string();
                        let _ = ws.send(Message::text(confirm)).await;
                        break;
                    }
                }

                if n == 1 {
                    let _ = ws.close(None).await;
                    return;
                }
                while events.recv().await.is_ok() {
                    let event = serde_json::json!({
                        "event": "PropertyListed",
                        "channel": "listings",
                        "data": "{}",
                    })
                    .to_string();
                    if ws.send(Message::text(event)).await.is_err() {
                        return;
                    }
                }
            });
        }
    }

    fn counting_handlers(hits: Arc<AtomicUsize>) -> EventHandlers {
        EventHandlers::new().on("PropertyListed", move |_payload| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn offline_manager(dir: &tempfile::TempDir) -> (ChannelManager, Arc<Session>) {
        let session = Arc::new(Session::new(TokenStore::with_path(
            dir.path().join("session.json"),
        )));
        let cfg = RealtimeConfig {
            // Reserved TEST-NET-1 address: nothing listens here, and the
            // Unauthenticated paths must fail before ever dialing it.
            host: "192.0.2.1".into(),
            port: 6001,
            tls: false,
            app_key: "test-key".into(),
            connect_timeout_secs: 1,
            ..RealtimeConfig::default()
        };
        let manager = ChannelManager::new(
            cfg,
            "http://192.0.2.1/api/broadcasting/auth".into(),
            session.clone(),
        )
        .unwrap();
        (manager, session)
    }

    #[tokio::test]
    async fn private_subscribe_without_token_fails_before_transport() {
        let dir = tempdir().unwrap();
        let (manager, _session) = offline_manager(&dir);

        let started = std::time::Instant::now();
        let err = manager
            .subscribe(Channel::private("chat.42"), EventHandlers::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthenticated));
        // Returned immediately: no connect attempt against the dead host.
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(!manager.is_subscribed(&Channel::private("chat.42")));
    }

    #[tokio::test]
    async fn unsubscribe_unbound_channel_is_a_noop() {
        let dir = tempdir().unwrap();
        let (manager, _session) = offline_manager(&dir);
        manager
            .unsubscribe(&Channel::private("chat.42"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn resubscribe_during_backoff_keeps_a_single_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let (event_tx, _) = broadcast::channel(4);
        tokio::spawn(spawn_stub_server(
            listener,
            accepted.clone(),
            event_tx.clone(),
        ));

        let dir = tempdir().unwrap();
        let session = Arc::new(Session::new(TokenStore::with_path(
            dir.path().join("session.json"),
        )));
        let cfg = RealtimeConfig {
            host: "127.0.0.1".into(),
            port,
            tls: false,
            app_key: "test-key".into(),
            connect_timeout_secs: 2,
            ..RealtimeConfig::default()
        };
        let manager =
            ChannelManager::new(cfg, "http://127.0.0.1/broadcasting/auth".into(), session)
                .unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let _first = manager
            .subscribe(Channel::public("listings"), counting_handlers(hits.clone()))
            .await
            .unwrap();

        // The server drops the first connection right after confirming;
        // re-subscribe while the reconnect loop is still backing off.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let second = manager
            .subscribe(Channel::public("listings"), counting_handlers(hits.clone()))
            .await
            .unwrap();

        // Wait past the first backoff window: the stood-down reconnect
        // loop must not dial a third connection behind the new one.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 2);

        let _ = event_tx.send(());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1, "event delivered once");

        second.unsubscribe().await.unwrap();
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn unreachable_transport_is_a_network_error() {
        let dir = tempdir().unwrap();
        let (manager, session) = offline_manager(&dir);
        session.set("tok123").unwrap();

        let err = manager
            .subscribe(Channel::public("listings"), EventHandlers::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
        // A dead transport never clears the session.
        assert!(session.is_authenticated());
    }
}
