use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::spawn_local;
use tokio_tungstenite::tungstenite::Message;

use dobj_shared::{
    var_u32_size, AnyObjRef, Backing, ByteReader, ByteWriter, DObject, HostType, MetaRequest,
    MetaResponse, ObjRef, ObjectId, Path, PeerId, ResolveError, RootReplica, SubscribeFailed,
    SubscribeRequest, Subscriber,
};

use crate::resolver::resolve_path;
use crate::session::Session;

pub struct ServerConfig {
    /// Listen port; the `HTTP_PORT` environment variable, default 8080.
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("HTTP_PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(8080);
        Self { port }
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

pub(crate) struct ServerInner {
    pub sessions: HashMap<PeerId, Session>,
    pub next_peer: u64,
    pub meta_tap: Rc<RefCell<VecDeque<(PeerId, MetaRequest)>>>,
}

/// The authoritative endpoint: owns the root object, accepts websocket
/// sessions on `/data` (plain HTTP gets an empty 200 healthcheck), fans
/// deltas out to subscribers and serves the meta queue. Single-threaded:
/// run inside a tokio `LocalSet` on a current-thread runtime.
pub struct Server<R: RootReplica + Default> {
    root: ObjRef<R>,
    inner: Rc<RefCell<ServerInner>>,
}

impl<R: RootReplica + Default> Clone for Server<R> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<R: RootReplica + Default> Server<R> {
    pub fn new() -> Self {
        let root = DObject::<R>::new(Path::root(), Backing::Server, HostType::Server);

        let meta_tap = Rc::new(RefCell::new(VecDeque::new()));
        {
            let tap = meta_tap.clone();
            root.borrow_mut()
                .replica_mut()
                .meta_mut()
                .on_posted(move |(peer, request)| {
                    tap.borrow_mut().push_back((*peer, request.clone()));
                });
        }

        Self {
            root,
            inner: Rc::new(RefCell::new(ServerInner {
                sessions: HashMap::new(),
                next_peer: 0,
                meta_tap,
            })),
        }
    }

    pub fn root(&self) -> &ObjRef<R> {
        &self.root
    }

    /// Configure the root's field table (collection hooks, initial state)
    /// before listening.
    pub fn configure_root(&self, configure: impl FnOnce(&mut R)) {
        configure(self.root.borrow_mut().replica_mut());
    }

    /// Trusted local resolution: no access checks, same memoisation.
    pub async fn resolve(&self, path: &Path) -> Result<AnyObjRef, ResolveError> {
        let root: AnyObjRef = self.root.clone();
        resolve_path(root, None, path).await
    }

    pub fn session_count(&self) -> usize {
        self.inner.borrow().sessions.len()
    }

    /// Bind and start accepting. Returns the bound address; the accept
    /// loop runs as a local task for the life of the process.
    pub async fn listen(&self, addr: &str) -> io::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("listening on {}", local_addr);
        let server = self.clone();
        spawn_local(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer_addr)) => {
                        let server = server.clone();
                        spawn_local(async move {
                            server.handle_connection(stream, peer_addr).await;
                        });
                    }
                    Err(error) => {
                        warn!("accept failed: {}", error);
                    }
                }
            }
        });
        Ok(local_addr)
    }

    async fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) {
        // Classify without consuming: websocket upgrade on /data, or a
        // plain HTTP healthcheck.
        let mut head = String::new();
        for _ in 0..50 {
            let mut buffer = [0u8; 1024];
            let count = match stream.peek(&mut buffer).await {
                Ok(0) => return,
                Ok(count) => count,
                Err(_) => return,
            };
            head = String::from_utf8_lossy(&buffer[..count]).to_ascii_lowercase();
            if head.contains("\r\n\r\n") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        if !head.contains("upgrade: websocket") {
            respond_healthcheck(stream).await;
            return;
        }

        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(error) => {
                warn!("websocket handshake with {} failed: {}", peer_addr, error);
                return;
            }
        };
        self.run_session(ws, peer_addr).await;
    }

    async fn run_session(
        &self,
        ws: tokio_tungstenite::WebSocketStream<TcpStream>,
        peer_addr: SocketAddr,
    ) {
        let peer = {
            let mut inner = self.inner.borrow_mut();
            inner.next_peer += 1;
            PeerId(inner.next_peer)
        };

        let (mut sink_half, mut stream_half) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        // Send path: the channel is the FIFO queue, the single task the
        // single outstanding write.
        spawn_local(async move {
            while let Some(bytes) = rx.recv().await {
                if sink_half.send(Message::Binary(bytes.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink_half.close().await;
        });

        self.inner
            .borrow_mut()
            .sessions
            .insert(peer, Session::new(peer, tx));
        info!("session {:?} open from {}", peer, peer_addr);

        // The root rides under id 0 on every session, which is what makes
        // the meta queue reachable before anything else.
        let root: AnyObjRef = self.root.clone();
        self.subscribe_to_object(peer, 0, root);

        while let Some(message) = stream_half.next().await {
            match message {
                Ok(Message::Binary(data)) => {
                    let bytes: Vec<u8> = data.into();
                    self.handle_frame(peer, &bytes);
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(error) => {
                    warn!("session {:?}: websocket error: {}", peer, error);
                    break;
                }
            }
        }

        self.close_session(peer);
    }

    /// Register both direction maps, hook the object's delta channel so
    /// every emitted payload goes out framed `(id, then payload)`, enqueue the
    /// initial `Sync`, and fire `subscribed`. The per-session FIFO
    /// guarantees the sync precedes any delta emitted afterwards.
    pub fn subscribe_to_object(&self, peer: PeerId, id: ObjectId, object: AnyObjRef) {
        let out = {
            let mut inner = self.inner.borrow_mut();
            let Some(session) = inner.sessions.get_mut(&peer) else {
                return;
            };
            if session.by_id.contains_key(&id) {
                warn!("session {:?}: id {} already subscribed", peer, id);
                return;
            }
            session.by_id.insert(id, object.clone());
            session
                .by_key
                .insert(object.borrow().core().instance_key(), id);
            session.sender()
        };

        {
            let tx = out.clone();
            object.borrow().core().channel().add_sink(
                peer,
                Rc::new(move |payload: &[u8]| {
                    let mut writer =
                        ByteWriter::with_capacity(var_u32_size(id) + payload.len());
                    writer.write_var_u32(id);
                    writer.write_bytes(payload);
                    let _ = tx.send(writer.to_bytes());
                }),
            );
        }

        let mut writer = ByteWriter::new();
        writer.write_var_u32(id);
        object.borrow().encode_sync(&mut writer);
        let _ = out.send(writer.to_bytes());

        object.borrow_mut().core_mut().fire_subscribed(peer);
    }

    pub fn unsubscribe_from_object(&self, peer: PeerId, id: ObjectId) {
        let object = {
            let mut inner = self.inner.borrow_mut();
            let Some(session) = inner.sessions.get_mut(&peer) else {
                return;
            };
            let Some(object) = session.by_id.remove(&id) else {
                warn!("session {:?}: unsubscribe for unknown id {}", peer, id);
                return;
            };
            session
                .by_key
                .remove(&object.borrow().core().instance_key());
            object
        };
        object.borrow().core().channel().remove_sink(peer);
        object.borrow_mut().core_mut().fire_unsubscribed(peer);
    }

    fn close_session(&self, peer: PeerId) {
        let session = self.inner.borrow_mut().sessions.remove(&peer);
        let Some(session) = session else {
            return;
        };
        for (_, object) in session.by_id.iter() {
            object.borrow().core().channel().remove_sink(peer);
        }
        for (_, object) in session.by_id.iter() {
            object.borrow_mut().core_mut().fire_unsubscribed(peer);
        }
        info!("session {:?} closed", peer);
    }

    /// One inbound frame: `(object_id, then field-tag, then payload)`, always a
    /// queue post, dispatched through the target's field table.
    pub fn handle_frame(&self, peer: PeerId, bytes: &[u8]) {
        let mut reader = ByteReader::new(bytes);
        let object_id = match reader.read_var_u32() {
            Ok(id) => id,
            Err(error) => {
                warn!("session {:?}: unreadable object id: {}", peer, error);
                return;
            }
        };

        let object = {
            let inner = self.inner.borrow();
            inner
                .sessions
                .get(&peer)
                .and_then(|session| session.object(object_id))
        };
        match object {
            Some(object) => {
                if let Err(error) = object.borrow_mut().decode_post(peer, &mut reader) {
                    warn!(
                        "session {:?}: post to object {} failed: {}",
                        peer, object_id, error
                    );
                }
            }
            // Ids race with just-unsubscribed objects; drop, keep the
            // connection.
            None => warn!(
                "session {:?}: post for unknown object id {}, dropping",
                peer, object_id
            ),
        }

        self.drain_meta();
    }

    fn drain_meta(&self) {
        loop {
            let item = {
                let inner = self.inner.borrow();
                let popped = inner.meta_tap.borrow_mut().pop_front();
                popped
            };
            let Some((peer, request)) = item else {
                break;
            };
            match request {
                MetaRequest::Authenticate(auth) => {
                    // TODO: validate the token and derive the user id from
                    // it instead of trusting the declared one.
                    let mut inner = self.inner.borrow_mut();
                    if let Some(session) = inner.sessions.get_mut(&peer) {
                        info!("session {:?} authenticated as {}", peer, auth.user_id);
                        session.user_id = Some(auth.user_id);
                    }
                }
                MetaRequest::Subscribe(request) => self.spawn_subscribe(peer, request),
                MetaRequest::Unsubscribe(request) => {
                    self.unsubscribe_from_object(peer, request.object_id)
                }
            }
        }
    }

    fn spawn_subscribe(&self, peer: PeerId, request: SubscribeRequest) {
        let server = self.clone();
        spawn_local(async move {
            let subscriber = {
                let inner = server.inner.borrow();
                let Some(session) = inner.sessions.get(&peer) else {
                    return;
                };
                Subscriber {
                    peer,
                    user_id: session.user_id.clone(),
                }
            };

            let root: AnyObjRef = server.root.clone();
            match resolve_path(root, Some(subscriber), &request.path).await {
                Ok(object) => {
                    if server.inner.borrow().sessions.contains_key(&peer) {
                        server.subscribe_to_object(peer, request.object_id, object);
                    }
                }
                Err(ResolveError::AccessDenied(friendly)) => {
                    warn!(
                        "session {:?}: subscribe {} denied: {}",
                        peer, request.path, friendly
                    );
                    server.send_subscribe_failed(peer, request.object_id, friendly.cause);
                }
                Err(error) => {
                    // Not client-visible; the cause stays server-side.
                    warn!(
                        "session {:?}: subscribe {} failed: {}",
                        peer, request.path, error
                    );
                }
            }
        });
    }

    fn send_subscribe_failed(&self, peer: PeerId, object_id: ObjectId, cause: String) {
        self.root
            .borrow_mut()
            .replica_mut()
            .meta_mut()
            .send_to(peer, MetaResponse::SubscribeFailed(SubscribeFailed {
                object_id,
                cause,
            }));
    }
}

impl<R: RootReplica + Default> Default for Server<R> {
    fn default() -> Self {
        Self::new()
    }
}

async fn respond_healthcheck(mut stream: TcpStream) {
    let mut buffer = [0u8; 1024];
    let _ = stream.read(&mut buffer).await;
    let _ = stream
        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
        .await;
    let _ = stream.shutdown().await;
}
