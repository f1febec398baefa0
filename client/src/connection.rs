use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::spawn_local;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use dobj_shared::{
    var_u32_size, AnyObjRef, Authenticate, Backing, ByteReader, ByteWriter, MetaRequest,
    MetaResponse, ObjectId, ObjectState, Path, PeerId, SubscribeRequest,
};

use crate::client::ClientInner;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle. `Reconnecting` is the backoff sleep between a
/// close and the next dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Idle,
    Connecting,
    Open,
    Closed,
    Reconnecting,
}

/// Sink key under which the connection registers on each object's delta
/// channel.
const CONNECTION_SINK: PeerId = PeerId(0);

/// Reconnect delay: `min(2^attempts, 2^9)` seconds, so roughly
/// 1s, 2s, 4s, … capped at 512s.
pub fn backoff_delay(attempts: u32) -> Duration {
    Duration::from_secs(1u64 << attempts.min(9))
}

/// Dial iff not already connecting/open, a user id is known, and at least
/// one server-backed non-root object is alive. The root alone is not
/// worth a connection.
pub(crate) fn maybe_connect(inner: &Rc<RefCell<ClientInner>>) {
    let (url, epoch) = {
        let mut guard = inner.borrow_mut();
        if matches!(guard.state, ConnState::Connecting | ConnState::Open) {
            return;
        }
        if guard.user_id.is_none() {
            return;
        }
        if guard.live_server_backed_non_root() == 0 {
            return;
        }
        guard.state = ConnState::Connecting;
        guard.epoch += 1;
        (guard.url.clone(), guard.epoch)
    };
    let inner = inner.clone();
    spawn_local(async move { dial(inner, url, epoch).await });
}

/// Close iff open and the only remaining live object is the root.
pub(crate) fn maybe_disconnect(inner: &Rc<RefCell<ClientInner>>) {
    let should_close = {
        let guard = inner.borrow();
        matches!(guard.state, ConnState::Open) && guard.live_server_backed_non_root() == 0
    };
    if should_close {
        close_connection(inner);
    }
}

/// Tear the connection down now: invalidate in-flight pumps, drop the
/// writer, detach sinks, and notify every live object.
pub(crate) fn close_connection(inner: &Rc<RefCell<ClientInner>>) {
    let objects: Vec<AnyObjRef> = {
        let mut guard = inner.borrow_mut();
        guard.epoch += 1;
        guard.out = None;
        guard.state = ConnState::Closed;
        guard.by_id.values().filter_map(Weak::upgrade).collect()
    };
    detach_and_notify(&objects);
}

async fn dial(inner: Rc<RefCell<ClientInner>>, url: String, epoch: u64) {
    info!("dialing {}", url);
    match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => on_open(inner, stream, epoch),
        Err(error) => {
            warn!("connect to {} failed: {}", url, error);
            on_close(&inner, epoch);
        }
    }
}

fn on_open(inner: Rc<RefCell<ClientInner>>, stream: WsStream, epoch: u64) {
    {
        let guard = inner.borrow();
        if guard.epoch != epoch || guard.state != ConnState::Connecting {
            return;
        }
    }

    let (mut sink_half, mut stream_half) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    {
        let mut guard = inner.borrow_mut();
        guard.state = ConnState::Open;
        guard.attempts = 0;
        guard.out = Some(tx.clone());
    }
    info!("connection open");

    // Writer task: one outstanding send at a time, FIFO behind it.
    spawn_local(async move {
        while let Some(bytes) = rx.recv().await {
            if sink_half.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
        let _ = sink_half.close().await;
    });

    attach_sinks(&inner, &tx);
    post_authenticate(&inner);
    post_live_subscribes(&inner);

    // Reader pump: errors are information, the close drives the retry.
    let pump_inner = inner.clone();
    spawn_local(async move {
        while let Some(message) = stream_half.next().await {
            match message {
                Ok(Message::Binary(data)) => {
                    let bytes: Vec<u8> = data.into();
                    dispatch_frame(&pump_inner, &bytes);
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(error) => {
                    warn!("websocket error: {}", error);
                    break;
                }
            }
        }
        on_close(&pump_inner, epoch);
    });
}

fn on_close(inner: &Rc<RefCell<ClientInner>>, epoch: u64) {
    let (objects, retry) = {
        let mut guard = inner.borrow_mut();
        if guard.epoch != epoch {
            return;
        }
        guard.out = None;
        guard.state = ConnState::Closed;
        let objects: Vec<AnyObjRef> = guard.by_id.values().filter_map(Weak::upgrade).collect();

        let retry = if guard.reconnect && guard.live_server_backed_non_root() > 0 {
            let delay = backoff_delay(guard.attempts);
            guard.attempts += 1;
            guard.state = ConnState::Reconnecting;
            Some((delay, guard.epoch))
        } else {
            None
        };
        (objects, retry)
    };

    detach_and_notify(&objects);

    if let Some((delay, epoch)) = retry {
        info!("reconnecting in {:?}", delay);
        let inner = inner.clone();
        spawn_local(async move {
            tokio::time::sleep(delay).await;
            let dial_args = {
                let mut guard = inner.borrow_mut();
                if guard.epoch != epoch || guard.state != ConnState::Reconnecting {
                    return;
                }
                guard.state = ConnState::Connecting;
                guard.epoch += 1;
                (guard.url.clone(), guard.epoch)
            };
            dial(inner, dial_args.0, dial_args.1).await;
        });
    }
}

fn detach_and_notify(objects: &[AnyObjRef]) {
    for object in objects {
        object.borrow().core().channel().remove_sink(CONNECTION_SINK);
    }
    for object in objects {
        object.borrow_mut().core_mut().on_disconnect();
    }
}

/// Register the connection as a sink on every live object: each emitted
/// payload goes out framed `(object_id, then payload)`.
fn attach_sinks(inner: &Rc<RefCell<ClientInner>>, tx: &UnboundedSender<Vec<u8>>) {
    let objects: Vec<(ObjectId, AnyObjRef)> = inner
        .borrow()
        .by_id
        .iter()
        .filter_map(|(id, weak)| weak.upgrade().map(|object| (*id, object)))
        .collect();
    for (id, object) in objects {
        let tx = tx.clone();
        object.borrow().core().channel().add_sink(
            CONNECTION_SINK,
            Rc::new(move |payload: &[u8]| {
                let mut writer = ByteWriter::with_capacity(var_u32_size(id) + payload.len());
                writer.write_var_u32(id);
                writer.write_bytes(payload);
                let _ = tx.send(writer.to_bytes());
            }),
        );
    }
}

pub(crate) fn post_authenticate(inner: &Rc<RefCell<ClientInner>>) {
    let (user_id, token, post) = {
        let guard = inner.borrow();
        let Some(user_id) = guard.user_id.clone() else {
            return;
        };
        (
            user_id,
            guard.token.clone().unwrap_or_default(),
            guard.meta_post.clone(),
        )
    };
    post(MetaRequest::Authenticate(Authenticate { user_id, token }));
}

fn post_live_subscribes(inner: &Rc<RefCell<ClientInner>>) {
    let (subscribes, post) = {
        let guard = inner.borrow();
        let mut subscribes: Vec<(ObjectId, Path)> = guard
            .by_id
            .iter()
            .filter(|(id, _)| **id != 0)
            .filter_map(|(id, weak)| weak.upgrade().map(|object| (*id, object)))
            .filter(|(_, object)| object.borrow().core().backing() == Backing::Server)
            .map(|(id, object)| (id, object.borrow().core().path().clone()))
            .collect();
        subscribes.sort_by_key(|(id, _)| *id);
        (subscribes, guard.meta_post.clone())
    };
    for (object_id, path) in subscribes {
        post(MetaRequest::Subscribe(SubscribeRequest { object_id, path }));
    }
}

/// One inbound frame: read the object id, look up the handle, hand the
/// rest to `client_decode`, then drain the meta tap.
pub(crate) fn dispatch_frame(inner: &Rc<RefCell<ClientInner>>, bytes: &[u8]) {
    let mut reader = ByteReader::new(bytes);
    let object_id = match reader.read_var_u32() {
        Ok(id) => id,
        Err(error) => {
            warn!("inbound frame with unreadable object id: {}", error);
            return;
        }
    };

    let object = {
        inner
            .borrow()
            .by_id
            .get(&object_id)
            .and_then(Weak::upgrade)
    };
    match object {
        Some(object) => {
            if let Err(error) = object.borrow_mut().client_decode(&mut reader) {
                warn!("object {}: decode failed: {}", object_id, error);
            }
        }
        // Ids race with just-unsubscribed objects; dropping is correct.
        None => warn!("message for unknown object id {}, dropping", object_id),
    }

    drain_meta(inner);
}

fn drain_meta(inner: &Rc<RefCell<ClientInner>>) {
    loop {
        let response = {
            let guard = inner.borrow();
            let popped = guard.meta_tap.borrow_mut().pop_front();
            popped
        };
        let Some(response) = response else {
            break;
        };
        match response {
            MetaResponse::SubscribeFailed(failed) => {
                warn!(
                    "subscribe failed for object {}: {}",
                    failed.object_id, failed.cause
                );
                let object = {
                    inner
                        .borrow()
                        .by_id
                        .get(&failed.object_id)
                        .and_then(Weak::upgrade)
                };
                if let Some(object) = object {
                    object
                        .borrow_mut()
                        .core_mut()
                        .set_state(ObjectState::Failed);
                }
            }
            MetaResponse::AuthenticateFailed(failed) => {
                warn!("authentication failed: {}", failed.cause);
            }
        }
    }
}
