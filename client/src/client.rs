use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use log::warn;
use tokio::sync::mpsc::UnboundedSender;

use dobj_shared::{
    doc_key, AnyObjRef, AnyObject, Backing, DObject, HostType, KeyGenerator, MetaRequest,
    MetaResponse, ObjRef, ObjectId, Path, Replica, RootReplica, StoreBinding, StoreSink,
    SubscribeRequest, UnsubscribeRequest,
};

use crate::connection::{self, ConnState};
use crate::handle::Handle;

pub struct ClientConfig {
    /// Full websocket URL, e.g. `ws://127.0.0.1:8080/data`.
    pub url: String,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// The subscription client: owns the root object, the handle tables, the
/// id recycler and the reconnect state machine. One instance per process
/// is the intended shape; everything runs on the current thread and the
/// client must live inside a tokio `LocalSet`.
pub struct Client<R: RootReplica + Default> {
    inner: Rc<RefCell<ClientInner>>,
    root: ObjRef<R>,
}

impl<R: RootReplica + Default> Clone for Client<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            root: self.root.clone(),
        }
    }
}

pub(crate) struct PathRecord {
    pub id: ObjectId,
    pub typed: Box<dyn Any>,
}

pub(crate) struct ClientInner {
    pub url: String,
    pub state: ConnState,
    pub attempts: u32,
    pub reconnect: bool,
    pub epoch: u64,
    pub user_id: Option<String>,
    pub token: Option<String>,
    pub by_id: HashMap<ObjectId, Weak<RefCell<dyn AnyObject>>>,
    pub by_path: HashMap<Path, PathRecord>,
    pub ids: KeyGenerator,
    pub out: Option<UnboundedSender<Vec<u8>>>,
    pub store: Option<Rc<dyn StoreSink>>,
    pub meta_tap: Rc<RefCell<VecDeque<MetaResponse>>>,
    pub meta_post: Rc<dyn Fn(MetaRequest)>,
}

impl ClientInner {
    /// Live non-root handles on server-backed objects, the population
    /// that justifies holding a connection open.
    pub fn live_server_backed_non_root(&self) -> usize {
        self.by_id
            .iter()
            .filter(|(id, _)| **id != 0)
            .filter_map(|(_, weak)| weak.upgrade())
            .filter(|object| object.borrow().core().backing() == Backing::Server)
            .count()
    }
}

impl<R: RootReplica + Default> Client<R> {
    pub fn new(config: ClientConfig) -> Self {
        let root = DObject::<R>::new(Path::root(), Backing::Server, HostType::Client);

        let meta_tap = Rc::new(RefCell::new(VecDeque::new()));
        {
            let tap = meta_tap.clone();
            root.borrow_mut()
                .replica_mut()
                .meta_mut()
                .on_received(move |response| tap.borrow_mut().push_back(response.clone()));
        }

        let meta_post: Rc<dyn Fn(MetaRequest)> = {
            let root = root.clone();
            Rc::new(move |request| {
                root.borrow_mut().replica_mut().meta_mut().post(request);
            })
        };

        let mut ids = KeyGenerator::new();
        let root_id = ids.generate();
        debug_assert_eq!(root_id, 0, "the root object is always id 0");

        let mut by_id: HashMap<ObjectId, Weak<RefCell<dyn AnyObject>>> = HashMap::new();
        let erased: AnyObjRef = root.clone();
        by_id.insert(0, Rc::downgrade(&erased));

        let inner = Rc::new(RefCell::new(ClientInner {
            url: config.url,
            state: ConnState::Idle,
            attempts: 0,
            reconnect: true,
            epoch: 0,
            user_id: None,
            token: None,
            by_id,
            by_path: HashMap::new(),
            ids,
            out: None,
            store: None,
            meta_tap,
            meta_post,
        }));

        Self { inner, root }
    }

    pub fn root(&self) -> &ObjRef<R> {
        &self.root
    }

    /// Install the document-store sink used by store-backed objects.
    pub fn set_store(&self, store: Rc<dyn StoreSink>) {
        self.inner.borrow_mut().store = Some(store);
    }

    /// The authentication source reported a (new) identity: remember it,
    /// re-authenticate in place when connected, otherwise try to connect.
    pub fn update_auth(&self, user_id: impl Into<String>, token: impl Into<String>) {
        let open = {
            let mut inner = self.inner.borrow_mut();
            inner.user_id = Some(user_id.into());
            inner.token = Some(token.into());
            matches!(inner.state, ConnState::Open)
        };
        if open {
            connection::post_authenticate(&self.inner);
        } else {
            connection::maybe_connect(&self.inner);
        }
    }

    /// Resolve a path to a live handle, deduplicating against the path
    /// table. A fresh object registers in both tables, installs its
    /// dispose hook, and (when server-backed) subscribes immediately if
    /// the connection is up.
    pub fn resolve<T: Replica + Default>(&self, path: Path, backing: Backing) -> Handle<T> {
        {
            let inner = self.inner.borrow();
            if let Some(record) = inner.by_path.get(&path) {
                if let Some(weak) = record.typed.downcast_ref::<Weak<RefCell<DObject<T>>>>() {
                    if let Some(object) = weak.upgrade() {
                        return Handle::new(object, record.id);
                    }
                }
                warn!("{}: stale or mistyped path record, re-resolving", path);
            }
        }

        let object = DObject::<T>::new(path.clone(), backing, HostType::Client);
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.ids.generate();

            if backing == Backing::Store {
                match inner.store.clone() {
                    Some(sink) => object.borrow().core().channel().set_store(StoreBinding {
                        sink,
                        doc_key: doc_key(&path),
                    }),
                    None => warn!("{}: store-backed resolve without a store sink", path),
                }
            }

            let erased: AnyObjRef = object.clone();
            inner.by_id.insert(id, Rc::downgrade(&erased));
            inner.by_path.insert(
                path.clone(),
                PathRecord {
                    id,
                    typed: Box::new(Rc::downgrade(&object)),
                },
            );
            id
        };

        // Dispose hook: unmap, recycle the id, unsubscribe.
        {
            let weak_inner = Rc::downgrade(&self.inner);
            let hook_path = path.clone();
            object.borrow_mut().core_mut().add_dispose_hook(move || {
                if let Some(inner) = weak_inner.upgrade() {
                    on_handle_disposed(&inner, id, &hook_path);
                }
            });
        }

        if backing == Backing::Server {
            let open = matches!(self.inner.borrow().state, ConnState::Open);
            if open {
                let post = self.inner.borrow().meta_post.clone();
                post(MetaRequest::Subscribe(SubscribeRequest {
                    object_id: id,
                    path: path.clone(),
                }));
            } else {
                connection::maybe_connect(&self.inner);
            }
        }

        Handle::new(object, id)
    }

    /// Connection state, for diagnostics and tests.
    pub fn connection_state(&self) -> ConnState {
        self.inner.borrow().state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.borrow().attempts
    }

    /// Clear the reconnect flag, then close.
    pub fn dispose(&self) {
        self.inner.borrow_mut().reconnect = false;
        connection::close_connection(&self.inner);
    }
}

fn on_handle_disposed(inner: &Rc<RefCell<ClientInner>>, id: ObjectId, path: &Path) {
    let (open, post) = {
        let mut guard = inner.borrow_mut();
        guard.by_id.remove(&id);
        guard.by_path.remove(path);
        guard.ids.recycle(id);
        (
            matches!(guard.state, ConnState::Open),
            guard.meta_post.clone(),
        )
    };
    if open {
        post(MetaRequest::Unsubscribe(UnsubscribeRequest { object_id: id }));
    }
    connection::maybe_disconnect(inner);
}
