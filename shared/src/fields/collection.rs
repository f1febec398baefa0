use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures_util::future::{LocalBoxFuture, Shared};
use futures_util::FutureExt;

use dobj_serde::{ByteReader, SerdeErr};

use crate::{
    channel::DeltaChannel,
    error::{FriendlyError, ResolveError},
    fields::{skip_unexpected, ErasedField},
    message::MessageType,
    object::{AnyObjRef, DObject, ObjRef},
    path::Path,
    replica::Replica,
    types::{Backing, FieldId, HostType, PeerId},
};

/// Identity of a subscribing endpoint, as handed to access predicates.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub peer: PeerId,
    pub user_id: Option<String>,
}

pub type AccessPredicate = Rc<dyn Fn(&Subscriber, &str) -> LocalBoxFuture<'static, bool>>;
pub type Populator<T> = Rc<dyn Fn(ObjRef<T>) -> LocalBoxFuture<'static, ()>>;

type MemberFuture<T> = Shared<LocalBoxFuture<'static, ObjRef<T>>>;

/// A string-keyed subtree of child objects. Collections carry no direct
/// data over the wire; children are reached by path resolution. Each key
/// materialises at most once: the memo caches the in-flight future, so
/// concurrent resolvers of the same key share one construction and one
/// `populate` run.
pub struct DCollection<T: Replica + Default> {
    id: FieldId,
    name: &'static str,
    backing_override: Option<Backing>,
    can_access: Option<AccessPredicate>,
    populate: Option<Populator<T>>,
    state: Rc<RefCell<ColState<T>>>,
}

struct ColState<T: Replica + Default> {
    parent_path: Path,
    side: HostType,
    backing: Backing,
    members: HashMap<String, MemberFuture<T>>,
}

impl<T: Replica + Default> DCollection<T> {
    pub fn with_id(id: FieldId, name: &'static str) -> Self {
        Self {
            id,
            name,
            backing_override: None,
            can_access: None,
            populate: None,
            state: Rc::new(RefCell::new(ColState {
                parent_path: Path::root(),
                side: HostType::Client,
                backing: Backing::Server,
                members: HashMap::new(),
            })),
        }
    }

    /// Override the backing the subtree inherits from its parent.
    pub fn set_backing(&mut self, backing: Backing) {
        self.backing_override = Some(backing);
    }

    /// Gate child resolution per subscriber. Denial surfaces to the client
    /// as `SubscribeFailed { cause: "Access denied." }`.
    pub fn set_can_access(
        &mut self,
        predicate: impl Fn(&Subscriber, &str) -> LocalBoxFuture<'static, bool> + 'static,
    ) {
        self.can_access = Some(Rc::new(predicate));
    }

    /// Run once over each freshly materialised child, before any
    /// subscriber sees it.
    pub fn set_populate(
        &mut self,
        populate: impl Fn(ObjRef<T>) -> LocalBoxFuture<'static, ()> + 'static,
    ) {
        self.populate = Some(Rc::new(populate));
    }

    /// The child for `key`, if its materialisation already completed.
    pub fn resolved(&self, key: &str) -> Option<ObjRef<T>> {
        self.state
            .borrow()
            .members
            .get(key)
            .and_then(|member| member.peek().cloned())
    }

    pub fn resolved_keys(&self) -> Vec<String> {
        self.state.borrow().members.keys().cloned().collect()
    }
}

/// Per-key memo lookup, inserting the shared materialisation future on
/// first sight of a key.
fn member_future<T: Replica + Default>(
    state: &Rc<RefCell<ColState<T>>>,
    populate: Option<Populator<T>>,
    id: FieldId,
    name: &'static str,
    backing_override: Option<Backing>,
    key: String,
) -> MemberFuture<T> {
    let mut st = state.borrow_mut();
    if let Some(existing) = st.members.get(&key) {
        return existing.clone();
    }

    let path = st.parent_path.child(id, name, &key);
    let backing = backing_override.unwrap_or(st.backing);
    let side = st.side;
    let future = async move {
        let object = DObject::<T>::new(path, backing, side);
        if let Some(populate) = populate {
            populate(object.clone()).await;
        }
        object
    }
    .boxed_local()
    .shared();

    st.members.insert(key, future.clone());
    future
}

/// Erased surface the path resolver walks. `subscriber: None` is a trusted
/// local resolution that skips access checks.
pub trait ErasedCollection {
    fn resolve_child(
        &self,
        subscriber: Option<Subscriber>,
        key: String,
    ) -> LocalBoxFuture<'static, Result<AnyObjRef, ResolveError>>;
}

impl<T: Replica + Default> ErasedCollection for DCollection<T> {
    fn resolve_child(
        &self,
        subscriber: Option<Subscriber>,
        key: String,
    ) -> LocalBoxFuture<'static, Result<AnyObjRef, ResolveError>> {
        let can_access = self.can_access.clone();
        let populate = self.populate.clone();
        let state = self.state.clone();
        let id = self.id;
        let name = self.name;
        let backing_override = self.backing_override;

        async move {
            if let (Some(subscriber), Some(predicate)) =
                (subscriber.as_ref(), can_access.as_ref())
            {
                if !predicate(subscriber, &key).await {
                    return Err(ResolveError::AccessDenied(FriendlyError::new(
                        "Access denied.",
                    )));
                }
            }
            let member = member_future(&state, populate, id, name, backing_override, key);
            let object = member.await;
            let erased: AnyObjRef = object;
            Ok(erased)
        }
        .boxed_local()
    }
}

impl<T: Replica + Default> ErasedField for DCollection<T> {
    fn field_id(&self) -> FieldId {
        self.id
    }

    fn field_name(&self) -> &'static str {
        self.name
    }

    fn attach(&mut self, channel: &DeltaChannel) {
        let mut st = self.state.borrow_mut();
        st.parent_path = channel.path();
        st.side = channel.side();
        st.backing = channel.backing();
    }

    fn apply(
        &mut self,
        message: MessageType,
        tag: u32,
        reader: &mut ByteReader,
    ) -> Result<(), SerdeErr> {
        skip_unexpected(self.name, message, tag, reader)
    }

    fn as_collection(&self) -> Option<&dyn ErasedCollection> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
