use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;

use dobj_serde::{
    field_tag, field_tag_id, field_tag_wire, map_tag_id, ByteReader, ByteWriter, Serde, SerdeErr,
};

use crate::{
    channel::DeltaChannel,
    fields::ErasedCollection,
    listeners::{Disposer, ListenerKey, Listeners},
    message::MessageType,
    path::Path,
    replica::Replica,
    types::{Backing, FieldId, HostType, ObjectState, PeerId},
};

static NEXT_INSTANCE_KEY: AtomicU64 = AtomicU64::new(1);

/// Type-erased shared handle to a replicated object.
pub type AnyObjRef = Rc<RefCell<dyn AnyObject>>;

/// Typed shared handle.
pub type ObjRef<R> = Rc<RefCell<DObject<R>>>;

/// Per-object bookkeeping common to every replicated type: identity,
/// lifecycle state, the delta channel, and the listener registries the
/// session and client layers hook into.
pub struct ObjectCore {
    path: Path,
    backing: Backing,
    side: HostType,
    state: ObjectState,
    instance_key: u64,
    channel: DeltaChannel,
    state_listeners: Listeners<ObjectState>,
    subscribed: Listeners<PeerId>,
    unsubscribed: Listeners<PeerId>,
    disposer: Disposer,
}

impl ObjectCore {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backing(&self) -> Backing {
        self.backing
    }

    pub fn side(&self) -> HostType {
        self.side
    }

    pub fn state(&self) -> ObjectState {
        self.state
    }

    /// Process-unique key, used by sessions for reverse lookups.
    pub fn instance_key(&self) -> u64 {
        self.instance_key
    }

    pub fn channel(&self) -> DeltaChannel {
        self.channel.clone()
    }

    pub fn set_state(&mut self, state: ObjectState) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.state_listeners.emit(&state);
    }

    pub fn on_state(&mut self, listener: impl Fn(&ObjectState) + 'static) -> ListenerKey {
        self.state_listeners.add(listener)
    }

    /// Connection loss: a live replica goes quiet until the next sync.
    pub fn on_disconnect(&mut self) {
        if self.state == ObjectState::Active {
            self.set_state(ObjectState::Disconnected);
        }
    }

    pub fn add_dispose_hook(&mut self, hook: impl FnOnce() + 'static) {
        self.disposer.push(hook);
    }

    pub fn dispose(&mut self) {
        self.disposer.run();
        self.set_state(ObjectState::Disposed);
    }

    pub fn on_subscribed(&mut self, listener: impl Fn(&PeerId) + 'static) -> ListenerKey {
        self.subscribed.add(listener)
    }

    pub fn on_unsubscribed(&mut self, listener: impl Fn(&PeerId) + 'static) -> ListenerKey {
        self.unsubscribed.add(listener)
    }

    pub fn fire_subscribed(&mut self, peer: PeerId) {
        self.subscribed.emit(&peer);
    }

    pub fn fire_unsubscribed(&mut self, peer: PeerId) {
        self.unsubscribed.emit(&peer);
    }
}

/// A replicated object: the core plus the typed field table.
pub struct DObject<R: Replica> {
    core: ObjectCore,
    replica: R,
}

impl<R: Replica + Default> DObject<R> {
    /// Construct and attach the field table to a fresh delta channel. The
    /// writer endpoint is the server for server-backed objects and the
    /// client for store-backed ones.
    pub fn new(path: Path, backing: Backing, side: HostType) -> ObjRef<R> {
        let writer = matches!(
            (side, backing),
            (HostType::Server, Backing::Server) | (HostType::Client, Backing::Store)
        );
        let channel = DeltaChannel::detached();
        channel.configure(side, backing, writer, path.clone());

        let mut replica = R::default();
        for id in replica.field_ids() {
            if let Some(field) = replica.field_mut(id) {
                field.attach(&channel);
            }
        }

        let state = match side {
            HostType::Server => ObjectState::Active,
            HostType::Client => ObjectState::Resolving,
        };

        Rc::new(RefCell::new(Self {
            core: ObjectCore {
                path,
                backing,
                side,
                state,
                instance_key: NEXT_INSTANCE_KEY.fetch_add(1, Ordering::Relaxed),
                channel,
                state_listeners: Listeners::new(),
                subscribed: Listeners::new(),
                unsubscribed: Listeners::new(),
                disposer: Disposer::new(),
            },
            replica,
        }))
    }
}

impl<R: Replica> DObject<R> {
    pub fn replica(&self) -> &R {
        &self.replica
    }

    pub fn replica_mut(&mut self) -> &mut R {
        &mut self.replica
    }

    pub fn core(&self) -> &ObjectCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }
}

/// The erased surface the session, resolver and client layers work
/// against.
pub trait AnyObject: Any {
    fn core(&self) -> &ObjectCore;

    fn core_mut(&mut self) -> &mut ObjectCore;

    /// Full current state: `Sync`, then one `ValueChange`-style frame per
    /// sync-participating field, in ascending field-id order.
    fn encode_sync(&self, writer: &mut ByteWriter);

    /// Full inbound dispatch on the reading endpoint: `Sync` (diffing
    /// apply, transitions to Active), deltas, `QueueReceive`.
    fn client_decode(&mut self, reader: &mut ByteReader) -> Result<(), SerdeErr>;

    /// Upstream dispatch on the serving endpoint: `(field-tag, then payload)`
    /// queue posts.
    fn decode_post(&mut self, from: PeerId, reader: &mut ByteReader) -> Result<(), SerdeErr>;

    fn collection(&self, id: FieldId) -> Option<&dyn ErasedCollection>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<R: Replica + Default> AnyObject for DObject<R> {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn encode_sync(&self, writer: &mut ByteWriter) {
        MessageType::Sync.ser(writer);
        let mut ids = self.replica.field_ids();
        ids.sort_unstable();
        for id in ids {
            let Some(field) = self.replica.field(id) else {
                continue;
            };
            if let Some(wire) = field.sync_wire() {
                writer.write_var_u32(field_tag(id, wire));
                field.write_sync(writer);
            }
        }
    }

    fn client_decode(&mut self, reader: &mut ByteReader) -> Result<(), SerdeErr> {
        let message = MessageType::de(reader)?;

        if message != MessageType::Sync && self.core.state == ObjectState::Resolving {
            warn!(
                "{}: {:?} arrived before the initial sync, applying best-effort",
                self.core.path, message
            );
        }

        match message {
            MessageType::Sync => {
                while !reader.is_empty() {
                    let tag = reader.read_var_u32()?;
                    let id = field_tag_id(tag);
                    match self.replica.field_mut(id) {
                        Some(field) => field.apply(MessageType::Sync, tag, reader)?,
                        None => {
                            warn!(
                                "{}: sync carries unknown field id {}, skipping",
                                self.core.path, id
                            );
                            reader.skip(field_tag_wire(tag))?;
                        }
                    }
                }
                self.core.set_state(ObjectState::Active);
            }
            MessageType::MapSet => {
                let tag = reader.read_var_u32()?;
                let id = map_tag_id(tag);
                match self.replica.field_mut(id) {
                    Some(field) => field.apply(message, tag, reader)?,
                    None => {
                        warn!(
                            "{}: {:?} for unknown field id {}, skipping",
                            self.core.path, message, id
                        );
                        reader.skip(dobj_serde::map_tag_key(tag))?;
                        reader.skip(dobj_serde::map_tag_value(tag))?;
                    }
                }
            }
            MessageType::ValueChange
            | MessageType::SetAdd
            | MessageType::SetRemove
            | MessageType::MapRemove
            | MessageType::QueueReceive => {
                let tag = reader.read_var_u32()?;
                let id = field_tag_id(tag);
                match self.replica.field_mut(id) {
                    Some(field) => field.apply(message, tag, reader)?,
                    None => {
                        warn!(
                            "{}: {:?} for unknown field id {}, skipping",
                            self.core.path, message, id
                        );
                        reader.skip(field_tag_wire(tag))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn decode_post(&mut self, from: PeerId, reader: &mut ByteReader) -> Result<(), SerdeErr> {
        let tag = reader.read_var_u32()?;
        let id = field_tag_id(tag);
        match self.replica.field_mut(id) {
            Some(field) => field.decode_post(from, tag, reader),
            None => {
                warn!(
                    "{}: queue post for unknown field id {}, skipping",
                    self.core.path, id
                );
                reader.skip(field_tag_wire(tag))
            }
        }
    }

    fn collection(&self, id: FieldId) -> Option<&dyn ErasedCollection> {
        self.replica.field(id)?.as_collection()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
