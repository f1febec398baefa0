//! # dobj Shared
//! The distributed-object model and delta protocol shared between the
//! dobj-server & dobj-client crates: paths, typed fields with static
//! numeric ids, the object state machine, the meta-queue control protocol
//! and the document-store mapping.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use dobj_serde::{
    de_tagged, field_tag, field_tag_id, field_tag_wire, map_tag, map_tag_id, map_tag_key,
    map_tag_value, record, tuple_header, unzigzag_i32, var_u32_size, zigzag_i32, ByteReader,
    ByteWriter, Record, Serde, SerdeErr, Uuid, Vector3, WireType,
};

mod channel;
mod error;
mod fields;
mod key_generator;
mod listeners;
mod message;
mod meta;
mod object;
mod path;
mod replica;
mod store;
mod types;

pub use channel::{DeltaChannel, Sink, StoreBinding};
pub use error::{FriendlyError, ResolveError};
pub use fields::{DCollection, DMap, DSet, ErasedCollection, ErasedField, Queue, Subscriber, Value};
pub use key_generator::KeyGenerator;
pub use listeners::{Disposer, ListenerKey, Listeners};
pub use message::MessageType;
pub use meta::{
    Authenticate, AuthenticateFailed, MetaQueue, MetaRequest, MetaResponse, RootReplica,
    SubscribeFailed, SubscribeRequest, UnsubscribeRequest, META_QUEUE_FIELD,
};
pub use object::{AnyObjRef, AnyObject, DObject, ObjRef, ObjectCore};
pub use path::{Path, PathSeg};
pub use replica::Replica;
pub use store::{doc_key, field_key, MemoryStore, StoreSerde, StoreSink};
pub use types::{Backing, FieldId, HostType, ObjectId, ObjectState, PeerId};

#[doc(hidden)]
pub use serde_json::Value as DocValue;
