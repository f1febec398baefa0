use dobj_serde::record;

use crate::{fields::Queue, path::Path, replica::Replica, types::FieldId};

/// Well-known field id of the meta queue on the root object. The meta
/// queue is the only transport for subscription control; there is no
/// other out-of-band control channel.
pub const META_QUEUE_FIELD: FieldId = 1;

record! {
    /// Declares (and on token refresh, re-declares) who this session is.
    pub struct Authenticate {
        1 => user_id: String,
        2 => token: String,
    }
}

record! {
    /// Attach the object at `path` to this session under the
    /// client-chosen id.
    pub struct SubscribeRequest {
        1 => object_id: u32,
        2 => path: Path,
    }
}

record! {
    pub struct UnsubscribeRequest {
        1 => object_id: u32,
    }
}

record! {
    pub enum MetaRequest {
        1 => Authenticate(Authenticate),
        2 => Subscribe(SubscribeRequest),
        3 => Unsubscribe(UnsubscribeRequest),
    }
}

record! {
    pub struct AuthenticateFailed {
        1 => cause: String,
    }
}

record! {
    pub struct SubscribeFailed {
        1 => object_id: u32,
        2 => cause: String,
    }
}

record! {
    pub enum MetaResponse {
        1 => AuthenticateFailed(AuthenticateFailed),
        2 => SubscribeFailed(SubscribeFailed),
    }
}

pub type MetaQueue = Queue<MetaRequest, MetaResponse>;

/// The root replica of a replicated tree must carry the meta queue at
/// `META_QUEUE_FIELD`.
pub trait RootReplica: Replica {
    fn meta(&self) -> &MetaQueue;

    fn meta_mut(&mut self) -> &mut MetaQueue;
}
