use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedSender;

use dobj_shared::{var_u32_size, AnyObjRef, ByteWriter, ObjectId, PeerId};

/// One websocket connection's view of the object tree: the id maps in both
/// directions (populated only by subscription), the authenticated user,
/// and the outbound channel. The channel feeds a writer task that sends
/// one message at a time, so per-session ordering is the channel's FIFO
/// order.
pub struct Session {
    peer: PeerId,
    pub user_id: Option<String>,
    pub(crate) by_id: HashMap<ObjectId, AnyObjRef>,
    pub(crate) by_key: HashMap<u64, ObjectId>,
    out: UnboundedSender<Vec<u8>>,
}

impl Session {
    pub fn new(peer: PeerId, out: UnboundedSender<Vec<u8>>) -> Self {
        Self {
            peer,
            user_id: None,
            by_id: HashMap::new(),
            by_key: HashMap::new(),
            out,
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn object(&self, id: ObjectId) -> Option<AnyObjRef> {
        self.by_id.get(&id).cloned()
    }

    /// The session-local id of an object, by its instance key.
    pub fn id_of(&self, instance_key: u64) -> Option<ObjectId> {
        self.by_key.get(&instance_key).copied()
    }

    pub fn subscription_count(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn sender(&self) -> UnboundedSender<Vec<u8>> {
        self.out.clone()
    }

    /// Frame `(object_id, then payload)` and enqueue it on the send path.
    pub fn send(&self, object_id: ObjectId, payload: &[u8]) {
        let mut writer = ByteWriter::with_capacity(var_u32_size(object_id) + payload.len());
        writer.write_var_u32(object_id);
        writer.write_bytes(payload);
        let _ = self.out.send(writer.to_bytes());
    }
}
