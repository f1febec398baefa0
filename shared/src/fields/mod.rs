use std::any::Any;

use log::warn;

use dobj_serde::{
    field_tag_wire, map_tag_key, map_tag_value, var_u32_size, ByteReader, ByteWriter, Serde,
    SerdeErr, WireType,
};

use crate::{
    channel::DeltaChannel,
    message::MessageType,
    types::{FieldId, PeerId},
};

mod collection;
mod map;
mod queue;
mod set;
mod value;

pub use collection::{DCollection, ErasedCollection, Subscriber};
pub use map::DMap;
pub use queue::Queue;
pub use set::DSet;
pub use value::Value;

/// Type-erased entry in an object's field table. The table is the dispatch
/// point for every inbound frame: the object reads the tag word, finds the
/// field by id, and hands over the reader positioned at the payload.
pub trait ErasedField: Any {
    fn field_id(&self) -> FieldId;

    fn field_name(&self) -> &'static str;

    /// Wire up the object's delta channel. Called once at object
    /// construction; a field mutated before attachment acts as a local,
    /// emission-free property.
    fn attach(&mut self, channel: &DeltaChannel);

    /// Wire shape of this field's entry in a `Sync` frame, or `None` for
    /// fields that carry no sync state (queues, collections).
    fn sync_wire(&self) -> Option<WireType> {
        None
    }

    fn write_sync(&self, writer: &mut ByteWriter) {
        let _ = writer;
    }

    fn sync_len(&self) -> usize {
        0
    }

    /// Apply one inbound frame, positioned just past the tag word. `Sync`
    /// entries diff against current state; deltas apply incrementally.
    fn apply(
        &mut self,
        message: MessageType,
        tag: u32,
        reader: &mut ByteReader,
    ) -> Result<(), SerdeErr>;

    /// Dispatch an upstream queue post. Non-queue fields warn and skip.
    fn decode_post(
        &mut self,
        from: PeerId,
        tag: u32,
        reader: &mut ByteReader,
    ) -> Result<(), SerdeErr> {
        let _ = from;
        warn!(
            "{}: queue post targeted a non-queue field, skipping",
            self.field_name()
        );
        reader.skip(field_tag_wire(tag))
    }

    fn as_collection(&self) -> Option<&dyn ErasedCollection> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Start a delta frame: message type, then the tag word. The caller
/// appends the payload and hands the buffer to the channel.
pub(crate) fn delta_writer(message: MessageType, tag: u32, payload_len: usize) -> ByteWriter {
    let mut writer = ByteWriter::with_capacity(1 + var_u32_size(tag) + payload_len);
    message.ser(&mut writer);
    writer.write_var_u32(tag);
    writer
}

/// A message kind this field has no reading for: consume exactly its bytes
/// and move on.
pub(crate) fn skip_unexpected(
    field: &'static str,
    message: MessageType,
    tag: u32,
    reader: &mut ByteReader,
) -> Result<(), SerdeErr> {
    warn!(
        "{}: cannot apply {:?} to this field kind, skipping",
        field, message
    );
    if message == MessageType::MapSet {
        reader.skip(map_tag_key(tag))?;
        reader.skip(map_tag_value(tag))?;
    } else {
        reader.skip(field_tag_wire(tag))?;
    }
    Ok(())
}
