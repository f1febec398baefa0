use std::any::Any;

use dobj_serde::{de_tagged, field_tag, field_tag_wire, var_u32_size, ByteReader, ByteWriter, Serde, SerdeErr};

use crate::{
    channel::DeltaChannel,
    fields::{delta_writer, skip_unexpected, ErasedField},
    listeners::{ListenerKey, Listeners},
    message::MessageType,
    types::{Backing, FieldId, PeerId},
};

/// A bidirectional message channel. Clients `post` upstream messages, the
/// writer endpoint `broadcast`s or `send_to`s downstream ones. Queues hold
/// no state: messages are ephemeral and never appear in a `Sync`.
///
/// Upstream framing is the protocol's one exception: a post carries no
/// `MessageType`, just `(field-tag, then payload)`, and the receiving side
/// routes it through the field table's `decode_post`.
pub struct Queue<Up, Down> {
    id: FieldId,
    name: &'static str,
    channel: DeltaChannel,
    posted: Listeners<(PeerId, Up)>,
    received: Listeners<Down>,
}

impl<Up, Down> Queue<Up, Down>
where
    Up: Serde + Default + 'static,
    Down: Serde + Default + 'static,
{
    pub fn with_id(id: FieldId, name: &'static str) -> Self {
        Self {
            id,
            name,
            channel: DeltaChannel::detached(),
            posted: Listeners::new(),
            received: Listeners::new(),
        }
    }

    /// Client-only. Server-backed objects forward the message to the
    /// server; store-backed objects have no server and fire `on_posted`
    /// locally instead.
    pub fn post(&mut self, message: Up) {
        self.channel.assert_client("Queue::post");
        match self.channel.backing() {
            Backing::Server => {
                let tag = field_tag(self.id, Up::WIRE);
                let mut writer =
                    ByteWriter::with_capacity(var_u32_size(tag) + message.byte_len());
                writer.write_var_u32(tag);
                message.ser(&mut writer);
                self.channel.emit(writer.as_slice());
            }
            Backing::Store => {
                self.posted.emit(&(PeerId::LOCAL, message));
            }
        }
    }

    /// Writer-only. One `QueueReceive` through the object's delta channel,
    /// fanned out to every subscribed sink.
    pub fn broadcast(&mut self, message: Down) {
        self.channel.assert_writer("Queue::broadcast");
        let tag = field_tag(self.id, Down::WIRE);
        let mut writer = delta_writer(MessageType::QueueReceive, tag, message.byte_len());
        message.ser(&mut writer);
        self.channel.emit(writer.as_slice());
    }

    /// Writer-only. Same framing as `broadcast`, unicast to one peer.
    pub fn send_to(&mut self, peer: PeerId, message: Down) {
        self.channel.assert_writer("Queue::send_to");
        let tag = field_tag(self.id, Down::WIRE);
        let mut writer = delta_writer(MessageType::QueueReceive, tag, message.byte_len());
        message.ser(&mut writer);
        self.channel.emit_to(peer, writer.as_slice());
    }

    pub fn on_posted(&mut self, listener: impl Fn(&(PeerId, Up)) + 'static) -> ListenerKey {
        self.posted.add(listener)
    }

    pub fn on_received(&mut self, listener: impl Fn(&Down) + 'static) -> ListenerKey {
        self.received.add(listener)
    }
}

impl<Up, Down> ErasedField for Queue<Up, Down>
where
    Up: Serde + Default + 'static,
    Down: Serde + Default + 'static,
{
    fn field_id(&self) -> FieldId {
        self.id
    }

    fn field_name(&self) -> &'static str {
        self.name
    }

    fn attach(&mut self, channel: &DeltaChannel) {
        self.channel = channel.clone();
    }

    fn apply(
        &mut self,
        message: MessageType,
        tag: u32,
        reader: &mut ByteReader,
    ) -> Result<(), SerdeErr> {
        match message {
            MessageType::QueueReceive => {
                let incoming: Down = de_tagged(field_tag_wire(tag), reader, self.name)?;
                self.received.emit(&incoming);
                Ok(())
            }
            other => skip_unexpected(self.name, other, tag, reader),
        }
    }

    fn decode_post(
        &mut self,
        from: PeerId,
        tag: u32,
        reader: &mut ByteReader,
    ) -> Result<(), SerdeErr> {
        let incoming: Up = de_tagged(field_tag_wire(tag), reader, self.name)?;
        self.posted.emit(&(from, incoming));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
