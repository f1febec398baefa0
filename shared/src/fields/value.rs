use std::any::Any;

use dobj_serde::{de_tagged, field_tag, field_tag_wire, ByteReader, ByteWriter, Serde, SerdeErr, WireType};

use crate::{
    channel::DeltaChannel,
    fields::{delta_writer, skip_unexpected, ErasedField},
    listeners::{ListenerKey, Listeners},
    message::MessageType,
    store::{field_key, StoreSerde},
    types::FieldId,
};

/// A single replicated value. The writer endpoint mutates through `set`,
/// which emits a `ValueChange` delta; the reading endpoint applies inbound
/// deltas and notifies `on_change` listeners. Values are resent whole;
/// there is no partial patching.
pub struct Value<T> {
    id: FieldId,
    name: &'static str,
    current: T,
    channel: DeltaChannel,
    changed: Listeners<T>,
}

impl<T> Value<T>
where
    T: Serde + StoreSerde + Default + Clone + PartialEq + 'static,
{
    pub fn with_id(id: FieldId, name: &'static str) -> Self {
        Self {
            id,
            name,
            current: T::default(),
            channel: DeltaChannel::detached(),
            changed: Listeners::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.current
    }

    /// Writer-only mutation. Emits a `ValueChange`, writes through to the
    /// document store when bound, and fires local listeners.
    pub fn set(&mut self, value: T) {
        self.channel.assert_writer("Value::set");
        self.current = value;

        let tag = field_tag(self.id, T::WIRE);
        let mut writer = delta_writer(MessageType::ValueChange, tag, self.current.byte_len());
        self.current.ser(&mut writer);
        self.channel.emit(writer.as_slice());

        self.channel
            .store_set(&field_key(self.name, self.id), self.current.to_store());
        self.changed.emit(&self.current);
    }

    pub fn on_change(&mut self, listener: impl Fn(&T) + 'static) -> ListenerKey {
        self.changed.add(listener)
    }

    pub fn unhook(&mut self, key: ListenerKey) {
        self.changed.remove(key);
    }
}

impl<T> ErasedField for Value<T>
where
    T: Serde + StoreSerde + Default + Clone + PartialEq + 'static,
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

    fn sync_wire(&self) -> Option<WireType> {
        Some(T::WIRE)
    }

    fn write_sync(&self, writer: &mut ByteWriter) {
        self.current.ser(writer);
    }

    fn sync_len(&self) -> usize {
        self.current.byte_len()
    }

    fn apply(
        &mut self,
        message: MessageType,
        tag: u32,
        reader: &mut ByteReader,
    ) -> Result<(), SerdeErr> {
        match message {
            MessageType::Sync => {
                let incoming: T = de_tagged(field_tag_wire(tag), reader, self.name)?;
                let changed = incoming != self.current;
                self.current = incoming;
                if changed {
                    self.changed.emit(&self.current);
                }
                Ok(())
            }
            MessageType::ValueChange => {
                let incoming: T = de_tagged(field_tag_wire(tag), reader, self.name)?;
                self.current = incoming;
                self.changed.emit(&self.current);
                Ok(())
            }
            other => skip_unexpected(self.name, other, tag, reader),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
