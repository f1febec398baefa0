use std::any::Any;
use std::collections::HashSet;
use std::hash::Hash;

use serde_json::json;

use dobj_serde::{de_tagged, field_tag, field_tag_wire, ByteReader, ByteWriter, Serde, SerdeErr, WireType};

use crate::{
    channel::DeltaChannel,
    fields::{delta_writer, skip_unexpected, ErasedField},
    listeners::{ListenerKey, Listeners},
    message::MessageType,
    store::{field_key, StoreSerde},
    types::FieldId,
};

/// An unordered unique set. Writer-side `add`/`remove` short-circuit
/// no-ops (adding a present element or removing an absent one emits
/// nothing and fires nothing), and the reading side applies the same rule
/// to inbound deltas.
pub struct DSet<T> {
    id: FieldId,
    name: &'static str,
    items: HashSet<T>,
    channel: DeltaChannel,
    added: Listeners<T>,
    removed: Listeners<T>,
}

impl<T> DSet<T>
where
    T: Serde + StoreSerde + Default + Clone + Eq + Hash + 'static,
{
    pub fn with_id(id: FieldId, name: &'static str) -> Self {
        Self {
            id,
            name,
            items: HashSet::new(),
            channel: DeltaChannel::detached(),
            added: Listeners::new(),
            removed: Listeners::new(),
        }
    }

    pub fn contains(&self, element: &T) -> bool {
        self.items.contains(element)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Writer-only. Returns false (and stays silent) when the element is
    /// already present.
    pub fn add(&mut self, element: T) -> bool {
        self.channel.assert_writer("DSet::add");
        if self.items.contains(&element) {
            return false;
        }

        let tag = field_tag(self.id, T::WIRE);
        let mut writer = delta_writer(MessageType::SetAdd, tag, element.byte_len());
        element.ser(&mut writer);
        self.channel.emit(writer.as_slice());

        self.channel.store_set(
            &format!("{}.{}", field_key(self.name, self.id), element.store_key()),
            json!(true),
        );

        self.items.insert(element.clone());
        self.added.emit(&element);
        true
    }

    /// Writer-only. Returns false when the element was absent.
    pub fn remove(&mut self, element: &T) -> bool {
        self.channel.assert_writer("DSet::remove");
        if !self.items.remove(element) {
            return false;
        }

        let tag = field_tag(self.id, T::WIRE);
        let mut writer = delta_writer(MessageType::SetRemove, tag, element.byte_len());
        element.ser(&mut writer);
        self.channel.emit(writer.as_slice());

        self.channel.store_delete(&format!(
            "{}.{}",
            field_key(self.name, self.id),
            element.store_key()
        ));

        self.removed.emit(element);
        true
    }

    pub fn on_added(&mut self, listener: impl Fn(&T) + 'static) -> ListenerKey {
        self.added.add(listener)
    }

    pub fn on_removed(&mut self, listener: impl Fn(&T) + 'static) -> ListenerKey {
        self.removed.add(listener)
    }
}

impl<T> ErasedField for DSet<T>
where
    T: Serde + StoreSerde + Default + Clone + Eq + Hash + 'static,
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
        Some(WireType::ByteLength)
    }

    fn write_sync(&self, writer: &mut ByteWriter) {
        self.items.ser(writer);
    }

    fn sync_len(&self) -> usize {
        self.items.byte_len()
    }

    fn apply(
        &mut self,
        message: MessageType,
        tag: u32,
        reader: &mut ByteReader,
    ) -> Result<(), SerdeErr> {
        match message {
            MessageType::Sync => {
                let incoming: HashSet<T> = de_tagged(field_tag_wire(tag), reader, self.name)?;
                let removed: Vec<T> = self.items.difference(&incoming).cloned().collect();
                let added: Vec<T> = incoming.difference(&self.items).cloned().collect();
                self.items = incoming;
                for element in &removed {
                    self.removed.emit(element);
                }
                for element in &added {
                    self.added.emit(element);
                }
                Ok(())
            }
            MessageType::SetAdd => {
                let element: T = de_tagged(field_tag_wire(tag), reader, self.name)?;
                if self.items.insert(element.clone()) {
                    self.added.emit(&element);
                }
                Ok(())
            }
            MessageType::SetRemove => {
                let element: T = de_tagged(field_tag_wire(tag), reader, self.name)?;
                if self.items.remove(&element) {
                    self.removed.emit(&element);
                }
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
