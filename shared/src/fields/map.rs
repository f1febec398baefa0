use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;

use dobj_serde::{
    de_tagged, field_tag, field_tag_wire, map_tag, map_tag_key, map_tag_value, ByteReader,
    ByteWriter, Serde, SerdeErr, WireType,
};

use crate::{
    channel::DeltaChannel,
    fields::{delta_writer, skip_unexpected, ErasedField},
    listeners::{ListenerKey, Listeners},
    message::MessageType,
    store::{field_key, StoreSerde},
    types::FieldId,
};

/// A key-unique mapping. Setting an entry to its current value is a no-op:
/// no delta, no event, on either endpoint.
pub struct DMap<K, V> {
    id: FieldId,
    name: &'static str,
    entries: HashMap<K, V>,
    channel: DeltaChannel,
    set_listeners: Listeners<(K, V)>,
    removed: Listeners<K>,
}

impl<K, V> DMap<K, V>
where
    K: Serde + StoreSerde + Default + Clone + Eq + Hash + 'static,
    V: Serde + StoreSerde + Default + Clone + PartialEq + 'static,
{
    pub fn with_id(id: FieldId, name: &'static str) -> Self {
        Self {
            id,
            name,
            entries: HashMap::new(),
            channel: DeltaChannel::detached(),
            set_listeners: Listeners::new(),
            removed: Listeners::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writer-only. Returns false (and stays silent) when the entry
    /// already holds this value.
    pub fn set(&mut self, key: K, value: V) -> bool {
        self.channel.assert_writer("DMap::set");
        if self.entries.get(&key) == Some(&value) {
            return false;
        }

        let tag = map_tag(self.id, K::WIRE, V::WIRE);
        let mut writer = delta_writer(
            MessageType::MapSet,
            tag,
            key.byte_len() + value.byte_len(),
        );
        key.ser(&mut writer);
        value.ser(&mut writer);
        self.channel.emit(writer.as_slice());

        self.channel.store_set(
            &format!("{}.{}", field_key(self.name, self.id), key.store_key()),
            value.to_store(),
        );

        self.entries.insert(key.clone(), value.clone());
        self.set_listeners.emit(&(key, value));
        true
    }

    /// Writer-only. Returns false when the key was absent.
    pub fn remove(&mut self, key: &K) -> bool {
        self.channel.assert_writer("DMap::remove");
        if self.entries.remove(key).is_none() {
            return false;
        }

        let tag = field_tag(self.id, K::WIRE);
        let mut writer = delta_writer(MessageType::MapRemove, tag, key.byte_len());
        key.ser(&mut writer);
        self.channel.emit(writer.as_slice());

        self.channel.store_delete(&format!(
            "{}.{}",
            field_key(self.name, self.id),
            key.store_key()
        ));

        self.removed.emit(key);
        true
    }

    pub fn on_set(&mut self, listener: impl Fn(&(K, V)) + 'static) -> ListenerKey {
        self.set_listeners.add(listener)
    }

    pub fn on_removed(&mut self, listener: impl Fn(&K) + 'static) -> ListenerKey {
        self.removed.add(listener)
    }
}

impl<K, V> ErasedField for DMap<K, V>
where
    K: Serde + StoreSerde + Default + Clone + Eq + Hash + 'static,
    V: Serde + StoreSerde + Default + Clone + PartialEq + 'static,
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
        self.entries.ser(writer);
    }

    fn sync_len(&self) -> usize {
        self.entries.byte_len()
    }

    fn apply(
        &mut self,
        message: MessageType,
        tag: u32,
        reader: &mut ByteReader,
    ) -> Result<(), SerdeErr> {
        match message {
            MessageType::Sync => {
                let incoming: HashMap<K, V> = de_tagged(field_tag_wire(tag), reader, self.name)?;
                let removed: Vec<K> = self
                    .entries
                    .keys()
                    .filter(|key| !incoming.contains_key(*key))
                    .cloned()
                    .collect();
                let set: Vec<(K, V)> = incoming
                    .iter()
                    .filter(|(key, value)| self.entries.get(*key) != Some(*value))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                self.entries = incoming;
                for key in &removed {
                    self.removed.emit(key);
                }
                for entry in &set {
                    self.set_listeners.emit(entry);
                }
                Ok(())
            }
            MessageType::MapSet => {
                let key: K = de_tagged(map_tag_key(tag), reader, self.name)?;
                let value: V = de_tagged(map_tag_value(tag), reader, self.name)?;
                if self.entries.get(&key) != Some(&value) {
                    self.entries.insert(key.clone(), value.clone());
                    self.set_listeners.emit(&(key, value));
                }
                Ok(())
            }
            MessageType::MapRemove => {
                let key: K = de_tagged(field_tag_wire(tag), reader, self.name)?;
                if self.entries.remove(&key).is_some() {
                    self.removed.emit(&key);
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
