use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use serde_json::{json, Value as DocValue};
use uuid::Uuid;

use dobj_serde::Vector3;

use crate::{path::Path, types::FieldId};

/// Interface shape of the external document store. Semantics live on the
/// other side of this trait; the framework only issues field-level sets and
/// deletes so element-granular container updates never require a read.
pub trait StoreSink {
    fn set_field(&self, doc: &str, field: &str, value: DocValue);
    fn delete_field(&self, doc: &str, field: &str);
}

/// Document key for a store-backed object:
/// `{collection_field_name}${collection_field_id}/{key}` per path element,
/// joined with `/`, starting from the root.
pub fn doc_key(path: &Path) -> String {
    path.segments()
        .iter()
        .map(|seg| format!("{}${}/{}", seg.name, seg.collection_id, seg.key))
        .collect::<Vec<_>>()
        .join("/")
}

/// Document field name for a replicated field: `{field_name}${field_id}`.
pub fn field_key(name: &str, id: FieldId) -> String {
    format!("{}${}", name, id)
}

/// Projection of a replicated value into the store's document model.
/// Primitives and enums round-trip unchanged, arrays become lists, vec3
/// becomes `[x, y, z]` doubles, structs become nested `name$id`
/// dictionaries.
pub trait StoreSerde {
    fn to_store(&self) -> DocValue;

    /// String form used where the value names a document field segment
    /// (set elements, map keys).
    fn store_key(&self) -> String {
        match self.to_store() {
            DocValue::String(text) => text,
            other => other.to_string(),
        }
    }
}

macro_rules! store_primitive {
    ($($ty:ty),+) => {
        $(
            impl StoreSerde for $ty {
                fn to_store(&self) -> DocValue {
                    json!(self)
                }
            }
        )+
    };
}

store_primitive!(bool, u8, u16, u32, i8, i16, i32, f32, f64, String);

impl StoreSerde for char {
    fn to_store(&self) -> DocValue {
        DocValue::String(self.to_string())
    }
}

impl StoreSerde for Uuid {
    fn to_store(&self) -> DocValue {
        DocValue::String(self.to_string())
    }
}

impl StoreSerde for Vector3 {
    fn to_store(&self) -> DocValue {
        json!([self.x as f64, self.y as f64, self.z as f64])
    }
}

impl<T: StoreSerde> StoreSerde for Option<T> {
    fn to_store(&self) -> DocValue {
        match self {
            Some(value) => value.to_store(),
            None => DocValue::Null,
        }
    }
}

impl<T: StoreSerde> StoreSerde for Vec<T> {
    fn to_store(&self) -> DocValue {
        DocValue::Array(self.iter().map(StoreSerde::to_store).collect())
    }
}

impl<T: StoreSerde + Eq + Hash> StoreSerde for HashSet<T> {
    fn to_store(&self) -> DocValue {
        let mut map = serde_json::Map::new();
        for element in self {
            map.insert(element.store_key(), json!(true));
        }
        DocValue::Object(map)
    }
}

impl<K: StoreSerde + Eq + Hash, V: StoreSerde> StoreSerde for HashMap<K, V> {
    fn to_store(&self) -> DocValue {
        let mut map = serde_json::Map::new();
        for (key, value) in self {
            map.insert(key.store_key(), value.to_store());
        }
        DocValue::Object(map)
    }
}

/// Store projection for a `record!` type: a nested dictionary under the
/// same `name$id` convention.
#[macro_export]
macro_rules! store_record {
    ($name:ident { $( $fid:literal => $fname:ident ),+ $(,)? }) => {
        impl $crate::StoreSerde for $name {
            fn to_store(&self) -> $crate::DocValue {
                let mut map = ::serde_json::Map::new();
                $(
                    map.insert(
                        $crate::field_key(stringify!($fname), $fid),
                        $crate::StoreSerde::to_store(&self.$fname),
                    );
                )+
                $crate::DocValue::Object(map)
            }
        }
    };
}

/// In-memory sink for tests and local runs; flat `field` keys per document.
pub struct MemoryStore {
    docs: RefCell<HashMap<String, BTreeMap<String, DocValue>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RefCell::new(HashMap::new()),
        }
    }

    pub fn get(&self, doc: &str, field: &str) -> Option<DocValue> {
        self.docs.borrow().get(doc)?.get(field).cloned()
    }

    pub fn fields(&self, doc: &str) -> Vec<String> {
        self.docs
            .borrow()
            .get(doc)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreSink for MemoryStore {
    fn set_field(&self, doc: &str, field: &str, value: DocValue) {
        self.docs
            .borrow_mut()
            .entry(doc.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    fn delete_field(&self, doc: &str, field: &str) {
        if let Some(fields) = self.docs.borrow_mut().get_mut(doc) {
            fields.remove(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_key_joins_name_id_and_key() {
        let path = Path::root()
            .child(2, "rooms", "lobby")
            .child(4, "tables", "corner");
        assert_eq!(doc_key(&path), "rooms$2/lobby/tables$4/corner");
    }

    #[test]
    fn field_key_is_name_dollar_id() {
        assert_eq!(field_key("players", 2), "players$2");
    }

    #[test]
    fn sets_project_to_membership_maps() {
        let mut set = HashSet::new();
        set.insert(String::from("alice"));
        let value = set.to_store();
        assert_eq!(value, json!({ "alice": true }));
    }

    #[test]
    fn vector3_projects_to_a_triple() {
        let value = Vector3::new(1.0, 2.0, 3.0).to_store();
        assert_eq!(value, json!([1.0, 2.0, 3.0]));
    }

    #[test]
    fn memory_store_set_and_delete() {
        let store = MemoryStore::new();
        store.set_field("rooms$2/lobby", "name$1", json!("Lobby"));
        assert_eq!(store.get("rooms$2/lobby", "name$1"), Some(json!("Lobby")));
        store.delete_field("rooms$2/lobby", "name$1");
        assert_eq!(store.get("rooms$2/lobby", "name$1"), None);
    }
}
