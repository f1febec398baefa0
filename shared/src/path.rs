use std::fmt;
use std::hash::{Hash, Hasher};

use dobj_serde::{ByteReader, ByteWriter, Serde, SerdeErr, WireType};

use crate::types::FieldId;

/// One step of a path: a collection field on the current object, and the
/// string key of the child within it. The collection's field name rides
/// along for the document-store key mapping but is not part of the path's
/// identity and does not travel on the wire; decoded paths carry empty
/// names, which is all the server-side resolver needs.
#[derive(Debug, Clone, Default)]
pub struct PathSeg {
    pub collection_id: FieldId,
    pub name: String,
    pub key: String,
}

impl PartialEq for PathSeg {
    fn eq(&self, other: &Self) -> bool {
        self.collection_id == other.collection_id && self.key == other.key
    }
}

impl Eq for PathSeg {}

impl Hash for PathSeg {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.collection_id.hash(state);
        self.key.hash(state);
    }
}

/// Root-relative locator of a replicated object: an ordered sequence of
/// `(collection_id, key)` pairs. The empty sequence names the root. Paths
/// are value types: two equal paths are interchangeable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<PathSeg>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    /// Extend with one more `(collection, key)` step.
    pub fn child(&self, collection_id: FieldId, name: &str, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSeg {
            collection_id,
            name: name.to_string(),
            key: key.to_string(),
        });
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSeg] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn wire_pairs(&self) -> Vec<(u32, String)> {
        self.segments
            .iter()
            .map(|seg| (seg.collection_id, seg.key.clone()))
            .collect()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for seg in &self.segments {
            if seg.name.is_empty() {
                write!(f, "/{}:{}", seg.collection_id, seg.key)?;
            } else {
                write!(f, "/{}:{}", seg.name, seg.key)?;
            }
        }
        Ok(())
    }
}

impl Serde for Path {
    const WIRE: WireType = WireType::ByteLength;

    fn ser(&self, writer: &mut ByteWriter) {
        self.wire_pairs().ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let pairs = Vec::<(u32, String)>::de(reader)?;
        Ok(Self {
            segments: pairs
                .into_iter()
                .map(|(collection_id, key)| PathSeg {
                    collection_id,
                    name: String::new(),
                    key,
                })
                .collect(),
        })
    }

    fn byte_len(&self) -> usize {
        self.wire_pairs().byte_len()
    }
}
