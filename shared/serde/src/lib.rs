//! # dobj Serde
//! The self-describing tag/length wire codec shared between the dobj-server
//! & dobj-client crates: four wire types, LEB128/zig-zag integers, id-tagged
//! record fields, tuple wire-type packing and closed polymorphic subtype
//! sets. Codec failures are non-fatal wherever the wire shape allows
//! skipping; only truncated input is a hard error.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod collections;
mod error;
mod fixed;
mod reader;
mod record;
mod serde;
mod tuple;
mod wire;
mod writer;

pub use error::SerdeErr;
pub use fixed::Vector3;
pub use reader::ByteReader;
pub use record::{Nullable, Record};
pub use serde::{de_tagged, Serde};
pub use wire::{
    field_tag, field_tag_id, field_tag_wire, map_tag, map_tag_id, map_tag_key, map_tag_value,
    tuple_header, WireType,
};
pub use writer::{unzigzag_i32, var_u32_size, zigzag_i32, ByteWriter};

pub use uuid::Uuid;

#[doc(hidden)]
pub use log as __log;
