use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use log::warn;

use crate::{
    error::SerdeErr,
    reader::ByteReader,
    serde::Serde,
    wire::{field_tag, map_tag, WireType},
    writer::{var_u32_size, ByteWriter},
};

// Arrays, lists, sets and bags share one layout: a frame whose first varint
// is an id-wire-type header (id 0 = null collection, id 1 = elements follow
// in a single shared wire type). A zero-length frame also reads as null.

const NON_NULL: u32 = 1;

fn seq_header<T: Serde>() -> u32 {
    field_tag(NON_NULL, T::WIRE)
}

fn seq_contents_len<'a, T: Serde + 'a>(elements: impl Iterator<Item = &'a T>) -> usize {
    var_u32_size(seq_header::<T>()) + elements.map(Serde::byte_len).sum::<usize>()
}

fn ser_seq<'a, T: Serde + 'a>(
    writer: &mut ByteWriter,
    contents_len: usize,
    elements: impl Iterator<Item = &'a T>,
) {
    writer.write_var_u32(contents_len as u32);
    writer.write_var_u32(seq_header::<T>());
    for element in elements {
        element.ser(writer);
    }
}

fn de_seq<T: Serde>(
    reader: &mut ByteReader,
    context: &'static str,
    mut push: impl FnMut(T),
) -> Result<(), SerdeErr> {
    let mut frame = reader.read_frame()?;
    if frame.is_empty() {
        return Ok(());
    }
    let header = frame.read_var_u32()?;
    match header >> 2 {
        0 => {
            if !frame.is_empty() {
                warn!(
                    "{}: null collection followed by {} spurious bytes",
                    context,
                    frame.remaining()
                );
            }
        }
        1 => {
            let wire = WireType::from_bits(header);
            if wire != T::WIRE {
                warn!(
                    "{}: element wire type mismatch (expected {:?}, found {:?}), dropping collection",
                    context,
                    T::WIRE,
                    wire
                );
                return Ok(());
            }
            while !frame.is_empty() {
                push(T::de(&mut frame)?);
            }
        }
        other => {
            warn!("{}: unknown collection header id {}", context, other);
        }
    }
    Ok(())
}

impl<T: Serde + Default> Serde for Vec<T> {
    const WIRE: WireType = WireType::ByteLength;

    fn ser(&self, writer: &mut ByteWriter) {
        ser_seq(writer, seq_contents_len(self.iter()), self.iter());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut out = Vec::new();
        de_seq(reader, "Vec", |element| out.push(element))?;
        Ok(out)
    }

    fn byte_len(&self) -> usize {
        let contents = seq_contents_len(self.iter());
        var_u32_size(contents as u32) + contents
    }
}

impl<T: Serde + Default + Eq + Hash> Serde for HashSet<T> {
    const WIRE: WireType = WireType::ByteLength;

    fn ser(&self, writer: &mut ByteWriter) {
        ser_seq(writer, seq_contents_len(self.iter()), self.iter());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut out = HashSet::new();
        de_seq(reader, "HashSet", |element| {
            out.insert(element);
        })?;
        Ok(out)
    }

    fn byte_len(&self) -> usize {
        let contents = seq_contents_len(self.iter());
        var_u32_size(contents as u32) + contents
    }
}

// Dictionaries: the header widens to id-key-value, then keys and values
// alternate.

impl<K, V> Serde for HashMap<K, V>
where
    K: Serde + Default + Eq + Hash,
    V: Serde + Default,
{
    const WIRE: WireType = WireType::ByteLength;

    fn ser(&self, writer: &mut ByteWriter) {
        let contents = map_contents_len(self);
        writer.write_var_u32(contents as u32);
        writer.write_var_u32(map_tag(NON_NULL, K::WIRE, V::WIRE));
        for (key, value) in self {
            key.ser(writer);
            value.ser(writer);
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut frame = reader.read_frame()?;
        let mut out = HashMap::new();
        if frame.is_empty() {
            return Ok(out);
        }
        let header = frame.read_var_u32()?;
        match header >> 4 {
            0 => {
                if !frame.is_empty() {
                    warn!(
                        "HashMap: null dictionary followed by {} spurious bytes",
                        frame.remaining()
                    );
                }
            }
            1 => {
                let key_wire = WireType::from_bits(header >> 2);
                let value_wire = WireType::from_bits(header);
                if key_wire != K::WIRE || value_wire != V::WIRE {
                    warn!(
                        "HashMap: entry wire types mismatch (expected {:?}/{:?}, found {:?}/{:?}), dropping dictionary",
                        K::WIRE,
                        V::WIRE,
                        key_wire,
                        value_wire
                    );
                    return Ok(out);
                }
                while !frame.is_empty() {
                    let key = K::de(&mut frame)?;
                    let value = V::de(&mut frame)?;
                    out.insert(key, value);
                }
            }
            other => {
                warn!("HashMap: unknown dictionary header id {}", other);
            }
        }
        Ok(out)
    }

    fn byte_len(&self) -> usize {
        let contents = map_contents_len(self);
        var_u32_size(contents as u32) + contents
    }
}

fn map_contents_len<K, V>(map: &HashMap<K, V>) -> usize
where
    K: Serde + Default + Eq + Hash,
    V: Serde + Default,
{
    var_u32_size(map_tag(NON_NULL, K::WIRE, V::WIRE))
        + map
            .iter()
            .map(|(key, value)| key.byte_len() + value.byte_len())
            .sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Serde + PartialEq + std::fmt::Debug>(value: T) {
        let mut writer = ByteWriter::new();
        value.ser(&mut writer);
        assert_eq!(writer.len(), value.byte_len());
        let bytes = writer.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(T::de(&mut reader).unwrap(), value);
        assert!(reader.is_empty());
    }

    #[test]
    fn vec_round_trip() {
        round_trip(Vec::<u32>::new());
        round_trip(vec![1u32, 2, 300, 40_000]);
        round_trip(vec![String::from("a"), String::from("bc")]);
        round_trip(vec![vec![1u8, 2], vec![], vec![3]]);
    }

    #[test]
    fn set_round_trip() {
        round_trip(HashSet::<String>::new());
        let mut set = HashSet::new();
        set.insert(String::from("alice"));
        set.insert(String::from("bob"));
        round_trip(set);
    }

    #[test]
    fn map_round_trip() {
        round_trip(HashMap::<String, u32>::new());
        let mut map = HashMap::new();
        map.insert(String::from("alice"), 7u32);
        map.insert(String::from("bob"), 3);
        round_trip(map);
    }

    #[test]
    fn zero_length_frame_reads_as_null() {
        let mut writer = ByteWriter::new();
        writer.write_var_u32(0);
        let bytes = writer.to_bytes();

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(Vec::<u32>::de(&mut reader).unwrap(), Vec::<u32>::new());

        let mut reader = ByteReader::new(&bytes);
        assert!(HashMap::<String, u32>::de(&mut reader).unwrap().is_empty());
    }

    #[test]
    fn null_header_reads_as_empty() {
        let mut writer = ByteWriter::new();
        writer.write_var_u32(1);
        writer.write_var_u32(0);
        let bytes = writer.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert!(Vec::<u32>::de(&mut reader).unwrap().is_empty());
        assert!(reader.is_empty());
    }

    #[test]
    fn element_wire_mismatch_drops_collection() {
        // Header claims FourByte elements; the reader expects varints.
        let mut writer = ByteWriter::new();
        let header = field_tag(1, WireType::FourByte);
        writer.write_var_u32(var_u32_size(header) as u32 + 4);
        writer.write_var_u32(header);
        writer.write_f32(9.0);
        let bytes = writer.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert!(Vec::<u32>::de(&mut reader).unwrap().is_empty());
        assert!(reader.is_empty());
    }
}
