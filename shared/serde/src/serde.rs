use log::warn;

use crate::{
    error::SerdeErr,
    reader::ByteReader,
    wire::WireType,
    writer::{var_u32_size, zigzag_i32, ByteWriter},
};

/// Value-form encoding: every implementation writes a self-delimiting value
/// (varints, fixed-size words, or a length-prefixed frame). `byte_len`
/// mirrors `ser` exactly so frame lengths can be pre-computed.
pub trait Serde: Sized {
    /// Wire shape of the value form, carried in tag words.
    const WIRE: WireType;

    fn ser(&self, writer: &mut ByteWriter);

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr>;

    fn byte_len(&self) -> usize;
}

/// Decode a value whose tag declared `wire`. A mismatch against the type's
/// own wire shape is non-fatal: the value is skipped and the default is
/// substituted, with a warning naming the caller's context.
pub fn de_tagged<T: Serde + Default>(
    wire: WireType,
    reader: &mut ByteReader,
    context: &'static str,
) -> Result<T, SerdeErr> {
    if wire != T::WIRE {
        warn!(
            "{}: wire type mismatch (expected {:?}, found {:?}), skipping value",
            context,
            T::WIRE,
            wire
        );
        reader.skip(wire)?;
        return Ok(T::default());
    }
    T::de(reader)
}

impl Serde for bool {
    const WIRE: WireType = WireType::VarInt;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_var_u32(u32::from(*self));
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(reader.read_var_u32()? != 0)
    }

    fn byte_len(&self) -> usize {
        1
    }
}

impl Serde for u8 {
    const WIRE: WireType = WireType::VarInt;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_var_u32(u32::from(*self));
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let value = reader.read_var_u32()?;
        match u8::try_from(value) {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!("u8: varint {} out of range, substituting default", value);
                Ok(0)
            }
        }
    }

    fn byte_len(&self) -> usize {
        var_u32_size(u32::from(*self))
    }
}

impl Serde for u16 {
    const WIRE: WireType = WireType::VarInt;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_var_u32(u32::from(*self));
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let value = reader.read_var_u32()?;
        match u16::try_from(value) {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!("u16: varint {} out of range, substituting default", value);
                Ok(0)
            }
        }
    }

    fn byte_len(&self) -> usize {
        var_u32_size(u32::from(*self))
    }
}

impl Serde for u32 {
    const WIRE: WireType = WireType::VarInt;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_var_u32(*self);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        reader.read_var_u32()
    }

    fn byte_len(&self) -> usize {
        var_u32_size(*self)
    }
}

impl Serde for char {
    const WIRE: WireType = WireType::VarInt;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_var_u32(*self as u32);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let value = reader.read_var_u32()?;
        match char::from_u32(value) {
            Some(value) => Ok(value),
            None => {
                warn!("char: {} is not a scalar value, substituting default", value);
                Ok(char::default())
            }
        }
    }

    fn byte_len(&self) -> usize {
        var_u32_size(*self as u32)
    }
}

impl Serde for i8 {
    const WIRE: WireType = WireType::VarInt;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_zigzag_i32(i32::from(*self));
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let value = reader.read_zigzag_i32()?;
        match i8::try_from(value) {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!("i8: zig-zag {} out of range, substituting default", value);
                Ok(0)
            }
        }
    }

    fn byte_len(&self) -> usize {
        var_u32_size(zigzag_i32(i32::from(*self)))
    }
}

impl Serde for i16 {
    const WIRE: WireType = WireType::VarInt;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_zigzag_i32(i32::from(*self));
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let value = reader.read_zigzag_i32()?;
        match i16::try_from(value) {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!("i16: zig-zag {} out of range, substituting default", value);
                Ok(0)
            }
        }
    }

    fn byte_len(&self) -> usize {
        var_u32_size(zigzag_i32(i32::from(*self)))
    }
}

impl Serde for i32 {
    const WIRE: WireType = WireType::VarInt;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_zigzag_i32(*self);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        reader.read_zigzag_i32()
    }

    fn byte_len(&self) -> usize {
        var_u32_size(zigzag_i32(*self))
    }
}

impl Serde for f32 {
    const WIRE: WireType = WireType::FourByte;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_f32(*self);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        reader.read_f32()
    }

    fn byte_len(&self) -> usize {
        4
    }
}

impl Serde for f64 {
    const WIRE: WireType = WireType::EightByte;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_f64(*self);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        reader.read_f64()
    }

    fn byte_len(&self) -> usize {
        8
    }
}

impl Serde for String {
    const WIRE: WireType = WireType::ByteLength;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_var_u32(self.len() as u32);
        writer.write_bytes(self.as_bytes());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut frame = reader.read_frame()?;
        let length = frame.remaining();
        let body = frame.read_bytes(length)?;
        String::from_utf8(body.to_vec()).map_err(|_| SerdeErr::BadUtf8)
    }

    fn byte_len(&self) -> usize {
        var_u32_size(self.len() as u32) + self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ByteReader;

    fn round_trip<T: Serde + PartialEq + std::fmt::Debug>(value: T) {
        let mut writer = ByteWriter::new();
        value.ser(&mut writer);
        assert_eq!(writer.len(), value.byte_len(), "size law for {:?}", value);
        let bytes = writer.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        let out = T::de(&mut reader).unwrap();
        assert_eq!(out, value);
        assert!(reader.is_empty());
    }

    #[test]
    fn primitive_round_trips() {
        round_trip(true);
        round_trip(false);
        round_trip(0u8);
        round_trip(255u8);
        round_trip(65_535u16);
        round_trip(0u32);
        round_trip(u32::MAX);
        round_trip('a');
        round_trip('€');
        round_trip(-1i8);
        round_trip(i16::MIN);
        round_trip(i32::MIN);
        round_trip(i32::MAX);
        round_trip(1.5f32);
        round_trip(-2.25f64);
        round_trip(String::from(""));
        round_trip(String::from("hello, wire"));
        round_trip(String::from("ünïcödé"));
    }

    #[test]
    fn mismatched_tag_skips_and_defaults() {
        let mut writer = ByteWriter::new();
        1.5f32.ser(&mut writer);
        7u32.ser(&mut writer);
        let bytes = writer.to_bytes();

        let mut reader = ByteReader::new(&bytes);
        // Tag said FourByte but the caller expects a varint type.
        let out: u32 = de_tagged(WireType::FourByte, &mut reader, "test").unwrap();
        assert_eq!(out, 0);
        // The skip consumed exactly the f32, leaving the varint intact.
        assert_eq!(u32::de(&mut reader).unwrap(), 7);
    }
}
