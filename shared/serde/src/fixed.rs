use log::warn;
use uuid::Uuid;

use crate::{error::SerdeErr, reader::ByteReader, serde::Serde, wire::WireType, writer::ByteWriter};

/// Three single-precision components in a fixed 12-byte frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Serde for Vector3 {
    const WIRE: WireType = WireType::ByteLength;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_var_u32(12);
        writer.write_f32(self.x);
        writer.write_f32(self.y);
        writer.write_f32(self.z);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut frame = reader.read_frame()?;
        if frame.remaining() != 12 {
            warn!(
                "Vector3: expected a 12-byte frame, found {} bytes, substituting default",
                frame.remaining()
            );
            return Ok(Self::default());
        }
        Ok(Self {
            x: frame.read_f32()?,
            y: frame.read_f32()?,
            z: frame.read_f32()?,
        })
    }

    fn byte_len(&self) -> usize {
        13
    }
}

// GUIDs travel as their 16 raw bytes in a fixed frame.
impl Serde for Uuid {
    const WIRE: WireType = WireType::ByteLength;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_var_u32(16);
        writer.write_bytes(self.as_bytes());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut frame = reader.read_frame()?;
        if frame.remaining() != 16 {
            warn!(
                "Uuid: expected a 16-byte frame, found {} bytes, substituting nil",
                frame.remaining()
            );
            return Ok(Uuid::nil());
        }
        let bytes = frame.read_bytes(16)?;
        // Length is checked above, from_slice cannot fail here.
        Ok(Uuid::from_slice(bytes).unwrap_or_default())
    }

    fn byte_len(&self) -> usize {
        17
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector3_round_trip() {
        let value = Vector3::new(1.0, -2.5, 3.25);
        let mut writer = ByteWriter::new();
        value.ser(&mut writer);
        assert_eq!(writer.len(), value.byte_len());
        let bytes = writer.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(Vector3::de(&mut reader).unwrap(), value);
    }

    #[test]
    fn uuid_round_trip() {
        let value = Uuid::new_v4();
        let mut writer = ByteWriter::new();
        value.ser(&mut writer);
        assert_eq!(writer.len(), value.byte_len());
        let bytes = writer.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(Uuid::de(&mut reader).unwrap(), value);
    }

    #[test]
    fn bad_length_frame_substitutes_default() {
        let mut writer = ByteWriter::new();
        writer.write_var_u32(3);
        writer.write_bytes(&[1, 2, 3]);
        writer.write_var_u32(42);
        let bytes = writer.to_bytes();

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(Vector3::de(&mut reader).unwrap(), Vector3::default());
        // The malformed frame was fully consumed.
        assert_eq!(u32::de(&mut reader).unwrap(), 42);
    }
}
