use crate::{error::SerdeErr, wire::WireType};

/// Cursor over an immutable byte slice. Frames hand out sub-readers scoped
/// to the frame body, which keeps the position-after-skip law trivial: the
/// parent is already past the frame the moment the child is created.
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.buffer.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, SerdeErr> {
        if self.is_empty() {
            return Err(SerdeErr::UnexpectedEnd {
                wanted: 1,
                remaining: 0,
            });
        }
        let byte = self.buffer[self.position];
        self.position += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], SerdeErr> {
        if self.remaining() < count {
            return Err(SerdeErr::UnexpectedEnd {
                wanted: count,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.buffer[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Unsigned LEB128, rejecting encodings past the 32-bit range.
    pub fn read_var_u32(&mut self) -> Result<u32, SerdeErr> {
        let mut value: u32 = 0;
        for shift in 0..5 {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7f) as u32) << (shift * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(SerdeErr::VarIntOverflow)
    }

    pub fn read_zigzag_i32(&mut self) -> Result<i32, SerdeErr> {
        Ok(crate::writer::unzigzag_i32(self.read_var_u32()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, SerdeErr> {
        let bytes = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f64(&mut self) -> Result<f64, SerdeErr> {
        let bytes = self.read_bytes(8)?;
        Ok(f64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Read a `ByteLength` frame: varint length, then a sub-reader over
    /// exactly that many bytes. The parent advances past the frame body.
    pub fn read_frame(&mut self) -> Result<ByteReader<'a>, SerdeErr> {
        let length = self.read_var_u32()? as usize;
        let body = self.read_bytes(length)?;
        Ok(ByteReader::new(body))
    }

    /// Consume exactly one value of the given wire shape.
    pub fn skip(&mut self, wire: WireType) -> Result<(), SerdeErr> {
        match wire {
            WireType::VarInt => {
                self.read_var_u32()?;
            }
            WireType::FourByte => {
                self.read_bytes(4)?;
            }
            WireType::EightByte => {
                self.read_bytes(8)?;
            }
            WireType::ByteLength => {
                self.read_frame()?;
            }
        }
        Ok(())
    }
}
