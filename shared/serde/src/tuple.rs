use log::warn;

use crate::{
    error::SerdeErr,
    reader::ByteReader,
    serde::{de_tagged, Serde},
    wire::{tuple_header, WireType},
    writer::{var_u32_size, ByteWriter},
};

// Tuples: a frame containing one varint of packed component wire types
// (element 0 most significant, 2 bits each), then the component values.
// An empty frame decodes as a zero-initialised tuple with a warning.

impl<A, B> Serde for (A, B)
where
    A: Serde + Default,
    B: Serde + Default,
{
    const WIRE: WireType = WireType::ByteLength;

    fn ser(&self, writer: &mut ByteWriter) {
        let header = tuple_header(&[A::WIRE, B::WIRE]);
        let contents = var_u32_size(header) + self.0.byte_len() + self.1.byte_len();
        writer.write_var_u32(contents as u32);
        writer.write_var_u32(header);
        self.0.ser(writer);
        self.1.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut frame = reader.read_frame()?;
        if frame.is_empty() {
            warn!("tuple: empty frame, zero-initialising components");
            return Ok(Self::default());
        }
        let header = frame.read_var_u32()?;
        let first = de_tagged(WireType::from_bits(header >> 2), &mut frame, "tuple")?;
        let second = de_tagged(WireType::from_bits(header), &mut frame, "tuple")?;
        if !frame.is_empty() {
            warn!("tuple: {} trailing bytes ignored", frame.remaining());
        }
        Ok((first, second))
    }

    fn byte_len(&self) -> usize {
        let header = tuple_header(&[A::WIRE, B::WIRE]);
        let contents = var_u32_size(header) + self.0.byte_len() + self.1.byte_len();
        var_u32_size(contents as u32) + contents
    }
}

impl<A, B, C> Serde for (A, B, C)
where
    A: Serde + Default,
    B: Serde + Default,
    C: Serde + Default,
{
    const WIRE: WireType = WireType::ByteLength;

    fn ser(&self, writer: &mut ByteWriter) {
        let header = tuple_header(&[A::WIRE, B::WIRE, C::WIRE]);
        let contents =
            var_u32_size(header) + self.0.byte_len() + self.1.byte_len() + self.2.byte_len();
        writer.write_var_u32(contents as u32);
        writer.write_var_u32(header);
        self.0.ser(writer);
        self.1.ser(writer);
        self.2.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut frame = reader.read_frame()?;
        if frame.is_empty() {
            warn!("tuple: empty frame, zero-initialising components");
            return Ok(Self::default());
        }
        let header = frame.read_var_u32()?;
        let first = de_tagged(WireType::from_bits(header >> 4), &mut frame, "tuple")?;
        let second = de_tagged(WireType::from_bits(header >> 2), &mut frame, "tuple")?;
        let third = de_tagged(WireType::from_bits(header), &mut frame, "tuple")?;
        if !frame.is_empty() {
            warn!("tuple: {} trailing bytes ignored", frame.remaining());
        }
        Ok((first, second, third))
    }

    fn byte_len(&self) -> usize {
        let header = tuple_header(&[A::WIRE, B::WIRE, C::WIRE]);
        let contents =
            var_u32_size(header) + self.0.byte_len() + self.1.byte_len() + self.2.byte_len();
        var_u32_size(contents as u32) + contents
    }
}
