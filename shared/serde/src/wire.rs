/// The four wire shapes a value can take on the wire. The low two bits of
/// every tag word carry one of these; knowing it is sufficient to skip a
/// value without understanding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Unsigned LEB128 (zig-zag for signed sources)
    VarInt = 0,
    /// Little-endian 32-bit
    FourByte = 1,
    /// Little-endian 64-bit
    EightByte = 2,
    /// Varint length prefix followed by that many bytes
    ByteLength = 3,
}

impl WireType {
    /// Decode from the low two bits of a tag word. Total: every 2-bit
    /// pattern names a wire type.
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => WireType::VarInt,
            1 => WireType::FourByte,
            2 => WireType::EightByte,
            _ => WireType::ByteLength,
        }
    }

    pub fn bits(self) -> u32 {
        self as u32
    }
}

// Field tags: `(id << 2) | wire`.

pub fn field_tag(id: u32, wire: WireType) -> u32 {
    (id << 2) | wire.bits()
}

pub fn field_tag_id(tag: u32) -> u32 {
    tag >> 2
}

pub fn field_tag_wire(tag: u32) -> WireType {
    WireType::from_bits(tag)
}

// Map-entry tags: `(id << 4) | (key_wire << 2) | value_wire`.

pub fn map_tag(id: u32, key: WireType, value: WireType) -> u32 {
    (id << 4) | (key.bits() << 2) | value.bits()
}

pub fn map_tag_id(tag: u32) -> u32 {
    tag >> 4
}

pub fn map_tag_key(tag: u32) -> WireType {
    WireType::from_bits(tag >> 2)
}

pub fn map_tag_value(tag: u32) -> WireType {
    WireType::from_bits(tag)
}

/// Pack tuple component wire types into one varint word, element 0 in the
/// most significant position.
pub fn tuple_header(wires: &[WireType]) -> u32 {
    let mut header = 0u32;
    for wire in wires {
        header = (header << 2) | wire.bits();
    }
    header
}
