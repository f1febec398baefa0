use dobj_serde::{ByteReader, ByteWriter, Serde, SerdeErr, WireType};

/// Discriminant opening every downstream payload. Upstream queue posts are
/// the one exception: they carry a bare field tag with no message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Sync = 0,
    ValueChange = 1,
    SetAdd = 2,
    SetRemove = 3,
    MapSet = 4,
    MapRemove = 5,
    QueueReceive = 6,
}

impl MessageType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(MessageType::Sync),
            1 => Some(MessageType::ValueChange),
            2 => Some(MessageType::SetAdd),
            3 => Some(MessageType::SetRemove),
            4 => Some(MessageType::MapSet),
            5 => Some(MessageType::MapRemove),
            6 => Some(MessageType::QueueReceive),
            _ => None,
        }
    }
}

impl Serde for MessageType {
    const WIRE: WireType = WireType::VarInt;

    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_var_u32(*self as u32);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let value = reader.read_var_u32()?;
        MessageType::from_u32(value).ok_or(SerdeErr::UnknownDiscriminant {
            context: "MessageType",
            value,
        })
    }

    fn byte_len(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_are_stable() {
        let all = [
            (MessageType::Sync, 0u32),
            (MessageType::ValueChange, 1),
            (MessageType::SetAdd, 2),
            (MessageType::SetRemove, 3),
            (MessageType::MapSet, 4),
            (MessageType::MapRemove, 5),
            (MessageType::QueueReceive, 6),
        ];
        for (message, value) in all {
            let mut writer = ByteWriter::new();
            message.ser(&mut writer);
            assert_eq!(writer.as_slice(), &[value as u8]);
            assert_eq!(MessageType::from_u32(value), Some(message));
        }
        assert_eq!(MessageType::from_u32(7), None);
    }
}
