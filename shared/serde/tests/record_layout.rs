use dobj_serde::{
    field_tag, record, ByteReader, ByteWriter, Record, Serde, Vector3, WireType,
};

record! {
    pub struct PlayerInfo {
        1 => display_name: String,
        2 => level: u32,
        3 => position: Vector3,
    }
}

record! {
    pub class Badge {
        1 => label: String,
        2 => tier: u8,
    }
}

record! {
    pub struct CircleData {
        1 => radius: f32,
    }
}

record! {
    pub struct RectData {
        1 => width: f32,
        2 => height: f32,
    }
}

record! {
    pub enum Shape {
        1 => Circle(CircleData),
        2 => Rect(RectData),
    }
}

fn round_trip<T: Serde + PartialEq + std::fmt::Debug>(value: T) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    value.ser(&mut writer);
    assert_eq!(writer.len(), value.byte_len(), "size law");
    let bytes = writer.to_bytes();
    let mut reader = ByteReader::new(&bytes);
    assert_eq!(T::de(&mut reader).unwrap(), value);
    assert!(reader.is_empty());
    bytes
}

#[test]
fn struct_round_trip() {
    round_trip(PlayerInfo {
        display_name: String::from("alice"),
        level: 9,
        position: Vector3::new(1.0, 2.0, 3.0),
    });
    round_trip(PlayerInfo::default());
}

#[test]
fn class_round_trip_and_null() {
    round_trip(Badge {
        label: String::from("gold"),
        tier: 3,
    });
    round_trip(Some(Badge {
        label: String::from("silver"),
        tier: 2,
    }));
    round_trip(Option::<Badge>::None);
}

#[test]
fn enum_round_trip_and_null() {
    round_trip(Shape::Circle(CircleData { radius: 2.0 }));
    round_trip(Shape::Rect(RectData {
        width: 4.0,
        height: 3.0,
    }));
    round_trip(Some(Shape::Circle(CircleData { radius: 1.0 })));
    round_trip(Option::<Shape>::None);
}

#[test]
fn unknown_fields_are_skipped() {
    // Encode a PlayerInfo, then append an unknown varint field (id 99) and
    // an unknown length-delimited field (id 100) inside the frame.
    let value = PlayerInfo {
        display_name: String::from("bob"),
        level: 4,
        position: Vector3::default(),
    };

    let mut contents = ByteWriter::new();
    value.write_fields(&mut contents);
    contents.write_var_u32(field_tag(99, WireType::VarInt));
    contents.write_var_u32(42);
    contents.write_var_u32(field_tag(100, WireType::ByteLength));
    contents.write_var_u32(3);
    contents.write_bytes(b"xyz");

    let mut writer = ByteWriter::new();
    writer.write_var_u32(contents.len() as u32);
    writer.write_bytes(contents.as_slice());
    let bytes = writer.to_bytes();

    let mut reader = ByteReader::new(&bytes);
    let decoded = PlayerInfo::de(&mut reader).unwrap();
    assert_eq!(decoded, value);
    assert!(reader.is_empty(), "reader lands on the frame end");
}

#[test]
fn unknown_subtype_yields_null() {
    // Frame carrying subtype id 9, which Shape does not declare.
    let mut writer = ByteWriter::new();
    writer.write_var_u32(3);
    writer.write_var_u32(9);
    writer.write_var_u32(field_tag(1, WireType::VarInt));
    writer.write_var_u32(5);
    writer.write_var_u32(77); // trailing value after the frame
    let bytes = writer.to_bytes();

    let mut reader = ByteReader::new(&bytes);
    let decoded = Option::<Shape>::de(&mut reader).unwrap();
    assert_eq!(decoded, None);
    // Seeked to the frame end: the next value is intact.
    assert_eq!(u32::de(&mut reader).unwrap(), 77);
}

#[test]
fn old_reader_new_writer_field_mismatch() {
    // A "newer" PlayerInfo whose level field moved to ByteLength wire shape
    // still decodes: the mismatched field is skipped to its default.
    let mut contents = ByteWriter::new();
    contents.write_var_u32(field_tag(1, WireType::ByteLength));
    String::from("carol").ser(&mut contents);
    contents.write_var_u32(field_tag(2, WireType::ByteLength));
    String::from("not-a-number").ser(&mut contents);

    let mut writer = ByteWriter::new();
    writer.write_var_u32(contents.len() as u32);
    writer.write_bytes(contents.as_slice());
    let bytes = writer.to_bytes();

    let mut reader = ByteReader::new(&bytes);
    let decoded = PlayerInfo::de(&mut reader).unwrap();
    assert_eq!(decoded.display_name, "carol");
    assert_eq!(decoded.level, 0);
}

#[test]
fn nested_records_frame_independently() {
    record! {
        pub struct Wrapper {
            1 => inner: PlayerInfo,
            2 => tag: u32,
        }
    }

    round_trip(Wrapper {
        inner: PlayerInfo {
            display_name: String::from("dave"),
            level: 2,
            position: Vector3::new(0.5, 0.0, -0.5),
        },
        tag: 11,
    });
}
