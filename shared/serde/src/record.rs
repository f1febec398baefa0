use crate::{error::SerdeErr, reader::ByteReader, serde::Serde, wire::WireType, writer::ByteWriter};

/// Type-form encoding of a record: the bare field stream, no frame. The
/// value form (a `ByteLength` frame around the stream, plus any null or
/// subtype prefix) is layered on by the `record!` macro's `Serde` impls.
pub trait Record: Sized + Default {
    fn write_fields(&self, writer: &mut ByteWriter);

    fn fields_len(&self) -> usize;

    /// Read fields until `reader` (scoped to the record's frame) is
    /// exhausted. Unknown field ids are skipped by wire type.
    fn read_fields(reader: &mut ByteReader) -> Result<Self, SerdeErr>;
}

/// Generates the reader/writer pair for a record type from its declared
/// field-id table.
///
/// Three shapes, matching the three record layouts on the wire:
///
/// - `record! { pub struct Foo { 1 => bar: u32, ... } }`: non-nullable
///   inline field stream.
/// - `record! { pub class Foo { ... } }`: nullable, the frame opens with a
///   varint flag, `0` meaning null (`Option<Foo>` is also wired up).
/// - `record! { pub enum Foo { 1 => Variant(Payload), ... } }`: closed
///   polymorphic subtype set, the frame opens with the concrete subtype id,
///   `0` meaning null, unknown ids yielding null with a warning.
/// Per-type null-aware field decoding for a `record!` type, used to wire up
/// `Serde for Option<T>` from outside this crate.
///
/// `impl Serde for Option<$name>` can only be written here, in the crate
/// that defines `Serde`: once the `record!` macro expands in a downstream
/// crate, both `Serde` and `Option` are foreign to that crate, and the
/// orphan rules forbid implementing a foreign trait for a foreign generic
/// type. Routing through this local (to this crate) trait plus a single
/// blanket impl lets the macro instead implement `Nullable` for `$name`,
/// which is always allowed since `$name` is local wherever the macro is
/// invoked.
pub trait Nullable: Serde + Sized {
    /// Decode the field stream inside an already-opened, non-empty frame,
    /// given that the null flag has not yet been read.
    fn de_fields(frame: &mut ByteReader) -> Result<Option<Self>, SerdeErr>;
}

impl<T: Nullable> Serde for Option<T> {
    const WIRE: WireType = WireType::ByteLength;

    fn ser(&self, writer: &mut ByteWriter) {
        match self {
            Some(value) => Serde::ser(value, writer),
            None => {
                writer.write_var_u32(1);
                writer.write_var_u32(0);
            }
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut frame = reader.read_frame()?;
        if frame.is_empty() {
            return Ok(None);
        }
        T::de_fields(&mut frame)
    }

    fn byte_len(&self) -> usize {
        match self {
            Some(value) => Serde::byte_len(value),
            None => 2,
        }
    }
}

#[macro_export]
macro_rules! record {
    // Non-nullable struct: inline field stream.
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $fid:literal => $fname:ident : $fty:ty ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $( pub $fname: $fty, )+
        }

        $crate::record!(@record_impl $name { $( $fid => $fname : $fty ),+ });

        impl $crate::Serde for $name {
            const WIRE: $crate::WireType = $crate::WireType::ByteLength;

            fn ser(&self, writer: &mut $crate::ByteWriter) {
                let contents = $crate::Record::fields_len(self);
                writer.write_var_u32(contents as u32);
                $crate::Record::write_fields(self, writer);
            }

            fn de(reader: &mut $crate::ByteReader) -> Result<Self, $crate::SerdeErr> {
                let mut frame = reader.read_frame()?;
                <Self as $crate::Record>::read_fields(&mut frame)
            }

            fn byte_len(&self) -> usize {
                let contents = $crate::Record::fields_len(self);
                $crate::var_u32_size(contents as u32) + contents
            }
        }
    };

    // Nullable class: varint null flag precedes the field stream.
    (
        $(#[$meta:meta])*
        $vis:vis class $name:ident {
            $( $fid:literal => $fname:ident : $fty:ty ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $( pub $fname: $fty, )+
        }

        $crate::record!(@record_impl $name { $( $fid => $fname : $fty ),+ });

        impl $crate::Serde for $name {
            const WIRE: $crate::WireType = $crate::WireType::ByteLength;

            fn ser(&self, writer: &mut $crate::ByteWriter) {
                let contents = 1 + $crate::Record::fields_len(self);
                writer.write_var_u32(contents as u32);
                writer.write_var_u32(1);
                $crate::Record::write_fields(self, writer);
            }

            fn de(reader: &mut $crate::ByteReader) -> Result<Self, $crate::SerdeErr> {
                match <Option<Self> as $crate::Serde>::de(reader)? {
                    Some(value) => Ok(value),
                    None => {
                        $crate::__log::warn!(
                            "{}: null decoded into a non-nullable slot, substituting default",
                            stringify!($name)
                        );
                        Ok(<Self as Default>::default())
                    }
                }
            }

            fn byte_len(&self) -> usize {
                let contents = 1 + $crate::Record::fields_len(self);
                $crate::var_u32_size(contents as u32) + contents
            }
        }

        impl $crate::Nullable for $name {
            fn de_fields(frame: &mut $crate::ByteReader) -> Result<Option<Self>, $crate::SerdeErr> {
                let flag = frame.read_var_u32()?;
                if flag == 0 {
                    if !frame.is_empty() {
                        $crate::__log::warn!(
                            "{}: null record followed by {} spurious bytes",
                            stringify!($name),
                            frame.remaining()
                        );
                    }
                    return Ok(None);
                }
                Ok(Some(<$name as $crate::Record>::read_fields(frame)?))
            }
        }
    };

    // Polymorphic class over a closed subtype set: the frame opens with the
    // concrete subtype's numeric id.
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $fid0:literal => $var0:ident ( $pay0:ty )
            $( , $fid:literal => $varn:ident ( $payn:ty ) )*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis enum $name {
            $var0($pay0),
            $( $varn($payn), )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$var0(<$pay0 as Default>::default())
            }
        }

        impl $name {
            /// Numeric id of the concrete subtype.
            pub fn subtype_id(&self) -> u32 {
                match self {
                    Self::$var0(_) => $fid0,
                    $( Self::$varn(_) => $fid, )*
                }
            }

            fn payload_fields_len(&self) -> usize {
                match self {
                    Self::$var0(payload) => $crate::Record::fields_len(payload),
                    $( Self::$varn(payload) => $crate::Record::fields_len(payload), )*
                }
            }

            fn write_payload_fields(&self, writer: &mut $crate::ByteWriter) {
                match self {
                    Self::$var0(payload) => $crate::Record::write_fields(payload, writer),
                    $( Self::$varn(payload) => $crate::Record::write_fields(payload, writer), )*
                }
            }
        }

        impl $crate::Serde for $name {
            const WIRE: $crate::WireType = $crate::WireType::ByteLength;

            fn ser(&self, writer: &mut $crate::ByteWriter) {
                let contents =
                    $crate::var_u32_size(self.subtype_id()) + self.payload_fields_len();
                writer.write_var_u32(contents as u32);
                writer.write_var_u32(self.subtype_id());
                self.write_payload_fields(writer);
            }

            fn de(reader: &mut $crate::ByteReader) -> Result<Self, $crate::SerdeErr> {
                match <Option<Self> as $crate::Serde>::de(reader)? {
                    Some(value) => Ok(value),
                    None => {
                        $crate::__log::warn!(
                            "{}: null decoded into a non-nullable slot, substituting default",
                            stringify!($name)
                        );
                        Ok(<Self as Default>::default())
                    }
                }
            }

            fn byte_len(&self) -> usize {
                let contents =
                    $crate::var_u32_size(self.subtype_id()) + self.payload_fields_len();
                $crate::var_u32_size(contents as u32) + contents
            }
        }

        impl $crate::Nullable for $name {
            fn de_fields(frame: &mut $crate::ByteReader) -> Result<Option<Self>, $crate::SerdeErr> {
                match frame.read_var_u32()? {
                    0 => {
                        if !frame.is_empty() {
                            $crate::__log::warn!(
                                "{}: null record followed by {} spurious bytes",
                                stringify!($name),
                                frame.remaining()
                            );
                        }
                        Ok(None)
                    }
                    $fid0 => Ok(Some($name::$var0(
                        <$pay0 as $crate::Record>::read_fields(frame)?,
                    ))),
                    $( $fid => Ok(Some($name::$varn(
                        <$payn as $crate::Record>::read_fields(frame)?,
                    ))), )*
                    unknown => {
                        // The frame reader goes out of scope here, which is
                        // the seek to the frame's end.
                        $crate::__log::warn!(
                            "{}: unknown subtype id {}, yielding null",
                            stringify!($name),
                            unknown
                        );
                        Ok(None)
                    }
                }
            }
        }
    };

    // Shared Record impl for struct and class shapes.
    (@record_impl $name:ident { $( $fid:literal => $fname:ident : $fty:ty ),+ }) => {
        impl $crate::Record for $name {
            fn write_fields(&self, writer: &mut $crate::ByteWriter) {
                $(
                    writer.write_var_u32($crate::field_tag(
                        $fid,
                        <$fty as $crate::Serde>::WIRE,
                    ));
                    $crate::Serde::ser(&self.$fname, writer);
                )+
            }

            fn fields_len(&self) -> usize {
                let mut length = 0;
                $(
                    length += $crate::var_u32_size($crate::field_tag(
                        $fid,
                        <$fty as $crate::Serde>::WIRE,
                    ));
                    length += $crate::Serde::byte_len(&self.$fname);
                )+
                length
            }

            fn read_fields(reader: &mut $crate::ByteReader) -> Result<Self, $crate::SerdeErr> {
                let mut out = <Self as Default>::default();
                while !reader.is_empty() {
                    let tag = reader.read_var_u32()?;
                    let wire = $crate::WireType::from_bits(tag);
                    match tag >> 2 {
                        $(
                            $fid => {
                                out.$fname =
                                    $crate::de_tagged(wire, reader, stringify!($name))?;
                            }
                        )+
                        unknown => {
                            $crate::__log::warn!(
                                "{}: skipping unknown field id {} ({:?})",
                                stringify!($name),
                                unknown,
                                wire
                            );
                            reader.skip(wire)?;
                        }
                    }
                }
                Ok(out)
            }
        }
    };
}
