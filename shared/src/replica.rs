use crate::{fields::ErasedField, types::FieldId};

/// The field table of a replicated type: lookup by static numeric id, plus
/// id enumeration for sync encoding and channel attachment. Implementations
/// come from the `replica!` macro, which builds the table at compile time
/// from the declared ids.
pub trait Replica: 'static {
    fn field_ids(&self) -> Vec<FieldId>;

    fn field(&self, id: FieldId) -> Option<&dyn ErasedField>;

    fn field_mut(&mut self, id: FieldId) -> Option<&mut dyn ErasedField>;
}

/// Declares a replicated type: a struct of fields, each with a static
/// numeric id used on the wire and a name used by the document-store
/// mapping.
///
/// ```ignore
/// replica! {
///     pub struct Room {
///         1 => name: Value<String>,
///         2 => players: DSet<String>,
///         3 => scores: DMap<String, u32>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! replica {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $fid:literal => $fname:ident : $fty:ty ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( pub $fname: $fty, )+
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    $( $fname: <$fty>::with_id($fid, stringify!($fname)), )+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $crate::Replica for $name {
            fn field_ids(&self) -> Vec<$crate::FieldId> {
                vec![ $( $fid ),+ ]
            }

            fn field(&self, id: $crate::FieldId) -> Option<&dyn $crate::ErasedField> {
                match id {
                    $( $fid => Some(&self.$fname), )+
                    _ => None,
                }
            }

            fn field_mut(&mut self, id: $crate::FieldId) -> Option<&mut dyn $crate::ErasedField> {
                match id {
                    $( $fid => Some(&mut self.$fname), )+
                    _ => None,
                }
            }
        }
    };
}
