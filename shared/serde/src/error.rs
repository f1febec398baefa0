use thiserror::Error;

/// Hard decode failures. Everything else the codec recovers from by
/// skipping and substituting a default, with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// Ran off the end of the input buffer
    #[error("unexpected end of input (wanted {wanted} more bytes, {remaining} remaining)")]
    UnexpectedEnd { wanted: usize, remaining: usize },

    /// A varint kept its continuation bit set past the 32-bit range
    #[error("varint did not terminate within 5 bytes")]
    VarIntOverflow,

    /// A string payload was not valid UTF-8
    #[error("string payload is not valid UTF-8")]
    BadUtf8,

    /// A discriminant that the protocol has no reader for
    #[error("{context}: unknown discriminant {value}")]
    UnknownDiscriminant { context: &'static str, value: u32 },
}
