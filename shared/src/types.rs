/// Static numeric id of a field within its declaring type.
pub type FieldId = u32;

/// Session-local (server) or client-local handle id for a replicated
/// object. Dense from 0; the root object is always 0.
pub type ObjectId = u32;

/// Identifies one connected peer endpoint inside a process. `LOCAL` names
/// the process's own endpoint for events that never crossed the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u64);

impl PeerId {
    pub const LOCAL: PeerId = PeerId(0);
}

/// Where the authoritative copy of an object's state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    /// The live server is the sole writer.
    Server,
    /// An external document store; the client acts as the writer.
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    Resolving,
    Failed,
    Active,
    Disconnected,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostType {
    Server,
    Client,
}
