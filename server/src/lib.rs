//! # dobj Server
//! The authoritative endpoint of the replication protocol: per-connection
//! sessions with a serialized send path, path resolution with memoised
//! async materialisation, and fan-out of object deltas to subscribers.
//! Single-threaded: run inside a tokio `LocalSet` on a current-thread
//! runtime; connection reader/writer tasks hand their work to that thread
//! over channels.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod resolver;
mod server;
mod session;

pub use resolver::resolve_path;
pub use server::{Server, ServerConfig};
pub use session::Session;

pub use dobj_shared as shared;
