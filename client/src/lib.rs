//! # dobj Client
//! The subscription client: resolves paths to locally-numbered handles,
//! subscribes on connect, auto-reconnects with capped exponential backoff,
//! recycles unused handle ids, and applies inbound deltas on the main
//! thread. Everything is single-threaded: run the client inside a tokio
//! `LocalSet` on a current-thread runtime.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod client;
mod connection;
mod handle;

pub use client::{Client, ClientConfig};
pub use connection::{backoff_delay, ConnState};
pub use handle::Handle;

pub use dobj_shared as shared;
