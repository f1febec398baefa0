use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value as DocValue;

use crate::{
    path::Path,
    store::StoreSink,
    types::{Backing, HostType, PeerId},
};

/// Callback receiving one framed delta payload (message type onward; the
/// object id prefix is the sink's concern).
pub type Sink = Rc<dyn Fn(&[u8])>;

/// Write-through binding to the external document store for store-backed
/// objects.
#[derive(Clone)]
pub struct StoreBinding {
    pub sink: Rc<dyn StoreSink>,
    pub doc_key: String,
}

/// The outbound half of an object, shared by every field in its table.
/// Fields frame their own deltas and push them here; on the server the
/// sinks are subscribed sessions, on the client the single connection.
/// The channel also carries the authority verdict: exactly one endpoint of
/// a replicated object is the writer.
///
/// A freshly created channel is detached (writer-permitted with no sinks),
/// which is what standalone replicas in tests get.
#[derive(Clone)]
pub struct DeltaChannel {
    inner: Rc<RefCell<ChannelInner>>,
}

struct ChannelInner {
    side: HostType,
    backing: Backing,
    writer: bool,
    path: Path,
    sinks: Vec<(PeerId, Sink)>,
    store: Option<StoreBinding>,
}

impl DeltaChannel {
    pub fn detached() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ChannelInner {
                side: HostType::Client,
                backing: Backing::Server,
                writer: true,
                path: Path::root(),
                sinks: Vec::new(),
                store: None,
            })),
        }
    }

    pub(crate) fn configure(&self, side: HostType, backing: Backing, writer: bool, path: Path) {
        let mut inner = self.inner.borrow_mut();
        inner.side = side;
        inner.backing = backing;
        inner.writer = writer;
        inner.path = path;
    }

    pub fn side(&self) -> HostType {
        self.inner.borrow().side
    }

    pub fn backing(&self) -> Backing {
        self.inner.borrow().backing
    }

    pub fn is_writer(&self) -> bool {
        self.inner.borrow().writer
    }

    pub fn path(&self) -> Path {
        self.inner.borrow().path.clone()
    }

    /// Authority check for mutating operations. Violations are programming
    /// errors, not wire conditions.
    pub fn assert_writer(&self, operation: &str) {
        let inner = self.inner.borrow();
        if !inner.writer {
            panic!(
                "{}: {} requires write authority (side {:?}, backing {:?})",
                inner.path, operation, inner.side, inner.backing
            );
        }
    }

    pub fn assert_client(&self, operation: &str) {
        let inner = self.inner.borrow();
        if inner.side != HostType::Client {
            panic!("{}: {} is client-only", inner.path, operation);
        }
    }

    pub fn add_sink(&self, peer: PeerId, sink: Sink) {
        self.inner.borrow_mut().sinks.push((peer, sink));
    }

    pub fn remove_sink(&self, peer: PeerId) {
        self.inner
            .borrow_mut()
            .sinks
            .retain(|(sink_peer, _)| *sink_peer != peer);
    }

    pub fn emit(&self, payload: &[u8]) {
        let sinks: Vec<Sink> = self
            .inner
            .borrow()
            .sinks
            .iter()
            .map(|(_, sink)| sink.clone())
            .collect();
        for sink in sinks {
            sink(payload);
        }
    }

    pub fn emit_to(&self, peer: PeerId, payload: &[u8]) {
        let sinks: Vec<Sink> = self
            .inner
            .borrow()
            .sinks
            .iter()
            .filter(|(sink_peer, _)| *sink_peer == peer)
            .map(|(_, sink)| sink.clone())
            .collect();
        for sink in sinks {
            sink(payload);
        }
    }

    pub fn set_store(&self, binding: StoreBinding) {
        self.inner.borrow_mut().store = Some(binding);
    }

    pub fn store_set(&self, field: &str, value: DocValue) {
        let binding = self.inner.borrow().store.clone();
        if let Some(binding) = binding {
            binding.sink.set_field(&binding.doc_key, field, value);
        }
    }

    pub fn store_delete(&self, field: &str) {
        let binding = self.inner.borrow().store.clone();
        if let Some(binding) = binding {
            binding.sink.delete_field(&binding.doc_key, field);
        }
    }
}
