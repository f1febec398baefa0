use std::rc::Rc;

use dobj_shared::{ListenerKey, ObjRef, ObjectId, ObjectState, Path, Replica};

/// Strong, clonable user handle to a resolved object. Handles are the only
/// strong holders of client-side objects (the client's tables keep weak
/// references), so dropping the last clone runs the object's dispose hook,
/// which unmaps it, recycles its id and unsubscribes.
pub struct Handle<T: Replica> {
    object: ObjRef<T>,
    id: ObjectId,
}

impl<T: Replica + Default> Handle<T> {
    pub(crate) fn new(object: ObjRef<T>, id: ObjectId) -> Self {
        Self { object, id }
    }

    /// The client-local numeric id riding on every message for this
    /// object.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn state(&self) -> ObjectState {
        self.object.borrow().core().state()
    }

    pub fn path(&self) -> Path {
        self.object.borrow().core().path().clone()
    }

    /// Read access to the typed field table.
    pub fn with<Out>(&self, read: impl FnOnce(&T) -> Out) -> Out {
        read(self.object.borrow().replica())
    }

    /// Mutable access: listener registration on any object, mutation only
    /// where this endpoint holds write authority (store-backed objects).
    pub fn with_mut<Out>(&self, mutate: impl FnOnce(&mut T) -> Out) -> Out {
        mutate(self.object.borrow_mut().replica_mut())
    }

    pub fn on_state(&self, listener: impl Fn(&ObjectState) + 'static) -> ListenerKey {
        self.object.borrow_mut().core_mut().on_state(listener)
    }

    pub fn object(&self) -> &ObjRef<T> {
        &self.object
    }
}

impl<T: Replica> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            object: self.object.clone(),
            id: self.id,
        }
    }
}

impl<T: Replica> Drop for Handle<T> {
    fn drop(&mut self) {
        // Tables hold weak refs, so a count of 1 means this is the last
        // user handle.
        if Rc::strong_count(&self.object) == 1 {
            self.object.borrow_mut().core_mut().dispose();
        }
    }
}
