use std::rc::Rc;

/// Token returned by `Listeners::add`, used to unhook later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerKey(u64);

/// A keyed callback list. Dispatch walks a snapshot in reverse registration
/// order, so a listener may unhook itself (or others) during dispatch
/// without corrupting the walk. Listener errors are the listener's problem:
/// callbacks return nothing and must not unwind.
pub struct Listeners<A> {
    entries: Vec<(u64, Rc<dyn Fn(&A)>)>,
    next_key: u64,
}

impl<A> Listeners<A> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_key: 0,
        }
    }

    pub fn add(&mut self, listener: impl Fn(&A) + 'static) -> ListenerKey {
        let key = self.next_key;
        self.next_key += 1;
        self.entries.push((key, Rc::new(listener)));
        ListenerKey(key)
    }

    pub fn remove(&mut self, key: ListenerKey) {
        self.entries.retain(|(entry_key, _)| *entry_key != key.0);
    }

    pub fn emit(&self, argument: &A) {
        let snapshot: Vec<Rc<dyn Fn(&A)>> = self
            .entries
            .iter()
            .rev()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(argument);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A> Default for Listeners<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects cleanup closures to run exactly once at disposal time.
pub struct Disposer {
    actions: Vec<Box<dyn FnOnce()>>,
}

impl Disposer {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    pub fn push(&mut self, action: impl FnOnce() + 'static) {
        self.actions.push(Box::new(action));
    }

    pub fn run(&mut self) {
        for action in self.actions.drain(..) {
            action();
        }
    }
}

impl Default for Disposer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn emits_in_reverse_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();

        let first = order.clone();
        listeners.add(move |_: &u32| first.borrow_mut().push("first"));
        let second = order.clone();
        listeners.add(move |_: &u32| second.borrow_mut().push("second"));

        listeners.emit(&0);
        assert_eq!(*order.borrow(), vec!["second", "first"]);
    }

    #[test]
    fn removed_listener_stops_firing() {
        let count = Rc::new(RefCell::new(0));
        let mut listeners = Listeners::new();
        let counter = count.clone();
        let key = listeners.add(move |_: &u32| *counter.borrow_mut() += 1);

        listeners.emit(&0);
        listeners.remove(key);
        listeners.emit(&0);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn disposer_runs_each_action_once() {
        let count = Rc::new(RefCell::new(0));
        let mut disposer = Disposer::new();
        let counter = count.clone();
        disposer.push(move || *counter.borrow_mut() += 1);

        disposer.run();
        disposer.run();
        assert_eq!(*count.borrow(), 1);
    }
}
